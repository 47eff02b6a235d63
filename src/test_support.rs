use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::backend::{BackendError, CreateAttempt, ExamBackend, StatusUpdate};
use crate::core::time::now_utc;
use crate::model::{
    Answer, AnswerPayload, Attempt, AttemptStatus, Evaluation, EvaluationKind, Identity,
    IntegrityEventKind, Question, QuestionOption, QuestionType, StudentRef,
};

/// In-memory `ExamBackend` with the same contracts as the real platform:
/// at most one active attempt per (student, evaluation), answer upserts
/// keyed by question, conditional status updates that report conflicts.
/// Call history is recorded so tests can assert on remote traffic.
pub(crate) struct MockBackend {
    identity: Option<Identity>,
    student: Option<StudentRef>,
    evaluations: Mutex<HashMap<Uuid, Evaluation>>,
    questions: Mutex<Vec<Question>>,
    attempts: Mutex<Vec<Attempt>>,
    answers: Mutex<Vec<Answer>>,

    pub(crate) upserts: Mutex<Vec<(Uuid, AnswerPayload)>>,
    pub(crate) applied_updates: Mutex<Vec<AttemptStatus>>,
    pub(crate) update_conflicts: AtomicUsize,
    pub(crate) grading_calls: AtomicUsize,
    pub(crate) integrity_events: Mutex<Vec<IntegrityEventKind>>,
    pub(crate) create_calls: AtomicUsize,

    /// Makes the next `find_active_attempt` miss, simulating the window in
    /// which a second tab has not yet observed the first tab's insert.
    hide_active_once: AtomicBool,
    /// Makes the next `update_attempt_status` fail with a transport error.
    fail_update_once: AtomicBool,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        let user_id = Uuid::new_v4();
        Self {
            identity: Some(Identity { user_id, email: Some("student@example.edu".to_string()) }),
            student: Some(StudentRef { id: Uuid::new_v4(), full_name: Some("Test Student".to_string()) }),
            evaluations: Mutex::new(HashMap::new()),
            questions: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
            upserts: Mutex::new(Vec::new()),
            applied_updates: Mutex::new(Vec::new()),
            update_conflicts: AtomicUsize::new(0),
            grading_calls: AtomicUsize::new(0),
            integrity_events: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            hide_active_once: AtomicBool::new(false),
            fail_update_once: AtomicBool::new(false),
        }
    }

    pub(crate) fn anonymous() -> Self {
        let mut backend = Self::new();
        backend.identity = None;
        backend
    }

    pub(crate) fn unenrolled() -> Self {
        let mut backend = Self::new();
        backend.student = None;
        backend
    }

    pub(crate) fn student_id(&self) -> Uuid {
        self.student.as_ref().map(|student| student.id).unwrap_or_default()
    }

    pub(crate) fn insert_evaluation(&self, evaluation: Evaluation) {
        self.evaluations.lock().unwrap().insert(evaluation.id, evaluation);
    }

    pub(crate) fn set_questions(&self, questions: Vec<Question>) {
        *self.questions.lock().unwrap() = questions;
    }

    pub(crate) fn seed_attempt(&self, attempt: Attempt) {
        self.attempts.lock().unwrap().push(attempt);
    }

    pub(crate) fn seed_answer(&self, attempt_id: Uuid, question_id: Uuid, payload: AnswerPayload) {
        self.answers.lock().unwrap().push(Answer { attempt_id, question_id, payload });
    }

    pub(crate) fn hide_active_attempt_once(&self) {
        self.hide_active_once.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_status_update(&self) {
        self.fail_update_once.store(true, Ordering::SeqCst);
    }

    pub(crate) fn attempt(&self, attempt_id: Uuid) -> Option<Attempt> {
        self.attempts.lock().unwrap().iter().find(|a| a.id == attempt_id).cloned()
    }
}

#[async_trait]
impl ExamBackend for MockBackend {
    async fn current_identity(&self) -> Result<Option<Identity>, BackendError> {
        Ok(self.identity.clone())
    }

    async fn resolve_student(&self, _user_id: Uuid) -> Result<Option<StudentRef>, BackendError> {
        Ok(self.student.clone())
    }

    async fn get_evaluation(
        &self,
        evaluation_id: Uuid,
    ) -> Result<Option<Evaluation>, BackendError> {
        Ok(self.evaluations.lock().unwrap().get(&evaluation_id).cloned())
    }

    async fn find_active_attempt(
        &self,
        student_id: Uuid,
        evaluation_id: Uuid,
    ) -> Result<Option<Attempt>, BackendError> {
        if self.hide_active_once.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .find(|attempt| {
                attempt.student_id == student_id
                    && attempt.evaluation_id == evaluation_id
                    && attempt.status == AttemptStatus::InProgress
            })
            .cloned())
    }

    async fn find_latest_attempt(
        &self,
        student_id: Uuid,
        evaluation_id: Uuid,
    ) -> Result<Option<Attempt>, BackendError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|attempt| {
                attempt.student_id == student_id && attempt.evaluation_id == evaluation_id
            })
            .max_by_key(|attempt| attempt.started_at)
            .cloned())
    }

    async fn create_attempt(&self, params: CreateAttempt) -> Result<Attempt, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut attempts = self.attempts.lock().unwrap();
        let already_active = attempts.iter().any(|attempt| {
            attempt.student_id == params.student_id
                && attempt.evaluation_id == params.evaluation_id
                && attempt.status == AttemptStatus::InProgress
        });
        if already_active {
            return Err(BackendError::Conflict(
                "an in_progress attempt already exists".to_string(),
            ));
        }
        let attempt = Attempt {
            id: Uuid::new_v4(),
            evaluation_id: params.evaluation_id,
            student_id: params.student_id,
            status: AttemptStatus::InProgress,
            started_at: now_utc(),
            ended_at: None,
            score: None,
            option_order: params.option_order,
        };
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_questions(&self, evaluation_id: Uuid) -> Result<Vec<Question>, BackendError> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .iter()
            .filter(|question| question.evaluation_id == evaluation_id)
            .cloned()
            .collect())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>, BackendError> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .iter()
            .filter(|answer| answer.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: &AnswerPayload,
    ) -> Result<(), BackendError> {
        self.upserts.lock().unwrap().push((question_id, payload.clone()));
        let mut answers = self.answers.lock().unwrap();
        match answers
            .iter_mut()
            .find(|answer| answer.attempt_id == attempt_id && answer.question_id == question_id)
        {
            Some(existing) => existing.payload = payload.clone(),
            None => {
                answers.push(Answer { attempt_id, question_id, payload: payload.clone() })
            }
        }
        Ok(())
    }

    async fn update_attempt_status(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        ended_at: Option<OffsetDateTime>,
    ) -> Result<StatusUpdate, BackendError> {
        if self.fail_update_once.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".to_string()));
        }
        let mut attempts = self.attempts.lock().unwrap();
        let target = attempts
            .iter_mut()
            .find(|attempt| attempt.id == attempt_id && attempt.status == AttemptStatus::InProgress);
        match target {
            Some(attempt) => {
                attempt.status = status;
                attempt.ended_at = ended_at;
                self.applied_updates.lock().unwrap().push(status);
                Ok(StatusUpdate::Applied)
            }
            None => {
                self.update_conflicts.fetch_add(1, Ordering::SeqCst);
                Ok(StatusUpdate::Conflict)
            }
        }
    }

    async fn trigger_auto_grading(&self, _attempt_id: Uuid) -> Result<(), BackendError> {
        self.grading_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn log_integrity_event(
        &self,
        _attempt_id: Uuid,
        kind: IntegrityEventKind,
    ) -> Result<(), BackendError> {
        self.integrity_events.lock().unwrap().push(kind);
        Ok(())
    }
}

pub(crate) fn evaluation(kind: EvaluationKind, time_limit_minutes: Option<i64>) -> Evaluation {
    Evaluation {
        id: Uuid::new_v4(),
        title: "Unit 2 exam".to_string(),
        unit: Some(2),
        kind,
        time_limit_minutes,
        opens_at: None,
        closes_at: None,
        published: true,
        active: true,
        show_answers: true,
    }
}

pub(crate) fn mc_question(evaluation_id: Uuid, position: i32, option_count: usize) -> Question {
    Question {
        id: Uuid::new_v4(),
        evaluation_id,
        position,
        question_type: QuestionType::MultipleChoiceSingle,
        prompt: format!("Question {position}"),
        points: 2.0,
        options: (0..option_count)
            .map(|i| QuestionOption { id: Uuid::new_v4(), text: format!("option {i}") })
            .collect(),
        config: serde_json::Value::Null,
    }
}

pub(crate) fn open_question(evaluation_id: Uuid, position: i32) -> Question {
    Question {
        id: Uuid::new_v4(),
        evaluation_id,
        position,
        question_type: QuestionType::OpenResponse,
        prompt: format!("Explain {position}"),
        points: 5.0,
        options: Vec::new(),
        config: serde_json::Value::Null,
    }
}

pub(crate) fn in_progress_attempt(
    evaluation_id: Uuid,
    student_id: Uuid,
    started_at: OffsetDateTime,
) -> Attempt {
    Attempt {
        id: Uuid::new_v4(),
        evaluation_id,
        student_id,
        status: AttemptStatus::InProgress,
        started_at,
        ended_at: None,
        score: None,
        option_order: HashMap::new(),
    }
}
