mod answers;
mod bootstrap;
mod countdown;
mod finalize;
mod integrity;
mod review;
mod timing;


use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::{BackendError, ExamBackend};
use crate::core::config::{ExamSettings, Settings};
use crate::model::{
    AnswerPayload, Attempt, AttemptStatus, AvailabilityReason, Evaluation, FinalizeReason,
    Question, QuestionType,
};

pub use integrity::{EventDisposition, PageEvent};
pub use review::{load_attempt_review, AttemptReview};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("no student record is linked to this account")]
    NotEnrolled,
    #[error("{0}")]
    EvaluationNotAvailable(AvailabilityReason),
    #[error("no finished attempt to review")]
    NothingToReview,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Reactive notifications pushed to the UI host while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Focus-loss warning banner should be shown (first violations).
    Warning { violations: u32 },
    /// The transient warning banner timed out.
    WarningCleared,
    /// The attempt was blocked after repeated focus violations.
    Blocked,
    /// Advisory countdown tick; display only, the wall clock is authoritative.
    Tick { remaining_seconds: i64 },
    Finalized { reason: FinalizeReason, status: AttemptStatus },
    /// The exam screen should be left unconditionally.
    NavigateAway,
}

pub(crate) struct SessionShared {
    backend: Arc<dyn ExamBackend>,
    exam: ExamSettings,
    evaluation: Evaluation,
    questions: Vec<Question>,
    attempt: Attempt,
    has_open_response: bool,
    state: Mutex<TransientState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Session-local state; never persisted, reset by creating a new session.
pub(crate) struct TransientState {
    answers: HashMap<Uuid, AnswerPayload>,
    current_index: usize,
    remaining_seconds: Option<i64>,
    violations: u32,
    locked: bool,
    finalizing: bool,
    terminal: Option<AttemptStatus>,
    save_tx: Option<mpsc::UnboundedSender<answers::SaveRequest>>,
    warning_timer: Option<JoinHandle<()>>,
}

impl SessionShared {
    /// The mutex is never held across an await point, so contention is
    /// bounded and a poisoned lock can only mean a panicked accessor.
    fn lock_state(&self) -> MutexGuard<'_, TransientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// One student's live run through an evaluation. Owns the countdown and
/// answer-buffer tasks; dropping the session aborts them, an explicit
/// [`ExamSession::shutdown`] flushes buffered answers first.
pub struct ExamSession {
    shared: Arc<SessionShared>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamSession")
            .field("attempt_id", &self.shared.attempt.id)
            .finish_non_exhaustive()
    }
}

impl ExamSession {
    /// Resolve or create the student's attempt and return a ready-to-render
    /// session plus the event stream for the UI host. Any failure here is
    /// fatal: no partial session is ever handed out.
    pub async fn start(
        backend: Arc<dyn ExamBackend>,
        settings: &Settings,
        evaluation_id: Uuid,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        let loaded = bootstrap::load_session(backend.as_ref(), evaluation_id).await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (save_tx, save_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let has_open_response =
            loaded.questions.iter().any(|q| q.question_type == QuestionType::OpenResponse);

        let shared = Arc::new(SessionShared {
            backend,
            exam: settings.exam().clone(),
            evaluation: loaded.evaluation,
            questions: loaded.questions,
            attempt: loaded.attempt,
            has_open_response,
            state: Mutex::new(TransientState {
                answers: loaded.answers,
                current_index: 0,
                remaining_seconds: loaded.remaining_seconds,
                violations: 0,
                locked: false,
                finalizing: false,
                terminal: None,
                save_tx: Some(save_tx),
                warning_timer: None,
            }),
            events: events_tx,
        });

        let mut session =
            Self { shared: Arc::clone(&shared), shutdown: shutdown_tx, tasks: Vec::new() };

        if loaded.remaining_seconds == Some(0) {
            // The limit ran out while the student was away: submit right
            // away and hand back a locked session, never a live exam.
            if let Err(err) = finalize::finalize(&shared, FinalizeReason::TimeExpired).await {
                tracing::error!(error = %err, "Failed to finalize expired attempt on load");
            }
            return Ok((session, events_rx));
        }

        session.tasks.push(answers::spawn_answer_buffer(
            Arc::clone(&shared),
            save_rx,
            Duration::from_millis(shared.exam.answer_debounce_ms),
        ));
        if loaded.remaining_seconds.is_some() {
            session.tasks.push(countdown::spawn_countdown(Arc::clone(&shared), shutdown_rx));
        }

        Ok((session, events_rx))
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.shared.evaluation
    }

    pub fn questions(&self) -> &[Question] {
        &self.shared.questions
    }

    pub fn attempt_id(&self) -> Uuid {
        self.shared.attempt.id
    }

    pub fn current_question_index(&self) -> usize {
        self.shared.lock_state().current_index
    }

    pub fn remaining_seconds(&self) -> Option<i64> {
        self.shared.lock_state().remaining_seconds
    }

    pub fn violations(&self) -> u32 {
        self.shared.lock_state().violations
    }

    pub fn is_locked(&self) -> bool {
        self.shared.lock_state().locked
    }

    /// Local view of the attempt status; `in_progress` until a finalize
    /// path completes.
    pub fn status(&self) -> AttemptStatus {
        self.shared.lock_state().terminal.unwrap_or(AttemptStatus::InProgress)
    }

    pub fn answer(&self, question_id: Uuid) -> Option<AnswerPayload> {
        self.shared.lock_state().answers.get(&question_id).cloned()
    }

    /// Bounds-checked navigation; refused once the session is locked.
    pub fn go_to_question(&self, index: usize) -> bool {
        let mut state = self.shared.lock_state();
        if state.locked || index >= self.shared.questions.len() {
            return false;
        }
        state.current_index = index;
        true
    }

    /// Update the in-memory answer immediately and schedule a debounced
    /// remote upsert. A no-op once the session is locked or terminal.
    pub fn record_answer(&self, question_id: Uuid, payload: AnswerPayload) {
        let mut state = self.shared.lock_state();
        if state.locked || state.terminal.is_some() {
            return;
        }
        state.answers.insert(question_id, payload.clone());
        if let Some(save_tx) = &state.save_tx {
            let _ = save_tx.send(answers::SaveRequest { question_id, payload });
        }
    }

    /// Feed a page-level event (visibility change, clipboard, context menu)
    /// from the UI host into the integrity monitor. The returned
    /// disposition tells the host whether to prevent the default action.
    pub async fn report_page_event(&self, event: PageEvent) -> EventDisposition {
        integrity::handle_page_event(&self.shared, event).await
    }

    /// Manual submission. Returns `Ok(false)` when the student did not
    /// confirm or the session is already locked; automatic paths (deadline,
    /// focus block) never come through here.
    pub async fn submit(&self, confirmed: bool) -> Result<bool, SessionError> {
        if !confirmed {
            return Ok(false);
        }
        if self.shared.lock_state().locked {
            return Ok(false);
        }
        finalize::finalize(&self.shared, FinalizeReason::Manual).await?;
        Ok(true)
    }

    /// Deterministic teardown: stops the countdown, closes the answer
    /// buffer (flushing anything still pending) and waits for both tasks,
    /// so no stale callback can touch a finished attempt.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        {
            let mut state = self.shared.lock_state();
            state.save_tx = None;
            if let Some(timer) = state.warning_timer.take() {
                timer.abort();
            }
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        let mut state = self.shared.lock_state();
        state.save_tx = None;
        if let Some(timer) = state.warning_timer.take() {
            timer.abort();
        }
        drop(state);
        for task in &self.tasks {
            task.abort();
        }
    }
}
