use std::collections::HashMap;

use uuid::Uuid;

use super::{bootstrap, SessionError};
use crate::backend::{BackendError, ExamBackend};
use crate::model::{AnswerPayload, Attempt, AttemptStatus, Evaluation, Question};

/// Read-only view of a finished attempt for the review screen.
#[derive(Debug)]
pub struct AttemptReview {
    pub evaluation: Evaluation,
    pub questions: Vec<Question>,
    pub attempt: Attempt,
    pub answers: HashMap<Uuid, AnswerPayload>,
    /// Whether correct answers may be revealed alongside the student's.
    pub show_answers: bool,
}

/// Load the student's most recent attempt for review. Refuses while an
/// attempt is still running; the live session owns it until finalize.
pub async fn load_attempt_review(
    backend: &dyn ExamBackend,
    evaluation_id: Uuid,
) -> Result<AttemptReview, SessionError> {
    let identity = backend.current_identity().await?.ok_or(SessionError::Unauthenticated)?;
    let student =
        backend.resolve_student(identity.user_id).await?.ok_or(SessionError::NotEnrolled)?;
    let evaluation = backend.get_evaluation(evaluation_id).await?.ok_or_else(|| {
        SessionError::Backend(BackendError::NotFound(format!("evaluation {evaluation_id}")))
    })?;

    let attempt = backend
        .find_latest_attempt(student.id, evaluation_id)
        .await?
        .ok_or(SessionError::NothingToReview)?;
    if attempt.status == AttemptStatus::InProgress {
        return Err(SessionError::NothingToReview);
    }

    let mut questions = backend.list_questions(evaluation_id).await?;
    questions.sort_by_key(|question| question.position);
    bootstrap::apply_option_order(&mut questions, &attempt.option_order);

    let answers = backend
        .list_answers(attempt.id)
        .await?
        .into_iter()
        .map(|answer| (answer.question_id, answer.payload))
        .collect();

    let show_answers = evaluation.show_answers;
    Ok(AttemptReview { evaluation, questions, attempt, answers, show_answers })
}
