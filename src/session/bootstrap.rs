use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{timing, SessionError};
use crate::backend::{BackendError, CreateAttempt, ExamBackend};
use crate::core::time::now_utc;
use crate::model::{AnswerPayload, Attempt, AvailabilityReason, Evaluation, Question};

pub(crate) struct LoadedSession {
    pub(crate) evaluation: Evaluation,
    pub(crate) questions: Vec<Question>,
    pub(crate) attempt: Attempt,
    pub(crate) answers: HashMap<Uuid, AnswerPayload>,
    /// `None` for untimed evaluations; `Some(0)` means the attempt must be
    /// finalized immediately instead of rendered.
    pub(crate) remaining_seconds: Option<i64>,
}

/// Attempt lifecycle controller: resolve the student, reuse or create the
/// attempt, load questions and prior answers, derive the remaining time.
pub(crate) async fn load_session(
    backend: &dyn ExamBackend,
    evaluation_id: Uuid,
) -> Result<LoadedSession, SessionError> {
    let identity = backend.current_identity().await?.ok_or(SessionError::Unauthenticated)?;
    let student =
        backend.resolve_student(identity.user_id).await?.ok_or(SessionError::NotEnrolled)?;
    let evaluation = backend.get_evaluation(evaluation_id).await?.ok_or_else(|| {
        SessionError::Backend(BackendError::NotFound(format!("evaluation {evaluation_id}")))
    })?;

    let mut questions = backend.list_questions(evaluation_id).await?;
    questions.sort_by_key(|question| question.position);

    let attempt = match backend.find_active_attempt(student.id, evaluation_id).await? {
        Some(attempt) => {
            tracing::info!(attempt_id = %attempt.id, "Resuming in-progress attempt");
            attempt
        }
        None => {
            // Availability gates new attempts only; an in-progress attempt
            // may always be resumed.
            check_availability(&evaluation, now_utc())?;

            let option_order = shuffle_option_order(&questions, &mut StdRng::from_entropy());
            let params = CreateAttempt { student_id: student.id, evaluation_id, option_order };
            match backend.create_attempt(params).await {
                Ok(attempt) => {
                    tracing::info!(attempt_id = %attempt.id, "Created new attempt");
                    attempt
                }
                Err(BackendError::Conflict(_)) => {
                    // Two tabs raced the insert; whichever won owns the attempt.
                    backend.find_active_attempt(student.id, evaluation_id).await?.ok_or_else(
                        || {
                            SessionError::Backend(BackendError::Conflict(
                                "active attempt vanished during creation race".to_string(),
                            ))
                        },
                    )?
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    apply_option_order(&mut questions, &attempt.option_order);

    let answers = backend
        .list_answers(attempt.id)
        .await?
        .into_iter()
        .map(|answer| (answer.question_id, answer.payload))
        .collect();

    let remaining_seconds = evaluation
        .time_limit_minutes
        .map(|limit| timing::remaining_seconds(limit, attempt.started_at, now_utc()));

    Ok(LoadedSession { evaluation, questions, attempt, answers, remaining_seconds })
}

pub(crate) fn check_availability(
    evaluation: &Evaluation,
    now: OffsetDateTime,
) -> Result<(), SessionError> {
    if !evaluation.published {
        return Err(SessionError::EvaluationNotAvailable(AvailabilityReason::NotPublished));
    }
    if !evaluation.active {
        return Err(SessionError::EvaluationNotAvailable(AvailabilityReason::Inactive));
    }
    if let Some(opens_at) = evaluation.opens_at {
        if now < opens_at {
            return Err(SessionError::EvaluationNotAvailable(AvailabilityReason::NotYetOpen));
        }
    }
    if let Some(closes_at) = evaluation.closes_at {
        if now > closes_at {
            return Err(SessionError::EvaluationNotAvailable(AvailabilityReason::Closed));
        }
    }
    Ok(())
}

/// Shuffle multiple-choice options once, at attempt creation. The order is
/// persisted on the attempt so a resumed session presents options exactly
/// as they were first shown.
pub(crate) fn shuffle_option_order(
    questions: &[Question],
    rng: &mut impl Rng,
) -> HashMap<Uuid, Vec<Uuid>> {
    questions
        .iter()
        .filter(|question| question.question_type.is_multiple_choice())
        .filter(|question| !question.options.is_empty())
        .map(|question| {
            let mut ids: Vec<Uuid> = question.options.iter().map(|option| option.id).collect();
            ids.shuffle(rng);
            (question.id, ids)
        })
        .collect()
}

pub(crate) fn apply_option_order(questions: &mut [Question], order: &HashMap<Uuid, Vec<Uuid>>) {
    for question in questions.iter_mut() {
        let Some(ids) = order.get(&question.id) else { continue };
        // Options the stored order does not know keep their relative place
        // at the end (sort_by_key is stable).
        question
            .options
            .sort_by_key(|option| ids.iter().position(|id| *id == option.id).unwrap_or(usize::MAX));
    }
}
