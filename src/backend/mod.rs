mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{
    Answer, AnswerPayload, Attempt, AttemptStatus, Evaluation, Identity, IntegrityEventKind,
    Question, StudentRef,
};

pub use http::HttpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not authorized")]
    Unauthorized,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("remote error ({status}): {detail}")]
    Remote { status: u16, detail: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Outcome of the conditional terminal-status update. `Conflict` means the
/// attempt had already left `in_progress`, i.e. another tab or the deadline
/// path won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied,
    Conflict,
}

#[derive(Debug, Clone)]
pub struct CreateAttempt {
    pub student_id: Uuid,
    pub evaluation_id: Uuid,
    pub option_order: HashMap<Uuid, Vec<Uuid>>,
}

/// The remote operations the session core consumes. Auth, row-level
/// security and grading all live on the other side of this seam; the
/// session treats them as opaque contracts.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>, BackendError>;

    async fn resolve_student(&self, user_id: Uuid) -> Result<Option<StudentRef>, BackendError>;

    async fn get_evaluation(&self, evaluation_id: Uuid)
        -> Result<Option<Evaluation>, BackendError>;

    async fn find_active_attempt(
        &self,
        student_id: Uuid,
        evaluation_id: Uuid,
    ) -> Result<Option<Attempt>, BackendError>;

    async fn find_latest_attempt(
        &self,
        student_id: Uuid,
        evaluation_id: Uuid,
    ) -> Result<Option<Attempt>, BackendError>;

    /// Fails with [`BackendError::Conflict`] when an `in_progress` attempt
    /// already exists for the (student, evaluation) pair.
    async fn create_attempt(&self, params: CreateAttempt) -> Result<Attempt, BackendError>;

    async fn list_questions(&self, evaluation_id: Uuid) -> Result<Vec<Question>, BackendError>;

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>, BackendError>;

    async fn upsert_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: &AnswerPayload,
    ) -> Result<(), BackendError>;

    async fn update_attempt_status(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        ended_at: Option<OffsetDateTime>,
    ) -> Result<StatusUpdate, BackendError>;

    async fn trigger_auto_grading(&self, attempt_id: Uuid) -> Result<(), BackendError>;

    async fn log_integrity_event(
        &self,
        attempt_id: Uuid,
        kind: IntegrityEventKind,
    ) -> Result<(), BackendError>;
}
