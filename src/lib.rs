//! Headless core of the Aula student portal: the exam attempt session
//! manager. The crate owns attempt lifecycle, debounced answer persistence,
//! the anti-cheating integrity monitor and the countdown/submission
//! coordinator; everything durable lives behind the [`backend::ExamBackend`]
//! seam so the UI host and the test suite can inject their own transport.

pub mod backend;
pub mod core;
pub mod model;
pub mod session;

#[cfg(test)]
mod test_support;

pub use crate::backend::{BackendError, CreateAttempt, ExamBackend, HttpBackend, StatusUpdate};
pub use crate::core::config::Settings;
pub use crate::core::telemetry::init_tracing;
pub use crate::model::{
    AnswerPayload, Attempt, AttemptStatus, Evaluation, EvaluationKind, FinalizeReason,
    IntegrityEventKind, Question, QuestionType,
};
pub use crate::session::{
    load_attempt_review, AttemptReview, EventDisposition, ExamSession, PageEvent, SessionError,
    SessionEvent,
};
