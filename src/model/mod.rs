mod payload;
mod records;
mod types;

pub use payload::AnswerPayload;
pub use records::{Answer, Attempt, Evaluation, Identity, Question, QuestionOption, StudentRef};
pub use types::{
    AttemptStatus, AvailabilityReason, EvaluationKind, FinalizeReason, IntegrityEventKind,
    QuestionType,
};
