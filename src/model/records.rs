use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::payload::AnswerPayload;
use super::types::{AttemptStatus, EvaluationKind, QuestionType};

/// Authenticated platform identity, before it is mapped to a student record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Row in the student roster; the internal id every attempt and answer is
/// keyed by. Distinct from the auth identity on purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRef {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub unit: Option<i32>,
    pub kind: EvaluationKind,
    /// Minutes; `None` means the attempt is untimed.
    #[serde(default)]
    pub time_limit_minutes: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub opens_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub closes_at: Option<OffsetDateTime>,
    pub published: bool,
    pub active: bool,
    /// Whether the review screen may reveal correct answers after grading.
    #[serde(default)]
    pub show_answers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub position: i32,
    pub question_type: QuestionType,
    pub prompt: String,
    pub points: f64,
    /// Multiple-choice options; empty for other question types.
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Instructor-authored type-specific configuration (crossword entries,
    /// word-search grid, matching columns). The client never generates this.
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub student_id: Uuid,
    pub status: AttemptStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub score: Option<f64>,
    /// Option order frozen at attempt creation so a resumed attempt shows
    /// multiple-choice options in the order they were first presented.
    #[serde(default)]
    pub option_order: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub payload: AnswerPayload,
}
