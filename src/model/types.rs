use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    MultipleChoice,
    OpenResponse,
    Crossword,
    WordSearch,
    ColumnMatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    OpenResponse,
    MultipleChoiceSingle,
    MultipleChoiceMulti,
    Crossword,
    WordSearch,
    ColumnMatching,
}

impl QuestionType {
    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, QuestionType::MultipleChoiceSingle | QuestionType::MultipleChoiceMulti)
    }
}

/// Attempt status only ever moves forward: `in_progress` transitions once to
/// one of the client-set terminal states, and `graded` is applied later by
/// the backend grading function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    BlockedByFocus,
    PendingManualReview,
    Graded,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    Manual,
    TimeExpired,
    BlockedByFocus,
}

impl FinalizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeReason::Manual => "manual",
            FinalizeReason::TimeExpired => "time_expired",
            FinalizeReason::BlockedByFocus => "blocked_by_focus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityEventKind {
    FocusChange,
    CopyAttempt,
    PasteAttempt,
    ContextMenu,
}

impl IntegrityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityEventKind::FocusChange => "focus_change",
            IntegrityEventKind::CopyAttempt => "copy_attempt",
            IntegrityEventKind::PasteAttempt => "paste_attempt",
            IntegrityEventKind::ContextMenu => "context_menu",
        }
    }
}

/// Why an evaluation refused to start a new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityReason {
    NotPublished,
    Inactive,
    NotYetOpen,
    Closed,
}

impl std::fmt::Display for AvailabilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AvailabilityReason::NotPublished => "evaluation is not published",
            AvailabilityReason::Inactive => "evaluation is not active",
            AvailabilityReason::NotYetOpen => "evaluation has not opened yet",
            AvailabilityReason::Closed => "evaluation has already closed",
        };
        f.write_str(text)
    }
}
