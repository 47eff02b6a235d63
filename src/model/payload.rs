use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Student answer for one question. Tagged by shape rather than left as an
/// untyped union: free text for open questions, selected option ids for
/// multiple choice, and an opaque JSON document for the game renderers
/// (found words, filled grid cells, matched pairs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerPayload {
    Text(String),
    Options(Vec<Uuid>),
    Game(serde_json::Value),
}

impl AnswerPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            AnswerPayload::Text(_) => "text",
            AnswerPayload::Options(_) => "options",
            AnswerPayload::Game(_) => "game",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tags_are_stable() {
        let payload = AnswerPayload::Text("photosynthesis".to_string());
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["kind"], "text");
        assert_eq!(json["value"], "photosynthesis");

        let back: AnswerPayload = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, payload);
    }

    #[test]
    fn options_payload_round_trips_ids() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let payload = AnswerPayload::Options(ids.clone());
        let json = serde_json::to_string(&payload).expect("serialize");
        let back: AnswerPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, AnswerPayload::Options(ids));
    }
}
