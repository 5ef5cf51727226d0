/// Events broadcast by the board store to its subscribers (renderers,
/// notification toasts, log sinks).

use serde::Serialize;

use crate::intent::{IntentKind, MutationPhase};
use crate::types::BoardId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message meant for the user, e.g. "could not rename column".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentKind>,
    pub raised_at_ms: i64,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>, intent: Option<IntentKind>) -> Self {
        Self {
            level,
            message: message.into(),
            intent,
            raised_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn error(message: impl Into<String>, intent: Option<IntentKind>) -> Self {
        Self::new(NoticeLevel::Error, message, intent)
    }

    /// Something the user should know about that is not a failure, such as
    /// a board being reloaded after an interrupted change.
    pub fn info(message: impl Into<String>, intent: Option<IntentKind>) -> Self {
        Self::new(NoticeLevel::Info, message, intent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// The tree changed; re-render. `revision` increases on every commit.
    Changed { revision: u64 },
    SelectionChanged { board_id: Option<BoardId> },
    /// An intent moved to a new phase.
    Mutation {
        kind: IntentKind,
        phase: MutationPhase,
    },
    Notice(Notice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_serializes_tagged() {
        let event = StoreEvent::Notice(Notice::error("boom", Some(IntentKind::DeleteCard)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Notice");
        assert_eq!(json["level"], "error");
        assert_eq!(json["intent"], "delete_card");
        assert!(json["raisedAtMs"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_changed_serializes_revision() {
        let json = serde_json::to_string(&StoreEvent::Changed { revision: 4 }).unwrap();
        assert_eq!(json, r#"{"type":"Changed","revision":4}"#);
    }
}
