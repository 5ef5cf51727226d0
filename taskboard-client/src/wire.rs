/// Request and response bodies of the taskboard REST API.
///
/// Field names follow the server (camelCase on requests; the entity records
/// themselves keep their snake_case column names, see `taskboard_core::types`).
use serde::{Deserialize, Serialize};
use taskboard_core::types::{deserialize_id, Board, CardPatch, NewCard, Priority};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRequest<'a> {
    pub user_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateBoardRequest<'a> {
    pub user_id: &'a str,
    pub board_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameBoardRequest<'a> {
    pub user_id: &'a str,
    pub board_id: &'a str,
    pub board_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteBoardRequest<'a> {
    pub board_id: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateColumnRequest<'a> {
    pub board_id: &'a str,
    pub column_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameColumnRequest<'a> {
    pub column_id: &'a str,
    pub column_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ColumnRequest<'a> {
    pub column_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCardRequest<'a> {
    pub column_id: &'a str,
    pub card_title: &'a str,
    pub priority: Priority,
    pub description: &'a str,
    /// Assignee display name.
    pub name: &'a str,
    pub job: &'a str,
    pub user_id: &'a str,
}

impl<'a> CreateCardRequest<'a> {
    pub fn new(column_id: &'a str, card: &'a NewCard, owner: &'a str) -> Self {
        Self {
            column_id,
            card_title: &card.title,
            priority: card.priority,
            description: &card.description,
            name: &card.assignee,
            job: &card.job,
            user_id: owner,
        }
    }
}

/// Only the fields present in the patch are sent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateCardRequest<'a> {
    pub card_id: &'a str,
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

impl<'a> UpdateCardRequest<'a> {
    pub fn new(card_id: &'a str, patch: &'a CardPatch, owner: &'a str) -> Self {
        Self {
            card_id,
            user_id: owner,
            card_title: patch.title.as_deref(),
            description: patch.description.as_deref(),
            priority: patch.priority,
            job: patch.job.as_deref(),
            name: patch.assignee.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CardRequest<'a> {
    pub card_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MoveCardRequest<'a> {
    pub card_id: &'a str,
    pub new_column_id: &'a str,
    pub new_position: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoardList {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub boards: Vec<Board>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BoardCreated {
    #[serde(deserialize_with = "deserialize_id")]
    pub board_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ColumnCreated {
    #[serde(deserialize_with = "deserialize_id")]
    pub column_id: String,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CardCreated {
    #[serde(deserialize_with = "deserialize_id")]
    pub card_id: String,
    #[serde(default)]
    pub position: usize,
}

/// Generic `{success, message}` acknowledgement. Either field may be absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_card_body() {
        let mut card = NewCard::titled("Ship");
        card.assignee = "Ana".into();
        card.priority = Priority::High;
        let body = serde_json::to_value(CreateCardRequest::new("10", &card, "7")).unwrap();
        assert_eq!(body["columnId"], "10");
        assert_eq!(body["cardTitle"], "Ship");
        assert_eq!(body["name"], "Ana");
        assert_eq!(body["priority"], "High");
        assert_eq!(body["userId"], "7");
    }

    #[test]
    fn test_update_card_body_omits_unset_fields() {
        let patch = CardPatch {
            job: Some("ops".into()),
            ..CardPatch::default()
        };
        let body = serde_json::to_value(UpdateCardRequest::new("5", &patch, "7")).unwrap();
        assert_eq!(body, serde_json::json!({"cardId": "5", "userId": "7", "job": "ops"}));
    }

    #[test]
    fn test_numeric_ids_in_responses() {
        let created: CardCreated = serde_json::from_str(r#"{"cardId": 42, "position": 3}"#).unwrap();
        assert_eq!(created.card_id, "42");
        assert_eq!(created.position, 3);

        let ack: Ack = serde_json::from_str(r#"{"message": "ok"}"#).unwrap();
        assert_eq!(ack.success, None);
    }
}
