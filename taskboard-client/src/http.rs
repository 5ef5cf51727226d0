/// HTTP remote authority: the taskboard REST API behind `RemoteAuthority`.
///
/// Status mapping:
/// - 2xx with a parsable body: success (`{success: false}` is a rejection)
/// - any other status: `Rejected`, carrying the body's `message` when present
/// - transport failures and timeouts: `Unreachable`
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

use taskboard_core::remote::{Created, RemoteAuthority, RemoteError, RemoteOp};
use taskboard_core::types::{Board, BoardId, CardPatch, NewCard};

use crate::config::ClientConfig;
use crate::wire;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct HttpAuthority {
    client: Client,
    base_url: String,
}

impl HttpAuthority {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Send `body` as JSON and return the raw response text of a 2xx answer.
    async fn call<B: Serialize>(
        &self,
        op: RemoteOp,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<String, RemoteError> {
        let url = self.url(path);
        let response = self
            .client
            .request(method, &url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                log::warn!("[taskboard.http] {:?} {} failed: {}", op, url, e);
                RemoteError::Unreachable(transport_message(&e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            log::warn!("[taskboard.http] {:?} {} body read failed: {}", op, url, e);
            RemoteError::Unreachable(transport_message(&e))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<wire::Ack>(&text)
                .ok()
                .and_then(|ack| ack.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            log::warn!("[taskboard.http] {:?} rejected ({}): {}", op, status, message);
            return Err(RemoteError::Rejected(message));
        }

        log::debug!("[taskboard.http] {:?} {} -> {}", op, url, status);
        Ok(text)
    }

    async fn call_json<B: Serialize, R: DeserializeOwned>(
        &self,
        op: RemoteOp,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R, RemoteError> {
        let text = self.call(op, method, path, body).await?;
        serde_json::from_str(&text).map_err(|e| {
            log::warn!("[taskboard.http] {:?} returned an unexpected body: {}", op, e);
            RemoteError::Rejected(format!("Unexpected response from server: {}", e))
        })
    }

    /// For endpoints answering `{success, message}` (or nothing at all).
    async fn call_ack<B: Serialize>(
        &self,
        op: RemoteOp,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), RemoteError> {
        let text = self.call(op, method, path, body).await?;
        let ack: wire::Ack = serde_json::from_str(&text).unwrap_or_default();
        if ack.success == Some(false) {
            let message = ack
                .message
                .unwrap_or_else(|| "The server did not accept the change".to_string());
            log::warn!("[taskboard.http] {:?} not accepted: {}", op, message);
            return Err(RemoteError::Rejected(message));
        }
        Ok(())
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "The server took too long to respond".to_string()
    } else if err.is_connect() {
        "Could not connect to the server".to_string()
    } else {
        err.to_string()
    }
}

impl HttpAuthority {
    /// `all-userboard` is the only read endpoint; single-board refreshes go
    /// through it too.
    async fn user_boards(&self, op: RemoteOp, owner: &str) -> Result<Vec<Board>, RemoteError> {
        let list: wire::BoardList = self
            .call_json(
                op,
                Method::POST,
                "all-userboard",
                &wire::UserRequest { user_id: owner },
            )
            .await?;
        log::debug!(
            "[taskboard.http] {} boards for {} ({})",
            list.boards.len(),
            owner,
            list.message.as_deref().unwrap_or("no message")
        );
        Ok(list.boards)
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn list_boards(&self, owner: &str) -> Result<Vec<Board>, RemoteError> {
        self.user_boards(RemoteOp::ListBoards, owner).await
    }

    async fn fetch_board(&self, board_id: &str, owner: &str) -> Result<Board, RemoteError> {
        self.user_boards(RemoteOp::FetchBoard, owner)
            .await?
            .into_iter()
            .find(|b| b.id == board_id)
            .ok_or_else(|| {
                log::warn!("[taskboard.http] board {} not listed for {}", board_id, owner);
                RemoteError::Rejected(format!("Board not found: {}", board_id))
            })
    }

    async fn create_board(&self, owner: &str, name: &str) -> Result<BoardId, RemoteError> {
        let created: wire::BoardCreated = self
            .call_json(
                RemoteOp::CreateBoard,
                Method::POST,
                "create-userboard",
                &wire::CreateBoardRequest {
                    user_id: owner,
                    board_name: name,
                },
            )
            .await?;
        Ok(created.board_id)
    }

    async fn rename_board(&self, board_id: &str, owner: &str, name: &str) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::RenameBoard,
            Method::PUT,
            "update-userboard",
            &wire::RenameBoardRequest {
                user_id: owner,
                board_id,
                board_name: name,
            },
        )
        .await
    }

    async fn delete_board(&self, board_id: &str, owner: &str) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::DeleteBoard,
            Method::DELETE,
            "delete-userboard",
            &wire::DeleteBoardRequest {
                board_id,
                user_id: owner,
            },
        )
        .await
    }

    async fn create_column(&self, board_id: &str, name: &str) -> Result<Created, RemoteError> {
        let created: wire::ColumnCreated = self
            .call_json(
                RemoteOp::CreateColumn,
                Method::POST,
                "create-column",
                &wire::CreateColumnRequest {
                    board_id,
                    column_name: name,
                },
            )
            .await?;
        Ok(Created {
            id: created.column_id,
            position: created.position,
        })
    }

    async fn rename_column(&self, column_id: &str, name: &str) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::RenameColumn,
            Method::PUT,
            "update-column",
            &wire::RenameColumnRequest {
                column_id,
                column_name: name,
            },
        )
        .await
    }

    async fn delete_column(&self, column_id: &str) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::DeleteColumn,
            Method::DELETE,
            "delete-column",
            &wire::ColumnRequest { column_id },
        )
        .await
    }

    async fn create_card(
        &self,
        column_id: &str,
        card: &NewCard,
        owner: &str,
    ) -> Result<Created, RemoteError> {
        let created: wire::CardCreated = self
            .call_json(
                RemoteOp::CreateCard,
                Method::POST,
                "create-card",
                &wire::CreateCardRequest::new(column_id, card, owner),
            )
            .await?;
        Ok(Created {
            id: created.card_id,
            position: created.position,
        })
    }

    async fn update_card(
        &self,
        card_id: &str,
        patch: &CardPatch,
        owner: &str,
    ) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::UpdateCard,
            Method::PUT,
            "update-card",
            &wire::UpdateCardRequest::new(card_id, patch, owner),
        )
        .await
    }

    async fn delete_card(&self, card_id: &str) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::DeleteCard,
            Method::DELETE,
            "delete-card",
            &wire::CardRequest { card_id },
        )
        .await
    }

    async fn move_card(
        &self,
        card_id: &str,
        new_column_id: &str,
        new_position: usize,
    ) -> Result<(), RemoteError> {
        self.call_ack(
            RemoteOp::MoveCard,
            Method::PUT,
            "update-card-position",
            &wire::MoveCardRequest {
                card_id,
                new_column_id,
                new_position,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let auth = HttpAuthority::new(" http://localhost:4000/ ", Duration::from_secs(1)).unwrap();
        assert_eq!(auth.base_url(), "http://localhost:4000");
        assert_eq!(auth.url("create-card"), "http://localhost:4000/api/create-card");
    }

    #[test]
    fn test_base_url_requires_scheme() {
        let err = HttpAuthority::new("localhost:4000", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::InvalidBaseUrl(_)));
    }
}
