pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Board, BoardId, CardPatch, NewCard};

/// The remote authority that owns ground truth.
/// Implementations: `MemoryAuthority` (in-process), `HttpAuthority` in the client crate.
///
/// Every call resolves to success or a `RemoteError`; timeouts are the
/// implementation's business.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// All boards owned by `owner`, with their columns and cards.
    async fn list_boards(&self, owner: &str) -> Result<Vec<Board>, RemoteError>;

    /// Full-tree refresh of a single board, looked up among `owner`'s boards.
    /// A board the owner no longer has is `Rejected`.
    async fn fetch_board(&self, board_id: &str, owner: &str) -> Result<Board, RemoteError>;

    async fn create_board(&self, owner: &str, name: &str) -> Result<BoardId, RemoteError>;

    async fn rename_board(&self, board_id: &str, owner: &str, name: &str)
        -> Result<(), RemoteError>;

    async fn delete_board(&self, board_id: &str, owner: &str) -> Result<(), RemoteError>;

    async fn create_column(&self, board_id: &str, name: &str) -> Result<Created, RemoteError>;

    async fn rename_column(&self, column_id: &str, name: &str) -> Result<(), RemoteError>;

    async fn delete_column(&self, column_id: &str) -> Result<(), RemoteError>;

    /// Whether column order can be persisted. Without it, column reorders stay local.
    fn supports_column_reorder(&self) -> bool {
        false
    }

    async fn reorder_column(&self, column_id: &str, position: usize) -> Result<(), RemoteError> {
        let _ = position;
        Err(RemoteError::Rejected(format!(
            "column reorder is not supported (column {})",
            column_id
        )))
    }

    async fn create_card(
        &self,
        column_id: &str,
        card: &NewCard,
        owner: &str,
    ) -> Result<Created, RemoteError>;

    async fn update_card(
        &self,
        card_id: &str,
        patch: &CardPatch,
        owner: &str,
    ) -> Result<(), RemoteError>;

    async fn delete_card(&self, card_id: &str) -> Result<(), RemoteError>;

    async fn move_card(
        &self,
        card_id: &str,
        new_column_id: &str,
        new_position: usize,
    ) -> Result<(), RemoteError>;
}

/// Authoritative id and position issued for a newly created column or card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub id: String,
    pub position: usize,
}

/// Remote operations, for logging and test instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOp {
    ListBoards,
    FetchBoard,
    CreateBoard,
    RenameBoard,
    DeleteBoard,
    CreateColumn,
    RenameColumn,
    DeleteColumn,
    ReorderColumn,
    CreateCard,
    UpdateCard,
    DeleteCard,
    MoveCard,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The authority answered and refused the change.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// The authority could not be reached (transport failure, timeout).
    #[error("Server unreachable: {0}")]
    Unreachable(String),
}

impl RemoteError {
    /// The server-provided message, if any.
    pub fn message(&self) -> &str {
        match self {
            RemoteError::Rejected(m) | RemoteError::Unreachable(m) => m,
        }
    }
}
