/// Typed mutation requests and their resolutions.
///
/// Every write to the board store is described by one `Intent`. The executor
/// turns an intent into a snapshot, an optimistic patch and exactly one call
/// on the remote authority.
use serde::{Deserialize, Serialize};

use crate::types::{ActorId, BoardId, CardId, CardPatch, ColumnId, NewCard};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Intent {
    CreateBoard {
        owner: ActorId,
        name: String,
    },
    RenameBoard {
        board_id: BoardId,
        owner: ActorId,
        name: String,
    },
    DeleteBoard {
        board_id: BoardId,
        owner: ActorId,
    },
    CreateColumn {
        board_id: BoardId,
        name: String,
    },
    RenameColumn {
        column_id: ColumnId,
        name: String,
    },
    DeleteColumn {
        column_id: ColumnId,
    },
    /// Local column reorder; persisted only if the authority supports it.
    ReorderColumn {
        column_id: ColumnId,
        index: usize,
    },
    CreateCard {
        column_id: ColumnId,
        owner: ActorId,
        card: NewCard,
    },
    UpdateCard {
        card_id: CardId,
        owner: ActorId,
        patch: CardPatch,
    },
    DeleteCard {
        card_id: CardId,
    },
    /// Same-column reorder when `to_column` is the card's current column,
    /// cross-column move otherwise.
    MoveCard {
        card_id: CardId,
        to_column: ColumnId,
        index: usize,
    },
}

/// Intent discriminant, used to key the reconcile policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
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

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::CreateBoard { .. } => IntentKind::CreateBoard,
            Intent::RenameBoard { .. } => IntentKind::RenameBoard,
            Intent::DeleteBoard { .. } => IntentKind::DeleteBoard,
            Intent::CreateColumn { .. } => IntentKind::CreateColumn,
            Intent::RenameColumn { .. } => IntentKind::RenameColumn,
            Intent::DeleteColumn { .. } => IntentKind::DeleteColumn,
            Intent::ReorderColumn { .. } => IntentKind::ReorderColumn,
            Intent::CreateCard { .. } => IntentKind::CreateCard,
            Intent::UpdateCard { .. } => IntentKind::UpdateCard,
            Intent::DeleteCard { .. } => IntentKind::DeleteCard,
            Intent::MoveCard { .. } => IntentKind::MoveCard,
        }
    }
}

impl IntentKind {
    pub const ALL: [IntentKind; 11] = [
        IntentKind::CreateBoard,
        IntentKind::RenameBoard,
        IntentKind::DeleteBoard,
        IntentKind::CreateColumn,
        IntentKind::RenameColumn,
        IntentKind::DeleteColumn,
        IntentKind::ReorderColumn,
        IntentKind::CreateCard,
        IntentKind::UpdateCard,
        IntentKind::DeleteCard,
        IntentKind::MoveCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::CreateBoard => "create_board",
            IntentKind::RenameBoard => "rename_board",
            IntentKind::DeleteBoard => "delete_board",
            IntentKind::CreateColumn => "create_column",
            IntentKind::RenameColumn => "rename_column",
            IntentKind::DeleteColumn => "delete_column",
            IntentKind::ReorderColumn => "reorder_column",
            IntentKind::CreateCard => "create_card",
            IntentKind::UpdateCard => "update_card",
            IntentKind::DeleteCard => "delete_card",
            IntentKind::MoveCard => "move_card",
        }
    }

    /// Board-level intents touch the board list rather than a single board tree.
    pub fn is_board_level(&self) -> bool {
        matches!(
            self,
            IntentKind::CreateBoard | IntentKind::RenameBoard | IntentKind::DeleteBoard
        )
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single intent once dispatched: `Applying → Confirmed | RolledBack`.
/// An intent with no pending mutation is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPhase {
    Applying,
    Confirmed,
    RolledBack,
}

/// What a confirmed intent produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub kind: IntentKind,
    /// Authoritative id of the entity the intent created or targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Final position of the created or moved entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// The board was re-fetched from the authority after the patch.
    pub refetched: bool,
    /// The authority was not called (local-only reorder).
    pub local_only: bool,
}
