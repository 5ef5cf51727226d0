/// Mutation executor: the write path for every intent.
///
/// Each intent runs the same four phases:
/// 1. Snapshot   - capture the smallest slice of the tree needed to undo
/// 2. Optimistic - patch the store synchronously (`dispatch`)
/// 3. Remote     - call the authority exactly once (`settle`)
/// 4. Resolve    - merge server ids/positions and optionally re-fetch, or
///                 restore the snapshot and raise a notice
///
/// Concurrent intents are linearized at dispatch; their resolutions may land
/// in any order and the last one wins. A board reload never lands on a board
/// that still has intents in flight: it is deferred, and the last of those
/// intents to resolve reloads the board instead.

use std::sync::Arc;

use crate::config::{ReconcileMode, ReconcilePolicy};
use crate::error::MutationError;
use crate::events::{Notice, StoreEvent};
use crate::intent::{Confirmation, Intent, IntentKind, MutationPhase};
use crate::position;
use crate::remote::{Created, RemoteAuthority, RemoteError};
use crate::store::{BoardTree, StoreInner};
use crate::types::*;

#[derive(Clone)]
pub(crate) struct Executor {
    store: Arc<StoreInner>,
    remote: Arc<dyn RemoteAuthority>,
    policy: Arc<ReconcilePolicy>,
}

/// The remote half of a dispatched intent, with everything resolved at
/// dispatch time (targets, allocator output, provisional ids).
#[derive(Debug, Clone)]
enum RemoteCall {
    CreateBoard { provisional: BoardId, owner: ActorId, name: String },
    RenameBoard { board_id: BoardId, owner: ActorId, name: String },
    DeleteBoard { board_id: BoardId, owner: ActorId },
    CreateColumn { board_id: BoardId, provisional: ColumnId, name: String },
    RenameColumn { board_id: BoardId, column_id: ColumnId, name: String },
    DeleteColumn { board_id: BoardId, column_id: ColumnId },
    ReorderColumn { board_id: BoardId, column_id: ColumnId, position: usize, persist: bool },
    CreateCard { board_id: BoardId, column_id: ColumnId, provisional: CardId, card: NewCard, owner: ActorId },
    UpdateCard { board_id: BoardId, card_id: CardId, patch: CardPatch, owner: ActorId },
    DeleteCard { board_id: BoardId, card_id: CardId },
    MoveCard { board_id: BoardId, card_id: CardId, to_column: ColumnId, position: usize },
}

impl RemoteCall {
    /// Board whose tree the intent touched (the new one, for board creation).
    fn board_id(&self) -> &str {
        match self {
            RemoteCall::CreateBoard { provisional, .. } => provisional,
            RemoteCall::RenameBoard { board_id, .. }
            | RemoteCall::DeleteBoard { board_id, .. }
            | RemoteCall::CreateColumn { board_id, .. }
            | RemoteCall::RenameColumn { board_id, .. }
            | RemoteCall::DeleteColumn { board_id, .. }
            | RemoteCall::ReorderColumn { board_id, .. }
            | RemoteCall::CreateCard { board_id, .. }
            | RemoteCall::UpdateCard { board_id, .. }
            | RemoteCall::DeleteCard { board_id, .. }
            | RemoteCall::MoveCard { board_id, .. } => board_id,
        }
    }

    /// Owner to re-list boards for after a board-level intent.
    fn owner(&self) -> Option<&str> {
        match self {
            RemoteCall::CreateBoard { owner, .. }
            | RemoteCall::RenameBoard { owner, .. }
            | RemoteCall::DeleteBoard { owner, .. } => Some(owner),
            _ => None,
        }
    }

    fn target_id(&self) -> &str {
        match self {
            RemoteCall::CreateBoard { provisional, .. }
            | RemoteCall::CreateColumn { provisional, .. }
            | RemoteCall::CreateCard { provisional, .. } => provisional,
            RemoteCall::RenameBoard { board_id, .. } | RemoteCall::DeleteBoard { board_id, .. } => {
                board_id
            }
            RemoteCall::RenameColumn { column_id, .. }
            | RemoteCall::DeleteColumn { column_id, .. }
            | RemoteCall::ReorderColumn { column_id, .. } => column_id,
            RemoteCall::UpdateCard { card_id, .. }
            | RemoteCall::DeleteCard { card_id, .. }
            | RemoteCall::MoveCard { card_id, .. } => card_id,
        }
    }

    fn position(&self) -> Option<usize> {
        match self {
            RemoteCall::ReorderColumn { position, .. } | RemoteCall::MoveCard { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }
}

enum Reply {
    Done,
    BoardCreated(BoardId),
    Created(Created),
    LocalOnly,
}

/// Pre-mutation state needed to undo one intent.
#[derive(Debug, Clone)]
enum Snapshot {
    InsertedBoard { board_id: BoardId, selected: Option<BoardId> },
    BoardName { board_id: BoardId, name: String },
    RemovedBoard { index: usize, board: Board, selected: Option<BoardId> },
    InsertedColumn { board_id: BoardId, column_id: ColumnId },
    ColumnName { column_id: ColumnId, name: String },
    /// `column.position` holds the index it was removed from.
    RemovedColumn { board_id: BoardId, column: Column },
    ColumnOrder { board_id: BoardId, order: Vec<ColumnId> },
    InsertedCard { card_id: CardId },
    CardFields { card: Card },
    /// `card.column_id` / `card.position` hold the slot it was removed from.
    RemovedCard { card: Card },
    /// The card as it was before the move, including its original slot.
    MovedCard { card: Card },
}

impl Snapshot {
    /// Put the tree back. Returns false when the affected slice has gone
    /// (e.g. the whole board was removed meanwhile).
    fn restore(&self, tree: &mut BoardTree) -> bool {
        match self {
            Snapshot::InsertedBoard { board_id, selected } => {
                let Some(index) = tree.board_index(board_id) else {
                    return false;
                };
                tree.boards.remove(index);
                if tree.selected.as_deref() == Some(board_id.as_str()) {
                    tree.selected = selected.clone();
                }
                true
            }
            Snapshot::BoardName { board_id, name } => match tree.board_mut(board_id) {
                Some(board) => {
                    board.name = name.clone();
                    true
                }
                None => false,
            },
            Snapshot::RemovedBoard { index, board, selected } => {
                if tree.board_index(&board.id).is_some() {
                    return false;
                }
                let index = (*index).min(tree.boards.len());
                tree.boards.insert(index, board.clone());
                if selected.as_deref() == Some(board.id.as_str()) {
                    tree.selected = selected.clone();
                }
                true
            }
            Snapshot::InsertedColumn { board_id, column_id } => tree
                .board_mut(board_id)
                .and_then(|board| position::remove_by_id(&mut board.columns, column_id))
                .is_some(),
            Snapshot::ColumnName { column_id, name } => match tree.locate_column(column_id) {
                Some((bi, ci)) => {
                    tree.boards[bi].columns[ci].name = name.clone();
                    true
                }
                None => false,
            },
            Snapshot::RemovedColumn { board_id, column } => match tree.board_mut(board_id) {
                Some(board) if board.column(&column.id).is_none() => {
                    position::insert_at(&mut board.columns, column.clone(), column.position);
                    true
                }
                _ => false,
            },
            Snapshot::ColumnOrder { board_id, order } => match tree.board_mut(board_id) {
                Some(board) => {
                    board.columns.sort_by_key(|col| {
                        order
                            .iter()
                            .position(|id| *id == col.id)
                            .unwrap_or(usize::MAX)
                    });
                    position::renumber(&mut board.columns);
                    true
                }
                None => false,
            },
            Snapshot::InsertedCard { card_id } => match tree.locate_card(card_id) {
                Some((bi, ci, _)) => {
                    position::remove_by_id(&mut tree.boards[bi].columns[ci].cards, card_id);
                    true
                }
                None => false,
            },
            Snapshot::CardFields { card } => match tree.locate_card(&card.id) {
                Some((bi, ci, k)) => {
                    let current = &mut tree.boards[bi].columns[ci].cards[k];
                    let placement = (current.column_id.clone(), current.position);
                    *current = card.clone();
                    (current.column_id, current.position) = placement;
                    true
                }
                None => false,
            },
            Snapshot::RemovedCard { card } => {
                if tree.locate_card(&card.id).is_some() {
                    return false;
                }
                match tree.locate_column(&card.column_id) {
                    Some((bi, ci)) => {
                        let cards = &mut tree.boards[bi].columns[ci].cards;
                        position::insert_at(cards, card.clone(), card.position);
                        true
                    }
                    None => false,
                }
            }
            Snapshot::MovedCard { card } => {
                let Some((obi, oci)) = tree.locate_column(&card.column_id) else {
                    return false;
                };
                if let Some((bi, ci, _)) = tree.locate_card(&card.id) {
                    position::remove_by_id(&mut tree.boards[bi].columns[ci].cards, &card.id);
                }
                let cards = &mut tree.boards[obi].columns[oci].cards;
                position::insert_at(cards, card.clone(), card.position);
                true
            }
        }
    }
}

fn require_text(value: &str, what: &str) -> Result<String, MutationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MutationError::Validation(format!("{} cannot be empty", what)));
    }
    Ok(trimmed.to_string())
}

fn reject_provisional(kind: EntityKind, id: &str) -> Result<(), MutationError> {
    if is_provisional(id) {
        return Err(MutationError::Provisional {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Field-level checks that need no store access.
fn validate(intent: Intent) -> Result<Intent, MutationError> {
    Ok(match intent {
        Intent::CreateBoard { owner, name } => Intent::CreateBoard {
            owner: require_text(&owner, "Owner")?,
            name: require_text(&name, "Board name")?,
        },
        Intent::RenameBoard { board_id, owner, name } => Intent::RenameBoard {
            board_id,
            owner: require_text(&owner, "Owner")?,
            name: require_text(&name, "Board name")?,
        },
        Intent::DeleteBoard { board_id, owner } => Intent::DeleteBoard {
            board_id,
            owner: require_text(&owner, "Owner")?,
        },
        Intent::CreateColumn { board_id, name } => Intent::CreateColumn {
            board_id,
            name: require_text(&name, "Column name")?,
        },
        Intent::RenameColumn { column_id, name } => Intent::RenameColumn {
            column_id,
            name: require_text(&name, "Column name")?,
        },
        Intent::CreateCard { column_id, owner, mut card } => {
            card.title = require_text(&card.title, "Card title")?;
            Intent::CreateCard {
                column_id,
                owner: require_text(&owner, "Owner")?,
                card,
            }
        }
        Intent::UpdateCard { card_id, owner, mut patch } => {
            if patch.is_empty() {
                return Err(MutationError::Validation("Nothing to update".to_string()));
            }
            if let Some(title) = patch.title.take() {
                patch.title = Some(require_text(&title, "Card title")?);
            }
            Intent::UpdateCard {
                card_id,
                owner: require_text(&owner, "Owner")?,
                patch,
            }
        }
        other => other,
    })
}

impl Executor {
    pub(crate) fn new(
        store: Arc<StoreInner>,
        remote: Arc<dyn RemoteAuthority>,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            store,
            remote,
            policy: Arc::new(policy),
        }
    }

    /// Validate, snapshot and optimistically apply `intent`.
    ///
    /// Nothing is applied when this returns an error. On success the store
    /// already shows the change and the returned handle owns the remote half.
    pub(crate) fn dispatch(&self, intent: Intent) -> Result<PendingMutation, MutationError> {
        let kind = intent.kind();
        let intent = validate(intent).inspect_err(|e| {
            log::debug!("[taskboard.executor] {} rejected before apply: {}", kind, e);
        })?;
        let persist_reorder = self.remote.supports_column_reorder();

        let (call, snapshot) = self
            .store
            .commit(|tree| {
                let applied = optimistic_apply(tree, intent, persist_reorder)?;
                // Registered under the tree lock, before any reload can see the patch.
                self.store.begin_flight(applied.0.board_id());
                Ok::<_, MutationError>(applied)
            })
            .inspect_err(|e| match e {
                MutationError::NotFound { .. } | MutationError::Provisional { .. } => {
                    log::info!("[taskboard.executor] {} skipped: {}", kind, e)
                }
                _ => log::debug!("[taskboard.executor] {} rejected: {}", kind, e),
            })?;

        self.store.emit(StoreEvent::Mutation {
            kind,
            phase: MutationPhase::Applying,
        });
        log::debug!(
            "[taskboard.executor] {} applied optimistically on {}",
            kind,
            call.target_id()
        );

        Ok(PendingMutation {
            executor: self.clone(),
            kind,
            call,
            snapshot,
            sent: false,
            settled: false,
        })
    }

    async fn call_remote(&self, call: &RemoteCall) -> Result<Reply, RemoteError> {
        let remote = self.remote.as_ref();
        match call {
            RemoteCall::CreateBoard { owner, name, .. } => remote
                .create_board(owner, name)
                .await
                .map(Reply::BoardCreated),
            RemoteCall::RenameBoard { board_id, owner, name } => remote
                .rename_board(board_id, owner, name)
                .await
                .map(|_| Reply::Done),
            RemoteCall::DeleteBoard { board_id, owner } => remote
                .delete_board(board_id, owner)
                .await
                .map(|_| Reply::Done),
            RemoteCall::CreateColumn { board_id, name, .. } => remote
                .create_column(board_id, name)
                .await
                .map(Reply::Created),
            RemoteCall::RenameColumn { column_id, name, .. } => remote
                .rename_column(column_id, name)
                .await
                .map(|_| Reply::Done),
            RemoteCall::DeleteColumn { column_id, .. } => remote
                .delete_column(column_id)
                .await
                .map(|_| Reply::Done),
            RemoteCall::ReorderColumn { persist: false, .. } => Ok(Reply::LocalOnly),
            RemoteCall::ReorderColumn { column_id, position, .. } => remote
                .reorder_column(column_id, *position)
                .await
                .map(|_| Reply::Done),
            RemoteCall::CreateCard { column_id, card, owner, .. } => remote
                .create_card(column_id, card, owner)
                .await
                .map(Reply::Created),
            RemoteCall::UpdateCard { card_id, patch, owner, .. } => remote
                .update_card(card_id, patch, owner)
                .await
                .map(|_| Reply::Done),
            RemoteCall::DeleteCard { card_id, .. } => remote
                .delete_card(card_id)
                .await
                .map(|_| Reply::Done),
            RemoteCall::MoveCard { card_id, to_column, position, .. } => remote
                .move_card(card_id, to_column, *position)
                .await
                .map(|_| Reply::Done),
        }
    }

    /// Phase 4. Confirm or roll back, release the board, then reload it if
    /// the policy asks for it or a reload was deferred meanwhile.
    async fn resolve(
        &self,
        kind: IntentKind,
        call: &RemoteCall,
        snapshot: &Snapshot,
        result: Result<Reply, RemoteError>,
    ) -> Result<Confirmation, MutationError> {
        let outcome = match result {
            Ok(reply) => Ok(self.confirm(kind, call, reply)),
            Err(err) => Err(self.roll_back(kind, snapshot, err)),
        };
        let stale = self.store.end_flight(call.board_id());

        match outcome {
            Ok((mut confirmation, board_id)) => {
                let wants_refetch = !confirmation.local_only
                    && self.policy.mode_for(kind) == ReconcileMode::PatchThenRefetch;
                if wants_refetch {
                    confirmation.refetched = self.refetch(kind, call.owner(), &board_id).await;
                } else if stale {
                    self.catch_up(&board_id).await;
                }
                Ok(confirmation)
            }
            Err(err) => {
                if stale {
                    self.catch_up(call.board_id()).await;
                }
                Err(err)
            }
        }
    }

    /// Merge what the authority assigned. Also returns the board the intent
    /// now lives on, which differs from the dispatched one for new boards.
    fn confirm(&self, kind: IntentKind, call: &RemoteCall, reply: Reply) -> (Confirmation, BoardId) {
        let mut confirmation = Confirmation {
            kind,
            entity_id: Some(call.target_id().to_string()),
            position: call.position(),
            refetched: false,
            local_only: matches!(reply, Reply::LocalOnly),
        };

        let mut board_id = call.board_id().to_string();
        match (call, reply) {
            (RemoteCall::CreateBoard { provisional, .. }, Reply::BoardCreated(id)) => {
                let _ = self.store.commit(|tree| {
                    adopt_board_id(tree, provisional, &id);
                    Ok::<_, ()>(())
                });
                board_id = id.clone();
                confirmation.entity_id = Some(id);
            }
            (
                RemoteCall::CreateColumn {
                    board_id: owner_board,
                    provisional,
                    name,
                },
                Reply::Created(created),
            ) => {
                let _ = self.store.commit(|tree| {
                    adopt_column_id(tree, owner_board, provisional, name, &created);
                    Ok::<_, ()>(())
                });
                confirmation.entity_id = Some(created.id);
                confirmation.position = Some(created.position);
            }
            (
                RemoteCall::CreateCard {
                    column_id,
                    provisional,
                    card,
                    owner,
                    ..
                },
                Reply::Created(created),
            ) => {
                let _ = self.store.commit(|tree| {
                    adopt_card_id(tree, column_id, provisional, card, owner, &created);
                    Ok::<_, ()>(())
                });
                confirmation.entity_id = Some(created.id);
                confirmation.position = Some(created.position);
            }
            _ => {}
        }

        self.store.emit(StoreEvent::Mutation {
            kind,
            phase: MutationPhase::Confirmed,
        });
        log::debug!("[taskboard.executor] {} confirmed", kind);
        (confirmation, board_id)
    }

    /// Policy-driven reload after a confirmation. True when fresh state landed.
    async fn refetch(&self, kind: IntentKind, owner: Option<&str>, board_id: &str) -> bool {
        let refreshed = match owner {
            Some(owner) => self.reload_boards(owner).await.map(|_| true),
            None => self.reload_board(board_id).await,
        };
        refreshed.unwrap_or_else(|e| {
            log::warn!(
                "[taskboard.executor] refetch after {} failed, keeping patched state: {}",
                kind,
                e
            );
            false
        })
    }

    /// Reload a board whose refresh was skipped while intents were in flight.
    async fn catch_up(&self, board_id: &str) {
        log::debug!("[taskboard.executor] catching up on board {}", board_id);
        if let Err(e) = self.reload_board(board_id).await {
            log::warn!(
                "[taskboard.executor] deferred refresh of board {} failed: {}",
                board_id,
                e
            );
        }
    }

    /// Restore the snapshot, tell the user, and report the failure.
    fn roll_back(&self, kind: IntentKind, snapshot: &Snapshot, err: RemoteError) -> MutationError {
        let restored = self.store.commit(|tree| Ok::<_, ()>(snapshot.restore(tree)));
        if restored != Ok(true) {
            log::warn!(
                "[taskboard.executor] {} rollback found nothing to restore",
                kind
            );
        }
        self.store.emit(StoreEvent::Mutation {
            kind,
            phase: MutationPhase::RolledBack,
        });
        log::warn!("[taskboard.executor] {} rolled back: {}", kind, err);
        self.notify_failure(Some(kind), &err);
        MutationError::from(err)
    }

    fn notify_failure(&self, kind: Option<IntentKind>, err: &RemoteError) {
        let message = match err.message().trim() {
            "" => self.policy.fallback_message.clone(),
            m => m.to_string(),
        };
        self.store.emit(StoreEvent::Notice(Notice::error(message, kind)));
    }

    /// `None` when the board is not in the tree; `Some(None)` when it has no owner.
    fn board_owner(&self, board_id: &str) -> Option<Option<ActorId>> {
        self.store.read(|tree| {
            tree.boards
                .iter()
                .find(|b| b.id == board_id)
                .map(|b| b.owner.clone())
        })
    }

    async fn reload_boards(&self, owner: &str) -> Result<(), RemoteError> {
        let boards = self.remote.list_boards(owner).await?;
        let _ = self.store.commit(|tree| {
            let busy = self.store.defer_busy();
            if !busy.is_empty() {
                log::debug!(
                    "[taskboard.executor] keeping local copy of {} board(s) with intents in flight",
                    busy.len()
                );
            }
            tree.merge_boards(boards, &busy);
            Ok::<_, ()>(())
        });
        Ok(())
    }

    /// Re-fetch one board. `Ok(false)` when nothing was replaced: the board
    /// is gone locally, has no owner to look it up by, or has intents in
    /// flight (it is then marked for a later reload).
    async fn reload_board(&self, board_id: &str) -> Result<bool, RemoteError> {
        let Some(Some(owner)) = self.board_owner(board_id) else {
            log::debug!(
                "[taskboard.executor] board {} not tracked or ownerless, skipping refresh",
                board_id
            );
            return Ok(false);
        };
        let board = self.remote.fetch_board(board_id, &owner).await?;
        let replaced = self.store.commit(|tree| {
            if self.store.defer_if_busy(board_id) {
                log::debug!(
                    "[taskboard.executor] refresh of board {} deferred, intents in flight",
                    board_id
                );
                return Ok::<_, ()>(false);
            }
            if !tree.replace_board(board) {
                log::debug!(
                    "[taskboard.executor] board {} dropped locally before refresh landed",
                    board_id
                );
                return Ok(false);
            }
            Ok(true)
        });
        Ok(replaced.unwrap_or(false))
    }

    pub(crate) async fn sync_boards(&self, owner: &str) -> Result<(), MutationError> {
        self.reload_boards(owner).await.map_err(|e| {
            log::warn!("[taskboard.executor] listing boards for {} failed: {}", owner, e);
            self.notify_failure(None, &e);
            MutationError::from(e)
        })
    }

    pub(crate) async fn refresh_board(&self, board_id: &str) -> Result<(), MutationError> {
        match self.board_owner(board_id) {
            None => return Err(MutationError::not_found(EntityKind::Board, board_id)),
            Some(None) => {
                return Err(MutationError::Validation(format!(
                    "Board {} has no owner to refresh it for",
                    board_id
                )))
            }
            Some(Some(_)) => {}
        }
        self.reload_board(board_id).await.map(|_| ()).map_err(|e| {
            log::warn!("[taskboard.executor] refreshing board {} failed: {}", board_id, e);
            self.notify_failure(None, &e);
            MutationError::from(e)
        })
    }

    /// Reload after an interrupted mutation, in the background.
    fn spawn_resync(&self, board_id: &str, owner: Option<&str>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!(
                "[taskboard.executor] no runtime to reload board {} on",
                board_id
            );
            return;
        };
        let executor = self.clone();
        let board_id = board_id.to_string();
        let owner = owner.map(str::to_string);
        handle.spawn(async move {
            match owner {
                Some(owner) => {
                    if let Err(e) = executor.reload_boards(&owner).await {
                        log::warn!("[taskboard.executor] resync for {} failed: {}", owner, e);
                    }
                }
                None => executor.catch_up(&board_id).await,
            }
        });
    }
}

/// Phase 1 and 2 for one intent, run inside a single store commit.
fn optimistic_apply(
    tree: &mut BoardTree,
    intent: Intent,
    persist_reorder: bool,
) -> Result<(RemoteCall, Snapshot), MutationError> {
    match intent {
        Intent::CreateBoard { owner, name } => {
            let provisional = provisional_id(EntityKind::Board);
            let snapshot = Snapshot::InsertedBoard {
                board_id: provisional.clone(),
                selected: tree.selected.clone(),
            };
            tree.boards
                .push(Board::new(provisional.clone(), name.clone(), Some(owner.clone())));
            if tree.selected_board().is_none() {
                tree.selected = Some(provisional.clone());
            }
            Ok((RemoteCall::CreateBoard { provisional, owner, name }, snapshot))
        }

        Intent::RenameBoard { board_id, owner, name } => {
            let board = tree
                .board_mut(&board_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Board, &board_id))?;
            reject_provisional(EntityKind::Board, &board_id)?;
            let snapshot = Snapshot::BoardName {
                board_id: board_id.clone(),
                name: std::mem::replace(&mut board.name, name.clone()),
            };
            Ok((RemoteCall::RenameBoard { board_id, owner, name }, snapshot))
        }

        Intent::DeleteBoard { board_id, owner } => {
            let index = tree
                .board_index(&board_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Board, &board_id))?;
            reject_provisional(EntityKind::Board, &board_id)?;
            let selected = tree.selected.clone();
            let board = tree.boards.remove(index);
            if selected.as_deref() == Some(board_id.as_str()) {
                tree.selected = tree.boards.first().map(|b| b.id.clone());
            }
            let snapshot = Snapshot::RemovedBoard { index, board, selected };
            Ok((RemoteCall::DeleteBoard { board_id, owner }, snapshot))
        }

        Intent::CreateColumn { board_id, name } => {
            let board = tree
                .board_mut(&board_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Board, &board_id))?;
            reject_provisional(EntityKind::Board, &board_id)?;
            let provisional = provisional_id(EntityKind::Column);
            let column = Column::new(provisional.clone(), board_id.clone(), name.clone());
            let len = board.columns.len();
            position::insert_at(&mut board.columns, column, len);
            let snapshot = Snapshot::InsertedColumn {
                board_id: board_id.clone(),
                column_id: provisional.clone(),
            };
            Ok((RemoteCall::CreateColumn { board_id, provisional, name }, snapshot))
        }

        Intent::RenameColumn { column_id, name } => {
            let (bi, ci) = tree
                .locate_column(&column_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Column, &column_id))?;
            reject_provisional(EntityKind::Column, &column_id)?;
            let board = &mut tree.boards[bi];
            let previous = std::mem::replace(&mut board.columns[ci].name, name.clone());
            let snapshot = Snapshot::ColumnName {
                column_id: column_id.clone(),
                name: previous,
            };
            let board_id = board.id.clone();
            Ok((RemoteCall::RenameColumn { board_id, column_id, name }, snapshot))
        }

        Intent::DeleteColumn { column_id } => {
            let (bi, _) = tree
                .locate_column(&column_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Column, &column_id))?;
            reject_provisional(EntityKind::Column, &column_id)?;
            let board = &mut tree.boards[bi];
            let board_id = board.id.clone();
            let Some((index, mut column)) = position::remove_by_id(&mut board.columns, &column_id)
            else {
                return Err(MutationError::not_found(EntityKind::Column, &column_id));
            };
            column.position = index;
            let snapshot = Snapshot::RemovedColumn {
                board_id: board_id.clone(),
                column,
            };
            Ok((RemoteCall::DeleteColumn { board_id, column_id }, snapshot))
        }

        Intent::ReorderColumn { column_id, index } => {
            let (bi, _) = tree
                .locate_column(&column_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Column, &column_id))?;
            reject_provisional(EntityKind::Column, &column_id)?;
            let board = &mut tree.boards[bi];
            let order = board.columns.iter().map(|c| c.id.clone()).collect();
            let position = position::move_within(&mut board.columns, &column_id, index)
                .ok_or_else(|| MutationError::not_found(EntityKind::Column, &column_id))?;
            let board_id = board.id.clone();
            let snapshot = Snapshot::ColumnOrder {
                board_id: board_id.clone(),
                order,
            };
            Ok((
                RemoteCall::ReorderColumn {
                    board_id,
                    column_id,
                    position,
                    persist: persist_reorder,
                },
                snapshot,
            ))
        }

        Intent::CreateCard { column_id, owner, card } => {
            let (bi, ci) = tree
                .locate_column(&column_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Column, &column_id))?;
            reject_provisional(EntityKind::Column, &column_id)?;
            let provisional = provisional_id(EntityKind::Card);
            let board = &mut tree.boards[bi];
            let board_id = board.id.clone();
            let cards = &mut board.columns[ci].cards;
            let local = card
                .clone()
                .into_card(provisional.clone(), column_id.clone(), owner.clone());
            let len = cards.len();
            position::insert_at(cards, local, len);
            let snapshot = Snapshot::InsertedCard {
                card_id: provisional.clone(),
            };
            Ok((
                RemoteCall::CreateCard {
                    board_id,
                    column_id,
                    provisional,
                    card,
                    owner,
                },
                snapshot,
            ))
        }

        Intent::UpdateCard { card_id, owner, patch } => {
            let (bi, ci, k) = tree
                .locate_card(&card_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Card, &card_id))?;
            reject_provisional(EntityKind::Card, &card_id)?;
            let board = &mut tree.boards[bi];
            let board_id = board.id.clone();
            let card = &mut board.columns[ci].cards[k];
            let snapshot = Snapshot::CardFields { card: card.clone() };
            patch.apply_to(card);
            Ok((
                RemoteCall::UpdateCard {
                    board_id,
                    card_id,
                    patch,
                    owner,
                },
                snapshot,
            ))
        }

        Intent::DeleteCard { card_id } => {
            let (bi, ci, _) = tree
                .locate_card(&card_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Card, &card_id))?;
            reject_provisional(EntityKind::Card, &card_id)?;
            let board = &mut tree.boards[bi];
            let board_id = board.id.clone();
            let Some((index, mut card)) = position::remove_by_id(&mut board.columns[ci].cards, &card_id)
            else {
                return Err(MutationError::not_found(EntityKind::Card, &card_id));
            };
            card.position = index;
            Ok((
                RemoteCall::DeleteCard { board_id, card_id },
                Snapshot::RemovedCard { card },
            ))
        }

        Intent::MoveCard { card_id, to_column, index } => {
            let (bi, ci, k) = tree
                .locate_card(&card_id)
                .ok_or_else(|| MutationError::not_found(EntityKind::Card, &card_id))?;
            let (tbi, tci) = tree
                .locate_column(&to_column)
                .ok_or_else(|| MutationError::not_found(EntityKind::Column, &to_column))?;
            reject_provisional(EntityKind::Card, &card_id)?;
            reject_provisional(EntityKind::Column, &to_column)?;
            if tbi != bi {
                return Err(MutationError::Validation(
                    "Cards can only move between columns of the same board".to_string(),
                ));
            }

            let board = &mut tree.boards[bi];
            let board_id = board.id.clone();
            let snapshot = Snapshot::MovedCard {
                card: board.columns[ci].cards[k].clone(),
            };
            let moved = if ci == tci {
                position::move_within(&mut board.columns[ci].cards, &card_id, index)
            } else {
                let (source, target) = position::pair_mut(&mut board.columns, ci, tci);
                position::move_across(&mut source.cards, &mut target.cards, &to_column, &card_id, index)
            };
            let position = moved.ok_or_else(|| MutationError::not_found(EntityKind::Card, &card_id))?;
            Ok((
                RemoteCall::MoveCard {
                    board_id,
                    card_id,
                    to_column,
                    position,
                },
                snapshot,
            ))
        }
    }
}

fn adopt_board_id(tree: &mut BoardTree, provisional: &str, id: &str) {
    let Some(board) = tree.board_mut(provisional) else {
        log::debug!("[taskboard.executor] provisional board {} gone before confirm", provisional);
        return;
    };
    board.id = id.to_string();
    for col in board.columns.iter_mut() {
        col.board_id = id.to_string();
    }
    if tree.selected.as_deref() == Some(provisional) {
        tree.selected = Some(id.to_string());
    }
}

fn adopt_column_id(
    tree: &mut BoardTree,
    board_id: &str,
    provisional: &str,
    name: &str,
    created: &Created,
) {
    let Some(board) = tree.board_mut(board_id) else {
        log::debug!("[taskboard.executor] board {} gone before column confirm", board_id);
        return;
    };
    if let Some(column) = board.columns.iter_mut().find(|c| c.id == provisional) {
        column.id = created.id.clone();
        for card in column.cards.iter_mut() {
            card.column_id = created.id.clone();
        }
        position::move_within(&mut board.columns, &created.id, created.position);
    } else if board.column(&created.id).is_none() {
        log::debug!(
            "[taskboard.executor] provisional column {} gone before confirm, inserting {}",
            provisional,
            created.id
        );
        let column = Column::new(created.id.clone(), board_id, name);
        position::insert_at(&mut board.columns, column, created.position);
    }
}

fn adopt_card_id(
    tree: &mut BoardTree,
    column_id: &str,
    provisional: &str,
    card: &NewCard,
    owner: &str,
    created: &Created,
) {
    if let Some((bi, ci, k)) = tree.locate_card(provisional) {
        let cards = &mut tree.boards[bi].columns[ci].cards;
        cards[k].id = created.id.clone();
        position::move_within(cards, &created.id, created.position);
        return;
    }
    if tree.locate_card(&created.id).is_some() {
        return;
    }
    let Some((bi, ci)) = tree.locate_column(column_id) else {
        log::debug!(
            "[taskboard.executor] column {} gone, dropping confirmed card {}",
            column_id,
            created.id
        );
        return;
    };
    log::debug!(
        "[taskboard.executor] provisional card {} gone before confirm, inserting {}",
        provisional,
        created.id
    );
    let confirmed = card
        .clone()
        .into_card(created.id.clone(), column_id.to_string(), owner.to_string());
    position::insert_at(&mut tree.boards[bi].columns[ci].cards, confirmed, created.position);
}

/// A dispatched intent whose remote half has not run yet.
///
/// Dropping it without settling rolls the optimistic change back. If the
/// `settle` future is dropped after the request went out, the outcome on the
/// server is unknown: the user gets a notice and the board is reloaded in the
/// background when a tokio runtime is available.
#[must_use = "the remote call only happens when the mutation is settled"]
pub struct PendingMutation {
    executor: Executor,
    kind: IntentKind,
    call: RemoteCall,
    snapshot: Snapshot,
    sent: bool,
    settled: bool,
}

impl PendingMutation {
    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    /// Id of the targeted entity; a provisional id for creations.
    pub fn target_id(&self) -> &str {
        self.call.target_id()
    }

    /// Call the authority once and resolve: confirm and merge on success,
    /// restore the snapshot and raise a notice on failure.
    pub async fn settle(mut self) -> Result<Confirmation, MutationError> {
        self.sent = true;
        let result = self.executor.call_remote(&self.call).await;
        self.settled = true;
        self.executor
            .resolve(self.kind, &self.call, &self.snapshot, result)
            .await
    }
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let store = &self.executor.store;
        let _ = store.commit(|tree| Ok::<_, ()>(self.snapshot.restore(tree)));
        let stale = store.end_flight(self.call.board_id());
        store.emit(StoreEvent::Mutation {
            kind: self.kind,
            phase: MutationPhase::RolledBack,
        });

        if self.sent {
            log::warn!(
                "[taskboard.executor] {} on {} interrupted before the authority answered, reverting and reloading",
                self.kind,
                self.call.target_id()
            );
            store.emit(StoreEvent::Notice(Notice::info(
                "A change was interrupted before the server confirmed it. Reloading the board.",
                Some(self.kind),
            )));
        } else {
            log::debug!(
                "[taskboard.executor] {} on {} dropped before it was sent, reverted",
                self.kind,
                self.call.target_id()
            );
        }

        if self.sent || stale {
            self.executor
                .spawn_resync(self.call.board_id(), self.call.owner());
        }
    }
}
