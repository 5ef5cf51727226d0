/// In-process remote authority.
///
/// Holds boards in memory and behaves like the REST service the client talks
/// to:
/// - Monotonic numeric ids for every created entity
/// - Server-side position allocation (append on create, renumber on delete/move)
/// - Scripted failures per operation, consumed in FIFO order
/// - Optional gates that hold an operation in flight until released
/// - Per-operation call counters

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{Created, RemoteAuthority, RemoteError, RemoteOp};
use crate::position;
use crate::types::*;

pub struct MemoryAuthority {
    /// Boards in creation order.
    boards: RwLock<Vec<Board>>,
    next_id: AtomicU64,
    failures: Mutex<HashMap<RemoteOp, VecDeque<RemoteError>>>,
    gates: Mutex<HashMap<RemoteOp, Arc<Semaphore>>>,
    calls: Mutex<HashMap<RemoteOp, usize>>,
    column_reorder: bool,
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthority {
    pub fn new() -> Self {
        Self {
            boards: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            column_reorder: false,
        }
    }

    /// Advertise (and honour) persisted column reorders.
    pub fn with_column_reorder(mut self, enabled: bool) -> Self {
        self.column_reorder = enabled;
        self
    }

    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Insert a board as-is (positions are repaired). Ids in the seeded board
    /// should not collide with ids this authority issues; issued ids start at 1,
    /// so seed with non-numeric or large ids.
    pub fn seed(&self, mut board: Board) {
        position::repair(&mut board.columns);
        for col in board.columns.iter_mut() {
            col.board_id = board.id.clone();
            position::repair(&mut col.cards);
            for card in col.cards.iter_mut() {
                card.column_id = col.id.clone();
            }
        }
        let mut boards = self.boards.write().unwrap();
        boards.retain(|b| b.id != board.id);
        boards.push(board);
    }

    /// Current server-side copy of a board.
    pub fn board(&self, board_id: &str) -> Option<Board> {
        self.boards
            .read()
            .unwrap()
            .iter()
            .find(|b| b.id == board_id)
            .cloned()
    }

    /// Make the next call to `op` fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Hold every subsequent call to `op` until a permit is added to the
    /// returned semaphore (one permit releases one call).
    pub fn hold(&self, op: RemoteOp) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(op)
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    pub fn calls(&self, op: RemoteOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Count the call, wait at the gate if one is set, then pop a scripted failure.
    async fn enter(&self, op: RemoteOp) -> Result<(), RemoteError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;

        let gate = self.gates.lock().unwrap().get(&op).cloned();
        if let Some(gate) = gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(RemoteError::Unreachable("gate closed".to_string())),
            }
        }

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(err) => {
                log::debug!("[taskboard.memory] {:?} failing as scripted: {}", op, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn with_board_mut<R>(
        &self,
        board_id: &str,
        f: impl FnOnce(&mut Board) -> Result<R, RemoteError>,
    ) -> Result<R, RemoteError> {
        let mut boards = self.boards.write().unwrap();
        let board = boards
            .iter_mut()
            .find(|b| b.id == board_id)
            .ok_or_else(|| RemoteError::Rejected(format!("Board not found: {}", board_id)))?;
        f(board)
    }

    fn with_column_mut<R>(
        &self,
        column_id: &str,
        f: impl FnOnce(&mut Board, usize) -> Result<R, RemoteError>,
    ) -> Result<R, RemoteError> {
        let mut boards = self.boards.write().unwrap();
        for board in boards.iter_mut() {
            if let Some(index) = board.columns.iter().position(|c| c.id == column_id) {
                return f(board, index);
            }
        }
        Err(RemoteError::Rejected(format!("Column not found: {}", column_id)))
    }

    fn with_card_mut<R>(
        &self,
        card_id: &str,
        f: impl FnOnce(&mut Board, usize, usize) -> Result<R, RemoteError>,
    ) -> Result<R, RemoteError> {
        let mut boards = self.boards.write().unwrap();
        for board in boards.iter_mut() {
            if let Some((ci, k)) = board.find_card(card_id) {
                return f(board, ci, k);
            }
        }
        Err(RemoteError::Rejected(format!("Card not found: {}", card_id)))
    }
}

fn require_name(name: &str, what: &str) -> Result<(), RemoteError> {
    if name.trim().is_empty() {
        return Err(RemoteError::Rejected(format!("{} cannot be empty", what)));
    }
    Ok(())
}

#[async_trait]
impl RemoteAuthority for MemoryAuthority {
    async fn list_boards(&self, owner: &str) -> Result<Vec<Board>, RemoteError> {
        self.enter(RemoteOp::ListBoards).await?;
        Ok(self
            .boards
            .read()
            .unwrap()
            .iter()
            .filter(|b| b.owner.as_deref() == Some(owner))
            .cloned()
            .collect())
    }

    async fn fetch_board(&self, board_id: &str, owner: &str) -> Result<Board, RemoteError> {
        self.enter(RemoteOp::FetchBoard).await?;
        self.board(board_id)
            .filter(|b| b.owner.as_deref() == Some(owner))
            .ok_or_else(|| RemoteError::Rejected(format!("Board not found: {}", board_id)))
    }

    async fn create_board(&self, owner: &str, name: &str) -> Result<BoardId, RemoteError> {
        self.enter(RemoteOp::CreateBoard).await?;
        require_name(name, "Board name")?;
        let id = self.next_id();
        self.boards
            .write()
            .unwrap()
            .push(Board::new(id.clone(), name.trim(), Some(owner.to_string())));
        Ok(id)
    }

    async fn rename_board(
        &self,
        board_id: &str,
        owner: &str,
        name: &str,
    ) -> Result<(), RemoteError> {
        self.enter(RemoteOp::RenameBoard).await?;
        require_name(name, "Board name")?;
        self.with_board_mut(board_id, |board| {
            if board.owner.as_deref() != Some(owner) {
                return Err(RemoteError::Rejected("Not the board owner".to_string()));
            }
            board.name = name.trim().to_string();
            Ok(())
        })
    }

    async fn delete_board(&self, board_id: &str, owner: &str) -> Result<(), RemoteError> {
        self.enter(RemoteOp::DeleteBoard).await?;
        let mut boards = self.boards.write().unwrap();
        let index = boards
            .iter()
            .position(|b| b.id == board_id)
            .ok_or_else(|| RemoteError::Rejected(format!("Board not found: {}", board_id)))?;
        if boards[index].owner.as_deref() != Some(owner) {
            return Err(RemoteError::Rejected("Not the board owner".to_string()));
        }
        boards.remove(index);
        Ok(())
    }

    async fn create_column(&self, board_id: &str, name: &str) -> Result<Created, RemoteError> {
        self.enter(RemoteOp::CreateColumn).await?;
        require_name(name, "Column name")?;
        let id = self.next_id();
        self.with_board_mut(board_id, |board| {
            let column = Column::new(id.clone(), board_id, name.trim());
            let len = board.columns.len();
            let position = position::insert_at(&mut board.columns, column, len);
            Ok(Created { id, position })
        })
    }

    async fn rename_column(&self, column_id: &str, name: &str) -> Result<(), RemoteError> {
        self.enter(RemoteOp::RenameColumn).await?;
        require_name(name, "Column name")?;
        self.with_column_mut(column_id, |board, index| {
            board.columns[index].name = name.trim().to_string();
            Ok(())
        })
    }

    async fn delete_column(&self, column_id: &str) -> Result<(), RemoteError> {
        self.enter(RemoteOp::DeleteColumn).await?;
        self.with_column_mut(column_id, |board, _| {
            position::remove_by_id(&mut board.columns, column_id);
            Ok(())
        })
    }

    fn supports_column_reorder(&self) -> bool {
        self.column_reorder
    }

    async fn reorder_column(&self, column_id: &str, position: usize) -> Result<(), RemoteError> {
        self.enter(RemoteOp::ReorderColumn).await?;
        if !self.column_reorder {
            return Err(RemoteError::Rejected("column reorder is not supported".to_string()));
        }
        self.with_column_mut(column_id, |board, _| {
            position::move_within(&mut board.columns, column_id, position);
            Ok(())
        })
    }

    async fn create_card(
        &self,
        column_id: &str,
        card: &NewCard,
        owner: &str,
    ) -> Result<Created, RemoteError> {
        self.enter(RemoteOp::CreateCard).await?;
        let id = self.next_id();
        self.with_column_mut(column_id, |board, index| {
            let new_card = card
                .clone()
                .into_card(id.clone(), column_id.to_string(), owner.to_string());
            let cards = &mut board.columns[index].cards;
            let len = cards.len();
            let position = position::insert_at(cards, new_card, len);
            Ok(Created { id, position })
        })
    }

    async fn update_card(
        &self,
        card_id: &str,
        patch: &CardPatch,
        owner: &str,
    ) -> Result<(), RemoteError> {
        self.enter(RemoteOp::UpdateCard).await?;
        self.with_card_mut(card_id, |board, ci, k| {
            let card = &mut board.columns[ci].cards[k];
            if card.owner.as_deref() != Some(owner) {
                return Err(RemoteError::Rejected("Not the card owner".to_string()));
            }
            patch.apply_to(card);
            Ok(())
        })
    }

    async fn delete_card(&self, card_id: &str) -> Result<(), RemoteError> {
        self.enter(RemoteOp::DeleteCard).await?;
        self.with_card_mut(card_id, |board, ci, _| {
            position::remove_by_id(&mut board.columns[ci].cards, card_id);
            Ok(())
        })
    }

    async fn move_card(
        &self,
        card_id: &str,
        new_column_id: &str,
        new_position: usize,
    ) -> Result<(), RemoteError> {
        self.enter(RemoteOp::MoveCard).await?;
        self.with_card_mut(card_id, |board, ci, _| {
            let target = board
                .columns
                .iter()
                .position(|c| c.id == new_column_id)
                .ok_or_else(|| {
                    RemoteError::Rejected(format!("Column not found: {}", new_column_id))
                })?;
            if target == ci {
                position::move_within(&mut board.columns[ci].cards, card_id, new_position);
                return Ok(());
            }
            let (source, dest) = position::pair_mut(&mut board.columns, ci, target);
            position::move_across(
                &mut source.cards,
                &mut dest.cards,
                new_column_id,
                card_id,
                new_position,
            );
            Ok(())
        })
    }
}
