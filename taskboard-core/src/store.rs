/// Board store: the single shared, mutable copy of the client's board tree.
///
/// All writes go through `StoreInner::commit`, which holds the lock for one
/// synchronous closure and never across an `.await`. Each successful commit
/// bumps the revision and broadcasts `StoreEvent::Changed`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::config::ReconcilePolicy;
use crate::error::MutationError;
use crate::events::StoreEvent;
use crate::executor::{Executor, PendingMutation};
use crate::intent::{Confirmation, Intent};
use crate::ownership;
use crate::position;
use crate::remote::RemoteAuthority;
use crate::types::{Board, BoardId};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Boards plus the client-side selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardTree {
    pub boards: Vec<Board>,
    pub selected: Option<BoardId>,
}

impl BoardTree {
    pub fn board_index(&self, board_id: &str) -> Option<usize> {
        self.boards.iter().position(|b| b.id == board_id)
    }

    pub fn board_mut(&mut self, board_id: &str) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.id == board_id)
    }

    /// (board index, column index) of a column anywhere in the tree.
    pub fn locate_column(&self, column_id: &str) -> Option<(usize, usize)> {
        self.boards.iter().enumerate().find_map(|(bi, board)| {
            board
                .columns
                .iter()
                .position(|c| c.id == column_id)
                .map(|ci| (bi, ci))
        })
    }

    /// (board index, column index, card index) of a card anywhere in the tree.
    pub fn locate_card(&self, card_id: &str) -> Option<(usize, usize, usize)> {
        self.boards
            .iter()
            .enumerate()
            .find_map(|(bi, board)| board.find_card(card_id).map(|(ci, k)| (bi, ci, k)))
    }

    pub fn selected_board(&self) -> Option<&Board> {
        let id = self.selected.as_deref()?;
        self.boards.iter().find(|b| b.id == id)
    }

    /// Replace every board with a fresh copy from the authority and re-target
    /// the selection: keep it if the board still exists, else fall back to
    /// the first board, else clear it.
    pub fn replace_boards(&mut self, mut boards: Vec<Board>) {
        for board in boards.iter_mut() {
            normalize(board);
        }
        let keep = self
            .selected
            .as_deref()
            .is_some_and(|id| boards.iter().any(|b| b.id == id));
        if !keep {
            self.selected = boards.first().map(|b| b.id.clone());
        }
        self.boards = boards;
    }

    /// Like `replace_boards`, but boards in `busy` keep their local copy
    /// (and are kept even when the authority no longer lists them). A busy
    /// board with no local copy is left out.
    pub fn merge_boards(&mut self, boards: Vec<Board>, busy: &HashSet<BoardId>) {
        let mut merged: Vec<Board> = Vec::with_capacity(boards.len());
        for board in boards {
            if !busy.contains(&board.id) {
                merged.push(board);
            } else if let Some(local) = self.boards.iter().find(|b| b.id == board.id) {
                merged.push(local.clone());
            }
        }
        for local in &self.boards {
            if busy.contains(&local.id) && !merged.iter().any(|b| b.id == local.id) {
                merged.push(local.clone());
            }
        }
        self.replace_boards(merged);
    }

    /// Replace one board in place. Returns false if it is no longer tracked.
    pub fn replace_board(&mut self, mut board: Board) -> bool {
        normalize(&mut board);
        let id = board.id.clone();
        match self.board_mut(&id) {
            Some(slot) => {
                *slot = board;
                true
            }
            None => false,
        }
    }
}

/// Repair positions and back-references of a board received from outside.
pub fn normalize(board: &mut Board) {
    position::repair(&mut board.columns);
    for col in board.columns.iter_mut() {
        col.board_id = board.id.clone();
        position::repair(&mut col.cards);
        for card in col.cards.iter_mut() {
            card.column_id = col.id.clone();
        }
    }
}

/// Unresolved intents on one board, and whether a reload skipped it meanwhile.
#[derive(Debug, Default)]
struct BoardFlight {
    pending: usize,
    stale: bool,
}

pub(crate) struct StoreInner {
    tree: Mutex<BoardTree>,
    revision: AtomicU64,
    in_flight: AtomicUsize,
    /// Lock order: `tree` before `flights`.
    flights: Mutex<HashMap<BoardId, BoardFlight>>,
    events: broadcast::Sender<StoreEvent>,
}

impl StoreInner {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tree: Mutex::new(BoardTree::default()),
            revision: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            flights: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&BoardTree) -> R) -> R {
        let tree = self.tree.lock().unwrap();
        f(&tree)
    }

    /// Run one synchronous write. The revision is bumped and subscribers are
    /// notified only if the closure returns `Ok`. Selection changes are
    /// broadcast as well.
    pub(crate) fn commit<R, E>(
        &self,
        f: impl FnOnce(&mut BoardTree) -> Result<R, E>,
    ) -> Result<R, E> {
        let (result, selection) = {
            let mut tree = self.tree.lock().unwrap();
            let before = tree.selected.clone();
            let result = f(&mut tree);
            let selection = (tree.selected != before).then(|| tree.selected.clone());
            (result, selection)
        };
        if result.is_ok() {
            let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
            self.emit(StoreEvent::Changed { revision });
        }
        if let Some(board_id) = selection {
            self.emit(StoreEvent::SelectionChanged { board_id });
        }
        result
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn begin_flight(&self, board_id: &str) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.flights
            .lock()
            .unwrap()
            .entry(board_id.to_string())
            .or_default()
            .pending += 1;
    }

    /// Returns true when this was the last intent on the board and a reload
    /// was deferred while it was in flight.
    pub(crate) fn end_flight(&self, board_id: &str) -> bool {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut flights = self.flights.lock().unwrap();
        let Some(flight) = flights.get_mut(board_id) else {
            return false;
        };
        flight.pending = flight.pending.saturating_sub(1);
        if flight.pending > 0 {
            return false;
        }
        flights.remove(board_id).is_some_and(|f| f.stale)
    }

    /// Boards with unresolved intents. Each is marked stale, since the caller
    /// is about to skip reloading it.
    pub(crate) fn defer_busy(&self) -> HashSet<BoardId> {
        let mut flights = self.flights.lock().unwrap();
        flights
            .iter_mut()
            .map(|(id, flight)| {
                flight.stale = true;
                id.clone()
            })
            .collect()
    }

    /// Mark `board_id` stale if it has unresolved intents.
    pub(crate) fn defer_if_busy(&self, board_id: &str) -> bool {
        match self.flights.lock().unwrap().get_mut(board_id) {
            Some(flight) => {
                flight.stale = true;
                true
            }
            None => false,
        }
    }
}

/// Root aggregate handed to UI collaborators. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BoardStore {
    inner: Arc<StoreInner>,
    executor: Executor,
}

impl BoardStore {
    pub fn new(remote: Arc<dyn RemoteAuthority>) -> Self {
        Self::with_policy(remote, ReconcilePolicy::default())
    }

    pub fn with_policy(remote: Arc<dyn RemoteAuthority>, policy: ReconcilePolicy) -> Self {
        let inner = Arc::new(StoreInner::new());
        let executor = Executor::new(inner.clone(), remote, policy);
        Self { inner, executor }
    }

    /// Replace the tree with boards obtained elsewhere (initial load, cache).
    pub fn load(&self, boards: Vec<Board>) {
        let _ = self.inner.commit(|tree| {
            tree.replace_boards(boards);
            Ok::<_, ()>(())
        });
    }

    /// Run an intent through the full optimistic / remote / resolve cycle.
    pub async fn apply(&self, intent: Intent) -> Result<Confirmation, MutationError> {
        self.executor.dispatch(intent)?.settle().await
    }

    /// Apply an intent optimistically now; the returned handle performs the
    /// remote call when settled. Intents are linearized in dispatch order.
    pub fn dispatch(&self, intent: Intent) -> Result<PendingMutation, MutationError> {
        self.executor.dispatch(intent)
    }

    /// Reload every board owned by `owner` from the authority. Boards with
    /// intents still in flight are reloaded once those settle.
    pub async fn sync_boards(&self, owner: &str) -> Result<(), MutationError> {
        self.executor.sync_boards(owner).await
    }

    /// Reload a single board from the authority. A board with intents still
    /// in flight keeps its optimistic state; it is reloaded once they settle.
    pub async fn refresh_board(&self, board_id: &str) -> Result<(), MutationError> {
        self.executor.refresh_board(board_id).await
    }

    /// Select a board. Unknown ids are accepted; lookups then yield `None`.
    pub fn select(&self, board_id: impl Into<BoardId>) {
        let board_id = board_id.into();
        let _ = self.inner.commit(|tree| {
            tree.selected = Some(board_id);
            Ok::<_, ()>(())
        });
    }

    pub fn selected_board_id(&self) -> Option<BoardId> {
        self.inner.read(|tree| tree.selected.clone())
    }

    /// The selected board, or `None` for the empty state (nothing selected,
    /// or the selected id no longer exists).
    pub fn selected_board(&self) -> Option<Board> {
        self.inner.read(|tree| tree.selected_board().cloned())
    }

    /// The selected board as seen by `actor`.
    pub fn current_visible(&self, actor: Option<&str>) -> Option<Board> {
        self.inner.read(|tree| {
            tree.selected_board()
                .map(|board| ownership::visible_board(board, actor))
        })
    }

    pub fn boards(&self) -> Vec<Board> {
        self.inner.read(|tree| tree.boards.clone())
    }

    pub fn board(&self, board_id: &str) -> Option<Board> {
        self.inner
            .read(|tree| tree.boards.iter().find(|b| b.id == board_id).cloned())
    }

    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Number of dispatched intents still waiting on the authority.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryAuthority;
    use crate::types::Column;

    fn store() -> BoardStore {
        BoardStore::new(Arc::new(MemoryAuthority::new()))
    }

    #[test]
    fn test_load_selects_first_board() {
        let store = store();
        store.load(vec![
            Board::new("a", "A", None),
            Board::new("b", "B", None),
        ]);
        assert_eq!(store.selected_board_id().as_deref(), Some("a"));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_load_keeps_existing_selection() {
        let store = store();
        store.select("b");
        store.load(vec![
            Board::new("a", "A", None),
            Board::new("b", "B", None),
        ]);
        assert_eq!(store.selected_board_id().as_deref(), Some("b"));

        store.load(vec![Board::new("c", "C", None)]);
        assert_eq!(store.selected_board_id().as_deref(), Some("c"));

        store.load(Vec::new());
        assert_eq!(store.selected_board_id(), None);
    }

    #[test]
    fn test_select_unknown_is_empty_state() {
        let store = store();
        store.load(vec![Board::new("a", "A", None)]);
        store.select("ghost");
        assert_eq!(store.selected_board_id().as_deref(), Some("ghost"));
        assert!(store.selected_board().is_none());
        assert!(store.current_visible(Some("7")).is_none());
    }

    #[test]
    fn test_load_normalizes_positions() {
        let store = store();
        let mut board = Board::new("a", "A", None);
        let mut late = Column::new("x", "wrong", "X");
        late.position = 5;
        let mut early = Column::new("y", "wrong", "Y");
        early.position = 2;
        board.columns = vec![late, early];
        store.load(vec![board]);

        let board = store.board("a").unwrap();
        assert_eq!(board.columns[0].id, "y");
        assert!(board.is_consistent());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_and_selection() {
        let store = store();
        let mut rx = store.subscribe();
        store.load(vec![Board::new("a", "A", None)]);
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::Changed { revision: 1 });
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::SelectionChanged {
                board_id: Some("a".into())
            }
        );
    }

    #[test]
    fn test_merge_keeps_busy_boards() {
        let mut tree = BoardTree::default();
        tree.replace_boards(vec![
            Board::new("a", "Local A", None),
            Board::new("b", "Local B", None),
            Board::new("pending-board-1", "Draft", None),
        ]);
        let busy: HashSet<BoardId> = ["a", "pending-board-1", "gone"]
            .into_iter()
            .map(String::from)
            .collect();

        tree.merge_boards(
            vec![
                Board::new("a", "Server A", None),
                Board::new("b", "Server B", None),
                Board::new("gone", "Deleted locally", None),
            ],
            &busy,
        );
        let names: Vec<_> = tree.boards.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Local A", "Server B", "Draft"]);
    }

    #[test]
    fn test_last_flight_reports_deferred_reload() {
        let inner = StoreInner::new();
        inner.begin_flight("a");
        inner.begin_flight("a");
        assert!(!inner.defer_if_busy("b"));
        assert!(inner.defer_if_busy("a"));

        assert!(!inner.end_flight("a"));
        assert!(inner.end_flight("a"));
        assert_eq!(inner.in_flight.load(Ordering::SeqCst), 0);

        inner.begin_flight("a");
        assert!(!inner.end_flight("a"));
    }
}
