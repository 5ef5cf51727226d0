/// Drag-and-drop bookkeeping for the board view.
///
/// The view reports where a drag started and where it ended; this turns the
/// pair into at most one intent. It never touches the store itself.

use crate::intent::Intent;
use crate::position;
use crate::types::{Board, CardId, ColumnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Card,
    Column,
}

/// Where the dragged element came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOrigin {
    /// Source column of a dragged card.
    Column(ColumnId),
    /// Source index of a dragged column.
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        kind: DragKind,
        dragged_id: String,
        origin: DragOrigin,
    },
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Begin dragging `card_id` out of `column_id`. Replaces any drag in progress.
    pub fn start_card_drag(&mut self, card_id: impl Into<CardId>, column_id: impl Into<ColumnId>) {
        self.state = DragState::Dragging {
            kind: DragKind::Card,
            dragged_id: card_id.into(),
            origin: DragOrigin::Column(column_id.into()),
        };
    }

    pub fn start_column_drag(&mut self, column_id: impl Into<ColumnId>, index: usize) {
        self.state = DragState::Dragging {
            kind: DragKind::Column,
            dragged_id: column_id.into(),
            origin: DragOrigin::Index(index),
        };
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Finish the drag over `target_column` at `target_index` and return the
    /// intent to dispatch, if any. For column drags `target_column` is ignored.
    ///
    /// Dropping an element back onto its own slot yields nothing. The
    /// controller is idle afterwards either way.
    pub fn drop_on(&mut self, target_column: &str, target_index: usize, board: &Board) -> Option<Intent> {
        let state = std::mem::take(&mut self.state);
        let DragState::Dragging {
            kind,
            dragged_id,
            origin,
        } = state
        else {
            return None;
        };

        match kind {
            DragKind::Card => {
                let (ci, k) = board.find_card(&dragged_id)?;
                let target = board.column(target_column)?;
                if target.id == board.columns[ci].id {
                    // The card itself is still counted in `len`.
                    let last = target.cards.len().saturating_sub(1);
                    if position::clamp_index(target_index, last) == k {
                        log::debug!("[taskboard.drag] card {} dropped in place", dragged_id);
                        return None;
                    }
                }
                if origin != DragOrigin::Column(board.columns[ci].id.clone()) {
                    log::debug!(
                        "[taskboard.drag] card {} changed column during the drag",
                        dragged_id
                    );
                }
                Some(Intent::MoveCard {
                    card_id: dragged_id,
                    to_column: target.id.clone(),
                    index: target_index,
                })
            }
            DragKind::Column => {
                let current = board.columns.iter().position(|c| c.id == dragged_id)?;
                let last = board.columns.len().saturating_sub(1);
                if position::clamp_index(target_index, last) == current {
                    return None;
                }
                Some(Intent::ReorderColumn {
                    column_id: dragged_id,
                    index: target_index,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, NewCard};

    fn board() -> Board {
        let mut board = Board::new("b1", "Team", Some("7".into()));
        let mut todo = Column::new("todo", "b1", "Todo");
        for (i, id) in ["k1", "k2"].iter().enumerate() {
            let mut card = NewCard::titled(*id).into_card(id.to_string(), "todo".into(), "7".into());
            card.position = i;
            todo.cards.push(card);
        }
        let mut done = Column::new("done", "b1", "Done");
        done.position = 1;
        board.columns = vec![todo, done];
        board
    }

    #[test]
    fn test_card_drop_across_columns() {
        let mut drag = DragController::new();
        drag.start_card_drag("k2", "todo");
        assert!(drag.is_dragging());

        let intent = drag.drop_on("done", 0, &board());
        assert_eq!(
            intent,
            Some(Intent::MoveCard {
                card_id: "k2".into(),
                to_column: "done".into(),
                index: 0,
            })
        );
        assert_eq!(drag.state(), &DragState::Idle);
    }

    #[test]
    fn test_card_dropped_in_place_is_noop() {
        let mut drag = DragController::new();
        drag.start_card_drag("k2", "todo");
        assert_eq!(drag.drop_on("todo", 1, &board()), None);

        // Past the end of its own column is still its own slot.
        drag.start_card_drag("k2", "todo");
        assert_eq!(drag.drop_on("todo", 8, &board()), None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn test_card_reorder_within_column() {
        let mut drag = DragController::new();
        drag.start_card_drag("k2", "todo");
        assert_eq!(
            drag.drop_on("todo", 0, &board()),
            Some(Intent::MoveCard {
                card_id: "k2".into(),
                to_column: "todo".into(),
                index: 0,
            })
        );
    }

    #[test]
    fn test_column_drag() {
        let mut drag = DragController::new();
        drag.start_column_drag("todo", 0);
        assert_eq!(drag.drop_on("", 0, &board()), None);

        drag.start_column_drag("todo", 0);
        assert_eq!(
            drag.drop_on("", 1, &board()),
            Some(Intent::ReorderColumn {
                column_id: "todo".into(),
                index: 1,
            })
        );
    }

    #[test]
    fn test_cancel_and_unknown_targets() {
        let mut drag = DragController::new();
        assert_eq!(drag.drop_on("done", 0, &board()), None);

        drag.start_card_drag("k1", "todo");
        drag.cancel();
        assert_eq!(drag.drop_on("done", 0, &board()), None);

        drag.start_card_drag("k1", "todo");
        assert_eq!(drag.drop_on("ghost", 0, &board()), None);
        assert!(!drag.is_dragging());
    }
}
