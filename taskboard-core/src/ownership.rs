/// Ownership projection: which cards the current actor gets to see.
use crate::types::{Board, Card};

pub fn is_visible(card: &Card, actor: &str) -> bool {
    card.owner.as_deref() == Some(actor)
}

/// Project `board` down to the cards owned by `actor`.
///
/// With no actor (view-only / signed-out mode) the board is returned as-is so
/// every card still renders read-only. Column and board fields, including
/// positions, are copied untouched; only card lists are filtered.
pub fn visible_board(board: &Board, actor: Option<&str>) -> Board {
    let Some(actor) = actor else {
        return board.clone();
    };

    Board {
        id: board.id.clone(),
        name: board.name.clone(),
        owner: board.owner.clone(),
        columns: board
            .columns
            .iter()
            .map(|col| crate::types::Column {
                id: col.id.clone(),
                board_id: col.board_id.clone(),
                name: col.name.clone(),
                position: col.position,
                cards: col
                    .cards
                    .iter()
                    .filter(|card| is_visible(card, actor))
                    .cloned()
                    .collect(),
            })
            .collect(),
    }
}
