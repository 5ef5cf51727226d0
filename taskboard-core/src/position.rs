/// Position allocation for ordered siblings.
///
/// Cards within a column and columns within a board carry an explicit
/// `position` that must always equal their array index. Every function here
/// edits the sequence in place and renumbers afterwards, so callers never
/// have to touch `position` by hand.
///
/// Missing ids are a no-op (`None`), never a panic: callers decide whether an
/// intent was meaningful before reaching the allocator.
use crate::types::{Card, Column};

/// An element ordered by an explicit position within its container.
pub trait Positioned {
    fn id(&self) -> &str;
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

/// An element that records which container it belongs to.
pub trait Contained: Positioned {
    fn set_container(&mut self, container_id: &str);
}

impl Positioned for Card {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

impl Contained for Card {
    fn set_container(&mut self, container_id: &str) {
        self.column_id = container_id.to_string();
    }
}

impl Positioned for Column {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

/// Set every element's position to its array index.
pub fn renumber<T: Positioned>(seq: &mut [T]) {
    for (i, item) in seq.iter_mut().enumerate() {
        item.set_position(i);
    }
}

/// Restore array order from the position fields (stable for duplicates),
/// then close any gaps. Used on data arriving from the authority.
pub fn repair<T: Positioned>(seq: &mut [T]) {
    seq.sort_by_key(|item| item.position());
    renumber(seq);
}

/// Splice `item` in at `index` (clamped to `[0, len]`) and renumber.
/// Returns the index the item landed at.
pub fn insert_at<T: Positioned>(seq: &mut Vec<T>, item: T, index: usize) -> usize {
    let index = index.min(seq.len());
    seq.insert(index, item);
    renumber(seq);
    index
}

/// Remove the element with `id` and renumber the rest.
/// Returns the removed element and the index it occupied.
pub fn remove_by_id<T: Positioned>(seq: &mut Vec<T>, id: &str) -> Option<(usize, T)> {
    let index = seq.iter().position(|item| item.id() == id)?;
    let item = seq.remove(index);
    renumber(seq);
    Some((index, item))
}

/// Reorder within one container. `index` is interpreted against the list with
/// the element already removed, and clamped. Returns the final position.
pub fn move_within<T: Positioned>(seq: &mut Vec<T>, id: &str, index: usize) -> Option<usize> {
    let (_, item) = remove_by_id(seq, id)?;
    Some(insert_at(seq, item, index))
}

/// Move an element between containers, updating its container reference.
/// Both sequences end contiguous. Returns the final position in `target`;
/// the moved element is `target[position]`.
pub fn move_across<T: Contained>(
    source: &mut Vec<T>,
    target: &mut Vec<T>,
    target_container: &str,
    id: &str,
    index: usize,
) -> Option<usize> {
    let (_, mut item) = remove_by_id(source, id)?;
    item.set_container(target_container);
    Some(insert_at(target, item, index))
}

/// Clamp a requested drop index to what `insert_at` would actually use for a
/// container that currently holds `len` elements.
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len)
}

/// Two distinct mutable elements of one slice, e.g. the source and target
/// columns of a cross-column move.
pub fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs distinct indices");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// True when positions are exactly `0..len` in array order.
pub fn is_contiguous<T: Positioned>(seq: &[T]) -> bool {
    seq.iter().enumerate().all(|(i, item)| item.position() == i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{card_positions, NewCard};

    fn card(id: &str, column: &str) -> Card {
        NewCard::titled(id).into_card(id.into(), column.into(), "7".into())
    }

    fn column_with(id: &str, ids: &[&str]) -> Column {
        let mut col = Column::new(id, "b", id);
        for cid in ids {
            let len = col.cards.len();
            insert_at(&mut col.cards, card(cid, id), len);
        }
        col
    }

    fn ids(seq: &[Card]) -> Vec<&str> {
        seq.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_insert_clamps_and_renumbers() {
        let mut seq = vec![card("a", "c"), card("b", "c")];
        seq[0].position = 7;
        let at = insert_at(&mut seq, card("x", "c"), 99);
        assert_eq!(at, 2);
        assert_eq!(ids(&seq), vec!["a", "b", "x"]);
        assert!(is_contiguous(&seq));

        insert_at(&mut seq, card("y", "c"), 0);
        assert_eq!(ids(&seq), vec!["y", "a", "b", "x"]);
        assert!(is_contiguous(&seq));
    }

    #[test]
    fn test_insert_remove_sequences_stay_dense() {
        let mut seq: Vec<Card> = Vec::new();
        let script: &[(&str, Option<usize>)] = &[
            ("a", Some(0)),
            ("b", Some(0)),
            ("c", Some(5)),
            ("b", None),
            ("d", Some(1)),
            ("a", None),
            ("e", Some(1)),
            ("zz", None),
        ];
        for (id, op) in script {
            match op {
                Some(index) => {
                    insert_at(&mut seq, card(id, "c"), *index);
                }
                None => {
                    remove_by_id(&mut seq, id);
                }
            }
            let mut positions: Vec<usize> = seq.iter().map(|c| c.position).collect();
            positions.sort_unstable();
            assert_eq!(positions, (0..seq.len()).collect::<Vec<_>>());
        }
        assert_eq!(ids(&seq), vec!["d", "e", "c"]);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut seq = vec![card("a", "c")];
        assert!(remove_by_id(&mut seq, "nope").is_none());
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn test_move_within() {
        let mut col = column_with("c", &["a", "b", "c", "d"]);
        assert_eq!(move_within(&mut col.cards, "a", 2), Some(2));
        assert_eq!(ids(&col.cards), vec!["b", "c", "a", "d"]);
        assert_eq!(move_within(&mut col.cards, "d", 0), Some(0));
        assert_eq!(ids(&col.cards), vec!["d", "b", "c", "a"]);
        assert!(is_contiguous(&col.cards));
        assert_eq!(move_within(&mut col.cards, "missing", 0), None);
    }

    #[test]
    fn test_move_across() {
        let mut source = column_with("src", &["a", "b", "c"]);
        let mut target = column_with("dst", &["x", "y"]);

        let pos = move_across(&mut source.cards, &mut target.cards, "dst", "b", 1);
        assert_eq!(pos, Some(1));
        assert_eq!(card_positions(&source), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(
            card_positions(&target),
            vec!["x".to_string(), "b".to_string(), "y".to_string()]
        );
        assert_eq!(target.cards[1].column_id, "dst");
        assert!(is_contiguous(&source.cards));
        assert!(is_contiguous(&target.cards));

        let pos = move_across(&mut source.cards, &mut target.cards, "dst", "a", 40);
        assert_eq!(pos, Some(3));
        let moved = &target.cards[3];
        assert_eq!((moved.id.as_str(), moved.column_id.as_str(), moved.position), ("a", "dst", 3));
    }

    #[test]
    fn test_move_across_missing_id_leaves_inputs() {
        let mut source = column_with("src", &["a"]);
        let mut target = column_with("dst", &["x"]);
        let before = (source.clone(), target.clone());
        assert!(move_across(&mut source.cards, &mut target.cards, "dst", "zz", 0).is_none());
        assert_eq!((source, target), before);
    }

    #[test]
    fn test_pair_mut_both_orders() {
        let mut v = vec![1, 2, 3];
        let (a, b) = pair_mut(&mut v, 2, 0);
        std::mem::swap(a, b);
        assert_eq!(v, vec![3, 2, 1]);
    }

    #[test]
    fn test_repair_closes_gaps() {
        let mut seq = vec![card("a", "c"), card("b", "c"), card("c", "c")];
        seq[0].position = 9;
        seq[1].position = 2;
        seq[2].position = 4;
        repair(&mut seq);
        assert_eq!(ids(&seq), vec!["b", "c", "a"]);
        assert!(is_contiguous(&seq));
    }
}
