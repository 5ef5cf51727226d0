use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

pub type BoardId = String;
pub type ColumnId = String;
pub type CardId = String;
pub type ActorId = String;

/// Prefix carried by locally minted ids that the authority has not confirmed yet.
pub const PROVISIONAL_PREFIX: &str = "pending-";

static PROVISIONAL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Mint a provisional id for an entity created locally (e.g. `pending-card-3`).
pub fn provisional_id(kind: EntityKind) -> String {
    let seq = PROVISIONAL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{}-{}", PROVISIONAL_PREFIX, kind, seq)
}

/// True if the id was minted locally and is still awaiting the authoritative id.
pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Board,
    Column,
    Card,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Board => "board",
            EntityKind::Column => "column",
            EntityKind::Card => "card",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {:?}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    /// Lenient: any casing is accepted, and blank or unknown values fall back to `Low`.
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: CardId,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub column_id: ColumnId,
    #[serde(default)]
    pub position: usize,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub job: String,
    /// Assignee display name.
    #[serde(default, rename = "name", deserialize_with = "deserialize_text")]
    pub assignee: String,
    /// Actor that created the card; drives the ownership filter.
    #[serde(
        default,
        rename = "user_id",
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner: Option<ActorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: ColumnId,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub board_id: BoardId,
    #[serde(rename = "column_name", deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: BoardId,
    #[serde(rename = "board_name", deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(
        default,
        rename = "user_id",
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner: Option<ActorId>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new(id: impl Into<BoardId>, name: impl Into<String>, owner: Option<ActorId>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_mut(&mut self, column_id: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == column_id)
    }

    /// Locate a card anywhere on the board. Returns (column index, card index).
    pub fn find_card(&self, card_id: &str) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.cards
                .iter()
                .position(|card| card.id == card_id)
                .map(|k| (ci, k))
        })
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.find_card(card_id)
            .map(|(ci, k)| &self.columns[ci].cards[k])
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Check the structural invariants: positions dense and equal to array
    /// order at both levels, and every back-reference pointing at its parent.
    pub fn is_consistent(&self) -> bool {
        self.columns.iter().enumerate().all(|(i, col)| {
            col.position == i
                && col.board_id == self.id
                && col
                    .cards
                    .iter()
                    .enumerate()
                    .all(|(k, card)| card.position == k && card.column_id == col.id)
        })
    }
}

impl Column {
    pub fn new(id: impl Into<ColumnId>, board_id: impl Into<BoardId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            name: name.into(),
            position: 0,
            cards: Vec::new(),
        }
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn index_of(&self, card_id: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.id == card_id)
    }
}

/// Column ids ordered by their `position` field.
pub fn column_positions(board: &Board) -> Vec<ColumnId> {
    let mut cols: Vec<&Column> = board.columns.iter().collect();
    cols.sort_by_key(|c| c.position);
    cols.into_iter().map(|c| c.id.clone()).collect()
}

/// Card ids ordered by their `position` field.
pub fn card_positions(column: &Column) -> Vec<CardId> {
    let mut cards: Vec<&Card> = column.cards.iter().collect();
    cards.sort_by_key(|c| c.position);
    cards.into_iter().map(|c| c.id.clone()).collect()
}

/// Fields supplied by the user when creating a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub assignee: String,
}

impl NewCard {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub(crate) fn into_card(self, id: CardId, column_id: ColumnId, owner: ActorId) -> Card {
        Card {
            id,
            column_id,
            position: 0,
            title: self.title,
            description: self.description,
            priority: self.priority,
            job: self.job,
            assignee: self.assignee,
            owner: Some(owner),
        }
    }
}

/// Partial card edit. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.job.is_none()
            && self.assignee.is_none()
    }

    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(description) = &self.description {
            card.description = description.clone();
        }
        if let Some(priority) = self.priority {
            card.priority = priority;
        }
        if let Some(job) = &self.job {
            card.job = job.clone();
        }
        if let Some(assignee) = &self.assignee {
            card.assignee = assignee.clone();
        }
    }
}

// The authority sends integer ids; the client keeps them as opaque strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// Accepts an integer or string id (or null, as empty) and yields a string.
pub fn deserialize_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?
        .map(String::from)
        .unwrap_or_default())
}

fn deserialize_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?.map(String::from))
}

fn deserialize_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_from_authority_json() {
        let json = r#"{
            "id": 3,
            "board_name": "Sprint",
            "user_id": 7,
            "columns": [
                {"id": 10, "board_id": 3, "column_name": "Todo", "position": 0, "cards": [
                    {"id": 100, "column_id": 10, "position": 0, "title": "Write docs",
                     "description": null, "priority": "high", "job": "docs",
                     "name": "Ana", "user_id": 7}
                ]},
                {"id": 11, "board_id": 3, "column_name": "Done", "position": 1}
            ]
        }"#;
        let board: Board = serde_json::from_str(json).unwrap();
        assert_eq!(board.id, "3");
        assert_eq!(board.owner.as_deref(), Some("7"));
        assert_eq!(board.columns[1].cards.len(), 0);

        let card = &board.columns[0].cards[0];
        assert_eq!(card.id, "100");
        assert_eq!(card.column_id, "10");
        assert_eq!(card.priority, Priority::High);
        assert_eq!(card.description, "");
        assert_eq!(card.assignee, "Ana");
        assert!(board.is_consistent());
    }

    #[test]
    fn test_priority_lenient() {
        assert_eq!("MEDIUM".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());

        let p: Priority = serde_json::from_str("\"\"").unwrap();
        assert_eq!(p, Priority::Low);
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"High\"");
    }

    #[test]
    fn test_positions_sorted_by_field() {
        let mut board = Board::new("b", "Board", None);
        let mut a = Column::new("a", "b", "A");
        a.position = 1;
        let mut z = Column::new("z", "b", "Z");
        z.position = 0;
        board.columns = vec![a, z];
        assert_eq!(column_positions(&board), vec!["z".to_string(), "a".to_string()]);
        assert!(!board.is_consistent());
    }

    #[test]
    fn test_provisional_ids() {
        let a = provisional_id(EntityKind::Card);
        let b = provisional_id(EntityKind::Card);
        assert_ne!(a, b);
        assert!(is_provisional(&a));
        assert!(a.starts_with("pending-card-"));
        assert!(!is_provisional("42"));
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut card = NewCard::titled("Old").into_card("1".into(), "c".into(), "7".into());
        card.job = "ops".into();
        let patch = CardPatch {
            title: Some("New".into()),
            priority: Some(Priority::High),
            ..CardPatch::default()
        };
        patch.apply_to(&mut card);
        assert_eq!(card.title, "New");
        assert_eq!(card.priority, Priority::High);
        assert_eq!(card.job, "ops");
        assert!(CardPatch::default().is_empty());
    }
}
