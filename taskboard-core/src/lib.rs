//! Taskboard core: client-side board state and the optimistic mutation engine.
pub mod config;
pub mod drag;
pub mod error;
pub mod events;
mod executor;
pub mod intent;
pub mod ownership;
pub mod position;
pub mod remote;
pub mod store;
pub mod types;

pub use config::{ReconcileMode, ReconcilePolicy};
pub use drag::{DragController, DragKind, DragOrigin, DragState};
pub use error::MutationError;
pub use events::{Notice, NoticeLevel, StoreEvent};
pub use executor::PendingMutation;
pub use intent::{Confirmation, Intent, IntentKind, MutationPhase};
pub use remote::{Created, RemoteAuthority, RemoteError, RemoteOp};
pub use store::{BoardStore, BoardTree};
pub use types::{Board, Card, CardPatch, Column, NewCard, Priority};
