/// Reconciliation policy: how the store converges after a confirmed intent.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::intent::IntentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileMode {
    /// Trust the optimistic patch plus the ids/positions in the response.
    PatchOnly,
    /// Also re-fetch the affected board (or the board list for board-level
    /// intents) to pick up drift the patch did not capture.
    PatchThenRefetch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePolicy {
    /// Per-kind overrides of `ReconcilePolicy::default_mode`.
    #[serde(default)]
    pub modes: HashMap<IntentKind, ReconcileMode>,
    /// Shown when a remote failure carries no message of its own.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_fallback_message() -> String {
    "Something went wrong while saving your change. Please try again.".to_string()
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            modes: HashMap::new(),
            fallback_message: default_fallback_message(),
        }
    }
}

impl ReconcilePolicy {
    /// Every intent patches only; useful for tests and offline demos.
    pub fn patch_only() -> Self {
        Self {
            modes: IntentKind::ALL
                .iter()
                .map(|kind| (*kind, ReconcileMode::PatchOnly))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, kind: IntentKind, mode: ReconcileMode) -> Self {
        self.modes.insert(kind, mode);
        self
    }

    /// Built-in choice per kind. Intents whose server effect can differ from
    /// the local patch (new entities, renames normalised server-side, moves
    /// the server re-ranks) re-fetch; pure removals and field edits the
    /// client fully knows do not.
    pub fn default_mode(kind: IntentKind) -> ReconcileMode {
        match kind {
            IntentKind::CreateBoard
            | IntentKind::RenameBoard
            | IntentKind::CreateColumn
            | IntentKind::RenameColumn
            | IntentKind::UpdateCard
            | IntentKind::MoveCard => ReconcileMode::PatchThenRefetch,
            IntentKind::DeleteBoard
            | IntentKind::DeleteColumn
            | IntentKind::ReorderColumn
            | IntentKind::CreateCard
            | IntentKind::DeleteCard => ReconcileMode::PatchOnly,
        }
    }

    pub fn mode_for(&self, kind: IntentKind) -> ReconcileMode {
        self.modes
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_mode(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let policy = ReconcilePolicy::default();
        assert_eq!(policy.mode_for(IntentKind::MoveCard), ReconcileMode::PatchThenRefetch);
        assert_eq!(policy.mode_for(IntentKind::DeleteCard), ReconcileMode::PatchOnly);

        let policy = policy.with_mode(IntentKind::MoveCard, ReconcileMode::PatchOnly);
        assert_eq!(policy.mode_for(IntentKind::MoveCard), ReconcileMode::PatchOnly);
    }

    #[test]
    fn test_patch_only_covers_all() {
        let policy = ReconcilePolicy::patch_only();
        for kind in IntentKind::ALL {
            assert_eq!(policy.mode_for(kind), ReconcileMode::PatchOnly);
        }
    }

    #[test]
    fn test_from_json() {
        let policy: ReconcilePolicy = serde_json::from_str(
            r#"{"modes": {"create_card": "patch-then-refetch"}}"#,
        )
        .unwrap();
        assert_eq!(policy.mode_for(IntentKind::CreateCard), ReconcileMode::PatchThenRefetch);
        assert!(!policy.fallback_message.is_empty());
    }
}
