//! Ordered, observable record of every item an engine knows about.

use crate::error::{Error, Result};
use crate::item::ItemState;

use indexmap::IndexMap;

/// [`ItemState`]s keyed by id, in submission order.
///
/// Updates that would move an item backwards are rejected, so every
/// sequence of states observed for one submission is monotone.
#[derive(Debug, Clone, Default)]
pub struct ProgressModel {
    items: IndexMap<String, ItemState>,
}

impl ProgressModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a freshly submitted item.
    ///
    /// An id may be reused once its previous submission is terminal; the
    /// record keeps its position and starts over.
    pub fn insert(&mut self, state: ItemState) -> Result<()> {
        if let Some(known) = self.items.get(&state.id) {
            if !known.phase.is_terminal() {
                return Err(Error::DuplicateItem(state.id));
            }
        }
        self.items.insert(state.id.clone(), state);
        Ok(())
    }

    /// Replace the record of a known item.
    pub fn update(&mut self, next: ItemState) -> Result<()> {
        let Some(current) = self.items.get_mut(&next.id) else {
            return Err(Error::InvalidTransition {
                id: next.id,
                from: "unknown".into(),
                to: next.phase.to_string(),
            });
        };
        if !current.can_become(&next) {
            return Err(Error::InvalidTransition {
                id: next.id,
                from: format!("{}@{}", current.phase, current.attempt),
                to: format!("{}@{}", next.phase, next.attempt),
            });
        }
        *current = next;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ItemState> {
        self.items.get(id)
    }

    /// Whether the id is known and not yet terminal.
    pub fn is_live(&self, id: &str) -> bool {
        self.get(id).is_some_and(|s| !s.phase.is_terminal())
    }

    /// Number of items holding a concurrency slot.
    pub fn active(&self) -> usize {
        self.items.values().filter(|s| s.phase.is_active()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemState> {
        self.items.values()
    }

    /// Copy of every record, in submission order.
    pub fn snapshot(&self) -> Vec<ItemState> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ErrorKind, Phase};

    #[test]
    fn test_insert_keeps_order() {
        let mut model = ProgressModel::new();
        model.insert(ItemState::queued("b")).unwrap();
        model.insert(ItemState::queued("a")).unwrap();
        let ids: Vec<_> = model.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_duplicate_live_id_is_rejected() {
        let mut model = ProgressModel::new();
        model.insert(ItemState::queued("a")).unwrap();
        assert!(matches!(
            model.insert(ItemState::queued("a")),
            Err(Error::DuplicateItem(id)) if id == "a"
        ));
    }

    #[test]
    fn test_terminal_id_can_be_resubmitted() {
        let mut model = ProgressModel::new();
        model.insert(ItemState::queued("a")).unwrap();
        model
            .update(ItemState {
                phase: Phase::Done,
                ..ItemState::queued("a")
            })
            .unwrap();
        model.insert(ItemState::queued("a")).unwrap();
        assert_eq!(model.get("a").unwrap().phase, Phase::Queued);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_backwards_update_is_rejected() {
        let mut model = ProgressModel::new();
        model.insert(ItemState::queued("a")).unwrap();
        let downloading = ItemState {
            phase: Phase::Downloading,
            bytes_received: 10,
            bytes_total: 100,
            ..ItemState::queued("a")
        };
        model.update(downloading.clone()).unwrap();
        assert_eq!(model.active(), 1);

        let err = model.update(ItemState::queued("a")).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(model.get("a"), Some(&downloading));
    }

    #[test]
    fn test_retry_update() {
        let mut model = ProgressModel::new();
        model.insert(ItemState::queued("a")).unwrap();
        let failed = ItemState {
            phase: Phase::Failed,
            last_error_kind: Some(ErrorKind::Timeout),
            ..ItemState::queued("a")
        };
        model.update(failed.clone()).unwrap();
        model.update(failed.retried()).unwrap();
        assert_eq!(model.get("a").unwrap().attempt, 2);
        assert!(model.is_live("a"));
    }

    #[test]
    fn test_update_unknown() {
        let mut model = ProgressModel::new();
        assert!(model.update(ItemState::queued("ghost")).is_err());
    }
}
