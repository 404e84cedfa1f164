use std::collections::{HashMap, HashSet};

use super::search::SavedSearch;

/// Which durable seen-set a piece of work commits against: a per-search set
/// or the flat per-user list predating multi-search support.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeenKey {
    Search(String),
    Legacy,
}

/// Point-in-time view of one user's persisted state, assembled by the
/// store. Safe to build for a user with no searches at all.
#[derive(Debug, Clone, Default)]
pub struct UserView {
    pub chat_id: String,
    pub searches: Vec<SavedSearch>,
    /// Seen item ids keyed by search id.
    pub seen: HashMap<String, HashSet<String>>,
    /// Most recently created search, for single-search consumers.
    pub legacy_search: Option<SavedSearch>,
    pub legacy_seen: HashSet<String>,
}

/// One search to poll, paired with the seen-set it reads and commits.
#[derive(Debug)]
pub struct WorkItem<'a> {
    pub search: &'a SavedSearch,
    pub key: SeenKey,
}

impl UserView {
    #[must_use]
    pub fn new(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            ..Self::default()
        }
    }

    /// Normalizes the user's workload into uniform work items: one per
    /// saved search, or — when none exist — a single legacy item against
    /// the flat seen list. Downstream never branches on which mode is
    /// active.
    #[must_use]
    pub fn work_items(&self) -> Vec<WorkItem<'_>> {
        if self.searches.is_empty() {
            return self
                .legacy_search
                .iter()
                .map(|search| WorkItem {
                    search,
                    key: SeenKey::Legacy,
                })
                .collect();
        }

        self.searches
            .iter()
            .map(|search| WorkItem {
                search,
                key: SeenKey::Search(search.id.clone()),
            })
            .collect()
    }

    #[must_use]
    pub fn seen_for(&self, key: &SeenKey) -> Option<&HashSet<String>> {
        match key {
            SeenKey::Search(id) => self.seen.get(id),
            SeenKey::Legacy => Some(&self.legacy_seen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::search::FilterValue;

    fn search(text: &str) -> SavedSearch {
        SavedSearch::new(
            text,
            vec![FilterValue {
                id: "C1".to_string(),
                name: "Concorsi".to_string(),
            }],
            vec![],
            vec![],
        )
    }

    #[test]
    fn multi_search_mode_yields_one_item_per_search() {
        let mut view = UserView::new("42");
        view.searches = vec![search("a"), search("b")];
        view.legacy_search = view.searches.last().cloned();

        let items = view.work_items();
        assert_eq!(items.len(), 2);
        assert!(
            items
                .iter()
                .all(|w| matches!(w.key, SeenKey::Search(ref id) if *id == w.search.id))
        );
    }

    #[test]
    fn legacy_mode_yields_a_single_flat_item() {
        let mut view = UserView::new("42");
        view.legacy_search = Some(search("legacy"));
        view.legacy_seen.insert("A1".to_string());

        let items = view.work_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, SeenKey::Legacy);
        assert_eq!(
            view.seen_for(&items[0].key),
            Some(&view.legacy_seen)
        );
    }

    #[test]
    fn a_user_with_nothing_configured_has_no_work() {
        assert!(UserView::new("42").work_items().is_empty());
    }
}
