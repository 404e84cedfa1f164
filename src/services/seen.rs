//! Pure diff/commit over already-reported item ids. Owns no I/O.

use std::collections::HashSet;

use crate::models::item::Item;

/// Items not yet reported, in the aggregator's order.
#[must_use]
pub fn diff(seen: &HashSet<String>, merged: &[Item]) -> Vec<Item> {
    merged
        .iter()
        .filter(|item| !seen.contains(&item.id))
        .cloned()
        .collect()
}

/// Folds freshly reported items into the seen-set. Committing the same
/// items again is a no-op.
pub fn commit(seen: &mut HashSet<String>, new_items: &[Item]) {
    seen.extend(new_items.iter().map(|item| item.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            ..Item::default()
        }
    }

    #[test]
    fn diff_keeps_exactly_the_unseen_items_in_order() {
        let seen: HashSet<String> = ["A".to_string(), "C".to_string()].into();
        let merged = vec![item("D"), item("A"), item("B"), item("C")];

        let fresh = diff(&seen, &merged);
        let ids: Vec<&str> = fresh.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["D", "B"]);
    }

    #[test]
    fn commit_is_idempotent() {
        let mut seen = HashSet::new();
        let fresh = vec![item("A"), item("B")];

        commit(&mut seen, &fresh);
        let once = seen.clone();
        commit(&mut seen, &fresh);

        assert_eq!(seen, once);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn diff_after_commit_is_empty() {
        let mut seen = HashSet::new();
        let merged = vec![item("A"), item("B")];

        let fresh = diff(&seen, &merged);
        commit(&mut seen, &fresh);
        assert!(diff(&seen, &merged).is_empty());
    }
}
