//! Merges the results of every expansion of one saved search.

use std::collections::HashSet;

use tracing::debug;

use crate::clients::inpa::CatalogSearch;
use crate::models::item::Item;
use crate::models::search::QuerySpec;

/// Merged outcome across all expansions of a search.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub items: Vec<Item>,
    pub errors: usize,
}

impl Aggregated {
    /// True when nothing was merged and at least one query failed — the
    /// caller surfaces this as a failed check, not as "no new items".
    #[must_use]
    pub const fn all_failed(&self) -> bool {
        self.items.is_empty() && self.errors > 0
    }
}

/// Executes every spec once. A failing call is counted and contributes no
/// items; it never aborts the remaining specs. Duplicate ids across specs
/// keep their first occurrence in spec order.
pub async fn aggregate(client: &dyn CatalogSearch, specs: &[QuerySpec]) -> Aggregated {
    let mut merged: Vec<Item> = Vec::new();
    let mut ids: HashSet<String> = HashSet::new();
    let mut errors = 0;

    for spec in specs {
        match client.search(spec).await {
            Ok(items) => {
                for item in items {
                    if item.id.is_empty() || !ids.insert(item.id.clone()) {
                        continue;
                    }
                    merged.push(item);
                }
            }
            Err(e) => {
                errors += 1;
                debug!("Catalog query failed: {e:#}");
            }
        }
    }

    // Raw string comparison keeps the ordering byte-reproducible; items
    // without a publication date sort last. The sort is stable, so ties
    // keep merge order.
    merged.sort_by(|a, b| b.published_key().cmp(a.published_key()));

    Aggregated {
        items: merged,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Canned responses keyed by category id; unknown categories fail.
    struct StubCatalog {
        responses: HashMap<String, Vec<Item>>,
    }

    #[async_trait]
    impl CatalogSearch for StubCatalog {
        async fn search(&self, spec: &QuerySpec) -> Result<Vec<Item>> {
            self.responses
                .get(&spec.category_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("request failed"))
        }
    }

    fn item(id: &str, published: &str) -> Item {
        Item {
            id: id.to_string(),
            data_pubblicazione: (!published.is_empty()).then(|| published.to_string()),
            ..Item::default()
        }
    }

    fn spec(category_id: &str) -> QuerySpec {
        QuerySpec {
            text: "x".to_string(),
            category_id: category_id.to_string(),
            region_id: None,
            sector_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_ids_across_specs_are_merged_once() {
        let client = StubCatalog {
            responses: HashMap::from([
                ("C1".to_string(), vec![item("A", "2024-01-01"), item("B", "2024-01-02")]),
                ("C2".to_string(), vec![item("B", "2024-01-02"), item("C", "2024-01-03")]),
            ]),
        };

        let merged = aggregate(&client, &[spec("C1"), spec("C2")]).await;

        assert_eq!(merged.errors, 0);
        let ids: Vec<&str> = merged.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn items_without_publication_date_sort_last() {
        let client = StubCatalog {
            responses: HashMap::from([(
                "C1".to_string(),
                vec![item("undated", ""), item("old", "2023-06-01"), item("new", "2024-06-01")],
            )]),
        };

        let merged = aggregate(&client, &[spec("C1")]).await;
        let ids: Vec<&str> = merged.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "undated"]);
    }

    #[tokio::test]
    async fn failing_specs_are_counted_not_fatal() {
        let client = StubCatalog {
            responses: HashMap::from([("C1".to_string(), vec![item("A", "2024-01-01")])]),
        };

        let merged = aggregate(&client, &[spec("C1"), spec("MISSING"), spec("ALSO_MISSING")]).await;

        assert_eq!(merged.errors, 2);
        assert_eq!(merged.items.len(), 1);
        assert!(!merged.all_failed());
    }

    #[tokio::test]
    async fn all_failed_is_distinct_from_zero_results() {
        let client = StubCatalog {
            responses: HashMap::new(),
        };

        let merged = aggregate(&client, &[spec("C1")]).await;
        assert!(merged.all_failed());

        let empty_ok = StubCatalog {
            responses: HashMap::from([("C1".to_string(), vec![])]),
        };
        let merged = aggregate(&empty_ok, &[spec("C1")]).await;
        assert!(!merged.all_failed());
    }

    #[tokio::test]
    async fn items_without_an_id_are_dropped() {
        let client = StubCatalog {
            responses: HashMap::from([(
                "C1".to_string(),
                vec![item("", "2024-01-01"), item("A", "2024-01-01")],
            )]),
        };

        let merged = aggregate(&client, &[spec("C1")]).await;
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].id, "A");
    }
}
