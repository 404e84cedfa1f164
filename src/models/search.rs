use serde::{Deserialize, Serialize};

/// Labels longer than this are cut at creation time.
pub const LABEL_MAX_CHARS: usize = 64;

/// Which dimension a filter value belongs to. Stored as plain text in the
/// `search_filters.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Category,
    Region,
    Sector,
}

impl FilterKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Region => "region",
            Self::Sector => "sector",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "category" => Some(Self::Category),
            "region" => Some(Self::Region),
            "sector" => Some(Self::Sector),
            _ => None,
        }
    }
}

/// One selected filter value. The name is kept alongside the id so labels
/// and listings never need a vocabulary lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterValue {
    pub id: String,
    pub name: String,
}

/// A user's standing query against the catalog.
///
/// `categories` must never be empty for a persisted search; the upstream
/// endpoint mandates a category per call. Empty `regions`/`sectors` mean
/// "no filter on that dimension".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: String,
    pub text: String,
    pub categories: Vec<FilterValue>,
    pub regions: Vec<FilterValue>,
    pub sectors: Vec<FilterValue>,
    pub label: Option<String>,
}

/// One fully single-valued request derivable from a [`SavedSearch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub text: String,
    pub category_id: String,
    pub region_id: Option<String>,
    pub sector_id: Option<String>,
}

impl SavedSearch {
    #[must_use]
    pub fn new(
        text: &str,
        categories: Vec<FilterValue>,
        regions: Vec<FilterValue>,
        sectors: Vec<FilterValue>,
    ) -> Self {
        let label = make_label(text, &categories, &regions, &sectors);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            categories,
            regions,
            sectors,
            label: Some(label),
        }
    }

    /// Stored label snapshot, or a freshly computed fallback for rows that
    /// predate label storage.
    #[must_use]
    pub fn label(&self) -> String {
        self.label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| {
                make_label(&self.text, &self.categories, &self.regions, &self.sectors)
            })
    }

    /// Expands into the cartesian product of the filter dimensions:
    /// `categories × (regions ∪ {absent}) × (sectors ∪ {absent})`.
    ///
    /// An empty optional dimension contributes exactly one "no filter"
    /// value. No categories means the search cannot be executed at all and
    /// the expansion is empty; callers skip such a search.
    #[must_use]
    pub fn expand(&self) -> Vec<QuerySpec> {
        if self.categories.is_empty() {
            return Vec::new();
        }

        let regions = optional_dimension(&self.regions);
        let sectors = optional_dimension(&self.sectors);

        let mut specs = Vec::with_capacity(self.categories.len() * regions.len() * sectors.len());
        for category in &self.categories {
            for region in &regions {
                for sector in &sectors {
                    specs.push(QuerySpec {
                        text: self.text.clone(),
                        category_id: category.id.clone(),
                        region_id: region.map(|r| r.id.clone()),
                        sector_id: sector.map(|s| s.id.clone()),
                    });
                }
            }
        }
        specs
    }

    /// All filter selections in persistence order, tagged with their kind.
    pub fn filter_rows(&self) -> impl Iterator<Item = (FilterKind, &FilterValue)> {
        self.categories
            .iter()
            .map(|v| (FilterKind::Category, v))
            .chain(self.regions.iter().map(|v| (FilterKind::Region, v)))
            .chain(self.sectors.iter().map(|v| (FilterKind::Sector, v)))
    }
}

fn optional_dimension(values: &[FilterValue]) -> Vec<Option<&FilterValue>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().map(Some).collect()
    }
}

/// Display label computed once when a search is created: the query text and
/// the non-empty filter dimensions, joined and bounded in length.
#[must_use]
pub fn make_label(
    text: &str,
    categories: &[FilterValue],
    regions: &[FilterValue],
    sectors: &[FilterValue],
) -> String {
    let names = |values: &[FilterValue]| {
        values
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut parts: Vec<String> = Vec::new();
    if !text.is_empty() {
        parts.push(text.to_string());
    }
    for dimension in [names(categories), names(regions), names(sectors)] {
        if !dimension.is_empty() {
            parts.push(dimension);
        }
    }

    let full = parts.join(" · ");
    if full.chars().count() <= LABEL_MAX_CHARS + 1 {
        full
    } else {
        let mut out: String = full.chars().take(LABEL_MAX_CHARS).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(id: &str, name: &str) -> FilterValue {
        FilterValue {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn values(n: usize, prefix: &str) -> Vec<FilterValue> {
        (0..n)
            .map(|i| value(&format!("{prefix}{i}"), &format!("{prefix} {i}")))
            .collect()
    }

    #[test]
    fn expansion_is_the_cartesian_product() {
        for (k, r, s) in [(1, 0, 0), (2, 3, 0), (1, 2, 2), (3, 1, 4)] {
            let search = SavedSearch::new(
                "ingegnere",
                values(k, "C"),
                values(r, "R"),
                values(s, "S"),
            );
            let expected = k * r.max(1) * s.max(1);
            assert_eq!(search.expand().len(), expected, "k={k} r={r} s={s}");
        }
    }

    #[test]
    fn empty_optional_dimensions_yield_one_unfiltered_spec() {
        let search = SavedSearch::new("bibliotec", vec![value("C1", "Concorsi")], vec![], vec![]);
        let specs = search.expand();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].text, "bibliotec");
        assert_eq!(specs[0].category_id, "C1");
        assert_eq!(specs[0].region_id, None);
        assert_eq!(specs[0].sector_id, None);
    }

    #[test]
    fn no_categories_expands_to_nothing() {
        let search = SavedSearch::new("x", vec![], values(2, "R"), values(2, "S"));
        assert!(search.expand().is_empty());
    }

    #[test]
    fn label_joins_text_and_filter_names() {
        let label = make_label(
            "bibliotec",
            &[value("C1", "Concorsi")],
            &[value("R1", "Lazio"), value("R2", "Toscana")],
            &[],
        );
        assert_eq!(label, "bibliotec · Concorsi · Lazio, Toscana");
    }

    #[test]
    fn long_labels_are_truncated() {
        let label = make_label(&"x".repeat(200), &[value("C1", "Concorsi")], &[], &[]);
        assert_eq!(label.chars().count(), LABEL_MAX_CHARS + 1);
        assert!(label.ends_with('…'));
    }

    #[test]
    fn filter_rows_cover_every_dimension_in_order() {
        let search = SavedSearch::new(
            "x",
            vec![value("C1", "c")],
            vec![value("R1", "r")],
            vec![value("S1", "s")],
        );
        let kinds: Vec<FilterKind> = search.filter_rows().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![FilterKind::Category, FilterKind::Region, FilterKind::Sector]
        );
    }

    #[test]
    fn filter_kind_round_trips_through_storage_form() {
        for kind in [FilterKind::Category, FilterKind::Region, FilterKind::Sector] {
            assert_eq!(FilterKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FilterKind::parse("provincia"), None);
    }
}
