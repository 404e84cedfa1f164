pub use super::legacy_seen::Entity as LegacySeen;
pub use super::search_filters::Entity as SearchFilters;
pub use super::searches::Entity as Searches;
pub use super::seen_items::Entity as SeenItems;
pub use super::users::Entity as Users;
