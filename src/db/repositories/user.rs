use std::collections::{HashMap, HashSet};

use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::entities::{legacy_seen, prelude::*, search_filters, searches, seen_items, users};
use crate::models::search::{FilterKind, FilterValue, SavedSearch};
use crate::models::user::{SeenKey, UserView};

/// Rejections raised at the save boundary, before anything is written.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("search {id} has no categories selected")]
    NoCategories { id: String },

    #[error("search {id} has an empty query text")]
    EmptyText { id: String },
}

/// Repository for users, their saved searches, and seen-sets.
pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns the user's full view, creating the user row on first contact.
    /// Safe to call before any search exists.
    pub async fn get_user(&self, chat_id: &str) -> Result<UserView> {
        let txn = self.conn.begin().await?;
        Self::ensure_user(&txn, chat_id).await?;
        let view = Self::assemble(&txn, chat_id).await?;
        txn.commit().await?;
        Ok(view)
    }

    /// Snapshot of every user, each assembled inside its own read
    /// transaction. Cross-user consistency is not required.
    pub async fn all_users(&self) -> Result<Vec<UserView>> {
        let rows = Users::find()
            .order_by_asc(users::Column::CreatedAt)
            .all(&self.conn)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let txn = self.conn.begin().await?;
            let view = Self::assemble(&txn, &row.chat_id).await?;
            txn.commit().await?;
            out.push(view);
        }
        Ok(out)
    }

    async fn assemble<C: ConnectionTrait>(conn: &C, chat_id: &str) -> Result<UserView> {
        let searches = Self::load_searches(conn, chat_id).await?;

        let mut seen = HashMap::with_capacity(searches.len());
        for search in &searches {
            let rows = SeenItems::find()
                .filter(seen_items::Column::SearchId.eq(search.id.clone()))
                .all(conn)
                .await?;
            seen.insert(
                search.id.clone(),
                rows.into_iter().map(|r| r.item_id).collect::<HashSet<_>>(),
            );
        }

        let legacy_rows = LegacySeen::find()
            .filter(legacy_seen::Column::ChatId.eq(chat_id))
            .all(conn)
            .await?;

        let legacy_search = searches.last().cloned();

        Ok(UserView {
            chat_id: chat_id.to_string(),
            searches,
            seen,
            legacy_search,
            legacy_seen: legacy_rows.into_iter().map(|r| r.item_id).collect(),
        })
    }

    async fn load_searches<C: ConnectionTrait>(
        conn: &C,
        chat_id: &str,
    ) -> Result<Vec<SavedSearch>> {
        let rows = Searches::find()
            .filter(searches::Column::ChatId.eq(chat_id))
            .order_by_asc(searches::Column::CreatedAt)
            .all(conn)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let filters = SearchFilters::find()
                .filter(search_filters::Column::SearchId.eq(row.id.clone()))
                .order_by_asc(search_filters::Column::Id)
                .all(conn)
                .await?;

            let mut categories = Vec::new();
            let mut regions = Vec::new();
            let mut sectors = Vec::new();
            for filter in filters {
                let value = FilterValue {
                    id: filter.value_id,
                    name: filter.value_name,
                };
                match FilterKind::parse(&filter.kind) {
                    Some(FilterKind::Category) => categories.push(value),
                    Some(FilterKind::Region) => regions.push(value),
                    Some(FilterKind::Sector) => sectors.push(value),
                    None => warn!(
                        "Ignoring unknown filter kind {:?} on search {}",
                        filter.kind, row.id
                    ),
                }
            }

            out.push(SavedSearch {
                id: row.id,
                text: row.text,
                label: row.label,
                categories,
                regions,
                sectors,
            });
        }
        Ok(out)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Upserts the user's saved-search list in one transaction: scalar
    /// fields are inserted-or-updated, filter rows are replaced wholesale,
    /// searches missing from the incoming list are deleted with their child
    /// rows, and seen ids are applied idempotently.
    pub async fn set_user(&self, chat_id: &str, view: &UserView) -> Result<()> {
        for search in &view.searches {
            if search.text.trim().is_empty() {
                return Err(SaveError::EmptyText {
                    id: search.id.clone(),
                }
                .into());
            }
            if search.categories.is_empty() {
                return Err(SaveError::NoCategories {
                    id: search.id.clone(),
                }
                .into());
            }
        }

        let txn = self.conn.begin().await?;
        Self::ensure_user(&txn, chat_id).await?;

        let existing: HashSet<String> = Searches::find()
            .filter(searches::Column::ChatId.eq(chat_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let mut incoming = HashSet::with_capacity(view.searches.len());
        for search in &view.searches {
            incoming.insert(search.id.clone());
            Self::upsert_search(&txn, chat_id, search).await?;
        }

        let stale: Vec<String> = existing.difference(&incoming).cloned().collect();
        if !stale.is_empty() {
            Self::delete_searches(&txn, &stale).await?;
        }

        for (search_id, ids) in &view.seen {
            // Seen rows for a search deleted in this same call would dangle.
            if !incoming.contains(search_id) {
                continue;
            }
            Self::insert_seen(&txn, search_id, ids.iter()).await?;
        }

        if !view.legacy_seen.is_empty() {
            Self::insert_legacy_seen(&txn, chat_id, view.legacy_seen.iter()).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Idempotent append to the per-search or legacy seen-set.
    pub async fn append_seen(&self, chat_id: &str, key: &SeenKey, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let txn = self.conn.begin().await?;
        Self::ensure_user(&txn, chat_id).await?;
        match key {
            SeenKey::Search(search_id) => Self::insert_seen(&txn, search_id, ids.iter()).await?,
            SeenKey::Legacy => Self::insert_legacy_seen(&txn, chat_id, ids.iter()).await?,
        }
        txn.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn ensure_user<C: ConnectionTrait>(conn: &C, chat_id: &str) -> Result<()> {
        Users::insert(users::ActiveModel {
            chat_id: Set(chat_id.to_string()),
            created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
        })
        .on_conflict(
            OnConflict::column(users::Column::ChatId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
        Ok(())
    }

    async fn upsert_search(
        txn: &DatabaseTransaction,
        chat_id: &str,
        search: &SavedSearch,
    ) -> Result<()> {
        Searches::insert(searches::ActiveModel {
            id: Set(search.id.clone()),
            chat_id: Set(chat_id.to_string()),
            text: Set(search.text.clone()),
            label: Set(search.label.clone()),
            created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
        })
        .on_conflict(
            OnConflict::column(searches::Column::Id)
                .update_columns([searches::Column::Text, searches::Column::Label])
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

        // Selections are small and rebuilt from scratch by the caller on
        // every save, so filter rows are replaced wholesale, not diffed.
        SearchFilters::delete_many()
            .filter(search_filters::Column::SearchId.eq(search.id.clone()))
            .exec(txn)
            .await?;

        let rows: Vec<search_filters::ActiveModel> = search
            .filter_rows()
            .map(|(kind, value)| search_filters::ActiveModel {
                search_id: Set(search.id.clone()),
                kind: Set(kind.as_str().to_string()),
                value_id: Set(value.id.clone()),
                value_name: Set(value.name.clone()),
                ..Default::default()
            })
            .collect();

        if !rows.is_empty() {
            SearchFilters::insert_many(rows).exec(txn).await?;
        }
        Ok(())
    }

    /// Child rows are removed explicitly so the no-orphans guarantee does
    /// not depend on the connection's `foreign_keys` pragma.
    async fn delete_searches(txn: &DatabaseTransaction, ids: &[String]) -> Result<()> {
        SeenItems::delete_many()
            .filter(seen_items::Column::SearchId.is_in(ids.iter().cloned()))
            .exec(txn)
            .await?;
        SearchFilters::delete_many()
            .filter(search_filters::Column::SearchId.is_in(ids.iter().cloned()))
            .exec(txn)
            .await?;
        Searches::delete_many()
            .filter(searches::Column::Id.is_in(ids.iter().cloned()))
            .exec(txn)
            .await?;

        info!("Deleted {} saved searches", ids.len());
        Ok(())
    }

    async fn insert_seen<'a, C, I>(conn: &C, search_id: &str, ids: I) -> Result<()>
    where
        C: ConnectionTrait,
        I: Iterator<Item = &'a String>,
    {
        let rows: Vec<seen_items::ActiveModel> = ids
            .map(|item_id| seen_items::ActiveModel {
                search_id: Set(search_id.to_string()),
                item_id: Set(item_id.clone()),
            })
            .collect();

        if rows.is_empty() {
            return Ok(());
        }

        SeenItems::insert_many(rows)
            .on_conflict(
                OnConflict::columns([seen_items::Column::SearchId, seen_items::Column::ItemId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_legacy_seen<'a, C, I>(conn: &C, chat_id: &str, ids: I) -> Result<()>
    where
        C: ConnectionTrait,
        I: Iterator<Item = &'a String>,
    {
        let rows: Vec<legacy_seen::ActiveModel> = ids
            .map(|item_id| legacy_seen::ActiveModel {
                chat_id: Set(chat_id.to_string()),
                item_id: Set(item_id.clone()),
            })
            .collect();

        if rows.is_empty() {
            return Ok(());
        }

        LegacySeen::insert_many(rows)
            .on_conflict(
                OnConflict::columns([legacy_seen::Column::ChatId, legacy_seen::Column::ItemId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}
