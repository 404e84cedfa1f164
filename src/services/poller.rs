//! One poll cycle: for every user, for every saved search, run
//! expand → aggregate → diff → notify → commit. Failures are isolated at
//! the smallest unit that makes sense — one catalog call degrades one
//! query, one store failure aborts one user, nothing aborts the cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::clients::inpa::CatalogSearch;
use crate::clients::telegram::{self, NotificationSink};
use crate::db::Store;
use crate::models::user::{SeenKey, UserView, WorkItem};
use crate::services::{aggregate, seen};

/// Outcome counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub users: usize,
    pub searches: usize,
    pub new_items: usize,
    pub failed_queries: usize,
    pub skipped_invalid: usize,
}

#[derive(Debug, Default)]
struct SearchOutcome {
    new_items: usize,
    failed_queries: usize,
    skipped: bool,
}

pub struct Poller {
    store: Store,
    catalog: Arc<dyn CatalogSearch>,
    sink: Arc<dyn NotificationSink>,
    user_delay: Duration,
    running: Arc<AtomicBool>,
}

impl Poller {
    #[must_use]
    pub fn new(
        store: Store,
        catalog: Arc<dyn CatalogSearch>,
        sink: Arc<dyn NotificationSink>,
        user_delay: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            catalog,
            sink,
            user_delay,
            running,
        }
    }

    /// Runs one full pass over every user. Stops between users when the
    /// running flag drops, so an in-flight transaction is never cut short.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let users = self.store.all_users().await?;
        let mut stats = CycleStats {
            users: users.len(),
            ..CycleStats::default()
        };

        info!("Polling {} users", users.len());

        for (i, view) in users.iter().enumerate() {
            if !self.running.load(Ordering::SeqCst) {
                info!("Stop requested, ending cycle after {} of {} users", i, users.len());
                break;
            }

            if let Err(e) = self.process_user(view, &mut stats).await {
                warn!("Failed to process user {}: {e:#}", view.chat_id);
            }

            if !self.user_delay.is_zero() && i + 1 < users.len() {
                tokio::time::sleep(self.user_delay).await;
            }
        }

        info!(
            "Cycle complete: {} new items across {} searches ({} failed queries)",
            stats.new_items, stats.searches, stats.failed_queries
        );
        Ok(stats)
    }

    /// Processes one user's searches (or their legacy search). A store
    /// failure on one search aborts this user only; the error is reported
    /// to the cycle loop.
    pub async fn process_user(&self, view: &UserView, stats: &mut CycleStats) -> Result<()> {
        for work in view.work_items() {
            let outcome = self.process_search(view, &work).await?;
            if outcome.skipped {
                stats.skipped_invalid += 1;
            } else {
                stats.searches += 1;
            }
            stats.new_items += outcome.new_items;
            stats.failed_queries += outcome.failed_queries;
        }
        Ok(())
    }

    async fn process_search(
        &self,
        view: &UserView,
        work: &WorkItem<'_>,
    ) -> Result<SearchOutcome> {
        let search = work.search;

        let specs = search.expand();
        if specs.is_empty() {
            // A persisted search always carries a category; hitting this
            // means the row is corrupt. Skip it without alarming the user.
            warn!(
                "Skipping search {} for user {}: no categories selected",
                search.id, view.chat_id
            );
            return Ok(SearchOutcome {
                skipped: true,
                ..SearchOutcome::default()
            });
        }

        debug!("Running {} queries for {:?}", specs.len(), search.label());
        let merged = aggregate::aggregate(self.catalog.as_ref(), &specs).await;

        if merged.all_failed() {
            self.notify(
                &view.chat_id,
                &telegram::check_failed_message(&search.label(), merged.errors),
            )
            .await;
            return Ok(SearchOutcome {
                failed_queries: merged.errors,
                ..SearchOutcome::default()
            });
        }

        let empty = HashSet::new();
        let seen_ids = view.seen_for(&work.key).unwrap_or(&empty);
        let fresh = seen::diff(seen_ids, &merged.items);
        if fresh.is_empty() {
            return Ok(SearchOutcome {
                failed_queries: merged.errors,
                ..SearchOutcome::default()
            });
        }

        info!(
            "{} new items for user {} ({})",
            fresh.len(),
            view.chat_id,
            search.label()
        );

        let label = matches!(work.key, SeenKey::Search(_)).then(|| search.label());
        for item in &fresh {
            self.notify(
                &view.chat_id,
                &telegram::new_item_message(label.as_deref(), item),
            )
            .await;
        }

        let ids: Vec<String> = fresh.iter().map(|item| item.id.clone()).collect();
        self.store.append_seen(&view.chat_id, &work.key, &ids).await?;

        Ok(SearchOutcome {
            new_items: fresh.len(),
            failed_queries: merged.errors,
            skipped: false,
        })
    }

    /// Delivery failures are logged and never block the seen-set commit; a
    /// silently dropped message is re-sent on a later cycle at worst.
    async fn notify(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.sink.send(chat_id, text).await {
            warn!("Failed to notify user {chat_id}: {e:#}");
        }
    }
}
