use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::sync::Notify;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::clients::inpa::{CatalogSearch, InpaClient};
use crate::clients::telegram::{NotificationSink, TelegramClient};
use crate::config::{Config, SchedulerConfig};
use crate::db::Store;
use crate::services::poller::{CycleStats, Poller};

/// Shared handles for everything a poll cycle needs.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub inpa: Arc<InpaClient>,
    pub telegram: Arc<TelegramClient>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let timeout = Duration::from_secs(config.general.request_timeout_seconds);
        let inpa = Arc::new(InpaClient::new(&config.inpa.base_url, timeout)?);
        let telegram = Arc::new(TelegramClient::new(
            &config.telegram.api_url,
            &config.telegram.bot_token,
            timeout,
        )?);

        Ok(Self {
            config,
            store,
            inpa,
            telegram,
        })
    }

    #[must_use]
    pub fn poller(&self, running: Arc<AtomicBool>) -> Poller {
        Poller::new(
            self.store.clone(),
            Arc::clone(&self.inpa) as Arc<dyn CatalogSearch>,
            Arc::clone(&self.telegram) as Arc<dyn NotificationSink>,
            Duration::from_secs(self.config.scheduler.user_delay_seconds),
            running,
        )
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    poller: Arc<Poller>,
    running: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Scheduler {
    #[must_use]
    pub fn new(state: &AppState) -> Self {
        let running = Arc::new(AtomicBool::new(false));
        let poller = Arc::new(state.poller(Arc::clone(&running)));

        Self {
            config: state.config.scheduler.clone(),
            poller,
            running,
            in_flight: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        info!("Starting background scheduler");

        if let Some(cron_expr) = self.config.cron_expression.clone() {
            self.run_with_cron(&cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.poll_interval_minutes;
        info!("Scheduler polling every {} minutes", interval_mins);

        let mut ticker = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        // A late tick must not burst into a backlog of catch-up cycles.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    run_guarded(&self.poller, &self.in_flight).await;
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                }
                () = self.shutdown.notified() => break,
            }
        }

        Ok(())
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let poller = Arc::clone(&self.poller);
        let running = Arc::clone(&self.running);
        let in_flight = Arc::clone(&self.in_flight);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let poller = Arc::clone(&poller);
            let running = Arc::clone(&running);
            let in_flight = Arc::clone(&in_flight);
            Box::pin(async move {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                run_guarded(&poller, &in_flight).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    /// Lets an in-flight cycle finish its current user, then stops.
    pub fn stop(&self) {
        info!("Stopping scheduler...");
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Runs exactly one cycle, outside any timer.
    pub async fn run_once(&self) -> Result<CycleStats> {
        info!("Running manual check...");
        self.running.store(true, Ordering::SeqCst);
        self.poller.run_cycle().await
    }
}

/// Runs one cycle unless a previous one is still in flight; overlapping
/// triggers are dropped, not queued.
async fn run_guarded(poller: &Poller, in_flight: &AtomicBool) {
    if in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Previous poll cycle still running, skipping this trigger");
        return;
    }

    if let Err(e) = poller.run_cycle().await {
        error!("Poll cycle failed: {e:#}");
    }

    in_flight.store(false, Ordering::SeqCst);
}
