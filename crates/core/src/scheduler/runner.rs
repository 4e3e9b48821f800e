//! Archival scheduler implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::ids::TicketId;
use crate::lifecycle::{ErrorKind, LifecycleError, TicketLifecycleEngine};
use crate::metrics;
use crate::ticket::Ticket;

use super::config::SchedulerConfig;
use super::types::{BackoffEntry, CycleReport, Phase, SchedulerError, SchedulerStatus};

type BackoffMap = Arc<Mutex<HashMap<TicketId, BackoffEntry>>>;

/// Outcome of processing one ticket.
enum Outcome {
    Done,
    Skipped,
    Failed,
}

/// Everything one cycle needs, cloned into the background task.
#[derive(Clone)]
struct CycleContext {
    engine: Arc<TicketLifecycleEngine>,
    config: SchedulerConfig,
    backoff: BackoffMap,
    last_report: Arc<RwLock<Option<CycleReport>>>,
}

/// Drives due tickets through archival and deletion on a fixed interval.
pub struct ArchivalScheduler {
    ctx: CycleContext,
    clock: Arc<dyn Clock>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ArchivalScheduler {
    /// Create a new scheduler.
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<TicketLifecycleEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            ctx: CycleContext {
                engine,
                config,
                backoff: Arc::new(Mutex::new(HashMap::new())),
                last_report: Arc::new(RwLock::new(None)),
            },
            clock,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the background loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Archival scheduler already running");
            return;
        }

        info!(
            interval_secs = self.ctx.config.interval_secs,
            "Starting archival scheduler"
        );
        self.spawn_cycle_loop();
    }

    /// Stop the background loop. A cycle in progress finishes its current
    /// ticket and then returns.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Archival scheduler not running");
            return;
        }

        info!("Stopping archival scheduler");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get current scheduler status.
    pub async fn status(&self) -> SchedulerStatus {
        let mut backoff: Vec<BackoffEntry> =
            self.ctx.backoff.lock().await.values().cloned().collect();
        backoff.sort_by_key(|entry| entry.retry_at);

        SchedulerStatus {
            running: self.is_running(),
            interval_secs: self.ctx.config.interval_secs,
            last_cycle: self.ctx.last_report.read().await.clone(),
            backoff,
        }
    }

    /// Run one cycle as of `now`, regardless of whether the loop is running.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        Self::cycle(&self.ctx, now, None).await
    }

    /// Run one cycle as of the clock's current time.
    pub async fn run_cycle_now(&self) -> CycleReport {
        self.run_cycle(self.clock.now()).await
    }

    fn spawn_cycle_loop(&self) {
        let ctx = self.ctx.clone();
        let clock = Arc::clone(&self.clock);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs(self.ctx.config.interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Archival loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Archival loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let report = Self::cycle(&ctx, clock.now(), Some(&running)).await;
                        if report.processed() > 0 || report.failed > 0 {
                            info!(
                                archived = report.archived,
                                deleted = report.deleted,
                                released = report.released,
                                failed = report.failed,
                                skipped = report.skipped,
                                "Archival cycle finished"
                            );
                        }
                    }
                }
            }
            info!("Archival loop stopped");
        });
    }

    async fn cycle(
        ctx: &CycleContext,
        now: DateTime<Utc>,
        running: Option<&AtomicBool>,
    ) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            started_at: Some(now),
            ..Default::default()
        };

        for phase in [Phase::Archive, Phase::Delete, Phase::Release] {
            let tickets = match Self::list(ctx, phase, now) {
                Ok(tickets) => tickets,
                Err(e) => {
                    error!(error = %e, "Scheduler phase skipped");
                    metrics::SCHEDULER_FAILURES
                        .with_label_values(&[phase.as_str()])
                        .inc();
                    continue;
                }
            };

            if !tickets.is_empty() {
                debug!(phase = %phase, count = tickets.len(), "Processing due tickets");
            }

            for ticket in tickets {
                if running.is_some_and(|r| !r.load(Ordering::Relaxed)) {
                    info!(phase = %phase, "Scheduler stopping mid-cycle");
                    report.interrupted = true;
                    break;
                }

                match Self::process(ctx, phase, &ticket, now).await {
                    Outcome::Done => match phase {
                        Phase::Archive => report.archived += 1,
                        Phase::Delete => report.deleted += 1,
                        Phase::Release => report.released += 1,
                    },
                    Outcome::Skipped => report.skipped += 1,
                    Outcome::Failed => report.failed += 1,
                }
            }

            if report.interrupted {
                break;
            }
        }

        metrics::SCHEDULER_CYCLES.inc();
        metrics::SCHEDULER_CYCLE_DURATION
            .with_label_values(&[])
            .observe(started.elapsed().as_secs_f64());

        *ctx.last_report.write().await = Some(report.clone());
        report
    }

    fn list(
        ctx: &CycleContext,
        phase: Phase,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, SchedulerError> {
        let registry = ctx.engine.registry();
        let result = match phase {
            Phase::Archive => registry.list_due_for_archival(now),
            Phase::Delete => registry.list_due_for_deletion(now),
            Phase::Release => registry.list_pending_channel_release(),
        };
        result.map_err(|source| SchedulerError::Listing { phase, source })
    }

    async fn process(
        ctx: &CycleContext,
        phase: Phase,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> Outcome {
        if let Some(entry) = ctx.backoff.lock().await.get(&ticket.id) {
            if entry.retry_at > now {
                debug!(ticket_id = %ticket.id, retry_at = %entry.retry_at, "Ticket in backoff");
                return Outcome::Skipped;
            }
        }

        let result = match phase {
            Phase::Archive => ctx.engine.archive_ticket(ticket).await,
            Phase::Delete => ctx.engine.delete_ticket(ticket).await,
            Phase::Release => ctx.engine.release_channel(ticket.id).await,
        };

        match result {
            Ok(_) => {
                ctx.backoff.lock().await.remove(&ticket.id);
                metrics::SCHEDULER_PROCESSED
                    .with_label_values(&[phase.as_str()])
                    .inc();
                Outcome::Done
            }
            // Changed under us by a user command; the next listing decides.
            Err(e) if e.kind() == ErrorKind::Conflict => {
                debug!(ticket_id = %ticket.id, phase = %phase, error = %e, "Ticket changed since listing");
                ctx.backoff.lock().await.remove(&ticket.id);
                Outcome::Skipped
            }
            Err(e) => {
                Self::record_failure(ctx, phase, ticket.id, &e, now).await;
                Outcome::Failed
            }
        }
    }

    async fn record_failure(
        ctx: &CycleContext,
        phase: Phase,
        ticket_id: TicketId,
        error: &LifecycleError,
        now: DateTime<Utc>,
    ) {
        metrics::SCHEDULER_FAILURES
            .with_label_values(&[phase.as_str()])
            .inc();

        let mut backoff = ctx.backoff.lock().await;
        let failures = backoff
            .get(&ticket_id)
            .map(|entry| entry.failures)
            .unwrap_or(0)
            + 1;
        let delay_secs = ctx.config.backoff_for(failures);
        let retry_at = chrono::Duration::try_seconds(i64::try_from(delay_secs).unwrap_or(i64::MAX))
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        warn!(
            ticket_id = %ticket_id,
            phase = %phase,
            failures,
            retry_in_secs = delay_secs,
            error = %error,
            "Scheduler failed to process ticket"
        );

        backoff.insert(
            ticket_id,
            BackoffEntry {
                ticket_id,
                phase,
                failures,
                retry_at,
                last_error: error.to_string(),
            },
        );
    }
}
