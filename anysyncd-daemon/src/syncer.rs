//! Per-syncer actor: event coalescing, quiescence timer, noop gate, and
//! pipeline worker offload.
//!
//! Each syncer runs as one task owning all of its mutable state; watcher
//! callbacks, timer fires, cron ticks, and pipeline completions arrive as
//! messages on its channel, which serializes every state transition. The
//! `locked` flag is the single pipeline gate: taken on entry, released on
//! every completion path. Only the `pending` set is shared with the pipeline
//! worker, because the worker drains and re-checks it mid-run.
//!
//! The quiescence timer is deliberately *not* re-armed by later events: the
//! first event after a quiet period opens a fixed window, so a steady
//! trickle of writes cannot starve the pipeline. Further writes accumulate
//! in `pending` and are picked up by the local-mirror loop.

use std::sync::Arc;

use cron::Schedule;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use anysyncd_core::stamps::unix_now;
use anysyncd_core::types::{Handler, SyncerConfig, SyncerName};
use anysyncd_core::{DaemonConfig, StampStore};
use anysyncd_sync::pipeline::{self, PipelineContext, PipelineRun};
use anysyncd_sync::{MirrorRunner, PendingSet, RemoteRunner, SyncError};

use crate::cron_trigger;
use crate::error::DaemonError;
use crate::reporter::Reporter;

/// Messages delivered to a syncer actor.
#[derive(Debug)]
pub enum SyncerEvent {
    /// Filtered watcher paths, the coalescer's add-path operation.
    Paths(Vec<String>),
    /// The quiescence timer fired.
    TimerFired { generation: u64 },
    /// Periodic full-sync trigger.
    CronTick,
    /// A pipeline worker finished.
    PipelineDone(Result<PipelineRun, SyncError>),
}

/// Handle to a running syncer actor.
pub struct SyncerHandle {
    pub name: SyncerName,
    tx: mpsc::UnboundedSender<SyncerEvent>,
    join: JoinHandle<()>,
}

impl SyncerHandle {
    /// Feed paths into the coalescer, as the watcher would.
    pub fn add_paths<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let _ = self.tx.send(SyncerEvent::Paths(paths));
    }

    /// Request an out-of-band full sync, as the cron trigger would.
    pub fn trigger_full_sync(&self) {
        let _ = self.tx.send(SyncerEvent::CronTick);
    }

    /// Wait for the actor to finish after shutdown was broadcast.
    pub async fn join(self) {
        if let Err(err) = self.join.await {
            tracing::warn!(syncer = %self.name, error = %err, "syncer task join failure");
        }
    }
}

/// Validate and start one syncer actor.
///
/// Fails only on instantiation-time configuration problems (bad cron
/// expression); the caller logs and skips the syncer, the daemon continues.
pub fn spawn(
    cfg: SyncerConfig,
    daemon: &DaemonConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<SyncerHandle, DaemonError> {
    let schedule = match &cfg.cron {
        Some(expr) => Some(cron_trigger::parse_schedule(expr).map_err(|message| {
            DaemonError::InvalidCron {
                syncer: cfg.name.to_string(),
                message,
            }
        })?),
        None => None,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let name = cfg.name.clone();
    let actor = Syncer::new(cfg, daemon, schedule, tx.clone());
    let join = tokio::spawn(actor.run(rx, shutdown));

    Ok(SyncerHandle { name, tx, join })
}

struct Syncer {
    cfg: SyncerConfig,
    reporter: Reporter,
    stamps: StampStore,
    pending: Arc<PendingSet>,
    mirror: MirrorRunner,
    remote: RemoteRunner,
    csync_command: String,
    schedule: Option<Schedule>,
    locked: bool,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    watcher: Option<RecommendedWatcher>,
    tx: mpsc::UnboundedSender<SyncerEvent>,
}

impl Syncer {
    fn new(
        cfg: SyncerConfig,
        daemon: &DaemonConfig,
        schedule: Option<Schedule>,
        tx: mpsc::UnboundedSender<SyncerEvent>,
    ) -> Self {
        let prefix = match &cfg.handler {
            Handler::Csync2 {
                remote_prefix_command,
                ..
            } => remote_prefix_command.clone(),
            Handler::Mirror { .. } => None,
        };

        Self {
            reporter: Reporter::new(&cfg),
            stamps: StampStore::open(&daemon.statedir, cfg.name.clone()),
            pending: Arc::new(PendingSet::new()),
            mirror: MirrorRunner::new(&daemon.rsync_command),
            remote: RemoteRunner::new(&daemon.remote_shell, prefix, &daemon.remote_helper),
            csync_command: daemon.csync_command.clone(),
            schedule,
            locked: false,
            timer: None,
            timer_generation: 0,
            watcher: None,
            tx,
            cfg,
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<SyncerEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        self.ensure_watcher();
        self.spawn_cron(shutdown.resubscribe());

        tracing::info!(
            syncer = %self.cfg.name,
            handler = %self.cfg.handler.kind(),
            watcher = %self.cfg.watcher.display(),
            "syncer started"
        );
        if self.noop_paused() {
            tracing::info!(syncer = %self.cfg.name, "noop file absent; starting paused");
        } else {
            self.start_pipeline(true);
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.handle(event);
                }
            }
        }

        // In-flight pipelines are abandoned; the next startup re-runs a
        // full sync.
        self.watcher = None;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        tracing::info!(syncer = %self.cfg.name, "syncer stopped");
    }

    fn handle(&mut self, event: SyncerEvent) {
        match event {
            SyncerEvent::Paths(paths) => self.on_paths(paths),
            SyncerEvent::TimerFired { generation } => self.on_timer(generation),
            SyncerEvent::CronTick => self.on_cron_tick(),
            SyncerEvent::PipelineDone(result) => self.on_pipeline_done(result),
        }
    }

    // -- Coalescer -----------------------------------------------------------

    fn on_paths(&mut self, paths: Vec<String>) {
        if self.noop_paused() {
            if self.watcher.take().is_some() {
                tracing::info!(syncer = %self.cfg.name, "noop file absent; syncer paused");
            }
            return;
        }
        self.ensure_watcher();

        let count = paths.len();
        self.pending.add(paths);
        tracing::debug!(
            syncer = %self.cfg.name,
            added = count,
            pending = self.pending.len(),
            "paths queued"
        );

        if self.timer.is_none() {
            // First event of a quiescence window.
            if let Err(err) = self.stamps.set_lastchange(unix_now()) {
                tracing::warn!(syncer = %self.cfg.name, error = %err, "lastchange stamp not written");
            }
            self.arm_timer();
        }
    }

    fn arm_timer(&mut self) {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let delay = self.cfg.waiting_time;
        let tx = self.tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SyncerEvent::TimerFired { generation });
        }));
    }

    fn on_timer(&mut self, generation: u64) {
        if generation != self.timer_generation || self.timer.is_none() {
            return; // stale fire from a replaced timer
        }
        self.timer = None;

        if self.locked {
            tracing::debug!(
                syncer = %self.cfg.name,
                "pipeline busy; dropping quiescence fire"
            );
            return;
        }
        self.start_pipeline(false);
    }

    // -- Cron trigger --------------------------------------------------------

    fn spawn_cron(&self, mut shutdown: broadcast::Receiver<()>) {
        let Some(schedule) = self.schedule.clone() else {
            return;
        };
        let tx = self.tx.clone();
        let name = self.cfg.name.clone();
        tokio::spawn(async move {
            loop {
                let Some(delay) = cron_trigger::next_delay(&schedule, chrono::Local::now())
                else {
                    tracing::warn!(syncer = %name, "cron schedule has no future occurrences");
                    break;
                };
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(delay) => {
                        if tx.send(SyncerEvent::CronTick).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn on_cron_tick(&mut self) {
        if self.noop_paused() {
            if self.watcher.take().is_some() {
                tracing::info!(syncer = %self.cfg.name, "noop file absent; syncer paused");
            }
            return;
        }
        self.ensure_watcher();

        if self.locked || self.timer.is_some() {
            tracing::debug!(
                syncer = %self.cfg.name,
                locked = self.locked,
                "skipping cron full sync"
            );
            return;
        }
        self.start_pipeline(true);
    }

    // -- Pipeline offload ----------------------------------------------------

    fn start_pipeline(&mut self, full_sync: bool) {
        if self.locked {
            return;
        }
        self.locked = true;

        let ctx = PipelineContext {
            name: self.cfg.name.clone(),
            handler: self.cfg.handler.clone(),
            mirror: self.mirror.clone(),
            remote: self.remote.clone(),
            csync_command: self.csync_command.clone(),
            pending: Arc::clone(&self.pending),
            retry_interval: self.cfg.retry_interval,
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = pipeline::run(&ctx, full_sync).await;
            let _ = tx.send(SyncerEvent::PipelineDone(result));
        });
    }

    fn on_pipeline_done(&mut self, result: Result<PipelineRun, SyncError>) {
        self.locked = false;
        match result {
            Ok(PipelineRun::Completed { start_ts }) => {
                tracing::info!(syncer = %self.cfg.name, start_ts, "sync completed");
                if let Err(err) = self.stamps.set_success(start_ts) {
                    tracing::warn!(syncer = %self.cfg.name, error = %err, "success stamp not written");
                }
            }
            Ok(PipelineRun::Skipped) => {
                tracing::debug!(syncer = %self.cfg.name, "nothing to sync");
            }
            Err(err) => self.reporter.report(&err),
        }
    }

    // -- Noop gate and watcher lifecycle -------------------------------------

    fn noop_paused(&self) -> bool {
        self.cfg.noop_file.as_ref().is_some_and(|path| !path.exists())
    }

    fn ensure_watcher(&mut self) {
        if self.watcher.is_some() || self.noop_paused() {
            return;
        }
        match subscribe(&self.cfg, self.tx.clone()) {
            Ok(watcher) => {
                self.watcher = Some(watcher);
                tracing::debug!(
                    syncer = %self.cfg.name,
                    path = %self.cfg.watcher.display(),
                    "watcher subscribed"
                );
            }
            Err(err) => {
                tracing::warn!(
                    syncer = %self.cfg.name,
                    error = %err,
                    "watcher subscription failed; will retry on next trigger"
                );
            }
        }
    }
}

/// Create the recursive notify subscription for a syncer.
///
/// Filtering happens in the callback so uninteresting events never cross
/// into the actor. Missed events are not reconstructed; the pipeline's
/// full-mirror semantics are authoritative.
fn subscribe(
    cfg: &SyncerConfig,
    tx: mpsc::UnboundedSender<SyncerEvent>,
) -> Result<RecommendedWatcher, notify::Error> {
    let filter = cfg.filter.clone();
    let name = cfg.name.clone();
    let mut watcher = recommended_watcher(move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(syncer = %name, error = %err, "watcher event error");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        let paths: Vec<String> = event
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .filter(|p| !filter.is_match(p))
            .collect();
        if !paths.is_empty() {
            let _ = tx.send(SyncerEvent::Paths(paths));
        }
    })?;
    watcher.watch(&cfg.watcher, RecursiveMode::Recursive)?;
    Ok(watcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
