//! Signal-triggered scheduling, one worker task per pipeline.
//!
//! Each pipeline has a capacity-1 signal channel. [`SyncHandle::trigger`]
//! never blocks: if a request is already pending the new one is dropped, so
//! any number of triggers during a pass collapses into a single re-run.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::error::SyncError;
use super::pipeline::{PassReport, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Repairing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub high_water_mark: i64,
    pub last_error: Option<String>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            passes_completed: 0,
            passes_failed: 0,
            high_water_mark: 0,
            last_error: None,
        }
    }
}

/// Per-pipeline run state, owned by the worker and observable via
/// [`PipelineContext::subscribe`].
pub struct PipelineContext {
    name: &'static str,
    status: watch::Sender<PipelineStatus>,
}

impl PipelineContext {
    pub fn new(name: &'static str) -> Self {
        let (status, _) = watch::channel(PipelineStatus::default());
        Self { name, status }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn set_state(&self, state: PipelineState) {
        self.status.send_if_modified(|s| {
            let changed = s.state != state;
            s.state = state;
            changed
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.status.subscribe()
    }

    fn record_success(&self, report: &PassReport) {
        self.status.send_modify(|s| {
            s.state = PipelineState::Idle;
            s.passes_completed += 1;
            s.high_water_mark = report.high_water_mark;
            s.last_error = None;
        });
    }

    fn record_failure(&self, err: &SyncError) {
        self.status.send_modify(|s| {
            s.state = PipelineState::Idle;
            s.passes_failed += 1;
            s.last_error = Some(err.to_string());
        });
    }
}

/// Trigger side of a pipeline. Dropping every handle stops its worker.
pub struct SyncHandle {
    name: &'static str,
    signal: mpsc::Sender<()>,
    status: watch::Receiver<PipelineStatus>,
}

impl SyncHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request a catch-up pass. Returns `false` when the request was
    /// coalesced into one already pending.
    pub fn trigger(&self) -> bool {
        match self.signal.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                tracing::trace!("{}: sync already pending, trigger coalesced", self.name);
                false
            }
            Err(TrySendError::Closed(())) => {
                tracing::warn!("{}: sync worker has stopped, trigger dropped", self.name);
                false
            }
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.status.clone()
    }
}

/// Spawn the worker for one pipeline onto `tasks`.
pub fn spawn_pipeline(pipeline: Pipeline, tasks: &mut JoinSet<()>) -> SyncHandle {
    let name = pipeline.name();
    let (signal, signals) = mpsc::channel(1);
    let ctx = PipelineContext::new(name);
    let status = ctx.subscribe();

    tasks.spawn(run_worker(pipeline, ctx, signals));

    SyncHandle {
        name,
        signal,
        status,
    }
}

async fn run_worker(pipeline: Pipeline, ctx: PipelineContext, mut signals: mpsc::Receiver<()>) {
    tracing::info!("{}: sync worker started", ctx.name());

    while signals.recv().await.is_some() {
        match pipeline.run_pass(&ctx).await {
            Ok(report) => {
                if report.rows_committed > 0 || report.rows_deleted > 0 {
                    tracing::info!(
                        "{}: pass complete, {} rows committed, {} rows deleted, high-water mark {}",
                        ctx.name(),
                        report.rows_committed,
                        report.rows_deleted,
                        report.high_water_mark
                    );
                } else {
                    tracing::debug!(
                        "{}: pass complete, up to date at block {}",
                        ctx.name(),
                        report.high_water_mark
                    );
                }
                ctx.record_success(&report);
            }
            Err(e) => {
                tracing::error!("{}: pass failed, will retry on next trigger: {}", ctx.name(), e);
                ctx.record_failure(&e);
            }
        }
    }

    ctx.set_state(PipelineState::Stopped);
    tracing::info!("{}: sync worker stopped", ctx.name());
}

/// Owns the pipeline workers and their trigger handles.
#[derive(Default)]
pub struct Scheduler {
    handles: Vec<SyncHandle>,
    workers: JoinSet<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pipeline: Pipeline) {
        let handle = spawn_pipeline(pipeline, &mut self.workers);
        self.handles.push(handle);
    }

    pub fn handles(&self) -> &[SyncHandle] {
        &self.handles
    }

    pub fn trigger_all(&self) {
        for handle in &self.handles {
            handle.trigger();
        }
    }

    /// Close every signal channel and wait for in-flight passes to finish.
    pub async fn shutdown(mut self) {
        self.handles.clear();
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("sync worker panicked: {}", e);
            }
        }
    }
}
