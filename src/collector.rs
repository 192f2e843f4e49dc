//! Restartable periodic trigger driving the collection workflow.
//!
//! The scheduler owns a three-state lifecycle (`Idle -> Running -> Stopping
//! -> Idle`). Each Start-to-Stop cycle is a generation with its own
//! cancellation token and loop task; all synchronization state is rebuilt
//! when the scheduler returns to `Idle`, so nothing leaks from one
//! generation into the next.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Error type produced by a scheduled task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Task =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;

/// Lifecycle state of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    Stopping,
}

/// Periodic trigger for a fallible, cancellable task.
///
/// Invocations within a generation never overlap: the loop runs the task to
/// completion before waiting for the next tick, and a tick that falls inside
/// a long-running invocation is absorbed rather than queued.
pub struct Scheduler {
    name: &'static str,
    interval: Duration,
    task: Task,
    inner: Mutex<Inner>,
}

struct Inner {
    lifecycle: Lifecycle,
    generation: u64,
    cancel: CancellationToken,
    loop_handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, task: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name,
            interval,
            task: Arc::new(move |cancel| Box::pin(task(cancel))),
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Idle,
                generation: 0,
                cancel: CancellationToken::new(),
                loop_handle: None,
            }),
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.inner.lock().lifecycle
    }

    /// Begin a generation: run the task immediately, then once per tick.
    ///
    /// Only effective from `Idle`; a call from any other state is ignored.
    /// Task failures are logged and never stop the loop.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.lifecycle != Lifecycle::Idle {
            tracing::debug!(
                name = self.name,
                state = ?inner.lifecycle,
                "start ignored"
            );
            return;
        }
        inner.lifecycle = Lifecycle::Running;

        // Spawning is synchronous, so the handle is stored under the same
        // lock that flipped the state; stop() can never observe Running
        // without a handle to await.
        let handle = tokio::spawn(run_loop(
            self.name,
            Arc::clone(&self.task),
            self.interval,
            inner.cancel.clone(),
        ));
        inner.loop_handle = Some(handle);

        tracing::info!(
            name = self.name,
            interval_ms = self.interval.as_millis() as u64,
            generation = inner.generation,
            "scheduler started"
        );
    }

    /// End the current generation: cancel the in-flight invocation, wait for
    /// the loop to terminate, then re-arm fresh state so the scheduler can
    /// be started again.
    ///
    /// Only effective from `Running`; a call from any other state is
    /// ignored.
    pub async fn stop(&self) {
        let handle = {
            let mut inner = self.inner.lock();
            if inner.lifecycle != Lifecycle::Running {
                tracing::debug!(
                    name = self.name,
                    state = ?inner.lifecycle,
                    "stop ignored"
                );
                return;
            }
            inner.lifecycle = Lifecycle::Stopping;
            inner.cancel.cancel();
            inner.loop_handle.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(name = self.name, error = %e, "scheduler loop join error");
            }
        }

        let mut inner = self.inner.lock();
        inner.lifecycle = Lifecycle::Idle;
        inner.generation += 1;
        inner.cancel = CancellationToken::new();
        inner.loop_handle = None;
        tracing::info!(name = self.name, generation = inner.generation, "scheduler re-armed");
    }
}

async fn run_loop(name: &'static str, task: Task, period: Duration, cancel: CancellationToken) {
    // stop() may have fired before this task was first polled.
    if cancel.is_cancelled() {
        return;
    }

    // Immediate first invocation. Invocations are always driven to
    // completion; cancellation is delivered through the token and observed
    // by the task itself.
    if let Err(e) = task(cancel.clone()).await {
        tracing::error!(name, error = %e, "initial collection error");
    }

    let mut ticker = tokio::time::interval(period);
    // A tick falling inside a long invocation is skipped, not queued.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the immediate tick; the task already ran

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tracing::debug!(name, "scheduler tick");
                if let Err(e) = task(cancel.clone()).await {
                    tracing::error!(name, error = %e, "collection error");
                }
            }
        }
    }

    tracing::info!(name, "scheduler loop stopped");
}
