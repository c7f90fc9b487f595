//! Flow-scoped cancellation and repeating tasks.
//!
//! Every periodic activity of a flow is tied to a [`CancelToken`]. Cancelling
//! is idempotent, and a [`TaskHandle`] cancels its task when dropped, so each
//! exit path runs exactly one cleanup.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

/// Cancellation flag shared by everything running inside one flow.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Cancelling twice is a no-op.
    pub fn cancel(&self) {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// A token cancelled together with this one, but cancellable on its own.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }
        let parent = self.clone();
        let linked = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => linked.cancel(),
                _ = linked.cancelled() => {}
            }
        });
        child
    }
}

/// Handle to a spawned repeating task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Stop the task. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the task to finish (after it stopped itself or was cancelled).
    pub async fn join(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Whether a repeating task keeps going after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Run `tick` every `period`, starting with an immediate first tick.
///
/// Ticks never overlap: a tick that runs past the next deadline causes that
/// deadline to be skipped rather than queued. The task ends when `tick`
/// returns [`Tick::Stop`], when `parent` is cancelled, or when the returned
/// handle is cancelled or dropped.
pub fn spawn_repeating<F, Fut>(parent: &CancelToken, period: Duration, tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Tick> + Send,
{
    spawn_interval(parent, tokio::time::interval(period), tick)
}

/// Like [`spawn_repeating`], but the first tick fires after one `period`.
pub fn spawn_repeating_after<F, Fut>(parent: &CancelToken, period: Duration, tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Tick> + Send,
{
    let start = tokio::time::Instant::now() + period;
    spawn_interval(parent, tokio::time::interval_at(start, period), tick)
}

fn spawn_interval<F, Fut>(parent: &CancelToken, mut interval: Interval, mut tick: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Tick> + Send,
{
    let token = parent.child();
    let task_token = token.clone();

    let join = tokio::spawn(async move {
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!("Repeating task cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let step = tokio::select! {
                        biased;
                        _ = task_token.cancelled() => Tick::Stop,
                        step = tick() => step,
                    };
                    if step == Tick::Stop {
                        break;
                    }
                }
            }
        }
    });

    TaskHandle {
        token,
        join: Some(join),
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `true` when the full delay elapsed.
pub async fn sleep_or_cancel(cancel: &CancelToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
