//! Tracked delayed and repeating tasks.
//!
//! Every task a room starts goes through a [`Timers`] set so that tearing the
//! room down aborts all of them at once. Tests drive these with a paused tokio
//! clock instead of waiting on the wall clock.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct Timers {
    inner: Mutex<TimerSet>,
}

#[derive(Debug, Default)]
struct TimerSet {
    handles: Vec<JoinHandle<()>>,
    cancelled: bool,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` immediately as a tracked task
    pub fn spawn<Fut>(&self, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_cancelled() {
            return;
        }
        self.track(tokio::spawn(task));
    }

    /// Run `f` once after `delay`
    pub fn after<F, Fut>(&self, delay: Duration, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            f().await;
        });
    }

    /// Run `f` every `period` (first call after one period) until it breaks
    pub fn every<F, Fut>(&self, period: Duration, mut f: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        self.spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if f().await.is_break() {
                    break;
                }
            }
        });
    }

    /// Abort every pending task; later registrations are dropped
    pub fn cancel_all(&self) {
        let mut set = self.lock();
        set.cancelled = true;
        for handle in set.handles.drain(..) {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Number of tasks still running
    pub fn pending(&self) -> usize {
        let mut set = self.lock();
        set.handles.retain(|h| !h.is_finished());
        set.handles.len()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut set = self.lock();
        if set.cancelled {
            handle.abort();
            return;
        }
        set.handles.retain(|h| !h.is_finished());
        set.handles.push(handle);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerSet> {
        // Nothing panics while holding this lock, so a poisoned set is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
