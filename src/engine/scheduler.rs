use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Owned background job: at most one live task per handle.
/// Arming always aborts the previous task first; dropping the handle aborts it too.
#[derive(Default)]
pub struct ScheduledTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel-then-replace. Returns false when no tokio runtime is available.
    pub fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(_) => {
                warn!("[SCHED] No tokio runtime, background task not armed");
                self.cancel();
                return false;
            }
        };
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = Some(runtime.spawn(future));
        true
    }

    /// Repeating tick; first tick fires one period after arming
    pub fn every<F>(&self, period: Duration, mut on_tick: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        self.spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                on_tick();
            }
        })
    }

    pub fn cancel(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.take() {
            old.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        let slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
