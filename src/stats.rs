use crate::engine::scheduler::ScheduledTask;
use crate::error::TimerError;
use crate::models::{TaskId, TaskStatistics, TeamId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[async_trait]
pub trait TaskStatisticsSource: Send + Sync {
    async fn fetch_statistics(&self) -> Result<TaskStatistics, TimerError>;
}

/// What the statistics depend on; a refresh fires only when this changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsTrigger {
    /// Running flag from the acknowledged server status, not the optimistic local record
    pub running: bool,
    pub task_id: Option<TaskId>,
    pub team_id: Option<TeamId>,
}

/// Debounced refresher of per-task statistics (trailing edge)
pub struct TaskStatisticsPoller {
    source: Arc<dyn TaskStatisticsSource>,
    debounce: Duration,
    last_trigger: Mutex<Option<StatsTrigger>>,
    pending: ScheduledTask,
    latest_tx: Arc<watch::Sender<Option<TaskStatistics>>>,
    is_fetching: Arc<AtomicBool>,
}

impl TaskStatisticsPoller {
    pub fn new(source: Arc<dyn TaskStatisticsSource>, debounce: Duration) -> Self {
        let (latest_tx, _) = watch::channel(None);
        Self {
            source,
            debounce,
            last_trigger: Mutex::new(None),
            pending: ScheduledTask::new(),
            latest_tx: Arc::new(latest_tx),
            is_fetching: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule a refresh if the trigger differs from the previous one.
    /// A newer schedule cancels the pending one.
    pub fn notify(&self, trigger: StatsTrigger) -> bool {
        {
            let mut last = self.last_trigger.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_ref() == Some(&trigger) {
                return false;
            }
            debug!("[STATS] Trigger changed: {:?}", trigger);
            *last = Some(trigger);
        }
        self.schedule()
    }

    /// Debounced refresh regardless of the trigger
    pub fn schedule(&self) -> bool {
        let source = self.source.clone();
        let latest_tx = self.latest_tx.clone();
        let is_fetching = self.is_fetching.clone();
        let debounce = self.debounce;
        self.pending.spawn(async move {
            tokio::time::sleep(debounce).await;
            is_fetching.store(true, Ordering::Release);
            let _guard = scopeguard::guard((), |_| {
                is_fetching.store(false, Ordering::Release);
            });
            match source.fetch_statistics().await {
                Ok(stats) => {
                    info!(
                        "[STATS] Task statistics refreshed ({} tasks)",
                        stats.all.len()
                    );
                    latest_tx.send_replace(Some(stats));
                }
                Err(e) => warn!("[STATS] Failed to refresh task statistics: {}", e),
            }
        })
    }

    pub fn latest(&self) -> Option<TaskStatistics> {
        self.latest_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TaskStatistics>> {
        self.latest_tx.subscribe()
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.pending.cancel();
    }
}
