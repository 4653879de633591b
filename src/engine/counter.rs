use crate::clock::Clock;
use crate::database::KeyValueStore;
use crate::engine::scheduler::ScheduledTask;
use crate::models::{LocalTimerStatus, TimerStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Локальный счетчик времени.
/// Владеет персистентной записью LocalTimerStatus и тиком elapsed (только пока running).
/// Порядок записи: сначала storage, потом публикация в watch.
pub struct LocalTimeCounter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    storage_key: String,
    tick_interval: Duration,
    status_tx: watch::Sender<LocalTimerStatus>,
    elapsed_tx: Arc<watch::Sender<u64>>,
    ticker: ScheduledTask,
}

impl LocalTimeCounter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        storage_key: impl Into<String>,
        tick_interval: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(LocalTimerStatus::default());
        let (elapsed_tx, _) = watch::channel(0u64);
        Self {
            store,
            clock,
            storage_key: storage_key.into(),
            tick_interval,
            status_tx,
            elapsed_tx: Arc::new(elapsed_tx),
            ticker: ScheduledTask::new(),
        }
    }

    /// Read the persisted record. Any read/parse failure means "no prior state".
    pub fn load_persisted(&self) -> Option<LocalTimerStatus> {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("[COUNTER] Failed to read local timer status: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<LocalTimerStatus>(&raw) {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(
                    "[COUNTER] Discarding unparseable local timer status: {}",
                    e
                );
                None
            }
        }
    }

    /// Rehydrate once per process. Persisted record wins; otherwise derive from the server.
    pub fn initialize(&self, server: Option<&TimerStatus>) -> LocalTimerStatus {
        let status = match self.load_persisted() {
            Some(persisted) => {
                info!(
                    "[COUNTER] Restored local timer status (running: {})",
                    persisted.running
                );
                persisted
            }
            None => {
                let server = server.cloned().unwrap_or_default();
                let derived = if server.running {
                    LocalTimerStatus::started(
                        server
                            .last_started_at
                            .unwrap_or_else(|| self.clock.now_ms()),
                        server.last_logged_task_id.clone(),
                    )
                } else {
                    LocalTimerStatus {
                        running: false,
                        started_at: 0,
                        last_task_id: server.last_logged_task_id.clone(),
                    }
                };
                debug!(
                    "[COUNTER] No persisted status, derived from server (running: {})",
                    derived.running
                );
                derived
            }
        };
        self.update(status.clone());
        status
    }

    /// Persist, then publish, then re-arm or cancel the tick
    pub fn update(&self, status: LocalTimerStatus) {
        match serde_json::to_string(&status) {
            Ok(json) => {
                if let Err(e) = self.store.set(&self.storage_key, &json) {
                    error!("[COUNTER] Failed to persist local timer status: {}", e);
                }
            }
            Err(e) => error!("[COUNTER] Failed to serialize local timer status: {}", e),
        }

        let running = status.running;
        let started_at = status.started_at;
        self.status_tx.send_replace(status);

        if running {
            self.elapsed_tx
                .send_replace(self.elapsed_since(started_at));
            let clock = self.clock.clone();
            let elapsed_tx = self.elapsed_tx.clone();
            self.ticker.every(self.tick_interval, move || {
                let elapsed = clock.now_ms().saturating_sub(started_at).max(0) as u64;
                elapsed_tx.send_replace(elapsed);
            });
        } else {
            self.ticker.cancel();
            self.elapsed_tx.send_replace(0);
        }
    }

    fn elapsed_since(&self, started_at: i64) -> u64 {
        self.clock.now_ms().saturating_sub(started_at).max(0) as u64
    }

    pub fn current(&self) -> LocalTimerStatus {
        self.status_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status_tx.borrow().running
    }

    /// Elapsed ms computed against the clock right now (0 when not running)
    pub fn elapsed_ms(&self) -> u64 {
        self.status_tx.borrow().elapsed_ms(self.clock.now_ms())
    }

    /// Last value published by the tick
    pub fn ticked_elapsed_ms(&self) -> u64 {
        *self.elapsed_tx.borrow()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_armed()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalTimerStatus> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed_tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.ticker.cancel();
    }
}
