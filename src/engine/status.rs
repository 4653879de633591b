use crate::models::TimerStatus;
use tokio::sync::watch;

/// Последний авторитетный статус от сервера (None до первого ответа)
pub struct TimerStatusStore {
    tx: watch::Sender<Option<TimerStatus>>,
}

impl Default for TimerStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerStatusStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Wholesale replacement, returns the previous value
    pub fn replace(&self, status: TimerStatus) -> Option<TimerStatus> {
        self.tx.send_replace(Some(status))
    }

    pub fn current(&self) -> Option<TimerStatus> {
        self.tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.tx.borrow().as_ref().map(|s| s.running).unwrap_or(false)
    }

    pub fn duration(&self) -> u64 {
        self.tx.borrow().as_ref().map(|s| s.duration).unwrap_or(0)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TimerStatus>> {
        self.tx.subscribe()
    }
}
