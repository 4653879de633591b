//! Client-side timer synchronization core.
//!
//! Keeps a locally ticking elapsed counter consistent with the server timer status,
//! survives restarts through a persisted record, forces a stop when the active
//! team/task changes, and gates "start" behind once-per-day confirmation rules.

mod clock;
mod database;
mod engine;
mod error;
pub mod keys;
mod models;
mod network;
mod stats;
mod tasks;

pub use clock::{Clock, SystemClock};
pub use database::{Database, KeyValueStore, MemoryStore};
pub use engine::counter::LocalTimeCounter;
pub use engine::decision::{ModalKind, StartContext, StartGate, StartStopDecisionEngine};
pub use engine::scheduler::ScheduledTask;
pub use engine::status::TimerStatusStore;
pub use engine::{CommandOutcome, TimerConfig, TimerPhase, TimerService, ToggleOutcome};
pub use error::TimerError;
pub use models::{
    DailyPlan, LocalTimerStatus, Task, TaskId, TaskStat, TaskStatistics, TaskStatus, TaskUpdate,
    TeamId, TimerDisplay, TimerStatus,
};
pub use network::{ApiConfig, HttpTimerStatusApi, TimerStatusApi};
pub use stats::{StatsTrigger, TaskStatisticsPoller, TaskStatisticsSource};
pub use tasks::TaskStore;


/// Инициализация логирования: по умолчанию info (если RUST_LOG не задан).
/// Повторный вызов безопасен.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
