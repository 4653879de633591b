use crate::clock::Clock;
use crate::database::KeyValueStore;
use crate::error::TimerError;
use crate::keys;
use crate::models::{TaskId, TeamId, TimerStatus};
use crate::network::TimerStatusApi;
use crate::stats::{TaskStatisticsPoller, TaskStatisticsSource};
use crate::tasks::TaskStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod core;
pub mod counter;
pub mod decision;
pub mod scheduler;
pub mod status;

use counter::LocalTimeCounter;
use decision::{ModalKind, StartStopDecisionEngine};
use scheduler::ScheduledTask;
use status::TimerStatusStore;

/// Конфигурация ядра таймера
#[derive(Clone, Debug)]
pub struct TimerConfig {
    /// Период пересчета elapsed пока таймер идет
    pub tick_interval: Duration,
    pub stats_debounce: Duration,
    pub status_refresh_interval: Duration,
    pub storage_key: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            stats_debounce: Duration::from_millis(100),
            status_refresh_interval: Duration::from_secs(60),
            storage_key: keys::LOCAL_TIMER_STATUS.to_string(),
        }
    }
}

/// Двухфазная FSM контроллера.
/// Pending-состояния несут номер команды; ответ применяется только для последней команды.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(tag = "state")]
pub enum TimerPhase {
    Idle,
    PendingStart { seq: u64 },
    Running,
    PendingStop { seq: u64 },
}

impl TimerPhase {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            TimerPhase::PendingStart { .. } | TimerPhase::PendingStop { .. }
        )
    }
}

/// Result of a start/stop command. Errors are reported here, never thrown.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Nothing to do (start without an active task)
    Skipped,
    /// Server acknowledged; status store and local record reconciled
    Applied(TimerStatus),
    /// A newer command was issued before this response arrived; response discarded
    Superseded,
    /// Network/API failure; optimistic local state kept until the next refresh
    Failed(TimerError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Stopped(CommandOutcome),
    Started(CommandOutcome),
    ModalOpened(ModalKind),
}

/// Последние наблюдавшиеся active team / active task (для forced stop)
#[derive(Debug, Default)]
pub(crate) struct ObservedContext {
    pub(crate) team_id: Option<TeamId>,
    pub(crate) task_id: Option<TaskId>,
}

/// Timer Service - ядро синхронизации таймера.
/// Все зависимости внедряются, глобального состояния нет.
pub struct TimerService {
    pub(crate) api: Arc<dyn TimerStatusApi>,
    pub(crate) tasks: Arc<dyn TaskStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) counter: LocalTimeCounter,
    pub(crate) status: TimerStatusStore,
    pub(crate) gate: StartStopDecisionEngine,
    pub(crate) stats: Option<TaskStatisticsPoller>,
    pub(crate) phase: Mutex<TimerPhase>,
    /// Номер последней выданной команды start/stop
    pub(crate) command_seq: AtomicU64,
    pub(crate) observed: Mutex<ObservedContext>,
    pub(crate) start_in_flight: AtomicBool,
    pub(crate) stop_in_flight: AtomicBool,
    pub(crate) status_in_flight: AtomicBool,
    pub(crate) refresher: ScheduledTask,
    pub(crate) config: TimerConfig,
}

impl TimerService {
    pub fn new(
        api: Arc<dyn TimerStatusApi>,
        tasks: Arc<dyn TaskStore>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: TimerConfig,
    ) -> Self {
        let counter = LocalTimeCounter::new(
            store.clone(),
            clock.clone(),
            config.storage_key.clone(),
            config.tick_interval,
        );
        Self {
            api,
            tasks,
            clock,
            counter,
            status: TimerStatusStore::new(),
            gate: StartStopDecisionEngine::new(store),
            stats: None,
            phase: Mutex::new(TimerPhase::Idle),
            command_seq: AtomicU64::new(0),
            observed: Mutex::new(ObservedContext::default()),
            start_in_flight: AtomicBool::new(false),
            stop_in_flight: AtomicBool::new(false),
            status_in_flight: AtomicBool::new(false),
            refresher: ScheduledTask::new(),
            config,
        }
    }

    /// Attach a statistics source; refreshes are debounced by `stats_debounce`
    pub fn with_statistics(mut self, source: Arc<dyn TaskStatisticsSource>) -> Self {
        self.stats = Some(TaskStatisticsPoller::new(source, self.config.stats_debounce));
        self
    }

    pub fn counter(&self) -> &LocalTimeCounter {
        &self.counter
    }

    pub fn status_store(&self) -> &TimerStatusStore {
        &self.status
    }

    pub fn decision_engine(&self) -> &StartStopDecisionEngine {
        &self.gate
    }

    pub fn statistics(&self) -> Option<&TaskStatisticsPoller> {
        self.stats.as_ref()
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }
}
