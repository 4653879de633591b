use crate::engine::decision::{StartContext, StartGate};
use crate::engine::{CommandOutcome, TimerPhase, TimerService, ToggleOutcome};
use crate::error::TimerError;
use crate::models::{LocalTimerStatus, TaskStatus, TaskUpdate, TimerDisplay, TimerStatus};
use crate::stats::StatsTrigger;
use scopeguard::{guard, ScopeGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| {
        warn!("[TIMER] Mutex poisoned, recovering inner state");
        e.into_inner()
    })
}

fn release(flag: &AtomicBool) {
    flag.store(false, Ordering::Release);
}

/// Флаг "запрос в полете" для UI; сбрасывается guard'ом даже при отмене future
fn in_flight(flag: &AtomicBool) -> ScopeGuard<&AtomicBool, fn(&AtomicBool)> {
    flag.store(true, Ordering::Release);
    guard(flag, release as fn(&AtomicBool))
}

impl TimerService {
    /// Первичная загрузка: статус с сервера, затем локальная запись, затем baseline контекста.
    /// Ошибка сети = "таймер не идет", не фатально.
    pub async fn initialize(&self) -> TimerPhase {
        let server = {
            let _flight = in_flight(&self.status_in_flight);
            match self.api.fetch_status().await {
                Ok(status) => {
                    self.status.replace(status.clone());
                    Some(status)
                }
                Err(e) => {
                    warn!("[TIMER] Initial status fetch failed: {}", e);
                    None
                }
            }
        };

        let local = self.counter.initialize(server.as_ref());

        {
            let mut observed = lock(&self.observed);
            observed.team_id = self.tasks.active_team_id();
            observed.task_id = self.tasks.active_team_task().map(|t| t.id);
        }

        let phase = if local.running {
            TimerPhase::Running
        } else {
            TimerPhase::Idle
        };
        *lock(&self.phase) = phase;
        info!("[TIMER] Initialized in {:?}", phase);
        self.notify_stats();
        phase
    }

    fn next_seq(&self) -> u64 {
        self.command_seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn latest_seq(&self) -> u64 {
        self.command_seq.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TimerPhase {
        *lock(&self.phase)
    }

    /// Running from either side: server status or local optimistic record
    pub fn is_running(&self) -> bool {
        self.status.is_running() || self.counter.is_running()
    }

    /// Переход: Idle → PendingStart → Running.
    /// Без активной задачи - гарантированный no-op.
    pub async fn start(&self) -> CommandOutcome {
        let task = match self.tasks.active_team_task() {
            Some(task) => task,
            None => {
                debug!("[TIMER] start() without active task, ignoring");
                return CommandOutcome::Skipped;
            }
        };

        let seq = self.next_seq();
        *lock(&self.phase) = TimerPhase::PendingStart { seq };

        let now = self.clock.now_ms();
        self.counter
            .update(LocalTimerStatus::started(now, Some(task.id.clone())));
        info!("[TIMER] Start #{} for task {}", seq, task.id);

        let result = {
            let _flight = in_flight(&self.start_in_flight);
            self.api.start(&task.id).await
        };

        if task.status != TaskStatus::InProgress {
            self.mark_in_progress(task.id.clone());
        }

        self.finish_command(seq, result)
    }

    /// Переход: Running → PendingStop → Idle. Никогда не блокируется гейтами.
    pub async fn stop(&self) -> CommandOutcome {
        let seq = self.next_seq();
        *lock(&self.phase) = TimerPhase::PendingStop { seq };

        let local = self.counter.current();
        self.counter.update(local.stopped());
        info!("[TIMER] Stop #{}", seq);

        let result = {
            let _flight = in_flight(&self.stop_in_flight);
            self.api.stop(local.last_task_id.as_deref()).await
        };
        self.finish_command(seq, result)
    }

    /// Stop when the server says running, otherwise a gated start
    pub async fn toggle(&self) -> ToggleOutcome {
        if self.status.is_running() {
            ToggleOutcome::Stopped(self.stop().await)
        } else {
            self.request_start().await
        }
    }

    /// Start через цепочку правил: либо модалка, либо start() - ровно одно из двух.
    /// Без активной задачи правила не проверяются (модалки не помечаются как показанные).
    pub async fn request_start(&self) -> ToggleOutcome {
        let active_task = match self.tasks.active_team_task() {
            Some(task) => task,
            None => {
                debug!("[GATE] No active task, start gate not evaluated");
                return ToggleOutcome::Started(CommandOutcome::Skipped);
            }
        };
        let today = self.clock.today();
        let plan = self.tasks.daily_plan(today);
        let ctx = StartContext {
            require_plan: self.tasks.require_plan_to_track(),
            plan: plan.as_ref(),
            active_task: Some(&active_task),
        };
        match self.gate.evaluate(&ctx, today) {
            StartGate::OpenModal(kind) => ToggleOutcome::ModalOpened(kind),
            StartGate::Proceed => ToggleOutcome::Started(self.start().await),
        }
    }

    /// Reconciliation step for start/stop responses (last-command-wins)
    fn finish_command(
        &self,
        seq: u64,
        result: Result<TimerStatus, TimerError>,
    ) -> CommandOutcome {
        if seq != self.latest_seq() {
            info!(
                "[TIMER] Response for command #{} superseded by #{}, discarding",
                seq,
                self.latest_seq()
            );
            return CommandOutcome::Superseded;
        }

        match result {
            Ok(status) => {
                self.apply_acknowledged(status.clone());
                CommandOutcome::Applied(status)
            }
            Err(e) => {
                error!("[TIMER] Command #{} failed: {}", seq, e);
                let local_running = self.counter.is_running();
                *lock(&self.phase) = if local_running {
                    TimerPhase::Running
                } else {
                    TimerPhase::Idle
                };
                CommandOutcome::Failed(e)
            }
        }
    }

    /// Acknowledged status is authoritative: local record follows it.
    /// Used for command responses and for polls that no command overlapped.
    fn apply_acknowledged(&self, status: TimerStatus) {
        self.status.replace(status.clone());
        let local = self.counter.current();
        if local.running != status.running {
            let next = if status.running {
                LocalTimerStatus::started(
                    status
                        .last_started_at
                        .unwrap_or_else(|| self.clock.now_ms()),
                    status
                        .last_logged_task_id
                        .clone()
                        .or(local.last_task_id.clone()),
                )
            } else {
                local.stopped()
            };
            warn!(
                "[TIMER] Server disagrees with local state, adopting running={}",
                status.running
            );
            self.counter.update(next);
        }
        *lock(&self.phase) = if status.running {
            TimerPhase::Running
        } else {
            TimerPhase::Idle
        };
        self.notify_stats();
    }

    fn mark_in_progress(&self, task_id: String) {
        let tasks = self.tasks.clone();
        let update = TaskUpdate {
            id: task_id,
            status: TaskStatus::InProgress,
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    if let Err(e) = tasks.update_task(update).await {
                        warn!("[TIMER] Failed to mark task in progress: {}", e);
                    }
                });
            }
            Err(_) => warn!("[TIMER] No runtime, task status update skipped"),
        }
    }

    /// Запросить статус у сервера. Применяется (в обе стороны) только если за время
    /// запроса не было новых команд start/stop.
    pub async fn refresh_status(&self) -> Result<TimerStatus, TimerError> {
        let seq_before = self.latest_seq();
        let result = {
            let _flight = in_flight(&self.status_in_flight);
            self.api.fetch_status().await
        };
        let status = result.map_err(|e| {
            warn!("[TIMER] Status refresh failed: {}", e);
            e
        })?;

        if seq_before != self.latest_seq() || self.phase().is_pending() {
            debug!("[TIMER] Command issued during status refresh, not applying");
            return Ok(status);
        }

        self.apply_acknowledged(status.clone());
        Ok(status)
    }

    /// Периодический refresh статуса (с jitter на первом запуске)
    pub fn spawn_status_refresh(self: &Arc<Self>) -> bool {
        let weak = Arc::downgrade(self);
        let period = self.config.status_refresh_interval;
        self.refresher.spawn(async move {
            let jitter_ms: u64 = rand::random::<u64>() % 2000 + 1000;
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(service) = weak.upgrade() else {
                    debug!("[TIMER] Service dropped, stopping status refresh");
                    break;
                };
                let _ = service.refresh_status().await;
            }
        })
    }

    /// Forced-stop guard: смена active team/task (с не-null значения) во время работы
    /// таймера вызывает ровно один stop(). Повторный вызов с тем же значением - no-op.
    pub async fn sync_active_context(&self) -> Option<CommandOutcome> {
        let team_id = self.tasks.active_team_id();
        let task_id = self.tasks.active_team_task().map(|t| t.id);

        let changed = {
            let mut observed = lock(&self.observed);
            let team_changed = matches!(&observed.team_id, Some(prev) if Some(prev) != team_id.as_ref());
            let task_changed = matches!(&observed.task_id, Some(prev) if Some(prev) != task_id.as_ref());
            observed.team_id = team_id;
            observed.task_id = task_id;
            team_changed || task_changed
        };

        self.notify_stats();

        if changed && self.is_running() {
            info!("[TIMER] Active team/task changed while running, forcing stop");
            return Some(self.stop().await);
        }
        None
    }

    fn notify_stats(&self) {
        if let Some(stats) = &self.stats {
            stats.notify(StatsTrigger {
                running: self.status.is_running(),
                task_id: self.tasks.active_team_task().map(|t| t.id),
                team_id: self.tasks.active_team_id(),
            });
        }
    }

    pub fn can_run_timer(&self) -> bool {
        self.tasks
            .active_team_task()
            .map(|t| t.status != TaskStatus::Closed)
            .unwrap_or(false)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.counter.elapsed_ms()
    }

    /// Время дня для отображения: duration сервера + локальный elapsed
    pub fn display(&self) -> TimerDisplay {
        let total_ms = self
            .status
            .duration()
            .saturating_mul(1000)
            .saturating_add(self.counter.elapsed_ms());
        TimerDisplay::from_millis(total_ms)
    }

    /// Процент оценки активной задачи (статистика + текущая сессия)
    pub fn active_task_estimation(&self) -> u8 {
        let task = match self.tasks.active_team_task() {
            Some(task) => task,
            None => return 0,
        };
        let stats = self
            .stats
            .as_ref()
            .and_then(|s| s.latest())
            .unwrap_or_default();
        stats.estimation_progress(&task, self.counter.elapsed_ms() / 1000)
    }

    pub fn is_start_loading(&self) -> bool {
        self.start_in_flight.load(Ordering::Acquire)
    }

    pub fn is_stop_loading(&self) -> bool {
        self.stop_in_flight.load(Ordering::Acquire)
    }

    pub fn is_status_loading(&self) -> bool {
        self.status_in_flight.load(Ordering::Acquire)
    }

    /// Отменить все фоновые задачи (tick, refresh, statistics)
    pub fn shutdown(&self) {
        self.counter.shutdown();
        self.refresher.cancel();
        if let Some(stats) = &self.stats {
            stats.cancel();
        }
        info!("[TIMER] Shut down");
    }
}
