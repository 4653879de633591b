use crate::database::KeyValueStore;
use crate::keys::modal_dates;
use crate::models::{DailyPlan, Task};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Допустимое расхождение оценок и запланированного времени (часы)
const WORK_TIME_TOLERANCE_HOURS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModalKind {
    SuggestDailyPlan,
    AddTasksEstimation,
    EnforcePlannedTask,
}

impl ModalKind {
    pub fn storage_key(&self) -> &'static str {
        match self {
            ModalKind::SuggestDailyPlan => modal_dates::SUGGEST_DAILY_PLAN,
            ModalKind::AddTasksEstimation => modal_dates::ADD_TASKS_ESTIMATION,
            ModalKind::EnforcePlannedTask => modal_dates::ENFORCE_PLANNED_TASK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartGate {
    OpenModal(ModalKind),
    Proceed,
}

/// Snapshot of everything the rule chain looks at
pub struct StartContext<'a> {
    pub require_plan: bool,
    pub plan: Option<&'a DailyPlan>,
    pub active_task: Option<&'a Task>,
}

/// Цепочка правил перед start. Каждая модалка показывается не чаще раза в день.
pub struct StartStopDecisionEngine {
    store: Arc<dyn KeyValueStore>,
}

impl StartStopDecisionEngine {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// First rule whose condition holds and whose modal was not seen today wins.
    /// Opening a modal marks it seen for `today`.
    pub fn evaluate(&self, ctx: &StartContext<'_>, today: NaiveDate) -> StartGate {
        for kind in Self::candidates(ctx) {
            if self.is_seen(kind, today) {
                debug!("[GATE] {:?} already shown on {}, skipping", kind, today);
                continue;
            }
            info!("[GATE] Opening {:?} instead of starting timer", kind);
            self.mark_seen(kind, today);
            return StartGate::OpenModal(kind);
        }
        StartGate::Proceed
    }

    /// Modals whose rule condition holds, in chain order
    fn candidates(ctx: &StartContext<'_>) -> Vec<ModalKind> {
        let mut out = Vec::new();
        let plan = match ctx.plan {
            Some(plan) => plan,
            None => {
                if ctx.require_plan {
                    out.push(ModalKind::SuggestDailyPlan);
                }
                return out;
            }
        };

        if !plan.all_tasks_estimated() {
            out.push(ModalKind::AddTasksEstimation);
        }
        if let Some(task) = ctx.active_task {
            if !plan.contains_task(&task.id) {
                out.push(ModalKind::EnforcePlannedTask);
            }
        }
        if plan.work_time_planned > 0.0
            && (plan.estimated_hours() - plan.work_time_planned).abs() > WORK_TIME_TOLERANCE_HOURS
        {
            out.push(ModalKind::AddTasksEstimation);
        }
        out
    }

    pub fn is_seen(&self, kind: ModalKind, today: NaiveDate) -> bool {
        match self.store.get(kind.storage_key()) {
            Ok(Some(raw)) => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map(|date| date == today)
                .unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                warn!("[GATE] Failed to read {:?} date: {}", kind, e);
                false
            }
        }
    }

    pub fn mark_seen(&self, kind: ModalKind, today: NaiveDate) {
        let value = today.format(DATE_FORMAT).to_string();
        if let Err(e) = self.store.set(kind.storage_key(), &value) {
            error!("[GATE] Failed to persist {:?} date: {}", kind, e);
        }
    }
}
