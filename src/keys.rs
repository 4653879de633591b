//! Centralized durable storage keys.
//! One place for every key the core reads or writes through `KeyValueStore`.

/// Persisted `LocalTimerStatus` record
pub const LOCAL_TIMER_STATUS: &str = "local-timer-status";

/// Date (YYYY-MM-DD) each start-gate modal was last shown
pub mod modal_dates {
    pub const SUGGEST_DAILY_PLAN: &str = "daily-plan-suggestion-modal-date";
    pub const ADD_TASKS_ESTIMATION: &str = "tasks-estimation-hours-modal-date";
    pub const ENFORCE_PLANNED_TASK: &str = "enforce-planned-task-modal-date";
}
