use crate::error::TimerError;
use crate::models::{DailyPlan, Task, TaskUpdate, TeamId};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Task/team state owned by the surrounding application.
/// Getters are snapshots; the timer core never caches them beyond one call.
#[async_trait]
pub trait TaskStore: Send + Sync {
    fn active_team_id(&self) -> Option<TeamId>;
    fn active_team_task(&self) -> Option<Task>;
    /// Active team setting: a daily plan is required before tracking
    fn require_plan_to_track(&self) -> bool;
    fn daily_plan(&self, date: NaiveDate) -> Option<DailyPlan>;
    async fn update_task(&self, update: TaskUpdate) -> Result<(), TimerError>;
}
