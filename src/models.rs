use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type TaskId = String;
pub type TeamId = String;

/// Статус таймера от сервера - единственный источник истины.
/// Заменяется целиком при каждом ответе, никогда не мутируется по полям.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStatus {
    pub running: bool,
    /// Накопленное время за день (секунды)
    pub duration: u64,
    pub last_logged_task_id: Option<TaskId>,
    /// Epoch ms начала текущего лога (только для running)
    #[serde(default)]
    pub last_started_at: Option<i64>,
}

/// Локальное состояние таймера, переживает перезапуск приложения
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTimerStatus {
    pub running: bool,
    /// Epoch ms последнего явного старта, 0 после stop
    #[serde(rename = "runnedDateTime")]
    pub started_at: i64,
    pub last_task_id: Option<TaskId>,
}

impl LocalTimerStatus {
    pub fn started(at: i64, task_id: Option<TaskId>) -> Self {
        Self {
            running: true,
            started_at: at,
            last_task_id: task_id,
        }
    }

    /// Сброс в not-running; last_task_id сохраняется
    pub fn stopped(&self) -> Self {
        Self {
            running: false,
            started_at: 0,
            last_task_id: self.last_task_id.clone(),
        }
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        if !self.running {
            return 0;
        }
        now_ms.saturating_sub(self.started_at).max(0) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Open,
    InProgress,
    ReadyForReview,
    InReview,
    Blocked,
    Completed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    /// Оценка в секундах
    pub estimate: Option<u64>,
}

impl Task {
    pub fn is_estimated(&self) -> bool {
        self.estimate.map(|e| e > 0).unwrap_or(false)
    }
}

/// Частичное обновление задачи (сейчас только статус)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub id: TaskId,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub date: NaiveDate,
    /// Запланированное рабочее время (часы)
    pub work_time_planned: f64,
    pub tasks: Vec<Task>,
}

impl DailyPlan {
    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == task_id)
    }

    pub fn all_tasks_estimated(&self) -> bool {
        self.tasks.iter().all(Task::is_estimated)
    }

    pub fn estimated_hours(&self) -> f64 {
        let seconds: u64 = self.tasks.iter().filter_map(|t| t.estimate).sum();
        seconds as f64 / 3600.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStat {
    pub id: TaskId,
    /// Секунды
    pub duration: u64,
    #[serde(default)]
    pub duration_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub all: Vec<TaskStat>,
    pub today: Vec<TaskStat>,
}

impl TaskStatistics {
    pub fn for_task(&self, task_id: &str) -> Option<&TaskStat> {
        self.all.iter().find(|s| s.id == task_id)
    }

    pub fn today_for_task(&self, task_id: &str) -> Option<&TaskStat> {
        self.today.iter().find(|s| s.id == task_id)
    }

    /// Процент оценки задачи, уже потраченный (с учетом текущей сессии), максимум 100
    pub fn estimation_progress(&self, task: &Task, extra_seconds: u64) -> u8 {
        let estimate = match task.estimate {
            Some(e) if e > 0 => e,
            _ => return 0,
        };
        let worked = self
            .for_task(&task.id)
            .map(|s| s.duration)
            .unwrap_or(0)
            .saturating_add(extra_seconds);
        (worked.saturating_mul(100) / estimate).min(100) as u8
    }
}

/// Снимок для отображения таймера: duration сервера + локальный счетчик
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerDisplay {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// Сотые доли секунды
    pub centis: u64,
}

impl TimerDisplay {
    pub fn from_millis(total_ms: u64) -> Self {
        let total_secs = total_ms / 1000;
        Self {
            hours: total_secs / 3600,
            minutes: (total_secs % 3600) / 60,
            seconds: total_secs % 60,
            centis: (total_ms % 1000) / 10,
        }
    }

    pub fn format_hms(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}
