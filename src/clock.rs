use chrono::{Local, NaiveDate, Utc};

/// Источник времени (wall clock в epoch ms + календарная дата пользователя)
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
