use std::fmt;

/// Ошибки ядра таймера (сеть, хранилище, разбор ответа)
#[derive(Debug, Clone, PartialEq)]
pub enum TimerError {
    Network(String),
    Http { status: u16, message: String },
    Auth(String),
    Storage(String),
    Parse(String),
    Task(String),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::Network(s) => write!(f, "Network: {}", s),
            TimerError::Http { status, message } => write!(f, "HTTP {}: {}", status, message),
            TimerError::Auth(s) => write!(f, "Auth: {}", s),
            TimerError::Storage(s) => write!(f, "Storage: {}", s),
            TimerError::Parse(s) => write!(f, "Parse: {}", s),
            TimerError::Task(s) => write!(f, "Task: {}", s),
        }
    }
}

impl std::error::Error for TimerError {}

impl From<rusqlite::Error> for TimerError {
    fn from(e: rusqlite::Error) -> Self {
        TimerError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for TimerError {
    fn from(e: serde_json::Error) -> Self {
        TimerError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for TimerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => TimerError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => TimerError::Network(e.to_string()),
        }
    }
}
