use crate::error::TimerError;
use crate::models::{TaskStatistics, TimerStatus};
use crate::stats::TaskStatisticsSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Remote timer endpoints. The core never depends on the wire format, only on this trait.
#[async_trait]
pub trait TimerStatusApi: Send + Sync {
    async fn fetch_status(&self) -> Result<TimerStatus, TimerError>;
    async fn start(&self, task_id: &str) -> Result<TimerStatus, TimerError>;
    async fn stop(&self, task_id: Option<&str>) -> Result<TimerStatus, TimerError>;
    async fn toggle(&self, task_id: &str) -> Result<TimerStatus, TimerError>;
}

/// Конфигурация HTTP клиента (api_base_url, таймауты, app_version)
#[derive(Clone)]
pub struct ApiConfig {
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    /// App version sent in X-App-Version header for debugging version skew
    pub app_version: String,
    pub tenant_id: Option<String>,
    pub organization_id: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            http_timeout_secs: 30,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            tenant_id: None,
            organization_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeLogResponse {
    task_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimerStatusResponse {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    duration: u64,
    last_log: Option<TimeLogResponse>,
}

impl From<TimerStatusResponse> for TimerStatus {
    fn from(r: TimerStatusResponse) -> Self {
        let (task_id, started_at) = match r.last_log {
            Some(log) => (log.task_id, log.started_at.map(|t| t.timestamp_millis())),
            None => (None, None),
        };
        TimerStatus {
            running: r.running,
            duration: r.duration,
            last_logged_task_id: task_id,
            last_started_at: if r.running { started_at } else { None },
        }
    }
}

pub struct HttpTimerStatusApi {
    client: reqwest::Client,
    config: ApiConfig,
    access_token: RwLock<Option<String>>,
}

impl HttpTimerStatusApi {
    pub fn new(config: ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config,
            access_token: RwLock::new(None),
        }
    }

    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    async fn token(&self) -> Result<String, TimerError> {
        self.access_token
            .read()
            .await
            .clone()
            .ok_or_else(|| TimerError::Auth("Access token not set".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn with_headers(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        let mut request = request
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", token))
            .header("X-App-Version", &self.config.app_version);
        if let Some(tenant) = &self.config.tenant_id {
            request = request.header("Tenant-Id", tenant);
        }
        request
    }

    fn command_body(&self, task_id: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "taskId": task_id,
            "tenantId": self.config.tenant_id,
            "organizationId": self.config.organization_id,
            "logType": "TRACKED",
            "source": "BROWSER",
        })
    }

    async fn read_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, TimerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown").into()
            } else {
                body
            };
            return Err(TimerError::Http {
                status: status.as_u16(),
                message,
            });
        }
        let text = response
            .text()
            .await
            .map_err(|e| TimerError::Network(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_command(
        &self,
        operation: &str,
        task_id: Option<&str>,
    ) -> Result<TimerStatus, TimerError> {
        let token = self.token().await?;
        let url = self.url(&format!("/timesheet/timer/{}", operation));
        debug!("[API] POST {}", url);
        let response = self
            .with_headers(self.client.post(&url), &token)
            .json(&self.command_body(task_id))
            .send()
            .await
            .map_err(|e| {
                warn!("[API] {} request failed: {}", operation, e);
                TimerError::Network(e.to_string())
            })?;
        let status: TimerStatusResponse = Self::read_response(response).await?;
        Ok(status.into())
    }
}

#[async_trait]
impl TimerStatusApi for HttpTimerStatusApi {
    async fn fetch_status(&self) -> Result<TimerStatus, TimerError> {
        let token = self.token().await?;
        let url = self.url("/timesheet/timer/status");
        let mut request = self.with_headers(self.client.get(&url), &token);
        if let Some(tenant) = &self.config.tenant_id {
            request = request.query(&[("tenantId", tenant)]);
        }
        if let Some(org) = &self.config.organization_id {
            request = request.query(&[("organizationId", org)]);
        }
        let response = request.send().await.map_err(|e| {
            warn!("[API] status request failed: {}", e);
            TimerError::Network(e.to_string())
        })?;
        let status: TimerStatusResponse = Self::read_response(response).await?;
        Ok(status.into())
    }

    async fn start(&self, task_id: &str) -> Result<TimerStatus, TimerError> {
        self.post_command("start", Some(task_id)).await
    }

    async fn stop(&self, task_id: Option<&str>) -> Result<TimerStatus, TimerError> {
        self.post_command("stop", task_id).await
    }

    async fn toggle(&self, task_id: &str) -> Result<TimerStatus, TimerError> {
        self.post_command("toggle", Some(task_id)).await
    }
}

#[async_trait]
impl TaskStatisticsSource for HttpTimerStatusApi {
    async fn fetch_statistics(&self) -> Result<TaskStatistics, TimerError> {
        let token = self.token().await?;
        let url = self.url("/timer-logs/statistics/tasks");
        let response = self
            .with_headers(self.client.get(&url), &token)
            .send()
            .await
            .map_err(|e| TimerError::Network(e.to_string()))?;
        Self::read_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_maps_last_log() {
        let raw = r#"{
            "running": true,
            "duration": 1800,
            "lastLog": { "taskId": "T1", "startedAt": "2024-01-15T09:00:00Z" }
        }"#;
        let parsed: TimerStatusResponse = serde_json::from_str(raw).unwrap();
        let status: TimerStatus = parsed.into();
        assert!(status.running);
        assert_eq!(status.duration, 1800);
        assert_eq!(status.last_logged_task_id.as_deref(), Some("T1"));
        assert_eq!(status.last_started_at, Some(1_705_309_200_000));
    }

    #[test]
    fn test_status_response_drops_start_time_when_stopped() {
        let raw = r#"{ "running": false, "duration": 60,
            "lastLog": { "taskId": "T1", "startedAt": "2024-01-15T09:00:00Z" } }"#;
        let parsed: TimerStatusResponse = serde_json::from_str(raw).unwrap();
        let status: TimerStatus = parsed.into();
        assert!(!status.running);
        assert_eq!(status.last_started_at, None);
        assert_eq!(status.last_logged_task_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_status_response_without_last_log() {
        let parsed: TimerStatusResponse = serde_json::from_str("{}").unwrap();
        let status: TimerStatus = parsed.into();
        assert_eq!(status, TimerStatus::default());
    }

    #[tokio::test]
    async fn test_http_api_requires_token() {
        let api = HttpTimerStatusApi::new(ApiConfig::default());
        let err = api.fetch_status().await.unwrap_err();
        assert!(matches!(err, TimerError::Auth(_)));
        assert!(err.to_string().contains("Access token not set"));
    }

    #[test]
    fn test_url_joins_base_without_double_slash() {
        let api = HttpTimerStatusApi::new(ApiConfig {
            api_base_url: "https://example.test/api/".to_string(),
            ..Default::default()
        });
        assert_eq!(
            api.url("/timesheet/timer/status"),
            "https://example.test/api/timesheet/timer/status"
        );
    }
}
