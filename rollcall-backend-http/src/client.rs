//! The reqwest-backed attendance client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use rollcall_core::backend::AttendanceBackend;
use rollcall_core::error::{RollcallError, RollcallResult};
use rollcall_core::protocol::{DaySnapshot, UpsertAttendance, UpsertReceipt};
use rollcall_core::record::RecordId;

use crate::config::HttpBackendConfig;

/// Attendance backend over HTTP.
pub struct HttpBackend {
    http: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> RollcallResult<HttpBackend> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RollcallError::Http(e.to_string()))?;
        Ok(HttpBackend { http, config })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> RollcallError {
        if error.is_timeout() {
            RollcallError::BackendTimeout(self.config.timeout_secs)
        } else {
            RollcallError::Http(error.to_string())
        }
    }
}

/// Map a non-2xx response to a backend error carrying status and body.
async fn error_for_status(response: reqwest::Response) -> RollcallResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RollcallError::Backend(format!(
        "backend responded {status}: {}",
        body.trim()
    )))
}

#[async_trait]
impl AttendanceBackend for HttpBackend {
    async fn upsert_attendance(&self, request: UpsertAttendance) -> RollcallResult<UpsertReceipt> {
        log::debug!(
            "upserting {} for {} on {}",
            request.status.as_str(),
            request.subject_id,
            request.lecture_date
        );
        let response = self
            .authorize(self.http.post(self.config.endpoint("attendance")))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = error_for_status(response).await?;
        response
            .json::<UpsertReceipt>()
            .await
            .map_err(|e| RollcallError::Serialization(e.to_string()))
    }

    async fn delete_attendance(&self, record_id: RecordId) -> RollcallResult<()> {
        log::debug!("deleting attendance record {record_id}");
        let response = self
            .authorize(
                self.http
                    .delete(self.config.endpoint(&format!("attendance/{record_id}"))),
            )
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn fetch_day(&self, date: Option<NaiveDate>) -> RollcallResult<DaySnapshot> {
        let mut request = self.authorize(self.http.get(self.config.endpoint("attendance/day")));
        if let Some(date) = date {
            request = request.query(&[("date", date.format("%Y-%m-%d").to_string())]);
        }
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let response = error_for_status(response).await?;
        response
            .json::<DaySnapshot>()
            .await
            .map_err(|e| RollcallError::Serialization(e.to_string()))
    }
}
