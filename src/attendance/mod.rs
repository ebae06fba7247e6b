use anyhow::{Context, Result, bail};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const ATTENDANCE_PATH: &str = "/api/v1/gateway/student-temperature";

/// Wire format of `AttendanceRecord::date`. Fractional seconds are optional.
pub const ATTENDANCE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub attendance_id: String,
    pub student_id: String,
    pub date: String,
    pub check_in_time: String,
    pub check_out_time: String,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
struct AttendanceEnvelope {
    data: Option<Vec<Value>>,
}

/// Best-effort client for the attendance gateway. Every failure is logged and
/// turned into an empty list.
#[derive(Debug, Clone)]
pub struct AttendanceClient {
    base_url: Option<String>,
    timeout: Duration,
}

impl AttendanceClient {
    pub fn new(base_url: Option<String>, timeout_seconds: u64) -> Self {
        Self {
            base_url: base_url
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty()),
            timeout: Duration::from_secs(timeout_seconds.max(1)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn fetch(&self, student_id: &str, token: Option<&str>) -> Vec<AttendanceRecord> {
        let Some(base_url) = self.base_url.as_deref() else {
            warn!("attendance source not configured, skipping attendance");
            return Vec::new();
        };

        let Some(token) = token.map(str::trim).filter(|value| !value.is_empty()) else {
            warn!(student_id, "bearer token missing, skipping attendance");
            return Vec::new();
        };

        match self.request(base_url, student_id, token).await {
            Ok(body) => parse_attendance_payload(&body, student_id),
            Err(error) => {
                warn!(error = %error, student_id, "attendance request failed");
                Vec::new()
            }
        }
    }

    async fn request(&self, base_url: &str, student_id: &str, token: &str) -> Result<String> {
        let endpoint = attendance_endpoint(base_url, student_id)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Failed to build Authorization header")?,
        );

        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create attendance HTTP client")?;

        let response = client
            .get(endpoint)
            .send()
            .await
            .context("Attendance API request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read attendance response body")?;

        if !status.is_success() {
            bail!("Attendance API error {}: {}", status, body);
        }

        Ok(body)
    }
}

pub fn attendance_endpoint(base_url: &str, student_id: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .with_context(|| format!("Invalid attendance base URL: {base_url}"))?
        .join(ATTENDANCE_PATH)
        .context("Failed to build attendance endpoint")?;
    url.query_pairs_mut().append_pair("student-id", student_id);

    Ok(url)
}

/// Decodes a gateway body. Records lacking an id are dropped; a record
/// without `user_id` is attributed to the requested student.
pub fn parse_attendance_payload(body: &str, student_id: &str) -> Vec<AttendanceRecord> {
    if body.trim().is_empty() {
        warn!(student_id, "empty attendance response");
        return Vec::new();
    }

    let envelope = match serde_json::from_str::<AttendanceEnvelope>(body) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(error = %error, "failed to decode attendance response");
            return Vec::new();
        }
    };

    let Some(entries) = envelope.data else {
        warn!("attendance response has no data array");
        return Vec::new();
    };

    let records = entries
        .iter()
        .filter_map(|entry| {
            let Some(fields) = entry.as_object() else {
                debug!("skipping attendance entry that is not an object");
                return None;
            };

            let attendance_id = string_field(fields.get("id"));
            if attendance_id.is_empty() {
                debug!("skipping attendance entry without id");
                return None;
            }

            let owner = string_field(fields.get("user_id"));

            Some(AttendanceRecord {
                attendance_id,
                student_id: if owner.is_empty() {
                    student_id.to_string()
                } else {
                    owner
                },
                date: string_field(fields.get("date")),
                check_in_time: string_field(fields.get("check_in_time")),
                check_out_time: string_field(fields.get("check_out_time")),
                temperature: number_field(fields.get("temperature")),
            })
        })
        .collect::<Vec<_>>();

    if records.is_empty() {
        warn!(student_id, "no valid attendance records");
    }

    records
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn number_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or_default(),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or_default(),
        _ => 0.0,
    }
}
