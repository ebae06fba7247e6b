use crate::analyzer::report::DailyReport;
use crate::analyzer::{ReportBuilder, display_offset};
use crate::attendance::AttendanceClient;
use crate::config::Config;
use crate::db::{ActivityField, ActivityRecord, Database, NewActivity};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("student ID cannot be empty")]
    MissingStudentId,
    #[error("type activity cannot be empty")]
    MissingTypeActivity,
    #[error("date cannot be empty")]
    MissingDate,
    #[error("invalid date format: {0}")]
    InvalidDate(String),
    #[error("data cannot be empty")]
    MissingData,
    #[error("assigned by cannot be empty")]
    MissingAssignedBy,
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateActivityRequest {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub type_activity: String,
    #[serde(default)]
    pub data: Vec<ActivityField>,
    #[serde(default)]
    pub assigned_by: String,
}

impl CreateActivityRequest {
    pub fn validate(&self) -> Result<NewActivity, ValidationError> {
        if self.student_id.trim().is_empty() {
            return Err(ValidationError::MissingStudentId);
        }
        if self.type_activity.trim().is_empty() {
            return Err(ValidationError::MissingTypeActivity);
        }
        if self.date.trim().is_empty() {
            return Err(ValidationError::MissingDate);
        }

        let date = DateTime::parse_from_rfc3339(self.date.trim())
            .map_err(|error| ValidationError::InvalidDate(format!("{}: {error}", self.date)))?
            .with_timezone(&Utc);

        if self.data.is_empty() {
            return Err(ValidationError::MissingData);
        }
        if self.assigned_by.trim().is_empty() {
            return Err(ValidationError::MissingAssignedBy);
        }

        Ok(NewActivity {
            student_id: self.student_id.trim().to_string(),
            type_activity: self.type_activity.trim().to_string(),
            date,
            data: self.data.clone(),
            assigned_by: self.assigned_by.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub stored: usize,
    pub rejected: usize,
}

/// Reads a JSON array of activity submissions.
pub fn read_import_file(path: &Path) -> anyhow::Result<Vec<CreateActivityRequest>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import file: {}", path.display()))
}

/// `YYYY-MM-DD`; blank means no filter.
pub fn parse_report_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|error| ValidationError::InvalidDate(format!("{value}: {error}")))
        })
        .transpose()
}

#[derive(Debug, Clone)]
pub struct PortalService {
    db_path: PathBuf,
    attendance: AttendanceClient,
    builder: ReportBuilder,
}

impl PortalService {
    pub fn new(db_path: PathBuf, attendance: AttendanceClient, builder: ReportBuilder) -> Self {
        Self {
            db_path,
            attendance,
            builder,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.db_path.clone(),
            AttendanceClient::new(
                config.resolve_attendance_base_url(),
                config.attendance_timeout_seconds,
            ),
            ReportBuilder::new(display_offset(config.display_offset_hours)),
        )
    }

    pub fn attendance_configured(&self) -> bool {
        self.attendance.is_configured()
    }

    pub fn create_activity(
        &self,
        request: &CreateActivityRequest,
    ) -> Result<ActivityRecord, PortalError> {
        let activity = request.validate()?;
        let database = Database::open(&self.db_path)?;
        let stored = database.insert_activity(&activity)?;

        info!(
            session_id = %stored.session_id,
            student_id = %stored.student_id,
            type_activity = %stored.type_activity,
            "student activity stored"
        );

        Ok(stored)
    }

    /// Stores every valid submission; invalid ones are logged and counted.
    pub fn import_activities(
        &self,
        requests: &[CreateActivityRequest],
    ) -> Result<ImportSummary, PortalError> {
        let database = Database::open(&self.db_path)?;
        let mut summary = ImportSummary::default();

        for (index, request) in requests.iter().enumerate() {
            match request.validate() {
                Ok(activity) => {
                    database.insert_activity(&activity)?;
                    summary.stored += 1;
                }
                Err(error) => {
                    warn!(index, error = %error, "skipping invalid activity submission");
                    summary.rejected += 1;
                }
            }
        }

        info!(
            stored = summary.stored,
            rejected = summary.rejected,
            "activity import finished"
        );
        Ok(summary)
    }

    pub async fn daily_reports(
        &self,
        student_id: &str,
        date: Option<&str>,
        token: Option<&str>,
    ) -> Result<Vec<DailyReport>, PortalError> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(ValidationError::MissingStudentId.into());
        }
        let day = parse_report_date(date)?;

        let activities = {
            let database = Database::open(&self.db_path)?;
            database.activities_for_student(student_id, day)?
        };
        let attendance = self.attendance.fetch(student_id, token).await;

        let reports = self.builder.build(&activities, &attendance, day);
        info!(
            student_id,
            activities = activities.len(),
            attendance = attendance.len(),
            reports = reports.len(),
            "daily reports built"
        );

        Ok(reports)
    }
}
