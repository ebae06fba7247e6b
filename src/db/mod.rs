pub mod queries;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One `(key, label, value)` entry of an activity's field bag. Values are
/// always strings, whatever they encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityField {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

impl ActivityField {
    pub fn new(key: &str, label: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// A stored observation session for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub session_id: String,
    pub student_id: String,
    pub type_activity: String,
    pub date: DateTime<Utc>,
    pub data: Vec<ActivityField>,
    pub submitted_at: DateTime<Utc>,
    pub assigned_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub student_id: String,
    pub type_activity: String,
    pub date: DateTime<Utc>,
    pub data: Vec<ActivityField>,
    pub assigned_by: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn insert_activity(&self, activity: &NewActivity) -> Result<ActivityRecord> {
        let now = Utc::now();
        let day = activity.date.format("%Y-%m-%d").to_string();
        let data = serde_json::to_string(&activity.data)
            .context("Failed to serialize activity data")?;

        self.conn
            .execute(
                "INSERT INTO student_activities (student_id, type_activity, date, day, data, submitted_at, assigned_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    activity.student_id,
                    activity.type_activity,
                    activity.date,
                    day,
                    data,
                    now,
                    activity.assigned_by,
                    now,
                    now
                ],
            )
            .context("Failed to insert student activity")?;

        Ok(ActivityRecord {
            session_id: self.conn.last_insert_rowid().to_string(),
            student_id: activity.student_id.clone(),
            type_activity: activity.type_activity.clone(),
            date: activity.date,
            data: activity.data.clone(),
            submitted_at: now,
            assigned_by: activity.assigned_by.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Activities of one student, optionally restricted to a UTC calendar day.
    pub fn activities_for_student(
        &self,
        student_id: &str,
        day: Option<NaiveDate>,
    ) -> Result<Vec<ActivityRecord>> {
        let rows = match day {
            Some(day) => {
                let mut statement = self.conn.prepare(&format!(
                    "{} WHERE student_id = ?1 AND day = ?2 ORDER BY date ASC, id ASC",
                    queries::SELECT_ACTIVITY_COLUMNS
                ))?;
                statement
                    .query_map(
                        params![student_id, day.format("%Y-%m-%d").to_string()],
                        activity_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()
            }
            None => {
                let mut statement = self.conn.prepare(&format!(
                    "{} WHERE student_id = ?1 ORDER BY date ASC, id ASC",
                    queries::SELECT_ACTIVITY_COLUMNS
                ))?;
                statement
                    .query_map(params![student_id], activity_from_row)?
                    .collect::<Result<Vec<_>, _>>()
            }
        }
        .context("Failed to query student activities")?;

        Ok(rows)
    }

    pub fn count_activities(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM student_activities", [], |row| {
                row.get(0)
            })
            .context("Failed to count student activities")
    }
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    let id: i64 = row.get(0)?;
    let raw_data: String = row.get(4)?;
    let data = serde_json::from_str::<Vec<ActivityField>>(&raw_data).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error))
    })?;

    Ok(ActivityRecord {
        session_id: id.to_string(),
        student_id: row.get(1)?,
        type_activity: row.get(2)?,
        date: row.get(3)?,
        data,
        submitted_at: row.get(5)?,
        assigned_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
