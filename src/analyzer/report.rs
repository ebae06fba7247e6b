use crate::analyzer::grouping::{DayBucket, attendance_timestamp};
use crate::analyzer::statistics::{Statistics, StatisticsRegistry, attendance_statistics};
use crate::attendance::AttendanceRecord;
use crate::db::{ActivityField, ActivityRecord};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const ATTENDANCE_TYPE: &str = "attendance";

/// One contributing session as it appears in a summary's `details`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDetail {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    pub type_activity: String,
    pub data: Vec<ActivityField>,
    pub submitted_at: DateTime<Utc>,
    pub assigned_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityDetail {
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.value.as_str())
    }

    pub fn values_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.data
            .iter()
            .filter(move |field| field.key == key)
            .map(|field| field.value.as_str())
    }

    /// Attendance as a pseudo-session; `None` when its date is unreadable.
    pub fn from_attendance(record: &AttendanceRecord) -> Option<Self> {
        let at = attendance_timestamp(record)?;

        Some(Self {
            session_id: record.attendance_id.clone(),
            type_activity: ATTENDANCE_TYPE.to_string(),
            data: vec![
                ActivityField::new("attendance_id", "Attendance ID", &record.attendance_id),
                ActivityField::new("date", "Date", &record.date),
                ActivityField::new("check_in_time", "Check-in Time", &record.check_in_time),
                ActivityField::new("check_out_time", "Check-out Time", &record.check_out_time),
                ActivityField::new(
                    "temperature",
                    "Temperature",
                    &format!("{:.2}", record.temperature),
                ),
            ],
            submitted_at: at,
            assigned_by: String::new(),
            created_at: at,
            updated_at: at,
        })
    }
}

impl From<&ActivityRecord> for ActivityDetail {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            type_activity: record.type_activity.clone(),
            data: record.data.clone(),
            submitted_at: record.submitted_at,
            assigned_by: record.assigned_by.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub type_activity: String,
    pub total_sessions: usize,
    pub statistics: Option<Statistics>,
    pub details: Vec<ActivityDetail>,
}

impl ActivitySummary {
    pub fn new(
        type_activity: &str,
        statistics: Option<Statistics>,
        details: Vec<ActivityDetail>,
    ) -> Self {
        Self {
            type_activity: type_activity.to_string(),
            total_sessions: details.len(),
            statistics,
            details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub student_id: String,
    pub date: String,
    pub activities: Vec<ActivitySummary>,
}

/// Summaries ordered by type tag, attendance appended last when present.
pub fn assemble_daily_report(
    student_id: &str,
    date: NaiveDate,
    bucket: &DayBucket<'_>,
    registry: &StatisticsRegistry,
    display_offset: FixedOffset,
) -> DailyReport {
    let by_type = bucket
        .activities
        .iter()
        .fold(BTreeMap::new(), |mut acc, record| {
            acc.entry(record.type_activity.as_str())
                .or_insert_with(Vec::new)
                .push(ActivityDetail::from(*record));
            acc
        });

    let mut activities = by_type
        .into_iter()
        .map(|(type_activity, details)| {
            if !registry.is_registered(type_activity) {
                debug!(type_activity, "no statistics generator registered");
            }
            let statistics = registry.generate(type_activity, &details);
            ActivitySummary::new(type_activity, statistics, details)
        })
        .collect::<Vec<_>>();

    let attendance_details = bucket
        .attendance
        .iter()
        .filter_map(|record| ActivityDetail::from_attendance(record))
        .collect::<Vec<_>>();

    if !attendance_details.is_empty() {
        let statistics = attendance_statistics(&attendance_details, display_offset);
        activities.push(ActivitySummary::new(
            ATTENDANCE_TYPE,
            Some(statistics),
            attendance_details,
        ));
    }

    DailyReport {
        student_id: student_id.to_string(),
        date: date.format("%Y-%m-%d").to_string(),
        activities,
    }
}

#[cfg(test)]
mod tests {
    use super::{ATTENDANCE_TYPE, ActivityDetail, assemble_daily_report};
    use crate::analyzer::grouping::DayBucket;
    use crate::analyzer::statistics::{Statistics, StatisticsRegistry};
    use crate::attendance::AttendanceRecord;
    use crate::db::{ActivityField, ActivityRecord};
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use serde_json::json;

    fn record(session_id: &str, type_activity: &str, fields: &[(&str, &str)]) -> ActivityRecord {
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap();
        ActivityRecord {
            session_id: session_id.to_string(),
            student_id: "s-1".to_string(),
            type_activity: type_activity.to_string(),
            date: at,
            data: fields
                .iter()
                .map(|(key, value)| ActivityField::new(key, key, value))
                .collect(),
            submitted_at: at,
            assigned_by: "teacher".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn attendance(id: &str, date: &str) -> AttendanceRecord {
        AttendanceRecord {
            attendance_id: id.to_string(),
            student_id: "s-1".to_string(),
            date: date.to_string(),
            check_in_time: "2025-03-04T00:45:00Z".to_string(),
            check_out_time: String::new(),
            temperature: 36.6,
        }
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn summaries_are_sorted_and_counted() {
        let records = [
            record("3", "toileting", &[("number_1", "small")]),
            record("1", "unicorn_time", &[("horn", "shiny")]),
            record("2", "toileting", &[("number_1", "big")]),
        ];
        let bucket = DayBucket {
            activities: records.iter().collect(),
            attendance: Vec::new(),
        };

        let report = assemble_daily_report(
            "s-1",
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            &bucket,
            &StatisticsRegistry::default(),
            offset(),
        );

        assert_eq!(report.date, "2025-03-04");
        let tags = report
            .activities
            .iter()
            .map(|summary| summary.type_activity.as_str())
            .collect::<Vec<_>>();
        assert_eq!(tags, vec!["toileting", "unicorn_time"]);

        for summary in &report.activities {
            assert_eq!(summary.total_sessions, summary.details.len());
        }
        assert_eq!(report.activities[0].total_sessions, 2);
        assert_eq!(
            report.activities[0].details[0].session_id,
            "3",
            "details keep input order"
        );
        assert_eq!(report.activities[1].statistics, None);
        assert_eq!(report.activities[1].details.len(), 1);
    }

    #[test]
    fn attendance_is_appended_last_and_unreadable_dates_dropped() {
        let records = [record("1", "work", &[])];
        let present = attendance("a-1", "2025-03-04T00:00:00Z");
        let unreadable = attendance("a-2", "04/03/2025");
        let bucket = DayBucket {
            activities: records.iter().collect(),
            attendance: vec![&present, &unreadable],
        };

        let report = assemble_daily_report(
            "s-1",
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            &bucket,
            &StatisticsRegistry::default(),
            offset(),
        );

        let last = report.activities.last().expect("attendance summary");
        assert_eq!(last.type_activity, ATTENDANCE_TYPE);
        assert_eq!(last.total_sessions, 1);
        assert_eq!(last.details[0].session_id, "a-1");
        assert_eq!(last.details[0].value_of("temperature"), Some("36.60"));
        assert!(matches!(
            &last.statistics,
            Some(Statistics::Attendance { check_in_time, check_out_time, .. })
                if check_in_time == "Tuesday, March 4, 2025 07:45:00" && check_out_time == "00:00"
        ));
    }

    #[test]
    fn report_serializes_to_public_shape() {
        let records = [record("7", "exercise", &[("duration_of_session", "900")])];
        let bucket = DayBucket {
            activities: records.iter().collect(),
            attendance: Vec::new(),
        };

        let report = assemble_daily_report(
            "s-1",
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            &bucket,
            &StatisticsRegistry::default(),
            offset(),
        );
        let value = serde_json::to_value(&report).expect("serializable");

        assert_eq!(value["student_id"], json!("s-1"));
        assert_eq!(value["activities"][0]["type_activity"], json!("exercise"));
        assert_eq!(value["activities"][0]["total_sessions"], json!(1));
        assert_eq!(
            value["activities"][0]["statistics"],
            json!({ "total": "15m" })
        );
        assert_eq!(
            value["activities"][0]["details"][0]["data"][0],
            json!({ "key": "duration_of_session", "label": "duration_of_session", "value": "900" })
        );
    }

    #[test]
    fn detail_lookup_helpers() {
        let detail = ActivityDetail::from(&record(
            "1",
            "fluids",
            &[("water", "a"), ("milk", "b"), ("water", "c")],
        ));

        assert_eq!(detail.value_of("water"), Some("a"));
        assert_eq!(detail.values_of("water").collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(detail.value_of("juice"), None);
    }
}
