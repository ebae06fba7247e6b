use crate::attendance::{ATTENDANCE_DATE_FORMAT, AttendanceRecord};
use crate::db::ActivityRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

pub type Partition<'a, T> = BTreeMap<String, BTreeMap<NaiveDate, Vec<&'a T>>>;

/// Everything known about one student on one calendar day.
#[derive(Debug, Default)]
pub struct DayBucket<'a> {
    pub activities: Vec<&'a ActivityRecord>,
    pub attendance: Vec<&'a AttendanceRecord>,
}

pub fn attendance_timestamp(record: &AttendanceRecord) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(&record.date, ATTENDANCE_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
}

pub fn partition_activities(activities: &[ActivityRecord]) -> Partition<'_, ActivityRecord> {
    activities.iter().fold(BTreeMap::new(), |mut acc, record| {
        acc.entry(record.student_id.clone())
            .or_insert_with(BTreeMap::new)
            .entry(record.date.date_naive())
            .or_insert_with(Vec::new)
            .push(record);
        acc
    })
}

/// Attendance grouped by its own timestamp. The date filter applies here
/// only; activities are already scoped by the store query.
pub fn partition_attendance(
    attendance: &[AttendanceRecord],
    date_filter: Option<NaiveDate>,
) -> Partition<'_, AttendanceRecord> {
    attendance.iter().fold(BTreeMap::new(), |mut acc, record| {
        let Some(at) = attendance_timestamp(record) else {
            warn!(
                attendance_id = %record.attendance_id,
                date = %record.date,
                "skipping attendance with unreadable date"
            );
            return acc;
        };

        let date = at.date_naive();
        if date_filter.is_some_and(|filter| filter != date) {
            return acc;
        }

        acc.entry(record.student_id.clone())
            .or_insert_with(BTreeMap::new)
            .entry(date)
            .or_insert_with(Vec::new)
            .push(record);
        acc
    })
}

/// Union of both partitions keyed by (student, date), in key order.
pub fn merge_partitions<'a>(
    activities: Partition<'a, ActivityRecord>,
    attendance: Partition<'a, AttendanceRecord>,
) -> BTreeMap<(String, NaiveDate), DayBucket<'a>> {
    let mut buckets: BTreeMap<(String, NaiveDate), DayBucket<'a>> = BTreeMap::new();

    for (student_id, days) in activities {
        for (date, records) in days {
            buckets
                .entry((student_id.clone(), date))
                .or_default()
                .activities
                .extend(records);
        }
    }

    for (student_id, days) in attendance {
        for (date, records) in days {
            buckets
                .entry((student_id.clone(), date))
                .or_default()
                .attendance
                .extend(records);
        }
    }

    buckets
}
