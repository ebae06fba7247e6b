pub mod grouping;
pub mod parsers;
pub mod report;
pub mod statistics;

use crate::analyzer::report::{DailyReport, assemble_daily_report};
use crate::analyzer::statistics::StatisticsRegistry;
use crate::attendance::AttendanceRecord;
use crate::db::ActivityRecord;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};

pub const DEFAULT_DISPLAY_OFFSET_HOURS: i32 = 7;

/// Turns fetched activity and attendance records into daily reports. Pure and
/// shareable across requests.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    registry: StatisticsRegistry,
    display_offset: FixedOffset,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(display_offset(DEFAULT_DISPLAY_OFFSET_HOURS))
    }
}

impl ReportBuilder {
    pub fn new(display_offset: FixedOffset) -> Self {
        Self {
            registry: StatisticsRegistry::default(),
            display_offset,
        }
    }

    #[cfg(test)]
    pub fn with_registry(mut self, registry: StatisticsRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// One report per (student, date) seen in either input, sorted by
    /// student then date. `date_filter` narrows attendance only.
    pub fn build(
        &self,
        activities: &[ActivityRecord],
        attendance: &[AttendanceRecord],
        date_filter: Option<NaiveDate>,
    ) -> Vec<DailyReport> {
        let buckets = grouping::merge_partitions(
            grouping::partition_activities(activities),
            grouping::partition_attendance(attendance, date_filter),
        );

        buckets
            .iter()
            .map(|((student_id, date), bucket)| {
                assemble_daily_report(
                    student_id,
                    *date,
                    bucket,
                    &self.registry,
                    self.display_offset,
                )
            })
            .collect()
    }
}

/// Whole-hour display offset, clamped to ±23h.
pub fn display_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.clamp(-23, 23) * 3600).unwrap_or_else(|| Utc.fix())
}
