pub const CREATE_ACTIVITIES: &str = r#"
CREATE TABLE IF NOT EXISTS student_activities (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  student_id    TEXT NOT NULL,
  type_activity TEXT NOT NULL,
  date          TEXT NOT NULL,
  day           TEXT NOT NULL,
  data          TEXT NOT NULL DEFAULT '[]',
  submitted_at  TEXT NOT NULL,
  assigned_by   TEXT NOT NULL,
  created_at    TEXT NOT NULL,
  updated_at    TEXT NOT NULL
);
"#;

pub const INDEX_ACTIVITIES_STUDENT_DAY: &str = "CREATE INDEX IF NOT EXISTS idx_student_activities_student_day ON student_activities(student_id, day);";

pub const SELECT_ACTIVITY_COLUMNS: &str = "SELECT id, student_id, type_activity, date, data, submitted_at, assigned_by, created_at, updated_at
     FROM student_activities";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_ACTIVITIES, INDEX_ACTIVITIES_STUDENT_DAY]
}
