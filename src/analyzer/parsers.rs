use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use tracing::{debug, warn};

const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIME_OF_DAY_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const LONG_DISPLAY_FORMAT: &str = "%A, %B %-d, %Y %H:%M:%S";
const TIME_DISPLAY_FORMAT: &str = "%H:%M:%S";
const EMPTY_TIME_DISPLAY: &str = "00:00";

/// Integer seconds. Empty or non-numeric input contributes nothing.
pub fn parse_duration_seconds(key: &str, raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed
        .parse::<i64>()
        .inspect_err(|error| warn!(key, value = raw, error = %error, "invalid duration value"))
        .ok()
}

/// `"{h}h "` when hours are present, `"{m}m"` when minutes are non-zero or
/// there are no hours.
pub fn format_hours_minutes(seconds: i64) -> String {
    let safe_seconds = seconds.max(0);
    let hours = safe_seconds / 3600;
    let minutes = (safe_seconds % 3600) / 60;

    let mut rendered = String::new();
    if hours > 0 {
        rendered.push_str(&format!("{hours}h "));
    }
    if minutes > 0 || hours == 0 {
        rendered.push_str(&format!("{minutes}m"));
    }

    rendered
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiletingDelta {
    Decrement,
    Increment,
    Unchanged,
}

impl ToiletingDelta {
    pub fn classify(raw: &str) -> Self {
        let value = raw.to_lowercase();

        if value.contains("nothing") || value.contains("independent") {
            Self::Decrement
        } else if value.contains("small") || value.contains("big") {
            Self::Increment
        } else {
            Self::Unchanged
        }
    }

    /// Applies the delta without ever going below zero.
    pub fn apply(self, counter: u32) -> u32 {
        match self {
            Self::Decrement => counter.saturating_sub(1),
            Self::Increment => counter + 1,
            Self::Unchanged => counter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FluidMeasure {
    #[serde(default)]
    pub capacity: i64,
    #[serde(default)]
    pub actual_poured: i64,
    #[serde(default)]
    pub consumed: i64,
    #[serde(default)]
    pub remaining: i64,
}

impl FluidMeasure {
    /// Poured fits the cup and consumed plus remaining fits what was poured.
    pub fn is_consistent(&self) -> bool {
        self.actual_poured <= self.capacity
            && self.consumed.saturating_add(self.remaining) <= self.actual_poured
    }
}

/// A fluids field value: either free text or an embedded JSON measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FluidValue {
    Plain(String),
    Structured(FluidMeasure),
}

impl FluidValue {
    pub fn parse(raw: &str) -> Self {
        if !raw.contains('{') {
            return Self::Plain(raw.to_string());
        }

        match serde_json::from_str::<FluidMeasure>(raw) {
            Ok(measure) => {
                if !measure.is_consistent() {
                    debug!(value = raw, "fluid measure does not add up");
                }
                Self::Structured(measure)
            }
            Err(error) => {
                warn!(value = raw, error = %error, "malformed fluid value");
                Self::Plain(raw.to_string())
            }
        }
    }

    pub fn consumed(&self) -> Option<i64> {
        match self {
            Self::Structured(measure) => Some(measure.consumed),
            Self::Plain(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
    TimeOfDay(NaiveTime),
}

/// Tries, in order: RFC 3339 with offset, date-time without offset, bare
/// time of day. Unparseable input comes back unchanged as the error.
pub fn parse_timestamp(raw: &str) -> Result<ParsedTimestamp, String> {
    let trimmed = raw.trim();

    if let Ok(zoned) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ParsedTimestamp::Zoned(zoned));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, NAIVE_DATETIME_FORMAT) {
        return Ok(ParsedTimestamp::Naive(naive));
    }

    TIME_OF_DAY_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .map(ParsedTimestamp::TimeOfDay)
        .ok_or_else(|| raw.to_string())
}

/// Renders a timestamp shifted by `offset` for display.
pub fn to_local_display(raw: &str, offset: FixedOffset) -> String {
    if raw.trim().is_empty() {
        return EMPTY_TIME_DISPLAY.to_string();
    }

    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));

    match parse_timestamp(raw) {
        Ok(ParsedTimestamp::Zoned(zoned)) => zoned
            .with_timezone(&offset)
            .format(LONG_DISPLAY_FORMAT)
            .to_string(),
        Ok(ParsedTimestamp::Naive(naive)) => (naive + shift).format(LONG_DISPLAY_FORMAT).to_string(),
        Ok(ParsedTimestamp::TimeOfDay(time)) => {
            let (shifted, _) = time.overflowing_add_signed(shift);
            shifted.format(TIME_DISPLAY_FORMAT).to_string()
        }
        Err(original) => {
            warn!(value = %original, "unrecognized timestamp, displaying as-is");
            original
        }
    }
}
