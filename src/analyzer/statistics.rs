use crate::analyzer::parsers::{
    FluidValue, ToiletingDelta, format_hours_minutes, parse_duration_seconds, to_local_display,
};
use crate::analyzer::report::ActivityDetail;
use chrono::FixedOffset;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::warn;

static DISH_NAME_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^what_is_the_name_of_the_(.+)_dish$").expect("dish key pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DishAverage {
    pub dish_name: String,
    /// Average portion across sessions; the name is kept for client
    /// compatibility.
    pub total: f64,
}

/// Derived metrics of one activity type for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistics {
    SleepRest {
        sleep: String,
        rest: String,
        total: String,
    },
    Toileting {
        number_1: u32,
        number_2: u32,
        number_3: u32,
        max: u32,
    },
    Exercise {
        total: String,
    },
    Food {
        dishes: Vec<DishAverage>,
    },
    Fluids {
        water: String,
        juice: String,
        smoothies: String,
        milk: String,
        other: String,
    },
    Attendance {
        total_records: usize,
        check_in_time: String,
        check_out_time: String,
        temperature_avg: String,
        temperature_readings: usize,
    },
}

pub type Generator = fn(&[ActivityDetail]) -> Option<Statistics>;

/// Maps a `type_activity` tag to its generator. Unregistered tags have no
/// statistics.
#[derive(Debug, Clone)]
pub struct StatisticsRegistry {
    generators: HashMap<String, Generator>,
}

impl Default for StatisticsRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("sleep_rest", sleep_rest_statistics);
        registry.register("toileting", toileting_statistics);
        registry.register("exercise", exercise_statistics);
        registry.register("food", food_statistics);
        registry.register("fluids", fluids_statistics);
        registry.register("social_play", no_statistics);
        registry.register("work", no_statistics);
        registry
    }
}

impl StatisticsRegistry {
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    pub fn register(&mut self, type_activity: &str, generator: Generator) {
        self.generators.insert(type_activity.to_string(), generator);
    }

    pub fn is_registered(&self, type_activity: &str) -> bool {
        self.generators.contains_key(type_activity)
    }

    pub fn generate(&self, type_activity: &str, details: &[ActivityDetail]) -> Option<Statistics> {
        self.generators
            .get(type_activity)
            .and_then(|generator| generator(details))
    }
}

/// Sum that skips any value which would overflow the running total.
fn checked_total(key: &str, values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0_i64, |total, value| {
        total.checked_add(value).unwrap_or_else(|| {
            warn!(key, value, "total would overflow, skipping value");
            total
        })
    })
}

fn sum_durations(details: &[ActivityDetail], key: &str) -> i64 {
    checked_total(
        key,
        details
            .iter()
            .flat_map(|detail| detail.values_of(key))
            .filter_map(|value| parse_duration_seconds(key, value)),
    )
}

pub fn sleep_rest_statistics(details: &[ActivityDetail]) -> Option<Statistics> {
    let sleep = sum_durations(details, "duration_of_sleep");
    let rest = sum_durations(details, "duration_of_rest");

    Some(Statistics::SleepRest {
        sleep: format_hours_minutes(sleep),
        rest: format_hours_minutes(rest),
        total: format_hours_minutes(sleep.saturating_add(rest)),
    })
}

pub fn exercise_statistics(details: &[ActivityDetail]) -> Option<Statistics> {
    Some(Statistics::Exercise {
        total: format_hours_minutes(sum_durations(details, "duration_of_session")),
    })
}

pub fn toileting_statistics(details: &[ActivityDetail]) -> Option<Statistics> {
    let mut counters = [0_u32; 3];

    for field in details.iter().flat_map(|detail| detail.data.iter()) {
        let slot = match field.key.as_str() {
            "number_1" => 0,
            "number_2" => 1,
            "number_3" => 2,
            _ => continue,
        };
        counters[slot] = ToiletingDelta::classify(&field.value).apply(counters[slot]);
    }

    let [number_1, number_2, number_3] = counters;
    Some(Statistics::Toileting {
        number_1,
        number_2,
        number_3,
        max: number_1 + number_2 + number_3,
    })
}

pub fn food_statistics(details: &[ActivityDetail]) -> Option<Statistics> {
    let mut portions: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for detail in details {
        for field in &detail.data {
            let Some(captures) = DISH_NAME_KEY.captures(&field.key) else {
                continue;
            };
            let consumption_key = format!("how_much_the_student_ate_the_{}_dish", &captures[1]);

            let Some(raw) = detail.value_of(&consumption_key) else {
                continue;
            };

            match raw.trim().parse::<f64>() {
                Ok(amount) if amount.is_finite() => {
                    portions.entry(field.value.clone()).or_default().push(amount);
                }
                _ => warn!(key = %consumption_key, value = raw, "invalid dish consumption"),
            }
        }
    }

    let dishes = portions
        .into_iter()
        .map(|(dish_name, amounts)| {
            let average = amounts.iter().sum::<f64>() / amounts.len() as f64;
            DishAverage {
                dish_name,
                total: (average * 100.0).round() / 100.0,
            }
        })
        .collect::<Vec<_>>();

    Some(Statistics::Food { dishes })
}

pub fn fluids_statistics(details: &[ActivityDetail]) -> Option<Statistics> {
    let consumed = |key: &str| -> i64 {
        checked_total(
            key,
            details
                .iter()
                .flat_map(|detail| detail.values_of(key))
                .filter_map(|value| FluidValue::parse(value).consumed()),
        )
    };

    Some(Statistics::Fluids {
        water: format!("{}ml", consumed("water")),
        juice: format!("{}ml", consumed("juice")),
        smoothies: format!("{}ml", consumed("smoothie")),
        milk: format!("{}ml", consumed("milk")),
        other: format!("{}ml", consumed("other_fluid")),
    })
}

pub fn no_statistics(_details: &[ActivityDetail]) -> Option<Statistics> {
    None
}

/// Check-in/out of the day's attendance, shifted to display time.
pub fn attendance_statistics(details: &[ActivityDetail], offset: FixedOffset) -> Statistics {
    let readings = details
        .iter()
        .filter_map(|detail| detail.value_of("temperature"))
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .collect::<Vec<_>>();
    let average = if readings.is_empty() {
        0.0
    } else {
        readings.iter().sum::<f64>() / readings.len() as f64
    };

    Statistics::Attendance {
        total_records: details.len(),
        check_in_time: to_local_display(first_present(details, "check_in_time"), offset),
        check_out_time: to_local_display(first_present(details, "check_out_time"), offset),
        temperature_avg: format!("{average:.2}°C"),
        temperature_readings: readings.len(),
    }
}

fn first_present<'a>(details: &'a [ActivityDetail], key: &str) -> &'a str {
    details
        .iter()
        .filter_map(|detail| detail.value_of(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{DishAverage, Statistics, StatisticsRegistry, attendance_statistics};
    use crate::analyzer::report::ActivityDetail;
    use crate::db::ActivityField;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn detail(type_activity: &str, fields: &[(&str, &str)]) -> ActivityDetail {
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap();
        ActivityDetail {
            session_id: "1".to_string(),
            type_activity: type_activity.to_string(),
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

    #[test]
    fn sleep_rest_sums_and_formats() {
        let registry = StatisticsRegistry::default();
        let details = [
            detail(
                "sleep_rest",
                &[("duration_of_sleep", "3600"), ("duration_of_rest", "600")],
            ),
            detail(
                "sleep_rest",
                &[("duration_of_sleep", "61"), ("duration_of_rest", "oops")],
            ),
        ];

        assert_eq!(
            registry.generate("sleep_rest", &details),
            Some(Statistics::SleepRest {
                sleep: "1h 1m".to_string(),
                rest: "10m".to_string(),
                total: "1h 11m".to_string(),
            })
        );
    }

    #[test]
    fn toileting_never_goes_negative_mid_accumulation() {
        let registry = StatisticsRegistry::default();
        let details = [
            detail("toileting", &[("number_1", "Nothing"), ("number_2", "small")]),
            detail("toileting", &[("number_1", "Big"), ("number_2", "independent")]),
            detail("toileting", &[("number_1", "small"), ("number_3", "nothing")]),
        ];

        // A leading "nothing" must not eat the later increments.
        assert_eq!(
            registry.generate("toileting", &details),
            Some(Statistics::Toileting {
                number_1: 2,
                number_2: 0,
                number_3: 0,
                max: 2,
            })
        );
    }

    #[test]
    fn exercise_totals_session_durations() {
        let registry = StatisticsRegistry::default();
        let details = [
            detail("exercise", &[("duration_of_session", "1800")]),
            detail("exercise", &[("duration_of_session", "1800")]),
        ];

        assert_eq!(
            registry.generate("exercise", &details),
            Some(Statistics::Exercise {
                total: "1h ".to_string()
            })
        );
    }

    #[test]
    fn food_averages_per_dish() {
        let registry = StatisticsRegistry::default();
        let details = [
            detail(
                "food",
                &[
                    ("what_is_the_name_of_the_first_dish", "Rice"),
                    ("how_much_the_student_ate_the_first_dish", "2.0"),
                    ("what_is_the_name_of_the_second_dish", "Soup"),
                    ("how_much_the_student_ate_the_second_dish", "1.333"),
                ],
            ),
            detail(
                "food",
                &[
                    ("what_is_the_name_of_the_first_dish", "Rice"),
                    ("how_much_the_student_ate_the_first_dish", "4.0"),
                    ("what_is_the_name_of_the_second_dish", "Fish"),
                    ("how_much_the_student_ate_the_second_dish", "all of it"),
                ],
            ),
        ];

        assert_eq!(
            registry.generate("food", &details),
            Some(Statistics::Food {
                dishes: vec![
                    DishAverage {
                        dish_name: "Rice".to_string(),
                        total: 3.0
                    },
                    DishAverage {
                        dish_name: "Soup".to_string(),
                        total: 1.33
                    },
                ]
            })
        );
    }

    #[test]
    fn fluids_sum_consumed_per_category() {
        let registry = StatisticsRegistry::default();
        let details = [
            detail(
                "fluids",
                &[
                    (
                        "water",
                        r#"{"capacity":200,"actual_poured":200,"consumed":150,"remaining":50}"#,
                    ),
                    ("milk", "a glass"),
                ],
            ),
            detail(
                "fluids",
                &[
                    (
                        "water",
                        r#"{"capacity":200,"actual_poured":150,"consumed":100,"remaining":50}"#,
                    ),
                    ("smoothie", r#"{"consumed":80}"#),
                    ("other_fluid", r#"{"consumed":"x"}"#),
                ],
            ),
        ];

        assert_eq!(
            registry.generate("fluids", &details),
            Some(Statistics::Fluids {
                water: "250ml".to_string(),
                juice: "0ml".to_string(),
                smoothies: "80ml".to_string(),
                milk: "0ml".to_string(),
                other: "0ml".to_string(),
            })
        );
    }

    #[test]
    fn overflowing_values_are_skipped_not_summed() {
        let registry = StatisticsRegistry::default();
        let details = [
            detail(
                "sleep_rest",
                &[("duration_of_sleep", "9223372036854775807"), ("duration_of_rest", "60")],
            ),
            detail("sleep_rest", &[("duration_of_sleep", "1")]),
        ];

        assert_eq!(
            registry.generate("sleep_rest", &details),
            Some(Statistics::SleepRest {
                sleep: "2562047788015215h 30m".to_string(),
                rest: "1m".to_string(),
                total: "2562047788015215h 30m".to_string(),
            })
        );

        let fluids = [
            detail("fluids", &[("water", r#"{"consumed":9223372036854775807}"#)]),
            detail("fluids", &[("water", r#"{"consumed":9223372036854775807}"#)]),
        ];
        assert!(matches!(
            registry.generate("fluids", &fluids),
            Some(Statistics::Fluids { water, .. }) if water == "9223372036854775807ml"
        ));
    }

    #[test]
    fn unknown_and_empty_types_have_no_statistics() {
        let registry = StatisticsRegistry::default();
        let details = [detail("work", &[("note", "sorting blocks")])];

        assert!(registry.is_registered("work"));
        assert_eq!(registry.generate("work", &details), None);
        assert_eq!(registry.generate("social_play", &details), None);
        assert!(!registry.is_registered("unicorn_time"));
        assert_eq!(registry.generate("unicorn_time", &details), None);
    }

    #[test]
    fn registry_accepts_new_types() {
        fn nap_count(details: &[ActivityDetail]) -> Option<Statistics> {
            Some(Statistics::Exercise {
                total: details.len().to_string(),
            })
        }

        let mut registry = StatisticsRegistry::empty();
        registry.register("nap", nap_count);

        assert_eq!(
            registry.generate("nap", &[detail("nap", &[])]),
            Some(Statistics::Exercise {
                total: "1".to_string()
            })
        );
    }

    #[test]
    fn attendance_uses_first_present_times() {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let details = [
            detail(
                "attendance",
                &[
                    ("check_in_time", ""),
                    ("check_out_time", "2025-03-04T09:30:00Z"),
                    ("temperature", "36.50"),
                ],
            ),
            detail(
                "attendance",
                &[
                    ("check_in_time", "2025-03-04T01:00:00Z"),
                    ("temperature", "37.00"),
                ],
            ),
        ];

        assert_eq!(
            attendance_statistics(&details, offset),
            Statistics::Attendance {
                total_records: 2,
                check_in_time: "Tuesday, March 4, 2025 08:00:00".to_string(),
                check_out_time: "Tuesday, March 4, 2025 16:30:00".to_string(),
                temperature_avg: "36.75°C".to_string(),
                temperature_readings: 2,
            }
        );
    }

    #[test]
    fn attendance_without_times_renders_placeholder() {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let stats = attendance_statistics(&[detail("attendance", &[])], offset);

        assert_eq!(
            stats,
            Statistics::Attendance {
                total_records: 1,
                check_in_time: "00:00".to_string(),
                check_out_time: "00:00".to_string(),
                temperature_avg: "0.00°C".to_string(),
                temperature_readings: 0,
            }
        );
    }
}
