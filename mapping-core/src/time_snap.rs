use crate::error::{self, Error};
use chrono::{Datelike, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The cadence of a time-indexed external raster collection (spec §4.5,
/// §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    /// The divisor `value` must evenly divide, per §4.5's constraint
    /// (`max_of(unit) mod value == 0`); `Year` has no such cycle and
    /// requires `value == 1`.
    fn max_of(self) -> Option<i64> {
        match self {
            TimeUnit::Year => None,
            TimeUnit::Month => Some(12),
            TimeUnit::Day => Some(31),
            TimeUnit::Hour => Some(24),
            TimeUnit::Minute => Some(60),
            TimeUnit::Second => Some(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub unit: TimeUnit,
    pub value: i64,
}

impl TimeInterval {
    pub fn new(unit: TimeUnit, value: i64) -> Result<Self, Error> {
        if unit == TimeUnit::Year {
            if value != 1 {
                return error::ConfigError {
                    reason: "time_interval unit Year requires value = 1".to_string(),
                }
                .fail();
            }
        } else if let Some(max) = unit.max_of() {
            if value < 1 || max % value != 0 {
                return error::ConfigError {
                    reason: format!("time_interval value {value} does not evenly divide unit {unit:?}"),
                }
                .fail();
            }
        }
        Ok(Self { unit, value })
    }
}

fn to_naive(t: i64) -> NaiveDateTime {
    Utc.timestamp_opt(t, 0).single().expect("unix seconds in range").naive_utc()
}

fn from_naive(dt: NaiveDateTime) -> i64 {
    Utc.from_utc_datetime(&dt).timestamp()
}

/// `snap(t_start, interval, t_wanted) -> (t_begin, t_end)` (spec §4.5
/// steps 2-5). `t_end_bound` is the descriptor's optional overall
/// `time_end`; when present, `t_wanted` past it fails.
pub fn snap(t_start: i64, interval: TimeInterval, t_wanted: i64, t_end_bound: Option<i64>) -> Result<(i64, i64), Error> {
    if t_wanted < t_start || t_end_bound.is_some_and(|end| t_wanted > end) {
        return error::NoRasterForGivenTime.fail();
    }

    let start = to_naive(t_start);
    let wanted = to_naive(t_wanted);
    let value = interval.value;

    let t_begin = match interval.unit {
        TimeUnit::Year => {
            let k = (wanted.year() - start.year()) as i64 / value;
            shift_years(start, k * value)
        }
        TimeUnit::Month => {
            let delta_months = (wanted.year() - start.year()) as i64 * 12 + (wanted.month() as i64 - start.month() as i64);
            let k = delta_months.div_euclid(value);
            shift_months(start, k * value)
        }
        TimeUnit::Day => {
            let delta = (wanted.date() - start.date()).num_days();
            let k = delta.div_euclid(value);
            start + chrono::Duration::days(k * value)
        }
        TimeUnit::Hour => {
            let delta = (wanted - start).num_hours();
            let k = delta.div_euclid(value);
            start + chrono::Duration::hours(k * value)
        }
        TimeUnit::Minute => {
            let delta = (wanted - start).num_minutes();
            let k = delta.div_euclid(value);
            start + chrono::Duration::minutes(k * value)
        }
        TimeUnit::Second => {
            let delta = (wanted - start).num_seconds();
            let k = delta.div_euclid(value);
            start + chrono::Duration::seconds(k * value)
        }
    };

    let t_end = match interval.unit {
        TimeUnit::Year => shift_years(t_begin, value),
        TimeUnit::Month => shift_months(t_begin, value),
        TimeUnit::Day => t_begin + chrono::Duration::days(value),
        TimeUnit::Hour => t_begin + chrono::Duration::hours(value),
        TimeUnit::Minute => t_begin + chrono::Duration::minutes(value),
        TimeUnit::Second => t_begin + chrono::Duration::seconds(value),
    };

    Ok((from_naive(t_begin), from_naive(t_end)))
}

fn shift_years(dt: NaiveDateTime, years: i64) -> NaiveDateTime {
    let date = dt.date();
    let target_year = date.year() + years as i32;
    let new_date = chrono::NaiveDate::from_ymd_opt(target_year, date.month(), date.day())
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(target_year, date.month(), 28).expect("day 28 always valid"));
    NaiveDateTime::new(new_date, dt.time())
}

fn shift_months(dt: NaiveDateTime, months: i64) -> NaiveDateTime {
    let date = dt.date();
    let total_months = (date.year() as i64) * 12 + (date.month() as i64 - 1) + months;
    let target_year = total_months.div_euclid(12) as i32;
    let target_month = total_months.rem_euclid(12) as u32 + 1;
    let new_date = chrono::NaiveDate::from_ymd_opt(target_year, target_month, date.day())
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(target_year, target_month, 28).expect("day 28 always valid"));
    NaiveDateTime::new(new_date, dt.time())
}

/// Formats `t` with a `strftime`-style `time_format` and substitutes it
/// for the first occurrence of `%%%TIME_STRING%%%` in `template` (spec
/// §4.5 step 6). Only the first placeholder is replaced; callers
/// validating a descriptor should reject templates with more than one.
pub fn format_into_template(t: i64, time_format: &str, template: &str) -> String {
    let formatted = to_naive(t).format(time_format).to_string();
    template.replacen("%%%TIME_STRING%%%", &formatted, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_snap_s2() {
        let start = 946684800; // 2000-01-01T00:00:00Z
        let interval = TimeInterval::new(TimeUnit::Month, 1).unwrap();

        assert!(matches!(snap(start, interval, 941414400, None), Err(Error::NoRasterForGivenTime)));
        assert!(matches!(snap(start, interval, 944006400, None), Err(Error::NoRasterForGivenTime)));

        let (t_begin, t_end) = snap(start, interval, 973036800, None).unwrap();
        let begin_dt = to_naive(t_begin);
        assert_eq!((begin_dt.year(), begin_dt.month(), begin_dt.day()), (2000, 10, 1));
        let end_dt = to_naive(t_end);
        assert_eq!((end_dt.year(), end_dt.month(), end_dt.day()), (2000, 11, 1));
    }

    #[test]
    fn year_requires_value_one() {
        assert!(TimeInterval::new(TimeUnit::Year, 2).is_err());
        assert!(TimeInterval::new(TimeUnit::Year, 1).is_ok());
    }

    #[test]
    fn month_value_must_divide_twelve() {
        assert!(TimeInterval::new(TimeUnit::Month, 5).is_err());
        assert!(TimeInterval::new(TimeUnit::Month, 3).is_ok());
    }

    #[test]
    fn template_replaces_first_placeholder_only() {
        let out = format_into_template(946684800, "%Y-%m-%d", "prefix_%%%TIME_STRING%%%_suffix");
        assert_eq!(out, "prefix_2000-01-01_suffix");
    }
}
