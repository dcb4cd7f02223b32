// ABOUTME: Cron expressions for scheduled scans.
// ABOUTME: Accepts the classic five-field form as well as the six/seven-field form with seconds.

use super::WatcherError;
use chrono::{DateTime, Local, TimeZone};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A validated scan schedule.
#[derive(Debug, Clone)]
pub struct ScanSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl ScanSchedule {
    pub fn parse(expression: &str) -> Result<Self, WatcherError> {
        let invalid = |message: String| WatcherError::InvalidCron {
            expression: expression.to_string(),
            message,
        };
        let normalized = normalize(expression).ok_or_else(|| invalid("invalid day of week".to_string()))?;
        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The expression as configured.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next firing time strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// Time to wait from now until the next firing.
    pub fn until_next(&self) -> Option<Duration> {
        let now = Local::now();
        let next = self.next_after(&now)?;
        (next - now).to_std().ok()
    }
}

/// Five-field expressions get a seconds field, and their day-of-week field
/// (0-7, Sunday = 0 or 7) is rewritten in the 1-7 (Sunday = 1) numbering.
fn normalize(expression: &str) -> Option<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Some(fields.join(" "));
    }
    let day_of_week = days_of_week(fields[4])?;
    Some(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], day_of_week
    ))
}

/// Expand a classic day-of-week field into an explicit list of days.
///
/// `None` for values outside 0-7, unknown names and descending ranges.
fn days_of_week(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }
    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step.parse::<usize>().ok().filter(|s| *s > 0)?)),
            None => (item, None),
        };
        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (day(start)?, day(end)?),
            None if step.is_some() => (day(range)?, 6),
            None => (day(range)?, day(range)?),
        };
        if start > end {
            return None;
        }
        days.extend((start..=end).step_by(step.unwrap_or(1)).map(|d| d % 7));
    }
    let days: Vec<String> = days.iter().map(|d| (d + 1).to_string()).collect();
    Some(days.join(","))
}

/// A single day, 0-7 or a three-letter name.
fn day(value: &str) -> Option<usize> {
    if let Ok(n) = value.parse::<usize>() {
        return (n <= 7).then_some(n);
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn five_field_expressions_fire_on_the_minute() {
        let schedule = ScanSchedule::parse("0 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 30).unwrap();
        let next = schedule.next_after(&start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn six_field_expressions_are_kept() {
        let schedule = ScanSchedule::parse("30 */5 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 1, 0).unwrap();
        let next = schedule.next_after(&start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 30).unwrap());
    }

    fn next_day(expression: &str, after: DateTime<Utc>) -> DateTime<Utc> {
        ScanSchedule::parse(expression).unwrap().next_after(&after).unwrap()
    }

    // 2024-05-05 is a Sunday.
    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn sunday_is_zero_or_seven_in_five_field_form() {
        assert_eq!(normalize("0 3 * * 0").as_deref(), Some("0 0 3 * * 1"));
        assert_eq!(normalize("0 3 * * 7").as_deref(), Some("0 0 3 * * 1"));
        assert_eq!(next_day("0 3 * * 0", at(1, 0)), at(5, 3));
        assert_eq!(next_day("0 3 * * 7", at(1, 0)), at(5, 3));
    }

    #[test]
    fn day_of_week_steps_keep_their_stride() {
        assert_eq!(normalize("0 3 * * */2").as_deref(), Some("0 0 3 * * 1,3,5,7"));
        // Monday, then Tuesday.
        assert_eq!(next_day("0 3 * * */2", at(6, 0)), at(7, 3));
    }

    #[test]
    fn day_of_week_ranges_may_end_on_sunday() {
        assert_eq!(normalize("0 3 * * 5-7").as_deref(), Some("0 0 3 * * 1,6,7"));
        assert_eq!(next_day("0 3 * * 5-7", at(6, 0)), at(10, 3));
        assert_eq!(next_day("0 3 * * 5-7", at(11, 4)), at(12, 3));
    }

    #[test]
    fn weekday_ranges_skip_the_weekend() {
        assert_eq!(normalize("0 3 * * 1-5").as_deref(), Some("0 0 3 * * 2,3,4,5,6"));
        // Saturday, then Monday.
        assert_eq!(next_day("0 3 * * 1-5", at(4, 0)), at(6, 3));
    }

    #[test]
    fn day_names_are_translated() {
        assert_eq!(normalize("0 3 * * mon,FRI").as_deref(), Some("0 0 3 * * 2,6"));
        assert_eq!(normalize("0 3 * * *").as_deref(), Some("0 0 3 * * *"));
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        let err = ScanSchedule::parse("every hour").unwrap_err();
        assert!(matches!(err, WatcherError::InvalidCron { .. }));
        assert!(ScanSchedule::parse("61 * * * *").is_err());
        assert!(ScanSchedule::parse("0 3 * * 6-2").is_err());
        assert!(ScanSchedule::parse("0 3 * * 8").is_err());
    }

    #[test]
    fn until_next_is_bounded_by_the_period() {
        let schedule = ScanSchedule::parse("* * * * *").unwrap();
        assert!(schedule.until_next().unwrap() <= Duration::from_secs(60));
    }
}
