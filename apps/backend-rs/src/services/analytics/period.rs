use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use super::{types::Period, AnalyticsError};

const DAY_MICROS: i64 = 86_400_000_000;
const MAX_RELATIVE_COUNT: i64 = 10_000;

/// Smallest representable step between two stored timestamps.
pub fn instant() -> Duration {
    Duration::microseconds(1)
}

/// Whole UTC days `start..=end`.
pub fn resolve_dates(start: NaiveDate, end: NaiveDate) -> Result<Period, AnalyticsError> {
    if end < start {
        return Err(AnalyticsError::InvalidRange(format!(
            "end {end} precedes start {start}."
        )));
    }
    let period_start = day_start(start);
    let period_end = end
        .succ_opt()
        .map(day_start)
        .ok_or_else(|| AnalyticsError::InvalidRange(format!("end {end} is out of range.")))?
        - instant();

    Ok(Period {
        start: period_start,
        end: period_end,
        days: span_days(period_start, period_end),
    })
}

/// Widens arbitrary instants to the whole UTC days that contain them.
pub fn resolve_instants(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Period, AnalyticsError> {
    if end < start {
        return Err(AnalyticsError::InvalidRange(format!(
            "end {} precedes start {}.",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    resolve_dates(start.date_naive(), end.date_naive())
}

/// Relative ranges end on `today`: `today`, `yesterday`, `7d`, `2w`, `last_30_days`.
pub fn resolve_relative(range: &str, today: NaiveDate) -> Result<Period, AnalyticsError> {
    let normalized = range.trim().to_ascii_lowercase();
    let unsupported = || AnalyticsError::InvalidRange(format!("unsupported range '{}'.", range.trim()));

    match normalized.as_str() {
        "today" => resolve_dates(today, today),
        "yesterday" => {
            let day = today.pred_opt().ok_or_else(unsupported)?;
            resolve_dates(day, day)
        }
        other => {
            let days = parse_day_count(other).ok_or_else(unsupported)?;
            let start = today
                .checked_sub_signed(Duration::days(days - 1))
                .ok_or_else(unsupported)?;
            resolve_dates(start, today)
        }
    }
}

pub fn ensure_within(period: &Period, max_days: i64) -> Result<(), AnalyticsError> {
    if period.days > max_days {
        return Err(AnalyticsError::InvalidRange(format!(
            "period spans {} days; the maximum is {max_days}.",
            period.days
        )));
    }
    Ok(())
}

impl Period {
    /// The equal-length window ending one instant before this one starts.
    /// Fails when that window would start before the earliest representable day.
    pub fn preceding(&self) -> Result<Period, AnalyticsError> {
        let out_of_range = || {
            AnalyticsError::InvalidRange(format!(
                "no prior period exists before {}.",
                self.start.date_naive()
            ))
        };
        Ok(Period {
            start: self
                .start
                .checked_sub_signed(Duration::days(self.days))
                .ok_or_else(out_of_range)?,
            end: self.start.checked_sub_signed(instant()).ok_or_else(out_of_range)?,
            days: self.days,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// Calendar days covered by the period, oldest first.
    pub fn calendar_days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.end.date_naive();
        std::iter::successors(Some(self.start.date_naive()), |day| day.succ_opt())
            .take_while(move |day| *day <= last)
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn span_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let span = end - start;
    let days = match span.num_microseconds() {
        Some(micros) => (micros + DAY_MICROS - 1) / DAY_MICROS,
        None => span.num_days() + 1,
    };
    days.max(1)
}

fn parse_day_count(raw: &str) -> Option<i64> {
    let (count, multiplier) =
        if let Some(count) = raw.strip_prefix("last_").and_then(|rest| rest.strip_suffix("_days")) {
            (count, 1)
        } else if let Some(count) = raw.strip_suffix('d') {
            (count, 1)
        } else if let Some(count) = raw.strip_suffix('w') {
            (count, 7)
        } else {
            return None;
        };

    let value = count.parse::<i64>().ok()?;
    (1..=MAX_RELATIVE_COUNT)
        .contains(&value)
        .then_some(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::{ensure_within, resolve_dates, resolve_instants, resolve_relative};
    use crate::services::analytics::AnalyticsError;
    use chrono::{NaiveDate, SecondsFormat, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn week_spans_seven_days() {
        let period = resolve_dates(date(2025, 11, 1), date(2025, 11, 7)).expect("period");
        assert_eq!(period.days, 7);
        assert_eq!(
            period.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2025-11-01T00:00:00Z"
        );
        assert_eq!(
            period.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2025-11-07T23:59:59Z"
        );
    }

    #[test]
    fn single_day_has_one_day() {
        let period = resolve_dates(date(2025, 11, 1), date(2025, 11, 1)).expect("period");
        assert_eq!(period.days, 1);
        assert_eq!(period.calendar_days().count(), 1);
    }

    #[test]
    fn end_before_start_is_invalid() {
        let result = resolve_dates(date(2025, 11, 7), date(2025, 11, 1));
        assert!(matches!(result, Err(AnalyticsError::InvalidRange(_))));

        let start = Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 11, 1, 11, 59, 59).unwrap();
        assert!(matches!(
            resolve_instants(start, end),
            Err(AnalyticsError::InvalidRange(_))
        ));
    }

    #[test]
    fn instants_widen_to_whole_days() {
        let start = Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 11, 2, 6, 0, 0).unwrap();
        let period = resolve_instants(start, end).expect("period");
        assert_eq!(period.days, 2);
        assert_eq!(period.calendar_days().count(), 2);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn preceding_period_is_adjacent_and_equal_length() {
        let period = resolve_dates(date(2025, 11, 1), date(2025, 11, 7)).expect("period");
        let prior = period.preceding().expect("prior");
        assert_eq!(prior.days, 7);
        assert_eq!(prior.end + super::instant(), period.start);
        assert_eq!(prior.start.date_naive(), date(2025, 10, 25));
        assert_eq!(prior.end.date_naive(), date(2025, 10, 31));
        assert_eq!(prior.calendar_days().count(), 7);
    }

    #[test]
    fn earliest_day_has_no_prior_period() {
        let period = resolve_dates(NaiveDate::MIN, NaiveDate::MIN).expect("period");
        assert!(matches!(
            period.preceding(),
            Err(AnalyticsError::InvalidRange(_))
        ));

        let second = NaiveDate::MIN.succ_opt().expect("day");
        let period = resolve_dates(second, second).expect("period");
        assert_eq!(period.preceding().expect("prior").start.date_naive(), NaiveDate::MIN);
    }

    #[test]
    fn calendar_days_cross_month_and_leap_day() {
        let period = resolve_dates(date(2024, 2, 27), date(2024, 3, 1)).expect("period");
        let days = period.calendar_days().collect::<Vec<_>>();
        assert_eq!(
            days,
            vec![date(2024, 2, 27), date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
        assert_eq!(period.days, 4);
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let period = resolve_dates(date(2025, 11, 1), date(2025, 11, 1)).expect("period");
        assert!(period.contains(period.start));
        assert!(period.contains(period.end));
        assert!(!period.contains(period.end + super::instant()));
    }

    #[test]
    fn relative_ranges_end_today() {
        let today = date(2025, 11, 7);

        let week = resolve_relative("7d", today).expect("7d");
        assert_eq!(week.days, 7);
        assert_eq!(week.start.date_naive(), date(2025, 11, 1));
        assert_eq!(week.end.date_naive(), today);

        let named = resolve_relative("last_30_days", today).expect("last_30_days");
        assert_eq!(named.days, 30);

        let weeks = resolve_relative("2W", today).expect("2w");
        assert_eq!(weeks.days, 14);

        let yesterday = resolve_relative("yesterday", today).expect("yesterday");
        assert_eq!(yesterday.start.date_naive(), date(2025, 11, 6));
        assert_eq!(yesterday.days, 1);

        assert_eq!(resolve_relative(" today ", today).expect("today").days, 1);
    }

    #[test]
    fn rejects_unknown_or_empty_relative_ranges() {
        let today = date(2025, 11, 7);
        for raw in ["0d", "-3d", "fortnight", "", "last_x_days"] {
            assert!(
                matches!(resolve_relative(raw, today), Err(AnalyticsError::InvalidRange(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn enforces_maximum_span() {
        let period = resolve_dates(date(2025, 1, 1), date(2025, 12, 31)).expect("period");
        assert!(ensure_within(&period, 366).is_ok());
        assert!(matches!(
            ensure_within(&period, 30),
            Err(AnalyticsError::InvalidRange(_))
        ));
    }
}
