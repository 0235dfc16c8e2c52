use std::iter::FusedIterator;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::bundle::FieldSetBundle;
use crate::errors::CronError;

/// Years past this bound end the search, so expressions that can never match
/// (such as the 30th of February) do not scan forever.
pub const YEAR_UPPER_LIMIT: i32 = 5000;

/// Naive local start and optional end of the period occurrences are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
}

impl Window {
    /// Creates a window, checking that `end` does not precede `start`.
    ///
    /// # Errors
    ///
    /// Returns [`CronError::InvalidWindow`] when `end < start`.
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Result<Self, CronError> {
        match end {
            Some(end) if end < start => Err(CronError::InvalidWindow { start, end }),
            _ => Ok(Self { start, end }),
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }

    /// First minute the engine may emit.
    ///
    /// A start exactly on a minute boundary is itself eligible. A start with any
    /// seconds or sub-second remainder lies after the top of its minute, so that
    /// minute is excluded and the next one is returned.
    pub fn first_eligible_minute(&self) -> Option<NaiveDateTime> {
        let floor = self.start.with_second(0)?.with_nanosecond(0)?;
        if floor == self.start {
            Some(floor)
        } else {
            floor.checked_add_signed(Duration::minutes(1))
        }
    }
}

/// Lazy ascending sequence of naive minutes matching a [`FieldSetBundle`].
///
/// The engine is single-pass; build a new one from the same bundle and window to
/// start over.
///
/// ```rust
/// use chrono::NaiveDate;
/// use tzcron::{compile, OccurrenceEngine, Window};
///
/// let bundle = compile("0 12 * * * *").unwrap();
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let window = Window::new(start, None).unwrap();
///
/// let noons: Vec<_> = OccurrenceEngine::new(bundle, &window).take(3).collect();
/// assert_eq!(noons[2].to_string(), "2024-01-03 12:00:00");
/// ```
#[derive(Debug, Clone)]
pub struct OccurrenceEngine {
    bundle: Arc<FieldSetBundle>,
    end: Option<NaiveDateTime>,
    cursor: Option<NaiveDateTime>,
}

impl OccurrenceEngine {
    pub fn new(bundle: impl Into<Arc<FieldSetBundle>>, window: &Window) -> Self {
        Self {
            bundle: bundle.into(),
            end: window.end(),
            cursor: window.first_eligible_minute(),
        }
    }

    /// Next minute that will be examined, `None` once the sequence is exhausted.
    pub fn cursor(&self) -> Option<NaiveDateTime> {
        self.cursor
    }

    pub fn bundle(&self) -> &FieldSetBundle {
        &self.bundle
    }

    /// Moves the cursor forward to `time`. A cursor already past `time` is left alone.
    pub fn skip_to(&mut self, time: NaiveDateTime) {
        self.cursor = self.cursor.map(|cursor| cursor.max(time));
    }

    // Whole months, days and hours that cannot match are skipped at once; the result
    // is the same as examining every minute in turn.
    fn find_from(&self, mut time: NaiveDateTime) -> Option<NaiveDateTime> {
        loop {
            if self.end.is_some_and(|end| time > end) {
                tracing::debug!(end = ?self.end, "window end reached");
                return None;
            }
            if time.year() > YEAR_UPPER_LIMIT {
                tracing::debug!(limit = YEAR_UPPER_LIMIT, "year search limit reached");
                return None;
            }

            if !self.bundle.month_match(time.month()) {
                time = start_of_next_month(time.date())?;
                continue;
            }

            if !self.bundle.day_match(time.date()) {
                time = start_of_next_day(time.date())?;
                continue;
            }

            match self.bundle.hours.next_from(time.hour()) {
                Some(hour) if hour == time.hour() => {}
                Some(hour) => {
                    time = time.date().and_hms_opt(hour, 0, 0)?;
                    continue;
                }
                None => {
                    time = start_of_next_day(time.date())?;
                    continue;
                }
            }

            match self.bundle.minutes.next_from(time.minute()) {
                Some(minute) if minute == time.minute() => return Some(time),
                Some(minute) => time = time.with_minute(minute)?,
                None => {
                    time = time
                        .with_minute(0)?
                        .checked_add_signed(Duration::hours(1))?;
                }
            }
        }
    }
}

impl Iterator for OccurrenceEngine {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        let found = self.find_from(self.cursor?);
        self.cursor = found.and_then(|time| time.checked_add_signed(Duration::minutes(1)));
        found
    }
}

impl FusedIterator for OccurrenceEngine {}

/// Midnight on January 1st of `year`, or the latest representable time for years
/// chrono cannot hold.
pub(crate) fn start_of_year(year: i32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .map(|date| date.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX)
}

fn start_of_next_day(date: NaiveDate) -> Option<NaiveDateTime> {
    Some(date.succ_opt()?.and_time(NaiveTime::MIN))
}

fn start_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use chrono::Weekday;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn engine(expression: &str, start: NaiveDateTime, end: Option<NaiveDateTime>) -> OccurrenceEngine {
        let bundle = compile(expression).expect("valid expression");
        OccurrenceEngine::new(bundle, &Window::new(start, end).expect("valid window"))
    }

    #[test]
    fn test_window_rejects_end_before_start() {
        let start = at(2024, 1, 2, 0, 0, 0);
        let end = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(
            Window::new(start, Some(end)),
            Err(CronError::InvalidWindow { start, end })
        );
        assert!(Window::new(start, Some(start)).is_ok());
    }

    #[test]
    fn test_first_eligible_minute() {
        let on_boundary = Window::new(at(2024, 1, 1, 10, 5, 0), None).unwrap();
        assert_eq!(on_boundary.first_eligible_minute(), Some(at(2024, 1, 1, 10, 5, 0)));

        let with_seconds = Window::new(at(2024, 1, 1, 10, 5, 1), None).unwrap();
        assert_eq!(with_seconds.first_eligible_minute(), Some(at(2024, 1, 1, 10, 6, 0)));

        let sub_second = at(2024, 1, 1, 10, 5, 0).with_nanosecond(1).unwrap();
        let with_nanos = Window::new(sub_second, None).unwrap();
        assert_eq!(with_nanos.first_eligible_minute(), Some(at(2024, 1, 1, 10, 6, 0)));
    }

    #[test]
    fn test_start_on_matching_minute_is_emitted() {
        let mut it = engine("30 10 * * * *", at(2024, 1, 1, 10, 30, 0), None);
        assert_eq!(it.next(), Some(at(2024, 1, 1, 10, 30, 0)));
        assert_eq!(it.next(), Some(at(2024, 1, 2, 10, 30, 0)));
    }

    #[test]
    fn test_start_inside_matching_minute_is_excluded() {
        let mut it = engine("30 10 * * * *", at(2024, 1, 1, 10, 30, 15), None);
        assert_eq!(it.next(), Some(at(2024, 1, 2, 10, 30, 0)));
    }

    #[test]
    fn test_every_minute() {
        let occurrences: Vec<_> = engine("* * * * * *", at(2023, 1, 1, 0, 0, 29), None)
            .take(3)
            .collect();
        assert_eq!(
            occurrences,
            vec![
                at(2023, 1, 1, 0, 1, 0),
                at(2023, 1, 1, 0, 2, 0),
                at(2023, 1, 1, 0, 3, 0)
            ]
        );
    }

    #[test]
    fn test_end_is_inclusive() {
        let start = at(2024, 1, 1, 0, 0, 0);
        let end = at(2024, 1, 1, 23, 59, 30);
        let count = engine("* * * * * *", start, Some(end)).count();
        assert_eq!(count, 24 * 60);

        let last = engine("0 12 * * * *", start, Some(at(2024, 1, 3, 12, 0, 0))).last();
        assert_eq!(last, Some(at(2024, 1, 3, 12, 0, 0)));
    }

    #[test]
    fn test_end_stops_sequence() {
        let mut it = engine(
            "0 12 * * * *",
            at(2024, 1, 1, 0, 0, 0),
            Some(at(2024, 1, 2, 11, 59, 0)),
        );
        assert_eq!(it.next(), Some(at(2024, 1, 1, 12, 0, 0)));
        assert_eq!(it.next(), None);
        assert_eq!(it.cursor(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_start_equal_to_end() {
        let time = at(2024, 5, 5, 5, 5, 0);
        let occurrences: Vec<_> = engine("5 5 * * * *", time, Some(time)).collect();
        assert_eq!(occurrences, vec![time]);
    }

    #[test]
    fn test_wrap_month_and_year() {
        let mut it = engine("0 15 * * * *", at(2023, 12, 31, 16, 0, 0), None);
        assert_eq!(it.next(), Some(at(2024, 1, 1, 15, 0, 0)));
    }

    #[test]
    fn test_time_overflow() {
        let mut it = engine("59 23 31 12 * *", at(2023, 12, 31, 23, 59, 59), None);
        assert_eq!(it.next(), Some(at(2024, 12, 31, 23, 59, 0)));
    }

    #[test]
    fn test_non_standard_intervals_with_offset() {
        let mut it = engine("7/29 2/13 * * * *", at(2023, 1, 1, 0, 0, 0), None);
        assert_eq!(it.next(), Some(at(2023, 1, 1, 2, 7, 0)));
        assert_eq!(it.next(), Some(at(2023, 1, 1, 2, 36, 0)));
        assert_eq!(it.next(), Some(at(2023, 1, 1, 15, 7, 0)));
    }

    #[test]
    fn test_weekday_pattern_correct_weekdays() {
        let days: Vec<(u32, u32)> = engine("0 0 * * FRI,SAT *", at(2022, 2, 17, 0, 0, 1), None)
            .take(6)
            .map(|t| (t.month(), t.day()))
            .collect();
        assert_eq!(days, vec![(2, 18), (2, 19), (2, 25), (2, 26), (3, 4), (3, 5)]);
    }

    #[test]
    fn test_weekday_combined_with_day_of_month() {
        let days: Vec<(u32, u32)> = engine("59 23 2 * SAT *", at(2022, 1, 31, 0, 0, 0), None)
            .take(6)
            .map(|t| (t.month(), t.day()))
            .collect();
        assert_eq!(days, vec![(2, 2), (2, 5), (2, 12), (2, 19), (2, 26), (3, 2)]);
    }

    #[test]
    fn test_day_of_month_or_day_of_week() {
        let start = at(2024, 2, 1, 0, 0, 0);
        let end = at(2024, 2, 29, 23, 59, 0);
        let occurrences: Vec<_> = engine("0 0 15 * MON *", start, Some(end)).collect();
        let days: Vec<u32> = occurrences.iter().map(|t| t.day()).collect();
        assert_eq!(days, vec![5, 12, 15, 19, 26]);
        assert!(occurrences
            .iter()
            .all(|t| t.day() == 15 || t.weekday() == Weekday::Mon));
    }

    #[test]
    fn test_large_time_jumps() {
        let mut it = engine("0 0 * * * *", at(2020, 1, 1, 0, 0, 30), None);
        assert_eq!(it.nth(365 * 5 + 1), Some(at(2025, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_leap_day_only() {
        let years: Vec<i32> = engine("0 0 29 FEB * *", at(2023, 1, 1, 0, 0, 0), None)
            .take(3)
            .map(|t| t.year())
            .collect();
        assert_eq!(years, vec![2024, 2028, 2032]);
    }

    #[test]
    fn test_impossible_date_terminates() {
        let mut it = engine("0 0 30 2 * *", at(2024, 1, 1, 0, 0, 0), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_occurrences_are_strictly_increasing_and_matching() {
        let bundle = compile("*/7 1-5,20 1,10-12 JAN,JUN-AUG WED,SUN *").unwrap();
        let window = Window::new(at(2024, 1, 1, 0, 0, 0), None).unwrap();
        let occurrences: Vec<_> = OccurrenceEngine::new(bundle.clone(), &window)
            .take(500)
            .collect();
        assert_eq!(occurrences.len(), 500);
        assert!(occurrences.windows(2).all(|w| w[0] < w[1]));
        assert!(occurrences
            .iter()
            .all(|t| bundle.matches(t) && t.second() == 0 && t.nanosecond() == 0));
    }

    #[test]
    fn test_matches_minute_by_minute_scan() {
        let bundle = compile("*/13 */5 1,31 * MON *").unwrap();
        let start = at(2024, 1, 1, 0, 0, 0);
        let end = at(2024, 4, 1, 0, 0, 0);
        let window = Window::new(start, Some(end)).unwrap();

        let mut expected = Vec::new();
        let mut time = start;
        while time <= end {
            if bundle.matches(&time) {
                expected.push(time);
            }
            time += Duration::minutes(1);
        }

        let actual: Vec<_> = OccurrenceEngine::new(bundle, &window).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_shared_bundle_independent_cursors() {
        let bundle = Arc::new(compile("0 * * * * *").unwrap());
        let window = Window::new(at(2024, 1, 1, 0, 0, 0), None).unwrap();
        let mut first = OccurrenceEngine::new(Arc::clone(&bundle), &window);
        let mut second = OccurrenceEngine::new(bundle, &window);
        first.next();
        first.next();
        assert_eq!(first.next(), Some(at(2024, 1, 1, 2, 0, 0)));
        assert_eq!(second.next(), Some(at(2024, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_skip_to_only_moves_forward() {
        let bundle = compile("0 12 * * * *").unwrap();
        let window = Window::new(at(2024, 6, 1, 0, 0, 0), None).unwrap();
        let mut engine = OccurrenceEngine::new(bundle, &window);

        engine.skip_to(at(2024, 5, 1, 0, 0, 0));
        assert_eq!(engine.cursor(), Some(at(2024, 6, 1, 0, 0, 0)));

        engine.skip_to(start_of_year(2124));
        assert_eq!(engine.next(), Some(at(2124, 1, 1, 12, 0, 0)));
    }

    #[test]
    fn test_skip_past_search_limit() {
        let bundle = compile("* * * * * *").unwrap();
        let window = Window::new(at(2024, 1, 1, 0, 0, 0), None).unwrap();
        let mut engine = OccurrenceEngine::new(bundle, &window);
        engine.skip_to(start_of_year(i32::MAX));
        assert_eq!(engine.next(), None);
    }
}
