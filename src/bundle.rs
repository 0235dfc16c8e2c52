use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::compiler::compile;
use crate::errors::CronError;
use crate::field::FieldConstraint;

// A compiled cron expression: one constraint per cron field plus the raw year token.
// It is immutable once compiled and can be shared by any number of engines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSetBundle {
    pub minutes: FieldConstraint,
    pub hours: FieldConstraint,
    pub month_days: FieldConstraint,
    pub months: FieldConstraint,
    pub week_days: FieldConstraint,
    /// Year token exactly as written, `*` or a literal year.
    pub year: String,
}

impl FieldSetBundle {
    /// Evaluates if a naive local timestamp matches the minute, hour, day and month
    /// constraints of this bundle.
    ///
    /// Seconds are ignored and the year token is not consulted; the year is enforced
    /// by the year filter of a [`Schedule`](crate::Schedule).
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use tzcron::compile;
    ///
    /// let bundle = compile("30 9 * * MON-FRI *").unwrap();
    /// let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(9, 30, 0).unwrap();
    /// let sunday = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap().and_hms_opt(9, 30, 0).unwrap();
    ///
    /// assert!(bundle.matches(&monday));
    /// assert!(!bundle.matches(&sunday));
    /// ```
    pub fn matches(&self, time: &NaiveDateTime) -> bool {
        self.month_match(time.month())
            && self.day_match(time.date())
            && self.hour_match(time.hour())
            && self.minute_match(time.minute())
    }

    pub fn minute_match(&self, minute: u32) -> bool {
        self.minutes.allows(minute)
    }

    pub fn hour_match(&self, hour: u32) -> bool {
        self.hours.allows(hour)
    }

    pub fn month_match(&self, month: u32) -> bool {
        self.months.allows(month)
    }

    // Day of month and day of week are alternatives when both are restricted,
    // otherwise only the restricted one (if any) applies.
    pub fn day_match(&self, date: NaiveDate) -> bool {
        let dom = &self.month_days;
        let dow = &self.week_days;
        let dom_hit = || dom.allows(date.day());
        let dow_hit = || dow.allows(date.weekday().number_from_monday());

        match (dom.is_any(), dow.is_any()) {
            (true, true) => true,
            (false, true) => dom_hit(),
            (true, false) => dow_hit(),
            (false, false) => dom_hit() || dow_hit(),
        }
    }
}

// Canonical re-description: every restricted field as an explicit value list.
impl fmt::Display for FieldSetBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.minutes, self.hours, self.month_days, self.months, self.week_days, self.year
        )
    }
}

impl FromStr for FieldSetBundle {
    type Err = CronError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        compile(expression)
    }
}

#[cfg(feature = "serde")]
mod serialization {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::FieldSetBundle;

    impl Serialize for FieldSetBundle {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }

    struct BundleVisitor;

    impl Visitor<'_> for BundleVisitor {
        type Value = FieldSetBundle;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a six-field cron expression")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            value.parse().map_err(de::Error::custom)
        }
    }

    impl<'de> Deserialize<'de> for FieldSetBundle {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_str(BundleVisitor)
        }
    }

}
