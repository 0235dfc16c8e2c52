//! Field grammar shared by every cron field.
//!
//! A field is a comma separated list of items, where each item is `*`, a literal `N`,
//! an inclusive range `N-M`, or any of those followed by a step `/S`. Symbolic names
//! such as `JAN` or `MON` are replaced by their numeric value before the grammar is
//! applied, but only when they make up a whole token.
//!
//! ```rust
//! use tzcron::field::{parse, MONTH};
//!
//! let months = parse("JAN,MAR-MAY/2", &MONTH).unwrap();
//! assert_eq!(months.as_slice(), &[1, 3, 5]);
//! ```

use std::fmt;

use strum::{Display, EnumIs};

use crate::errors::CronError;

/// The five cron fields that resolve to value sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FieldKind {
    Minute,
    Hour,
    MonthDay,
    Month,
    WeekDay,
}

impl FieldKind {
    /// The static spec describing the valid range and symbolic names of this field.
    pub fn spec(self) -> &'static FieldSpec {
        match self {
            FieldKind::Minute => &MINUTE,
            FieldKind::Hour => &HOUR,
            FieldKind::MonthDay => &MONTH_DAY,
            FieldKind::Month => &MONTH,
            FieldKind::WeekDay => &WEEK_DAY,
        }
    }
}

/// Valid range and symbolic replacements for one field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub min: u32,
    pub max: u32,
    /// Uppercase token to numeric value.
    pub replacements: &'static [(&'static str, u32)],
}

impl FieldSpec {
    /// Looks up a whole uppercase token in the replacement table.
    pub fn replacement(&self, token: &str) -> Option<u32> {
        self.replacements
            .iter()
            .find(|(name, _)| *name == token)
            .map(|&(_, value)| value)
    }

    fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

pub static MINUTE: FieldSpec = FieldSpec {
    kind: FieldKind::Minute,
    min: 0,
    max: 59,
    replacements: &[],
};

pub static HOUR: FieldSpec = FieldSpec {
    kind: FieldKind::Hour,
    min: 0,
    max: 23,
    replacements: &[],
};

pub static MONTH_DAY: FieldSpec = FieldSpec {
    kind: FieldKind::MonthDay,
    min: 1,
    max: 31,
    replacements: &[],
};

pub static MONTH: FieldSpec = FieldSpec {
    kind: FieldKind::Month,
    min: 1,
    max: 12,
    replacements: &[
        ("JAN", 1),
        ("FEB", 2),
        ("MAR", 3),
        ("APR", 4),
        ("MAY", 5),
        ("JUN", 6),
        ("JUL", 7),
        ("AUG", 8),
        ("SEP", 9),
        ("OCT", 10),
        ("NOV", 11),
        ("DEC", 12),
    ],
};

// Monday is 1 and Sunday is 7, matching chrono's `number_from_monday`.
pub static WEEK_DAY: FieldSpec = FieldSpec {
    kind: FieldKind::WeekDay,
    min: 1,
    max: 7,
    replacements: &[
        ("MON", 1),
        ("TUE", 2),
        ("WED", 3),
        ("THU", 4),
        ("FRI", 5),
        ("SAT", 6),
        ("SUN", 7),
    ],
};

/// Sorted, duplicate free and never empty set of values for one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldValueSet {
    values: Vec<u32>,
}

impl FieldValueSet {
    pub fn contains(&self, value: u32) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Smallest member that is greater than or equal to `value`.
    pub fn next_from(&self, value: u32) -> Option<u32> {
        let idx = self.values.partition_point(|&v| v < value);
        self.values.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    // Always false, an empty set is rejected by `parse`.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for FieldValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// A compiled field: unrestricted (`*`) or limited to a value set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum FieldConstraint {
    Any,
    Only(FieldValueSet),
}

impl FieldConstraint {
    pub fn allows(&self, value: u32) -> bool {
        match self {
            FieldConstraint::Any => true,
            FieldConstraint::Only(set) => set.contains(value),
        }
    }

    /// Next allowed value at or after `value`, if any.
    pub fn next_from(&self, value: u32) -> Option<u32> {
        match self {
            FieldConstraint::Any => Some(value),
            FieldConstraint::Only(set) => set.next_from(value),
        }
    }
}

impl fmt::Display for FieldConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldConstraint::Any => f.write_str("*"),
            FieldConstraint::Only(set) => fmt::Display::fmt(set, f),
        }
    }
}

/// Parses one field expression against `spec`.
///
/// Items are uppercased, symbolic names are substituted token by token, and the
/// expanded values of every item are merged into one ascending set.
///
/// # Errors
///
/// Returns [`CronError::InvalidExpression`] for malformed items, inverted ranges,
/// steps that are not positive integers, values outside `[spec.min, spec.max]` and
/// expressions that resolve to no values at all.
pub fn parse(expression: &str, spec: &FieldSpec) -> Result<FieldValueSet, CronError> {
    let mut values = Vec::new();

    for item in expression.split(',') {
        let item = item.trim();
        if !item.is_empty() {
            expand_item(&item.to_uppercase(), spec, &mut values)?;
        }
    }

    values.sort_unstable();
    values.dedup();

    if values.is_empty() {
        return Err(CronError::invalid(format!(
            "{}: '{}' does not resolve to any value",
            spec.kind, expression
        )));
    }

    Ok(FieldValueSet { values })
}

fn expand_item(item: &str, spec: &FieldSpec, out: &mut Vec<u32>) -> Result<(), CronError> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(parse_step(step, spec)?)),
        None => (item, None),
    };

    let (start, end) = if base == "*" {
        (spec.min, spec.max)
    } else if let Some((low, high)) = base.split_once('-') {
        let low = resolve_token(low, spec)?;
        let high = resolve_token(high, spec)?;
        if low > high {
            return Err(CronError::invalid(format!(
                "{}: range {}-{} is inverted",
                spec.kind, low, high
            )));
        }
        (low, high)
    } else {
        let value = resolve_token(base, spec)?;
        // A stepped literal runs from the literal up to the end of the valid range.
        (value, if step.is_some() { spec.max } else { value })
    };

    for bound in [start, end] {
        if !spec.contains(bound) {
            return Err(CronError::invalid(format!(
                "{}: {} is out of bounds ({}-{})",
                spec.kind, bound, spec.min, spec.max
            )));
        }
    }

    out.extend((start..=end).step_by(step.unwrap_or(1)));
    Ok(())
}

fn parse_step(step: &str, spec: &FieldSpec) -> Result<usize, CronError> {
    let step = parse_number(step).ok_or_else(|| {
        CronError::invalid(format!("{}: invalid step '{}'", spec.kind, step))
    })?;
    if step == 0 {
        return Err(CronError::invalid(format!(
            "{}: step must be greater than zero",
            spec.kind
        )));
    }
    Ok(step as usize)
}

// Whole-token substitution: the token either is a symbolic name or must be a number.
fn resolve_token(token: &str, spec: &FieldSpec) -> Result<u32, CronError> {
    if let Some(value) = spec.replacement(token) {
        return Ok(value);
    }
    parse_number(token)
        .ok_or_else(|| CronError::invalid(format!("{}: '{}' is not a number", spec.kind, token)))
}

fn parse_number(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    static ZERO_TO_TEN: FieldSpec = FieldSpec {
        kind: FieldKind::Minute,
        min: 0,
        max: 10,
        replacements: &[],
    };

    static WITH_X: FieldSpec = FieldSpec {
        kind: FieldKind::Minute,
        min: 0,
        max: 40,
        replacements: &[("X", 3)],
    };

    #[rstest]
    #[case("1,3-6,8", &[1, 3, 4, 5, 6, 8])]
    #[case("1-3,0-10/2", &[0, 1, 2, 3, 4, 6, 8, 10])]
    #[case("*", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10])]
    #[case("*/5", &[0, 5, 10])]
    #[case("2/3", &[2, 5, 8])]
    #[case("3-9/4", &[3, 7])]
    #[case("5,5,5", &[5])]
    #[case("10,0", &[0, 10])]
    #[case("1,,2", &[1, 2])]
    #[case("07", &[7])]
    fn test_parse_valid(#[case] expression: &str, #[case] expected: &[u32]) {
        let set = parse(expression, &ZERO_TO_TEN).unwrap();
        assert_eq!(set.as_slice(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(",")]
    #[case("11")]
    #[case("6-3")]
    #[case("*/0")]
    #[case("*/-1")]
    #[case("1-")]
    #[case("-1")]
    #[case("1-2-3")]
    #[case("*/")]
    #[case("1/2/3")]
    #[case("abc")]
    #[case("+5")]
    #[case("0-11")]
    #[case("11/2")]
    #[case("99999999999")]
    fn test_parse_invalid(#[case] expression: &str) {
        assert!(matches!(
            parse(expression, &ZERO_TO_TEN),
            Err(CronError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_parse_month_names() {
        assert_eq!(parse("JAN,MAR", &MONTH).unwrap().as_slice(), &[1, 3]);
        assert_eq!(parse("feb-apr", &MONTH).unwrap().as_slice(), &[2, 3, 4]);
        assert_eq!(parse("Oct,12", &MONTH).unwrap().as_slice(), &[10, 12]);
    }

    #[test]
    fn test_parse_week_day_names() {
        assert_eq!(parse("MON-FRI", &WEEK_DAY).unwrap().as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(parse("sat,sun", &WEEK_DAY).unwrap().as_slice(), &[6, 7]);
        assert_eq!(parse("1-FRI/2", &WEEK_DAY).unwrap().as_slice(), &[1, 3, 5]);
    }

    #[test]
    fn test_replacement_is_whole_token() {
        assert_eq!(parse("X", &WITH_X).unwrap().as_slice(), &[3]);
        assert_eq!(parse("X-5", &WITH_X).unwrap().as_slice(), &[3, 4, 5]);
        // Neither a doubled name nor a name glued to digits is rewritten.
        assert!(parse("XX", &WITH_X).is_err());
        assert!(parse("1X", &WITH_X).is_err());
        assert!(parse("JANUARY", &MONTH).is_err());
        assert!(parse("0", &WEEK_DAY).is_err());
    }

    #[test]
    fn test_parse_is_sorted_unique_and_bounded() {
        for spec in [&MINUTE, &HOUR, &MONTH_DAY, &MONTH, &WEEK_DAY] {
            let expression = format!("{max},{min}-{max}/3,{min},*/7", min = spec.min, max = spec.max);
            let set = parse(&expression, spec).unwrap();
            assert!(set.as_slice().windows(2).all(|w| w[0] < w[1]));
            assert!(set.iter().all(|v| v >= spec.min && v <= spec.max));
        }
    }

    #[test]
    fn test_error_names_the_field() {
        let err = parse("60", &MINUTE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid expression: minute: 60 is out of bounds (0-59)"
        );
        let err = parse("0", &MONTH_DAY).unwrap_err();
        assert!(err.to_string().contains("month-day"));
    }

    #[test]
    fn test_value_set_next_from() {
        let set = parse("5,20,40", &MINUTE).unwrap();
        assert_eq!(set.next_from(0), Some(5));
        assert_eq!(set.next_from(5), Some(5));
        assert_eq!(set.next_from(21), Some(40));
        assert_eq!(set.next_from(41), None);
    }

    #[test]
    fn test_constraint_any() {
        let any = FieldConstraint::Any;
        assert!(any.is_any());
        assert!(any.allows(17));
        assert_eq!(any.next_from(17), Some(17));
        assert_eq!(any.to_string(), "*");
    }

    #[test]
    fn test_value_set_display() {
        let set = parse("*/15", &MINUTE).unwrap();
        assert_eq!(set.to_string(), "0,15,30,45");
        assert_eq!(FieldConstraint::Only(set).to_string(), "0,15,30,45");
    }

    #[test]
    fn test_kind_spec_lookup() {
        assert_eq!(FieldKind::Hour.spec().max, 23);
        assert_eq!(FieldKind::WeekDay.spec().replacement("SUN"), Some(7));
        assert_eq!(FieldKind::Month.spec().replacement("JANUARY"), None);
    }
}
