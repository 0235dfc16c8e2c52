//! Compiler for six-field cron expressions.
//!
//! An expression is made of six whitespace separated tokens:
//!
//! ```text
//! ┌──────────────── minute (0 - 59)
//! │ ┌────────────── hour (0 - 23)
//! │ │ ┌──────────── day of month (1 - 31)
//! │ │ │ ┌────────── month (1 - 12, JAN-DEC)
//! │ │ │ │ ┌──────── day of week (1 - 7, MON-SUN)
//! │ │ │ │ │ ┌────── year (* or a literal year)
//! │ │ │ │ │ │
//! * * * * * *
//! ```
//!
//! ```rust
//! use tzcron::compile;
//!
//! let bundle = compile("*/15 9-17 * * MON-FRI *").unwrap();
//! assert_eq!(bundle.to_string(), "0,15,30,45 9,10,11,12,13,14,15,16,17 * * 1,2,3,4,5 *");
//! ```

use crate::bundle::FieldSetBundle;
use crate::errors::CronError;
use crate::field::{self, FieldConstraint, FieldSpec, HOUR, MINUTE, MONTH, MONTH_DAY, WEEK_DAY};
use crate::filter::YearFilter;

/// Compiles a cron expression into a [`FieldSetBundle`].
///
/// A field written as exactly `*` is kept unrestricted; every other field is parsed
/// with the grammar of [`field::parse`]. The year token is validated and kept verbatim.
///
/// # Errors
///
/// Returns [`CronError::InvalidExpression`] when the expression does not consist of
/// exactly six tokens, when any field fails to parse, or when the year token is
/// neither `*` nor a year literal.
pub fn compile(expression: &str) -> Result<FieldSetBundle, CronError> {
    let tokens: Vec<&str> = expression.split_whitespace().collect();
    let &[minute, hour, month_day, month, week_day, year] = tokens.as_slice() else {
        return Err(CronError::invalid(format!(
            "expected six fields (minute hour month-day month week-day year), found {}",
            tokens.len()
        )));
    };

    YearFilter::from_token(year)?;

    let bundle = FieldSetBundle {
        minutes: compile_field(minute, &MINUTE)?,
        hours: compile_field(hour, &HOUR)?,
        month_days: compile_field(month_day, &MONTH_DAY)?,
        months: compile_field(month, &MONTH)?,
        week_days: compile_field(week_day, &WEEK_DAY)?,
        year: year.to_string(),
    };

    tracing::trace!(expression, compiled = %bundle, "compiled cron expression");
    Ok(bundle)
}

fn compile_field(token: &str, spec: &FieldSpec) -> Result<FieldConstraint, CronError> {
    if token == "*" {
        Ok(FieldConstraint::Any)
    } else {
        field::parse(token, spec).map(FieldConstraint::Only)
    }
}
