use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use strum::EnumIs;

use crate::errors::CronError;

/// Verdict of a [`Filter`] on a candidate occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum FilterDecision {
    /// Let the occurrence through to the next filter.
    Accept,
    /// Discard this occurrence and continue with the next candidate.
    Reject,
    /// End the sequence; neither this nor any later occurrence is produced.
    Terminate,
}

/// A predicate stage applied to every candidate occurrence before it is emitted.
///
/// Any `Fn(&NaiveDateTime) -> FilterDecision` closure is a filter:
///
/// ```rust
/// use chrono::{Datelike, NaiveDateTime, Weekday};
/// use tzcron::{FilterChain, FilterDecision};
///
/// let mut chain = FilterChain::new();
/// chain.push(|occurrence: &NaiveDateTime| {
///     if occurrence.weekday() == Weekday::Sat {
///         FilterDecision::Reject
///     } else {
///         FilterDecision::Accept
///     }
/// });
/// assert_eq!(chain.len(), 1);
/// ```
pub trait Filter: Send + Sync {
    fn apply(&self, occurrence: &NaiveDateTime) -> FilterDecision;
}

impl<F> Filter for F
where
    F: Fn(&NaiveDateTime) -> FilterDecision + Send + Sync,
{
    fn apply(&self, occurrence: &NaiveDateTime) -> FilterDecision {
        self(occurrence)
    }
}

/// Built-in filter enforcing the trailing year token of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearFilter {
    target: Option<i32>,
}

impl YearFilter {
    /// Builds the filter from a year token, `*` or a literal year.
    ///
    /// # Errors
    ///
    /// Returns [`CronError::InvalidExpression`] for any other token.
    pub fn from_token(token: &str) -> Result<Self, CronError> {
        if token == "*" {
            return Ok(Self { target: None });
        }
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CronError::invalid(format!(
                "year: '{token}' must be '*' or a year"
            )));
        }
        let year = token
            .parse::<i32>()
            .map_err(|_| CronError::invalid(format!("year: '{token}' is out of range")))?;
        Ok(Self { target: Some(year) })
    }

    /// The year occurrences are limited to, `None` for `*`.
    pub fn target(&self) -> Option<i32> {
        self.target
    }
}

impl Filter for YearFilter {
    // The sequence only moves forward in time, so once the target year is behind us
    // no later occurrence can match.
    fn apply(&self, occurrence: &NaiveDateTime) -> FilterDecision {
        let Some(target) = self.target else {
            return FilterDecision::Accept;
        };
        match occurrence.year().cmp(&target) {
            std::cmp::Ordering::Less => FilterDecision::Reject,
            std::cmp::Ordering::Equal => FilterDecision::Accept,
            std::cmp::Ordering::Greater => {
                tracing::debug!(
                    year = target,
                    %occurrence,
                    "target year passed, terminating sequence"
                );
                FilterDecision::Terminate
            }
        }
    }
}

/// Ordered list of filters; the first non-accepting verdict wins.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, filter: F)
    where
        F: Filter + 'static,
    {
        self.filters.push(Arc::new(filter));
    }

    pub fn push_shared(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs the occurrence through every filter in order.
    ///
    /// Returns the first [`FilterDecision::Reject`] or [`FilterDecision::Terminate`]
    /// encountered, or [`FilterDecision::Accept`] when every filter accepts.
    pub fn apply(&self, occurrence: &NaiveDateTime) -> FilterDecision {
        for filter in &self.filters {
            match filter.apply(occurrence) {
                FilterDecision::Accept => continue,
                decision => return decision,
            }
        }
        FilterDecision::Accept
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}
