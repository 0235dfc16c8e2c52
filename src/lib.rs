//! # tzcron
//!
//! tzcron computes the concrete minutes matching a cron expression, bound to a timezone
//! and an optional start and end.
//!
//! ## Features
//! - Parses six-field expressions (`minute hour month-day month week-day year`) with lists,
//!   ranges, steps and `JAN`-`DEC` / `MON`-`SUN` names.
//! - Produces occurrences lazily, one whole minute at a time, in ascending order.
//! - Looks up the UTC offset of every occurrence separately, so sequences crossing a DST
//!   transition carry the right offset on each side.
//! - Accepts caller supplied filters that can skip occurrences or end the sequence.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tzcron::Schedule;
//!
//! // 09:30 on weekdays in Stockholm, during 2025 only
//! let schedule = Schedule::builder()
//!     .expression("30 9 * * MON-FRI 2025")
//!     .timezone("Europe/Stockholm")
//!     .start(Utc.with_ymd_and_hms(2025, 3, 28, 12, 0, 0).unwrap())
//!     .build()
//!     .expect("valid schedule");
//!
//! let next: Vec<String> = schedule
//!     .take(3)
//!     .map(|occurrence| occurrence.unwrap().to_rfc3339())
//!     .collect();
//!
//! // The offset changes with the switch to summer time on March 30th
//! assert_eq!(
//!     next,
//!     [
//!         "2025-03-31T09:30:00+02:00",
//!         "2025-04-01T09:30:00+02:00",
//!         "2025-04-02T09:30:00+02:00",
//!     ]
//! );
//! ```
//!
//! ## Expression
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
//! | Field        | Allowed values  | Allowed special characters |
//! | ------------ | --------------- | -------------------------- |
//! | Minute       | 0-59            | * , - /                    |
//! | Hour         | 0-23            | * , - /                    |
//! | Day of Month | 1-31            | * , - /                    |
//! | Month        | 1-12 or JAN-DEC | * , - /                    |
//! | Day of Week  | 1-7 or MON-SUN  | * , - /                    |
//! | Year         | * or a year     |                            |
//!
//! When both day of month and day of week are restricted, a day matching either of
//! them qualifies.

mod bundle;
mod compiler;
mod engine;
mod errors;
pub mod field;
mod filter;
mod timezone;

pub use bundle::FieldSetBundle;
pub use compiler::compile;
pub use engine::{OccurrenceEngine, Window, YEAR_UPPER_LIMIT};
pub use errors::CronError;
pub use filter::{Filter, FilterChain, FilterDecision, YearFilter};
pub use timezone::{bind, bind_existing, to_local, TimezoneResolver, TzDatabase};

use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use derive_builder::Builder;

/// Zone used when neither a timezone nor a start or end is given.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Everything needed to construct a [`Schedule`].
///
/// Built through [`Schedule::builder`].
#[derive(Clone, Builder)]
#[builder(name = "ScheduleBuilder", pattern = "owned", build_fn(skip))]
pub struct ScheduleOptions {
    /// Six-field cron expression.
    #[builder(setter(into))]
    expression: String,
    /// IANA zone identifier (or any identifier the resolver understands).
    #[builder(setter(into, strip_option))]
    timezone: Option<String>,
    /// First instant of the window, defaults to now.
    #[builder(setter(into, strip_option))]
    start: Option<DateTime<Utc>>,
    /// Last instant of the window, inclusive.
    #[builder(setter(into, strip_option))]
    end: Option<DateTime<Utc>>,
    /// Filters applied before the year filter.
    #[builder(setter(custom))]
    filters: Vec<Arc<dyn Filter>>,
    /// Timezone collaborator, defaults to [`TzDatabase`].
    #[builder(setter(custom))]
    resolver: Arc<dyn TimezoneResolver>,
}

impl ScheduleBuilder {
    /// Appends a filter; may be called repeatedly.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Filter + 'static,
    {
        self.filters
            .get_or_insert_with(Vec::new)
            .push(Arc::new(filter));
        self
    }

    pub fn resolver<R>(mut self, resolver: R) -> Self
    where
        R: TimezoneResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Compiles the expression and resolves the window.
    ///
    /// # Errors
    ///
    /// See [`Schedule::try_from`].
    pub fn build(self) -> Result<Schedule, CronError> {
        let ScheduleBuilder {
            expression,
            timezone,
            start,
            end,
            filters,
            resolver,
        } = self;
        Schedule::try_from(ScheduleOptions {
            expression: expression.unwrap_or_default(),
            timezone: timezone.flatten(),
            start: start.flatten(),
            end: end.flatten(),
            filters: filters.unwrap_or_default(),
            resolver: resolver.unwrap_or_else(|| Arc::new(TzDatabase)),
        })
    }
}

/// A compiled expression bound to a timezone and a window.
///
/// A `Schedule` is the lazy sequence of its occurrences: it implements [`Iterator`]
/// yielding `Result<DateTime<FixedOffset>, CronError>`, advancing only when asked.
/// Its cursor is single-pass; construct another `Schedule` for independent progress.
pub struct Schedule {
    expression: String,
    timezone: String,
    window: Window,
    bundle: Arc<FieldSetBundle>,
    filters: FilterChain,
    resolver: Arc<dyn TimezoneResolver>,
    engine: OccurrenceEngine,
    // Accepted occurrence whose offset lookup failed, retried on the next call.
    pending: Option<NaiveDateTime>,
    finished: bool,
}

impl Schedule {
    /// Creates a schedule in `timezone` starting now, without an end.
    ///
    /// ```
    /// use tzcron::Schedule;
    ///
    /// let mut schedule = Schedule::new("0 12 * * * *", "Asia/Tokyo").unwrap();
    /// let noon = schedule.next().unwrap().unwrap();
    /// assert_eq!(noon.offset().local_minus_utc(), 9 * 3600);
    /// ```
    pub fn new(expression: &str, timezone: &str) -> Result<Self, CronError> {
        Self::builder()
            .expression(expression)
            .timezone(timezone)
            .build()
    }

    /// Construct a builder for a schedule with a window, filters or a custom resolver.
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::default()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// The naive local window, in the schedule's timezone.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn bundle(&self) -> &FieldSetBundle {
        &self.bundle
    }

    /// `true` once the sequence has ended, by reaching the window end, a terminating
    /// filter or the search limit.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Replaces the timezone collaborator. An occurrence whose lookup failed is
    /// retried with the new resolver on the next call to `next`.
    pub fn set_resolver<R>(&mut self, resolver: R)
    where
        R: TimezoneResolver + 'static,
    {
        self.resolver = Arc::new(resolver);
    }

    /// Drops the occurrence whose offset lookup failed, if any, and returns it.
    pub fn skip_pending(&mut self) -> Option<NaiveDateTime> {
        self.pending.take()
    }

    fn next_candidate(&mut self) -> Option<NaiveDateTime> {
        loop {
            let candidate = self.engine.next()?;
            match self.filters.apply(&candidate) {
                FilterDecision::Accept => return Some(candidate),
                FilterDecision::Reject => continue,
                FilterDecision::Terminate => return None,
            }
        }
    }
}

impl TryFrom<ScheduleOptions> for Schedule {
    type Error = CronError;

    /// # Errors
    ///
    /// - [`CronError::InvalidExpression`] if the expression does not compile.
    /// - [`CronError::MissingTimezone`] if a start or end is given without a timezone,
    ///   or with one the resolver does not know.
    /// - [`CronError::TimezoneResolution`] if the current time cannot be placed in the
    ///   timezone when no start is given.
    /// - [`CronError::InvalidWindow`] if the end precedes the start.
    fn try_from(options: ScheduleOptions) -> Result<Self, Self::Error> {
        let ScheduleOptions {
            expression,
            timezone,
            start,
            end,
            filters,
            resolver,
        } = options;

        let bundle = Arc::new(compile(&expression)?);
        let year_filter = YearFilter::from_token(&bundle.year)?;

        let timezone = match timezone {
            Some(timezone) => timezone,
            None if start.is_some() || end.is_some() => {
                return Err(CronError::MissingTimezone(
                    "no timezone was given".to_string(),
                ))
            }
            None => DEFAULT_TIMEZONE.to_string(),
        };

        let localize = |instant: &DateTime<Utc>| {
            to_local(instant, &timezone, resolver.as_ref()).map_err(|err| match err {
                CronError::UnknownTimezone(zone) => {
                    CronError::MissingTimezone(format!("timezone '{zone}' is unknown"))
                }
                other => other,
            })
        };

        let start = match start {
            Some(start) => localize(&start)?,
            None => to_local(&Utc::now(), &timezone, resolver.as_ref())
                .map_err(|err| timezone::resolution_error(&timezone, err))?,
        };
        let end = end.as_ref().map(localize).transpose()?;
        let window = Window::new(start, end)?;

        let mut chain = FilterChain::new();
        for filter in filters {
            chain.push_shared(filter);
        }
        chain.push(year_filter);

        tracing::debug!(
            expression = %expression,
            timezone = %timezone,
            start = %window.start(),
            end = ?window.end(),
            filters = chain.len(),
            "schedule constructed"
        );

        // Every candidate before the target year would be rejected by the year filter.
        let mut engine = OccurrenceEngine::new(Arc::clone(&bundle), &window);
        if let Some(year) = year_filter.target() {
            engine.skip_to(crate::engine::start_of_year(year));
        }

        Ok(Schedule {
            engine,
            expression,
            timezone,
            window,
            bundle,
            filters: chain,
            resolver,
            pending: None,
            finished: false,
        })
    }
}

impl Iterator for Schedule {
    type Item = Result<DateTime<FixedOffset>, CronError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let occurrence = match self.pending {
                Some(occurrence) => occurrence,
                None => match self.next_candidate() {
                    Some(occurrence) => {
                        self.pending = Some(occurrence);
                        occurrence
                    }
                    None => {
                        tracing::debug!(expression = %self.expression, "schedule exhausted");
                        self.finished = true;
                        return None;
                    }
                },
            };

            match bind_existing(occurrence, &self.timezone, self.resolver.as_ref()) {
                Ok(Some(zoned)) => {
                    self.pending = None;
                    tracing::trace!(%zoned, "occurrence");
                    return Some(Ok(zoned));
                }
                Ok(None) => {
                    self.pending = None;
                    tracing::debug!(
                        %occurrence,
                        timezone = %self.timezone,
                        "skipping wall-clock time missing from timezone"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        %occurrence,
                        timezone = %self.timezone,
                        error = %err,
                        "could not bind occurrence to timezone"
                    );
                    return Some(Err(err));
                }
            }
        }
    }
}

impl FusedIterator for Schedule {}

// Creates a UTC schedule starting now.
impl FromStr for Schedule {
    type Err = CronError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        Self::builder().expression(expression).build()
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("expression", &self.expression)
            .field("timezone", &self.timezone)
            .field("window", &self.window)
            .field("filters", &self.filters)
            .field("cursor", &self.engine.cursor())
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .finish()
    }
}
