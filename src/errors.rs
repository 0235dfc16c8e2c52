use chrono::NaiveDateTime;
use thiserror::Error;

/// Represents errors that can occur while compiling cron expressions and producing occurrences.
///
/// `CronError` is used throughout the `tzcron` crate and is exported for consuming programs
/// to match on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// The expression, one of its fields, or its year token is malformed.
    ///
    /// This covers a wrong token count, unparseable field grammar, out-of-range literals,
    /// empty value sets, non-positive steps and inverted ranges. The message names the
    /// offending part, such as "minute: 60 is out of bounds (0-59)".
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// A start or end instant was supplied without a timezone that could be resolved.
    #[error("A resolvable timezone is required when a start or end is supplied: {0}")]
    MissingTimezone(String),

    /// The timezone collaborator could not produce a UTC offset for a zone and instant.
    #[error("Could not resolve timezone '{zone}': {reason}")]
    TimezoneResolution { zone: String, reason: String },

    /// The timezone identifier is not known to the resolver.
    ///
    /// Resolvers report this so callers can tell an unknown zone apart from an instant
    /// that has no offset.
    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// The end of the window precedes its start.
    #[error("Window end {end} precedes window start {start}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl CronError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CronError::InvalidExpression(msg.into())
    }
}
