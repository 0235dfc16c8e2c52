use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::CronError;

/// Maps a zone identifier and an instant to the UTC offset in effect.
///
/// Implementations report unknown identifiers as [`CronError::UnknownTimezone`] and any
/// other failure as [`CronError::TimezoneResolution`].
pub trait TimezoneResolver: Send + Sync {
    /// Offset for a wall-clock time in `zone`.
    fn offset_from_local(&self, zone: &str, local: &NaiveDateTime)
        -> Result<FixedOffset, CronError>;

    /// Offset for a UTC instant in `zone`.
    fn offset_from_utc(&self, zone: &str, utc: &NaiveDateTime) -> Result<FixedOffset, CronError>;
}

/// Resolver backed by the IANA database bundled with `chrono-tz`.
///
/// Wall-clock times repeated by a DST fold resolve to the earliest offset. Times
/// skipped by a DST gap resolve to the offset in effect before the gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TzDatabase;

impl TzDatabase {
    fn zone(name: &str) -> Result<Tz, CronError> {
        name.parse::<Tz>()
            .map_err(|_| CronError::UnknownTimezone(name.to_string()))
    }
}

impl TimezoneResolver for TzDatabase {
    fn offset_from_local(
        &self,
        zone: &str,
        local: &NaiveDateTime,
    ) -> Result<FixedOffset, CronError> {
        let tz = Self::zone(zone)?;
        match tz.offset_from_local_datetime(local) {
            LocalResult::Single(offset) => Ok(offset.fix()),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.fix()),
            LocalResult::None => local
                .checked_sub_signed(Duration::days(1))
                .and_then(|before| tz.offset_from_local_datetime(&before).earliest())
                .map(|offset| offset.fix())
                .ok_or_else(|| CronError::TimezoneResolution {
                    zone: zone.to_string(),
                    reason: format!("no offset for local time {local}"),
                }),
        }
    }

    fn offset_from_utc(&self, zone: &str, utc: &NaiveDateTime) -> Result<FixedOffset, CronError> {
        Ok(Self::zone(zone)?.offset_from_utc_datetime(utc).fix())
    }
}

/// Pairs a naive occurrence with the offset `resolver` reports for it in `zone`.
///
/// The offset is looked up for every call; occurrences on either side of a DST
/// transition get different offsets.
///
/// # Errors
///
/// Returns [`CronError::TimezoneResolution`] when the resolver fails for any reason,
/// including an unknown zone.
pub fn bind(
    occurrence: NaiveDateTime,
    zone: &str,
    resolver: &dyn TimezoneResolver,
) -> Result<DateTime<FixedOffset>, CronError> {
    let offset = resolver
        .offset_from_local(zone, &occurrence)
        .map_err(|err| resolution_error(zone, err))?;

    offset
        .from_local_datetime(&occurrence)
        .single()
        .ok_or_else(|| CronError::TimezoneResolution {
            zone: zone.to_string(),
            reason: format!("{occurrence} is not representable with offset {offset}"),
        })
}

/// Like [`bind`], but returns `None` when `occurrence` never appears on the wall clock
/// of `zone`, as for times skipped by a DST gap.
///
/// The bound instant is mapped back to local time; a mismatch means the resolver had to
/// borrow a neighbouring offset.
///
/// # Errors
///
/// Returns [`CronError::TimezoneResolution`] when either lookup fails.
pub fn bind_existing(
    occurrence: NaiveDateTime,
    zone: &str,
    resolver: &dyn TimezoneResolver,
) -> Result<Option<DateTime<FixedOffset>>, CronError> {
    let zoned = bind(occurrence, zone, resolver)?;
    let local = to_local(&zoned.with_timezone(&Utc), zone, resolver)
        .map_err(|err| resolution_error(zone, err))?;
    Ok((local == occurrence).then_some(zoned))
}

/// Wall-clock time in `zone` at the UTC instant `utc`.
pub fn to_local(
    utc: &DateTime<Utc>,
    zone: &str,
    resolver: &dyn TimezoneResolver,
) -> Result<NaiveDateTime, CronError> {
    let offset = resolver.offset_from_utc(zone, &utc.naive_utc())?;
    Ok(utc.with_timezone(&offset).naive_local())
}

pub(crate) fn resolution_error(zone: &str, err: CronError) -> CronError {
    match err {
        CronError::TimezoneResolution { .. } => err,
        other => CronError::TimezoneResolution {
            zone: zone.to_string(),
            reason: other.to_string(),
        },
    }
}
