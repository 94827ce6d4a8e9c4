use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolves a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (clocks falling back) resolve to the earlier instant. Times
/// inside a gap (clocks springing forward) resolve to the first valid instant
/// after the gap.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => (1..=24 * 60).find_map(|minutes| {
            tz.from_local_datetime(&(local + Duration::minutes(minutes)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }),
    }
}

pub fn resolve_on(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    resolve_local(tz, date.and_time(time))
}

/// The instants bounding the local calendar day `date` in `tz`, as `[start, end)`.
pub fn local_day(tz: Tz, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = resolve_on(tz, date, NaiveTime::MIN)?;
    let end = resolve_on(tz, date.succ_opt()?, NaiveTime::MIN)?;
    Some((start, end))
}

pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}
