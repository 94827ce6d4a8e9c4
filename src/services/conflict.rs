use chrono::{Datelike, DateTime, Duration, Utc};

use crate::db::{AvailabilityStore, BookingStore};
use crate::errors::AppError;
use crate::models::availability::to_human_readable;
use crate::models::Professional;
use crate::services::local_time::{local_date, resolve_on};
use crate::services::time_window::{contains, overlaps};

/// Whether `[start, start + duration)` overlaps an active booking of the
/// professional other than `exclude_booking_id`.
///
/// Read-only form of the overlap check, for callers that want an answer
/// without writing. The booking flows never call it: the store's
/// `insert_booking_if_no_conflict` / `reschedule_if_no_conflict` run the same
/// half-open predicate inside the write, and a separate read beforehand could
/// already be stale.
pub fn has_conflict<S: BookingStore + ?Sized>(
    store: &S,
    professional_id: &str,
    start: DateTime<Utc>,
    duration_minutes: u32,
    exclude_booking_id: Option<&str>,
) -> Result<bool, AppError> {
    let end = start + Duration::minutes(duration_minutes as i64);
    let bookings = store.active_bookings(professional_id, start, end)?;

    Ok(bookings
        .iter()
        .filter(|b| Some(b.id.as_str()) != exclude_booking_id)
        .any(|b| overlaps(b.scheduled_at, b.ends_at(), start, end)))
}

/// Rejects a start/duration that does not fit entirely inside one of the
/// professional's active windows for that local day.
pub fn validate_within_availability<S: AvailabilityStore + ?Sized>(
    store: &S,
    professional: &Professional,
    start: DateTime<Utc>,
    duration_minutes: u32,
) -> Result<(), AppError> {
    let end = start + Duration::minutes(duration_minutes as i64);
    let tz = professional.timezone;
    let date = local_date(tz, start);
    let windows = store.active_windows(&professional.id, date.weekday())?;

    let fits = windows.iter().any(|w| {
        match (resolve_on(tz, date, w.start_time), resolve_on(tz, date, w.end_time)) {
            (Some(window_start), Some(window_end)) => {
                contains(window_start, window_end, start, end)
            }
            _ => false,
        }
    });

    if fits {
        return Ok(());
    }

    let hours = if windows.is_empty() {
        format!("no hours on {}", date.format("%A"))
    } else {
        to_human_readable(&windows)
    };
    tracing::debug!(professional_id = %professional.id, %start, "requested time outside availability");
    Err(AppError::OutsideAvailability { hours })
}
