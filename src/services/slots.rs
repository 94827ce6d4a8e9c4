use chrono::{Datelike, DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{AvailabilityStore, BookingStore, CatalogStore};
use crate::errors::AppError;
use crate::models::{Booking, Lifecycle};
use crate::services::local_time::{local_day, resolve_on};
use crate::services::time_window::{overlaps, step_slots};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub professional_id: String,
    /// Calendar date in the professional's timezone.
    pub date: NaiveDate,
    pub service_id: String,
    /// Distance between candidate starts; defaults to each window's granularity.
    pub step_minutes: Option<u32>,
    /// Drop candidates starting earlier than this instant.
    pub not_before: Option<DateTime<Utc>>,
}

/// Bookable slots for a service with one professional on one local date,
/// sorted by start.
///
/// No availability on that weekday is an empty list, not an error. The result
/// is a snapshot: it is never cached, and a slot may be taken by the time the
/// client tries to book it.
pub fn compute_available_slots<S>(store: &S, query: &SlotQuery) -> Result<Vec<Slot>, AppError>
where
    S: AvailabilityStore + BookingStore + CatalogStore + ?Sized,
{
    let service = store
        .service(&query.service_id)?
        .filter(|s| s.lifecycle == Lifecycle::Active)
        .ok_or_else(|| AppError::not_found("service", &query.service_id))?;
    let professional = store
        .professional(&query.professional_id)?
        .filter(|p| p.lifecycle == Lifecycle::Active)
        .ok_or_else(|| AppError::not_found("professional", &query.professional_id))?;

    if query.step_minutes == Some(0) {
        return Err(AppError::Validation("step must be at least one minute".to_string()));
    }

    let windows = store.active_windows(&professional.id, query.date.weekday())?;
    if windows.is_empty() {
        return Ok(vec![]);
    }

    let tz = professional.timezone;
    let (day_start, day_end) = local_day(tz, query.date).ok_or_else(|| {
        AppError::Validation(format!("date out of range: {}", query.date))
    })?;
    let bookings = store.active_bookings(&professional.id, day_start, day_end)?;

    let duration = Duration::minutes(service.duration_minutes as i64);
    let mut slots = Vec::new();

    for window in &windows {
        let (Some(window_start), Some(window_end)) = (
            resolve_on(tz, query.date, window.start_time),
            resolve_on(tz, query.date, window.end_time),
        ) else {
            tracing::warn!(window_id = %window.id, "availability window does not resolve on {}", query.date);
            continue;
        };

        let step = Duration::minutes(query.step_minutes.unwrap_or(window.slot_minutes) as i64);
        slots.extend(
            step_slots(window_start, window_end, duration, step)
                .filter(|(start, _)| query.not_before.map_or(true, |nb| *start >= nb))
                .filter(|(start, end)| !is_taken(&bookings, *start, *end))
                .map(|(start, end)| Slot { start, end }),
        );
    }

    slots.sort();
    slots.dedup();

    tracing::debug!(
        professional_id = %professional.id,
        service_id = %service.id,
        date = %query.date,
        count = slots.len(),
        "computed available slots"
    );

    Ok(slots)
}

fn is_taken(bookings: &[Booking], start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    bookings
        .iter()
        .any(|b| overlaps(b.scheduled_at, b.ends_at(), start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};
    use chrono_tz::Tz;

    use crate::models::{AvailabilityWindow, BookingStatus, Professional, Service};
    use crate::services::fixtures::{at, booking, monday, seeded_store, CUT, PRO, SALON, TRIM};

    fn query(service_id: &str, step: Option<u32>) -> SlotQuery {
        SlotQuery {
            professional_id: PRO.to_string(),
            date: monday(),
            service_id: service_id.to_string(),
            step_minutes: step,
            not_before: None,
        }
    }

    fn starts(slots: &[Slot]) -> Vec<DateTime<Utc>> {
        slots.iter().map(|s| s.start).collect()
    }

    #[test]
    fn test_sixty_minute_service_on_thirty_minute_grid() {
        let store = seeded_store();
        let slots = compute_available_slots(&store, &query(CUT, Some(30))).unwrap();

        assert_eq!(
            starts(&slots),
            vec![at(9, 0), at(9, 30), at(10, 0), at(10, 30), at(11, 0)]
        );
        assert!(slots.iter().all(|s| s.end - s.start == Duration::minutes(60)));
    }

    #[test]
    fn test_booking_removes_overlapping_candidates() {
        let store = seeded_store();
        store
            .insert_booking_if_no_conflict(&booking("b1", at(10, 0), 60, BookingStatus::Confirmed))
            .unwrap();

        let slots = compute_available_slots(&store, &query(CUT, Some(30))).unwrap();
        // 09:30, 10:00 and 10:30 all overlap [10:00, 11:00)
        assert_eq!(starts(&slots), vec![at(9, 0), at(11, 0)]);
    }

    #[test]
    fn test_cancelled_booking_frees_its_slots() {
        let store = seeded_store();
        store
            .insert_booking_if_no_conflict(&booking("b1", at(10, 0), 60, BookingStatus::Cancelled))
            .unwrap();

        let slots = compute_available_slots(&store, &query(CUT, Some(30))).unwrap();
        assert_eq!(slots.len(), 5);
    }

    #[test]
    fn test_step_defaults_to_window_granularity() {
        let store = seeded_store();
        let slots = compute_available_slots(&store, &query(TRIM, None)).unwrap();
        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].start, at(9, 0));
        assert_eq!(slots[5].end, at(12, 0));
    }

    #[test]
    fn test_unknown_service() {
        let store = seeded_store();
        let err = compute_available_slots(&store, &query("svc-missing", Some(30))).unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "service", .. }));
    }

    #[test]
    fn test_retired_service_is_not_found() {
        let store = seeded_store();
        let mut service = store.service(CUT).unwrap().unwrap();
        service.lifecycle = Lifecycle::Retired;
        store.save_service(&service).unwrap();

        let err = compute_available_slots(&store, &query(CUT, Some(30))).unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "service", .. }));
    }

    #[test]
    fn test_no_availability_is_empty_not_error() {
        let store = seeded_store();
        let mut q = query(CUT, Some(30));
        q.date = monday().succ_opt().unwrap();
        assert!(compute_available_slots(&store, &q).unwrap().is_empty());
    }

    #[test]
    fn test_retired_window_is_excluded() {
        let store = seeded_store();
        assert!(store.retire_window("win-mon").unwrap());
        assert!(compute_available_slots(&store, &query(CUT, Some(30)))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_service_longer_than_window_yields_nothing() {
        let store = seeded_store();
        store
            .save_service(&Service {
                id: "svc-long".to_string(),
                salon_id: SALON.to_string(),
                name: "Full colour".to_string(),
                duration_minutes: 240,
                price_cents: 30_000,
                lifecycle: Lifecycle::Active,
            })
            .unwrap();

        assert!(compute_available_slots(&store, &query("svc-long", Some(30)))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_multiple_windows_are_merged_in_order() {
        let store = seeded_store();
        store
            .save_window(
                &AvailabilityWindow::new(
                    "win-mon-pm",
                    PRO,
                    Weekday::Mon,
                    NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();

        let slots = compute_available_slots(&store, &query(CUT, Some(60))).unwrap();
        assert_eq!(
            starts(&slots),
            vec![at(9, 0), at(10, 0), at(11, 0), at(14, 0)]
        );
    }

    #[test]
    fn test_not_before_drops_earlier_candidates() {
        let store = seeded_store();
        let mut q = query(CUT, Some(30));
        q.not_before = Some(at(10, 15));
        let slots = compute_available_slots(&store, &q).unwrap();
        assert_eq!(starts(&slots), vec![at(10, 30), at(11, 0)]);
    }

    #[test]
    fn test_windows_are_local_to_professional_timezone() {
        let store = seeded_store();
        store
            .save_professional(&Professional {
                id: PRO.to_string(),
                salon_id: SALON.to_string(),
                name: "Ana".to_string(),
                timezone: Tz::Europe__Lisbon,
                lifecycle: Lifecycle::Active,
            })
            .unwrap();

        let slots = compute_available_slots(&store, &query(CUT, Some(60))).unwrap();
        // 09:00 Lisbon summer time is 08:00 UTC
        assert_eq!(starts(&slots), vec![at(8, 0), at(9, 0), at(10, 0)]);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let store = seeded_store();
        let err = compute_available_slots(&store, &query(CUT, Some(0))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
