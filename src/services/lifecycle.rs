use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{AvailabilityStore, BookingStore, CatalogStore, PolicyStore, StatusChange};
use crate::errors::AppError;
use crate::models::{
    Actor, Booking, BookingStatus, BoundaryRule, Cancellation, CancellationPolicy, FeeRate,
    FeeTier, Lifecycle, LifecycleEventType,
};
use crate::services::cancellation::{compute_cancellation_fee, validate_tiers};
use crate::services::conflict::validate_within_availability;
use crate::services::events::{booking_event, publish, LifecycleEventSink};

/// Bookings can be moved only before the appointment starts.
const RESCHEDULABLE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
    pub cancelled_by: Actor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationQuote {
    pub booking_id: String,
    pub fee_cents: i64,
    pub policy_version: Option<u32>,
    pub quoted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDraft {
    pub tiers: Vec<FeeTier>,
    #[serde(default)]
    pub boundary: BoundaryRule,
    pub after_start: Option<FeeRate>,
}

/// Creates a pending booking at the requested start.
///
/// Duration, price and the salon's current policy version are copied onto the
/// booking so later catalog or policy edits never change it. The overlap check
/// is repeated by the store inside the insert.
pub async fn create_booking<S>(
    store: &S,
    events: &dyn LifecycleEventSink,
    request: NewBooking,
    now: DateTime<Utc>,
) -> Result<Booking, AppError>
where
    S: CatalogStore + AvailabilityStore + BookingStore + PolicyStore + ?Sized,
{
    let now = now.trunc_subsecs(0);
    let scheduled_at = request.scheduled_at.trunc_subsecs(0);

    if request.client_id.trim().is_empty() {
        return Err(AppError::Validation("client_id is required".to_string()));
    }
    if scheduled_at < now {
        return Err(AppError::Validation(
            "cannot book a time in the past".to_string(),
        ));
    }

    let service = store
        .service(&request.service_id)?
        .filter(|s| s.lifecycle == Lifecycle::Active)
        .ok_or_else(|| AppError::not_found("service", &request.service_id))?;
    let professional = store
        .professional(&request.professional_id)?
        .filter(|p| p.lifecycle == Lifecycle::Active)
        .ok_or_else(|| AppError::not_found("professional", &request.professional_id))?;

    validate_within_availability(store, &professional, scheduled_at, service.duration_minutes)?;

    let policy = store.current_policy(&service.salon_id)?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: request.client_id,
        professional_id: professional.id.clone(),
        service_id: service.id.clone(),
        scheduled_at,
        duration_minutes: service.duration_minutes,
        price_cents: service.price_cents,
        policy_version_id: policy.map(|p| p.id),
        status: BookingStatus::Pending,
        cancellation: None,
        no_show_fee_cents: None,
        no_show_detected_at: None,
        created_at: now,
        updated_at: now,
    };

    let booking = match store.insert_booking_if_no_conflict(&booking) {
        Ok(b) => b,
        Err(e) => {
            if let AppError::Conflict(existing) = &e {
                tracing::warn!(
                    professional_id = %booking.professional_id,
                    scheduled_at = %booking.scheduled_at,
                    conflicts_with = %existing,
                    "booking rejected: slot taken"
                );
            }
            return Err(e);
        }
    };

    tracing::info!(
        booking_id = %booking.id,
        professional_id = %booking.professional_id,
        scheduled_at = %booking.scheduled_at,
        "booking created"
    );
    publish(
        events,
        booking_event(&booking, LifecycleEventType::Created, now, serde_json::json!({
            "price_cents": booking.price_cents,
            "policy_version_id": booking.policy_version_id,
        })),
    )
    .await;

    Ok(booking)
}

pub fn get_booking<S: BookingStore + ?Sized>(store: &S, id: &str) -> Result<Booking, AppError> {
    store
        .booking(id)?
        .ok_or_else(|| AppError::not_found("booking", id))
}

/// Manual progression along `pending -> confirmed -> in_progress -> completed`.
///
/// Cancellation has its own entry point, and `no_show` is only ever set by the
/// sweeper.
pub async fn update_status<S: BookingStore + ?Sized>(
    store: &S,
    events: &dyn LifecycleEventSink,
    id: &str,
    to: BookingStatus,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let now = now.trunc_subsecs(0);
    let current = get_booking(store, id)?;

    let event_type = match to {
        BookingStatus::Confirmed => LifecycleEventType::Confirmed,
        BookingStatus::InProgress => LifecycleEventType::Started,
        BookingStatus::Completed => LifecycleEventType::Completed,
        BookingStatus::Cancelled => {
            return Err(AppError::Validation(
                "use the cancel operation to cancel a booking".to_string(),
            ))
        }
        BookingStatus::NoShow | BookingStatus::Pending => {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to,
            })
        }
    };

    if !current.status.can_transition_to(to) {
        return Err(AppError::InvalidTransition {
            from: current.status,
            to,
        });
    }

    let booking = store.transition_status(id, &[current.status], to, &StatusChange::at(now))?;

    tracing::info!(booking_id = %id, from = %current.status, to = %to, "booking status changed");
    publish(
        events,
        booking_event(&booking, event_type, now, serde_json::json!({ "from": current.status })),
    )
    .await;

    Ok(booking)
}

/// Fee owed if the booking were cancelled at `at`, from its policy snapshot.
/// A booking made while the salon had no policy cancels for free.
pub fn cancellation_fee<S: PolicyStore + ?Sized>(
    store: &S,
    booking: &Booking,
    at: DateTime<Utc>,
) -> Result<(i64, Option<CancellationPolicy>), AppError> {
    let policy = store.policy_snapshot(&booking.id)?;
    let fee = policy.as_ref().map_or(0, |p| {
        compute_cancellation_fee(p, booking.price_cents, booking.scheduled_at, at)
    });
    Ok((fee, policy))
}

pub fn cancellation_quote<S: BookingStore + PolicyStore + ?Sized>(
    store: &S,
    id: &str,
    now: DateTime<Utc>,
) -> Result<CancellationQuote, AppError> {
    let now = now.trunc_subsecs(0);
    let booking = get_booking(store, id)?;
    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(AppError::InvalidTransition {
            from: booking.status,
            to: BookingStatus::Cancelled,
        });
    }

    let (fee_cents, policy) = cancellation_fee(store, &booking, now)?;
    Ok(CancellationQuote {
        booking_id: booking.id,
        fee_cents,
        policy_version: policy.map(|p| p.version),
        quoted_at: now,
    })
}

pub async fn cancel_booking<S: BookingStore + PolicyStore + ?Sized>(
    store: &S,
    events: &dyn LifecycleEventSink,
    id: &str,
    request: CancelRequest,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let now = now.trunc_subsecs(0);
    let reason = request
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if request.cancelled_by.is_human() && reason.is_none() {
        return Err(AppError::Validation(
            "a reason is required to cancel a booking".to_string(),
        ));
    }

    let current = get_booking(store, id)?;
    if !current.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(AppError::InvalidTransition {
            from: current.status,
            to: BookingStatus::Cancelled,
        });
    }

    let (fee_cents, _) = cancellation_fee(store, &current, now)?;
    let change = StatusChange {
        cancellation: Some(Cancellation {
            cancelled_at: now,
            reason,
            cancelled_by: request.cancelled_by,
            fee_cents,
        }),
        ..StatusChange::at(now)
    };

    let booking = store.transition_status(
        id,
        BookingStatus::predecessors(BookingStatus::Cancelled),
        BookingStatus::Cancelled,
        &change,
    )?;

    tracing::info!(
        booking_id = %id,
        cancelled_by = request.cancelled_by.as_str(),
        fee_cents,
        "booking cancelled"
    );
    publish(
        events,
        booking_event(&booking, LifecycleEventType::Cancelled, now, serde_json::json!({
            "fee_cents": fee_cents,
            "cancelled_by": request.cancelled_by,
            "reason": booking.cancellation.as_ref().and_then(|c| c.reason.clone()),
        })),
    )
    .await;

    Ok(booking)
}

/// Moves a pending or confirmed booking to a new start in place. No fee is
/// charged and the price and policy snapshots are kept.
pub async fn reschedule_booking<S>(
    store: &S,
    events: &dyn LifecycleEventSink,
    id: &str,
    new_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Booking, AppError>
where
    S: CatalogStore + AvailabilityStore + BookingStore + ?Sized,
{
    let now = now.trunc_subsecs(0);
    let new_start = new_start.trunc_subsecs(0);

    let current = get_booking(store, id)?;
    if !RESCHEDULABLE.contains(&current.status) {
        return Err(AppError::NotReschedulable(current.status));
    }
    if new_start < now {
        return Err(AppError::Validation(
            "cannot move a booking into the past".to_string(),
        ));
    }

    let professional = store
        .professional(&current.professional_id)?
        .ok_or_else(|| AppError::not_found("professional", &current.professional_id))?;
    validate_within_availability(store, &professional, new_start, current.duration_minutes)?;

    let booking = store.reschedule_if_no_conflict(id, new_start, &RESCHEDULABLE, now)?;

    tracing::info!(
        booking_id = %id,
        from = %current.scheduled_at,
        to = %booking.scheduled_at,
        "booking rescheduled"
    );
    publish(
        events,
        booking_event(&booking, LifecycleEventType::Rescheduled, now, serde_json::json!({
            "previous_scheduled_at": current.scheduled_at,
        })),
    )
    .await;

    Ok(booking)
}

/// Validates and stores a new policy version for the salon. Existing bookings
/// keep the version they were created under.
pub fn publish_policy<S: PolicyStore + ?Sized>(
    store: &S,
    salon_id: &str,
    draft: PolicyDraft,
    now: DateTime<Utc>,
) -> Result<CancellationPolicy, AppError> {
    validate_tiers(&draft.tiers, draft.after_start)?;

    let mut tiers = draft.tiers;
    tiers.sort_by_key(|t| t.min_hours);

    let policy = store.publish_policy(
        salon_id,
        &tiers,
        draft.boundary,
        draft.after_start,
        now.trunc_subsecs(0),
    )?;
    tracing::info!(salon_id, version = policy.version, "cancellation policy published");
    Ok(policy)
}
