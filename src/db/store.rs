//! Narrow store contracts the scheduling engine depends on.
//!
//! Every method returns fully populated value objects; nothing is fetched
//! lazily behind the caller's back. Write methods are atomic: the conflict
//! check and the insert (or the status compare and the update) happen in one
//! critical section.

use chrono::{DateTime, Utc, Weekday};

use crate::errors::AppError;
use crate::models::{
    AvailabilityWindow, Booking, BookingStatus, BoundaryRule, Cancellation, CancellationPolicy,
    FeeRate, FeeTier, NoShowConfig, Professional, Service,
};

pub trait CatalogStore {
    fn professional(&self, id: &str) -> Result<Option<Professional>, AppError>;

    fn service(&self, id: &str) -> Result<Option<Service>, AppError>;
}

pub trait AvailabilityStore {
    /// Active windows only; retired windows are filtered out.
    fn active_windows(
        &self,
        professional_id: &str,
        weekday: Weekday,
    ) -> Result<Vec<AvailabilityWindow>, AppError>;
}

/// Metadata written alongside a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub at: DateTime<Utc>,
    pub cancellation: Option<Cancellation>,
    pub no_show_fee_cents: Option<i64>,
}

impl StatusChange {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            cancellation: None,
            no_show_fee_cents: None,
        }
    }
}

pub trait BookingStore {
    fn booking(&self, id: &str) -> Result<Option<Booking>, AppError>;

    /// Active bookings of the professional whose interval overlaps `[from, to)`,
    /// ordered by start.
    fn active_bookings(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;

    /// Inserts the booking unless it overlaps an active booking of the same
    /// professional, in which case `AppError::Conflict` is returned and nothing
    /// is written.
    fn insert_booking_if_no_conflict(&self, booking: &Booking) -> Result<Booking, AppError>;

    /// Moves a booking to `new_start`, keeping its duration, provided its status
    /// is still one of `from` and the new interval overlaps no other active
    /// booking.
    fn reschedule_if_no_conflict(
        &self,
        id: &str,
        new_start: DateTime<Utc>,
        from: &[BookingStatus],
        at: DateTime<Utc>,
    ) -> Result<Booking, AppError>;

    /// Compare-and-swap on status. Fails with `InvalidTransition` carrying the
    /// current status when it is no longer one of `from`.
    fn transition_status(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
        change: &StatusChange,
    ) -> Result<Booking, AppError>;

    /// Active bookings covered by `config` that ended at or before `ended_by`.
    fn no_show_candidates(
        &self,
        config: &NoShowConfig,
        ended_by: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;
}

pub trait PolicyStore {
    fn current_policy(&self, salon_id: &str) -> Result<Option<CancellationPolicy>, AppError>;

    /// The policy version referenced by the booking, `None` if the salon had no
    /// policy when it was created.
    fn policy_snapshot(&self, booking_id: &str) -> Result<Option<CancellationPolicy>, AppError>;

    /// Stores a new version; earlier versions are left untouched.
    fn publish_policy(
        &self,
        salon_id: &str,
        tiers: &[FeeTier],
        boundary: BoundaryRule,
        after_start: Option<FeeRate>,
        at: DateTime<Utc>,
    ) -> Result<CancellationPolicy, AppError>;
}

pub trait NoShowConfigStore {
    fn enabled_no_show_configs(&self) -> Result<Vec<NoShowConfig>, AppError>;
}
