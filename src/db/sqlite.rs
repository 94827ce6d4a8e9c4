use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc, Weekday};
use rusqlite::{Connection, TransactionBehavior};

use crate::errors::AppError;
use crate::models::availability::weekday_index;
use crate::models::{
    AvailabilityWindow, Booking, BookingStatus, BoundaryRule, CancellationPolicy, FeeRate, FeeTier,
    Lifecycle, NoShowConfig, Professional, Service,
};

use super::queries;
use super::store::{
    AvailabilityStore, BookingStore, CatalogStore, NoShowConfigStore, PolicyStore, StatusChange,
};

/// SQLite-backed implementation of every store contract.
///
/// All access goes through one connection behind a mutex, and each write runs
/// in a `BEGIN IMMEDIATE` transaction so the conflict re-check and the write
/// cannot interleave with another writer, in this process or another.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(super::init_db(path)?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("database connection lock poisoned".to_string()))
    }

    // Catalog management is owned by outside flows; these writes exist for
    // seeding and tests.

    pub fn save_professional(&self, professional: &Professional) -> Result<(), AppError> {
        queries::save_professional(&*self.lock()?, professional)
    }

    pub fn save_service(&self, service: &Service) -> Result<(), AppError> {
        queries::save_service(&*self.lock()?, service)
    }

    pub fn save_window(&self, window: &AvailabilityWindow) -> Result<(), AppError> {
        queries::save_window(&*self.lock()?, window)
    }

    pub fn retire_window(&self, id: &str) -> Result<bool, AppError> {
        queries::set_window_lifecycle(&*self.lock()?, id, Lifecycle::Retired)
    }

    pub fn save_no_show_config(&self, config: &NoShowConfig) -> Result<(), AppError> {
        queries::save_no_show_config(&*self.lock()?, config)
    }

    fn load_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
        queries::get_booking_by_id(conn, id)?.ok_or_else(|| AppError::not_found("booking", id))
    }
}

impl CatalogStore for SqliteStore {
    fn professional(&self, id: &str) -> Result<Option<Professional>, AppError> {
        queries::get_professional(&*self.lock()?, id)
    }

    fn service(&self, id: &str) -> Result<Option<Service>, AppError> {
        queries::get_service(&*self.lock()?, id)
    }
}

impl AvailabilityStore for SqliteStore {
    fn active_windows(
        &self,
        professional_id: &str,
        weekday: Weekday,
    ) -> Result<Vec<AvailabilityWindow>, AppError> {
        queries::get_active_windows(&*self.lock()?, professional_id, weekday_index(weekday))
    }
}

impl BookingStore for SqliteStore {
    fn booking(&self, id: &str) -> Result<Option<Booking>, AppError> {
        queries::get_booking_by_id(&*self.lock()?, id)
    }

    fn active_bookings(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        queries::get_active_bookings_overlapping(&*self.lock()?, professional_id, &from, &to, None)
    }

    fn insert_booking_if_no_conflict(&self, booking: &Booking) -> Result<Booking, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let conflicts = queries::get_active_bookings_overlapping(
            &tx,
            &booking.professional_id,
            &booking.scheduled_at,
            &booking.ends_at(),
            Some(booking.id.as_str()),
        )?;
        if let Some(existing) = conflicts.first() {
            return Err(AppError::Conflict(existing.id.clone()));
        }

        queries::insert_booking(&tx, booking)?;
        tx.commit()?;
        Ok(booking.clone())
    }

    fn reschedule_if_no_conflict(
        &self,
        id: &str,
        new_start: DateTime<Utc>,
        from: &[BookingStatus],
        at: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::load_booking(&tx, id)?;
        if !from.contains(&current.status) {
            return Err(AppError::NotReschedulable(current.status));
        }

        let new_end = new_start + Duration::minutes(current.duration_minutes as i64);
        let conflicts = queries::get_active_bookings_overlapping(
            &tx,
            &current.professional_id,
            &new_start,
            &new_end,
            Some(id),
        )?;
        if let Some(existing) = conflicts.first() {
            return Err(AppError::Conflict(existing.id.clone()));
        }

        queries::update_booking_schedule(&tx, id, &new_start, &new_end, from, &at)?;
        let updated = Self::load_booking(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn transition_status(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
        change: &StatusChange,
    ) -> Result<Booking, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = queries::update_booking_status(&tx, id, from, to, change)?;
        let booking = Self::load_booking(&tx, id)?;
        if changed == 0 {
            return Err(AppError::InvalidTransition {
                from: booking.status,
                to,
            });
        }

        tx.commit()?;
        Ok(booking)
    }

    fn no_show_candidates(
        &self,
        config: &NoShowConfig,
        ended_by: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        queries::get_no_show_candidates(&*self.lock()?, config, &ended_by)
    }
}

impl PolicyStore for SqliteStore {
    fn current_policy(&self, salon_id: &str) -> Result<Option<CancellationPolicy>, AppError> {
        queries::get_current_policy(&*self.lock()?, salon_id)
    }

    fn policy_snapshot(&self, booking_id: &str) -> Result<Option<CancellationPolicy>, AppError> {
        let conn = self.lock()?;
        let booking = Self::load_booking(&conn, booking_id)?;
        match booking.policy_version_id {
            Some(version_id) => queries::get_policy_for_booking(&conn, booking_id)?
                .map(Some)
                .ok_or_else(|| AppError::not_found("cancellation policy", version_id)),
            None => Ok(None),
        }
    }

    fn publish_policy(
        &self,
        salon_id: &str,
        tiers: &[FeeTier],
        boundary: BoundaryRule,
        after_start: Option<FeeRate>,
        at: DateTime<Utc>,
    ) -> Result<CancellationPolicy, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let policy = CancellationPolicy {
            id: uuid::Uuid::new_v4().to_string(),
            salon_id: salon_id.to_string(),
            version: queries::get_latest_policy_version(&tx, salon_id)? + 1,
            tiers: tiers.to_vec(),
            boundary,
            after_start,
            created_at: at,
        };
        queries::insert_policy(&tx, &policy)?;
        tx.commit()?;
        Ok(policy)
    }
}

impl NoShowConfigStore for SqliteStore {
    fn enabled_no_show_configs(&self) -> Result<Vec<NoShowConfig>, AppError> {
        queries::get_enabled_no_show_configs(&*self.lock()?)
    }
}
