use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

use crate::db::{BookingStore, NoShowConfigStore, PolicyStore, StatusChange};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, LifecycleEventType};
use crate::services::events::{booking_event, publish, LifecycleEventSink};
use crate::services::lifecycle::cancellation_fee;
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub transitioned: usize,
    /// Candidates whose status changed before the sweep reached them.
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub booking_id: String,
    pub error: String,
}

enum Outcome {
    Transitioned,
    Skipped,
}

/// Marks every active booking whose end plus grace has passed by `now` as
/// `no_show`, charging the after-start fee of its policy snapshot.
///
/// Safe to run repeatedly or concurrently: each booking moves through a
/// conditional update, so a second pass over the same data changes nothing.
/// One failing booking does not stop the batch.
pub async fn run_sweep<S>(
    store: &S,
    events: &dyn LifecycleEventSink,
    now: DateTime<Utc>,
) -> Result<SweepReport, AppError>
where
    S: BookingStore + PolicyStore + NoShowConfigStore + ?Sized,
{
    let now = now.trunc_subsecs(0);
    let mut report = SweepReport::default();

    for config in store.enabled_no_show_configs()? {
        let ended_by = now - Duration::minutes(config.grace_minutes as i64);
        let candidates = store.no_show_candidates(&config, ended_by)?;

        for booking in candidates {
            match mark_no_show(store, events, &booking, now).await {
                Ok(Outcome::Transitioned) => report.transitioned += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(booking_id = %booking.id, error = %e, "no-show sweep failed for booking");
                    report.failures.push(SweepFailure {
                        booking_id: booking.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    if report.transitioned > 0 || !report.failures.is_empty() {
        tracing::info!(
            transitioned = report.transitioned,
            skipped = report.skipped,
            failed = report.failures.len(),
            "no-show sweep finished"
        );
    }

    Ok(report)
}

async fn mark_no_show<S>(
    store: &S,
    events: &dyn LifecycleEventSink,
    booking: &Booking,
    now: DateTime<Utc>,
) -> Result<Outcome, AppError>
where
    S: BookingStore + PolicyStore + ?Sized,
{
    let (fee_cents, _) = cancellation_fee(store, booking, now)?;
    let change = StatusChange {
        no_show_fee_cents: Some(fee_cents),
        ..StatusChange::at(now)
    };

    let updated = match store.transition_status(
        &booking.id,
        BookingStatus::predecessors(BookingStatus::NoShow),
        BookingStatus::NoShow,
        &change,
    ) {
        Ok(b) => b,
        Err(AppError::InvalidTransition { from, .. }) => {
            tracing::debug!(booking_id = %booking.id, status = %from, "no-show skip: status already changed");
            return Ok(Outcome::Skipped);
        }
        Err(e) => return Err(e),
    };

    tracing::info!(booking_id = %booking.id, fee_cents, "booking marked as no-show");
    publish(
        events,
        booking_event(&updated, LifecycleEventType::NoShow, now, serde_json::json!({
            "fee_cents": fee_cents,
            "previous_status": booking.status,
        })),
    )
    .await;

    Ok(Outcome::Transitioned)
}

/// Background task that sweeps for no-shows on a fixed cadence.
pub async fn run_sweeper(state: Arc<AppState>) {
    let period = StdDuration::from_secs(state.config.sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if let Err(e) = run_sweep(&state.store, state.events.as_ref(), Utc::now()).await {
            tracing::error!(error = %e, "no-show sweep aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    use crate::db::{CatalogStore, SqliteStore};
    use crate::models::availability::parse_time;
    use crate::models::{
        AvailabilityWindow, BoundaryRule, CancellationPolicy, FeeRate, FeeTier, Lifecycle,
        NoShowConfig, Professional,
    };
    use crate::services::fixtures::{at, booking, seeded_store, RecordingSink, PRO, SALON};

    fn salon_config(grace: u32) -> NoShowConfig {
        NoShowConfig {
            id: "ns-salon".to_string(),
            salon_id: SALON.to_string(),
            professional_id: None,
            grace_minutes: grace,
            enabled: true,
        }
    }

    fn insert(store: &SqliteStore, id: &str, start: DateTime<Utc>, status: BookingStatus) {
        store
            .insert_booking_if_no_conflict(&booking(id, start, 60, status))
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_marks_lapsed_bookings() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(15)).unwrap();
        insert(&store, "b1", at(9, 0), BookingStatus::Confirmed);

        let report = run_sweep(&store, &sink, at(10, 30)).await.unwrap();

        assert_eq!(report.transitioned, 1);
        assert!(report.failures.is_empty());
        let b = store.booking("b1").unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::NoShow);
        assert_eq!(b.no_show_detected_at, Some(at(10, 30)));
        assert_eq!(b.no_show_fee_cents, Some(0));

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].event_type, LifecycleEventType::NoShow);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(15)).unwrap();
        insert(&store, "b1", at(9, 0), BookingStatus::Pending);
        insert(&store, "b2", at(10, 0), BookingStatus::InProgress);

        let first = run_sweep(&store, &sink, at(11, 30)).await.unwrap();
        let second = run_sweep(&store, &sink, at(11, 30)).await.unwrap();

        assert_eq!(first.transitioned, 2);
        assert_eq!(second, SweepReport::default());
        assert_eq!(sink.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_grace_period_is_respected() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(15)).unwrap();
        insert(&store, "b1", at(9, 0), BookingStatus::Confirmed);

        // Ended at 10:00, grace runs until 10:15
        let early = run_sweep(&store, &sink, at(10, 14)).await.unwrap();
        assert_eq!(early.transitioned, 0);

        let on_time = run_sweep(&store, &sink, at(10, 15)).await.unwrap();
        assert_eq!(on_time.transitioned, 1);
    }

    #[tokio::test]
    async fn test_terminal_bookings_are_untouched() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(0)).unwrap();
        insert(&store, "b1", at(9, 0), BookingStatus::Completed);
        insert(&store, "b2", at(10, 0), BookingStatus::Cancelled);

        let report = run_sweep(&store, &sink, at(12, 0)).await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_professional_config_overrides_salon() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(0)).unwrap();
        store
            .save_no_show_config(&NoShowConfig {
                id: "ns-pro".to_string(),
                salon_id: SALON.to_string(),
                professional_id: Some(PRO.to_string()),
                grace_minutes: 0,
                enabled: false,
            })
            .unwrap();
        insert(&store, "b1", at(9, 0), BookingStatus::Confirmed);

        let report = run_sweep(&store, &sink, at(12, 0)).await.unwrap();
        assert_eq!(report.transitioned, 0);
        assert_eq!(
            store.booking("b1").unwrap().unwrap().status,
            BookingStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_professional_grace_overrides_salon_grace() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(0)).unwrap();
        store
            .save_no_show_config(&NoShowConfig {
                id: "ns-pro".to_string(),
                salon_id: SALON.to_string(),
                professional_id: Some(PRO.to_string()),
                grace_minutes: 60,
                enabled: true,
            })
            .unwrap();

        let other = Professional {
            id: "pro-2".to_string(),
            salon_id: SALON.to_string(),
            name: "Bea".to_string(),
            timezone: chrono_tz::Tz::UTC,
            lifecycle: Lifecycle::Active,
        };
        store.save_professional(&other).unwrap();
        store
            .save_window(
                &AvailabilityWindow::new(
                    "win-bea",
                    &other.id,
                    Weekday::Mon,
                    parse_time("09:00").unwrap(),
                    parse_time("12:00").unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        assert!(store.professional("pro-2").unwrap().is_some());

        insert(&store, "b1", at(9, 0), BookingStatus::Confirmed);
        let mut theirs = booking("b2", at(9, 0), 60, BookingStatus::Confirmed);
        theirs.professional_id = other.id.clone();
        store.insert_booking_if_no_conflict(&theirs).unwrap();

        // 10:30: past the salon grace, inside the professional's hour
        let report = run_sweep(&store, &sink, at(10, 30)).await.unwrap();
        assert_eq!(report.transitioned, 1);
        assert_eq!(
            store.booking("b1").unwrap().unwrap().status,
            BookingStatus::Confirmed
        );
        assert_eq!(
            store.booking("b2").unwrap().unwrap().status,
            BookingStatus::NoShow
        );
    }

    #[tokio::test]
    async fn test_penalty_uses_policy_snapshot() {
        let store = seeded_store();
        let sink = RecordingSink::default();
        store.save_no_show_config(&salon_config(0)).unwrap();
        let policy = store
            .publish_policy(
                SALON,
                &[FeeTier {
                    min_hours: 0,
                    max_hours: None,
                    rate: FeeRate::FREE,
                }],
                BoundaryRule::ClientFavorable,
                Some(FeeRate {
                    percent_bps: 5_000,
                    fixed_cents: 0,
                }),
                at(8, 0),
            )
            .unwrap();
        let mut b = booking("b1", at(9, 0), 60, BookingStatus::Confirmed);
        b.policy_version_id = Some(policy.id);
        store.insert_booking_if_no_conflict(&b).unwrap();

        run_sweep(&store, &sink, at(10, 0)).await.unwrap();

        let b = store.booking("b1").unwrap().unwrap();
        assert_eq!(b.no_show_fee_cents, Some(5_000));
        assert_eq!(sink.recorded()[0].payload["fee_cents"], 5_000);
    }

    /// Hands out a fixed candidate list regardless of current state, standing in
    /// for a sweep that read its candidates before another writer acted.
    struct StaleCandidates {
        inner: SqliteStore,
        candidates: Vec<Booking>,
    }

    impl BookingStore for StaleCandidates {
        fn booking(&self, id: &str) -> Result<Option<Booking>, AppError> {
            self.inner.booking(id)
        }

        fn active_bookings(
            &self,
            professional_id: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Booking>, AppError> {
            self.inner.active_bookings(professional_id, from, to)
        }

        fn insert_booking_if_no_conflict(&self, booking: &Booking) -> Result<Booking, AppError> {
            self.inner.insert_booking_if_no_conflict(booking)
        }

        fn reschedule_if_no_conflict(
            &self,
            id: &str,
            new_start: DateTime<Utc>,
            from: &[BookingStatus],
            at: DateTime<Utc>,
        ) -> Result<Booking, AppError> {
            self.inner.reschedule_if_no_conflict(id, new_start, from, at)
        }

        fn transition_status(
            &self,
            id: &str,
            from: &[BookingStatus],
            to: BookingStatus,
            change: &StatusChange,
        ) -> Result<Booking, AppError> {
            self.inner.transition_status(id, from, to, change)
        }

        fn no_show_candidates(
            &self,
            _config: &NoShowConfig,
            _ended_by: DateTime<Utc>,
        ) -> Result<Vec<Booking>, AppError> {
            Ok(self.candidates.clone())
        }
    }

    impl PolicyStore for StaleCandidates {
        fn current_policy(&self, salon_id: &str) -> Result<Option<CancellationPolicy>, AppError> {
            self.inner.current_policy(salon_id)
        }

        fn policy_snapshot(&self, booking_id: &str) -> Result<Option<CancellationPolicy>, AppError> {
            self.inner.policy_snapshot(booking_id)
        }

        fn publish_policy(
            &self,
            salon_id: &str,
            tiers: &[FeeTier],
            boundary: BoundaryRule,
            after_start: Option<FeeRate>,
            at: DateTime<Utc>,
        ) -> Result<CancellationPolicy, AppError> {
            self.inner
                .publish_policy(salon_id, tiers, boundary, after_start, at)
        }
    }

    impl NoShowConfigStore for StaleCandidates {
        fn enabled_no_show_configs(&self) -> Result<Vec<NoShowConfig>, AppError> {
            self.inner.enabled_no_show_configs()
        }
    }

    #[tokio::test]
    async fn test_lost_race_is_skipped_and_errors_are_collected() {
        let store = seeded_store();
        store.save_no_show_config(&salon_config(0)).unwrap();
        insert(&store, "b1", at(9, 0), BookingStatus::Confirmed);
        insert(&store, "b2", at(10, 0), BookingStatus::Confirmed);
        let stale_b1 = store.booking("b1").unwrap().unwrap();
        let b2 = store.booking("b2").unwrap().unwrap();

        // b1 completes between candidate selection and the transition.
        for (from, to) in [
            (BookingStatus::Confirmed, BookingStatus::InProgress),
            (BookingStatus::InProgress, BookingStatus::Completed),
        ] {
            store
                .transition_status("b1", &[from], to, &StatusChange::at(at(9, 0)))
                .unwrap();
        }
        let phantom = booking("ghost", at(9, 0), 60, BookingStatus::Confirmed);

        let stale = StaleCandidates {
            inner: store,
            candidates: vec![stale_b1, phantom, b2],
        };
        let sink = RecordingSink::default();
        let report = run_sweep(&stale, &sink, at(12, 0)).await.unwrap();

        assert_eq!(report.transitioned, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].booking_id, "ghost");
        assert_eq!(sink.recorded().len(), 1);
        assert_eq!(
            stale.inner.booking("b1").unwrap().unwrap().status,
            BookingStatus::Completed
        );
    }
}
