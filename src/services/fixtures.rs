use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::db::{self, SqliteStore};
use crate::models::availability::parse_time;
use crate::models::{
    AvailabilityWindow, Booking, BookingStatus, Lifecycle, LifecycleEvent, Professional, Service,
};
use crate::services::events::LifecycleEventSink;

pub const SALON: &str = "salon-1";
pub const PRO: &str = "pro-1";
pub const CUT: &str = "svc-cut";
pub const TRIM: &str = "svc-trim";

/// 2025-06-16 is a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
}

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, h, m, 0).unwrap()
}

/// Professional available Mondays 09:00-12:00 UTC, with a 60 minute cut and a
/// 30 minute trim on the menu.
pub fn seeded_store() -> SqliteStore {
    let store = SqliteStore::new(db::init_db(":memory:").unwrap());
    store
        .save_professional(&Professional {
            id: PRO.to_string(),
            salon_id: SALON.to_string(),
            name: "Ana".to_string(),
            timezone: Tz::UTC,
            lifecycle: Lifecycle::Active,
        })
        .unwrap();
    for (id, minutes, price) in [(CUT, 60, 10_000), (TRIM, 30, 4_000)] {
        store
            .save_service(&Service {
                id: id.to_string(),
                salon_id: SALON.to_string(),
                name: id.to_string(),
                duration_minutes: minutes,
                price_cents: price,
                lifecycle: Lifecycle::Active,
            })
            .unwrap();
    }
    store
        .save_window(
            &AvailabilityWindow::new(
                "win-mon",
                PRO,
                Weekday::Mon,
                parse_time("09:00").unwrap(),
                parse_time("12:00").unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
    store
}

pub fn booking(id: &str, start: DateTime<Utc>, minutes: u32, status: BookingStatus) -> Booking {
    Booking {
        id: id.to_string(),
        client_id: "client-1".to_string(),
        professional_id: PRO.to_string(),
        service_id: CUT.to_string(),
        scheduled_at: start,
        duration_minutes: minutes,
        price_cents: 10_000,
        policy_version_id: None,
        status,
        cancellation: None,
        no_show_fee_cents: None,
        no_show_detected_at: None,
        created_at: at(8, 0),
        updated_at: at(8, 0),
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn recorded(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl LifecycleEventSink for RecordingSink {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
