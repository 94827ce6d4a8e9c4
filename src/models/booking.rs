use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub scheduled_at: DateTime<Utc>,
    /// Copied from the service at creation; later service edits do not apply.
    pub duration_minutes: u32,
    pub price_cents: i64,
    /// Cancellation policy version in effect when the booking was made.
    pub policy_version_id: Option<String>,
    pub status: BookingStatus,
    pub cancellation: Option<Cancellation>,
    /// Penalty charged when the booking lapsed into `no_show`.
    pub no_show_fee_cents: Option<i64>,
    pub no_show_detected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub cancelled_by: Actor,
    pub fee_cents: i64,
}

/// Who asked for a status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Client,
    Professional,
    Salon,
    System,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Client => "client",
            Actor::Professional => "professional",
            Actor::Salon => "salon",
            Actor::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Actor::Client),
            "professional" => Some(Actor::Professional),
            "salon" => Some(Actor::Salon),
            "system" => Some(Actor::System),
            _ => None,
        }
    }

    pub fn is_human(&self) -> bool {
        !matches!(self, Actor::System)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Active bookings hold their interval: they block slots and conflict checks.
    pub const ACTIVE: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (*self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, InProgress) => true,
            (InProgress, Completed) => true,
            (Pending | Confirmed, Cancelled) => true,
            (Pending | Confirmed | InProgress, NoShow) => true,
            (Pending | Confirmed | InProgress | Completed | Cancelled | NoShow, _) => false,
        }
    }

    /// Every status from which `to` can be reached in one step.
    pub fn predecessors(to: BookingStatus) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match to {
            Pending => &[],
            Confirmed => &[Pending],
            InProgress => &[Confirmed],
            Completed => &[InProgress],
            Cancelled => &[Pending, Confirmed],
            NoShow => &[Pending, Confirmed, InProgress],
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
