use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Whether a catalog row may be used for new bookings. Retired rows stay
/// around so historical bookings keep resolving.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Retired,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Active => "active",
            Lifecycle::Retired => "retired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Lifecycle::Active),
            "retired" => Some(Lifecycle::Retired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Professional {
    pub id: String,
    pub salon_id: String,
    pub name: String,
    pub timezone: Tz,
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub salon_id: String,
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
    pub lifecycle: Lifecycle,
}
