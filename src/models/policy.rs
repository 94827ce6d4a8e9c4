use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeRate {
    /// Percentage of the booking price in basis points (2500 = 25%).
    pub percent_bps: u32,
    pub fixed_cents: i64,
}

impl FeeRate {
    pub const FREE: FeeRate = FeeRate {
        percent_bps: 0,
        fixed_cents: 0,
    };
}

/// Maps an advance-notice range, in whole hours, to a fee.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeTier {
    pub min_hours: u32,
    /// `None` means unbounded.
    pub max_hours: Option<u32>,
    #[serde(flatten)]
    pub rate: FeeRate,
}

/// Which tier wins when the notice falls exactly on a tier boundary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryRule {
    /// Boundary belongs to the tier demanding more notice (the cheaper one).
    #[default]
    ClientFavorable,
    /// Boundary belongs to the tier demanding less notice.
    ProviderFavorable,
}

impl BoundaryRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryRule::ClientFavorable => "client_favorable",
            BoundaryRule::ProviderFavorable => "provider_favorable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client_favorable" => Some(BoundaryRule::ClientFavorable),
            "provider_favorable" => Some(BoundaryRule::ProviderFavorable),
            _ => None,
        }
    }
}

/// One immutable version of a salon's cancellation policy. Bookings keep the
/// id of the version in effect when they were created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationPolicy {
    pub id: String,
    pub salon_id: String,
    pub version: u32,
    pub tiers: Vec<FeeTier>,
    #[serde(default)]
    pub boundary: BoundaryRule,
    /// Charged when cancelling after the scheduled start. Falls back to the
    /// least-notice tier when absent.
    pub after_start: Option<FeeRate>,
    pub created_at: DateTime<Utc>,
}
