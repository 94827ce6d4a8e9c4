use serde::{Deserialize, Serialize};

/// No-show detection settings. A config with a `professional_id` overrides the
/// salon-wide one for that professional, even when it is disabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoShowConfig {
    pub id: String,
    pub salon_id: String,
    pub professional_id: Option<String>,
    /// Minutes after the scheduled end before a booking may be marked.
    pub grace_minutes: u32,
    pub enabled: bool,
}
