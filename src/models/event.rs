use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventType {
    Created,
    Confirmed,
    Started,
    Completed,
    Cancelled,
    Rescheduled,
    NoShow,
}

impl LifecycleEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventType::Created => "created",
            LifecycleEventType::Confirmed => "confirmed",
            LifecycleEventType::Started => "started",
            LifecycleEventType::Completed => "completed",
            LifecycleEventType::Cancelled => "cancelled",
            LifecycleEventType::Rescheduled => "rescheduled",
            LifecycleEventType::NoShow => "no_show",
        }
    }
}

/// Outbound notice for notification, audit and loyalty collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleEvent {
    pub booking_id: String,
    pub event_type: LifecycleEventType,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}
