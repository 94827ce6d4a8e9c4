pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Booking, LifecycleEvent, LifecycleEventType};

/// Receives booking lifecycle notices for notification, audit and loyalty
/// collaborators. Delivery guarantees belong to the implementation.
#[async_trait]
pub trait LifecycleEventSink: Send + Sync {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()>;
}

/// Sink used when no collaborator is configured: events only reach the log.
pub struct LogEventSink;

#[async_trait]
impl LifecycleEventSink for LogEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        tracing::info!(
            booking_id = %event.booking_id,
            event = event.event_type.as_str(),
            payload = %event.payload,
            "lifecycle event"
        );
        Ok(())
    }
}

/// Fire-and-forget emission: a failing sink is logged and never undoes the
/// state change that produced the event.
pub async fn publish(sink: &dyn LifecycleEventSink, event: LifecycleEvent) {
    if let Err(e) = sink.emit(&event).await {
        tracing::error!(
            booking_id = %event.booking_id,
            event = event.event_type.as_str(),
            error = %e,
            "failed to emit lifecycle event"
        );
    }
}

pub fn booking_event(
    booking: &Booking,
    event_type: LifecycleEventType,
    occurred_at: DateTime<Utc>,
    extra: serde_json::Value,
) -> LifecycleEvent {
    let mut payload = serde_json::json!({
        "client_id": booking.client_id,
        "professional_id": booking.professional_id,
        "service_id": booking.service_id,
        "scheduled_at": booking.scheduled_at,
        "duration_minutes": booking.duration_minutes,
        "status": booking.status,
    });
    if let (Some(map), serde_json::Value::Object(extra)) = (payload.as_object_mut(), extra) {
        map.extend(extra);
    }

    LifecycleEvent {
        booking_id: booking.id.clone(),
        event_type,
        occurred_at,
        payload,
    }
}
