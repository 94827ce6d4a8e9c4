use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::LifecycleEventSink;
use crate::models::LifecycleEvent;

pub const SIGNATURE_HEADER: &str = "X-Scheduler-Signature";

/// Posts each event as JSON to a collaborator endpoint. With a secret set, the
/// body is signed so the receiver can authenticate it.
pub struct WebhookEventSink {
    url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl WebhookEventSink {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

/// Base64 HMAC-SHA1 of `body` keyed with `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {e}"))?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

#[async_trait]
impl LifecycleEventSink for WebhookEventSink {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        let body = serde_json::to_vec(event).context("failed to encode lifecycle event")?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        request
            .body(body)
            .send()
            .await
            .context("failed to deliver lifecycle event")?
            .error_for_status()
            .context("lifecycle event endpoint returned error")?;

        tracing::debug!(
            booking_id = %event.booking_id,
            event = event.event_type.as_str(),
            "delivered lifecycle event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_and_keyed() {
        let body = br#"{"booking_id":"b1"}"#;
        let a = sign_payload("secret", body).unwrap();
        let b = sign_payload("secret", body).unwrap();
        let c = sign_payload("other", body).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        // 20-byte SHA1 digest in padded base64
        assert_eq!(a.len(), 28);
    }

    #[test]
    fn test_signature_changes_with_body() {
        let a = sign_payload("secret", b"one").unwrap();
        let b = sign_payload("secret", b"two").unwrap();
        assert_ne!(a, b);
    }
}
