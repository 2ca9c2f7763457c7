//! Inbound processor callbacks.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is HMAC-SHA256 over `"<t>.<raw body>"` keyed with the
//! shared webhook secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use lms_core::{CourseId, UserId};

use crate::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Event type emitted once a hosted checkout has been paid.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| WebhookError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Header value a processor would send for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let digest = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    /// Check `header` against `payload`. Nothing in the payload may be
    /// trusted unless this returns `Ok`.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let header = header.ok_or(WebhookError::MissingSignature)?;
        let (timestamp, signatures) = parse_header(header)?;

        let mac = self.mac(timestamp, payload)?;
        let matched = signatures
            .iter()
            .filter_map(|s| hex::decode(s).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        if (now.timestamp() - timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::TimestampOutsideTolerance);
        }
        Ok(())
    }
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(WebhookError::MalformedHeader),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// A paid checkout, reduced to the enrollment it grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub user_id: UserId,
    pub course_id: CourseId,
}

#[derive(Deserialize)]
struct SessionObject {
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Default, Deserialize)]
struct SessionMetadata {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "courseId")]
    course_id: Option<String>,
}

impl WebhookEvent {
    /// Decode a payload that has already passed [`WebhookVerifier::verify`].
    pub fn from_slice(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))
    }

    /// `Some` for completed checkouts, `None` for every other event type.
    pub fn checkout_completed(&self) -> Result<Option<CheckoutCompleted>, WebhookError> {
        if self.event_type != CHECKOUT_COMPLETED {
            return Ok(None);
        }

        let session: SessionObject = serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::Payload(e.to_string()))?;

        let user_id = session
            .metadata
            .user_id
            .ok_or_else(|| WebhookError::Payload("metadata.userId is missing".into()))?
            .parse::<UserId>()
            .map_err(|e| WebhookError::Payload(e.to_string()))?;

        let course_id = session
            .client_reference_id
            .or(session.metadata.course_id)
            .ok_or_else(|| WebhookError::Payload("course reference is missing".into()))?
            .parse::<CourseId>()
            .map_err(|e| WebhookError::Payload(e.to_string()))?;

        Ok(Some(CheckoutCompleted { user_id, course_id }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn completed_payload(user: UserId, course: CourseId) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": CHECKOUT_COMPLETED,
            "data": { "object": {
                "id": "cs_test_1",
                "client_reference_id": course.to_string(),
                "metadata": { "userId": user.to_string(), "courseId": course.to_string() }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn signed_payload_verifies() {
        let v = WebhookVerifier::new("whsec_test");
        let now = Utc::now();
        let body = completed_payload(UserId::new(), CourseId::new());
        let header = v.sign(&body, now.timestamp()).unwrap();
        assert!(v.verify(&body, Some(&header), now).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let v = WebhookVerifier::new("whsec_test");
        let now = Utc::now();
        let body = completed_payload(UserId::new(), CourseId::new());
        let header = v.sign(&body, now.timestamp()).unwrap();
        let mut tampered = body.clone();
        tampered.push(b' ');
        assert_eq!(
            v.verify(&tampered, Some(&header), now),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let body = b"{}".to_vec();
        let header = WebhookVerifier::new("other").sign(&body, now.timestamp()).unwrap();
        assert_eq!(
            WebhookVerifier::new("whsec_test").verify(&body, Some(&header), now),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let v = WebhookVerifier::new("whsec_test");
        let now = Utc::now();
        let body = b"{}".to_vec();
        let header = v.sign(&body, (now - Duration::seconds(301)).timestamp()).unwrap();
        assert_eq!(
            v.verify(&body, Some(&header), now),
            Err(WebhookError::TimestampOutsideTolerance)
        );
    }

    #[test]
    fn missing_and_malformed_headers() {
        let v = WebhookVerifier::new("whsec_test");
        let now = Utc::now();
        assert_eq!(v.verify(b"{}", None, now), Err(WebhookError::MissingSignature));
        assert_eq!(v.verify(b"{}", Some("garbage"), now), Err(WebhookError::MalformedHeader));
        assert_eq!(v.verify(b"{}", Some("t=1"), now), Err(WebhookError::MalformedHeader));
    }

    #[test]
    fn any_matching_v1_signature_is_accepted() {
        let v = WebhookVerifier::new("whsec_test");
        let now = Utc::now();
        let body = b"{}".to_vec();
        let good = v.sign(&body, now.timestamp()).unwrap();
        let header = format!("{good},v1=deadbeef");
        assert!(v.verify(&body, Some(&header), now).is_ok());
    }

    #[test]
    fn completed_checkout_yields_enrollment_target() {
        let v = WebhookVerifier::new("whsec_test");
        let now = Utc::now();
        let (user, course) = (UserId::new(), CourseId::new());
        let body = completed_payload(user, course);
        let header = v.sign(&body, now.timestamp()).unwrap();
        v.verify(&body, Some(&header), now).unwrap();
        let event = WebhookEvent::from_slice(&body).unwrap();
        assert_eq!(
            event.checkout_completed().unwrap(),
            Some(CheckoutCompleted { user_id: user, course_id: course })
        );
    }

    #[test]
    fn other_event_types_are_ignored() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": "payment_intent.created",
            "data": { "object": {} }
        }))
        .unwrap();
        assert_eq!(event.checkout_completed().unwrap(), None);
    }

    #[test]
    fn non_json_body_is_a_payload_error() {
        assert!(matches!(
            WebhookEvent::from_slice(b"not json"),
            Err(WebhookError::Payload(_))
        ));
    }

    #[test]
    fn completed_checkout_without_user_is_a_payload_error() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": CHECKOUT_COMPLETED,
            "data": { "object": { "client_reference_id": CourseId::new().to_string() } }
        }))
        .unwrap();
        assert!(matches!(event.checkout_completed(), Err(WebhookError::Payload(_))));
    }
}
