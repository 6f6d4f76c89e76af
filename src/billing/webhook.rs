//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed
//! message is `"{t}.{raw body}"`, HMAC-SHA256 under the endpoint secret.

use super::errors::{BillingError, BillingResult};
use crate::auth::crypto::{constant_time_eq, hex_encode, hmac_sha256};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age (either direction) of a signed timestamp
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
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
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    fn expected_signature(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut message = format!("{}.", timestamp).into_bytes();
        message.extend_from_slice(payload);
        hex_encode(&hmac_sha256(self.secret.as_bytes(), &message))
    }

    /// Header value for `payload` signed at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, self.expected_signature(timestamp, payload))
    }

    /// Check `header` against `payload` at time `now` (unix seconds).
    pub fn verify(&self, payload: &[u8], header: Option<&str>, now: i64) -> BillingResult<()> {
        let header =
            header.ok_or_else(|| BillingError::InvalidSignature("missing signature header".into()))?;

        let mut timestamp = None;
        let mut candidates = Vec::new();
        for item in header.split(',') {
            match item.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| BillingError::InvalidSignature("missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(BillingError::InvalidSignature("no v1 signature".into()));
        }
        // `t` is attacker-controlled; extreme values must not overflow
        let within_tolerance = now
            .checked_sub(timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|age| age <= self.tolerance_secs.max(0).unsigned_abs());
        if !within_tolerance {
            return Err(BillingError::InvalidSignature(
                "timestamp outside tolerance".into(),
            ));
        }

        let expected = self.expected_signature(timestamp, payload);
        if candidates
            .iter()
            .any(|c| constant_time_eq(c.as_bytes(), expected.as_bytes()))
        {
            Ok(())
        } else {
            Err(BillingError::InvalidSignature("signature mismatch".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let verifier = WebhookVerifier::new("whsec_test");
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = verifier.sign(payload, NOW);

        verifier.verify(payload, Some(&header), NOW + 10).unwrap();
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let verifier = WebhookVerifier::new("whsec_test");
        let header = verifier.sign(b"original", NOW);

        assert!(matches!(
            verifier.verify(b"tampered", Some(&header), NOW),
            Err(BillingError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = WebhookVerifier::new("other").sign(b"body", NOW);
        assert!(WebhookVerifier::new("whsec_test")
            .verify(b"body", Some(&header), NOW)
            .is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = WebhookVerifier::new("whsec_test");
        let header = verifier.sign(b"body", NOW);

        assert!(verifier.verify(b"body", Some(&header), NOW + 301).is_err());
        assert!(verifier
            .with_tolerance(600)
            .verify(b"body", Some(&header), NOW + 301)
            .is_ok());
    }

    #[test]
    fn test_rotated_secrets_any_v1_matches() {
        let verifier = WebhookVerifier::new("whsec_test");
        let good = verifier.sign(b"body", NOW);
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={},v1=deadbeef,v1={}", NOW, good_sig);

        verifier.verify(b"body", Some(&header), NOW).unwrap();
    }

    #[test]
    fn test_malformed_headers() {
        let verifier = WebhookVerifier::new("whsec_test");
        assert!(verifier.verify(b"body", None, NOW).is_err());
        assert!(verifier.verify(b"body", Some("v1=abc"), NOW).is_err());
        assert!(verifier.verify(b"body", Some("t=123"), NOW).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let verifier = WebhookVerifier::new("whsec_test");
        for t in [i64::MIN, i64::MAX, i64::MIN + 1] {
            let header = format!("t={},v1=deadbeef", t);
            assert!(matches!(
                verifier.verify(b"body", Some(&header), NOW),
                Err(BillingError::InvalidSignature(_))
            ));
        }

        // Negative clocks are still compared, not wrapped
        assert!(matches!(
            verifier.verify(b"body", Some("t=0,v1=deadbeef"), i64::MIN),
            Err(BillingError::InvalidSignature(_))
        ));
    }
}
