//! Webhook signature scheme
//!
//! The gateway signs each delivery with HMAC-SHA256 over
//! `"{timestamp}.{payload}"` and sends `t=<unix>,v1=<hex>` in the signature
//! header. Verification checks the MAC in constant time and bounds the
//! timestamp skew to reject replayed deliveries.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the signed timestamp and now
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify a signature header against the raw payload
pub fn verify(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let (timestamp, provided) = parse_header(header)?;

    let skew = (now.timestamp() - timestamp).abs();
    if skew > tolerance_secs {
        return Err(CoreError::InvalidSignature(format!(
            "timestamp outside tolerance: {skew}s"
        )));
    }

    let provided = hex::decode(provided)
        .map_err(|_| CoreError::InvalidSignature("v1 value is not hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CoreError::Configuration(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    mac.verify_slice(&provided)
        .map_err(|_| CoreError::InvalidSignature("signature mismatch".to_string()))
}

/// Sign a payload, producing the header value the gateway would send.
/// Used by tests and local tooling.
pub fn sign(secret: &str, payload: &[u8], timestamp: DateTime<Utc>) -> String {
    let ts = timestamp.timestamp();
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(ts.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    format!("t={ts},v1={}", hex::encode(digest))
}

fn parse_header(header: &str) -> CoreResult<(i64, &str)> {
    let mut timestamp = None;
    let mut v1 = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse::<i64>().ok();
            }
            Some(("v1", value)) => {
                v1 = Some(value);
            }
            _ => {}
        }
    }

    match (timestamp, v1) {
        (Some(t), Some(sig)) => Ok((t, sig)),
        _ => Err(CoreError::InvalidSignature(
            "header missing t or v1 element".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_sign_and_verify_round_trip() {
        let payload = br#"{"type":"payout.paid"}"#;
        let now = Utc::now();
        let header = sign(SECRET, payload, now);

        assert!(verify(SECRET, payload, &header, DEFAULT_TOLERANCE_SECS, now).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"payload";
        let now = Utc::now();
        let header = sign(SECRET, payload, now);

        let result = verify("whsec_other", payload, &header, DEFAULT_TOLERANCE_SECS, now);
        assert!(matches!(result, Err(CoreError::InvalidSignature(_))));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = Utc::now();
        let header = sign(SECRET, b"payload", now);

        let result = verify(SECRET, b"tampered", &header, DEFAULT_TOLERANCE_SECS, now);
        assert!(matches!(result, Err(CoreError::InvalidSignature(_))));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"payload";
        let signed_at = Utc::now() - Duration::minutes(10);
        let header = sign(SECRET, payload, signed_at);

        let result = verify(SECRET, payload, &header, DEFAULT_TOLERANCE_SECS, Utc::now());
        assert!(matches!(result, Err(CoreError::InvalidSignature(_))));
    }

    #[test]
    fn test_malformed_header_rejected() {
        for header in ["", "t=123", "v1=abcd", "t=abc,v1=zz"] {
            let result = verify(SECRET, b"p", header, DEFAULT_TOLERANCE_SECS, Utc::now());
            assert!(result.is_err(), "header {header:?} should be rejected");
        }
    }
}
