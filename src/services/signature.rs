// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook signature verification.
//!
//! - [`SvixVerifier`]: Clerk webhooks, delivered through Svix
//!   (`svix-id`, `svix-timestamp`, `svix-signature` headers).
//! - [`StripeVerifier`]: Stripe webhooks (`Stripe-Signature` header).
//!
//! Both are HMAC-SHA256 over the raw request body plus a timestamp, with
//! constant-time comparison and a five-minute replay window.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed distance between the signed timestamp and now.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

pub const SVIX_ID_HEADER: &str = "svix-id";
pub const SVIX_TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SVIX_SIGNATURE_HEADER: &str = "svix-signature";
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Why a webhook was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Timestamp outside the allowed tolerance")]
    TimestampOutOfRange,

    #[error("No matching signature found")]
    NoMatchingSignature,

    #[error("Invalid signing secret")]
    InvalidSecret,
}

impl From<SignatureError> for crate::error::AppError {
    fn from(e: SignatureError) -> Self {
        crate::error::AppError::BadRequest(e.to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}

fn parse_timestamp(raw: &str, now: i64) -> Result<i64, SignatureError> {
    let timestamp: i64 = raw
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    if now.abs_diff(timestamp) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::TimestampOutOfRange);
    }
    Ok(timestamp)
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidSecret)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

// ─── Svix (Clerk) ────────────────────────────────────────────────

/// The three Svix transport headers.
#[derive(Debug, Clone, Copy)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SvixHeaders<'a> {
    /// Extract the headers, failing on the first one that is missing.
    pub fn from_headers(headers: &'a HeaderMap) -> Result<Self, SignatureError> {
        Ok(Self {
            id: header_str(headers, SVIX_ID_HEADER)?,
            timestamp: header_str(headers, SVIX_TIMESTAMP_HEADER)?,
            signature: header_str(headers, SVIX_SIGNATURE_HEADER)?,
        })
    }
}

/// Verifies Svix-signed payloads with a `whsec_` secret.
#[derive(Clone)]
pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    /// The secret is base64 after an optional `whsec_` prefix.
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .map_err(|_| SignatureError::InvalidSecret)?;
        if key.is_empty() {
            return Err(SignatureError::InvalidSecret);
        }
        Ok(Self { key })
    }

    /// Signature header value (`v1,<base64>`) for a message.
    pub fn sign(
        &self,
        msg_id: &str,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<String, SignatureError> {
        let timestamp = timestamp.to_string();
        let mac = hmac_sha256(
            &self.key,
            &[msg_id.as_bytes(), b".", timestamp.as_bytes(), b".", payload],
        )?;
        Ok(format!("v1,{}", BASE64.encode(mac)))
    }

    /// Verify `payload` against the headers. `now` is Unix seconds.
    pub fn verify(
        &self,
        headers: &SvixHeaders<'_>,
        payload: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        parse_timestamp(headers.timestamp, now)?;

        let expected = hmac_sha256(
            &self.key,
            &[
                headers.id.as_bytes(),
                b".",
                headers.timestamp.trim().as_bytes(),
                b".",
                payload,
            ],
        )?;

        // Space-separated list; secrets may be rotated so any v1 entry can match.
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, sig)| BASE64.decode(sig).ok())
            .any(|candidate| bool::from(candidate.as_slice().ct_eq(&expected)));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::NoMatchingSignature)
        }
    }
}

// ─── Stripe ──────────────────────────────────────────────────────

/// Verifies `Stripe-Signature` headers with an endpoint secret.
#[derive(Clone)]
pub struct StripeVerifier {
    secret: Vec<u8>,
}

impl StripeVerifier {
    /// Stripe keys the HMAC with the secret string as-is.
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        if secret.is_empty() {
            return Err(SignatureError::InvalidSecret);
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }

    /// Header value (`t=<ts>,v1=<hex>`) for a payload.
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
        let ts = timestamp.to_string();
        let mac = hmac_sha256(&self.secret, &[ts.as_bytes(), b".", payload])?;
        Ok(format!("t={},v1={}", ts, hex::encode(mac)))
    }

    /// Verify `payload` against the raw header value. `now` is Unix seconds.
    pub fn verify(&self, header: &str, payload: &[u8], now: i64) -> Result<(), SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for item in header.split(',') {
            match item.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                Some(_) => {}
                None => return Err(SignatureError::MalformedHeader),
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        parse_timestamp(timestamp, now)?;

        let expected = hmac_sha256(&self.secret, &[timestamp.as_bytes(), b".", payload])?;

        let matched = signatures
            .iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|candidate| bool::from(candidate.as_slice().ct_eq(&expected)));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::NoMatchingSignature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const NOW: i64 = 1_700_000_000;

    fn headers<'a>(id: &'a str, ts: &'a str, sig: &'a str) -> SvixHeaders<'a> {
        SvixHeaders {
            id,
            timestamp: ts,
            signature: sig,
        }
    }

    #[test]
    fn test_svix_roundtrip() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let body = br#"{"type":"user.created"}"#;
        let sig = verifier.sign("msg_1", NOW, body).unwrap();

        let ts = NOW.to_string();
        assert_eq!(verifier.verify(&headers("msg_1", &ts, &sig), body, NOW), Ok(()));
    }

    #[test]
    fn test_svix_known_vector() {
        // Test vector from the Svix documentation.
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let body = br#"{"test": 2432232314}"#;
        let h = headers(
            "msg_p5jXN8AQM9LWM0D4loKWxJek",
            "1614265330",
            "v1,g0hM9SsE+OTPJTGt/tmIKtSyZlE3uFJELVlNIOLJ1OE=",
        );
        assert_eq!(verifier.verify(&h, body, 1_614_265_330), Ok(()));
    }

    #[test]
    fn test_svix_accepts_any_listed_signature() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let body = b"{}";
        let good = verifier.sign("msg_1", NOW, body).unwrap();
        let list = format!("v1,aW52YWxpZA== {} v2,ignored", good);

        let ts = NOW.to_string();
        assert_eq!(verifier.verify(&headers("msg_1", &ts, &list), body, NOW), Ok(()));
    }

    #[test]
    fn test_svix_rejects_tampering() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let sig = verifier.sign("msg_1", NOW, b"original").unwrap();
        let ts = NOW.to_string();

        assert_eq!(
            verifier.verify(&headers("msg_1", &ts, &sig), b"tampered", NOW),
            Err(SignatureError::NoMatchingSignature)
        );
        assert_eq!(
            verifier.verify(&headers("msg_2", &ts, &sig), b"original", NOW),
            Err(SignatureError::NoMatchingSignature)
        );

        let other = SvixVerifier::new("whsec_b3RoZXJfc2VjcmV0").unwrap();
        assert_eq!(
            other.verify(&headers("msg_1", &ts, &sig), b"original", NOW),
            Err(SignatureError::NoMatchingSignature)
        );
    }

    #[test]
    fn test_svix_timestamp_window() {
        let verifier = SvixVerifier::new(SECRET).unwrap();
        let old = NOW - TIMESTAMP_TOLERANCE_SECS - 1;
        let sig = verifier.sign("msg_1", old, b"{}").unwrap();
        let ts = old.to_string();

        assert_eq!(
            verifier.verify(&headers("msg_1", &ts, &sig), b"{}", NOW),
            Err(SignatureError::TimestampOutOfRange)
        );
        assert_eq!(
            verifier.verify(&headers("msg_1", "yesterday", &sig), b"{}", NOW),
            Err(SignatureError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_out_of_range() {
        let svix = SvixVerifier::new(SECRET).unwrap();
        let stripe = StripeVerifier::new("whsec_test").unwrap();

        for ts in [i64::MIN, i64::MAX, 0] {
            let raw = ts.to_string();
            assert_eq!(
                svix.verify(&headers("msg_1", &raw, "v1,abc"), b"{}", NOW),
                Err(SignatureError::TimestampOutOfRange)
            );
            assert_eq!(
                stripe.verify(&format!("t={},v1=abcdef", raw), b"{}", NOW),
                Err(SignatureError::TimestampOutOfRange)
            );
        }
    }

    #[test]
    fn test_svix_headers_reports_missing() {
        let mut map = HeaderMap::new();
        map.insert(SVIX_ID_HEADER, "msg_1".parse().unwrap());
        map.insert(SVIX_SIGNATURE_HEADER, "v1,abc".parse().unwrap());

        assert_eq!(
            SvixHeaders::from_headers(&map).unwrap_err(),
            SignatureError::MissingHeader(SVIX_TIMESTAMP_HEADER)
        );
    }

    #[test]
    fn test_invalid_secret() {
        assert!(SvixVerifier::new("whsec_not base64!").is_err());
        assert!(SvixVerifier::new("whsec_").is_err());
        assert!(StripeVerifier::new("").is_err());
    }

    #[test]
    fn test_stripe_roundtrip_and_tampering() {
        let verifier = StripeVerifier::new("whsec_test").unwrap();
        let body = br#"{"type":"checkout.session.completed"}"#;
        let header = verifier.sign(NOW, body).unwrap();

        assert_eq!(verifier.verify(&header, body, NOW), Ok(()));
        assert_eq!(
            verifier.verify(&header, b"{}", NOW),
            Err(SignatureError::NoMatchingSignature)
        );
        assert_eq!(
            verifier.verify(&header, body, NOW + TIMESTAMP_TOLERANCE_SECS + 1),
            Err(SignatureError::TimestampOutOfRange)
        );
    }

    #[test]
    fn test_stripe_malformed_header() {
        let verifier = StripeVerifier::new("whsec_test").unwrap();
        assert_eq!(
            verifier.verify("v1=abcdef", b"{}", NOW),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verifier.verify("garbage", b"{}", NOW),
            Err(SignatureError::MalformedHeader)
        );
    }
}
