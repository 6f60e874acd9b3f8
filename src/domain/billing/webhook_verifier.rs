//! Webhook signature verification.
//!
//! Verifies that an inbound webhook was signed with the shared secret and is
//! fresh. The signed content is `"{webhook-timestamp}.{raw body}"`, taken
//! byte-for-byte from the request: re-serializing the JSON would break
//! legitimate signatures.
//!
//! Verification is a pure function of the body, headers, secret and the
//! current time, so it is tested without stubs.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::webhook_errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the provider-assigned event id.
pub const WEBHOOK_ID_HEADER: &str = "webhook-id";

/// Header carrying the signing time as Unix seconds.
pub const WEBHOOK_TIMESTAMP_HEADER: &str = "webhook-timestamp";

/// Header carrying `sha256=<hex digest>`.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "webhook-signature";

/// Default accepted distance between the signed timestamp and local time.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 digest length in bytes.
const DIGEST_LEN: usize = 32;

/// Parsed and syntactically valid webhook headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaders {
    /// Provider-assigned event id, used as the idempotency key.
    pub webhook_id: String,
    /// Unix timestamp when the provider signed the request.
    pub timestamp: i64,
    /// Timestamp exactly as sent; this text is what was signed.
    timestamp_text: String,
    /// Decoded signature digest.
    signature: Vec<u8>,
}

impl WebhookHeaders {
    /// Extracts the three required headers.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MissingHeaders` naming the first header that is
    /// absent, empty, non-ASCII, or malformed.
    pub fn parse(headers: &HeaderMap) -> Result<Self, WebhookError> {
        let webhook_id = header_str(headers, WEBHOOK_ID_HEADER)?;
        let timestamp_text = header_str(headers, WEBHOOK_TIMESTAMP_HEADER)?;
        let signature = header_str(headers, WEBHOOK_SIGNATURE_HEADER)?;

        if !timestamp_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WebhookError::MissingHeaders(WEBHOOK_TIMESTAMP_HEADER));
        }
        let timestamp: i64 = timestamp_text
            .parse()
            .map_err(|_| WebhookError::MissingHeaders(WEBHOOK_TIMESTAMP_HEADER))?;

        let digest_hex = signature
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(WebhookError::MissingHeaders(WEBHOOK_SIGNATURE_HEADER))?;
        let signature = hex::decode(digest_hex)
            .map_err(|_| WebhookError::MissingHeaders(WEBHOOK_SIGNATURE_HEADER))?;
        if signature.len() != DIGEST_LEN {
            return Err(WebhookError::MissingHeaders(WEBHOOK_SIGNATURE_HEADER));
        }

        Ok(Self {
            webhook_id: webhook_id.to_string(),
            timestamp,
            timestamp_text: timestamp_text.to_string(),
            signature,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingHeaders(name))
}

/// Verifies a webhook against `secret` at Unix time `now`.
///
/// # Verification Steps
///
/// 1. Parse the headers (fails fast, before any HMAC work)
/// 2. Reject if `|now - timestamp|` exceeds `tolerance_secs`
/// 3. Compute `HMAC-SHA256(secret, "{timestamp}.{body}")`
/// 4. Compare against the provided digest in constant time
///
/// # Errors
///
/// - `MissingHeaders` - a required header is absent or malformed
/// - `ClockSkew` - the signed timestamp is too old or too far ahead
/// - `InvalidSignature` - the digest does not match
pub fn verify(
    raw_body: &[u8],
    headers: &HeaderMap,
    secret: &SecretString,
    tolerance_secs: i64,
    now: i64,
) -> Result<WebhookHeaders, WebhookError> {
    let parsed = WebhookHeaders::parse(headers)?;

    let skew = now - parsed.timestamp;
    if skew.abs() > tolerance_secs {
        return Err(WebhookError::ClockSkew { skew_secs: skew });
    }

    let expected = compute_signature(
        secret.expose_secret().as_bytes(),
        parsed.timestamp_text.as_bytes(),
        raw_body,
    );
    if !constant_time_compare(&expected, &parsed.signature) {
        return Err(WebhookError::InvalidSignature);
    }

    Ok(parsed)
}

/// Verifier bound to a secret and tolerance.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    /// Creates a verifier with the given shared secret and skew tolerance.
    pub fn new(secret: SecretString, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// Verifies against the wall clock.
    pub fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> Result<WebhookHeaders, WebhookError> {
        self.verify_at(raw_body, headers, chrono::Utc::now().timestamp())
    }

    /// Verifies against an explicit Unix time.
    pub fn verify_at(
        &self,
        raw_body: &[u8],
        headers: &HeaderMap,
        now: i64,
    ) -> Result<WebhookHeaders, WebhookError> {
        verify(raw_body, headers, &self.secret, self.tolerance_secs, now)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

fn compute_signature(secret: &[u8], timestamp: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(timestamp);
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Computes the `sha256=<hex>` header value a provider would send.
///
/// Used by tests and by operators replaying captured events.
pub fn signature_header_value(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let digest = compute_signature(secret.as_bytes(), timestamp.as_bytes(), payload);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest))
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const NOW: i64 = 1_760_000_000;

    fn secret() -> SecretString {
        SecretString::new(TEST_SECRET.to_string())
    }

    fn signed_headers(secret: &str, timestamp: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_ID_HEADER, HeaderValue::from_static("evt_test_123"));
        headers.insert(
            WEBHOOK_TIMESTAMP_HEADER,
            HeaderValue::from_str(timestamp).unwrap(),
        );
        headers.insert(
            WEBHOOK_SIGNATURE_HEADER,
            HeaderValue::from_str(&signature_header_value(secret, timestamp, body)).unwrap(),
        );
        headers
    }

    const BODY: &[u8] = br#"{"type":"payment.succeeded","data":{"payment_id":"pay_1"}}"#;

    // ══════════════════════════════════════════════════════════════
    // Header Parsing Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_extracts_all_fields() {
        let headers = signed_headers(TEST_SECRET, "1760000000", BODY);

        let parsed = WebhookHeaders::parse(&headers).unwrap();

        assert_eq!(parsed.webhook_id, "evt_test_123");
        assert_eq!(parsed.timestamp, 1_760_000_000);
        assert_eq!(parsed.signature.len(), DIGEST_LEN);
    }

    #[test]
    fn each_missing_header_is_reported_by_name() {
        for name in [
            WEBHOOK_ID_HEADER,
            WEBHOOK_TIMESTAMP_HEADER,
            WEBHOOK_SIGNATURE_HEADER,
        ] {
            let mut headers = signed_headers(TEST_SECRET, "1760000000", BODY);
            headers.remove(name);

            let result = WebhookHeaders::parse(&headers);

            assert!(
                matches!(result, Err(WebhookError::MissingHeaders(n)) if n == name),
                "expected MissingHeaders({})",
                name
            );
        }
    }

    #[test]
    fn empty_header_counts_as_missing() {
        let mut headers = signed_headers(TEST_SECRET, "1760000000", BODY);
        headers.insert(WEBHOOK_ID_HEADER, HeaderValue::from_static(""));

        let result = WebhookHeaders::parse(&headers);

        assert!(matches!(result, Err(WebhookError::MissingHeaders(WEBHOOK_ID_HEADER))));
    }

    #[test]
    fn non_numeric_timestamp_is_malformed() {
        let mut headers = signed_headers(TEST_SECRET, "1760000000", BODY);
        headers.insert(WEBHOOK_TIMESTAMP_HEADER, HeaderValue::from_static("-1760000000"));

        let result = WebhookHeaders::parse(&headers);

        assert!(matches!(
            result,
            Err(WebhookError::MissingHeaders(WEBHOOK_TIMESTAMP_HEADER))
        ));
    }

    #[test]
    fn signature_without_prefix_is_malformed() {
        let mut headers = signed_headers(TEST_SECRET, "1760000000", BODY);
        headers.insert(
            WEBHOOK_SIGNATURE_HEADER,
            HeaderValue::from_str(&"a".repeat(64)).unwrap(),
        );

        let result = WebhookHeaders::parse(&headers);

        assert!(matches!(
            result,
            Err(WebhookError::MissingHeaders(WEBHOOK_SIGNATURE_HEADER))
        ));
    }

    #[test]
    fn signature_with_bad_hex_or_length_is_malformed() {
        for value in ["sha256=not_hex", "sha256=abcd"] {
            let mut headers = signed_headers(TEST_SECRET, "1760000000", BODY);
            headers.insert(WEBHOOK_SIGNATURE_HEADER, HeaderValue::from_static(value));

            let result = WebhookHeaders::parse(&headers);

            assert!(matches!(
                result,
                Err(WebhookError::MissingHeaders(WEBHOOK_SIGNATURE_HEADER))
            ));
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Signature Verification Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn verify_valid_signature() {
        let headers = signed_headers(TEST_SECRET, &NOW.to_string(), BODY);

        let result = verify(BODY, &headers, &secret(), DEFAULT_TOLERANCE_SECS, NOW);

        assert_eq!(result.unwrap().webhook_id, "evt_test_123");
    }

    #[test]
    fn verify_wrong_secret_fails() {
        let headers = signed_headers("whsec_other", &NOW.to_string(), BODY);

        let result = verify(BODY, &headers, &secret(), DEFAULT_TOLERANCE_SECS, NOW);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn verify_reserialized_body_fails() {
        let headers = signed_headers(TEST_SECRET, &NOW.to_string(), BODY);
        let value: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let pretty = serde_json::to_vec_pretty(&value).unwrap();

        let result = verify(&pretty, &headers, &secret(), DEFAULT_TOLERANCE_SECS, NOW);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn missing_header_is_reported_before_signature_check() {
        // Wrong secret and missing id: the header check must win
        let mut headers = signed_headers("whsec_other", &NOW.to_string(), BODY);
        headers.remove(WEBHOOK_ID_HEADER);

        let result = verify(BODY, &headers, &secret(), DEFAULT_TOLERANCE_SECS, NOW);

        assert!(matches!(result, Err(WebhookError::MissingHeaders(WEBHOOK_ID_HEADER))));
    }

    // ══════════════════════════════════════════════════════════════
    // Freshness Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn timestamp_at_tolerance_boundary_succeeds() {
        for ts in [NOW - 300, NOW + 300] {
            let headers = signed_headers(TEST_SECRET, &ts.to_string(), BODY);
            assert!(verify(BODY, &headers, &secret(), 300, NOW).is_ok());
        }
    }

    #[test]
    fn timestamp_too_old_fails() {
        let headers = signed_headers(TEST_SECRET, &(NOW - 301).to_string(), BODY);

        let result = verify(BODY, &headers, &secret(), 300, NOW);

        assert!(matches!(result, Err(WebhookError::ClockSkew { skew_secs: 301 })));
    }

    #[test]
    fn timestamp_too_far_in_future_fails() {
        let headers = signed_headers(TEST_SECRET, &(NOW + 600).to_string(), BODY);

        let result = verify(BODY, &headers, &secret(), 300, NOW);

        assert!(matches!(result, Err(WebhookError::ClockSkew { skew_secs: -600 })));
    }

    #[test]
    fn verifier_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        let headers = signed_headers(TEST_SECRET, &now.to_string(), BODY);
        let verifier = SignatureVerifier::new(secret(), DEFAULT_TOLERANCE_SECS);

        assert!(verifier.verify(BODY, &headers).is_ok());
    }

    #[test]
    fn verifier_debug_hides_secret() {
        let verifier = SignatureVerifier::new(secret(), 300);
        assert!(!format!("{:?}", verifier).contains(TEST_SECRET));
    }

    // ══════════════════════════════════════════════════════════════
    // Constant Time Comparison Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn constant_time_compare_rejects_different_lengths() {
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 3, 4]));
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
    }

    // ══════════════════════════════════════════════════════════════
    // Mutation Properties
    // ══════════════════════════════════════════════════════════════

    proptest! {
        #[test]
        fn any_body_byte_mutation_is_rejected(
            body in proptest::collection::vec(any::<u8>(), 1..512),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let headers = signed_headers(TEST_SECRET, &NOW.to_string(), &body);
            prop_assert!(verify(&body, &headers, &secret(), 300, NOW).is_ok());

            let mut mutated = body.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= flip;

            prop_assert!(matches!(
                verify(&mutated, &headers, &secret(), 300, NOW),
                Err(WebhookError::InvalidSignature)
            ));
        }

        #[test]
        fn any_timestamp_byte_mutation_is_rejected(
            index in any::<prop::sample::Index>(),
            replacement in any::<u8>(),
        ) {
            let original = NOW.to_string();
            let mut headers = signed_headers(TEST_SECRET, &original, BODY);

            let mut mutated = original.clone().into_bytes();
            let i = index.index(mutated.len());
            prop_assume!(mutated[i] != replacement);
            mutated[i] = replacement;
            let value = HeaderValue::from_bytes(&mutated);
            prop_assume!(value.is_ok());
            headers.insert(WEBHOOK_TIMESTAMP_HEADER, value.unwrap());

            prop_assert!(verify(BODY, &headers, &secret(), 300, NOW).is_err());
        }
    }
}
