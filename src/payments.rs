// 💳 Payments - Donation checkout and webhook verification
//
// Checkout sessions are created by an external provider behind `CheckoutProvider`.
// Webhooks carry a `t=<unix ts>,v1=<hex hmac>` header; the signature is
// HMAC-SHA256 over "<ts>.<raw body>" keyed with the webhook secret.
// Completed payments are logged only: no planner state depends on them.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Smallest accepted donation, in cents
pub const MIN_AMOUNT_CENTS: i64 = 100;

pub const DEFAULT_DESCRIPTION: &str = "Thank you for supporting our project!";

pub const PRODUCT_NAME: &str = "Support Rutgers Degree Planner";

/// Default webhook timestamp tolerance, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Invalid amount: {0} (minimum is 100 cents)")]
    InvalidAmount(i64),

    #[error("Payments are not configured")]
    NotConfigured,

    #[error("Failed to create payment session: {0}")]
    Provider(String),

    #[error("Malformed signature header")]
    MalformedSignatureHeader,

    #[error("No signature matches the payload")]
    SignatureMismatch,

    #[error("Timestamp outside the tolerance window")]
    TimestampOutsideTolerance,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

// ============================================================================
// CHECKOUT
// ============================================================================

/// Body of a checkout request as received from the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Amount in cents
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// A checkout request that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub amount_cents: u64,
    pub product_name: String,
    pub description: String,
    pub currency: String,
}

impl CheckoutRequest {
    pub fn new(amount: i64) -> Self {
        CheckoutRequest {
            amount,
            description: None,
        }
    }

    pub fn validate(&self) -> Result<CheckoutSession, PaymentError> {
        if self.amount < MIN_AMOUNT_CENTS {
            return Err(PaymentError::InvalidAmount(self.amount));
        }

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);

        Ok(CheckoutSession {
            amount_cents: self.amount as u64,
            product_name: PRODUCT_NAME.to_string(),
            description: description.to_string(),
            currency: "usd".to_string(),
        })
    }
}

/// External payment processor; returns the created session id
pub trait CheckoutProvider: Send + Sync {
    fn create_session(&self, session: &CheckoutSession) -> anyhow::Result<String>;
}

pub fn create_checkout(
    request: &CheckoutRequest,
    provider: Option<&dyn CheckoutProvider>,
) -> Result<String, PaymentError> {
    let session = request.validate()?;
    let provider = provider.ok_or(PaymentError::NotConfigured)?;

    let id = provider.create_session(&session).map_err(|e| {
        warn!(error = %e, "checkout session creation failed");
        PaymentError::Provider(e.to_string())
    })?;

    info!(amount = session.amount_cents, session_id = %id, "created checkout session");
    Ok(id)
}

// ============================================================================
// WEBHOOK SIGNATURES
// ============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader, PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| PaymentError::MalformedSignatureHeader)?,
                )
            }
            // Undecodable signatures simply never match
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::MalformedSignatureHeader)?;
    if signatures.is_empty() {
        return Err(PaymentError::SignatureMismatch);
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn signing_mac(payload: &[u8], secret: &str, timestamp: i64) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Build a signature header for `payload`, as the payment processor would
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = signing_mac(payload, secret, timestamp).finalize().into_bytes();
    format!("t={},v1={}", timestamp, hex::encode(signature))
}

/// Verify a webhook signature header against the raw request body.
///
/// `tolerance_secs` of `None` skips the timestamp check.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: Option<i64>,
    now: i64,
) -> Result<(), PaymentError> {
    let parsed = parse_signature_header(header)?;

    if let Some(tolerance) = tolerance_secs {
        // The header timestamp is untrusted; an unrepresentable skew is out of tolerance
        let within = now
            .checked_sub(parsed.timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|skew| skew <= tolerance.unsigned_abs());
        if !within {
            return Err(PaymentError::TimestampOutsideTolerance);
        }
    }

    let matched = parsed.signatures.iter().any(|sig| {
        signing_mac(payload, secret, parsed.timestamp)
            .verify_slice(sig)
            .is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::SignatureMismatch)
    }
}

// ============================================================================
// WEBHOOK EVENTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum WebhookOutcome {
    PaymentCompleted {
        amount_total: Option<i64>,
        email: Option<String>,
    },
    Ignored {
        event_type: String,
    },
}

/// Verify and parse a webhook body
pub fn parse_webhook(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: Option<i64>,
    now: i64,
) -> Result<WebhookEvent, PaymentError> {
    verify_webhook_signature(payload, header, secret, tolerance_secs, now).map_err(|e| {
        warn!(error = %e, "webhook signature verification failed");
        e
    })?;

    serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
}

pub fn handle_webhook_event(event: &WebhookEvent) -> WebhookOutcome {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let object = &event.data.object;
            let amount_total = object.get("amount_total").and_then(Value::as_i64);
            let email = object
                .pointer("/customer_details/email")
                .and_then(Value::as_str)
                .map(str::to_string);

            info!(
                event_id = %event.id,
                amount = ?amount_total,
                customer = ?email,
                metadata = %object.get("metadata").unwrap_or(&serde_json::Value::Null),
                "payment successful"
            );

            WebhookOutcome::PaymentCompleted {
                amount_total,
                email,
            }
        }
        other => {
            info!(event_type = other, "unhandled webhook event");
            WebhookOutcome::Ignored {
                event_type: other.to_string(),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    struct FixedProvider;

    impl CheckoutProvider for FixedProvider {
        fn create_session(&self, session: &CheckoutSession) -> anyhow::Result<String> {
            Ok(format!("cs_test_{}", session.amount_cents))
        }
    }

    #[test]
    fn test_checkout_validation() {
        assert_eq!(
            CheckoutRequest::new(99).validate(),
            Err(PaymentError::InvalidAmount(99))
        );

        let session = CheckoutRequest::new(500).validate().unwrap();
        assert_eq!(session.amount_cents, 500);
        assert_eq!(session.description, DEFAULT_DESCRIPTION);

        let custom = CheckoutRequest {
            amount: 100,
            description: Some("Coffee".to_string()),
        };
        assert_eq!(custom.validate().unwrap().description, "Coffee");
    }

    #[test]
    fn test_create_checkout_requires_provider() {
        let request = CheckoutRequest::new(1000);

        assert_eq!(create_checkout(&request, None), Err(PaymentError::NotConfigured));
        assert_eq!(
            create_checkout(&request, Some(&FixedProvider)).unwrap(),
            "cs_test_1000"
        );
        // Validation runs before the provider is consulted
        assert_eq!(
            create_checkout(&CheckoutRequest::new(0), None),
            Err(PaymentError::InvalidAmount(0))
        );
    }

    #[test]
    fn test_signature_roundtrip() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign_webhook_payload(payload, SECRET, 1_700_000_000);

        assert!(verify_webhook_signature(payload, &header, SECRET, Some(300), 1_700_000_100).is_ok());

        println!("✅ Webhook signature test PASSED");
    }

    #[test]
    fn test_signature_rejections() {
        let payload = b"{}";
        let header = sign_webhook_payload(payload, SECRET, 1_700_000_000);

        assert_eq!(
            verify_webhook_signature(b"{ }", &header, SECRET, None, 0),
            Err(PaymentError::SignatureMismatch)
        );
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_other", None, 0),
            Err(PaymentError::SignatureMismatch)
        );
        assert_eq!(
            verify_webhook_signature(payload, &header, SECRET, Some(300), 1_700_001_000),
            Err(PaymentError::TimestampOutsideTolerance)
        );
        assert_eq!(
            verify_webhook_signature(payload, "v1=abcd", SECRET, None, 0),
            Err(PaymentError::MalformedSignatureHeader)
        );
        assert_eq!(
            verify_webhook_signature(payload, "t=1700000000", SECRET, None, 0),
            Err(PaymentError::SignatureMismatch)
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        assert_eq!(
            verify_webhook_signature(b"{}", "t=-9223372036854775000,v1=00", "s", Some(300), 1_700_000_000),
            Err(PaymentError::TimestampOutsideTolerance)
        );
        assert_eq!(
            verify_webhook_signature(b"{}", "t=9223372036854775807,v1=00", "s", Some(300), -1_700_000_000),
            Err(PaymentError::TimestampOutsideTolerance)
        );

        // Without a tolerance the timestamp only feeds the signature
        let header = sign_webhook_payload(b"{}", SECRET, i64::MIN);
        assert!(verify_webhook_signature(b"{}", &header, SECRET, None, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let payload = b"{}";
        let good = sign_webhook_payload(payload, SECRET, 42);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=42,v1={},v1={}", "00".repeat(32), good_sig);

        assert!(verify_webhook_signature(payload, &header, SECRET, None, 0).is_ok());
    }

    #[test]
    fn test_completed_event() {
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "amount_total": 500,
                "customer_details": {"email": "student@rutgers.edu"},
                "metadata": {"purpose": "donation"}
            }}
        })
        .to_string();
        let header = sign_webhook_payload(payload.as_bytes(), SECRET, 10);

        let event = parse_webhook(payload.as_bytes(), &header, SECRET, None, 0).unwrap();

        assert_eq!(
            handle_webhook_event(&event),
            WebhookOutcome::PaymentCompleted {
                amount_total: Some(500),
                email: Some("student@rutgers.edu".to_string()),
            }
        );
    }

    #[test]
    fn test_other_events_ignored() {
        let event: WebhookEvent =
            serde_json::from_value(json!({"type": "charge.refunded"})).unwrap();

        assert_eq!(
            handle_webhook_event(&event),
            WebhookOutcome::Ignored {
                event_type: "charge.refunded".to_string()
            }
        );
    }
}
