use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha512;

use crate::config::AppConfig;

type HmacSha512 = Hmac<Sha512>;

/// A charge the gateway has confirmed as successful.
#[derive(Debug, Clone)]
pub struct VerifiedCharge {
    pub reference: String,
    /// Whole currency units (Paystack reports minor units; converted here).
    pub amount: f64,
    pub channel: Option<String>,
}

/// Confirm a charge with Paystack's verify endpoint before a booking is
/// finalized. Returns an error string suitable for a Dependency response.
pub async fn verify_transaction(
    http_client: &Client,
    config: &AppConfig,
    reference: &str,
) -> Result<VerifiedCharge, String> {
    let secret_key = config
        .paystack_secret_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| "PAYSTACK_SECRET_KEY not configured".to_string())?;

    let url = format!("https://api.paystack.co/transaction/verify/{reference}");
    let response = http_client
        .get(&url)
        .bearer_auth(secret_key)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Paystack API request failed");
            "Paystack API request failed.".to_string()
        })?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .unwrap_or(json!({"error": "failed to parse response"}));

    if !status.is_success() {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Paystack error");
        return Err(format!("Paystack API error ({status}): {message}"));
    }

    let data = body.get("data").cloned().unwrap_or(Value::Null);
    let charge_status = data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if charge_status != "success" {
        return Err(format!(
            "Payment for reference '{reference}' is not successful (status: {charge_status})."
        ));
    }

    let amount_minor = data.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
    Ok(VerifiedCharge {
        reference: reference.to_string(),
        amount: amount_minor / 100.0,
        channel: data
            .get("channel")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    })
}

/// Verify a Paystack webhook: the `x-paystack-signature` header carries the
/// hex HMAC-SHA512 of the raw request body under the account secret.
/// Comparison is constant-time via `Mac::verify_slice`.
pub fn verify_webhook_signature(payload: &str, signature_header: &str, secret: &str) -> bool {
    let signature = signature_header.trim();
    if signature.is_empty() {
        return false;
    }

    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());

    let Ok(expected_bytes) = hex_decode(signature) else {
        return false;
    };

    mac.verify_slice(&expected_bytes).is_ok()
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{verify_webhook_signature, HmacSha512};
    use hmac::Mac;

    fn sign(payload: &str, secret: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    #[test]
    fn accepts_a_correctly_signed_body() {
        let payload = r#"{"event":"charge.success","data":{"reference":"ref-1"}}"#;
        let signature = sign(payload, "sk_test_secret");
        assert!(verify_webhook_signature(payload, &signature, "sk_test_secret"));
    }

    #[test]
    fn rejects_tampered_bodies_and_wrong_secrets() {
        let payload = r#"{"event":"charge.success","data":{"reference":"ref-1"}}"#;
        let signature = sign(payload, "sk_test_secret");

        let tampered = payload.replace("ref-1", "ref-2");
        assert!(!verify_webhook_signature(&tampered, &signature, "sk_test_secret"));
        assert!(!verify_webhook_signature(payload, &signature, "sk_other_secret"));
    }

    #[test]
    fn rejects_malformed_signatures() {
        let payload = "{}";
        assert!(!verify_webhook_signature(payload, "", "secret"));
        assert!(!verify_webhook_signature(payload, "zz-not-hex", "secret"));
        assert!(!verify_webhook_signature(payload, "abc", "secret"));
    }
}
