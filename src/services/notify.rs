//! Best-effort side effects around bookings and services: an in-app
//! notification row plus an email. Failures here are logged and swallowed —
//! they must never roll back or fail the primary write.

use reqwest::Client;
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::repository::table_service::create_row;

pub async fn notify(
    pool: &PgPool,
    http_client: &Client,
    config: &AppConfig,
    user: Option<&Value>,
    kind: &str,
    title: &str,
    body: &str,
) {
    let user_id = user
        .and_then(|row| row.as_object())
        .and_then(|obj| obj.get("id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let mut record = Map::new();
    if let Some(user_id) = user_id {
        record.insert("user_id".to_string(), Value::String(user_id.to_string()));
    }
    record.insert("kind".to_string(), Value::String(kind.to_string()));
    record.insert("title".to_string(), Value::String(title.to_string()));
    record.insert("body".to_string(), Value::String(body.to_string()));
    record.insert("read".to_string(), Value::Bool(false));

    if let Err(error) = create_row(pool, "notifications", &record).await {
        tracing::error!(kind, error = %error, "Failed to write notification");
    }

    let recipient = user
        .and_then(|row| row.as_object())
        .and_then(|obj| obj.get("email"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(recipient) = recipient {
        if let Err(error) = send_email(http_client, config, recipient, title, body).await {
            tracing::error!(kind, recipient, error = %error, "Failed to send email");
        }
    }
}

async fn send_email(
    http_client: &Client,
    config: &AppConfig,
    recipient: &str,
    subject: &str,
    body: &str,
) -> Result<(), String> {
    let api_key = config
        .resend_api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| "RESEND_API_KEY not configured".to_string())?;

    let payload = json!({
        "from": config.email_from_address,
        "to": [recipient],
        "subject": subject,
        "html": format!(
            "<div style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">{body}</div>"
        ),
    });

    let response = http_client
        .post("https://api.resend.com/emails")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&payload)
        .send()
        .await
        .map_err(|e| format!("Resend API request failed: {e}"))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let resp_body: Value = response
        .json()
        .await
        .unwrap_or(json!({"error": "failed to parse response"}));
    let message = resp_body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown Resend API error");
    Err(format!("Resend API error ({status}): {message}"))
}
