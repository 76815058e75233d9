use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    error::{AppError, AppResult},
    repository::table_service::{get_row, update_row},
    routes::bookings::{finalize_pending_booking, find_by_reference},
    schemas::PaymentReferencePath,
    services::{notify::notify, paystack},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/webhooks/paystack", axum::routing::post(paystack_webhook))
        .route(
            "/bookings/pay/{reference}",
            axum::routing::get(payment_status),
        )
}

/// Public status of a payment reference, polled by the post-checkout
/// return page.
async fn payment_status(
    State(state): State<AppState>,
    Path(path): Path<PaymentReferencePath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let reference = path.reference.trim();

    if let Some(booking) = find_by_reference(pool, "bookings", reference).await? {
        return Ok(Json(json!({
            "reference": reference,
            "status": value_str(&booking, "status"),
            "paid": booking.get("paid").cloned().unwrap_or(Value::Bool(false)),
            "booking": booking,
        })));
    }

    if find_by_reference(pool, "pending_bookings", reference)
        .await?
        .is_some()
    {
        return Ok(Json(json!({
            "reference": reference,
            "status": "pending",
        })));
    }

    Err(AppError::NotFound(format!(
        "No payment found for reference '{reference}'."
    )))
}

/// Paystack webhook. The signature over the raw body is checked before the
/// payload is even parsed; everything after that is acknowledged with 200 so
/// the gateway does not retry events we have already made a decision on.
async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let Some(secret) = state.config.webhook_secret() else {
        return Err(AppError::Dependency(
            "Webhook secret is not configured.".to_string(),
        ));
    };

    let signature = headers
        .get("x-paystack-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !paystack::verify_webhook_signature(&body, signature, secret) {
        tracing::warn!("Rejected webhook with invalid signature");
        return Err(AppError::Unauthorized(
            "Invalid webhook signature.".to_string(),
        ));
    }

    let payload: Value = serde_json::from_str(&body)
        .map_err(|_| AppError::BadRequest("Webhook body is not valid JSON.".to_string()))?;

    let event = payload
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match event {
        "charge.success" => {
            let data = payload.get("data").cloned().unwrap_or(Value::Null);
            let reference = data
                .get("reference")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            if reference.is_empty() {
                tracing::warn!("charge.success event without a reference");
                return Ok(axum::http::StatusCode::OK);
            }
            let amount = data
                .get("amount")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                / 100.0;

            handle_charge_success(&state, &reference, amount).await;
        }
        _ => {
            tracing::debug!("Unhandled Paystack event type: {event}");
        }
    }

    Ok(axum::http::StatusCode::OK)
}

/// A successful charge either finalizes a pending booking or settles an
/// unpaid service. Failures here are logged, not surfaced — the webhook has
/// already been acknowledged as received.
async fn handle_charge_success(state: &AppState, reference: &str, amount: f64) {
    let Ok(pool) = db_pool(state) else {
        return;
    };

    // Retried event for a booking we already finalized.
    match find_by_reference(pool, "bookings", reference).await {
        Ok(Some(_)) => {
            tracing::info!(reference, "Webhook charge already finalized");
            return;
        }
        Ok(None) => {}
        Err(error) => {
            tracing::error!(reference, error = %error, "Webhook booking lookup failed");
            return;
        }
    }

    match find_by_reference(pool, "pending_bookings", reference).await {
        Ok(Some(pending)) => {
            let expected =
                number_from_value(pending.as_object().and_then(|o| o.get("total_amount")));
            if amount + 0.01 < expected {
                tracing::error!(
                    reference,
                    amount,
                    expected,
                    "Webhook charge does not cover the pending booking total"
                );
                return;
            }
            match finalize_pending_booking(state, &pending, "webhook").await {
                Ok(booking) => {
                    let user_id = value_str(&booking, "user_id");
                    if let Ok(user) = get_row(pool, "users", &user_id, "id").await {
                        notify(
                            pool,
                            &state.http_client,
                            &state.config,
                            Some(&user),
                            "booking_confirmed",
                            "Booking confirmed",
                            &format!("Your payment (ref: {reference}) has been received and your stay is confirmed."),
                        )
                        .await;
                    }
                }
                Err(error) => {
                    tracing::error!(reference, error = %error, "Webhook booking finalization failed");
                }
            }
            return;
        }
        Ok(None) => {}
        Err(error) => {
            tracing::error!(reference, error = %error, "Webhook pending lookup failed");
            return;
        }
    }

    // Not a booking: maybe an ancillary service paid through the gateway.
    match find_by_reference(pool, "services", reference).await {
        Ok(Some(service)) => {
            if value_str(&service, "payment_status") == "paid" {
                return;
            }
            let service_id = value_str(&service, "id");
            let mut patch = Map::new();
            patch.insert(
                "payment_status".to_string(),
                Value::String("paid".to_string()),
            );
            if let Err(error) = update_row(pool, "services", &service_id, &patch, "id").await {
                tracing::error!(reference, error = %error, "Webhook service update failed");
            }
        }
        Ok(None) => {
            tracing::info!(reference, "Webhook charge matches no pending booking or service");
        }
        Err(error) => {
            tracing::error!(reference, error = %error, "Webhook service lookup failed");
        }
    }
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

fn value_str(row: &Value, key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

fn number_from_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}
