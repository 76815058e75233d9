use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    auth::require_admin,
    availability::{
        booked_dates_from_value, booked_dates_to_value, check_availability, commit_range,
        release_range, StayRange,
    },
    error::{AppError, AppResult},
    repository::table_service::{
        create_row, create_row_tx, delete_row, get_row, list_rows, update_row_tx,
    },
    schemas::{
        clamp_limit_in_range, BookingPath, BookingsQuery, ConfirmBookingInput,
        CreateManualBookingInput, InitiateBookingInput,
    },
    services::{notify::notify, paystack},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/bookings",
            axum::routing::get(list_bookings).post(create_manual_booking),
        )
        .route("/bookings/initiate", axum::routing::post(initiate_booking))
        .route("/bookings/confirm", axum::routing::post(confirm_booking))
        .route("/bookings/{booking_id}", axum::routing::get(get_booking))
        .route(
            "/bookings/{booking_id}/cancel",
            axum::routing::post(cancel_booking),
        )
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if let Some(status) = non_empty_opt(query.status.as_deref()) {
        filters.insert("status".to_string(), Value::String(status));
    }
    if let Some(paid) = query.paid {
        filters.insert("paid".to_string(), Value::Bool(paid));
    }
    if let Some(channel) = non_empty_opt(query.channel.as_deref()) {
        filters.insert("channel".to_string(), Value::String(channel));
    }
    if let Some(shortlet_id) = non_empty_opt(query.shortlet_id.as_deref()) {
        filters.insert("shortlet_id".to_string(), Value::String(shortlet_id));
    }
    if let Some(user_id) = non_empty_opt(query.user_id.as_deref()) {
        filters.insert("user_id".to_string(), Value::String(user_id));
    }

    let rows = list_rows(
        pool,
        "bookings",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let record = get_row(pool, "bookings", &path.booking_id, "id").await?;
    Ok(Json(record))
}

/// Guest checkout, step 1: hold the intent. Validates the stay and records
/// a pending booking keyed by a fresh payment reference; the client takes
/// that reference to the payment gateway.
async fn initiate_booking(
    State(state): State<AppState>,
    Json(payload): Json<InitiateBookingInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;

    let stay = StayRange::parse(&payload.check_in_date, &payload.check_out_date)?;
    get_row(pool, "users", &payload.user_id, "id").await?;
    let shortlet = get_row(pool, "shortlets", &payload.shortlet_id, "id").await?;

    let booked = booked_dates_from_value(shortlet.as_object().and_then(|o| o.get("booked_dates")));
    if !check_availability(&booked, &stay) {
        return Err(AppError::Conflict(
            "These dates are no longer available.".to_string(),
        ));
    }

    let total_amount = match payload.total_amount {
        Some(amount) if amount > 0.0 => amount,
        _ => number_from_value(shortlet.as_object().and_then(|o| o.get("price_per_day")))
            * stay.nights() as f64,
    };

    let reference = format!("SL-{}", Uuid::new_v4().simple());

    let mut record = Map::new();
    record.insert(
        "shortlet_id".to_string(),
        Value::String(payload.shortlet_id.clone()),
    );
    record.insert("user_id".to_string(), Value::String(payload.user_id.clone()));
    record.insert(
        "check_in_date".to_string(),
        Value::String(stay.check_in.to_string()),
    );
    record.insert(
        "check_out_date".to_string(),
        Value::String(stay.check_out.to_string()),
    );
    record.insert("total_amount".to_string(), json_number(total_amount));
    record.insert(
        "payment_reference".to_string(),
        Value::String(reference.clone()),
    );

    let pending = create_row(pool, "pending_bookings", &record).await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "reference": reference,
            "total_amount": total_amount,
            "pending_booking": pending,
        })),
    ))
}

/// Guest checkout, step 2: the client returns from the gateway and asks us
/// to confirm. The charge is verified against the gateway before anything
/// is committed.
async fn confirm_booking(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmBookingInput>,
) -> AppResult<impl IntoResponse> {
    let pool = db_pool(&state)?;
    let reference = payload.reference.trim();
    if reference.is_empty() {
        return Err(AppError::BadRequest("reference is required.".to_string()));
    }

    // Re-confirming an already-finalized reference is idempotent.
    if let Some(existing) = find_by_reference(pool, "bookings", reference).await? {
        return Ok((axum::http::StatusCode::OK, Json(existing)));
    }

    let Some(pending) = find_by_reference(pool, "pending_bookings", reference).await? else {
        return Err(AppError::NotFound(format!(
            "No pending booking for reference '{reference}'."
        )));
    };

    let charge = paystack::verify_transaction(&state.http_client, &state.config, reference)
        .await
        .map_err(AppError::Dependency)?;

    let expected = number_from_value(pending.as_object().and_then(|o| o.get("total_amount")));
    if charge.amount + 0.01 < expected {
        return Err(AppError::UnprocessableEntity(format!(
            "Charge amount {} does not cover the booking total {expected}.",
            charge.amount
        )));
    }

    let booking = finalize_pending_booking(&state, &pending, "checkout").await?;

    let user_id = value_str(&booking, "user_id");
    if let Ok(user) = get_row(pool, "users", &user_id, "id").await {
        notify(
            pool,
            &state.http_client,
            &state.config,
            Some(&user),
            "booking_confirmed",
            "Booking confirmed",
            &format!(
                "Your stay from {} to {} is confirmed. Reference: {reference}.",
                value_str(&booking, "check_in_date"),
                value_str(&booking, "check_out_date"),
            ),
        )
        .await;
    }

    Ok((axum::http::StatusCode::CREATED, Json(booking)))
}

/// Admin-entered booking (phone/walk-in). No gateway involved; the paid
/// flag is whatever the admin says it is.
async fn create_manual_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateManualBookingInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let stay = StayRange::parse(&payload.check_in_date, &payload.check_out_date)?;
    let user = get_row(pool, "users", &payload.user_id, "id").await?;
    let shortlet = get_row(pool, "shortlets", &payload.shortlet_id, "id").await?;

    let total_amount = match payload.total_amount {
        Some(amount) if amount > 0.0 => amount,
        _ => number_from_value(shortlet.as_object().and_then(|o| o.get("price_per_day")))
            * stay.nights() as f64,
    };
    let reference = non_empty_opt(payload.payment_reference.as_deref())
        .unwrap_or_else(|| format!("MAN-{}", Uuid::new_v4().simple()));

    let booking = commit_confirmed_booking(
        &state,
        BookingDraft {
            shortlet_id: &payload.shortlet_id,
            user_id: &payload.user_id,
            stay,
            total_amount,
            paid: payload.paid,
            channel: "manual",
            payment_reference: &reference,
        },
    )
    .await?;

    notify(
        pool,
        &state.http_client,
        &state.config,
        Some(&user),
        "booking_confirmed",
        "Booking confirmed",
        &format!(
            "Your stay from {} to {} is confirmed.",
            stay.check_in, stay.check_out
        ),
    )
    .await;

    Ok((axum::http::StatusCode::CREATED, Json(booking)))
}

/// confirmed -> cancelled is the only permitted transition; the stay's exact
/// range is released from the shortlet's committed list. A paid cancelled
/// booking keeps `paid = true` (retained payment).
async fn cancel_booking(
    State(state): State<AppState>,
    Path(path): Path<BookingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let booking = get_row(pool, "bookings", &path.booking_id, "id").await?;
    if value_str(&booking, "status") != "confirmed" {
        return Err(AppError::Conflict(
            "Only confirmed bookings can be cancelled.".to_string(),
        ));
    }

    let shortlet_id = value_str(&booking, "shortlet_id");
    let stay = StayRange::parse(
        &value_str(&booking, "check_in_date"),
        &value_str(&booking, "check_out_date"),
    )?;

    let lock = state.shortlet_lock(&shortlet_id);
    let _guard = lock.lock().await;

    let mut tx = begin_tx(pool).await?;

    let mut patch = Map::new();
    patch.insert("status".to_string(), Value::String("cancelled".to_string()));
    let updated = update_row_tx(&mut *tx, "bookings", &path.booking_id, &patch, "id").await?;

    // The shortlet may have been deleted since; the booking update stands
    // on its own in that case.
    if let Ok(shortlet) = get_row(pool, "shortlets", &shortlet_id, "id").await {
        let mut booked =
            booked_dates_from_value(shortlet.as_object().and_then(|o| o.get("booked_dates")));
        release_range(&mut booked, &stay);
        let mut shortlet_patch = Map::new();
        shortlet_patch.insert("booked_dates".to_string(), booked_dates_to_value(&booked));
        update_row_tx(&mut *tx, "shortlets", &shortlet_id, &shortlet_patch, "id").await?;
    }

    commit_tx(tx).await?;

    let user_id = value_str(&updated, "user_id");
    if !user_id.is_empty() {
        if let Ok(user) = get_row(pool, "users", &user_id, "id").await {
            notify(
                pool,
                &state.http_client,
                &state.config,
                Some(&user),
                "booking_cancelled",
                "Booking cancelled",
                &format!(
                    "Your booking from {} to {} has been cancelled.",
                    stay.check_in, stay.check_out
                ),
            )
            .await;
        }
    }

    Ok(Json(updated))
}

// ── Shared finalization ─────────────────────────────────────────────

pub(crate) struct BookingDraft<'a> {
    pub shortlet_id: &'a str,
    pub user_id: &'a str,
    pub stay: StayRange,
    pub total_amount: f64,
    pub paid: bool,
    pub channel: &'a str,
    pub payment_reference: &'a str,
}

/// Turn a pending hold into a confirmed booking. Also used by the webhook
/// path, which passes `channel = "webhook"`.
pub(crate) async fn finalize_pending_booking(
    state: &AppState,
    pending: &Value,
    channel: &str,
) -> AppResult<Value> {
    let pool = db_pool(state)?;

    let shortlet_id = value_str(pending, "shortlet_id");
    let user_id = value_str(pending, "user_id");
    let reference = value_str(pending, "payment_reference");
    let stay = StayRange::parse(
        &value_str(pending, "check_in_date"),
        &value_str(pending, "check_out_date"),
    )?;
    let total_amount = number_from_value(pending.as_object().and_then(|o| o.get("total_amount")));

    let booking = commit_confirmed_booking(
        state,
        BookingDraft {
            shortlet_id: &shortlet_id,
            user_id: &user_id,
            stay,
            total_amount,
            paid: true,
            channel,
            payment_reference: &reference,
        },
    )
    .await?;

    // The hold has served its purpose; removal is best-effort (the sweep
    // catches leftovers).
    let pending_id = value_str(pending, "id");
    if !pending_id.is_empty() {
        if let Err(error) = delete_row(pool, "pending_bookings", &pending_id, "id").await {
            tracing::warn!(pending_id, error = %error, "Could not delete pending booking");
        }
    }

    Ok(booking)
}

/// Availability re-check and commit under the shortlet's lock: the booking
/// insert and the committed-range append land in one transaction, so either
/// both happen or neither does. The unique index on payment_reference stops
/// a double confirmation of the same charge cold.
pub(crate) async fn commit_confirmed_booking(
    state: &AppState,
    draft: BookingDraft<'_>,
) -> AppResult<Value> {
    let pool = db_pool(state)?;

    let lock = state.shortlet_lock(draft.shortlet_id);
    let _guard = lock.lock().await;

    let shortlet = get_row(pool, "shortlets", draft.shortlet_id, "id").await?;
    let mut booked =
        booked_dates_from_value(shortlet.as_object().and_then(|o| o.get("booked_dates")));
    if !check_availability(&booked, &draft.stay) {
        return Err(AppError::Conflict(
            "These dates are no longer available.".to_string(),
        ));
    }
    commit_range(&mut booked, draft.stay);

    let mut record = Map::new();
    record.insert(
        "shortlet_id".to_string(),
        Value::String(draft.shortlet_id.to_string()),
    );
    record.insert("user_id".to_string(), Value::String(draft.user_id.to_string()));
    record.insert(
        "check_in_date".to_string(),
        Value::String(draft.stay.check_in.to_string()),
    );
    record.insert(
        "check_out_date".to_string(),
        Value::String(draft.stay.check_out.to_string()),
    );
    record.insert("total_amount".to_string(), json_number(draft.total_amount));
    record.insert("status".to_string(), Value::String("confirmed".to_string()));
    record.insert("paid".to_string(), Value::Bool(draft.paid));
    record.insert("channel".to_string(), Value::String(draft.channel.to_string()));
    record.insert(
        "payment_reference".to_string(),
        Value::String(draft.payment_reference.to_string()),
    );

    let mut tx = begin_tx(pool).await?;
    let booking = create_row_tx(&mut *tx, "bookings", &record).await?;
    let mut shortlet_patch = Map::new();
    shortlet_patch.insert("booked_dates".to_string(), booked_dates_to_value(&booked));
    update_row_tx(&mut *tx, "shortlets", draft.shortlet_id, &shortlet_patch, "id").await?;
    commit_tx(tx).await?;

    Ok(booking)
}

pub(crate) async fn find_by_reference(
    pool: &sqlx::PgPool,
    table: &str,
    reference: &str,
) -> AppResult<Option<Value>> {
    let mut filters = Map::new();
    filters.insert(
        "payment_reference".to_string(),
        Value::String(reference.to_string()),
    );
    let mut rows = list_rows(pool, table, Some(&filters), 1, 0, "created_at", false).await?;
    Ok(rows.pop())
}

async fn begin_tx(pool: &sqlx::PgPool) -> AppResult<sqlx::Transaction<'_, sqlx::Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Dependency(format!("Could not open transaction: {error}")))
}

async fn commit_tx(tx: sqlx::Transaction<'_, sqlx::Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|error| AppError::Dependency(format!("Could not commit transaction: {error}")))
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

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
}
