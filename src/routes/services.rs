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
    error::{AppError, AppResult},
    repository::table_service::{create_row, get_row, list_rows, update_row},
    schemas::{
        clamp_limit_in_range, remove_nulls, serialize_to_map, validate_input, CreateServiceInput,
        ServicePath, ServicePaymentStatusInput, ServicesQuery,
    },
    services::notify::notify,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/services",
            axum::routing::get(list_services).post(create_service),
        )
        .route("/services/{service_id}", axum::routing::get(get_service))
        .route(
            "/services/{service_id}/payment-status",
            axum::routing::patch(update_payment_status),
        )
}

async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServicesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if let Some(payment_status) = non_empty_opt(query.payment_status.as_deref()) {
        filters.insert("payment_status".to_string(), Value::String(payment_status));
    }
    if let Some(shortlet_id) = non_empty_opt(query.shortlet_id.as_deref()) {
        filters.insert("shortlet_id".to_string(), Value::String(shortlet_id));
    }
    if let Some(user_id) = non_empty_opt(query.user_id.as_deref()) {
        filters.insert("user_id".to_string(), Value::String(user_id));
    }

    let rows = list_rows(
        pool,
        "services",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateServiceInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    if payload.payment_status != "paid" && payload.payment_status != "unpaid" {
        return Err(AppError::UnprocessableEntity(
            "payment_status must be 'paid' or 'unpaid'.".to_string(),
        ));
    }

    // Referenced rows must exist before we attach money to them.
    get_row(pool, "shortlets", &payload.shortlet_id, "id").await?;
    let user = get_row(pool, "users", &payload.user_id, "id").await?;

    let mut record = remove_nulls(serialize_to_map(&payload));
    record.insert(
        "payment_reference".to_string(),
        Value::String(format!("SV-{}", Uuid::new_v4().simple())),
    );

    let created = create_row(pool, "services", &record).await?;

    notify(
        pool,
        &state.http_client,
        &state.config,
        Some(&user),
        "service_created",
        "Service request added",
        &format!("A service was added to your stay: {}.", payload.description),
    )
    .await;

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_service(
    State(state): State<AppState>,
    Path(path): Path<ServicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let record = get_row(pool, "services", &path.service_id, "id").await?;
    Ok(Json(record))
}

/// Manual payment toggle. The flip is one-way: unpaid services become paid,
/// paid services stay paid.
async fn update_payment_status(
    State(state): State<AppState>,
    Path(path): Path<ServicePath>,
    headers: HeaderMap,
    Json(payload): Json<ServicePaymentStatusInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let requested = payload
        .payment_status
        .as_deref()
        .map(str::trim)
        .unwrap_or("paid");
    if requested != "paid" {
        return Err(AppError::UnprocessableEntity(
            "Services can only transition to 'paid'.".to_string(),
        ));
    }

    let record = get_row(pool, "services", &path.service_id, "id").await?;
    if value_str(&record, "payment_status") == "paid" {
        return Ok(Json(record));
    }

    let mut patch = Map::new();
    patch.insert(
        "payment_status".to_string(),
        Value::String("paid".to_string()),
    );
    let updated = update_row(pool, "services", &path.service_id, &patch, "id").await?;

    let user_id = value_str(&updated, "user_id");
    if !user_id.is_empty() {
        if let Ok(user) = get_row(pool, "users", &user_id, "id").await {
            notify(
                pool,
                &state.http_client,
                &state.config,
                Some(&user),
                "service_paid",
                "Service payment received",
                "Your service payment has been confirmed.",
            )
            .await;
        }
    }

    Ok(Json(updated))
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

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
}
