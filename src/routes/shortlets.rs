use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_admin,
    availability::{booked_dates_from_value, check_availability, StayRange},
    error::{AppError, AppResult},
    repository::table_service::{create_row, delete_row, get_row, list_rows, update_row},
    schemas::{
        clamp_limit_in_range, remove_nulls, serialize_to_map, validate_input, AvailabilityQuery,
        CreateShortletInput, ShortletPath, ShortletsQuery, UpdateShortletInput,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/shortlets",
            axum::routing::get(list_shortlets).post(create_shortlet),
        )
        .route(
            "/shortlets/{shortlet_id}",
            axum::routing::get(get_shortlet)
                .patch(update_shortlet)
                .delete(delete_shortlet),
        )
        .route(
            "/shortlets/{shortlet_id}/availability",
            axum::routing::get(shortlet_availability),
        )
}

/// Public listing/search. When both dates are supplied, shortlets with any
/// committed range overlapping the stay are excluded from the results.
async fn list_shortlets(
    State(state): State<AppState>,
    Query(query): Query<ShortletsQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;

    let stay = match (query.check_in.as_deref(), query.check_out.as_deref()) {
        (Some(check_in), Some(check_out)) => Some(StayRange::parse(check_in, check_out)?),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "Both check_in and check_out are required for a dated search.".to_string(),
            ))
        }
    };

    let mut filters = Map::new();
    if let Some(category) = non_empty_opt(query.category.as_deref()) {
        filters.insert("category".to_string(), Value::String(category));
    }
    if let Some(q) = non_empty_opt(query.q.as_deref()) {
        filters.insert("title__ilike".to_string(), Value::String(format!("%{q}%")));
    }

    let rows = list_rows(
        pool,
        "shortlets",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 500),
        0,
        "created_at",
        false,
    )
    .await?;

    let data: Vec<Value> = match stay {
        None => rows,
        Some(stay) => rows
            .into_iter()
            .filter(|row| {
                let booked =
                    booked_dates_from_value(row.as_object().and_then(|o| o.get("booked_dates")));
                check_availability(&booked, &stay)
            })
            .collect(),
    };

    Ok(Json(json!({ "data": data })))
}

async fn create_shortlet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateShortletInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let mut record = remove_nulls(serialize_to_map(&payload));
    record.insert("booked_dates".to_string(), Value::Array(Vec::new()));

    let created = create_row(pool, "shortlets", &record).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_shortlet(
    State(state): State<AppState>,
    Path(path): Path<ShortletPath>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let record = get_row(pool, "shortlets", &path.shortlet_id, "id").await?;
    Ok(Json(record))
}

async fn update_shortlet(
    State(state): State<AppState>,
    Path(path): Path<ShortletPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateShortletInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    // booked_dates is never writable through this endpoint; the booking
    // flow owns that column.
    let patch = remove_nulls(serialize_to_map(&payload));
    let updated = update_row(pool, "shortlets", &path.shortlet_id, &patch, "id").await?;
    Ok(Json(updated))
}

async fn delete_shortlet(
    State(state): State<AppState>,
    Path(path): Path<ShortletPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let tz = business_tz(&state);
    let today = chrono::Utc::now().with_timezone(&tz).date_naive();

    let mut filters = Map::new();
    filters.insert(
        "shortlet_id".to_string(),
        Value::String(path.shortlet_id.clone()),
    );
    filters.insert(
        "status".to_string(),
        Value::String("confirmed".to_string()),
    );
    filters.insert(
        "check_out_date__gt".to_string(),
        Value::String(today.to_string()),
    );
    let upcoming = list_rows(pool, "bookings", Some(&filters), 1, 0, "created_at", false).await?;
    if !upcoming.is_empty() {
        return Err(AppError::Conflict(
            "Shortlet has upcoming confirmed bookings and cannot be deleted.".to_string(),
        ));
    }

    let deleted = delete_row(pool, "shortlets", &path.shortlet_id, "id").await?;
    Ok(Json(deleted))
}

async fn shortlet_availability(
    State(state): State<AppState>,
    Path(path): Path<ShortletPath>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;

    // Inverted/equal dates are invalid input, not "unavailable".
    let stay = StayRange::parse(&query.check_in, &query.check_out)?;

    let shortlet = get_row(pool, "shortlets", &path.shortlet_id, "id").await?;
    let booked = booked_dates_from_value(shortlet.as_object().and_then(|o| o.get("booked_dates")));

    Ok(Json(json!({
        "shortlet_id": path.shortlet_id,
        "check_in": stay.check_in.to_string(),
        "check_out": stay.check_out.to_string(),
        "available": check_availability(&booked, &stay),
    })))
}

fn business_tz(state: &AppState) -> chrono_tz::Tz {
    state
        .config
        .business_timezone
        .parse::<chrono_tz::Tz>()
        .unwrap_or(chrono_tz::Africa::Lagos)
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
}
