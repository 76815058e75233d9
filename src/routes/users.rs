use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_admin,
    error::{AppError, AppResult},
    repository::table_service::{create_row, get_row, list_rows},
    schemas::{clamp_limit_in_range, serialize_to_map, validate_input, CreateUserInput, UserPath, UsersQuery},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/users", axum::routing::get(list_users).post(create_user))
        .route("/users/{user_id}", axum::routing::get(get_user))
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if let Some(q) = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        // Name search; email lookups go through the exact filter below.
        if q.contains('@') {
            filters.insert("email".to_string(), Value::String(q.to_string()));
        } else {
            filters.insert(
                "full_name__ilike".to_string(),
                Value::String(format!("%{q}%")),
            );
        }
    }

    let rows = list_rows(
        pool,
        "users",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    // Duplicate emails surface as a unique-constraint Conflict from the store.
    let record = serialize_to_map(&payload);
    let created = create_row(pool, "users", &record).await?;
    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(path): Path<UserPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;
    let record = get_row(pool, "users", &path.user_id, "id").await?;
    Ok(Json(record))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
