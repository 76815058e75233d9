use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_admin,
    error::{AppError, AppResult},
    repository::table_service::{list_rows, update_row},
    schemas::{clamp_limit_in_range, NotificationPath, NotificationsQuery},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/notifications", axum::routing::get(list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            axum::routing::post(mark_notification_read),
        )
}

async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    if query.unread.unwrap_or(false) {
        filters.insert("read".to_string(), Value::Bool(false));
    }

    let rows = list_rows(
        pool,
        "notifications",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 500),
        0,
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(path): Path<NotificationPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let pool = db_pool(&state)?;

    let mut patch = Map::new();
    patch.insert("read".to_string(), Value::Bool(true));
    let updated = update_row(pool, "notifications", &path.notification_id, &patch, "id").await?;
    Ok(Json(updated))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
