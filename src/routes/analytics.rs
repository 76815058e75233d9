use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;

use crate::{
    auth::require_admin,
    availability::parse_date,
    error::{AppError, AppResult},
    schemas::{AnalyticsQuery, ExportQuery},
    services::{
        analytics::{build_dashboard, DashboardPayload, ReportRange},
        analytics_store::StoreSource,
        export::{dashboard_to_csv, dashboard_to_xlsx},
        sample_data::SampleSource,
    },
    state::AppState,
};

const DEFAULT_WINDOW_DAYS: i64 = 30;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/analytics/dashboard",
            axum::routing::get(analytics_dashboard),
        )
        .route("/analytics/export", axum::routing::get(analytics_export))
}

async fn analytics_dashboard(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;

    let tz = business_tz(&state);
    let range = resolve_range(query.start.as_deref(), query.end.as_deref(), tz)?;
    let mock = query.mock.unwrap_or(false);

    if mock {
        let payload = build_dashboard(&SampleSource::new(tz), &range, tz).await?;
        return Ok(Json(to_json(&payload)?));
    }

    let cache_key = format!("{}|{}", range.start_date, range.end_date);
    if let Some(cached) = state.analytics_cache.get(&cache_key).await {
        return Ok(Json(cached));
    }

    let (payload, from_live) = build_live_or_fallback(&state, &range, tz).await?;
    let body = to_json(&payload)?;
    if from_live {
        // Fallback payloads are never cached, so a recovered store is
        // picked up on the next request.
        state.analytics_cache.insert(cache_key, body.clone()).await;
    }
    Ok(Json(body))
}

async fn analytics_export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let tz = business_tz(&state);
    let range = resolve_range(query.start.as_deref(), query.end.as_deref(), tz)?;

    let payload = if query.mock.unwrap_or(false) {
        build_dashboard(&SampleSource::new(tz), &range, tz).await?
    } else {
        build_live_or_fallback(&state, &range, tz).await?.0
    };

    let format = query
        .format
        .as_deref()
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "csv".to_string());
    let file_stem = format!("analytics-{}-{}", range.start_date, range.end_date);

    match format.as_str() {
        "csv" => {
            let body = dashboard_to_csv(&payload);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_stem}.csv\""),
                    ),
                ],
                body.into_bytes(),
            ))
        }
        "xlsx" => {
            let body = dashboard_to_xlsx(&payload)?;
            Ok((
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                            .to_string(),
                    ),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_stem}.xlsx\""),
                    ),
                ],
                body,
            ))
        }
        other => Err(AppError::BadRequest(format!(
            "Unsupported export format '{other}' (expected csv or xlsx)."
        ))),
    }
}

/// Live aggregation with the degrade-gracefully policy: a failing store is
/// logged as an error and the caller receives sample data with a 200.
/// Returns (payload, came_from_live_store).
async fn build_live_or_fallback(
    state: &AppState,
    range: &ReportRange,
    tz: Tz,
) -> AppResult<(DashboardPayload, bool)> {
    let live = match state.db_pool.as_ref() {
        Some(pool) => build_dashboard(&StoreSource::new(pool.clone()), range, tz).await,
        None => Err(AppError::Dependency(
            "Database is not configured.".to_string(),
        )),
    };

    match live {
        Ok(payload) => Ok((payload, true)),
        Err(error) => {
            tracing::error!(error = %error, "Live analytics aggregation failed; serving sample data");
            let payload = build_dashboard(&SampleSource::new(tz), range, tz).await?;
            Ok((payload, false))
        }
    }
}

/// Both dates, or neither (trailing 30-day window ending today). A single
/// date or a malformed one is a validation error, never a silent default.
fn resolve_range(start: Option<&str>, end: Option<&str>, tz: Tz) -> AppResult<ReportRange> {
    match (trimmed(start), trimmed(end)) {
        (Some(start), Some(end)) => {
            ReportRange::from_dates(parse_date(start)?, parse_date(end)?, tz)
        }
        (None, None) => {
            let today = Utc::now().with_timezone(&tz).date_naive();
            ReportRange::trailing_days(today, DEFAULT_WINDOW_DAYS, tz)
        }
        _ => Err(AppError::BadRequest(
            "Provide both start and end, or neither.".to_string(),
        )),
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|item| !item.is_empty())
}

fn to_json(payload: &DashboardPayload) -> AppResult<Value> {
    serde_json::to_value(payload)
        .map_err(|error| AppError::Internal(format!("Could not serialize payload: {error}")))
}

fn business_tz(state: &AppState) -> Tz {
    state
        .config
        .business_timezone
        .parse::<Tz>()
        .unwrap_or(chrono_tz::Africa::Lagos)
}

#[cfg(test)]
mod tests {
    use super::resolve_range;

    const TZ: chrono_tz::Tz = chrono_tz::Africa::Lagos;

    #[test]
    fn rejects_half_specified_and_malformed_ranges() {
        assert!(resolve_range(Some("2025-01-01"), None, TZ).is_err());
        assert!(resolve_range(None, Some("2025-01-31"), TZ).is_err());
        assert!(resolve_range(Some("not-a-date"), Some("2025-01-31"), TZ).is_err());
        assert!(resolve_range(Some("2025-02-01"), Some("2025-01-01"), TZ).is_err());
    }

    #[test]
    fn accepts_a_full_range() {
        let range = resolve_range(Some("2025-01-15"), Some("2025-03-10"), TZ).unwrap();
        assert_eq!(range.start_date.to_string(), "2025-01-15");
        assert_eq!(range.end_date.to_string(), "2025-03-10");
    }

    #[test]
    fn defaults_to_a_trailing_window() {
        let range = resolve_range(None, None, TZ).unwrap();
        assert_eq!((range.end_date - range.start_date).num_days(), 29);
    }
}
