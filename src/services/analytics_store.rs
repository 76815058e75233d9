//! Live [`AnalyticsSource`] backed by the document store.
//!
//! This is the normalization boundary: rows read from the store may carry
//! string-typed amounts or missing fields, and whatever tolerance is needed
//! is applied here, once, before records reach the aggregation engine.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::repository::table_service::list_rows;
use crate::services::analytics::{
    AnalyticsSource, BookingRecord, BookingStatus, ReportRange, ServiceRecord, UserContact,
    UserRecord,
};

pub struct StoreSource {
    pool: PgPool,
}

impl StoreSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FETCH_LIMIT: i64 = 10000;

#[async_trait]
impl AnalyticsSource for StoreSource {
    async fn fetch_bookings(&self, range: &ReportRange) -> AppResult<Vec<BookingRecord>> {
        let rows = list_rows(
            &self.pool,
            "bookings",
            Some(&created_at_filters(range)),
            FETCH_LIMIT,
            0,
            "created_at",
            true,
        )
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let Some(created_at) = datetime_or_none(field(row, "created_at")) else {
                    tracing::warn!(
                        booking_id = %value_str(row, "id"),
                        "Skipping booking without a created_at timestamp"
                    );
                    return None;
                };
                Some(BookingRecord {
                    id: value_str(row, "id"),
                    shortlet_id: value_str_opt(row, "shortlet_id"),
                    user_id: value_str_opt(row, "user_id"),
                    check_in_date: date_or_none(field(row, "check_in_date")),
                    check_out_date: date_or_none(field(row, "check_out_date")),
                    total_amount: number_from_value(field(row, "total_amount")),
                    status: if value_str(row, "status") == "cancelled" {
                        BookingStatus::Cancelled
                    } else {
                        BookingStatus::Confirmed
                    },
                    paid: bool_from_value(field(row, "paid")),
                    channel: {
                        let channel = value_str(row, "channel");
                        if channel.is_empty() {
                            "manual".to_string()
                        } else {
                            channel
                        }
                    },
                    created_at,
                })
            })
            .collect())
    }

    async fn fetch_services(&self, range: &ReportRange) -> AppResult<Vec<ServiceRecord>> {
        let rows = list_rows(
            &self.pool,
            "services",
            Some(&created_at_filters(range)),
            FETCH_LIMIT,
            0,
            "created_at",
            true,
        )
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let created_at = datetime_or_none(field(row, "created_at"))?;
                Some(ServiceRecord {
                    id: value_str(row, "id"),
                    shortlet_id: value_str_opt(row, "shortlet_id"),
                    user_id: value_str_opt(row, "user_id"),
                    price: number_from_value(field(row, "price")),
                    paid: value_str(row, "payment_status") == "paid",
                    created_at,
                })
            })
            .collect())
    }

    async fn fetch_users(&self, range: &ReportRange) -> AppResult<Vec<UserRecord>> {
        let rows = list_rows(
            &self.pool,
            "users",
            Some(&created_at_filters(range)),
            FETCH_LIMIT,
            0,
            "created_at",
            true,
        )
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let created_at = datetime_or_none(field(row, "created_at"))?;
                Some(UserRecord {
                    id: value_str(row, "id"),
                    full_name: value_str(row, "full_name"),
                    email: value_str(row, "email"),
                    created_at,
                })
            })
            .collect())
    }

    async fn shortlet_titles(&self, ids: &[String]) -> AppResult<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut filters = Map::new();
        filters.insert(
            "id__in".to_string(),
            Value::Array(ids.iter().cloned().map(Value::String).collect()),
        );
        let rows = list_rows(
            &self.pool,
            "shortlets",
            Some(&filters),
            ids.len().max(1) as i64,
            0,
            "created_at",
            true,
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| (value_str(row, "id"), value_str(row, "title")))
            .filter(|(id, _)| !id.is_empty())
            .collect())
    }

    async fn user_contacts(&self, ids: &[String]) -> AppResult<HashMap<String, UserContact>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut filters = Map::new();
        filters.insert(
            "id__in".to_string(),
            Value::Array(ids.iter().cloned().map(Value::String).collect()),
        );
        let rows = list_rows(
            &self.pool,
            "users",
            Some(&filters),
            ids.len().max(1) as i64,
            0,
            "created_at",
            true,
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    value_str(row, "id"),
                    UserContact {
                        full_name: value_str(row, "full_name"),
                        email: value_str(row, "email"),
                    },
                )
            })
            .filter(|(id, _)| !id.is_empty())
            .collect())
    }
}

fn created_at_filters(range: &ReportRange) -> Map<String, Value> {
    let mut filters = Map::new();
    filters.insert(
        "created_at__gte".to_string(),
        Value::String(range.start.to_rfc3339()),
    );
    filters.insert(
        "created_at__lte".to_string(),
        Value::String(range.end.to_rfc3339()),
    );
    filters
}

fn field<'a>(row: &'a Value, key: &str) -> Option<&'a Value> {
    row.as_object().and_then(|obj| obj.get(key))
}

fn value_str(row: &Value, key: &str) -> String {
    value_str_opt(row, key).unwrap_or_default()
}

fn value_str_opt(row: &Value, key: &str) -> Option<String> {
    field(row, key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn number_from_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn bool_from_value(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => {
            let lower = text.trim().to_ascii_lowercase();
            lower == "true" || lower == "t" || lower == "1"
        }
        _ => false,
    }
}

fn date_or_none(value: Option<&Value>) -> Option<NaiveDate> {
    let text = value.and_then(Value::as_str).map(str::trim)?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn datetime_or_none(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|item| !item.is_empty())?;
    let mut normalized = text.to_string();
    if normalized.ends_with('Z') {
        normalized.truncate(normalized.len().saturating_sub(1));
        normalized.push_str("+00:00");
    }
    // Postgres timestamps serialize without an offset; treat those as UTC.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::{bool_from_value, datetime_or_none, number_from_value};
    use serde_json::json;

    #[test]
    fn normalizes_amounts_from_numbers_and_strings() {
        assert_eq!(number_from_value(Some(&json!(75000))), 75000.0);
        assert_eq!(number_from_value(Some(&json!("36000"))), 36000.0);
        assert_eq!(number_from_value(Some(&json!("  120.5 "))), 120.5);
        assert_eq!(number_from_value(Some(&json!(null))), 0.0);
        assert_eq!(number_from_value(None), 0.0);
    }

    #[test]
    fn normalizes_paid_flags() {
        assert!(bool_from_value(Some(&json!(true))));
        assert!(bool_from_value(Some(&json!("true"))));
        assert!(bool_from_value(Some(&json!("1"))));
        assert!(!bool_from_value(Some(&json!(false))));
        assert!(!bool_from_value(Some(&json!("no"))));
        assert!(!bool_from_value(None));
    }

    #[test]
    fn parses_store_timestamps() {
        assert!(datetime_or_none(Some(&json!("2025-01-05T09:30:00Z"))).is_some());
        assert!(datetime_or_none(Some(&json!("2025-01-05T09:30:00+01:00"))).is_some());
        assert!(datetime_or_none(Some(&json!("2025-01-05T09:30:00.123456"))).is_some());
        assert!(datetime_or_none(Some(&json!("not a date"))).is_none());
        assert!(datetime_or_none(None).is_none());
    }
}
