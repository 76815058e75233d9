use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_unpaid() -> String {
    "unpaid".to_string()
}
fn default_false() -> bool {
    false
}

// ── Shortlets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateShortletInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price_per_day: f64,
    pub category: Option<String>,
    pub owner_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct UpdateShortletInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_per_day: Option<f64>,
    pub category: Option<String>,
    pub owner_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortletsQuery {
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub category: Option<String>,
    /// Case-insensitive title search.
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: String,
    pub check_out: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortletPath {
    pub shortlet_id: String,
}

// ── Bookings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct InitiateBookingInput {
    pub shortlet_id: String,
    pub user_id: String,
    pub check_in_date: String,
    pub check_out_date: String,
    /// Omitted: computed as nights x price_per_day.
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmBookingInput {
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CreateManualBookingInput {
    pub shortlet_id: String,
    pub user_id: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub total_amount: Option<f64>,
    #[serde(default = "default_false")]
    pub paid: bool,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub paid: Option<bool>,
    pub channel: Option<String>,
    pub shortlet_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingPath {
    pub booking_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentReferencePath {
    pub reference: String,
}

// ── Services ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateServiceInput {
    pub shortlet_id: String,
    pub user_id: String,
    pub requested_by_user_id: String,
    pub booking_id: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default = "default_unpaid")]
    pub payment_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicePaymentStatusInput {
    /// Omitted: flips unpaid -> paid.
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesQuery {
    pub payment_status: Option<String>,
    pub shortlet_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicePath {
    pub service_id: String,
}

// ── Users ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPath {
    pub user_id: String,
}

// ── Notifications ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsQuery {
    pub unread: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationPath {
    pub notification_id: String,
}

// ── Analytics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub mock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub mock: Option<bool>,
    /// `csv` (default) or `xlsx`.
    pub format: Option<String>,
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn clamp_limit_in_range(limit: Option<i64>, min: i64, max: i64) -> i64 {
    limit.unwrap_or(max).clamp(min, max)
}

pub fn serialize_to_map<T>(value: &T) -> serde_json::Map<String, serde_json::Value>
where
    T: serde::Serialize,
{
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

pub fn remove_nulls(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    map.retain(|_, value| !value.is_null());
    map
}

#[cfg(test)]
mod tests {
    use super::{clamp_limit_in_range, remove_nulls, serialize_to_map, UpdateShortletInput};

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(None, 1, 500), 500);
        assert_eq!(clamp_limit_in_range(Some(0), 1, 500), 1);
        assert_eq!(clamp_limit_in_range(Some(42), 1, 500), 42);
        assert_eq!(clamp_limit_in_range(Some(9999), 1, 500), 500);
    }

    #[test]
    fn partial_update_drops_absent_fields() {
        let input = UpdateShortletInput {
            title: Some("Ikoyi Penthouse".to_string()),
            description: None,
            price_per_day: Some(120000.0),
            category: None,
            owner_label: None,
        };
        let map = remove_nulls(serialize_to_map(&input));
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("title"));
        assert!(map.contains_key("price_per_day"));
    }
}
