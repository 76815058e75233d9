//! Analytics aggregation over bookings, services and users.
//!
//! One engine serves the dashboard, the export surface and the sample-data
//! mode: everything is computed from canonical records obtained through the
//! [`AnalyticsSource`] trait, so the live store and the fixture produce the
//! same payload shape by construction.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{AppError, AppResult};

// ── Canonical records ───────────────────────────────────────────────
//
// The one internal schema for analytics. Tolerance for alternate row shapes
// lives in the source implementations, never here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct BookingRecord {
    pub id: String,
    pub shortlet_id: Option<String>,
    pub user_id: Option<String>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub paid: bool,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub id: String,
    pub shortlet_id: Option<String>,
    pub user_id: Option<String>,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UserContact {
    pub full_name: String,
    pub email: String,
}

// ── Query range ─────────────────────────────────────────────────────

/// Inclusive report boundary. `start`/`end` are the exact instants used for
/// store filters (start of first day, 23:59:59.999 of last day, business
/// timezone); `start_date`/`end_date` drive bucketing.
#[derive(Debug, Clone)]
pub struct ReportRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ReportRange {
    pub fn from_dates(start: NaiveDate, end: NaiveDate, tz: Tz) -> AppResult<Self> {
        if end < start {
            return Err(AppError::BadRequest(
                "End date must not be before start date.".to_string(),
            ));
        }
        let start_instant = tz
            .from_local_datetime(&start.and_hms_opt(0, 0, 0).expect("valid midnight"))
            .earliest()
            .ok_or_else(|| AppError::BadRequest("Invalid start date.".to_string()))?;
        let end_instant = tz
            .from_local_datetime(
                &end.and_hms_milli_opt(23, 59, 59, 999)
                    .expect("valid end of day"),
            )
            .latest()
            .ok_or_else(|| AppError::BadRequest("Invalid end date.".to_string()))?;
        Ok(Self {
            start: start_instant.with_timezone(&Utc),
            end: end_instant.with_timezone(&Utc),
            start_date: start,
            end_date: end,
        })
    }

    /// Trailing window of `days` ending on `today`, the default when the
    /// caller supplies no dates.
    pub fn trailing_days(today: NaiveDate, days: i64, tz: Tz) -> AppResult<Self> {
        let start = today - chrono::Duration::days(days.max(1) - 1);
        Self::from_dates(start, today, tz)
    }
}

// ── Data access ─────────────────────────────────────────────────────

#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch_bookings(&self, range: &ReportRange) -> AppResult<Vec<BookingRecord>>;
    async fn fetch_services(&self, range: &ReportRange) -> AppResult<Vec<ServiceRecord>>;
    async fn fetch_users(&self, range: &ReportRange) -> AppResult<Vec<UserRecord>>;
    /// Batch title lookup for ranking hydration — one call, never per-item.
    async fn shortlet_titles(&self, ids: &[String]) -> AppResult<HashMap<String, String>>;
    async fn user_contacts(&self, ids: &[String]) -> AppResult<HashMap<String, UserContact>>;
}

// ── Payload (export contract — field names are load-bearing) ────────

#[derive(Debug, Clone, Serialize)]
pub struct RangeEcho {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenuePoint {
    pub label: String,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsBlock {
    pub total: i64,
    pub cancelled: i64,
    pub paid: i64,
    pub unpaid: i64,
    pub source_breakdown: BTreeMap<String, i64>,
    pub bookings_trend: Vec<TrendPoint>,
    pub cancellation_rate: f64,
    pub avg_length_of_stay: Option<f64>,
    pub avg_booking_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueBlock {
    pub total: f64,
    pub monthly: Vec<RevenuePoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSpendEntry {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub bookings_count: i64,
    pub total_spend: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersBlock {
    pub total: i64,
    pub monthly: Vec<TrendPoint>,
    pub repeat_customer_rate: f64,
    pub top_customers: Vec<CustomerSpendEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesBlock {
    pub total: i64,
    pub paid: i64,
    pub revenue: f64,
    pub avg_service_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortletRevenueEntry {
    pub shortlet_id: String,
    pub title: String,
    pub bookings_count: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    pub range: RangeEcho,
    pub total_booking_revenue: f64,
    pub total_service_revenue: f64,
    pub total_revenue: f64,
    pub today_booking_revenue: f64,
    pub today_service_revenue: f64,
    pub today_revenue: f64,
    pub current_bookings: i64,
    pub bookings: BookingsBlock,
    pub revenue: RevenueBlock,
    pub users: UsersBlock,
    pub services: ServicesBlock,
    pub top_shortlets_by_revenue: Vec<ShortletRevenueEntry>,
}

const TOP_N: usize = 5;

/// Fetch everything the dashboard needs from `source` and aggregate.
pub async fn build_dashboard<S>(source: &S, range: &ReportRange, tz: Tz) -> AppResult<DashboardPayload>
where
    S: AnalyticsSource + ?Sized,
{
    let bookings = source.fetch_bookings(range).await?;
    let services = source.fetch_services(range).await?;
    let users = source.fetch_users(range).await?;

    let shortlet_ids = distinct_keys(
        bookings
            .iter()
            .filter(|b| b.paid)
            .filter_map(|b| b.shortlet_id.as_deref())
            .chain(
                services
                    .iter()
                    .filter(|s| s.paid)
                    .filter_map(|s| s.shortlet_id.as_deref()),
            ),
    );
    let titles = source.shortlet_titles(&shortlet_ids).await?;

    let customer_ids = distinct_keys(
        bookings
            .iter()
            .filter(|b| b.paid)
            .filter_map(|b| b.user_id.as_deref())
            .chain(
                services
                    .iter()
                    .filter(|s| s.paid)
                    .filter_map(|s| s.user_id.as_deref()),
            ),
    );
    let contacts = source.user_contacts(&customer_ids).await?;

    let today = Utc::now().with_timezone(&tz).date_naive();
    Ok(assemble_dashboard(
        range, tz, today, &bookings, &services, &users, &titles, &contacts,
    ))
}

/// Pure aggregation core. `today` is injected so tests pin the clock.
#[allow(clippy::too_many_arguments)]
pub fn assemble_dashboard(
    range: &ReportRange,
    tz: Tz,
    today: NaiveDate,
    bookings: &[BookingRecord],
    services: &[ServiceRecord],
    users: &[UserRecord],
    titles: &HashMap<String, String>,
    contacts: &HashMap<String, UserContact>,
) -> DashboardPayload {
    let local_date = |instant: &DateTime<Utc>| instant.with_timezone(&tz).date_naive();
    let in_range =
        |date: NaiveDate| date >= range.start_date && date <= range.end_date;

    // Sources already filter on created_at, but the engine re-scopes so a
    // permissive source cannot leak records outside the boundary.
    let bookings: Vec<&BookingRecord> = bookings
        .iter()
        .filter(|b| in_range(local_date(&b.created_at)))
        .collect();
    let services: Vec<&ServiceRecord> = services
        .iter()
        .filter(|s| in_range(local_date(&s.created_at)))
        .collect();
    let users: Vec<&UserRecord> = users
        .iter()
        .filter(|u| in_range(local_date(&u.created_at)))
        .collect();

    // ── Month buckets with clamped sub-ranges ──
    let buckets = month_buckets(range.start_date, range.end_date);
    let mut bookings_trend = Vec::with_capacity(buckets.len());
    let mut revenue_monthly = Vec::with_capacity(buckets.len());
    let mut users_monthly = Vec::with_capacity(buckets.len());

    for bucket in &buckets {
        let in_bucket = |date: NaiveDate| date >= bucket.actual_start && date <= bucket.actual_end;

        let bucket_bookings: Vec<&&BookingRecord> = bookings
            .iter()
            .filter(|b| in_bucket(local_date(&b.created_at)))
            .collect();
        let booking_revenue: f64 = bucket_bookings
            .iter()
            .filter(|b| b.paid)
            .map(|b| b.total_amount)
            .sum();
        let service_revenue: f64 = services
            .iter()
            .filter(|s| s.paid && in_bucket(local_date(&s.created_at)))
            .map(|s| s.price)
            .sum();

        bookings_trend.push(TrendPoint {
            label: bucket.label.clone(),
            count: bucket_bookings.len() as i64,
        });
        revenue_monthly.push(RevenuePoint {
            label: bucket.label.clone(),
            total: round2(booking_revenue + service_revenue),
            count: bucket_bookings.len() as i64,
        });
        users_monthly.push(TrendPoint {
            label: bucket.label.clone(),
            count: users
                .iter()
                .filter(|u| in_bucket(local_date(&u.created_at)))
                .count() as i64,
        });
    }

    // ── Range-scoped scalars ──
    let total_booking_revenue: f64 = bookings
        .iter()
        .filter(|b| b.paid)
        .map(|b| b.total_amount)
        .sum();
    let total_service_revenue: f64 = services.iter().filter(|s| s.paid).map(|s| s.price).sum();

    let today_in_range = in_range(today);
    let today_booking_revenue: f64 = if today_in_range {
        bookings
            .iter()
            .filter(|b| b.paid && local_date(&b.created_at) == today)
            .map(|b| b.total_amount)
            .sum()
    } else {
        0.0
    };
    let today_service_revenue: f64 = if today_in_range {
        services
            .iter()
            .filter(|s| s.paid && local_date(&s.created_at) == today)
            .map(|s| s.price)
            .sum()
    } else {
        0.0
    };

    let current_bookings = if today_in_range {
        bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .filter(|b| match (b.check_in_date, b.check_out_date) {
                (Some(check_in), Some(check_out)) => check_in <= today && today < check_out,
                _ => false,
            })
            .count() as i64
    } else {
        0
    };

    let paid_count = bookings.iter().filter(|b| b.paid).count() as i64;
    let cancelled_count = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Cancelled)
        .count() as i64;
    let confirmed_count = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
        .count() as i64;

    let cancellation_rate = if confirmed_count + cancelled_count > 0 {
        round2(cancelled_count as f64 / (confirmed_count + cancelled_count) as f64 * 100.0)
    } else {
        0.0
    };

    let paid_amounts: Vec<f64> = bookings
        .iter()
        .filter(|b| b.paid)
        .map(|b| b.total_amount)
        .collect();
    let avg_booking_value = mean(&paid_amounts).map(round2);

    let stay_lengths: Vec<f64> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
        .filter_map(|b| match (b.check_in_date, b.check_out_date) {
            (Some(check_in), Some(check_out)) => Some((check_out - check_in).num_days() as f64),
            _ => None,
        })
        .collect();
    let avg_length_of_stay = mean(&stay_lengths).map(round2);

    let mut source_breakdown: BTreeMap<String, i64> = BTreeMap::new();
    for booking in &bookings {
        *source_breakdown.entry(booking.channel.clone()).or_insert(0) += 1;
    }

    // Repeat customers: distinct users with more than one confirmed booking
    // over distinct users with at least one, both within the range.
    let mut confirmed_per_user: HashMap<&str, i64> = HashMap::new();
    for booking in &bookings {
        if booking.status != BookingStatus::Confirmed {
            continue;
        }
        let Some(user_id) = booking.user_id.as_deref() else {
            continue;
        };
        *confirmed_per_user.entry(user_id).or_insert(0) += 1;
    }
    let repeat_customer_rate = if confirmed_per_user.is_empty() {
        0.0
    } else {
        let repeat = confirmed_per_user.values().filter(|count| **count > 1).count();
        round2(repeat as f64 / confirmed_per_user.len() as f64 * 100.0)
    };

    // ── Services block ──
    let paid_service_prices: Vec<f64> = services
        .iter()
        .filter(|s| s.paid)
        .map(|s| s.price)
        .collect();
    let services_block = ServicesBlock {
        total: services.len() as i64,
        paid: paid_service_prices.len() as i64,
        revenue: round2(total_service_revenue),
        avg_service_price: mean(&paid_service_prices).map(round2),
    };

    // ── Rankings ──
    let top_shortlets = rank_shortlets(&bookings, &services, titles);
    let top_customers = rank_customers(&bookings, &services, contacts);

    DashboardPayload {
        range: RangeEcho {
            start: range.start.to_rfc3339(),
            end: range.end.to_rfc3339(),
        },
        total_booking_revenue: round2(total_booking_revenue),
        total_service_revenue: round2(total_service_revenue),
        total_revenue: round2(total_booking_revenue + total_service_revenue),
        today_booking_revenue: round2(today_booking_revenue),
        today_service_revenue: round2(today_service_revenue),
        today_revenue: round2(today_booking_revenue + today_service_revenue),
        current_bookings,
        bookings: BookingsBlock {
            total: bookings.len() as i64,
            cancelled: cancelled_count,
            paid: paid_count,
            unpaid: bookings.len() as i64 - paid_count,
            source_breakdown,
            bookings_trend,
            cancellation_rate,
            avg_length_of_stay,
            avg_booking_value,
        },
        revenue: RevenueBlock {
            total: round2(total_booking_revenue + total_service_revenue),
            monthly: revenue_monthly,
        },
        users: UsersBlock {
            total: users.len() as i64,
            monthly: users_monthly,
            repeat_customer_rate,
            top_customers,
        },
        services: services_block,
        top_shortlets_by_revenue: top_shortlets,
    }
}

// ── Month enumeration ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBucket {
    pub label: String,
    /// Clamped sub-range: `[max(month_start, range_start),
    /// min(month_end, range_end)]`, both inclusive.
    pub actual_start: NaiveDate,
    pub actual_end: NaiveDate,
}

/// Calendar months intersecting `[start, end]`, partial months clamped.
pub fn month_buckets(start: NaiveDate, end: NaiveDate) -> Vec<MonthBucket> {
    let mut buckets = Vec::new();
    if end < start {
        return buckets;
    }

    let mut year = start.year();
    let mut month = start.month();
    loop {
        let month_start = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let month_end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .expect("valid next month start")
            - chrono::Duration::days(1);

        buckets.push(MonthBucket {
            label: format!("{year:04}-{month:02}"),
            actual_start: month_start.max(start),
            actual_end: month_end.min(end),
        });

        if (next_year, next_month) > (end.year(), end.month()) {
            break;
        }
        year = next_year;
        month = next_month;
    }
    buckets
}

// ── Rankings ────────────────────────────────────────────────────────

struct RevenueAccumulator {
    key: String,
    booking_revenue: f64,
    service_revenue: f64,
    bookings_count: i64,
}

/// Group paid bookings and paid services by shortlet, rank by combined
/// revenue. Entries with a missing grouping key are excluded; exact ties
/// keep insertion order (stable sort).
fn rank_shortlets(
    bookings: &[&BookingRecord],
    services: &[&ServiceRecord],
    titles: &HashMap<String, String>,
) -> Vec<ShortletRevenueEntry> {
    let mut accumulators: Vec<RevenueAccumulator> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for booking in bookings.iter().filter(|b| b.paid) {
        let Some(shortlet_id) = booking.shortlet_id.as_deref() else {
            continue;
        };
        let slot = entry_slot(&mut accumulators, &mut index, shortlet_id);
        accumulators[slot].booking_revenue += booking.total_amount;
        accumulators[slot].bookings_count += 1;
    }
    for service in services.iter().filter(|s| s.paid) {
        let Some(shortlet_id) = service.shortlet_id.as_deref() else {
            continue;
        };
        let slot = entry_slot(&mut accumulators, &mut index, shortlet_id);
        accumulators[slot].service_revenue += service.price;
    }

    accumulators.sort_by(|left, right| {
        let left_total = left.booking_revenue + left.service_revenue;
        let right_total = right.booking_revenue + right.service_revenue;
        right_total.total_cmp(&left_total)
    });

    accumulators
        .into_iter()
        .take(TOP_N)
        .map(|acc| ShortletRevenueEntry {
            title: titles
                .get(&acc.key)
                .cloned()
                .unwrap_or_else(|| "Unknown shortlet".to_string()),
            shortlet_id: acc.key,
            bookings_count: acc.bookings_count,
            revenue: round2(acc.booking_revenue + acc.service_revenue),
        })
        .collect()
}

fn rank_customers(
    bookings: &[&BookingRecord],
    services: &[&ServiceRecord],
    contacts: &HashMap<String, UserContact>,
) -> Vec<CustomerSpendEntry> {
    let mut accumulators: Vec<RevenueAccumulator> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for booking in bookings.iter().filter(|b| b.paid) {
        let Some(user_id) = booking.user_id.as_deref() else {
            continue;
        };
        let slot = entry_slot(&mut accumulators, &mut index, user_id);
        accumulators[slot].booking_revenue += booking.total_amount;
        accumulators[slot].bookings_count += 1;
    }
    for service in services.iter().filter(|s| s.paid) {
        let Some(user_id) = service.user_id.as_deref() else {
            continue;
        };
        let slot = entry_slot(&mut accumulators, &mut index, user_id);
        accumulators[slot].service_revenue += service.price;
    }

    accumulators.sort_by(|left, right| {
        let left_total = left.booking_revenue + left.service_revenue;
        let right_total = right.booking_revenue + right.service_revenue;
        right_total.total_cmp(&left_total)
    });

    accumulators
        .into_iter()
        .take(TOP_N)
        .map(|acc| {
            let contact = contacts.get(&acc.key).cloned().unwrap_or_default();
            CustomerSpendEntry {
                user_id: acc.key,
                name: contact.full_name,
                email: contact.email,
                bookings_count: acc.bookings_count,
                total_spend: round2(acc.booking_revenue + acc.service_revenue),
            }
        })
        .collect()
}

fn entry_slot(
    accumulators: &mut Vec<RevenueAccumulator>,
    index: &mut HashMap<String, usize>,
    key: &str,
) -> usize {
    if let Some(slot) = index.get(key) {
        return *slot;
    }
    accumulators.push(RevenueAccumulator {
        key: key.to_string(),
        booking_revenue: 0.0,
        service_revenue: 0.0,
        bookings_count: 0,
    });
    let slot = accumulators.len() - 1;
    index.insert(key.to_string(), slot);
    slot
}

// ── Small helpers ───────────────────────────────────────────────────

fn distinct_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for key in keys {
        if seen.insert(key) {
            out.push(key.to_string());
        }
    }
    out
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TZ: Tz = chrono_tz::Africa::Lagos;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at_noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        TZ.with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn booking(
        id: &str,
        shortlet: Option<&str>,
        user: Option<&str>,
        amount: f64,
        status: BookingStatus,
        paid: bool,
        created: DateTime<Utc>,
    ) -> BookingRecord {
        BookingRecord {
            id: id.to_string(),
            shortlet_id: shortlet.map(ToOwned::to_owned),
            user_id: user.map(ToOwned::to_owned),
            check_in_date: None,
            check_out_date: None,
            total_amount: amount,
            status,
            paid,
            channel: "checkout".to_string(),
            created_at: created,
        }
    }

    fn range(from: (i32, u32, u32), to: (i32, u32, u32)) -> ReportRange {
        ReportRange::from_dates(
            date(from.0, from.1, from.2),
            date(to.0, to.1, to.2),
            TZ,
        )
        .unwrap()
    }

    fn assemble(
        report_range: &ReportRange,
        bookings: &[BookingRecord],
        services: &[ServiceRecord],
        users: &[UserRecord],
    ) -> DashboardPayload {
        assemble_dashboard(
            report_range,
            TZ,
            date(2025, 6, 15), // fixed "today" outside most fixtures
            bookings,
            services,
            users,
            &HashMap::new(),
            &HashMap::new(),
        )
    }

    #[test]
    fn buckets_clamp_partial_months() {
        let buckets = month_buckets(date(2025, 1, 15), date(2025, 3, 10));
        assert_eq!(buckets.len(), 3);

        assert_eq!(buckets[0].label, "2025-01");
        assert_eq!(buckets[0].actual_start, date(2025, 1, 15));
        assert_eq!(buckets[0].actual_end, date(2025, 1, 31));

        assert_eq!(buckets[1].label, "2025-02");
        assert_eq!(buckets[1].actual_start, date(2025, 2, 1));
        assert_eq!(buckets[1].actual_end, date(2025, 2, 28));

        assert_eq!(buckets[2].label, "2025-03");
        assert_eq!(buckets[2].actual_start, date(2025, 3, 1));
        assert_eq!(buckets[2].actual_end, date(2025, 3, 10));
    }

    #[test]
    fn buckets_cross_year_boundary() {
        let buckets = month_buckets(date(2024, 11, 20), date(2025, 1, 5));
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-11", "2024-12", "2025-01"]);
        assert_eq!(buckets[1].actual_start, date(2024, 12, 1));
        assert_eq!(buckets[1].actual_end, date(2024, 12, 31));
    }

    #[test]
    fn booking_before_range_start_is_excluded_from_first_bucket() {
        let report_range = range((2025, 1, 15), (2025, 3, 10));
        let bookings = vec![
            booking(
                "early",
                Some("s1"),
                Some("u1"),
                10_000.0,
                BookingStatus::Confirmed,
                true,
                at_noon(2025, 1, 10),
            ),
            booking(
                "in-window",
                Some("s1"),
                Some("u1"),
                20_000.0,
                BookingStatus::Confirmed,
                true,
                at_noon(2025, 1, 20),
            ),
        ];
        let payload = assemble(&report_range, &bookings, &[], &[]);

        assert_eq!(payload.bookings.bookings_trend[0].count, 1);
        assert_eq!(payload.bookings.total, 1);
        assert_eq!(payload.total_booking_revenue, 20_000.0);
    }

    #[test]
    fn cancelled_but_paid_booking_still_counts_toward_revenue() {
        let report_range = range((2025, 1, 1), (2025, 2, 28));
        let bookings = vec![
            booking(
                "b1",
                Some("s1"),
                Some("u1"),
                75_000.0,
                BookingStatus::Confirmed,
                true,
                at_noon(2025, 1, 5),
            ),
            booking(
                "b2",
                Some("s1"),
                Some("u2"),
                36_000.0,
                BookingStatus::Cancelled,
                true,
                at_noon(2025, 2, 10),
            ),
        ];
        let payload = assemble(&report_range, &bookings, &[], &[]);

        assert_eq!(payload.total_booking_revenue, 111_000.0);
        assert_eq!(payload.bookings.cancelled, 1);
        assert_eq!(payload.bookings.paid, 2);
        assert_eq!(payload.bookings.unpaid, 0);
        assert_eq!(payload.bookings.cancellation_rate, 50.0);
        assert_eq!(payload.bookings.avg_booking_value, Some(55_500.0));
    }

    #[test]
    fn monthly_series_tile_the_range_totals() {
        let report_range = range((2025, 1, 1), (2025, 3, 31));
        let bookings = vec![
            booking("b1", Some("s1"), Some("u1"), 10_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 2)),
            booking("b2", Some("s1"), Some("u1"), 15_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 30)),
            booking("b3", Some("s2"), Some("u2"), 20_000.0, BookingStatus::Confirmed, false, at_noon(2025, 2, 14)),
            booking("b4", Some("s2"), Some("u2"), 25_000.0, BookingStatus::Cancelled, true, at_noon(2025, 3, 31)),
        ];
        let services = vec![ServiceRecord {
            id: "sv1".to_string(),
            shortlet_id: Some("s1".to_string()),
            user_id: Some("u1".to_string()),
            price: 5_000.0,
            paid: true,
            created_at: at_noon(2025, 2, 20),
        }];
        let payload = assemble(&report_range, &bookings, &services, &[]);

        let monthly_total: f64 = payload.revenue.monthly.iter().map(|p| p.total).sum();
        assert_eq!(monthly_total, payload.revenue.total);
        assert_eq!(payload.revenue.total, 55_000.0); // 10k + 15k + 25k paid bookings + 5k service

        let trend_total: i64 = payload.bookings.bookings_trend.iter().map(|p| p.count).sum();
        assert_eq!(trend_total, payload.bookings.total);
        assert_eq!(payload.bookings.unpaid, 1);
    }

    #[test]
    fn cancellation_rate_is_zero_without_bookings() {
        let report_range = range((2025, 1, 1), (2025, 1, 31));
        let payload = assemble(&report_range, &[], &[], &[]);
        assert_eq!(payload.bookings.cancellation_rate, 0.0);
        assert_eq!(payload.users.repeat_customer_rate, 0.0);
        assert_eq!(payload.bookings.avg_booking_value, None);
        assert_eq!(payload.bookings.avg_length_of_stay, None);
        assert_eq!(payload.services.avg_service_price, None);
    }

    #[test]
    fn top_shortlets_exclude_missing_references_and_rank_by_combined_revenue() {
        let report_range = range((2025, 1, 1), (2025, 1, 31));
        let bookings = vec![
            booking("b1", Some("s1"), Some("u1"), 30_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 2)),
            booking("b2", None, Some("u1"), 99_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 3)),
            booking("b3", Some("s2"), Some("u2"), 25_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 4)),
        ];
        let services = vec![ServiceRecord {
            id: "sv1".to_string(),
            shortlet_id: Some("s2".to_string()),
            user_id: Some("u2".to_string()),
            price: 10_000.0,
            paid: true,
            created_at: at_noon(2025, 1, 5),
        }];
        let titles = HashMap::from([
            ("s1".to_string(), "Lekki Loft".to_string()),
            ("s2".to_string(), "Ikoyi Penthouse".to_string()),
        ]);
        let payload = assemble_dashboard(
            &report_range,
            TZ,
            date(2025, 6, 15),
            &bookings,
            &services,
            &[],
            &titles,
            &HashMap::new(),
        );

        let top = &payload.top_shortlets_by_revenue;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].shortlet_id, "s2");
        assert_eq!(top[0].title, "Ikoyi Penthouse");
        assert_eq!(top[0].revenue, 35_000.0);
        assert_eq!(top[0].bookings_count, 1);
        assert_eq!(top[1].shortlet_id, "s1");
        assert!(top.iter().all(|entry| !entry.shortlet_id.is_empty()));
    }

    #[test]
    fn exact_revenue_ties_keep_insertion_order() {
        let report_range = range((2025, 1, 1), (2025, 1, 31));
        let bookings = vec![
            booking("b1", Some("first"), Some("u1"), 10_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 2)),
            booking("b2", Some("second"), Some("u2"), 10_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 3)),
        ];
        let payload = assemble(&report_range, &bookings, &[], &[]);
        let top = &payload.top_shortlets_by_revenue;
        assert_eq!(top[0].shortlet_id, "first");
        assert_eq!(top[1].shortlet_id, "second");
    }

    #[test]
    fn repeat_customer_rate_counts_confirmed_bookings_only() {
        let report_range = range((2025, 1, 1), (2025, 1, 31));
        let bookings = vec![
            booking("b1", Some("s1"), Some("u1"), 10_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 2)),
            booking("b2", Some("s1"), Some("u1"), 10_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 9)),
            booking("b3", Some("s1"), Some("u2"), 10_000.0, BookingStatus::Confirmed, true, at_noon(2025, 1, 12)),
            booking("b4", Some("s1"), Some("u3"), 10_000.0, BookingStatus::Cancelled, false, at_noon(2025, 1, 15)),
        ];
        let payload = assemble(&report_range, &bookings, &[], &[]);
        // u1 repeats, u2 does not, u3 has no confirmed booking.
        assert_eq!(payload.users.repeat_customer_rate, 50.0);
    }

    #[test]
    fn today_scalars_zero_when_today_outside_range() {
        let report_range = range((2025, 1, 1), (2025, 1, 31));
        let bookings = vec![booking(
            "b1",
            Some("s1"),
            Some("u1"),
            10_000.0,
            BookingStatus::Confirmed,
            true,
            at_noon(2025, 1, 10),
        )];
        let payload = assemble_dashboard(
            &report_range,
            TZ,
            date(2025, 2, 10), // outside the queried range
            &bookings,
            &[],
            &[],
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(payload.today_revenue, 0.0);
        assert_eq!(payload.current_bookings, 0);

        let payload = assemble_dashboard(
            &report_range,
            TZ,
            date(2025, 1, 10), // the booking's creation day
            &bookings,
            &[],
            &[],
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(payload.today_booking_revenue, 10_000.0);
        assert_eq!(payload.today_revenue, 10_000.0);
    }

    #[test]
    fn average_length_of_stay_uses_confirmed_bookings_with_dates() {
        let report_range = range((2025, 1, 1), (2025, 1, 31));
        let mut stay = booking(
            "b1",
            Some("s1"),
            Some("u1"),
            10_000.0,
            BookingStatus::Confirmed,
            true,
            at_noon(2025, 1, 2),
        );
        stay.check_in_date = Some(date(2025, 1, 10));
        stay.check_out_date = Some(date(2025, 1, 14));
        let mut cancelled = booking(
            "b2",
            Some("s1"),
            Some("u2"),
            10_000.0,
            BookingStatus::Cancelled,
            true,
            at_noon(2025, 1, 3),
        );
        cancelled.check_in_date = Some(date(2025, 1, 20));
        cancelled.check_out_date = Some(date(2025, 1, 30));

        let payload = assemble(&report_range, &[stay, cancelled], &[], &[]);
        assert_eq!(payload.bookings.avg_length_of_stay, Some(4.0));
    }

    #[test]
    fn default_window_is_thirty_days() {
        let report_range = ReportRange::trailing_days(date(2025, 3, 15), 30, TZ).unwrap();
        assert_eq!(report_range.start_date, date(2025, 2, 14));
        assert_eq!(report_range.end_date, date(2025, 3, 15));
    }
}
