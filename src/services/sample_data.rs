//! Fixture [`AnalyticsSource`] used by mock mode and as the fallback when
//! the live store is unreachable. Data is derived arithmetically from the
//! queried range — no randomness, no wall clock — so the same request always
//! renders the same dashboard, through the same aggregation code path as
//! live data.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::AppResult;
use crate::services::analytics::{
    month_buckets, AnalyticsSource, BookingRecord, BookingStatus, ReportRange, ServiceRecord,
    UserContact, UserRecord,
};

pub struct SampleSource {
    tz: Tz,
}

impl SampleSource {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn instant_at(&self, date: chrono::NaiveDate, hour: u32) -> DateTime<Utc> {
        self.tz
            .from_local_datetime(&date.and_hms_opt(hour, 0, 0).expect("valid hour"))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| date.and_hms_opt(hour, 0, 0).expect("valid hour").and_utc())
    }
}

const SAMPLE_SHORTLETS: &[(&str, &str, f64)] = &[
    ("sample-shortlet-1", "Lekki Waterside Loft", 45_000.0),
    ("sample-shortlet-2", "Ikoyi Parkview Penthouse", 120_000.0),
    ("sample-shortlet-3", "Yaba Courtyard Studio", 28_000.0),
    ("sample-shortlet-4", "Victoria Island Skyline 2BR", 85_000.0),
    ("sample-shortlet-5", "Surulere Garden Flat", 32_000.0),
];

const SAMPLE_USERS: &[(&str, &str, &str)] = &[
    ("sample-user-1", "Adaeze Okafor", "adaeze.okafor@example.com"),
    ("sample-user-2", "Tunde Balogun", "tunde.balogun@example.com"),
    ("sample-user-3", "Chiamaka Eze", "chiamaka.eze@example.com"),
    ("sample-user-4", "Ibrahim Musa", "ibrahim.musa@example.com"),
    ("sample-user-5", "Folake Adeyemi", "folake.adeyemi@example.com"),
    ("sample-user-6", "Emeka Nwosu", "emeka.nwosu@example.com"),
];

struct BookingBlueprint {
    day_offset: i64,
    shortlet: usize,
    user: usize,
    nights: i64,
    cancelled: bool,
    paid: bool,
    channel: &'static str,
}

const BOOKING_BLUEPRINTS: &[BookingBlueprint] = &[
    BookingBlueprint { day_offset: 1, shortlet: 0, user: 0, nights: 3, cancelled: false, paid: true, channel: "checkout" },
    BookingBlueprint { day_offset: 4, shortlet: 1, user: 1, nights: 5, cancelled: false, paid: true, channel: "webhook" },
    BookingBlueprint { day_offset: 8, shortlet: 2, user: 2, nights: 2, cancelled: false, paid: false, channel: "manual" },
    BookingBlueprint { day_offset: 12, shortlet: 3, user: 0, nights: 4, cancelled: false, paid: true, channel: "checkout" },
    BookingBlueprint { day_offset: 17, shortlet: 1, user: 3, nights: 7, cancelled: true, paid: true, channel: "checkout" },
    BookingBlueprint { day_offset: 22, shortlet: 4, user: 4, nights: 2, cancelled: false, paid: true, channel: "manual" },
];

struct ServiceBlueprint {
    day_offset: i64,
    shortlet: usize,
    user: usize,
    price: f64,
    paid: bool,
    description: &'static str,
}

const SERVICE_BLUEPRINTS: &[ServiceBlueprint] = &[
    ServiceBlueprint { day_offset: 3, shortlet: 0, user: 0, price: 15_000.0, paid: true, description: "Airport pickup" },
    ServiceBlueprint { day_offset: 10, shortlet: 1, user: 1, price: 25_000.0, paid: true, description: "Private chef dinner" },
    ServiceBlueprint { day_offset: 19, shortlet: 3, user: 3, price: 8_000.0, paid: false, description: "Mid-stay cleaning" },
];

#[async_trait]
impl AnalyticsSource for SampleSource {
    async fn fetch_bookings(&self, range: &ReportRange) -> AppResult<Vec<BookingRecord>> {
        let mut bookings = Vec::new();
        for (bucket_index, bucket) in month_buckets(range.start_date, range.end_date)
            .iter()
            .enumerate()
        {
            for (slot, blueprint) in BOOKING_BLUEPRINTS.iter().enumerate() {
                let created_on = bucket.actual_start + Duration::days(blueprint.day_offset);
                if created_on > bucket.actual_end {
                    continue;
                }
                let shortlet = SAMPLE_SHORTLETS[blueprint.shortlet];
                let check_in = created_on + Duration::days(3);
                bookings.push(BookingRecord {
                    id: format!("sample-booking-{}-{}", bucket.label, slot),
                    shortlet_id: Some(shortlet.0.to_string()),
                    user_id: Some(SAMPLE_USERS[blueprint.user].0.to_string()),
                    check_in_date: Some(check_in),
                    check_out_date: Some(check_in + Duration::days(blueprint.nights)),
                    total_amount: shortlet.2 * blueprint.nights as f64,
                    status: if blueprint.cancelled {
                        BookingStatus::Cancelled
                    } else {
                        BookingStatus::Confirmed
                    },
                    paid: blueprint.paid,
                    channel: blueprint.channel.to_string(),
                    created_at: self.instant_at(created_on, 9 + (bucket_index % 3) as u32),
                });
            }
        }
        Ok(bookings)
    }

    async fn fetch_services(&self, range: &ReportRange) -> AppResult<Vec<ServiceRecord>> {
        let mut services = Vec::new();
        for bucket in &month_buckets(range.start_date, range.end_date) {
            for (slot, blueprint) in SERVICE_BLUEPRINTS.iter().enumerate() {
                let created_on = bucket.actual_start + Duration::days(blueprint.day_offset);
                if created_on > bucket.actual_end {
                    continue;
                }
                services.push(ServiceRecord {
                    id: format!("sample-service-{}-{}", bucket.label, slot),
                    shortlet_id: Some(SAMPLE_SHORTLETS[blueprint.shortlet].0.to_string()),
                    user_id: Some(SAMPLE_USERS[blueprint.user].0.to_string()),
                    price: blueprint.price,
                    paid: blueprint.paid,
                    created_at: self.instant_at(created_on, 14),
                });
            }
        }
        Ok(services)
    }

    async fn fetch_users(&self, range: &ReportRange) -> AppResult<Vec<UserRecord>> {
        let mut users = Vec::new();
        for (bucket_index, bucket) in month_buckets(range.start_date, range.end_date)
            .iter()
            .enumerate()
        {
            // Two registrations per month, rotating through the roster.
            for slot in 0..2_usize {
                let created_on = bucket.actual_start + Duration::days(5 + slot as i64 * 9);
                if created_on > bucket.actual_end {
                    continue;
                }
                let (id, full_name, email) =
                    SAMPLE_USERS[(bucket_index * 2 + slot) % SAMPLE_USERS.len()];
                users.push(UserRecord {
                    id: id.to_string(),
                    full_name: full_name.to_string(),
                    email: email.to_string(),
                    created_at: self.instant_at(created_on, 11),
                });
            }
        }
        Ok(users)
    }

    async fn shortlet_titles(&self, ids: &[String]) -> AppResult<HashMap<String, String>> {
        Ok(SAMPLE_SHORTLETS
            .iter()
            .filter(|(id, _, _)| ids.iter().any(|requested| requested == id))
            .map(|(id, title, _)| (id.to_string(), title.to_string()))
            .collect())
    }

    async fn user_contacts(&self, ids: &[String]) -> AppResult<HashMap<String, UserContact>> {
        Ok(SAMPLE_USERS
            .iter()
            .filter(|(id, _, _)| ids.iter().any(|requested| requested == id))
            .map(|(id, full_name, email)| {
                (
                    id.to_string(),
                    UserContact {
                        full_name: full_name.to_string(),
                        email: email.to_string(),
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::SampleSource;
    use crate::services::analytics::{build_dashboard, ReportRange};
    use chrono::NaiveDate;

    const TZ: chrono_tz::Tz = chrono_tz::Africa::Lagos;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn sample_dashboard_is_deterministic() {
        let source = SampleSource::new(TZ);
        let range = ReportRange::from_dates(date(2025, 1, 1), date(2025, 3, 31), TZ).unwrap();

        let first = build_dashboard(&source, &range, TZ).await.unwrap();
        let second = build_dashboard(&source, &range, TZ).await.unwrap();

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
        assert_eq!(first.revenue.monthly.len(), 3);
        assert!(first.total_revenue > 0.0);
        assert!(first.bookings.cancelled > 0);
    }

    #[tokio::test]
    async fn sample_rankings_are_hydrated_with_titles_and_contacts() {
        let source = SampleSource::new(TZ);
        let range = ReportRange::from_dates(date(2025, 1, 1), date(2025, 2, 28), TZ).unwrap();

        let payload = build_dashboard(&source, &range, TZ).await.unwrap();

        assert!(!payload.top_shortlets_by_revenue.is_empty());
        for entry in &payload.top_shortlets_by_revenue {
            assert!(!entry.title.is_empty());
            assert!(entry.revenue > 0.0);
        }
        assert!(!payload.users.top_customers.is_empty());
        for customer in &payload.users.top_customers {
            assert!(customer.email.contains('@'));
        }
    }

    #[tokio::test]
    async fn partial_month_window_drops_late_blueprints() {
        let source = SampleSource::new(TZ);
        // Sub-range is Jan 25..28: only the day-offset-1 booking (the 26th)
        // and the day-offset-3 service (the 28th) fit.
        let range = ReportRange::from_dates(date(2025, 1, 25), date(2025, 1, 28), TZ).unwrap();
        let payload = build_dashboard(&source, &range, TZ).await.unwrap();

        assert_eq!(payload.bookings.total, 1);
        assert_eq!(payload.services.total, 1);
    }
}
