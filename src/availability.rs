use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// A committed stay: the half-open interval `[check_in, check_out)`.
/// A guest checking out on the morning of `check_out` frees the unit for a
/// same-day check-in, so the checkout date itself is never occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, AppError> {
        if check_out <= check_in {
            return Err(AppError::BadRequest(
                "Check-out must be after check-in.".to_string(),
            ));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn parse(check_in: &str, check_out: &str) -> Result<Self, AppError> {
        Self::new(parse_date(check_in)?, parse_date(check_out)?)
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid ISO date '{}'.", value.trim())))
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`
/// overlap iff `a_start < b_end && b_start < a_end`. Back-to-back ranges
/// sharing a boundary date do not overlap. Callers validate ordering.
pub fn is_booking_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// True when `candidate` overlaps none of the committed ranges.
pub fn check_availability(booked: &[StayRange], candidate: &StayRange) -> bool {
    !booked.iter().any(|existing| {
        is_booking_overlap(
            candidate.check_in,
            candidate.check_out,
            existing.check_in,
            existing.check_out,
        )
    })
}

/// Append a range unconditionally. The caller has just checked availability
/// under the shortlet lock; re-checking here would hide misuse instead of
/// surfacing it.
pub fn commit_range(booked: &mut Vec<StayRange>, range: StayRange) {
    booked.push(range);
}

/// Remove the first entry exactly matching `range`. Absent entries are a
/// no-op so a double-cancel leaves the list unchanged.
pub fn release_range(booked: &mut Vec<StayRange>, range: &StayRange) {
    if let Some(position) = booked.iter().position(|existing| existing == range) {
        booked.remove(position);
    }
}

/// Decode a shortlet row's `booked_dates` column. Entries that do not parse
/// as a date pair are skipped rather than failing the whole read.
pub fn booked_dates_from_value(value: Option<&Value>) -> Vec<StayRange> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let check_in = obj.get("check_in").and_then(Value::as_str)?;
            let check_out = obj.get("check_out").and_then(Value::as_str)?;
            StayRange::parse(check_in, check_out).ok()
        })
        .collect()
}

pub fn booked_dates_to_value(booked: &[StayRange]) -> Value {
    Value::Array(
        booked
            .iter()
            .map(|range| {
                serde_json::json!({
                    "check_in": range.check_in.to_string(),
                    "check_out": range.check_out.to_string(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(from: (i32, u32, u32), to: (i32, u32, u32)) -> StayRange {
        StayRange::new(date(from.0, from.1, from.2), date(to.0, to.1, to.2)).unwrap()
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            ((2025, 1, 1), (2025, 1, 5), (2025, 1, 3), (2025, 1, 8)),
            ((2025, 1, 1), (2025, 1, 5), (2025, 1, 5), (2025, 1, 10)),
            ((2025, 1, 1), (2025, 1, 31), (2025, 1, 10), (2025, 1, 12)),
            ((2025, 2, 1), (2025, 2, 3), (2025, 3, 1), (2025, 3, 3)),
        ];
        for (a, b, c, d) in cases {
            let left = is_booking_overlap(
                date(a.0, a.1, a.2),
                date(b.0, b.1, b.2),
                date(c.0, c.1, c.2),
                date(d.0, d.1, d.2),
            );
            let right = is_booking_overlap(
                date(c.0, c.1, c.2),
                date(d.0, d.1, d.2),
                date(a.0, a.1, a.2),
                date(b.0, b.1, b.2),
            );
            assert_eq!(left, right);
        }
    }

    #[test]
    fn back_to_back_is_not_overlap() {
        assert!(!is_booking_overlap(
            date(2025, 1, 1),
            date(2025, 1, 5),
            date(2025, 1, 5),
            date(2025, 1, 10),
        ));
    }

    #[test]
    fn detects_partial_overlap() {
        assert!(is_booking_overlap(
            date(2025, 1, 1),
            date(2025, 1, 5),
            date(2025, 1, 3),
            date(2025, 1, 8),
        ));
    }

    #[test]
    fn containment_is_overlap() {
        assert!(is_booking_overlap(
            date(2025, 1, 1),
            date(2025, 1, 31),
            date(2025, 1, 10),
            date(2025, 1, 12),
        ));
    }

    #[test]
    fn empty_booked_list_is_available() {
        let candidate = range((2025, 1, 1), (2025, 1, 5));
        assert!(check_availability(&[], &candidate));
    }

    #[test]
    fn availability_after_commit() {
        let mut booked = Vec::new();
        let first = range((2025, 1, 1), (2025, 1, 5));
        assert!(check_availability(&booked, &first));
        commit_range(&mut booked, first);

        let overlapping = range((2025, 1, 3), (2025, 1, 6));
        assert!(!check_availability(&booked, &overlapping));

        let back_to_back = range((2025, 1, 5), (2025, 1, 10));
        assert!(check_availability(&booked, &back_to_back));
    }

    #[test]
    fn release_is_idempotent() {
        let mut booked = vec![
            range((2025, 1, 1), (2025, 1, 5)),
            range((2025, 1, 10), (2025, 1, 12)),
        ];
        let target = range((2025, 1, 1), (2025, 1, 5));

        release_range(&mut booked, &target);
        assert_eq!(booked, vec![range((2025, 1, 10), (2025, 1, 12))]);

        release_range(&mut booked, &target);
        assert_eq!(booked, vec![range((2025, 1, 10), (2025, 1, 12))]);
    }

    #[test]
    fn release_removes_only_exact_matches() {
        let mut booked = vec![range((2025, 1, 1), (2025, 1, 5))];
        release_range(&mut booked, &range((2025, 1, 1), (2025, 1, 4)));
        assert_eq!(booked.len(), 1);
    }

    #[test]
    fn rejects_inverted_ranges() {
        assert!(StayRange::new(date(2025, 1, 5), date(2025, 1, 5)).is_err());
        assert!(StayRange::new(date(2025, 1, 5), date(2025, 1, 4)).is_err());
    }

    #[test]
    fn decodes_booked_dates_column() {
        let column = json!([
            { "check_in": "2025-01-01", "check_out": "2025-01-05" },
            { "check_in": "bad", "check_out": "2025-01-09" },
            { "check_in": "2025-02-01", "check_out": "2025-02-03" },
        ]);
        let booked = booked_dates_from_value(Some(&column));
        assert_eq!(
            booked,
            vec![
                range((2025, 1, 1), (2025, 1, 5)),
                range((2025, 2, 1), (2025, 2, 3)),
            ]
        );

        let round_tripped = booked_dates_from_value(Some(&booked_dates_to_value(&booked)));
        assert_eq!(round_tripped, booked);
    }
}
