//! Spreadsheet rendering of the analytics payload. Both renderers consume
//! [`DashboardPayload`] directly, so a payload field rename surfaces as a
//! compile error here instead of silently breaking exports.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};
use crate::services::analytics::DashboardPayload;

/// Flatten the payload into labelled rows shared by both output formats.
fn dashboard_rows(payload: &DashboardPayload) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let money = |value: f64| format!("{value:.2}");

    rows.push(vec!["metric".into(), "value".into()]);
    rows.push(vec!["rangeStart".into(), payload.range.start.clone()]);
    rows.push(vec!["rangeEnd".into(), payload.range.end.clone()]);
    rows.push(vec![
        "totalBookingRevenue".into(),
        money(payload.total_booking_revenue),
    ]);
    rows.push(vec![
        "totalServiceRevenue".into(),
        money(payload.total_service_revenue),
    ]);
    rows.push(vec!["totalRevenue".into(), money(payload.total_revenue)]);
    rows.push(vec![
        "todayBookingRevenue".into(),
        money(payload.today_booking_revenue),
    ]);
    rows.push(vec![
        "todayServiceRevenue".into(),
        money(payload.today_service_revenue),
    ]);
    rows.push(vec!["todayRevenue".into(), money(payload.today_revenue)]);
    rows.push(vec![
        "currentBookings".into(),
        payload.current_bookings.to_string(),
    ]);
    rows.push(vec!["bookingsTotal".into(), payload.bookings.total.to_string()]);
    rows.push(vec![
        "bookingsCancelled".into(),
        payload.bookings.cancelled.to_string(),
    ]);
    rows.push(vec!["bookingsPaid".into(), payload.bookings.paid.to_string()]);
    rows.push(vec![
        "bookingsUnpaid".into(),
        payload.bookings.unpaid.to_string(),
    ]);
    rows.push(vec![
        "cancellationRate".into(),
        format!("{:.2}", payload.bookings.cancellation_rate),
    ]);
    rows.push(vec![
        "avgLengthOfStay".into(),
        payload
            .bookings
            .avg_length_of_stay
            .map(|value| format!("{value:.2}"))
            .unwrap_or_default(),
    ]);
    rows.push(vec![
        "avgBookingValue".into(),
        payload
            .bookings
            .avg_booking_value
            .map(money)
            .unwrap_or_default(),
    ]);
    rows.push(vec![
        "repeatCustomerRate".into(),
        format!("{:.2}", payload.users.repeat_customer_rate),
    ]);
    rows.push(vec!["usersTotal".into(), payload.users.total.to_string()]);
    rows.push(vec!["servicesTotal".into(), payload.services.total.to_string()]);
    rows.push(vec!["servicesPaid".into(), payload.services.paid.to_string()]);
    rows.push(vec![
        "servicesRevenue".into(),
        money(payload.services.revenue),
    ]);
    rows.push(vec![
        "avgServicePrice".into(),
        payload
            .services
            .avg_service_price
            .map(money)
            .unwrap_or_default(),
    ]);

    rows.push(Vec::new());
    rows.push(vec!["bookingSource".into(), "count".into()]);
    for (channel, count) in &payload.bookings.source_breakdown {
        rows.push(vec![channel.clone(), count.to_string()]);
    }

    rows.push(Vec::new());
    rows.push(vec!["month".into(), "revenue".into(), "bookings".into()]);
    for point in &payload.revenue.monthly {
        rows.push(vec![
            point.label.clone(),
            money(point.total),
            point.count.to_string(),
        ]);
    }

    rows.push(Vec::new());
    rows.push(vec!["month".into(), "newUsers".into()]);
    for point in &payload.users.monthly {
        rows.push(vec![point.label.clone(), point.count.to_string()]);
    }

    rows.push(Vec::new());
    rows.push(vec![
        "shortletId".into(),
        "title".into(),
        "bookingsCount".into(),
        "revenue".into(),
    ]);
    for entry in &payload.top_shortlets_by_revenue {
        rows.push(vec![
            entry.shortlet_id.clone(),
            entry.title.clone(),
            entry.bookings_count.to_string(),
            money(entry.revenue),
        ]);
    }

    rows.push(Vec::new());
    rows.push(vec![
        "userId".into(),
        "name".into(),
        "email".into(),
        "bookingsCount".into(),
        "totalSpend".into(),
    ]);
    for customer in &payload.users.top_customers {
        rows.push(vec![
            customer.user_id.clone(),
            customer.name.clone(),
            customer.email.clone(),
            customer.bookings_count.to_string(),
            money(customer.total_spend),
        ]);
    }

    rows
}

pub fn dashboard_to_csv(payload: &DashboardPayload) -> String {
    let mut out = String::new();
    for row in dashboard_rows(payload) {
        let line = row
            .iter()
            .map(|cell| csv_escape(cell))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Minimal single-sheet workbook with inline strings — enough for the admin
/// dashboard's "download as Excel" button without a spreadsheet dependency.
pub fn dashboard_to_xlsx(payload: &DashboardPayload) -> AppResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: [(&str, String); 5] = [
        (
            "[Content_Types].xml",
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
                r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                r#"</Types>"#
            )
            .to_string(),
        ),
        (
            "_rels/.rels",
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
                r#"</Relationships>"#
            )
            .to_string(),
        ),
        (
            "xl/workbook.xml",
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
                r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                r#"<sheets><sheet name="Analytics" sheetId="1" r:id="rId1"/></sheets>"#,
                r#"</workbook>"#
            )
            .to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
                r#"</Relationships>"#
            )
            .to_string(),
        ),
        ("xl/worksheets/sheet1.xml", worksheet_xml(payload)),
    ];

    for (name, content) in entries {
        writer
            .start_file(name, options)
            .map_err(|e| AppError::Internal(format!("XLSX write failed: {e}")))?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| AppError::Internal(format!("XLSX write failed: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| AppError::Internal(format!("XLSX write failed: {e}")))?;
    Ok(cursor.into_inner())
}

fn worksheet_xml(payload: &DashboardPayload) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        r#"<sheetData>"#
    ));
    for row in dashboard_rows(payload) {
        xml.push_str("<row>");
        for cell in row {
            xml.push_str(r#"<c t="inlineStr"><is><t>"#);
            xml.push_str(&xml_escape(&cell));
            xml.push_str("</t></is></c>");
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::{csv_escape, dashboard_to_csv, dashboard_to_xlsx};
    use crate::services::analytics::{assemble_dashboard, ReportRange};
    use std::collections::HashMap;

    fn sample_payload() -> crate::services::analytics::DashboardPayload {
        let tz = chrono_tz::Africa::Lagos;
        let range = ReportRange::from_dates(
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
            tz,
        )
        .unwrap();
        assemble_dashboard(
            &range,
            tz,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            &[],
            &[],
            &[],
            &HashMap::new(),
            &HashMap::new(),
        )
    }

    #[test]
    fn csv_carries_the_contract_field_names() {
        let csv = dashboard_to_csv(&sample_payload());
        for field in [
            "totalBookingRevenue",
            "totalServiceRevenue",
            "totalRevenue",
            "cancellationRate",
            "repeatCustomerRate",
            "shortletId",
            "totalSpend",
        ] {
            assert!(csv.contains(field), "missing field {field} in CSV");
        }
        assert!(csv.contains("2025-01"));
        assert!(csv.contains("2025-02"));
    }

    #[test]
    fn csv_escapes_embedded_delimiters() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn xlsx_is_a_readable_workbook() {
        let bytes = dashboard_to_xlsx(&sample_payload()).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"xl/workbook.xml".to_string()));
        assert!(names.contains(&"xl/worksheets/sheet1.xml".to_string()));
    }
}
