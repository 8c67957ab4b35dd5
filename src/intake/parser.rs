use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug)]
pub(crate) struct WorklistRecord {
    pub(crate) order_id: String,
    pub(crate) patient: String,
    pub(crate) test: String,
    pub(crate) location: String,
    pub(crate) priority: String,
    pub(crate) received_at: Option<NaiveDateTime>,
    pub(crate) due_at: Option<NaiveDateTime>,
    pub(crate) processing_time: Option<String>,
}

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<WorklistRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for record in csv_reader.deserialize::<WorklistRow>() {
        let row = record?;
        records.push(WorklistRecord {
            order_id: row.order_id.trim().to_string(),
            patient: row.patient,
            test: row.test,
            location: row.location,
            priority: row.priority,
            received_at: row.received_at.as_deref().and_then(parse_datetime),
            due_at: row.due_at.as_deref().and_then(parse_datetime),
            processing_time: row.processing_time,
        });
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct WorklistRow {
    #[serde(rename = "Order ID")]
    order_id: String,
    #[serde(rename = "Patient")]
    patient: String,
    #[serde(rename = "Test")]
    test: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Priority")]
    priority: String,
    #[serde(rename = "Received At", default, deserialize_with = "empty_string_as_none")]
    received_at: Option<String>,
    #[serde(rename = "Due At", default, deserialize_with = "empty_string_as_none")]
    due_at: Option<String>,
    #[serde(
        rename = "Processing Time",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    processing_time: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}

#[cfg(test)]
pub(crate) fn parse_datetime_for_tests(value: &str) -> Option<NaiveDateTime> {
    parse_datetime(value)
}
