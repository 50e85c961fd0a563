//! CSV pivot of a cleaned people document.
//!
//! One row per person, fixed column order, multi-value fields joined with
//! `;`. Consumes a document that already passed validation; anything missing
//! projects as an empty cell.

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// CSV column order for the pivot output.
pub const CSV_COLUMNS: &[&str] = &[
    "full_name",
    "section",
    "role",
    "primary_affiliation",
    "country",
    "pins",
    "score_total",
    "contact_labels",
    "trial_ncts",
];

/// One pivoted person row.
#[derive(Debug, Serialize)]
pub struct PersonRow {
    pub full_name: String,
    pub section: String,
    pub role: String,
    pub primary_affiliation: String,
    pub country: String,
    pub pins: String,
    pub score_total: String,
    pub contact_labels: String,
    pub trial_ncts: String,
}

/// Project every person in the document into a pivot row.
pub fn person_rows(document: &Value) -> Vec<PersonRow> {
    document
        .get("people")
        .and_then(Value::as_array)
        .map(|people| people.iter().map(person_row).collect())
        .unwrap_or_default()
}

fn person_row(person: &Value) -> PersonRow {
    // Primary affiliation carries the name/country pair; others are ignored.
    let (primary_affiliation, country) = person
        .get("affiliations")
        .and_then(Value::as_array)
        .and_then(|affs| {
            affs.iter()
                .find(|a| a.get("type").and_then(Value::as_str) == Some("Primary"))
        })
        .map(|a| (field(a, "name"), field(a, "country")))
        .unwrap_or_default();

    let pins = join_strings(person.get("pins"));
    let score_total = person
        .get("score_breakdown")
        .and_then(|s| s.get("total"))
        .map(scalar)
        .unwrap_or_default();
    let contact_labels = join_field(person.get("contacts"), "label");
    let trial_ncts = join_field(person.get("trials"), "nct_id");

    PersonRow {
        full_name: field(person, "full_name"),
        section: field(person, "section"),
        role: field(person, "role"),
        primary_affiliation,
        country,
        pins,
        score_total,
        contact_labels,
        trial_ncts,
    }
}

/// Write the pivot as CSV (with header row) to `writer`.
pub fn write_csv<W: Write>(document: &Value, writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in person_rows(document) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// The pivot as a CSV string.
pub fn csv_string(document: &Value) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(document, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| crate::error::LintError::Config(format!("CSV output not UTF-8: {e}")))
}

fn field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

/// Numbers and strings render bare; anything else renders as JSON.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn join_strings(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(";")
        })
        .unwrap_or_default()
}

fn join_field(value: Option<&Value>, key: &str) -> String {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.get(key).and_then(Value::as_str).unwrap_or(""))
                .collect::<Vec<_>>()
                .join(";")
        })
        .unwrap_or_default()
}
