//! Record validation and in-place document cleanup.
//!
//! The validator takes ownership of a parsed document, purifies every
//! URL-bearing field, checks the structural invariants, and accumulates
//! ordered lists of fatal errors and soft warnings. Aside from reading
//! today's date once per call (for `verified_date` autofill) it is a pure
//! function of its input.

use crate::policy::{Policy, SUMMARY_WORDS_MAX, SUMMARY_WORDS_MIN};
use crate::purify;
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// How violations that can be mechanically repaired are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepairMode {
    /// Report every violation; repair only what the policy marks as soft.
    #[default]
    Strict,
    /// Silently repair ordering, count, and date violations instead of
    /// reporting them.
    Lenient,
}

/// Machine-readable lint report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub status: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub people_count: usize,
}

/// Outcome of validating one document.
///
/// The document inside is the cleaned working copy. Callers are expected to
/// discard it when [`Validated::passed`] is false.
#[derive(Debug)]
pub struct Validated {
    pub document: Value,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validated {
    /// Overall status is pass iff no fatal error was recorded.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Assemble the report handed to callers and transports.
    pub fn report(&self) -> Report {
        let people_count = self
            .document
            .get("people_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        Report {
            status: if self.passed() { "pass" } else { "fail" }.to_string(),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            people_count,
        }
    }
}

/// Validate and clean a document in place.
pub fn validate(mut document: Value, policy: &Policy, mode: RepairMode) -> Validated {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let today = Local::now().format("%Y-%m-%d").to_string();

    let Some(root) = document.as_object_mut() else {
        errors.push("top-level JSON must be an object".to_string());
        return Validated { document, errors, warnings };
    };

    if let Some(omitted) = root.get("omitted_candidates") {
        if !omitted.is_array() {
            errors.push("`omitted_candidates` must be an array".to_string());
        }
    }

    let mut people_len = 0;
    match root.get_mut("people") {
        Some(Value::Array(people)) => {
            people_len = people.len();
            let mut seen_ids: Vec<String> = Vec::new();
            let mut orders: Vec<Option<i64>> = Vec::with_capacity(people.len());

            for (idx0, person) in people.iter_mut().enumerate() {
                let idx = idx0 + 1;
                let (pid, order) =
                    clean_person(person, idx, policy, mode, &today, &mut errors, &mut warnings);

                match pid {
                    Some(id) if seen_ids.contains(&id) => {
                        errors.push(format!("person[{idx}]/{id}: duplicate id \"{id}\""));
                    }
                    Some(id) => seen_ids.push(id),
                    None => errors.push(format!("person[{idx}]: missing id")),
                }
                orders.push(order);
            }

            check_original_order(people, &orders, mode, &mut errors);
        }
        _ => errors.push("top-level `people` must be an array".to_string()),
    }

    reconcile_people_count(root, people_len, mode, &mut warnings);

    debug!(
        errors = errors.len(),
        warnings = warnings.len(),
        people = people_len,
        "validation complete"
    );
    Validated { document, errors, warnings }
}

/// `original_order` values must be pairwise distinct and cover exactly 1..N.
///
/// Strict mode reports the violation; lenient mode reassigns positional
/// order across the whole array.
fn check_original_order(
    people: &mut [Value],
    orders: &[Option<i64>],
    mode: RepairMode,
    errors: &mut Vec<String>,
) {
    let mut sorted: Vec<i64> = orders.iter().filter_map(|o| *o).collect();
    sorted.sort_unstable();
    let contiguous =
        sorted.len() == orders.len() && sorted.iter().zip(1i64..).all(|(v, want)| *v == want);
    if contiguous {
        return;
    }

    match mode {
        RepairMode::Strict => {
            errors.push("`original_order` is not contiguous 1..N".to_string());
        }
        RepairMode::Lenient => {
            for (idx0, person) in people.iter_mut().enumerate() {
                if let Some(obj) = person.as_object_mut() {
                    obj.insert("original_order".to_string(), json!(idx0 as i64 + 1));
                }
            }
        }
    }
}

/// `people_count` must equal `len(people)`; the mismatch is always
/// corrected, and strict mode additionally notes it.
fn reconcile_people_count(
    root: &mut serde_json::Map<String, Value>,
    people_len: usize,
    mode: RepairMode,
    warnings: &mut Vec<String>,
) {
    let declared = root.get("people_count").and_then(Value::as_i64);
    if declared != Some(people_len as i64) {
        if mode == RepairMode::Strict {
            if let Some(pc) = declared {
                warnings.push(format!(
                    "`people_count` != len(people) ({pc} vs {people_len}); corrected"
                ));
            }
        }
        root.insert("people_count".to_string(), json!(people_len));
    }
}

/// Clean one person record in place; returns its id and declared order for
/// the document-level checks.
fn clean_person(
    person: &mut Value,
    idx: usize,
    policy: &Policy,
    mode: RepairMode,
    today: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> (Option<String>, Option<i64>) {
    let Some(obj) = person.as_object_mut() else {
        errors.push(format!("person[{idx}]: must be an object"));
        return (None, None);
    };

    let pid = obj.get("id").and_then(Value::as_str).map(str::to_string);
    let ctx = format!("person[{idx}]/{}", pid.as_deref().unwrap_or("?"));
    let order = obj
        .get("original_order")
        .and_then(Value::as_i64)
        .filter(|o| *o > 0);

    // Section enum
    let section = obj.get("section").and_then(Value::as_str).unwrap_or("");
    if !policy.is_allowed_section(section) {
        errors.push(format!("{ctx}: invalid section '{section}'"));
    }

    // Summary length (soft)
    let summary = obj.get("summary_text").and_then(Value::as_str).unwrap_or("");
    let words = policy.word_count(summary);
    if !(SUMMARY_WORDS_MIN..=SUMMARY_WORDS_MAX).contains(&words) {
        warnings.push(format!(
            "{ctx}: summary_text words={words} (expected {SUMMARY_WORDS_MIN}-{SUMMARY_WORDS_MAX})"
        ));
    }

    match obj.get_mut("evidence") {
        Some(Value::Array(items)) if !items.is_empty() => {
            for (j, item) in items.iter_mut().enumerate() {
                clean_evidence(item, &ctx, j, policy, errors, warnings);
            }
        }
        _ => errors.push(format!("{ctx}: missing or empty evidence array")),
    }

    match obj.get_mut("contacts") {
        Some(Value::Array(items)) => {
            for (j, item) in items.iter_mut().enumerate() {
                clean_contact(item, &ctx, j, policy, mode, today, errors, warnings);
            }
        }
        Some(_) => errors.push(format!("{ctx}: contacts must be an array")),
        None => {}
    }

    match obj.get_mut("key_links") {
        Some(Value::Array(items)) => {
            for (j, item) in items.iter_mut().enumerate() {
                clean_key_link(item, &ctx, j, policy, errors);
            }
        }
        Some(_) => errors.push(format!("{ctx}: key_links must be an array")),
        None => {}
    }

    match obj.get_mut("trials") {
        Some(Value::Array(items)) => {
            for (j, item) in items.iter_mut().enumerate() {
                clean_trial(item, &ctx, j, policy, mode, errors);
            }
        }
        Some(_) => errors.push(format!("{ctx}: trials must be an array")),
        None => {}
    }

    (pid, order)
}

fn clean_evidence(
    item: &mut Value,
    ctx: &str,
    j: usize,
    policy: &Policy,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let Some(obj) = item.as_object_mut() else {
        errors.push(format!("{ctx}/evidence[{j}]: must be an object"));
        return;
    };

    let tag = obj.get("tag").and_then(Value::as_str).unwrap_or("").to_string();
    if !policy.is_allowed_tag(&tag) {
        errors.push(format!("{ctx}/evidence[{j}]: invalid tag '{tag}'"));
    }

    if let Some(raw) = obj.get("canonical_url").and_then(Value::as_str) {
        let cleaned = purify::purify_url(raw, policy).map(|u| {
            if tag == "preprint" {
                purify::preprint_to_doi(&u, policy)
            } else {
                u
            }
        });
        obj.insert(
            "canonical_url".to_string(),
            cleaned.map(Value::from).unwrap_or(Value::Null),
        );
    }

    let canonical = obj.get("canonical_url").and_then(Value::as_str);
    match canonical {
        Some(u) if policy.url.is_match(u) => {
            if purify::is_preprint_host(u) && !purify::is_doi_landing(u) {
                warnings.push(format!("{ctx}/evidence[{j}]: preprint should use DOI landing"));
            }
        }
        _ => errors.push(format!(
            "{ctx}/evidence[{j}]: invalid canonical_url '{}'",
            display_value(obj.get("canonical_url"))
        )),
    }

    if let Some(pdf) = obj.get("pdf_url") {
        if !pdf.is_null() {
            let cleaned = pdf
                .as_str()
                .and_then(|raw| purify::purify_url(raw, policy))
                .filter(|u| policy.url.is_match(u));
            match cleaned {
                Some(u) => {
                    obj.insert("pdf_url".to_string(), Value::from(u));
                }
                None => {
                    warnings.push(format!("{ctx}/evidence[{j}]: unrecoverable pdf_url dropped"));
                    obj.insert("pdf_url".to_string(), Value::Null);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn clean_contact(
    item: &mut Value,
    ctx: &str,
    j: usize,
    policy: &Policy,
    mode: RepairMode,
    today: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let Some(obj) = item.as_object_mut() else {
        errors.push(format!("{ctx}/contacts[{j}]: must be an object"));
        return;
    };

    let ctype = match obj.get("type").and_then(Value::as_str) {
        Some(t @ ("email" | "phone" | "page")) => t.to_string(),
        // Unknown contact types fall back to page semantics.
        _ => {
            obj.insert("type".to_string(), json!("page"));
            "page".to_string()
        }
    };
    let url = obj.get("url").and_then(Value::as_str).unwrap_or("").to_string();

    match ctype.as_str() {
        "email" => {
            // Bare addresses are repaired by prefixing the scheme.
            let address = url.strip_prefix("mailto:").unwrap_or(&url);
            if policy.email.is_match(address) {
                obj.insert("url".to_string(), json!(format!("mailto:{address}")));
            } else {
                errors.push(format!("{ctx}/contacts[{j}]: invalid mailto"));
            }
        }
        "phone" => {
            if !policy.tel.is_match(&url) {
                errors.push(format!(
                    "{ctx}/contacts[{j}]: invalid phone URL (must start 'tel:')"
                ));
            }
        }
        _ => match purify::purify_url(&url, policy).filter(|u| policy.url.is_match(u)) {
            Some(u) => {
                obj.insert("url".to_string(), Value::from(u));
            }
            None => errors.push(format!("{ctx}/contacts[{j}]: invalid URL '{url}' for page")),
        },
    }

    let date_ok = obj
        .get("verified_date")
        .and_then(Value::as_str)
        .map(|d| policy.iso_date.is_match(d))
        .unwrap_or(false);
    if !date_ok {
        if mode == RepairMode::Strict {
            warnings.push(format!(
                "{ctx}/contacts[{j}]: missing or non-ISO verified_date (set to today)"
            ));
        }
        obj.insert("verified_date".to_string(), json!(today));
    }
}

fn clean_key_link(
    item: &mut Value,
    ctx: &str,
    j: usize,
    policy: &Policy,
    errors: &mut Vec<String>,
) {
    let raw = item.get("url").and_then(Value::as_str).map(str::to_string);
    let cleaned = raw
        .as_deref()
        .and_then(|r| purify::purify_url(r, policy))
        .filter(|u| policy.url.is_match(u));

    match (cleaned, item.as_object_mut()) {
        (Some(u), Some(obj)) => {
            obj.insert("url".to_string(), Value::from(u));
        }
        _ => errors.push(format!(
            "{ctx}/key_links[{j}]: invalid url '{}'",
            raw.unwrap_or_else(|| "null".to_string())
        )),
    }
}

fn clean_trial(
    item: &mut Value,
    ctx: &str,
    j: usize,
    policy: &Policy,
    mode: RepairMode,
    errors: &mut Vec<String>,
) {
    let Some(obj) = item.as_object_mut() else {
        errors.push(format!("{ctx}/trials[{j}]: must be an object"));
        return;
    };

    // Source URLs may arrive as an array or as one string of prose.
    let raw_urls: Vec<String> = match obj.get("source_urls") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => purify::extract_https_tokens(s, policy),
        _ => {
            errors.push(format!(
                "{ctx}/trials[{j}]: source_urls must be an array or string with https URLs"
            ));
            Vec::new()
        }
    };

    // Identifier: explicit value wins, otherwise the first source URL
    // carrying an NCT token.
    let nct = obj
        .get("nct_id")
        .and_then(Value::as_str)
        .map(str::to_uppercase)
        .or_else(|| {
            raw_urls.iter().find_map(|u| {
                policy.nct.find(u).map(|m| m.as_str().to_uppercase())
            })
        });

    let mut clean_urls: Vec<String> = raw_urls
        .iter()
        .filter_map(|u| purify::purify_url(u, policy))
        .filter(|u| policy.url.is_match(u))
        .collect();

    if clean_urls.is_empty() {
        match (&nct, mode) {
            (Some(id), RepairMode::Lenient) => {
                clean_urls.push(format!("https://clinicaltrials.gov/study/{id}"));
            }
            _ => errors.push(format!(
                "{ctx}/trials[{j}]: no valid https URLs in source_urls"
            )),
        }
    }

    obj.insert("source_urls".to_string(), json!(clean_urls));
    if let Some(id) = nct {
        obj.insert("nct_id".to_string(), json!(id));
    }
}

/// Render a field value for an error message: bare text for strings, JSON
/// for everything else.
fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}
