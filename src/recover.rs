//! Recovery parser: turn pasted generator output into parsed JSON.
//!
//! Pasted model output commonly arrives wrapped in code fences or BEGIN/END
//! sentinel lines, with markdown-wrapped links, curly quotes, trailing
//! commas, or stray prose around the object. Recovery applies mechanical
//! repairs in two escalating passes until `serde_json` accepts the text, and
//! reports a positional diagnostic when both passes fail.

use crate::error::{LintError, Result};
use crate::policy::Policy;
use serde_json::Value;
use tracing::debug;

/// Recover a document from raw text.
///
/// The mild pass strips wrappers, unwraps markdown links, rewrites the
/// legacy ClinicalTrials URL shape, and upgrades quoted `http://` schemes.
/// If that text does not parse, the aggressive pass additionally replaces
/// curly quotes, isolates the first balanced top-level object, and strips
/// trailing commas. Passing `aggressive: true` skips straight to the
/// aggressive pass.
pub fn recover(raw: &str, aggressive: bool, policy: &Policy) -> Result<Value> {
    if !aggressive {
        let text = preclean(raw, false, policy);
        match serde_json::from_str(&text) {
            Ok(doc) => return Ok(doc),
            Err(e) => {
                debug!(line = e.line(), column = e.column(), "mild pass failed, escalating");
            }
        }
    }

    let text = preclean(raw, true, policy);
    serde_json::from_str(&text).map_err(|e| {
        let pos = byte_offset(&text, e.line(), e.column());
        LintError::Recovery {
            line: e.line(),
            column: e.column(),
            snippet: snippet_around(&text, pos),
        }
    })
}

/// Mechanical hygiene applied before any JSON parse attempt.
///
/// Steps are cumulative: each one rewrites the working text for the next.
pub fn preclean(raw: &str, aggressive: bool, policy: &Policy) -> String {
    let mut text = strip_wrappers(strip_bom(raw));
    text = unwrap_markdown_links(&text, policy);
    text = policy
        .ctgov_text
        .replace_all(&text, "https://clinicaltrials.gov/study/$1")
        .into_owned();
    // Scheme upgrade only immediately after a quote, i.e. inside what looks
    // like a JSON string value.
    text = text.replace("\"http://", "\"https://");

    if aggressive {
        text = replace_curly_quotes(&text);
        if let Some(candidate) = extract_first_object(&text) {
            text = candidate.to_string();
        }
        text = policy.trailing_comma.replace_all(&text, "$1").into_owned();
    }

    text
}

fn strip_bom(text: &str) -> &str {
    text.trim_start_matches('\u{feff}')
}

/// Drop lines that are only wrapper noise: code-fence markers and
/// BEGIN/END JSON or MARKDOWN sentinels. The test is on the whole trimmed
/// line, not a substring.
fn strip_wrappers(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let l = line.trim();
            if l.starts_with("```") {
                return false;
            }
            !matches!(
                l.to_ascii_uppercase().as_str(),
                "BEGIN JSON" | "END JSON" | "BEGIN MARKDOWN" | "END MARKDOWN"
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[label](https://u)` -> `https://u`, `[https://u]` -> `https://u`, plus
/// repair of common link-boundary artifacts left by partial unwrapping.
fn unwrap_markdown_links(text: &str, policy: &Policy) -> String {
    let mut t = policy.md_link.replace_all(text, "$2").into_owned();
    t = policy.md_bracket_url.replace_all(&t, "$1").into_owned();
    t = t.replace("\"[https://", "\"https://");
    t = t.replace("](", "");
    t = t.replace(")]", ")");
    t
}

fn replace_curly_quotes(text: &str) -> String {
    text.replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

/// Extract the first balanced top-level `{...}` substring.
///
/// The scanner tracks string and escape state so literal braces inside
/// quoted text do not unbalance the count. Returns `None` when no balanced
/// object exists.
fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;

    for (i, ch) in text[start..].char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if ch == '\\' {
                esc = true;
            } else if ch == '"' {
                in_str = false;
            }
        } else {
            match ch {
                '"' => in_str = true,
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(&text[start..start + i + ch.len_utf8()]);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Byte offset of a 1-based (line, column) position, clamped to the text.
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (n, l) in text.split_inclusive('\n').enumerate() {
        if n + 1 == line.max(1) {
            break;
        }
        offset += l.len();
    }

    let mut pos = offset;
    let mut remaining = column.saturating_sub(1);
    for ch in text[offset..].chars() {
        if remaining == 0 || ch == '\n' {
            break;
        }
        pos += ch.len_utf8();
        remaining -= 1;
    }
    pos.min(text.len())
}

/// A +/-60 character window around `pos`, on char boundaries.
fn snippet_around(text: &str, pos: usize) -> String {
    let start = text[..pos]
        .char_indices()
        .rev()
        .nth(59)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[pos..]
        .char_indices()
        .nth(60)
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len());
    text[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> Policy {
        Policy::new().expect("policy compiles")
    }

    #[test]
    fn test_clean_json_parses_on_mild_pass() {
        let doc = recover(r#"{"people": [], "people_count": 0}"#, false, &policy())
            .expect("clean JSON recovers");
        assert_eq!(doc["people_count"], json!(0));
    }

    #[test]
    fn test_fences_trailing_commas_curly_quotes_recover() {
        let noisy = "```json\n{\n \u{201c}people\u{201d}: [{\u{201c}id\u{201d}: \u{201c}p1\u{201d}},],\n \"people_count\": 1\n}\n```";
        let clean = r#"{"people": [{"id": "p1"}], "people_count": 1}"#;

        let recovered = recover(noisy, false, &policy()).expect("noisy paste recovers");
        let expected: Value = serde_json::from_str(clean).expect("clean equivalent parses");
        assert_eq!(recovered, expected);
    }

    #[test]
    fn test_sentinel_lines_stripped() {
        let text = "BEGIN JSON\n{\"people\": []}\nEND JSON";
        let doc = recover(text, false, &policy()).expect("sentinels stripped");
        assert!(doc["people"].as_array().map(Vec::is_empty).unwrap_or(false));
    }

    #[test]
    fn test_sentinel_test_is_whole_line() {
        // A value merely containing the sentinel text must survive.
        let text = r#"{"note": "the END JSON marker"}"#;
        let doc = recover(text, false, &policy()).expect("substring sentinel kept");
        assert_eq!(doc["note"], json!("the END JSON marker"));
    }

    #[test]
    fn test_markdown_link_unwrapped_before_parse() {
        let text = r#"{"url": "[Study Page](https://example.org/a)"}"#;
        let doc = recover(text, false, &policy()).expect("markdown link unwraps");
        assert_eq!(doc["url"], json!("https://example.org/a"));
    }

    #[test]
    fn test_bracketed_url_unwrapped() {
        let text = r#"{"url": "[https://example.org/a]"}"#;
        let doc = recover(text, false, &policy()).expect("bracketed URL unwraps");
        assert_eq!(doc["url"], json!("https://example.org/a"));
    }

    #[test]
    fn test_ctgov_show_rewritten_in_raw_text() {
        let text = r#"{"u": "https://clinicaltrials.gov/ct2/show/NCT01234567"}"#;
        let doc = recover(text, false, &policy()).expect("ctgov text rewrite");
        assert_eq!(doc["u"], json!("https://clinicaltrials.gov/study/NCT01234567"));
    }

    #[test]
    fn test_quoted_http_upgraded() {
        let text = r#"{"u": "http://example.org/x"}"#;
        let doc = recover(text, false, &policy()).expect("scheme upgraded");
        assert_eq!(doc["u"], json!("https://example.org/x"));
    }

    #[test]
    fn test_object_extracted_from_surrounding_prose() {
        let text = "Here is the cleaned output: {\"a\": \"brace } inside\", \"n\": 2} hope it helps";
        let doc = recover(text, true, &policy()).expect("object isolated from prose");
        assert_eq!(doc["n"], json!(2));
        assert_eq!(doc["a"], json!("brace } inside"));
    }

    #[test]
    fn test_scanner_respects_escaped_quotes() {
        let text = r#"prose {"a": "say \"hi\" {x}", "b": 1} trailer"#;
        let doc = recover(text, true, &policy()).expect("escaped quotes tracked");
        assert_eq!(doc["b"], json!(1));
    }

    #[test]
    fn test_unrecoverable_text_reports_position() {
        let err = recover("this is not JSON at all", true, &policy())
            .expect_err("prose alone cannot recover");
        match err {
            LintError::Recovery { line, column, snippet } => {
                assert_eq!(line, 1);
                assert!(column >= 1);
                assert!(!snippet.is_empty());
            }
            other => panic!("expected Recovery error, got {other}"),
        }
    }

    #[test]
    fn test_bom_stripped() {
        let text = "\u{feff}{\"people\": []}";
        assert!(recover(text, false, &policy()).is_ok());
    }
}
