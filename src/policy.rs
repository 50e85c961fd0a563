//! Lint policy: allowed enums, URL grammars, and tracking-parameter lists.
//!
//! The policy is immutable configuration. It is built once at process start
//! via [`Policy::new`] and passed by reference into the recovery parser, the
//! URL purifier, and the validator. Nothing mutates it at runtime.

use crate::error::{LintError, Result};
use regex::Regex;

/// Section labels a person record may be filed under.
pub const ALLOWED_SECTIONS: &[&str] = &[
    "Care & Management",
    "Trials & Translational",
    "Models & Assays",
    "Registries & Biobanks",
];

/// Evidence tags recognized by the linter.
pub const ALLOWED_TAGS: &[&str] = &[
    "peer_reviewed",
    "preprint",
    "trial_registry",
    "case_series",
    "review_consensus",
    "dataset_protocol",
    "news_talk",
    "preclinical_rescue_in_vitro",
    "preclinical_rescue_in_vivo",
    "patent_grant",
];

/// Query keys dropped from every URL, matched case-sensitively by prefix.
pub const TRACKING_PREFIXES: &[&str] =
    &["utm_", "gclid", "fbclid", "mc_cid", "mc_eid", "igshid", "ref"];

/// Inclusive word-count bounds for `summary_text`.
pub const SUMMARY_WORDS_MIN: usize = 140;
pub const SUMMARY_WORDS_MAX: usize = 220;

/// Compiled grammars and extraction patterns used across the pipeline.
///
/// Field names follow what each pattern recognizes, not where it is used;
/// several are shared between the recovery parser and the validator.
pub struct Policy {
    /// Canonical URL grammar: `https://` followed by no whitespace or brackets
    pub url: Regex,
    /// RFC-ish email address (local@domain.tld)
    pub email: Regex,
    /// ISO calendar date (YYYY-MM-DD)
    pub iso_date: Regex,
    /// `tel:` URL: optional `+`, then digits and phone punctuation
    pub tel: Regex,
    /// A bare `https://…` token embedded in arbitrary text
    pub https_token: Regex,
    /// One word token, for summary word counts
    pub word: Regex,
    /// ClinicalTrials identifier (NCT + 8 digits), case-insensitive
    pub nct: Regex,
    /// Legacy ClinicalTrials "show" URL, anchored (single-URL rewrite)
    pub ctgov_show: Regex,
    /// Legacy ClinicalTrials "show" URL, unanchored (raw-text rewrite)
    pub ctgov_text: Regex,
    /// bioRxiv/medRxiv content URL carrying a recoverable DOI
    pub preprint_content: Regex,
    /// Markdown link `[label](https://url)`
    pub md_link: Regex,
    /// Bracketed bare URL `[https://url]`
    pub md_bracket_url: Regex,
    /// Trailing comma immediately before a closing brace/bracket
    pub trailing_comma: Regex,
}

impl Policy {
    /// Compile the full pattern set.
    ///
    /// Fails only on a broken pattern constant, which is a build-time defect;
    /// callers construct the policy once and share it.
    pub fn new() -> Result<Self> {
        Ok(Self {
            url: compile(r"^https://[^\s\[\]()]+$")?,
            email: compile(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")?,
            iso_date: compile(r"^\d{4}-\d{2}-\d{2}$")?,
            tel: compile(r"^tel:\+?[0-9().\-\s]+$")?,
            https_token: compile(r#"https://[^\s\[\]()"]+"#)?,
            word: compile(r"\w+")?,
            nct: compile(r"(?i)NCT[0-9]{8}")?,
            ctgov_show: compile(r"(?i)^https://clinicaltrials\.gov/ct2/show/(NCT[0-9]{8})$")?,
            ctgov_text: compile(r"https://clinicaltrials\.gov/ct2/show/(NCT[0-9]{8})")?,
            preprint_content: compile(
                r"(?i)^https?://(?:www\.)?(?:bio|med)rxiv\.org/content/(10\.1101/[^/\s?#]+?)(?:v\d+)?(?:[./]full\.pdf)?$",
            )?,
            md_link: compile(r"\[([^\]]+)\]\((https?://[^\s)]+)\)")?,
            md_bracket_url: compile(r"\[(https?://[^\]\s)]+)\]")?,
            trailing_comma: compile(r",(\s*[}\]])")?,
        })
    }

    /// Whether `section` is one of the allowed category labels.
    pub fn is_allowed_section(&self, section: &str) -> bool {
        ALLOWED_SECTIONS.contains(&section)
    }

    /// Whether `tag` is a recognized evidence tag.
    pub fn is_allowed_tag(&self, tag: &str) -> bool {
        ALLOWED_TAGS.contains(&tag)
    }

    /// Whether a query key names a tracking parameter (case-sensitive prefix match).
    pub fn is_tracking_key(&self, key: &str) -> bool {
        TRACKING_PREFIXES.iter().any(|p| key.starts_with(p))
    }

    /// Word-boundary token count, so hyphenated and punctuated text counts
    /// the same regardless of spacing.
    pub fn word_count(&self, text: &str) -> usize {
        self.word.find_iter(text).count()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| LintError::Config(format!("bad pattern {pattern}: {e}")))
}
