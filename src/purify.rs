//! URL purification: one deterministic canonical form per URL.
//!
//! `purify_url` is idempotent and never fails on malformed input; anything
//! that does not contain an `https://` token comes back as `None`
//! (unrecoverable). The preprint-to-DOI rewrite is separate because it only
//! applies to evidence URLs tagged as preprints.

use crate::policy::Policy;
use url::Url;

/// Canonicalize a single URL-shaped string.
///
/// Extraction picks the **last** `https://` token in the input: leading junk
/// (truncated partial URLs, markdown debris) is more common than trailing
/// junk in pasted input, and a clean URL is its own last token. Bulk fields
/// use [`extract_https_tokens`] instead, which keeps every token.
pub fn purify_url(raw: &str, policy: &Policy) -> Option<String> {
    let upgraded = match raw.trim().strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => raw.trim().to_string(),
    };
    let token = last_https_token(&upgraded, policy)?;

    let rebuilt = match Url::parse(&token) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(k, _)| !policy.is_tracking_key(k))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                parsed.set_query(None);
            } else {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(kept)
                    .finish();
                parsed.set_query(Some(&query));
            }
            parsed.to_string()
        }
        // Best effort for tokens the URL parser rejects: drop the fragment
        // and keep the rest verbatim.
        Err(_) => token.split('#').next().unwrap_or(&token).to_string(),
    };

    let rewritten = normalize_ctgov(&rebuilt, policy);
    Some(rewritten.trim_end_matches([')', ']']).to_string())
}

/// Rewrite the legacy ClinicalTrials "show" path to its "study" form.
/// Anything else passes through unchanged.
pub fn normalize_ctgov(url: &str, policy: &Policy) -> String {
    policy
        .ctgov_show
        .replace(url, "https://clinicaltrials.gov/study/$1")
        .into_owned()
}

/// Rewrite a bioRxiv/medRxiv content URL to its DOI landing form when a DOI
/// can be recovered from the path. Non-preprint URLs pass through unchanged.
pub fn preprint_to_doi(url: &str, policy: &Policy) -> String {
    match policy.preprint_content.captures(url) {
        Some(caps) => format!("https://doi.org/{}", &caps[1]),
        None => url.to_string(),
    }
}

/// All `https://` tokens in `text`, in order of appearance.
pub fn extract_https_tokens(text: &str, policy: &Policy) -> Vec<String> {
    policy
        .https_token
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The last `https://` token in `text`, if any.
pub fn last_https_token(text: &str, policy: &Policy) -> Option<String> {
    policy
        .https_token
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_string())
}

/// Whether the URL points at a known preprint server.
pub fn is_preprint_host(url: &str) -> bool {
    url.contains("biorxiv.org") || url.contains("medrxiv.org")
}

/// Whether the URL is already in DOI landing form for a preprint.
pub fn is_doi_landing(url: &str) -> bool {
    url.starts_with("https://doi.org/10.1101/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::new().expect("policy compiles")
    }

    #[test]
    fn test_purify_is_idempotent() {
        let p = policy();
        let inputs = [
            "https://example.org/a?utm_source=x&id=1#frag",
            "see [here](https://example.org/b)",
            "https://clinicaltrials.gov/ct2/show/NCT01234567",
            "junk https://one.org/x then https://two.org/y",
            "https://example.org/path)",
        ];
        for input in inputs {
            let once = purify_url(input, &p).expect("first pass succeeds");
            let twice = purify_url(&once, &p).expect("second pass succeeds");
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_tracking_params_dropped_others_kept() {
        let p = policy();
        let out = purify_url("https://example.org/a?utm_source=x&id=1", &p)
            .expect("purifies");
        assert_eq!(out, "https://example.org/a?id=1");
    }

    #[test]
    fn test_fragment_always_dropped() {
        let p = policy();
        let out = purify_url("https://example.org/a#:~:text=highlight", &p).expect("purifies");
        assert_eq!(out, "https://example.org/a");
        let out = purify_url("https://example.org/a#section-2", &p).expect("purifies");
        assert_eq!(out, "https://example.org/a");
    }

    #[test]
    fn test_ctgov_legacy_path_rewritten() {
        let p = policy();
        let out = purify_url("https://clinicaltrials.gov/ct2/show/NCT01234567", &p)
            .expect("purifies");
        assert_eq!(out, "https://clinicaltrials.gov/study/NCT01234567");
    }

    #[test]
    fn test_http_upgraded_to_https() {
        let p = policy();
        let out = purify_url("http://example.org/a", &p).expect("purifies");
        assert_eq!(out, "https://example.org/a");
    }

    #[test]
    fn test_last_token_extraction_policy() {
        let p = policy();
        // Leading junk, including a truncated partial URL, precedes the real one.
        let out = purify_url("https://trunc... real: https://example.org/real", &p);
        assert_eq!(out.as_deref(), Some("https://example.org/real"));
        assert_eq!(
            last_https_token("a https://one.org b https://two.org c", &p).as_deref(),
            Some("https://two.org")
        );
    }

    #[test]
    fn test_bulk_extraction_keeps_all_tokens_in_order() {
        let p = policy();
        let tokens = extract_https_tokens(
            "sources: https://one.org/x and https://two.org/y",
            &p,
        );
        assert_eq!(tokens, vec!["https://one.org/x", "https://two.org/y"]);
    }

    #[test]
    fn test_markdown_debris_stripped() {
        let p = policy();
        let out = purify_url("[Study Page](https://example.org/a)", &p);
        assert_eq!(out.as_deref(), Some("https://example.org/a"));
    }

    #[test]
    fn test_unrecoverable_returns_none() {
        let p = policy();
        assert!(purify_url("no url here", &p).is_none());
        assert!(purify_url("", &p).is_none());
        assert!(purify_url("ftp://example.org/file", &p).is_none());
    }

    #[test]
    fn test_preprint_doi_rewrite() {
        let p = policy();
        let out = preprint_to_doi(
            "https://www.biorxiv.org/content/10.1101/2021.01.01.425000v2.full.pdf",
            &p,
        );
        assert_eq!(out, "https://doi.org/10.1101/2021.01.01.425000");
    }

    #[test]
    fn test_preprint_doi_rewrite_variants() {
        let p = policy();
        assert_eq!(
            preprint_to_doi("https://www.medrxiv.org/content/10.1101/2023.03.07.23286901v1", &p),
            "https://doi.org/10.1101/2023.03.07.23286901"
        );
        assert_eq!(
            preprint_to_doi("https://biorxiv.org/content/10.1101/2020.12.01.406637/full.pdf", &p),
            "https://doi.org/10.1101/2020.12.01.406637"
        );
        // No recoverable DOI: unchanged.
        assert_eq!(
            preprint_to_doi("https://www.biorxiv.org/about", &p),
            "https://www.biorxiv.org/about"
        );
        // Non-preprint hosts pass through.
        assert_eq!(
            preprint_to_doi("https://example.org/content/10.1101/x", &p),
            "https://example.org/content/10.1101/x"
        );
    }
}
