//! URL hygiene shared by every stage.
//!
//! Persisted link fields are protocol-stripped, trailing-slash-stripped and
//! carry a lowercased host. Paths keep their case: network handles are
//! compared as written.

use crate::model::{LinkField, ScrapedRecord};

/// Remove a leading `http://` or `https://` (any case).
pub fn strip_protocol(url: &str) -> &str {
    for prefix in ["https://", "http://"] {
        if url
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            return &url[prefix.len()..];
        }
    }
    url
}

/// Normalize a raw link for storage and weak-key comparison.
///
/// Returns `None` when nothing but protocol/slashes remain.
pub fn clean_link(url: &str) -> Option<String> {
    let bare = strip_protocol(url.trim());
    let bare = bare.split("/?").next().unwrap_or_default();
    let bare = bare.trim_end_matches('/');

    let (host, path) = match bare.find('/') {
        Some(i) => bare.split_at(i),
        None => (bare, ""),
    };
    if host.is_empty() {
        return None;
    }
    Some(format!("{}{}", host.to_ascii_lowercase(), path))
}

/// Host of a website link without protocol or `www.`.
pub fn website_domain(ws: &str) -> String {
    let bare = strip_protocol(ws.trim());
    let bare = bare.strip_prefix("www.").unwrap_or(bare);
    let host = bare.split(['/', '?', '#']).next().unwrap_or_default();
    host.to_ascii_lowercase()
}

/// Rewrite legacy hosts/paths to their current canonical form and strip
/// protocols from every link field. Runs right before overrides apply.
pub fn canonicalize_record(record: &mut ScrapedRecord) {
    if let Some(tw) = record.tw.take() {
        let tw = tw
            .replace("www.twitter.com", "x.com")
            .replace("twitter.com", "x.com");
        record.tw = Some(tw);
    }

    if let Some(li) = record.li.take() {
        record.li = Some(li.replace("/company-beta/", "/company/"));
    }

    if let Some(ws) = record.ws.take() {
        let domain = website_domain(&ws);
        record.ws = (!domain.is_empty()).then_some(domain);
    }

    for field in LinkField::ALL {
        let slot = record.link_mut(field);
        if let Some(value) = slot.take() {
            let stripped = strip_protocol(&value);
            *slot = (!stripped.is_empty()).then(|| stripped.to_string());
        }
    }
}
