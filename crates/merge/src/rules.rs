//! Per-network URL rules.
//!
//! One ordered table drives both free-URL classification and selector
//! extraction. Each rule carries a single capture group (the selector) and
//! the generic paths that match syntactically but never name an entity.
//! Adding a network means adding a row.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::model::LinkField;
use crate::normalize::website_domain;

struct RuleSpec {
    field: LinkField,
    pattern: &'static str,
    generic: &'static [&'static str],
}

const HOST: &str = r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*";

/// Classification priority order.
const RULE_SPECS: [RuleSpec; 9] = [
    RuleSpec {
        field: LinkField::Li,
        pattern: r"linkedin\.com/(?:company|showcase|school)/([^/?#\s]+)",
        generic: &[],
    },
    RuleSpec {
        field: LinkField::Fb,
        pattern: r"(?:facebook|fb)\.com/([^/?#\s]+)",
        generic: &["profile.php", "home.php", "groups", "pages", "search", "people", "share"],
    },
    RuleSpec {
        field: LinkField::Tw,
        pattern: r"(?:twitter|x)\.com/(?:#!/)?([^/?#\s]+)",
        generic: &["home", "https:", "hashtag", "search", "intent", "share", "explore", "i"],
    },
    RuleSpec {
        field: LinkField::Ig,
        pattern: r"instagram\.com/([^/?#\s]+)",
        generic: &["explore", "accounts", "direct", "stories", "reels", "p"],
    },
    RuleSpec {
        field: LinkField::Gh,
        pattern: r"github\.com/([^/?#\s]+)",
        generic: &["search", "topics", "features", "marketplace", "sponsors"],
    },
    RuleSpec {
        field: LinkField::Ytp,
        pattern: r"youtube\.com/@([^/?#\s]+)",
        generic: &[],
    },
    RuleSpec {
        field: LinkField::Ytc,
        pattern: r"youtube\.com/(?:channel|c|user)/([^/?#\s]+)",
        generic: &[],
    },
    RuleSpec {
        field: LinkField::Tt,
        pattern: r"tiktok\.com/@([^/?#\s]+)",
        generic: &[],
    },
    RuleSpec {
        field: LinkField::Th,
        pattern: r"threads\.(?:net|com)/@([^/?#\s]+)",
        generic: &[],
    },
];

/// Unmatched URLs hitting one of these are dropped instead of queued for
/// manual triage.
const EXCLUDED_URLS: [&str; 8] = [
    r"(?i)youtube\.com/watch",
    r"(?i)youtube\.com/shorts",
    r"(?i)apps\.apple\.",
    r"(?i)play\.google\.",
    r"(?i)vimeo\.",
    r"(?i)greenhouse\.",
    r"(?i)consent\.yahoo\.",
    r"(?i)cnbc\.",
];

pub struct NetworkRule {
    pub field: LinkField,
    regex: Regex,
    generic: &'static [&'static str],
}

impl NetworkRule {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Capture the selector, classifying generic paths separately.
    pub fn capture(&self, url: &str) -> Option<Selector> {
        let url = if self.field == LinkField::Fb {
            url.replace("/pg/", "/").replace("/p/", "/")
        } else {
            url.to_string()
        };
        let selector = self.regex.captures(&url)?.get(1)?.as_str().to_string();
        if self.generic.iter().any(|g| g.eq_ignore_ascii_case(&selector)) {
            Some(Selector::Generic(selector))
        } else {
            Some(Selector::Entity(selector))
        }
    }
}

/// Compiled rule table in priority order.
pub fn network_rules() -> &'static [NetworkRule] {
    static RULES: OnceLock<Vec<NetworkRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        RULE_SPECS
            .iter()
            .map(|spec| NetworkRule {
                field: spec.field,
                regex: Regex::new(&format!("{HOST}{}", spec.pattern))
                    .expect("static network pattern compiles"),
                generic: spec.generic,
            })
            .collect()
    })
}

fn excluded_urls() -> &'static [Regex] {
    static EXCLUDED: OnceLock<Vec<Regex>> = OnceLock::new();
    EXCLUDED.get_or_init(|| {
        EXCLUDED_URLS
            .iter()
            .map(|p| Regex::new(p).expect("static exclusion pattern compiles"))
            .collect()
    })
}

fn rule_for(field: LinkField) -> Option<&'static NetworkRule> {
    network_rules().iter().find(|r| r.field == field)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// Path segment naming the entity on its network.
    Entity(String),
    /// Matched syntactically but is a generic page (search, home, ...).
    Generic(String),
}

impl Selector {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Entity(s) | Self::Generic(s) => s,
        }
    }

    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Entity(s) => Some(s),
            Self::Generic(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Classification {
    Network { field: LinkField, selector: String },
    Discarded { reason: String },
    /// Kept verbatim for manual triage; never auto-assigned.
    Unclassified,
}

/// Decide which typed network field a free URL belongs to.
pub fn classify(url: &str) -> Classification {
    for rule in network_rules() {
        match rule.capture(url) {
            Some(Selector::Entity(selector)) => {
                return Classification::Network {
                    field: rule.field,
                    selector,
                }
            }
            Some(Selector::Generic(path)) => {
                return Classification::Discarded {
                    reason: format!("generic {} path '{path}'", rule.field.label()),
                }
            }
            None => {}
        }
    }

    if let Some(pattern) = excluded_urls().iter().find(|re| re.is_match(url)) {
        return Classification::Discarded {
            reason: format!("excluded by {}", pattern.as_str()),
        };
    }

    Classification::Unclassified
}

/// Extract the selector of `url` for a known network. Websites use the
/// explicit domain extraction step.
pub fn extract_selector(url: &str, field: LinkField) -> Option<Selector> {
    if field == LinkField::Ws {
        let domain = website_domain(url);
        return (!domain.is_empty()).then_some(Selector::Entity(domain));
    }
    rule_for(field)?.capture(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(url: &str) -> Option<(LinkField, String)> {
        match classify(url) {
            Classification::Network { field, selector } => Some((field, selector)),
            _ => None,
        }
    }

    #[test]
    fn linkedin_company_slug() {
        assert_eq!(
            network("https://www.linkedin.com/company/acme"),
            Some((LinkField::Li, "acme".into()))
        );
        assert_eq!(
            network("linkedin.com/showcase/wordtune/"),
            Some((LinkField::Li, "wordtune".into()))
        );
        // personal profiles are not company pages
        assert_eq!(classify("https://www.linkedin.com/in/jane"), Classification::Unclassified);
    }

    #[test]
    fn twitter_search_is_discarded_not_matched() {
        assert!(matches!(
            classify("https://x.com/search?q=acme"),
            Classification::Discarded { .. }
        ));
        assert_eq!(network("https://twitter.com/acme"), Some((LinkField::Tw, "acme".into())));
        assert_eq!(network("x.com/Acme_HQ"), Some((LinkField::Tw, "Acme_HQ".into())));
    }

    #[test]
    fn x_host_needs_label_boundary() {
        assert_eq!(classify("https://netflix.com/acme"), Classification::Unclassified);
        assert_eq!(classify("https://box.com/acme"), Classification::Unclassified);
    }

    #[test]
    fn facebook_pg_prefix_is_collapsed() {
        assert_eq!(
            network("https://www.facebook.com/pg/AcmeCo/about"),
            Some((LinkField::Fb, "AcmeCo".into()))
        );
        assert!(matches!(
            classify("https://facebook.com/profile.php?id=1"),
            Classification::Discarded { .. }
        ));
    }

    #[test]
    fn youtube_profile_and_channel_are_distinct() {
        assert_eq!(
            network("https://www.youtube.com/@ai21labs"),
            Some((LinkField::Ytp, "ai21labs".into()))
        );
        assert_eq!(
            network("https://www.youtube.com/channel/UCDQlFKBK11jIxm4iVymoAtA"),
            Some((LinkField::Ytc, "UCDQlFKBK11jIxm4iVymoAtA".into()))
        );
        assert!(matches!(
            classify("https://www.youtube.com/watch?v=DyE0YkoFFEE"),
            Classification::Discarded { .. }
        ));
    }

    #[test]
    fn remaining_networks() {
        assert_eq!(network("instagram.com/acme_official"), Some((LinkField::Ig, "acme_official".into())));
        assert_eq!(network("https://github.com/AI21Labs"), Some((LinkField::Gh, "AI21Labs".into())));
        assert_eq!(network("https://www.tiktok.com/@acme"), Some((LinkField::Tt, "acme".into())));
        assert_eq!(network("https://www.threads.net/@acme"), Some((LinkField::Th, "acme".into())));
    }

    #[test]
    fn app_store_links_are_discarded_other_urls_kept() {
        assert!(matches!(
            classify("https://apps.apple.com/us/developer/ai21-labs-inc/id1628773286"),
            Classification::Discarded { .. }
        ));
        assert_eq!(classify("https://huggingface.co/ai21labs"), Classification::Unclassified);
        // websites are never auto-assigned
        assert_eq!(classify("https://www.acme.com"), Classification::Unclassified);
    }

    #[test]
    fn extract_selector_per_field() {
        assert_eq!(
            extract_selector("www.acme.com/en", LinkField::Ws),
            Some(Selector::Entity("acme.com".into()))
        );
        assert_eq!(
            extract_selector("x.com/home", LinkField::Tw),
            Some(Selector::Generic("home".into()))
        );
        assert_eq!(extract_selector("acme.com", LinkField::Li), None);
    }

    #[test]
    fn table_order_matches_priority() {
        let order: Vec<_> = network_rules().iter().map(|r| r.field).collect();
        assert_eq!(
            order,
            vec![
                LinkField::Li,
                LinkField::Fb,
                LinkField::Tw,
                LinkField::Ig,
                LinkField::Gh,
                LinkField::Ytp,
                LinkField::Ytc,
                LinkField::Tt,
                LinkField::Th,
            ]
        );
    }
}
