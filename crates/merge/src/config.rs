use std::collections::HashSet;

use serde::Deserialize;

use crate::error::MergeError;
use crate::model::{Reasons, ScrapedRecord};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Pipeline configuration. Every stage receives the slice of it it needs as
/// an immutable value; nothing here is global state.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub paths: PathsConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub known_duplicates: Vec<KnownDuplicate>,
    #[serde(default)]
    pub websites: WebsiteRules,
    #[serde(default)]
    pub static_sources: StaticSourceConfig,
    #[serde(default)]
    pub reasons: ReasonsConfig,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// File locations, relative to the config file's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directory of raw batch files, read in file-name order.
    pub batches: String,
    /// Directory of hand-maintained static lists.
    #[serde(default)]
    pub static_lists: Option<String>,
    pub overrides: String,
    #[serde(default)]
    pub alternatives: Option<String>,
    pub merged: String,
    pub patched: String,
    pub networks: String,
    #[serde(rename = "final")]
    pub final_output: String,
}

// ---------------------------------------------------------------------------
// Dedup rules
// ---------------------------------------------------------------------------

/// Entities dropped before merge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlacklistConfig {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

/// A website known to be claimed by several unrelated scrape records.
/// Every merged record carrying it is removed; `replacement`, when given,
/// is appended instead.
#[derive(Debug, Clone, Deserialize)]
pub struct KnownDuplicate {
    pub website: String,
    #[serde(default)]
    pub replacement: Option<ScrapedRecord>,
}

/// Immutable inputs to the deduplicator.
#[derive(Debug, Clone, Copy)]
pub struct DedupRules<'a> {
    pub blacklist: &'a BlacklistConfig,
    pub known_duplicates: &'a [KnownDuplicate],
}

// ---------------------------------------------------------------------------
// Website extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteRules {
    /// Domains containing any of these are not flagged.
    #[serde(default = "default_exclude_contains")]
    pub exclude_contains: Vec<String>,
    /// Domains ending with any of these are not flagged.
    #[serde(default = "default_exclude_suffixes")]
    pub exclude_suffixes: Vec<String>,
}

fn default_exclude_contains() -> Vec<String> {
    ["google.com", "business.site", ".steampowered", "meetup", ".apple.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exclude_suffixes() -> Vec<String> {
    vec![".il".into()]
}

impl Default for WebsiteRules {
    fn default() -> Self {
        Self {
            exclude_contains: default_exclude_contains(),
            exclude_suffixes: default_exclude_suffixes(),
        }
    }
}

impl WebsiteRules {
    /// Matching exclusion pattern, if the domain is excluded.
    pub fn exclusion_for(&self, domain: &str) -> Option<&str> {
        self.exclude_contains
            .iter()
            .find(|p| domain.contains(p.as_str()))
            .or_else(|| self.exclude_suffixes.iter().find(|s| domain.ends_with(s.as_str())))
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Reasons
// ---------------------------------------------------------------------------

/// Closed set of reason tags a record may carry. Anything else in a batch
/// or static list is a schema violation.
#[derive(Debug, Clone, Deserialize)]
pub struct ReasonsConfig {
    #[serde(default = "default_allowed_reasons")]
    pub allowed: Vec<String>,
}

fn default_allowed_reasons() -> Vec<String> {
    ["h", "f", "b"].into_iter().map(String::from).collect()
}

impl Default for ReasonsConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed_reasons(),
        }
    }
}

impl ReasonsConfig {
    pub fn allows(&self, tag: &str) -> bool {
        self.allowed.iter().any(|a| a == tag)
    }

    /// First tag of `reasons` outside the allowed set.
    pub fn first_unknown<'r>(&self, reasons: &'r Reasons) -> Option<&'r str> {
        reasons.iter().find(|tag| !self.allows(tag))
    }
}

// ---------------------------------------------------------------------------
// Static sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StaticSourceConfig {
    /// Reason tag given to `{name, link, relation}` entries.
    #[serde(default = "default_relation_reason")]
    pub relation_reason: String,
    /// Relation value that turns into a record; others are skipped.
    #[serde(default = "default_accepted_relation")]
    pub accepted_relation: String,
    /// Id prefix of relation-list records.
    #[serde(default = "default_relation_id_prefix")]
    pub relation_id_prefix: String,
}

fn default_relation_reason() -> String {
    "h".into()
}

fn default_accepted_relation() -> String {
    "HQ".into()
}

fn default_relation_id_prefix() -> String {
    "BIT".into()
}

impl Default for StaticSourceConfig {
    fn default() -> Self {
        Self {
            relation_reason: default_relation_reason(),
            accepted_relation: default_accepted_relation(),
            relation_id_prefix: default_relation_id_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, MergeError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| MergeError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.name.trim().is_empty() {
            return Err(MergeError::ConfigValidation("name must not be empty".into()));
        }

        let required = [
            ("paths.batches", &self.paths.batches),
            ("paths.overrides", &self.paths.overrides),
            ("paths.merged", &self.paths.merged),
            ("paths.patched", &self.paths.patched),
            ("paths.networks", &self.paths.networks),
            ("paths.final", &self.paths.final_output),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(MergeError::ConfigValidation(format!("{key} must not be empty")));
            }
        }

        let mut seen = HashSet::new();
        for dup in &self.known_duplicates {
            if dup.website.trim().is_empty() {
                return Err(MergeError::ConfigValidation(
                    "known_duplicates entry has an empty website".into(),
                ));
            }
            if !seen.insert(dup.website.as_str()) {
                return Err(MergeError::ConfigValidation(format!(
                    "known_duplicates lists '{}' twice",
                    dup.website
                )));
            }
        }

        if self.static_sources.relation_reason.trim().is_empty() {
            return Err(MergeError::ConfigValidation(
                "static_sources.relation_reason must not be empty".into(),
            ));
        }

        if self.reasons.allowed.iter().any(|r| r.trim().is_empty()) {
            return Err(MergeError::ConfigValidation(
                "reasons.allowed must not contain an empty tag".into(),
            ));
        }
        if !self.reasons.allows(&self.static_sources.relation_reason) {
            return Err(MergeError::ConfigValidation(format!(
                "static_sources.relation_reason '{}' is not in reasons.allowed",
                self.static_sources.relation_reason
            )));
        }

        Ok(())
    }

    pub fn dedup_rules(&self) -> DedupRules<'_> {
        DedupRules {
            blacklist: &self.blacklist,
            known_duplicates: &self.known_duplicates,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "companies"

[paths]
batches = "results/1_batches"
static_lists = "static"
overrides = "overrides.json"
merged = "results/2_merged/MERGED_RAW.json"
patched = "results/2_merged/MERGED_ALL.json"
networks = "results/3_networks"
final = "results/4_final/ALL.json"

[blacklist]
ids = ["corvid", "sajilni"]
names = ["Red Alert"]

[[known_duplicates]]
website = "shared.example.com"

[[known_duplicates]]
website = "group.example.com"
replacement = { id = "group", name = "Group", reasons = ["h"], ws = "group.example.com" }
"#;

    #[test]
    fn parse_valid() {
        let config = PipelineConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "companies");
        assert_eq!(config.paths.final_output, "results/4_final/ALL.json");
        assert_eq!(config.paths.alternatives, None);
        assert_eq!(config.blacklist.ids.len(), 2);
        assert_eq!(config.known_duplicates.len(), 2);
        let replacement = config.known_duplicates[1].replacement.as_ref().unwrap();
        assert_eq!(replacement.ws.as_deref(), Some("group.example.com"));
    }

    #[test]
    fn defaults_fill_website_and_static_sections() {
        let config = PipelineConfig::from_toml(VALID).unwrap();
        assert!(config.websites.exclude_suffixes.contains(&".il".to_string()));
        assert_eq!(config.websites.exclusion_for("maps.google.com"), Some("google.com"));
        assert_eq!(config.websites.exclusion_for("acme.co.il"), Some(".il"));
        assert_eq!(config.websites.exclusion_for("acme.com"), None);
        assert_eq!(config.static_sources.relation_reason, "h");
        assert_eq!(config.static_sources.accepted_relation, "HQ");
    }

    #[test]
    fn reject_empty_path() {
        let input = VALID.replace(r#"networks = "results/3_networks""#, r#"networks = """#);
        let err = PipelineConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("paths.networks"));
    }

    #[test]
    fn reject_repeated_known_duplicate() {
        let input = format!(
            r#"{VALID}
[[known_duplicates]]
website = "shared.example.com"
"#
        );
        let err = PipelineConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn reject_missing_required_path() {
        let input = VALID.replace(r#"overrides = "overrides.json""#, "");
        let err = PipelineConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, MergeError::ConfigParse(_)));
    }

    #[test]
    fn reasons_default_to_known_codes() {
        let config = PipelineConfig::from_toml(VALID).unwrap();
        assert!(config.reasons.allows("h"));
        assert!(config.reasons.allows("b"));
        assert!(!config.reasons.allows("x"));
        let reasons = Reasons::new(["h", "hq"]);
        assert_eq!(config.reasons.first_unknown(&reasons), Some("hq"));
    }

    #[test]
    fn relation_reason_must_be_allowed() {
        let input = format!(
            r#"{VALID}
[reasons]
allowed = ["f", "b"]
"#
        );
        let err = PipelineConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, MergeError::ConfigValidation(_)));
        assert!(err.to_string().contains("relation_reason"));
    }
}
