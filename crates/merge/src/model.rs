use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Link fields
// ---------------------------------------------------------------------------

/// Typed presence link. Serialized with the short codes used in every
/// pipeline file (`ws`, `li`, `fb`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkField {
    Ws,
    Li,
    Fb,
    Tw,
    Ig,
    Gh,
    Ytp,
    Ytc,
    Tt,
    Th,
}

impl LinkField {
    /// Fixed fold order for extraction and assembly.
    pub const ALL: [LinkField; 10] = [
        Self::Ws,
        Self::Li,
        Self::Fb,
        Self::Tw,
        Self::Ig,
        Self::Gh,
        Self::Ytp,
        Self::Ytc,
        Self::Tt,
        Self::Th,
    ];

    /// Keys the deduplicator collapses on. Name is never one of them.
    pub const WEAK_KEYS: [LinkField; 4] = [Self::Ws, Self::Li, Self::Fb, Self::Tw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Li => "li",
            Self::Fb => "fb",
            Self::Tw => "tw",
            Self::Ig => "ig",
            Self::Gh => "gh",
            Self::Ytp => "ytp",
            Self::Ytc => "ytc",
            Self::Tt => "tt",
            Self::Th => "th",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == code)
    }

    /// File stem of this network's extraction output.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Ws => "websites",
            Self::Li => "linkedin",
            Self::Fb => "facebook",
            Self::Tw => "twitter",
            Self::Ig => "instagram",
            Self::Gh => "github",
            Self::Ytp => "youtube_profile",
            Self::Ytc => "youtube_channel",
            Self::Tt => "tiktok",
            Self::Th => "threads",
        }
    }

    pub fn from_file_stem(stem: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.file_stem() == stem)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ws => "Website",
            Self::Li => "LinkedIn",
            Self::Fb => "Facebook",
            Self::Tw => "Twitter",
            Self::Ig => "Instagram",
            Self::Gh => "GitHub",
            Self::Ytp => "YouTube profile",
            Self::Ytc => "YouTube channel",
            Self::Tt => "TikTok",
            Self::Th => "Threads",
        }
    }
}

impl fmt::Display for LinkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reasons
// ---------------------------------------------------------------------------

/// Ordered set of reason tags. Insertion order is kept so merged output
/// stays stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Reasons(Vec<String>);

impl Reasons {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reasons = Self::default();
        for tag in tags {
            reasons.insert(tag.into());
        }
        reasons
    }

    pub fn insert(&mut self, tag: String) {
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    /// Append every tag of `other` not already present.
    pub fn union(&mut self, other: &Reasons) {
        for tag in &other.0 {
            self.insert(tag.clone());
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Reasons {
    fn from(tags: Vec<String>) -> Self {
        Self::new(tags)
    }
}

impl From<Reasons> for Vec<String> {
    fn from(reasons: Reasons) -> Self {
        reasons.0
    }
}

// ---------------------------------------------------------------------------
// Scraped records
// ---------------------------------------------------------------------------

/// Treat `""` and whitespace-only strings as absent.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedLink {
    pub name: String,
    pub link: String,
}

/// One company observation from a scrape batch or static list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub id: String,
    pub name: String,
    pub reasons: Reasons,

    #[serde(rename = "cbLink", default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub cb_link: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub li: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub fb: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub tw: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub ig: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub gh: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub ytp: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub ytc: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub tt: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub th: Option<String>,

    #[serde(alias = "stockSymbol", default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub stock_symbol: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub stock_exchange_symbol: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub hq_postal_code: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "cbRank", default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub cb_rank: Option<String>,
    #[serde(rename = "estRevenue", default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub est_revenue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industries: Option<Vec<String>>,
    #[serde(rename = "industryGroups", default, skip_serializing_if = "Option::is_none")]
    pub industry_groups: Option<Vec<String>>,
    #[serde(rename = "founderIds", default, skip_serializing_if = "Option::is_none")]
    pub founder_ids: Option<Vec<NamedLink>>,
    #[serde(rename = "investorIds", default, skip_serializing_if = "Option::is_none")]
    pub investor_ids: Option<Vec<NamedLink>>,
    #[serde(rename = "acquirerIds", default, skip_serializing_if = "Option::is_none")]
    pub acquirer_ids: Option<Vec<NamedLink>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquirer_identifier: Option<Vec<NamedLink>>,
}

/// Serialized keys of [`ScrapedRecord`], in declaration order. A scrape may
/// carry any of them blank, so each one is a legal override target.
pub const RECORD_KEYS: [&str; 26] = [
    "id",
    "name",
    "reasons",
    "cbLink",
    "ws",
    "li",
    "fb",
    "tw",
    "ig",
    "gh",
    "ytp",
    "ytc",
    "tt",
    "th",
    "stock_symbol",
    "stock_exchange_symbol",
    "hq_postal_code",
    "description",
    "cbRank",
    "estRevenue",
    "industries",
    "industryGroups",
    "founderIds",
    "investorIds",
    "acquirerIds",
    "acquirer_identifier",
];

/// Serialized key for `key`, resolving input aliases.
pub fn record_key(key: &str) -> Option<&'static str> {
    match key {
        "stockSymbol" => Some("stock_symbol"),
        _ => RECORD_KEYS.iter().copied().find(|k| *k == key),
    }
}

impl ScrapedRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, reasons: Reasons) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reasons,
            ..Default::default()
        }
    }

    pub fn link(&self, field: LinkField) -> Option<&str> {
        match field {
            LinkField::Ws => self.ws.as_deref(),
            LinkField::Li => self.li.as_deref(),
            LinkField::Fb => self.fb.as_deref(),
            LinkField::Tw => self.tw.as_deref(),
            LinkField::Ig => self.ig.as_deref(),
            LinkField::Gh => self.gh.as_deref(),
            LinkField::Ytp => self.ytp.as_deref(),
            LinkField::Ytc => self.ytc.as_deref(),
            LinkField::Tt => self.tt.as_deref(),
            LinkField::Th => self.th.as_deref(),
        }
    }

    pub fn link_mut(&mut self, field: LinkField) -> &mut Option<String> {
        match field {
            LinkField::Ws => &mut self.ws,
            LinkField::Li => &mut self.li,
            LinkField::Fb => &mut self.fb,
            LinkField::Tw => &mut self.tw,
            LinkField::Ig => &mut self.ig,
            LinkField::Gh => &mut self.gh,
            LinkField::Ytp => &mut self.ytp,
            LinkField::Ytc => &mut self.ytc,
            LinkField::Tt => &mut self.tt,
            LinkField::Th => &mut self.th,
        }
    }

    /// Set a link field; empty values clear it.
    pub fn set_link(&mut self, field: LinkField, value: Option<String>) {
        *self.link_mut(field) = value.filter(|v| !v.is_empty());
    }

    /// First weak key with the same non-empty value on both records.
    pub fn shared_weak_key(&self, other: &ScrapedRecord) -> Option<LinkField> {
        LinkField::WEAK_KEYS.into_iter().find(|&field| {
            matches!((self.link(field), other.link(field)), (Some(a), Some(b)) if a == b)
        })
    }

    pub fn has_weak_key(&self) -> bool {
        LinkField::WEAK_KEYS.iter().any(|&f| self.link(f).is_some())
    }
}

// ---------------------------------------------------------------------------
// Extraction + assembly output
// ---------------------------------------------------------------------------

/// One per-network extraction entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedEntry {
    pub id: String,
    pub selector: String,
    pub name: String,
    pub reasons: Reasons,
    #[serde(rename = "s", alias = "stockSymbol", default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub stock_symbol: Option<String>,
}

impl FlaggedEntry {
    pub fn from_record(record: &ScrapedRecord, selector: impl Into<String>) -> Self {
        Self {
            id: record.id.clone(),
            selector: selector.into(),
            name: record.name.clone(),
            reasons: record.reasons.clone(),
            stock_symbol: record.stock_symbol.clone(),
        }
    }
}

/// Canonical per-entity record in the distribution file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    pub id: String,
    #[serde(rename = "r")]
    pub reasons: Reasons,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub li: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ytp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ytc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub th: Option<String>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub stock_symbol: Option<String>,
    #[serde(rename = "alt", default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<serde_json::Value>,
}

impl FinalRecord {
    pub fn from_entry(entry: &FlaggedEntry) -> Self {
        Self {
            id: entry.id.clone(),
            reasons: entry.reasons.clone(),
            name: entry.name.clone(),
            ws: None,
            li: None,
            fb: None,
            tw: None,
            ig: None,
            gh: None,
            ytp: None,
            ytc: None,
            tt: None,
            th: None,
            stock_symbol: entry.stock_symbol.clone(),
            alternatives: None,
        }
    }

    pub fn selector(&self, field: LinkField) -> Option<&str> {
        match field {
            LinkField::Ws => self.ws.as_deref(),
            LinkField::Li => self.li.as_deref(),
            LinkField::Fb => self.fb.as_deref(),
            LinkField::Tw => self.tw.as_deref(),
            LinkField::Ig => self.ig.as_deref(),
            LinkField::Gh => self.gh.as_deref(),
            LinkField::Ytp => self.ytp.as_deref(),
            LinkField::Ytc => self.ytc.as_deref(),
            LinkField::Tt => self.tt.as_deref(),
            LinkField::Th => self.th.as_deref(),
        }
    }

    pub fn selector_mut(&mut self, field: LinkField) -> &mut Option<String> {
        match field {
            LinkField::Ws => &mut self.ws,
            LinkField::Li => &mut self.li,
            LinkField::Fb => &mut self.fb,
            LinkField::Tw => &mut self.tw,
            LinkField::Ig => &mut self.ig,
            LinkField::Gh => &mut self.gh,
            LinkField::Ytp => &mut self.ytp,
            LinkField::Ytc => &mut self.ytc,
            LinkField::Tt => &mut self.tt,
            LinkField::Th => &mut self.th,
        }
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Output order for every persisted array: case-insensitive name, then the
/// exact name, then id so equal names still sort deterministically.
pub fn by_name(a_name: &str, a_id: &str, b_name: &str, b_id: &str) -> Ordering {
    a_name
        .to_lowercase()
        .cmp(&b_name.to_lowercase())
        .then_with(|| a_name.cmp(b_name))
        .then_with(|| a_id.cmp(b_id))
}

pub fn sort_records(records: &mut [ScrapedRecord]) {
    records.sort_by(|a, b| by_name(&a.name, &a.id, &b.name, &b.id));
}
