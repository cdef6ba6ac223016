//! Field annotations
//!
//! A tag is the metadata attached to one member of a record, written as a
//! sequence of `key:"value"` pairs separated by whitespace:
//!
//! ```text
//! csv:"id" table:"order_id" TYPE:"VARCHAR(10)" PK:"yes"
//! ```
//!
//! The key chosen as the active tag key decides naming and inclusion, the
//! remaining keys are auxiliary attributes read by consumers such as the SQL
//! statement generator.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// One `key:"value"` pair at the start of the remaining annotation text.
/// Keys exclude whitespace, control characters, quotes and colons.
static TAG_PAIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*([^\s\x00-\x1f":]+):"((?:[^"\\]|\\.)*)""#).unwrap()
});

/// Value that excludes a member and its whole subtree
pub const EXCLUDE: &str = "-";

/// Typed attribute key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrKey {
    /// `PK`: marks a primary-key column when set to `yes`
    PrimaryKey,
    /// `TYPE`: column type used in schema statements
    SqlType,
    /// Any other key, including naming schemes such as `csv` or `table`
    Named(String),
}

impl AttrKey {
    pub fn as_str(&self) -> &str {
        match self {
            AttrKey::PrimaryKey => "PK",
            AttrKey::SqlType => "TYPE",
            AttrKey::Named(key) => key,
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.as_str() == key
    }
}

impl From<&str> for AttrKey {
    fn from(key: &str) -> Self {
        match key {
            "PK" => AttrKey::PrimaryKey,
            "TYPE" => AttrKey::SqlType,
            other => AttrKey::Named(other.to_string()),
        }
    }
}

/// Parsed annotation of a single member
///
/// Cloning is cheap: attributes live behind an `Arc` so every emitted field
/// can carry the tag of its leaf.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Tag {
    attrs: Arc<Vec<(AttrKey, String)>>,
}

impl Tag {
    /// Parse an annotation string.
    ///
    /// Never fails: scanning stops at the first malformed token and keeps the
    /// pairs read so far, so a garbled annotation degrades to fewer (or no)
    /// keys rather than aborting a walk.
    pub fn parse(raw: &str) -> Self {
        let mut attrs = Vec::new();
        let mut rest = raw;

        while let Some(caps) = TAG_PAIR_REGEX.captures(rest) {
            let key = AttrKey::from(&caps[1]);
            let value = unescape(&caps[2]);
            // First occurrence wins, like a lookup scanning left to right
            if !attrs.iter().any(|(k, _)| *k == key) {
                attrs.push((key, value));
            }
            rest = &rest[caps[0].len()..];
        }

        Tag {
            attrs: Arc::new(attrs),
        }
    }

    pub fn builder() -> TagBuilder {
        TagBuilder::default()
    }

    /// Whether the key is present at all, even with an empty value
    pub fn has(&self, key: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k.matches(key))
    }

    /// Value stored under `key`, or `""` when absent
    pub fn get(&self, key: &str) -> &str {
        self.attrs
            .iter()
            .find(|(k, _)| k.matches(key))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn attr(&self, key: &AttrKey) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_primary_key(&self) -> bool {
        self.attr(&AttrKey::PrimaryKey) == Some("yes")
    }

    pub fn sql_type(&self) -> &str {
        self.attr(&AttrKey::SqlType).unwrap_or("")
    }

    /// True when the member is excluded under `key`
    pub fn is_excluded(&self, key: &str) -> bool {
        self.get(key) == EXCLUDE
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttrKey, &str)> {
        self.attrs.iter().map(|(k, v)| (k, v.as_str()))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{:?}", key.as_str(), value)?;
        }
        Ok(())
    }
}

/// Programmatic construction for records whose tags are not written as text
#[derive(Debug, Default)]
pub struct TagBuilder {
    attrs: Vec<(AttrKey, String)>,
}

impl TagBuilder {
    pub fn attr(mut self, key: impl Into<AttrKey>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
        self
    }

    pub fn build(self) -> Tag {
        Tag {
            attrs: Arc::new(self.attrs),
        }
    }
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
