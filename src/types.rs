use crate::error::{Error, Result};
use crate::tag::Tag;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// One leaf of a flattened record - represents one cell in a row
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Qualified name built from the tag chain, root to leaf
    pub name: String,

    /// Text rendering of the leaf value
    pub value: String,

    /// The leaf's own tag, for consumers reading auxiliary attributes
    pub tag: Tag,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>, tag: Tag) -> Self {
        Field {
            name: name.into(),
            value: value.into(),
            tag,
        }
    }
}

/// An ordered list of fields - represents one output row
///
/// Order is traversal order: members in declaration order, depth first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(pub Vec<Field>);

impl Fields {
    pub fn new() -> Self {
        Fields(Vec::new())
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.value.as_str()).collect()
    }

    pub fn sort_by_name(&mut self) {
        self.0.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Name/tag pairs of this row, in row order
    pub fn manifest(&self) -> Manifest {
        Manifest(
            self.0
                .iter()
                .map(|f| Column {
                    name: f.name.clone(),
                    tag: f.tag.clone(),
                })
                .collect(),
        )
    }
}

impl Deref for Fields {
    type Target = Vec<Field>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Fields {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Field>> for Fields {
    fn from(fields: Vec<Field>) -> Self {
        Fields(fields)
    }
}

impl IntoIterator for Fields {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Name and tag of one output column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub tag: Tag,
}

/// Ordered column list taken from the first row of an encoding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest(pub Vec<Column>);

impl Manifest {
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns sorted by name with primary-key columns first
    pub fn primary_key_ordered(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.0.iter().collect();
        columns.sort_by(|a, b| {
            b.tag
                .is_primary_key()
                .cmp(&a.tag.is_primary_key())
                .then_with(|| a.name.cmp(&b.name))
        });
        columns
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.primary_key_ordered()
            .into_iter()
            .filter(|c| c.tag.is_primary_key())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Row terminator written after every line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineBreak {
    #[default]
    #[serde(rename = "\n", alias = "lf")]
    Lf,
    #[serde(rename = "\r\n", alias = "crlf")]
    CrLf,
}

impl LineBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineBreak::Lf => "\n",
            LineBreak::CrLf => "\r\n",
        }
    }
}

/// Configuration for flattening and expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Separator between values in a row
    pub delimiter: char,

    /// Tag key deciding names and inclusion
    pub tag_key: String,

    /// Row terminator
    pub line_break: LineBreak,

    /// Dotted member paths to expand, outermost first (empty = no expansion)
    pub expand_paths: Vec<String>,

    /// chrono format string for timestamp leaves
    pub time_format: String,

    /// Inserted between name segments of nested members
    pub name_separator: String,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            delimiter: ',',
            tag_key: String::from("csv"),
            line_break: LineBreak::Lf,
            expand_paths: vec![],
            time_format: String::from("%Y-%m-%d %H:%M:%S%.3f"),
            name_separator: String::new(),
        }
    }
}

impl FlattenConfig {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_tag_key(mut self, tag_key: impl Into<String>) -> Self {
        self.tag_key = tag_key.into();
        self
    }

    pub fn with_line_break(mut self, line_break: LineBreak) -> Self {
        self.line_break = line_break;
        self
    }

    pub fn with_expand_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }

    pub fn with_name_separator(mut self, separator: impl Into<String>) -> Self {
        self.name_separator = separator.into();
        self
    }

    /// Check the settings the row writer and timestamp rendering depend on
    pub fn validate(&self) -> Result<()> {
        delimiter_byte(self.delimiter)?;
        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::InvalidTimeFormat(self.time_format.clone()));
        }
        Ok(())
    }
}

pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8> {
    match delimiter {
        '"' | '\n' | '\r' => Err(Error::InvalidDelimiter(delimiter)),
        c if c.is_ascii() => Ok(c as u8),
        c => Err(Error::InvalidDelimiter(c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, tag: &str) -> Column {
        Column {
            name: name.to_string(),
            tag: Tag::parse(tag),
        }
    }

    #[test]
    fn test_primary_key_columns_first() {
        let manifest = Manifest(vec![
            column("v2", r#"t:"v2""#),
            column("v1", r#"t:"v1""#),
            column("id", r#"t:"id" PK:"yes""#),
        ]);

        let names: Vec<&str> = manifest
            .primary_key_ordered()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "v1", "v2"]);
        assert_eq!(manifest.primary_keys(), vec!["id"]);
    }

    #[test]
    fn test_primary_key_wins_over_name_order() {
        let manifest = Manifest(vec![
            column("a", ""),
            column("z", r#"PK:"yes""#),
            column("m", r#"PK:"no""#),
        ]);

        let names: Vec<&str> = manifest
            .primary_key_ordered()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_fields_names_values_and_sort() {
        let mut fields = Fields::from(vec![
            Field::new("b", "2", Tag::default()),
            Field::new("a", "1", Tag::default()),
        ]);

        assert_eq!(fields.values(), vec!["2", "1"]);
        fields.sort_by_name();
        assert_eq!(fields.names(), vec!["a", "b"]);
        assert_eq!(fields.manifest().names(), vec!["a", "b"]);
    }

    #[test]
    fn test_config_defaults_and_partial_json() {
        let config = FlattenConfig::default();
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.tag_key, "csv");
        assert_eq!(config.line_break.as_str(), "\n");
        assert!(config.expand_paths.is_empty());

        let loaded: FlattenConfig =
            serde_json::from_str(r#"{"delimiter": "\t", "line_break": "crlf"}"#).unwrap();
        assert_eq!(loaded.delimiter, '\t');
        assert_eq!(loaded.line_break, LineBreak::CrLf);
        assert_eq!(loaded.tag_key, "csv");
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(FlattenConfig::default().validate().is_ok());
        assert!(FlattenConfig::default().with_delimiter('\t').validate().is_ok());

        let err = FlattenConfig::default().with_delimiter('§').validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDelimiter('§')));

        let err = FlattenConfig::default().with_delimiter('"').validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDelimiter('"')));

        let err = FlattenConfig::default().with_time_format("%Q").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidTimeFormat(_)));
    }
}
