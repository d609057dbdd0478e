//! # Row tables
//!
//! A [`Table`] is the row-oriented view of a decoded sheet: one [`Row`] per
//! present data row, each mapping the header texts to normalized cell texts.
//! Tables are built once and never mutated; the query side ([`facets`] and
//! [`filter`]) only reads them.
use crate::error::DecodeError;
use crate::spreadsheet;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;

pub(crate) mod builder;
pub(crate) mod facet;
pub(crate) mod filter;
pub(crate) mod normalize;

pub use builder::build;
pub use facet::facets;
pub use facet::FacetMap;
pub use filter::filter;
pub use filter::FilterSpec;
pub use normalize::normalize;

/// Ordered mapping from column header to cell text.
///
/// Keeps insertion order; inserting an existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    entries: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Sets `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, current)) => *current = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Column headers in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (key, value) in iter {
            row.insert(key.into(), value.into());
        }
        row
    }
}

/// Serialized as a JSON object in column order.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Ordered rows of one uploaded sheet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Decodes workbook bytes and builds the table of their first sheet.
    pub fn from_workbook(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        let sheet = spreadsheet::decode(bytes)?;
        build(&sheet)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Column headers, taken from the first row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rows.first().into_iter().flat_map(Row::keys)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
