use crate::table::Table;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;
use std::collections::BTreeSet;

/// Distinct non-blank values per column, columns in table order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FacetMap {
    columns: Vec<(String, Vec<String>)>,
}

impl FacetMap {
    /// Sorted values of `column`, `None` for an unknown column.
    pub fn get(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for FacetMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

/// Computes the facets of a table.
///
/// Values are trimmed, blanks are dropped and the rest is sorted by code point.
/// An absent or empty table yields an empty map.
pub fn facets(table: Option<&Table>) -> FacetMap {
    let table = match table {
        Some(table) if !table.is_empty() => table,
        _ => return FacetMap::default(),
    };
    let columns = table
        .columns()
        .map(|column| {
            let values: BTreeSet<&str> = table
                .rows()
                .iter()
                .filter_map(|row| row.get(column))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .collect();
            (
                column.to_owned(),
                values.into_iter().map(str::to_owned).collect::<Vec<_>>(),
            )
        })
        .collect();
    FacetMap { columns }
}
