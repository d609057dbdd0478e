use crate::table::Row;
use crate::table::Table;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Allowed values per column: OR within a column, AND across columns.
/// Columns without an entry are unconstrained; an empty set admits nothing.
pub type FilterSpec = BTreeMap<String, BTreeSet<String>>;

/// Rows of `table` that satisfy every constraint of `spec`, in table order.
///
/// A row missing a constrained column is compared as an empty string.
pub fn filter(table: Option<&Table>, spec: &FilterSpec) -> Vec<Row> {
    let table = match table {
        Some(table) => table,
        None => return Vec::new(),
    };
    table
        .rows()
        .iter()
        .filter(|row| {
            spec.iter()
                .all(|(column, allowed)| allowed.contains(row.get(column).unwrap_or("")))
        })
        .cloned()
        .collect()
}
