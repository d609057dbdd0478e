//! # Rusty Facets
//!
//! Upload a spreadsheet, get its rows back as header-keyed records, and query
//! them with per-column facets and multi-column filters.
//!
//! ## Pipeline
//!
//! 1. [`spreadsheet::decode`] reads the first sheet of an `.xlsx`/`.xlsm` or
//!    `.ods` workbook into a sparse [`Sheet`] of typed [`CellValue`]s.
//! 2. [`table::build`] turns the sheet into a [`Table`]: row 0 is the header,
//!    every later present row becomes a [`Row`] whose values are normalized
//!    with [`table::normalize`].
//! 3. [`UploadStore`] keeps each table under an opaque [`UploadId`] for the
//!    lifetime of the process.
//! 4. [`table::facets`] lists the distinct non-blank values of every column and
//!    [`table::filter`] keeps the rows matching a [`FilterSpec`].
//!
//! With the `server` feature (on by default) the [`server`] module exposes the
//! pipeline over HTTP and the `rusty_facets` binary serves it.
//!
//! ```no_run
//! use rusty_facets::{FilterSpec, Table, UploadStore};
//!
//! # fn main() -> Result<(), rusty_facets::DecodeError> {
//! let store = UploadStore::new();
//! let id = store.put(Table::from_workbook(std::fs::read("cities.xlsx")?)?);
//!
//! let table = store.get(&id);
//! let facets = rusty_facets::table::facets(table.as_deref());
//! let mut spec = FilterSpec::new();
//! spec.entry("City".to_owned()).or_default().insert("Paris".to_owned());
//! let rows = rusty_facets::table::filter(table.as_deref(), &spec);
//! # Ok(())
//! # }
//! ```
pub mod config;
mod error;
mod helpers;
#[cfg(feature = "server")]
pub mod server;
pub mod spreadsheet;
pub mod store;
pub mod table;

pub use config::Config;
pub use config::ConfigError;
pub use error::DecodeError;
pub use spreadsheet::CellValue;
pub use spreadsheet::Sheet;
pub use spreadsheet::SpreadsheetError;
pub use store::IdGenerator;
pub use store::UploadId;
pub use store::UploadStore;
pub use table::FacetMap;
pub use table::FilterSpec;
pub use table::Row;
pub use table::Table;
