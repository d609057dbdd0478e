//! Low-level readers shared by the workbook decoders.

pub(crate) mod xml;
pub(crate) mod zip;
