//! # Workbook decoding
//!
//! Turns uploaded workbook bytes into a [`Sheet`]: a sparse grid of typed
//! [`CellValue`]s for the first worksheet. Two package formats are understood:
//!
//! - Office Open XML workbooks (`.xlsx`, `.xlsm`)
//! - OpenDocument spreadsheets (`.ods`)
//!
//! Both are zip packages read through streaming XML events; the format is
//! detected from the package contents, never from a file name.
use crate::error::DecodeError;
use crate::helpers::zip::open_archive;
use crate::helpers::zip::Archive;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use log::debug;
use thiserror::Error;

pub(crate) mod cell;
#[cfg(test)]
pub(crate) mod fixtures;
pub(crate) mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

pub use cell::Cell;
pub use cell::CellValue;
pub use cell::Temporal;
pub use sheet::Sheet;
pub use sheet::SheetRow;

/// OpenDocument spreadsheet MIME type, stored uncompressed as the `mimetype` part
const ODS_MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unrecognized spreadsheet format")]
    UnknownFormat,

    #[error("Workbook contains no sheets")]
    NoSheets,

    #[error("Workbook is password protected")]
    PasswordProtected,

    #[error("Missing workbook part '{0}'")]
    MissingPart(String),

    #[error("Shared string #{0} does not exist")]
    MissingSharedString(usize),

    #[error("Missing column name at '{position}'")]
    MissingHeaderColumn { position: String },

    #[error("Repeated cells at '{position}' exceed the limit of {limit}")]
    RepeatLimit { position: String, limit: usize },
}

/// A workbook package that can produce its first worksheet.
pub(crate) trait Spreadsheet {
    /// Decodes the first worksheet in workbook order.
    fn first_sheet(&mut self) -> Result<Sheet, DecodeError>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Format {
    Xlsx,
    Ods,
}

fn detect_format(zip: &mut Archive) -> Result<Format, DecodeError> {
    if let Some(mime_type) = zip.read_to_vec("mimetype")? {
        if mime_type.trim_ascii() == ODS_MIME_TYPE {
            return Ok(Format::Ods);
        }
    }
    if zip.contains("xl/workbook.xml") {
        Ok(Format::Xlsx)
    } else {
        Err(SpreadsheetError::UnknownFormat.into())
    }
}

/// Decodes the first worksheet of an xlsx or ods workbook.
///
/// # Errors
///
/// Fails with [`DecodeError`] when the bytes are not a zip package, the
/// package is neither format, the workbook has no sheets, is encrypted, or
/// one of its XML parts is malformed.
pub fn decode(bytes: Vec<u8>) -> Result<Sheet, DecodeError> {
    let size = bytes.len();
    let mut zip = open_archive(bytes)?;
    let format = detect_format(&mut zip)?;
    let sheet = match format {
        Format::Xlsx => XlsxSpreadsheet::open(zip)?.first_sheet()?,
        Format::Ods => OdsSpreadsheet::open(zip)?.first_sheet()?,
    };
    debug!(
        "Decoded {:?} workbook ({} bytes): sheet '{}', last row {:?}",
        format,
        size,
        sheet.name,
        sheet.last_row_index()
    );
    Ok(sheet)
}
