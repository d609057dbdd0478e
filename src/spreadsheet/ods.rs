use crate::error::DecodeError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::Archive;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::Temporal;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;

/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for runs of spaces
const SPACES: QName = QName(b"text:s");
/// XML element name for tab characters
const TAB: QName = QName(b"text:tab");
/// XML element name for line breaks inside a paragraph
const LINE_BREAK: QName = QName(b"text:line-break");

/// Rows addressable in a sheet; repeats reaching past it are cut off
const MAX_ROWS: usize = 1_048_576;
/// Columns addressable in a sheet
const MAX_COLUMNS: usize = 16_384;
/// Extra cells that repeat attributes may add to one sheet
const MAX_REPEATED_CELLS: usize = 1_048_576;

/// Value type of a `table:table-cell`, from `office:value-type`.
#[derive(Copy, Clone, Debug, PartialEq)]
enum CellKind {
    /// No value type: the cell is not physically present
    None,
    Number,
    Boolean,
    String,
    Date,
    Time,
    Error,
}

impl CellKind {
    fn parse(value_type: Option<&str>, is_error: bool) -> Self {
        match value_type {
            None => Self::None,
            Some(_) if is_error => Self::Error,
            Some("boolean") => Self::Boolean,
            Some("string") => Self::String,
            Some("date") => Self::Date,
            Some("time") => Self::Time,
            // float, percentage, currency
            Some(_) => Self::Number,
        }
    }
}

/// An OpenDocument spreadsheet package.
pub(crate) struct OdsSpreadsheet {
    zip: Archive,
}

impl OdsSpreadsheet {
    /// Checks the manifest for encryption and keeps the package for reading.
    pub(crate) fn open(mut zip: Archive) -> Result<OdsSpreadsheet, DecodeError> {
        if is_password_protected(&mut zip).with_prefix("META-INF/manifest.xml")? {
            Err(SpreadsheetError::PasswordProtected)?;
        }
        Ok(OdsSpreadsheet { zip })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    /// Streams the first `table:table` of `content.xml` into a [`Sheet`].
    ///
    /// Repeated rows and columns are expanded only for cells carrying a value;
    /// the trailing filler rows office suites write stay absent. Expansion stops
    /// at the sheet bounds, and a sheet whose repeats would add more than
    /// [`MAX_REPEATED_CELLS`] cells is rejected.
    fn first_sheet(&mut self) -> Result<Sheet, DecodeError> {
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::MissingPart("content.xml".to_string()))?;

        let mut sheet = None::<Sheet>;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                let name = event.get_attribute_value("table:name")?.unwrap_or_default();
                sheet = Some(Sheet::new(&name));
                break;
            }
        });
        let mut sheet = sheet.ok_or(SpreadsheetError::NoSheets)?;

        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellKind::None;
        let mut has_formula = false;
        let mut value = String::new();
        let mut paragraphs = 0usize;
        let mut repeated_cells = 0usize;
        // context
        let mut element_context = false; // collect paragraph text
        let mut comment_context = false; // inside an annotation
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => row = row.saturating_add(row_count),
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                paragraphs = 0;
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                let is_error = event.has_attribute_value("calcext:value-type", "error")?;
                kind = CellKind::parse(event.get_attribute_value("office:value-type")?.as_deref(), is_error);
                has_formula = event.get_attribute_value("table:formula")?.is_some();
                element_context = false;
                let attribute = match kind {
                    CellKind::Number => Some("office:value"),
                    CellKind::Boolean => Some("office:boolean-value"),
                    CellKind::Date => Some("office:date-value"),
                    CellKind::Time => Some("office:time-value"),
                    CellKind::String => Some("office:string-value"),
                    CellKind::None | CellKind::Error => None,
                };
                if let Some(attribute) = attribute {
                    match event.get_attribute_value(attribute)? {
                        Some(data) => value.push_str(&data),
                        None => element_context = kind == CellKind::String,
                    }
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if kind != CellKind::None {
                    let position = format!("{}!{}", sheet.name, index_to_reference(row, col));
                    let cell_value = to_cell_value(kind, has_formula, &value).with_prefix(&position)?;
                    let row_end = row.saturating_add(row_count).min(MAX_ROWS);
                    let col_end = col.saturating_add(col_count).min(MAX_COLUMNS);
                    let copies = row_end.saturating_sub(row).saturating_mul(col_end.saturating_sub(col));
                    repeated_cells = repeated_cells.saturating_add(copies.saturating_sub(1));
                    if repeated_cells > MAX_REPEATED_CELLS {
                        Err(SpreadsheetError::RepeatLimit { position, limit: MAX_REPEATED_CELLS })?;
                    }
                    for cell_row in row..row_end {
                        for cell_col in col..col_end {
                            sheet.push(Cell {
                                row: cell_row,
                                col: cell_col,
                                value: cell_value.clone(),
                            });
                        }
                    }
                }
                col = col.saturating_add(col_count);
                kind = CellKind::None;
                element_context = false;
                comment_context = false;
            }
            // paragraph content
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if paragraphs > 0 {
                    value.push('\n');
                }
                paragraphs += 1;
            }
            Event::Start(event) if element_context && !comment_context && event.name() == SPACES => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1usize);
                value.push_str(&" ".repeat(count));
            }
            Event::Start(event) if element_context && !comment_context && event.name() == TAB => value.push('\t'),
            Event::Start(event) if element_context && !comment_context && event.name() == LINE_BREAK => value.push('\n'),
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });
        Ok(sheet)
    }
}

/// Resolves the collected value of a cell with a value type.
fn to_cell_value(kind: CellKind, has_formula: bool, raw: &str) -> Result<CellValue, DecodeError> {
    let value = match kind {
        CellKind::None | CellKind::Error => CellValue::Empty,
        CellKind::String if has_formula => CellValue::FormulaText(raw.to_owned()),
        CellKind::String => CellValue::Text(raw.to_owned()),
        CellKind::Boolean => CellValue::Boolean(matches!(raw.trim(), "true" | "1")),
        CellKind::Number if raw.trim().is_empty() => CellValue::Empty,
        CellKind::Number => {
            let number = raw.trim().parse::<f64>()?;
            if has_formula {
                CellValue::FormulaNumber(number)
            } else {
                CellValue::Number(number)
            }
        }
        CellKind::Date => Temporal::parse_iso_datetime(raw.trim())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(raw.to_owned())),
        CellKind::Time => Temporal::parse_iso_duration(raw.trim())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(raw.to_owned())),
    };
    Ok(value)
}

/// True when any manifest file entry carries encryption data.
/// Packages without a manifest are treated as unencrypted.
fn is_password_protected(zip: &mut Archive) -> Result<bool, DecodeError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
