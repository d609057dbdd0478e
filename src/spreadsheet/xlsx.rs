use crate::error::DecodeError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::Archive;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::cell::Temporal;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;

// XML tag names for parsing Excel XLSX format
const TAG_RELATIONSHIP: &[u8] = b"Relationship";        // Package relationship
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");    // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");      // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");    // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");           // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");     // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");         // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                    // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet");               // Worksheet definition
const TAG_ROW: QName = QName(b"row");                   // Row in worksheet
const TAG_CELL: QName = QName(b"c");                    // Cell in worksheet
const TAG_FORMULA: QName = QName(b"f");                 // Formula of a cell
const TAG_INLINE_STRING: QName = QName(b"is");          // Inline string value
const TAG_VALUE: QName = QName(b"v");                   // Cached cell value

/// Storage type of a `<c>` element, from its `t` attribute.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
enum CellKind {
    #[default]
    Number,
    Boolean,
    /// `inlineStr`, or `str` for formula results
    String,
    SharedString,
    /// ISO 8601 date (`t="d"`)
    IsoDate,
    Error,
}

impl CellKind {
    fn parse(t: Option<&str>) -> Self {
        match t {
            Some("s") => Self::SharedString,
            Some("inlineStr") | Some("str") => Self::String,
            Some("b") => Self::Boolean,
            Some("d") => Self::IsoDate,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }
}

/// An Office Open XML workbook package.
pub(crate) struct XlsxSpreadsheet {
    zip: Archive,
    /// Whether serial dates count from 1904-01-01
    is_1904: bool,
    /// Date/time interpretation per cell style index
    number_formats: Vec<NumberFormat>,
    /// Worksheets in workbook order as (name, zip_path) pairs
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    /// Reads the workbook part and styles of an xlsx package.
    pub(crate) fn open(mut zip: Archive) -> Result<XlsxSpreadsheet, DecodeError> {
        let (sheets, is_1904) = load_workbook(&mut zip).with_prefix("xl/workbook.xml")?;
        if sheets.is_empty() {
            Err(SpreadsheetError::NoSheets)?
        }
        let number_formats = load_number_formats(&mut zip).with_prefix("xl/styles.xml")?;
        Ok(XlsxSpreadsheet {
            zip,
            is_1904,
            number_formats,
            sheets,
        })
    }

    /// Loads the whole shared string table, empty when the part is absent.
    fn load_shared_strings(&mut self) -> Result<Vec<String>, DecodeError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
            }
        });
        Ok(shared_strings)
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    /// Streams the first worksheet part into a [`Sheet`].
    ///
    /// Every `<row>` element opens a row and every `<c>` element becomes a cell,
    /// blanks included, so that presence in the file is preserved.
    fn first_sheet(&mut self) -> Result<Sheet, DecodeError> {
        let (sheet_name, zip_path) = self.sheets.first().cloned().ok_or(SpreadsheetError::NoSheets)?;
        let shared_strings = self.load_shared_strings().with_prefix("xl/sharedStrings.xml")?;
        let mut sheet = Sheet::new(&sheet_name);

        let mut row = 0usize;
        let mut col = 0usize;
        let mut next_row = 0usize;
        let mut next_col = 0usize;
        let mut kind = CellKind::default();
        let mut format = NumberFormat::General;
        let mut has_formula = false;
        let mut in_cell = false;
        let mut value = String::new();
        let mut reader = self.zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                row = event.parse_attribute_value::<usize>("r")?
                    .and_then(|number| number.checked_sub(1))
                    .unwrap_or(next_row);
                next_row = row.saturating_add(1);
                next_col = 0;
                sheet.open_row(row);
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row, next_col));
                next_col = col.saturating_add(1);
                kind = CellKind::parse(event.get_attribute_value("t")?.as_deref());
                format = match event.parse_attribute_value::<usize>("s")? {
                    Some(index) => self.number_formats.get(index).copied().unwrap_or_default(),
                    None => NumberFormat::General,
                };
                has_formula = false;
                in_cell = true;
                value.clear();
            }
            Event::Start(event) if in_cell && event.name() == TAG_FORMULA => has_formula = true,
            Event::Start(event) if in_cell && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if in_cell && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if in_cell && event.name() == TAG_CELL => {
                in_cell = false;
                let cell_value = to_cell_value(kind, format, has_formula, &value, &shared_strings, self.is_1904)
                    .with_prefix(&format!("{}!{}", sheet_name, index_to_reference(row, col)))?;
                sheet.push(Cell {
                    row,
                    col,
                    value: cell_value,
                });
            }
        });
        Ok(sheet)
    }
}

/// Resolves the raw text of a `<c>` element to its typed value.
///
/// Formula cells keep only their cached result. A numeric payload that does not
/// parse is an error, not a blank.
fn to_cell_value(
    kind: CellKind,
    format: NumberFormat,
    has_formula: bool,
    raw: &str,
    shared_strings: &[String],
    is_1904: bool,
) -> Result<CellValue, DecodeError> {
    if raw.is_empty() && kind != CellKind::String {
        return Ok(CellValue::Empty);
    }
    let value = match kind {
        CellKind::Error => CellValue::Empty,
        CellKind::Boolean => CellValue::Boolean(matches!(raw.trim(), "1" | "true" | "TRUE")),
        CellKind::String if has_formula => CellValue::FormulaText(raw.to_owned()),
        CellKind::String => CellValue::Text(raw.to_owned()),
        CellKind::SharedString => {
            let index = raw.trim().parse::<usize>()?;
            let string = shared_strings
                .get(index)
                .ok_or(SpreadsheetError::MissingSharedString(index))?;
            CellValue::Text(string.to_owned())
        }
        CellKind::IsoDate => Temporal::parse_iso_datetime(raw.trim())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(raw.to_owned())),
        CellKind::Number => {
            let number = raw.trim().parse::<f64>()?;
            if has_formula {
                CellValue::FormulaNumber(number)
            } else {
                Temporal::from_serial(number, format, is_1904)
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Number(number))
            }
        }
    };
    Ok(value)
}

/// Loads worksheet names and part paths from `xl/workbook.xml`, plus the date system.
fn load_workbook(zip: &mut Archive) -> Result<(Vec<(String, String)>, bool), DecodeError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::MissingPart("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Maps worksheet relationship ids to zip paths.
fn load_relationships(zip: &mut Archive, path: &str) -> Result<HashMap<String, String>, DecodeError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPart(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves a relationship target relative to `xl/`.
fn to_zip_path(target: &str) -> String {
    if let Some(path) = target.strip_prefix('/') {
        path.to_string()
    } else if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{target}")
    }
}

/// Builds the per-style date/time table from `xl/styles.xml`.
/// Only `numFmts` and `cellXfs` matter; the `numFmt` and `xf` elements found
/// elsewhere (differential formats, cell style formats) are ignored.
fn load_number_formats(zip: &mut Archive) -> Result<Vec<NumberFormat>, DecodeError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<u32, NumberFormat>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<u32>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u32>("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id, NumberFormat::from_format_code(&code));
            }
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.parse_attribute_value::<u32>("numFmtId")?.unwrap_or(0));
        }
    });

    Ok(format_indexes
        .into_iter()
        .map(|id| {
            custom_formats
                .get(&id)
                .copied()
                .or_else(|| NumberFormat::from_builtin_id(id))
                .unwrap_or_default()
        })
        .collect())
}

/// Reads the text of a string element up to `end_tag`, skipping phonetic runs.
/// With `is_text_content` the element's own text counts; otherwise only `<t>` children do.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, DecodeError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
