use crate::spreadsheet::CellValue;

/// Canonical text of a decoded cell.
///
/// Numbers use the shortest round-trip rendering and always keep a fractional
/// part (`3.0`, `0.25`). Formulas yield their cached result. Blanks and errors
/// yield an empty string.
pub fn normalize(value: &CellValue) -> String {
    match value {
        CellValue::Text(text) => text.to_owned(),
        CellValue::Number(number) => format!("{number:?}"),
        CellValue::Boolean(flag) => flag.to_string(),
        CellValue::Date(temporal) => temporal.to_string(),
        CellValue::FormulaText(text) => text.to_owned(),
        CellValue::FormulaNumber(number) => format!("{number:?}"),
        CellValue::Empty => String::new(),
    }
}
