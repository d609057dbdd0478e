use crate::error::DecodeError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::normalize;
use crate::table::Row;
use crate::table::Table;
use log::debug;

/// Builds the row table of a decoded sheet.
///
/// Row 0 is the header: its physically present cells fix the column count and
/// their trimmed normalized texts become the keys of every row. Each present
/// data row yields one [`Row`]; absent data rows are skipped and absent data
/// cells become empty strings. A sheet without a header row yields an empty
/// table.
///
/// # Errors
///
/// Fails with [`SpreadsheetError::MissingHeaderColumn`] when the header row
/// has a gap below the column count.
pub fn build(sheet: &Sheet) -> Result<Table, DecodeError> {
    let header = match sheet.row(0) {
        Some(header) => header,
        None => return Ok(Table::default()),
    };
    let column_count = header.physical_cell_count();
    let headers = (0..column_count)
        .map(|col| match header.cell(col) {
            Some(value) => Ok(normalize(value).trim().to_owned()),
            None => Err(SpreadsheetError::MissingHeaderColumn {
                position: index_to_reference(0, col),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for (_, sheet_row) in sheet.rows_from(1) {
        let mut row = Row::with_capacity(column_count);
        for (col, name) in headers.iter().enumerate() {
            let value = sheet_row
                .cell(col)
                .map(|value| normalize(value).trim().to_owned())
                .unwrap_or_default();
            row.insert(name.to_owned(), value);
        }
        rows.push(row);
    }

    debug!(
        "Built table from sheet '{}': {} rows x {} columns",
        sheet.name,
        rows.len(),
        column_count
    );
    Ok(Table::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::CellValue;

    fn text(value: &str) -> Option<CellValue> {
        Some(CellValue::Text(value.to_owned()))
    }

    fn names_and_cities() -> Sheet {
        Sheet::from_rows(
            "Sheet1",
            vec![
                vec![text("Name"), text("City")],
                vec![text("Ana"), text("Paris")],
                vec![text("Bo"), text("Tunis")],
                vec![text("Cy"), text("Paris")],
            ],
        )
    }

    #[test]
    fn rows_follow_header_order() {
        let table = build(&names_and_cities()).unwrap();

        assert_eq!(table.len(), 3);
        for row in table.rows() {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["Name", "City"]);
        }
        assert_eq!(table.rows()[1].get("Name"), Some("Bo"));
        assert_eq!(table.rows()[1].get("City"), Some("Tunis"));
    }

    #[test]
    fn empty_sheet_gives_empty_table() {
        let table = build(&Sheet::new("Sheet1")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn header_only_sheet_gives_empty_table() {
        let sheet = Sheet::from_rows("Sheet1", vec![vec![text("Name")]]);
        assert!(build(&sheet).unwrap().is_empty());
    }

    #[test]
    fn sparse_data_rows_and_cells() {
        let mut sheet = Sheet::from_rows(
            "Sheet1",
            vec![
                vec![text(" Name "), text("Score"), text("Note")],
                vec![text("  Ana "), Some(CellValue::Number(3.0))],
            ],
        );
        sheet.open_row(3);
        sheet.push(crate::spreadsheet::Cell {
            row: 5,
            col: 2,
            value: CellValue::Boolean(true),
        });

        let table = build(&sheet).unwrap();
        let rows: Vec<Vec<(&str, &str)>> = table.rows().iter().map(|row| row.iter().collect()).collect();
        assert_eq!(
            rows,
            vec![
                vec![("Name", "Ana"), ("Score", "3.0"), ("Note", "")],
                vec![("Name", ""), ("Score", ""), ("Note", "")],
                vec![("Name", ""), ("Score", ""), ("Note", "true")],
            ]
        );
    }

    #[test]
    fn distant_data_row_is_reached_directly() {
        let mut sheet = Sheet::from_rows("Sheet1", vec![vec![text("Name")]]);
        sheet.push(crate::spreadsheet::Cell {
            row: usize::MAX - 1,
            col: 0,
            value: CellValue::Text("far".to_owned()),
        });

        let table = build(&sheet).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].get("Name"), Some("far"));
    }

    #[test]
    fn cells_beyond_header_are_ignored() {
        let sheet = Sheet::from_rows(
            "Sheet1",
            vec![vec![text("A")], vec![text("1"), text("overflow")]],
        );
        let table = build(&sheet).unwrap();
        assert_eq!(table.rows()[0].len(), 1);
    }

    #[test]
    fn numeric_header_is_normalized() {
        let sheet = Sheet::from_rows(
            "Sheet1",
            vec![vec![Some(CellValue::Number(2024.0))], vec![text("x")]],
        );
        let table = build(&sheet).unwrap();
        assert_eq!(table.rows()[0].get("2024.0"), Some("x"));
    }

    #[test]
    fn header_gap_is_an_error() {
        let sheet = Sheet::from_rows("Sheet1", vec![vec![text("A"), None, text("C")]]);
        let error = build(&sheet).unwrap_err();
        assert!(matches!(
            error,
            DecodeError::SpreadsheetError(SpreadsheetError::MissingHeaderColumn { ref position }) if position == "B1"
        ));
        assert_eq!(error.to_string(), "Missing column name at 'B1'");
    }

    #[test]
    fn duplicate_headers_keep_first_position() {
        let sheet = Sheet::from_rows(
            "Sheet1",
            vec![vec![text("A"), text("B"), text("A")], vec![text("1"), text("2"), text("3")]],
        );
        let table = build(&sheet).unwrap();
        assert_eq!(table.rows()[0].iter().collect::<Vec<_>>(), vec![("A", "3"), ("B", "2")]);
    }
}
