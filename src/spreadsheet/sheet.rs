use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use std::collections::BTreeMap;

/// A decoded worksheet: sparse rows of sparse typed cells.
///
/// A row is *present* when the source file declares it, even if it holds no
/// cells; a cell is *present* when the source file declares it, even if it is
/// blank. Both notions matter to table building.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    /// Sheet name as declared by the workbook
    pub name: String,
    rows: BTreeMap<usize, SheetRow>,
}

/// One present row of a [`Sheet`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetRow {
    cells: BTreeMap<usize, CellValue>,
}

impl SheetRow {
    /// The cell at column `col`, `None` when not physically present.
    pub fn cell(&self, col: usize) -> Option<&CellValue> {
        self.cells.get(&col)
    }

    /// Number of physically present cells, blanks included.
    pub fn physical_cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rows: BTreeMap::new(),
        }
    }

    /// Declares row `row` as present.
    pub fn open_row(&mut self, row: usize) -> &mut SheetRow {
        self.rows.entry(row).or_default()
    }

    /// Adds a cell, declaring its row. A later cell at the same position replaces the earlier one.
    pub fn push(&mut self, cell: Cell) {
        self.open_row(cell.row).cells.insert(cell.col, cell.value);
    }

    /// The row at index `row`, `None` when absent.
    pub fn row(&self, row: usize) -> Option<&SheetRow> {
        self.rows.get(&row)
    }

    /// Present rows with index `start` or above, in ascending order.
    pub fn rows_from(&self, start: usize) -> impl Iterator<Item = (usize, &SheetRow)> + '_ {
        self.rows.range(start..).map(|(index, row)| (*index, row))
    }

    /// Index of the last present row, `None` for an empty sheet.
    pub fn last_row_index(&self) -> Option<usize> {
        self.rows.keys().next_back().copied()
    }

    /// True when no row is present.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds a sheet from dense rows of values, mostly useful in tests and examples.
    /// `None` entries leave the cell absent.
    pub fn from_rows<I, R>(name: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Option<CellValue>>,
    {
        let mut sheet = Sheet::new(name);
        for (row, values) in rows.into_iter().enumerate() {
            sheet.open_row(row);
            for (col, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    sheet.push(Cell { row, col, value });
                }
            }
        }
        sheet
    }
}
