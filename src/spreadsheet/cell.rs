use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use std::fmt::Display;

/// Typed content of a decoded cell.
///
/// Decoders map every storage type of the source format onto this closed set;
/// error values and blanks both become [`CellValue::Empty`].
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// String cell (shared, inline or ODS paragraph text)
    Text(String),
    /// Plain numeric cell
    Number(f64),
    /// Boolean cell
    Boolean(bool),
    /// Numeric cell whose number format marks it as a date and/or time
    Date(Temporal),
    /// Formula whose cached result is text
    FormulaText(String),
    /// Formula whose cached result is numeric
    FormulaNumber(f64),
    /// Blank, styled-only or error cell
    Empty,
}

/// Calendar value carried by [`CellValue::Date`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Temporal {
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Display for Temporal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Time(time) => write!(f, "{}", time.format("%H:%M:%S%.f")),
            Self::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl Temporal {
    /// Converts a spreadsheet serial number to a calendar value.
    /// Handles both the 1900 (with the Lotus 1-2-3 leap year bug) and the 1904 date systems.
    /// Returns `None` for general formats and for serials outside chrono's range.
    pub(crate) fn from_serial(serial: f64, format: NumberFormat, is_1904: bool) -> Option<Self> {
        if format == NumberFormat::General || !serial.is_finite() || serial < 0.0 {
            return None;
        }
        let days = serial.trunc() as i64;
        let offset = if is_1904 {
            1462
        } else if days < 60 {
            1
        } else {
            0
        };
        let date = NaiveDate::from_ymd_opt(1899, 12, 30)?
            .checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?;
        let milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
        let datetime = date
            .and_hms_opt(0, 0, 0)?
            .checked_add_signed(Duration::try_milliseconds(milliseconds)?)?;
        match format {
            NumberFormat::Date => Some(Self::Date(date)),
            NumberFormat::Time => Some(Self::Time(datetime.time())),
            NumberFormat::DateTime => Some(Self::DateTime(datetime)),
            NumberFormat::General => None,
        }
    }

    /// Parses an ISO 8601 date (`2024-03-15`) or date-time (`2024-03-15T08:30:00[.fff]`).
    pub(crate) fn parse_iso_datetime(value: &str) -> Option<Self> {
        if value.contains('T') {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(Self::DateTime)
        } else {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(Self::Date)
        }
    }

    /// Parses an ISO 8601 duration (`PT08H30M00S`) as a time of day.
    pub(crate) fn parse_iso_duration(value: &str) -> Option<Self> {
        let duration = value.parse::<IsoDuration>().ok()?;
        let seconds = f64::from(duration.hour) * 3600.0
            + f64::from(duration.minute) * 60.0
            + f64::from(duration.second);
        let milliseconds = ((seconds * 1000.0).round() as i64).rem_euclid(86_400_000);
        NaiveTime::from_num_seconds_from_midnight_opt(
            (milliseconds / 1000) as u32,
            (milliseconds % 1000) as u32 * 1_000_000,
        )
        .map(Self::Time)
    }
}

/// Date/time interpretation of a numeric cell, derived from its number format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum NumberFormat {
    #[default]
    General,
    Date,
    Time,
    DateTime,
}

impl NumberFormat {
    /// Built-in Excel number format ids that denote dates or times.
    pub(crate) fn from_builtin_id(id: u32) -> Option<Self> {
        match id {
            14..=17 => Some(Self::Date),
            18..=21 | 45..=47 => Some(Self::Time),
            22 => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Classifies a custom format code by its date (`y`, `d`) and time (`h`, `s`) tokens.
    /// Quoted literals, bracketed sections and escaped characters are skipped; `m` is
    /// ambiguous between month and minute and is ignored.
    pub(crate) fn from_format_code(code: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in code.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::DateTime,
            (true, false) => Self::Date,
            (false, true) => Self::Time,
            (false, false) => Self::General,
        }
    }
}

/// A decoded cell at its 0-based position.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub value: CellValue,
}

impl Cell {
    /// Excel-style reference of the cell, e.g. `B2`.
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }
}
