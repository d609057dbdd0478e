//! Conversions between 0-based (row, column) indexes and A1-style references.

/// Formats a 0-based position as an A1 reference, e.g. `(0, 27)` -> `AB1`.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut column = col as u128 + 1;
    while column > 0 {
        column -= 1;
        letters.push(b'A' + (column % 26) as u8);
        column /= 26;
    }
    letters.reverse();
    let mut reference = String::from_utf8(letters).unwrap_or_default();
    reference.push_str(&(row as u128 + 1).to_string());
    reference
}

/// Parses an A1 reference into a 0-based position. Absolute markers (`$`) are ignored.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let mut col = 0usize;
    let mut row = 0usize;
    let mut letters = 0usize;
    let mut digits = 0usize;
    for character in reference.chars().filter(|c| *c != '$') {
        match character {
            'A'..='Z' | 'a'..='z' if digits == 0 => {
                let letter = character.to_ascii_uppercase() as usize - 'A' as usize + 1;
                col = col.checked_mul(26)?.checked_add(letter)?;
                letters += 1;
            }
            '0'..='9' if letters > 0 => {
                row = row.checked_mul(10)?.checked_add(character.to_digit(10)? as usize)?;
                digits += 1;
            }
            _ => return None,
        }
    }
    if letters == 0 || digits == 0 || row == 0 {
        None
    } else {
        Some((row - 1, col - 1))
    }
}
