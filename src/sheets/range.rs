//! A1 notation helpers.
//!
//! Grid ranges are zero-based and half-open: `A1:C10` covers rows `0..10` and
//! columns `0..3`. Any sheet name embedded in the notation is informational
//! only; the numeric sheet id passed by the caller always decides addressing.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

const RADIX: u64 = 26;

/// Convert column letter(s) to a zero-based index (`A` = 0, `Z` = 25, `AA` = 26).
pub fn column_to_index(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(AppError::InvalidArgument(
            "column letters must not be empty".to_string(),
        ));
    }

    let mut value: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(AppError::InvalidArgument(format!(
                "invalid column letters '{}'",
                letters
            )));
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u64 + 1;
        value = value * RADIX + digit;
        if value > u32::MAX as u64 {
            return Err(AppError::InvalidArgument(format!(
                "column '{}' is out of range",
                letters
            )));
        }
    }

    Ok((value - 1) as u32)
}

/// Convert a zero-based index to column letter(s).
pub fn index_to_column(index: i64) -> Result<String> {
    if index < 0 {
        return Err(AppError::InvalidArgument(format!(
            "column index must not be negative, got {}",
            index
        )));
    }

    let mut letters = Vec::new();
    let mut n = index as u64 + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % RADIX) as u8);
        n /= RADIX;
    }
    letters.reverse();

    Ok(letters.into_iter().map(char::from).collect())
}

/// Zero-based, end-exclusive rectangle on a sheet. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<u32>,
}

impl From<GridRange> for google_sheets4::api::GridRange {
    fn from(range: GridRange) -> Self {
        let to_i32 = |index: Option<u32>| index.map(|i| i as i32);
        google_sheets4::api::GridRange {
            sheet_id: Some(range.sheet_id),
            start_row_index: to_i32(range.start_row_index),
            end_row_index: to_i32(range.end_row_index),
            start_column_index: to_i32(range.start_column_index),
            end_column_index: to_i32(range.end_column_index),
        }
    }
}

/// One side of a range: `B5`, `B` or `5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Cell { column: u32, row: u32 },
    Column(u32),
    Row(u32),
}

fn parse_bound(part: &str, spec: &str) -> Result<Bound> {
    let invalid = || AppError::InvalidRangeSpec(spec.to_string());

    let split = part
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(part.len());
    let (letters, digits) = part.split_at(split);

    if !letters.chars().all(|c| c.is_ascii_alphabetic())
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let row = match digits {
        "" => None,
        digits => {
            let row: u32 = digits.parse().map_err(|_| invalid())?;
            if row == 0 {
                return Err(invalid());
            }
            Some(row - 1)
        }
    };
    let column = match letters {
        "" => None,
        letters => Some(column_to_index(letters).map_err(|_| invalid())?),
    };

    match (column, row) {
        (Some(column), Some(row)) => Ok(Bound::Cell { column, row }),
        (Some(column), None) => Ok(Bound::Column(column)),
        (None, Some(row)) => Ok(Bound::Row(row)),
        (None, None) => Err(invalid()),
    }
}

fn span(a: u32, b: u32) -> (Option<u32>, Option<u32>) {
    (Some(a.min(b)), Some(a.max(b) + 1))
}

/// Parse A1 notation (`B5`, `A1:C10`, `A:C`, `1:5`, optionally sheet-prefixed)
/// into a [`GridRange`] on `sheet_id`.
pub fn a1_to_grid_range(range_spec: &str, sheet_id: i32) -> Result<GridRange> {
    let cells = match range_spec.rsplit_once('!') {
        Some((_, cells)) => cells,
        None => range_spec,
    }
    .trim();

    let mut range = GridRange {
        sheet_id,
        start_row_index: None,
        end_row_index: None,
        start_column_index: None,
        end_column_index: None,
    };

    let (start, end) = match cells.split_once(':') {
        Some((start, end)) => (
            parse_bound(start, range_spec)?,
            parse_bound(end, range_spec)?,
        ),
        None => {
            let bound = parse_bound(cells, range_spec)?;
            if !matches!(bound, Bound::Cell { .. }) {
                return Err(AppError::InvalidRangeSpec(range_spec.to_string()));
            }
            (bound, bound)
        }
    };

    match (start, end) {
        (Bound::Cell { column: c1, row: r1 }, Bound::Cell { column: c2, row: r2 }) => {
            (range.start_row_index, range.end_row_index) = span(r1, r2);
            (range.start_column_index, range.end_column_index) = span(c1, c2);
        }
        (Bound::Column(c1), Bound::Column(c2)) => {
            (range.start_column_index, range.end_column_index) = span(c1, c2);
        }
        (Bound::Row(r1), Bound::Row(r2)) => {
            (range.start_row_index, range.end_row_index) = span(r1, r2);
        }
        _ => return Err(AppError::InvalidRangeSpec(range_spec.to_string())),
    }

    Ok(range)
}

/// Longest column label the service addresses (`ZZZ`)
const MAX_COLUMN_LETTERS: usize = 3;

/// Whether a bare title would be read as a cell, column or R1C1 reference.
fn looks_like_reference(title: &str) -> bool {
    let split = title
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(title.len());
    let (letters, digits) = title.split_at(split);
    let column_like = (1..=MAX_COLUMN_LETTERS).contains(&letters.len())
        && letters.chars().all(|c| c.is_ascii_alphabetic())
        && digits.chars().all(|c| c.is_ascii_digit());

    let r1c1 = title
        .strip_prefix(['R', 'r'])
        .and_then(|rest| rest.split_once(['C', 'c']))
        .is_some_and(|(row, column)| {
            [row, column]
                .iter()
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        });

    column_like || r1c1
}

/// Render a sheet title so it can be used as a range on its own.
///
/// Plain titles such as `Sheet1` stay bare. Anything else is single-quoted,
/// including titles like `Q1` that would otherwise address a cell.
pub fn quote_sheet_title(title: &str) -> String {
    let plain = title
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && title.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !looks_like_reference(title);

    match plain {
        true => title.to_string(),
        false => format!("'{}'", title.replace('\'', "''")),
    }
}
