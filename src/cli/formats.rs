//! Text formats for command input and output.
//!
//! Two input shapes are accepted: JSON, or `CELL VALUE` lines split on the
//! first space (`A1 hello world`, `B2 =SUM(A1:A3)`).

use crate::error::{AppError, Result};
use crate::models::WriteOperation;
use crate::sheets::{a1_to_grid_range, index_to_column};
use serde_json::Value;
use std::io::{self, IsTerminal, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    CellValue,
}

pub fn detect_format(text: &str) -> InputFormat {
    let text = text.trim_start();
    match text.starts_with('{') || text.starts_with('[') {
        true => InputFormat::Json,
        false => InputFormat::CellValue,
    }
}

/// Parse `CELL VALUE` lines, keeping input order. Blank lines are skipped.
pub fn parse_cell_value_pairs(text: &str) -> Result<Vec<(String, String)>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(' ')
                .map(|(cell, value)| (cell.to_string(), value.to_string()))
                .ok_or_else(|| {
                    AppError::InvalidArgument(format!(
                        "Invalid format: '{}'. Expected 'cell value'",
                        line
                    ))
                })
        })
        .collect()
}

pub fn format_cell_value_pairs(pairs: &[(String, Value)]) -> String {
    pairs
        .iter()
        .map(|(cell, value)| format!("{} {}", cell, display_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Expand a returned range and its rows into per-cell addresses.
///
/// The sheet prefix is kept on every address and blank cells are dropped.
pub fn expand_range_to_cells(range: &str, rows: &[Vec<Value>]) -> Result<Vec<(String, Value)>> {
    let (prefix, cells) = match range.rsplit_once('!') {
        Some((sheet, cells)) => (format!("{}!", sheet), cells),
        None => (String::new(), range),
    };

    let grid = a1_to_grid_range(cells, 0)?;
    let start_row = grid.start_row_index.unwrap_or(0) as i64;
    let start_column = grid.start_column_index.unwrap_or(0) as i64;

    let mut expanded = Vec::new();
    for (row_offset, row) in rows.iter().enumerate() {
        for (column_offset, value) in row.iter().enumerate() {
            if is_blank(value) {
                continue;
            }
            let column = index_to_column(start_column + column_offset as i64)?;
            let row_number = start_row + row_offset as i64 + 1;
            expanded.push((format!("{}{}{}", prefix, column, row_number), value.clone()));
        }
    }

    Ok(expanded)
}

/// Turn alternating `CELL VALUE` arguments into one write per cell.
pub fn pairs_to_operations(args: &[String]) -> Result<Vec<WriteOperation>> {
    if args.len() % 2 != 0 {
        return Err(AppError::InvalidArgument(
            "Must provide alternating cell/range and value pairs".to_string(),
        ));
    }

    Ok(args
        .chunks(2)
        .map(|pair| WriteOperation::new(pair[0].clone(), vec![vec![Value::String(pair[1].clone())]]))
        .collect())
}

/// Parse write input in either format.
///
/// JSON may be an object mapping range to a 2-D array (or a scalar), or an
/// array of `{range, values}` operations.
pub fn parse_input(text: &str) -> Result<Vec<WriteOperation>> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "No input provided. Use command line args or pipe data to stdin.".to_string(),
        ));
    }

    match detect_format(text) {
        InputFormat::Json => {
            let value: Value = serde_json::from_str(text)
                .map_err(|e| AppError::InvalidArgument(format!("Invalid JSON: {}", e)))?;
            json_to_operations(value)
        }
        InputFormat::CellValue => Ok(parse_cell_value_pairs(text)?
            .into_iter()
            .map(|(cell, value)| WriteOperation::new(cell, vec![vec![Value::String(value)]]))
            .collect()),
    }
}

fn json_to_operations(value: Value) -> Result<Vec<WriteOperation>> {
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(range, values)| WriteOperation::new(range, to_rows(values)))
            .collect()),
        Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| AppError::InvalidArgument(format!("Invalid write operations: {}", e))),
        _ => Err(AppError::InvalidArgument(
            "Expected a JSON object or array".to_string(),
        )),
    }
}

fn to_rows(values: Value) -> Vec<Vec<Value>> {
    match values {
        Value::Array(items) if items.iter().all(Value::is_array) => items
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => cells,
                other => vec![other],
            })
            .collect(),
        Value::Array(items) => vec![items],
        scalar => vec![vec![scalar]],
    }
}

/// Read all of stdin, or nothing when stdin is a terminal.
pub fn read_stdin() -> Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut text = String::new();
    stdin.read_to_string(&mut text)?;
    Ok(text)
}
