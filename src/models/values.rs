use bitflags::bitflags;
use google_sheets4::api::{BatchGetValuesResponse, Spreadsheet, UpdateValuesResponse, ValueRange};
use serde::{Deserialize, Serialize};
use serde_json::Value;

bitflags! {
    /// Which cell facets a read fetches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellData: u8 {
        /// Rendered values
        const VALUE = 1;
        /// Formulas as entered
        const FORMULA = 2;
        /// Formatting (colors, fonts, borders, number formats)
        const FORMAT = 4;
        /// Cell notes
        const NOTE = 8;
    }
}

impl Default for CellData {
    fn default() -> Self {
        CellData::VALUE
    }
}

impl CellData {
    /// Formatting and notes are only exposed through the full grid representation.
    pub fn needs_grid_data(self) -> bool {
        self.intersects(CellData::FORMAT | CellData::NOTE)
    }

    pub fn value_render_option(self) -> &'static str {
        match self.contains(CellData::FORMULA) {
            true => "FORMULA",
            false => "FORMATTED_VALUE",
        }
    }

    /// Partial-response mask restricting a grid read to the requested facets.
    pub fn grid_fields(self) -> String {
        let mut cell_fields = Vec::new();
        if self.contains(CellData::VALUE) {
            cell_fields.push("formattedValue");
        }
        if self.contains(CellData::FORMULA) {
            cell_fields.push("userEnteredValue");
        }
        if self.contains(CellData::FORMAT) {
            cell_fields.push("userEnteredFormat");
        }
        if self.contains(CellData::NOTE) {
            cell_fields.push("note");
        }

        format!(
            "spreadsheetId,properties.title,sheets(properties(sheetId,title),data(startRow,startColumn,rowData(values({}))))",
            cell_fields.join(",")
        )
    }
}

/// Result of a read. Rows may be sparse: absent cells are simply omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ValueResult {
    Single(ValueRange),
    Multiple(BatchGetValuesResponse),
    Grid(Spreadsheet),
}

impl ValueResult {
    /// Flatten into `(range, rows)` pairs. Grid results carry no value ranges.
    pub fn value_ranges(&self) -> Vec<(&str, &[Vec<Value>])> {
        match self {
            ValueResult::Single(vr) => pair(vr).into_iter().collect(),
            ValueResult::Multiple(batch) => batch
                .value_ranges
                .as_deref()
                .unwrap_or_default()
                .iter()
                .filter_map(pair)
                .collect(),
            ValueResult::Grid(_) => Vec::new(),
        }
    }
}

fn pair(vr: &ValueRange) -> Option<(&str, &[Vec<Value>])> {
    let range = vr.range.as_deref()?;
    Some((range, vr.values.as_deref().unwrap_or_default()))
}

/// One range write. Empty `values` (or only empty rows) clears the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOperation {
    pub range: String,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl WriteOperation {
    pub fn new(range: impl Into<String>, values: Vec<Vec<Value>>) -> Self {
        Self {
            range: range.into(),
            values,
            format: None,
            note: None,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.values.iter().all(|row| row.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WriteReply {
    Updated(UpdateValuesResponse),
    Cleared {
        #[serde(rename = "clearedRange")]
        cleared_range: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    pub spreadsheet_id: String,
    pub total_updated_rows: i32,
    pub total_updated_columns: i32,
    pub total_updated_cells: i32,
    /// One reply per submitted operation, in submission order
    pub responses: Vec<WriteReply>,
}
