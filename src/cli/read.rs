use super::formats;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CellData, ValueResult};
use crate::sheets::{SheetOperations, SheetsClient, quote_sheet_title};
use clap::Args;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Spreadsheet ID, as found in the document URL
    pub spreadsheet_id: String,

    /// Cells or ranges (A1, A1:B10, Sheet1!A1). Reads every sheet when omitted.
    pub ranges: Vec<String>,

    /// Read rendered values instead of formulas
    #[arg(long)]
    pub no_formulas: bool,

    /// Include cell formatting (output is JSON)
    #[arg(long)]
    pub format: bool,

    /// Include cell notes (output is JSON)
    #[arg(long)]
    pub notes: bool,

    /// Print the raw result as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReadArgs {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load()?;
        let client = SheetsClient::new(&config)?;

        let output = self.run(&client).await?;
        println!("{}", output);

        Ok(())
    }

    fn fields(&self) -> CellData {
        let mut fields = CellData::VALUE;
        fields.set(CellData::FORMULA, !self.no_formulas);
        fields.set(CellData::FORMAT, self.format);
        fields.set(CellData::NOTE, self.notes);
        fields
    }

    async fn run<S: SheetOperations>(&self, sheets: &S) -> Result<String> {
        let ranges = match self.ranges.is_empty() {
            true => all_sheet_ranges(sheets, &self.spreadsheet_id).await?,
            false => self.ranges.clone(),
        };

        let fields = self.fields();
        let result = sheets.read(&self.spreadsheet_id, &ranges, fields).await?;

        if self.json || fields.needs_grid_data() {
            return Ok(serde_json::to_string_pretty(&result)?);
        }

        render_cells(&result)
    }
}

/// One range per sheet, each covering the whole sheet.
async fn all_sheet_ranges<S: SheetOperations>(sheets: &S, spreadsheet_id: &str) -> Result<Vec<String>> {
    let metadata = sheets.meta_read(spreadsheet_id).await?;

    let ranges: Vec<String> = metadata
        .sheets
        .unwrap_or_default()
        .iter()
        .filter_map(|sheet| sheet.properties.as_ref()?.title.as_deref())
        .map(quote_sheet_title)
        .collect();

    if ranges.is_empty() {
        return Err(AppError::InvalidArgument(
            "No sheets found in spreadsheet".to_string(),
        ));
    }

    Ok(ranges)
}

fn render_cells(result: &ValueResult) -> Result<String> {
    let mut cells = Vec::new();
    for (range, rows) in result.value_ranges() {
        cells.extend(formats::expand_range_to_cells(range, rows)?);
    }
    Ok(formats::format_cell_value_pairs(&cells))
}
