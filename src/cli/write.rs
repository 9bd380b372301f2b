use super::formats;
use crate::config::Config;
use crate::error::Result;
use crate::models::WriteOperation;
use crate::sheets::{SheetOperations, SheetsClient};
use clap::Args;

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Spreadsheet ID, as found in the document URL
    pub spreadsheet_id: String,

    /// Alternating CELL VALUE pairs. Reads stdin (JSON or CELL VALUE lines) when omitted.
    pub pairs: Vec<String>,
}

impl WriteArgs {
    pub async fn execute(&self) -> Result<()> {
        let operations = match self.pairs.is_empty() {
            true => formats::parse_input(&formats::read_stdin()?)?,
            false => formats::pairs_to_operations(&self.pairs)?,
        };

        let config = Config::load()?;
        let client = SheetsClient::new(&config)?;

        let updated = self.run(&client, &operations).await?;
        eprintln!("Updated {} cells", updated);

        Ok(())
    }

    async fn run<S: SheetOperations>(&self, sheets: &S, operations: &[WriteOperation]) -> Result<i32> {
        let summary = sheets.write(&self.spreadsheet_id, operations).await?;
        Ok(summary.total_updated_cells)
    }
}
