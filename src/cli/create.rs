use super::formats;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::sheets::{SheetOperations, SheetsClient};
use clap::Args;
use google_sheets4::api::Sheet;
use serde_json::Value;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Title of the new spreadsheet. Initial sheets may be piped as JSON.
    pub title: String,
}

impl CreateArgs {
    pub async fn execute(&self) -> Result<()> {
        let sheets = parse_sheets(&formats::read_stdin()?)?;

        let config = Config::load()?;
        let client = SheetsClient::new(&config)?;

        let created = client.create(&self.title, sheets).await?;
        println!("{}", serde_json::to_string_pretty(&created)?);

        Ok(())
    }
}

/// Accepts nothing, `{"sheets": [...]}` or a bare `[...]` of sheet objects.
fn parse_sheets(text: &str) -> Result<Vec<Sheet>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid JSON: {}", e)))?;

    let sheets = match value {
        Value::Object(mut map) if map.contains_key("sheets") => map.remove("sheets").unwrap_or_default(),
        other => other,
    };

    serde_json::from_value(sheets)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid sheets: {}", e)))
}
