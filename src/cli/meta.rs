use super::formats;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::BatchOperation;
use crate::sheets::{SheetOperations, SheetsClient};
use clap::Args;
use serde_json::Value;

#[derive(Args, Debug)]
pub struct MetaReadArgs {
    /// Spreadsheet ID, as found in the document URL
    pub spreadsheet_id: String,
}

impl MetaReadArgs {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load()?;
        let client = SheetsClient::new(&config)?;

        let metadata = client.meta_read(&self.spreadsheet_id).await?;
        println!("{}", serde_json::to_string_pretty(&metadata)?);

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct MetaWriteArgs {
    /// Spreadsheet ID. Requests are read from stdin as JSON.
    pub spreadsheet_id: String,
}

impl MetaWriteArgs {
    pub async fn execute(&self) -> Result<()> {
        let operations = parse_requests(&formats::read_stdin()?)?;

        let config = Config::load()?;
        let client = SheetsClient::new(&config)?;

        let output = self.run(&client, operations).await?;
        println!("{}", output);

        Ok(())
    }

    async fn run<S: SheetOperations>(&self, sheets: &S, operations: Vec<BatchOperation>) -> Result<String> {
        let response = sheets.meta_write(&self.spreadsheet_id, operations).await?;
        Ok(serde_json::to_string_pretty(&response)?)
    }
}

/// Accepts `{"requests": [...]}` or a bare `[...]`.
pub fn parse_requests(text: &str) -> Result<Vec<BatchOperation>> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "No input provided. Pipe JSON to stdin.".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid JSON: {}", e)))?;

    let requests = match value {
        Value::Array(requests) => requests,
        Value::Object(mut map) => match map.remove("requests") {
            Some(Value::Array(requests)) => requests,
            _ => return Err(expected_requests()),
        },
        _ => return Err(expected_requests()),
    };

    requests
        .iter()
        .enumerate()
        .map(|(index, request)| BatchOperation::from_json(index, request))
        .collect()
}

fn expected_requests() -> AppError {
    AppError::InvalidArgument(
        "Expected JSON with 'requests' array or array of requests".to_string(),
    )
}
