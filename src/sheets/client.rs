use super::SheetOperations;
use super::executor::{RequestExecutor, RetryPolicy};
use super::transport::{ApiRequest, HttpTransport, Transport, to_body};
use crate::auth::{AuthorizationFlow, CredentialManager, CredentialStore, OAuthFlow};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{BatchOperation, CellData, ValueResult, WriteOperation, WriteReply, WriteSummary};
use async_trait::async_trait;
use super::range::a1_to_grid_range;
use google_sheets4::api::{
    BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse, BatchUpdateValuesRequest,
    BatchUpdateValuesResponse, Request, Sheet, Spreadsheet, SpreadsheetProperties, ValueRange,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Service-side ceiling on requests per structural batch
const MAX_BATCH_REQUESTS: usize = 500;

/// Parse leading `=` as formulas and coerce other input like typed text
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Largest block a clear may blank out within a value batch
const MAX_CLEAR_CELLS: u64 = 1_000_000;

pub struct SheetsClient<T = HttpTransport, F = OAuthFlow> {
    executor: RequestExecutor<T, F>,
}

impl SheetsClient {
    /// Build a client from configuration.
    ///
    /// Only the client secret is read here. The token is obtained lazily on the
    /// first request, so constructing a client never opens a browser.
    #[instrument(name = "Preparing Google Sheets client", skip_all)]
    pub fn new(config: &Config) -> Result<Self> {
        let store = CredentialStore::new(config.credentials_dir()?);
        let secret = store.load_client_secret()?;
        let flow = OAuthFlow::new(&secret)?;
        let credentials = Arc::new(CredentialManager::new(store, flow));
        let transport = HttpTransport::new(&config.google.api_base_url)?;

        Ok(Self::with_executor(RequestExecutor::new(
            transport,
            credentials,
            RetryPolicy::from(&config.retry),
        )))
    }
}

impl<T: Transport, F: AuthorizationFlow> SheetsClient<T, F> {
    pub fn with_executor(executor: RequestExecutor<T, F>) -> Self {
        Self { executor }
    }

    pub fn credentials(&self) -> &Arc<CredentialManager<F>> {
        self.executor.credentials()
    }

    async fn read_grid(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
        fields: CellData,
    ) -> Result<ValueResult> {
        let request = ranges
            .iter()
            .fold(
                ApiRequest::get(["spreadsheets", spreadsheet_id]).query("includeGridData", "true"),
                |request, range| request.query("ranges", range.as_str()),
            )
            .query("fields", fields.grid_fields());

        Ok(ValueResult::Grid(self.executor.execute_as(&request).await?))
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<ValueRange>,
    ) -> Result<BatchUpdateValuesResponse> {
        let path = ["spreadsheets", spreadsheet_id, "values:batchUpdate"];
        let body = to_body(&BatchUpdateValuesRequest {
            data: Some(data),
            value_input_option: Some(VALUE_INPUT_OPTION.to_string()),
            ..Default::default()
        })?;

        self.executor
            .execute_as(&ApiRequest::post(path, body))
            .await
    }
}

fn require_spreadsheet_id(spreadsheet_id: &str) -> Result<()> {
    match spreadsheet_id.trim().is_empty() {
        true => Err(AppError::InvalidArgument(
            "spreadsheet id must not be empty".to_string(),
        )),
        false => Ok(()),
    }
}

fn validate_write(index: usize, operation: &WriteOperation) -> Result<()> {
    if operation.range.trim().is_empty() {
        return Err(AppError::InvalidArgument(format!(
            "data[{}]: range must not be empty",
            index
        )));
    }

    // Accepting these and dropping them would lose data silently
    if operation.format.is_some() || operation.note.is_some() {
        return Err(AppError::InvalidArgument(format!(
            "data[{}]: format and note cannot be written with values; use a structural update",
            index
        )));
    }

    Ok(())
}

/// Blank cells covering a clear's range, so the clear rides in the same value batch.
fn blank_block(index: usize, operation: &WriteOperation) -> Result<Vec<Vec<Value>>> {
    let unbounded = || {
        AppError::InvalidArgument(format!(
            "data[{}]: clearing needs a bounded range such as A1:C10, got '{}'",
            index, operation.range
        ))
    };

    let grid = a1_to_grid_range(&operation.range, 0).map_err(|_| unbounded())?;
    let (Some(start_row), Some(end_row), Some(start_col), Some(end_col)) = (
        grid.start_row_index,
        grid.end_row_index,
        grid.start_column_index,
        grid.end_column_index,
    ) else {
        return Err(unbounded());
    };

    let rows = (end_row - start_row) as usize;
    let columns = (end_col - start_col) as usize;
    if rows as u64 * columns as u64 > MAX_CLEAR_CELLS {
        return Err(AppError::InvalidArgument(format!(
            "data[{}]: clearing {} exceeds {} cells; use an updateCells structural request",
            index, operation.range, MAX_CLEAR_CELLS
        )));
    }

    Ok(vec![vec![Value::String(String::new()); columns]; rows])
}

#[async_trait]
impl<T: Transport, F: AuthorizationFlow> SheetOperations for SheetsClient<T, F> {
    #[instrument(name = "Reading cells", skip_all, fields(spreadsheet_id = %spreadsheet_id, ranges = ranges.len()))]
    async fn read(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
        fields: CellData,
    ) -> Result<ValueResult> {
        require_spreadsheet_id(spreadsheet_id)?;
        if ranges.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one range is required".to_string(),
            ));
        }
        if fields.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one cell field must be requested".to_string(),
            ));
        }

        if fields.needs_grid_data() {
            debug!("Formatting or notes requested, reading grid data");
            return self.read_grid(spreadsheet_id, ranges, fields).await;
        }

        let render = fields.value_render_option();

        if let [range] = ranges {
            let request =
                ApiRequest::get(["spreadsheets", spreadsheet_id, "values", range.as_str()])
                    .query("valueRenderOption", render);
            return Ok(ValueResult::Single(self.executor.execute_as(&request).await?));
        }

        let request = ranges
            .iter()
            .fold(
                ApiRequest::get(["spreadsheets", spreadsheet_id, "values:batchGet"]),
                |request, range| request.query("ranges", range.as_str()),
            )
            .query("valueRenderOption", render);

        Ok(ValueResult::Multiple(self.executor.execute_as(&request).await?))
    }

    #[instrument(name = "Writing cells", skip_all, fields(spreadsheet_id = %spreadsheet_id, operations = operations.len()))]
    async fn write(
        &self,
        spreadsheet_id: &str,
        operations: &[WriteOperation],
    ) -> Result<WriteSummary> {
        require_spreadsheet_id(spreadsheet_id)?;
        if operations.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one write operation is required".to_string(),
            ));
        }
        for (index, operation) in operations.iter().enumerate() {
            validate_write(index, operation)?;
        }

        let mut data = Vec::with_capacity(operations.len());
        for (index, operation) in operations.iter().enumerate() {
            let values = match operation.is_clear() {
                true => blank_block(index, operation)?,
                false => operation.values.clone(),
            };
            data.push(ValueRange {
                range: Some(operation.range.clone()),
                values: Some(values),
                ..Default::default()
            });
        }
        let clears = operations.iter().filter(|op| op.is_clear()).count();

        let updated = self.update_values(spreadsheet_id, data).await?;

        let updates = updated.responses.unwrap_or_default();
        if updates.len() != operations.len() {
            return Err(AppError::Sheets(format!(
                "Expected {} update replies, got {}",
                operations.len(),
                updates.len()
            )));
        }

        let responses = operations
            .iter()
            .zip(updates)
            .map(|(operation, update)| match operation.is_clear() {
                true => WriteReply::Cleared {
                    cleared_range: update
                        .updated_range
                        .unwrap_or_else(|| operation.range.clone()),
                },
                false => WriteReply::Updated(update),
            })
            .collect();

        let summary = WriteSummary {
            spreadsheet_id: spreadsheet_id.to_string(),
            total_updated_rows: updated.total_updated_rows.unwrap_or_default(),
            total_updated_columns: updated.total_updated_columns.unwrap_or_default(),
            total_updated_cells: updated.total_updated_cells.unwrap_or_default(),
            responses,
        };
        info!(
            cells = summary.total_updated_cells,
            cleared = clears,
            "Write complete"
        );

        Ok(summary)
    }

    #[instrument(name = "Reading metadata", skip_all, fields(spreadsheet_id = %spreadsheet_id))]
    async fn meta_read(&self, spreadsheet_id: &str) -> Result<Spreadsheet> {
        require_spreadsheet_id(spreadsheet_id)?;

        let request =
            ApiRequest::get(["spreadsheets", spreadsheet_id]).query("includeGridData", "false");
        self.executor.execute_as(&request).await
    }

    #[instrument(name = "Applying structural updates", skip_all, fields(spreadsheet_id = %spreadsheet_id, operations = operations.len()))]
    async fn meta_write(
        &self,
        spreadsheet_id: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<BatchUpdateSpreadsheetResponse> {
        require_spreadsheet_id(spreadsheet_id)?;
        if operations.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one request is required".to_string(),
            ));
        }
        for (index, operation) in operations.iter().enumerate() {
            operation.validate_at(index)?;
        }
        if operations.len() > MAX_BATCH_REQUESTS {
            warn!(
                count = operations.len(),
                limit = MAX_BATCH_REQUESTS,
                "Batch exceeds the service limit and will likely be rejected"
            );
        }

        let expected = operations.len();
        let kinds: Vec<&str> = operations.iter().map(BatchOperation::kind).collect();
        debug!(?kinds, "Submitting batch");

        let requests: Vec<Request> = operations.into_iter().map(Request::from).collect();
        let body = to_body(&BatchUpdateSpreadsheetRequest {
            requests: Some(requests),
            ..Default::default()
        })?;
        let path = [
            "spreadsheets".to_string(),
            format!("{}:batchUpdate", spreadsheet_id),
        ];

        let response: BatchUpdateSpreadsheetResponse = self
            .executor
            .execute_as(&ApiRequest::post(path, body))
            .await?;

        let replies = response.replies.as_ref().map_or(0, Vec::len);
        if replies != expected {
            return Err(AppError::Sheets(format!(
                "Expected {} replies, got {}",
                expected, replies
            )));
        }

        Ok(response)
    }

    #[instrument(name = "Creating spreadsheet", skip_all, fields(title = %title))]
    async fn create(&self, title: &str, sheets: Vec<Sheet>) -> Result<Spreadsheet> {
        if title.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "title must not be empty".to_string(),
            ));
        }

        let spreadsheet = Spreadsheet {
            properties: Some(SpreadsheetProperties {
                title: Some(title.to_string()),
                ..Default::default()
            }),
            sheets: (!sheets.is_empty()).then_some(sheets),
            ..Default::default()
        };

        let created: Spreadsheet = self
            .executor
            .execute_as(&ApiRequest::post(["spreadsheets"], to_body(&spreadsheet)?))
            .await?;

        if created.spreadsheet_id.is_none() {
            return Err(AppError::Sheets(
                "Created spreadsheet has empty ID".to_string(),
            ));
        }
        info!(url = ?created.spreadsheet_url, "Spreadsheet created");

        Ok(created)
    }
}
