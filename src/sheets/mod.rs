mod client;
pub mod executor;
pub mod range;
pub mod transport;

pub use client::SheetsClient;
pub use executor::{RequestExecutor, RetryPolicy};
pub use range::{GridRange, a1_to_grid_range, column_to_index, index_to_column, quote_sheet_title};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

use crate::error::Result;
use crate::models::{BatchOperation, CellData, ValueResult, WriteOperation, WriteSummary};
use async_trait::async_trait;
use google_sheets4::api::{BatchUpdateSpreadsheetResponse, Sheet, Spreadsheet};

/// Operations against a spreadsheet. Each call is self-contained.
#[async_trait]
pub trait SheetOperations: Send + Sync {
    async fn read(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
        fields: CellData,
    ) -> Result<ValueResult>;

    async fn write(
        &self,
        spreadsheet_id: &str,
        operations: &[WriteOperation],
    ) -> Result<WriteSummary>;

    /// Document properties, sheets, named ranges and conditional formats. Never cell data.
    async fn meta_read(&self, spreadsheet_id: &str) -> Result<Spreadsheet>;

    /// Apply structural changes in order. One reply per operation.
    async fn meta_write(
        &self,
        spreadsheet_id: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<BatchUpdateSpreadsheetResponse>;

    async fn create(&self, title: &str, sheets: Vec<Sheet>) -> Result<Spreadsheet>;
}
