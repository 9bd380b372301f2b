use super::protocol::{INTERNAL_ERROR, INVALID_PARAMS, RpcError};
use crate::error::AppError;
use crate::models::{BatchOperation, CellData, WriteOperation};
use crate::sheets::SheetOperations;
use google_sheets4::api::Sheet;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Operation(#[from] AppError),
}

impl From<ToolError> for RpcError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. } => {
                RpcError::new(INVALID_PARAMS, error.to_string())
            }
            ToolError::Operation(e) => RpcError {
                code: INTERNAL_ERROR,
                message: e.to_string(),
                data: Some(json!({"kind": e.kind()})),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateSpreadsheetArgs {
    title: String,
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct ReadCellsArgs {
    spreadsheet_id: String,
    ranges: Vec<String>,
    #[serde(default)]
    read_formulas: bool,
    #[serde(default)]
    include_format: bool,
    #[serde(default)]
    include_notes: bool,
}

impl ReadCellsArgs {
    fn fields(&self) -> CellData {
        let mut fields = match self.read_formulas {
            true => CellData::FORMULA,
            false => CellData::VALUE,
        };
        fields.set(CellData::FORMAT, self.include_format);
        fields.set(CellData::NOTE, self.include_notes);
        fields
    }
}

#[derive(Debug, Deserialize)]
struct WriteCellsArgs {
    spreadsheet_id: String,
    data: Vec<WriteOperation>,
}

#[derive(Debug, Deserialize)]
struct ReadMetadataArgs {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct WriteMetadataArgs {
    spreadsheet_id: String,
    requests: Vec<Value>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Run one tool and return its result as JSON.
#[instrument(name = "Calling tool", skip(sheets, arguments))]
pub async fn call<S: SheetOperations>(
    sheets: &S,
    name: &str,
    arguments: Value,
) -> Result<Value, ToolError> {
    let result = match name {
        "create_spreadsheet" => {
            let args: CreateSpreadsheetArgs = parse_args(name, arguments)?;
            serde_json::to_value(sheets.create(&args.title, args.sheets).await?)
        }
        "read_cells" => {
            let args: ReadCellsArgs = parse_args(name, arguments)?;
            let fields = args.fields();
            serde_json::to_value(sheets.read(&args.spreadsheet_id, &args.ranges, fields).await?)
        }
        "write_cells" => {
            let args: WriteCellsArgs = parse_args(name, arguments)?;
            serde_json::to_value(sheets.write(&args.spreadsheet_id, &args.data).await?)
        }
        "read_metadata" => {
            let args: ReadMetadataArgs = parse_args(name, arguments)?;
            serde_json::to_value(sheets.meta_read(&args.spreadsheet_id).await?)
        }
        "write_metadata" => {
            let args: WriteMetadataArgs = parse_args(name, arguments)?;
            let operations = args
                .requests
                .iter()
                .enumerate()
                .map(|(index, request)| BatchOperation::from_json(index, request))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ToolError::InvalidArguments {
                    tool: name.to_string(),
                    reason: e.to_string(),
                })?;
            debug!(count = operations.len(), "Validated batch requests");
            serde_json::to_value(sheets.meta_write(&args.spreadsheet_id, operations).await?)
        }
        other => return Err(ToolError::UnknownTool(other.to_string())),
    };

    Ok(result.map_err(AppError::from)?)
}

fn spreadsheet_id_schema() -> Value {
    json!({"type": "string", "description": "The ID of the Google Spreadsheet"})
}

/// Tool descriptors for `tools/list`.
pub fn definitions() -> Value {
    json!([
        {
            "name": "create_spreadsheet",
            "description": "Create a new Google Spreadsheet. Returns its spreadsheetId and spreadsheetUrl.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Title for the new spreadsheet"},
                    "sheets": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "Optional sheet objects, e.g. {\"properties\": {\"title\": \"Data\", \"gridProperties\": {\"rowCount\": 100}}}"
                    }
                },
                "required": ["title"]
            }
        },
        {
            "name": "read_cells",
            "description": "Read cell values, formulas, formatting or notes from one or more A1 ranges. Absent cells are omitted from rows.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": spreadsheet_id_schema(),
                    "ranges": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "A1 ranges, e.g. ['Sheet1!A1:C10', 'Sheet2!B2:B5']"
                    },
                    "read_formulas": {"type": "boolean", "default": false, "description": "Return formulas instead of calculated values"},
                    "include_format": {"type": "boolean", "default": false, "description": "Include cell formatting (returns grid data)"},
                    "include_notes": {"type": "boolean", "default": false, "description": "Include cell notes (returns grid data)"}
                },
                "required": ["spreadsheet_id", "ranges"]
            }
        },
        {
            "name": "write_cells",
            "description": "Write values and formulas in a single batch. Strings starting with '=' are formulas. An empty values array clears the range.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": spreadsheet_id_schema(),
                    "data": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "range": {"type": "string", "description": "A1 range, e.g. 'Sheet1!A1:C3'"},
                                "values": {"type": "array", "description": "2-D array of values"}
                            },
                            "required": ["range", "values"]
                        }
                    }
                },
                "required": ["spreadsheet_id", "data"]
            }
        },
        {
            "name": "read_metadata",
            "description": "Get spreadsheet properties, sheets with their numeric IDs and grid sizes, named ranges and conditional formats.",
            "inputSchema": {
                "type": "object",
                "properties": {"spreadsheet_id": spreadsheet_id_schema()},
                "required": ["spreadsheet_id"]
            }
        },
        {
            "name": "write_metadata",
            "description": "Apply structural changes (add/delete sheets, formatting, merges, borders, named ranges, sorting) as one ordered batch of up to 500 requests.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spreadsheet_id": spreadsheet_id_schema(),
                    "requests": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "Batch update requests, e.g. [{\"addSheet\": {\"properties\": {\"title\": \"Summary\"}}}]"
                    }
                },
                "required": ["spreadsheet_id", "requests"]
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::mocks::RecordingSheets;

    #[test]
    fn test_read_fields_from_flags() {
        let args: ReadCellsArgs = serde_json::from_value(json!({
            "spreadsheet_id": "doc", "ranges": ["A1"], "read_formulas": true, "include_notes": true
        }))
        .unwrap();

        assert_eq!(args.fields(), CellData::FORMULA | CellData::NOTE);
    }

    #[test]
    fn test_definitions_cover_every_tool() {
        let names: Vec<String> = definitions()
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(
            names,
            vec!["create_spreadsheet", "read_cells", "write_cells", "read_metadata", "write_metadata"]
        );
    }

    #[tokio::test]
    async fn test_write_cells_forwards_operations() {
        let sheets = RecordingSheets::new();

        let result = call(
            &sheets,
            "write_cells",
            json!({"spreadsheet_id": "doc", "data": [{"range": "A1:B1", "values": [[1, "=A1"]]}]}),
        )
        .await
        .unwrap();

        assert_eq!(result["totalUpdatedCells"], json!(2));
        assert_eq!(sheets.writes.lock().unwrap()[0].range, "A1:B1");
    }

    #[tokio::test]
    async fn test_write_metadata_accepts_fields_masks() {
        let sheets = RecordingSheets::new();

        let result = call(
            &sheets,
            "write_metadata",
            json!({
                "spreadsheet_id": "doc",
                "requests": [
                    {"repeatCell": {
                        "range": {"sheetId": 0, "startRowIndex": 0, "endRowIndex": 1},
                        "cell": {"userEnteredFormat": {"textFormat": {"bold": true}}},
                        "fields": "userEnteredFormat.textFormat.bold"
                    }},
                    {"updateSpreadsheetProperties": {
                        "properties": {"title": "Q3 Report"},
                        "fields": "title"
                    }},
                    {"updateCells": {
                        "start": {"sheetId": 0, "rowIndex": 0, "columnIndex": 0},
                        "rows": [{"values": [{"note": "Source: finance"}]}],
                        "fields": "note"
                    }}
                ]
            }),
        )
        .await
        .unwrap();

        assert_eq!(result["replies"].as_array().unwrap().len(), 3);
        assert_eq!(sheets.calls(), vec!["meta_write doc 3"]);
    }

    #[tokio::test]
    async fn test_invalid_batch_request_is_invalid_params() {
        let sheets = RecordingSheets::new();

        let err = call(
            &sheets,
            "write_metadata",
            json!({"spreadsheet_id": "doc", "requests": [{"addSheet": {}}, {"sortRange": {}}]}),
        )
        .await
        .unwrap_err();

        let rpc: RpcError = err.into();
        assert_eq!(rpc.code, INVALID_PARAMS);
        assert!(rpc.message.contains("requests[1]"), "{}", rpc.message);
        assert!(sheets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_operation_failure_carries_kind() {
        let sheets = RecordingSheets::new();
        sheets.fail_next(AppError::RateLimited {
            attempts: 3,
            status: 429,
            detail: "Quota exceeded".to_string(),
        });

        let err = call(&sheets, "read_metadata", json!({"spreadsheet_id": "doc"}))
            .await
            .unwrap_err();

        let rpc: RpcError = err.into();
        assert_eq!(rpc.code, INTERNAL_ERROR);
        assert_eq!(rpc.message, "Rate limit exceeded after 3 attempts: 429 - Quota exceeded");
        assert_eq!(rpc.data, Some(json!({"kind": "RATE_LIMITED"})));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_missing_arguments() {
        let sheets = RecordingSheets::new();

        let err = call(&sheets, "delete_everything", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));

        let err = call(&sheets, "read_cells", json!({"spreadsheet_id": "doc"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
