//! Tool server speaking JSON-RPC 2.0 over newline-delimited stdio.
//!
//! Requests are handled one at a time in arrival order. Authorization is
//! deferred to the first tool call that needs a token.

mod protocol;
mod tools;

use crate::error::Result;
use crate::sheets::SheetOperations;
use protocol::{METHOD_NOT_FOUND, PARSE_ERROR, RpcError, RpcRequest, RpcResponse, INVALID_PARAMS};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "sheet-cli";

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct McpServer<S> {
    sheets: S,
}

impl<S: SheetOperations> McpServer<S> {
    pub fn new(sheets: S) -> Self {
        Self { sheets }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Tool server ready");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(line).await else {
                continue;
            };

            let mut text = serde_json::to_string(&response)?;
            text.push('\n');
            writer.write_all(text.as_bytes()).await?;
            writer.flush().await?;
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparsable message: {}", e);
                return Some(RpcResponse::failure(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let request = match RpcRequest::from_value(value) {
            Ok(request) => request,
            Err((id, error)) => return Some(RpcResponse::failure(id, error)),
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        Some(match self.dispatch(&request.method, request.params).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::failure(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, RpcError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
                "capabilities": {"tools": {}}
            })),
            "tools/list" => Ok(json!({"tools": tools::definitions()})),
            "tools/call" => {
                let call: ToolCall = serde_json::from_value(params)
                    .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;
                let result = tools::call(&self.sheets, &call.name, call.arguments).await?;
                Ok(json!({
                    "content": [{"type": "text", "text": pretty(&result)}]
                }))
            }
            "ping" => Ok(json!({})),
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::sheets::mocks::RecordingSheets;
    use protocol::{INTERNAL_ERROR, INVALID_REQUEST};

    async fn exchange(sheets: &RecordingSheets, input: &str) -> Vec<Value> {
        let server = McpServer::new(sheets.clone());
        let mut output = Vec::new();

        server.run(input.as_bytes(), &mut output).await.unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let sheets = RecordingSheets::new();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );

        let responses = exchange(&sheets, input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[0]["result"]["protocolVersion"], json!("2024-11-05"));
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!("sheet-cli"));
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_tool_call_returns_text_content() {
        let sheets = RecordingSheets::new();
        sheets.set_metadata(json!({"spreadsheetId": "doc", "properties": {"title": "Budget"}}));
        let input = r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"read_metadata","arguments":{"spreadsheet_id":"doc"}}}"#;

        let responses = exchange(&sheets, input).await;

        let content = &responses[0]["result"]["content"][0];
        assert_eq!(content["type"], json!("text"));
        let text: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["properties"]["title"], json!("Budget"));
        assert_eq!(sheets.calls(), vec!["meta_read doc"]);
    }

    #[tokio::test]
    async fn test_error_codes() {
        let sheets = RecordingSheets::new();
        sheets.fail_next(AppError::RequestRejected {
            status: 404,
            detail: "Requested entity was not found.".to_string(),
        });
        let input = [
            "{not json",
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope"}}"#,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"read_metadata","arguments":{"spreadsheet_id":"gone"}}}"#,
            r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#,
        ]
        .join("\n");

        let responses = exchange(&sheets, &input).await;

        let codes: Vec<Value> = responses.iter().map(|r| r["error"]["code"].clone()).collect();
        assert_eq!(
            codes,
            vec![
                json!(PARSE_ERROR),
                json!(INVALID_REQUEST),
                json!(METHOD_NOT_FOUND),
                json!(INVALID_PARAMS),
                json!(INTERNAL_ERROR),
                Value::Null,
            ]
        );
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(
            responses[4]["error"]["message"],
            json!("Request rejected: 404 - Requested entity was not found.")
        );
        assert_eq!(responses[4]["error"]["data"]["kind"], json!("REQUEST_REJECTED"));
        assert_eq!(responses[5]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_requests_processed_in_order() {
        let sheets = RecordingSheets::new();
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"create_spreadsheet","arguments":{"title":"New"}}}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"write_metadata","arguments":{"spreadsheet_id":"created-id","requests":[{"addSheet":{}}]}}}"#,
        ]
        .join("\n");

        let responses = exchange(&sheets, &input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(sheets.calls(), vec!["create New", "meta_write created-id 1"]);
    }
}
