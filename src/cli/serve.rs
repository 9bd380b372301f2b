use crate::config::Config;
use crate::error::Result;
use crate::mcp::McpServer;
use crate::sheets::SheetsClient;

/// Run the tool server on stdio. Authorization waits for the first tool call.
pub async fn execute() -> Result<()> {
    let config = Config::load()?;
    let client = SheetsClient::new(&config)?;

    McpServer::new(client).serve_stdio().await
}
