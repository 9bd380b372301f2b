use crate::config::Config;
use crate::error::Result;
use crate::sheets::SheetsClient;
use clap::Args;
use tracing::info;

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Delete the cached token and authorize again
    #[arg(long)]
    pub reset: bool,
}

impl AuthArgs {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load()?;
        let client = SheetsClient::new(&config)?;
        let credentials = client.credentials();

        if self.reset {
            credentials.reset().await?;
        }

        credentials.get_active_token().await?;
        info!(
            path = ?credentials.store().token_path(),
            "Google Sheets authentication verified"
        );

        Ok(())
    }
}
