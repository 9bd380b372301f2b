mod auth;
mod create;
mod formats;
mod grid_range;
mod meta;
mod read;
mod serve;
mod show;
mod write;

use crate::error::Result;
use clap::{Parser, Subcommand};

pub use auth::AuthArgs;
pub use create::CreateArgs;
pub use grid_range::GridRangeArgs;
pub use meta::{MetaReadArgs, MetaWriteArgs};
pub use read::ReadArgs;
pub use show::ShowResource;
pub use write::WriteArgs;

#[derive(Parser, Debug)]
#[command(name = "sheet-cli")]
#[command(about = "Read and modify Google Sheets from the command line", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Read(args) => args.execute().await,
            Commands::Write(args) => args.execute().await,
            Commands::MetaRead(args) => args.execute().await,
            Commands::MetaWrite(args) => args.execute().await,
            Commands::Create(args) => args.execute().await,
            Commands::Auth(args) => args.execute().await,
            Commands::GridRange(args) => args.execute(),
            Commands::Show { resource } => resource.execute().await,
            Commands::Serve => serve::execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read cells from one or more ranges
    Read(ReadArgs),
    /// Write CELL VALUE pairs, or JSON or CELL VALUE lines from stdin
    Write(WriteArgs),
    /// Print spreadsheet metadata as JSON
    #[command(name = "meta_read", alias = "meta-read")]
    MetaRead(MetaReadArgs),
    /// Apply batch update requests read from stdin
    #[command(name = "meta_write", alias = "meta-write")]
    MetaWrite(MetaWriteArgs),
    /// Create a new spreadsheet
    Create(CreateArgs),
    /// Authorize access to Google Sheets
    Auth(AuthArgs),
    /// Convert an A1 range into a grid range
    GridRange(GridRangeArgs),
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
    /// Serve the spreadsheet tools over JSON-RPC on stdio
    Serve,
}
