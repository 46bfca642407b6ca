use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the built-in echo operations.
    Serve(ServeArgs),
    /// Make a single unary call.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args).await,
        Command::Call(args) => call::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Operation as `namespace/operation` or `namespace/id/operation`.
    pub operation: String,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for connect and response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
