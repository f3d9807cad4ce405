// crates/argocd-mcp-cli/src/main.rs
// ============================================================================
// Module: Argo CD MCP CLI Entry Point
// Description: Command dispatcher for serving the gateway and exporting the catalog.
// Purpose: Load configuration, start the HTTP front, and seed catalog documents.
// Dependencies: argocd-mcp, argocd-mcp-config, clap, thiserror, tokio
// ============================================================================

//! ## Overview
//! `argocd-mcp serve` loads and validates [`GatewayConfig`] and runs the
//! gateway until the listener fails. `argocd-mcp catalog export` writes the
//! built-in tool descriptors as a catalog document, to a file or stdout.
//!
//! Errors are written to stderr and turn into a failing exit code; the
//! control-plane token is never echoed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use argocd_mcp::McpGateway;
use argocd_mcp::catalog::render_catalog;
use argocd_mcp::tools::argocd::default_tool_specs;
use argocd_mcp_config::GatewayConfig;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "argocd-mcp", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway HTTP server.
    Serve(ServeCommand),
    /// Tool catalog utilities.
    Catalog {
        /// Selected catalog subcommand.
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path (defaults to `ARGOCD_MCP_CONFIG`, then `argocd-mcp.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides `server.bind`.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Write the built-in tool descriptors as a catalog document.
    Export(CatalogExportCommand),
}

/// Arguments for `catalog export`.
#[derive(Args, Debug)]
struct CatalogExportCommand {
    /// Output file; stdout when omitted.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures reported on stderr.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be loaded or was rejected.
    #[error("failed to load config: {0}")]
    Config(String),
    /// The gateway failed to start or stopped with an error.
    #[error("gateway failed: {0}")]
    Serve(String),
    /// The catalog document could not be produced or written.
    #[error("catalog export failed: {0}")]
    Export(String),
    /// Writing to stdout or stderr failed.
    #[error("failed to write {stream}: {error}")]
    Output {
        /// Stream label.
        stream: &'static str,
        /// Underlying I/O error.
        error: std::io::Error,
    },
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the selected command.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Catalog {
            command: CatalogCommand::Export(command),
        } => command_catalog_export(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = GatewayConfig::load(command.config.as_deref())
        .map_err(|err| CliError::Config(err.to_string()))?;
    if let Some(bind) = command.bind {
        config.server.bind = bind;
        config.validate().map_err(|err| CliError::Config(err.to_string()))?;
    }
    let gateway =
        McpGateway::from_config(config).map_err(|err| CliError::Serve(err.to_string()))?;
    gateway.serve().await.map_err(|err| CliError::Serve(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Catalog Command
// ============================================================================

/// Executes the `catalog export` command.
fn command_catalog_export(command: &CatalogExportCommand) -> CliResult<ExitCode> {
    let document =
        render_catalog(&default_tool_specs()).map_err(|err| CliError::Export(err.to_string()))?;
    match &command.output {
        Some(path) => write_document(path, &document)?,
        None => write_stdout_line(&document).map_err(|error| CliError::Output {
            stream: "stdout",
            error,
        })?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes a catalog document to `path` with a trailing newline.
fn write_document(path: &Path, document: &str) -> CliResult<()> {
    fs::write(path, format!("{document}\n"))
        .map_err(|err| CliError::Export(format!("{}: {err}", path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================
