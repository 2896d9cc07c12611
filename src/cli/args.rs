//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, export::ExportArgs, import::ImportArgs, init::InitArgs,
    order::OrderCommands, raw::RawCommands, reset::ResetArgs, summary::SummaryArgs,
};

#[derive(Parser)]
#[command(name = "wot")]
#[command(author, version, about = "Work Order Toolkit")]
#[command(
    long_about = "Import maintenance work orders from loosely formatted spreadsheets, track them in a local database and export them again."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .wot/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new work order project
    Init(InitArgs),

    /// Import work orders from a spreadsheet or CSV file
    Import(ImportArgs),

    /// Work order management
    #[command(subcommand)]
    Order(OrderCommands),

    /// Analytics over stored orders
    Summary(SummaryArgs),

    /// Export orders to xlsx, csv or html
    Export(ExportArgs),

    /// Inspect raw captures of imported rows and sheets
    #[command(subcommand)]
    Raw(RawCommands),

    /// Delete every stored order and raw capture
    Reset(ResetArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just folios, one per line
    Id,
}
