//! `wot import` command - Map a spreadsheet or CSV file into work orders

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::Workspace;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::mapping::{import_file, Layout, MapOptions, MappingResult, OnDuplicate};

/// Diagnostics listed in the summary before the rest are elided
const MAX_LISTED_DIAGNOSTICS: usize = 20;

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Spreadsheet to import (.xlsx, .xlsm, .xls, .ods, .csv)
    pub file: PathBuf,

    /// Input layout (default: from config, else auto-detect)
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Resolve everything and report, but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Replace existing orders with the same folio
    #[arg(long, conflicts_with_all = ["skip_existing", "update"])]
    pub overwrite: bool,

    /// Leave existing orders with the same folio untouched
    #[arg(long, conflicts_with = "update")]
    pub skip_existing: bool,

    /// Merge into existing orders with the same folio
    #[arg(long)]
    pub update: bool,

    /// Examine at most N rows (or sheets)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Do not keep raw copies of the imported rows
    #[arg(long)]
    pub no_raw: bool,
}

impl ImportArgs {
    fn on_duplicate(&self) -> Option<OnDuplicate> {
        if self.overwrite {
            Some(OnDuplicate::Overwrite)
        } else if self.skip_existing {
            Some(OnDuplicate::Skip)
        } else if self.update {
            Some(OnDuplicate::Update)
        } else {
            None
        }
    }
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let mut store = workspace.open_store()?;

    let options = MapOptions {
        layout: args.layout.unwrap_or_else(|| workspace.config.default_layout()),
        dry_run: args.dry_run,
        on_duplicate: args.on_duplicate(),
        limit: args.limit.or(workspace.config.max_rows),
        capture_raw: !args.no_raw && workspace.config.capture_raw(),
    };
    log::debug!("import options: {:?}", options);

    let result = import_file(&mut store, &args.file, &options).map_err(|e| miette::miette!("{}", e))?;

    match workspace.format(global.format) {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&result).into_diagnostic()?;
            print!("{}", yaml);
        }
        _ if global.quiet => {}
        _ => print_summary(&result),
    }

    Ok(())
}

fn print_summary(result: &MappingResult) {
    println!(
        "{} Imported {} ({} layout)",
        style("✓").green(),
        style(&result.file).cyan(),
        result.layout
    );

    println!();
    println!("{}", style("─".repeat(50)).dim());
    println!("{}", style("Import Summary").bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Records examined: {}", style(result.examined).cyan());
    println!("  Orders created:   {}", style(result.created.orders).green());
    if result.updated > 0 {
        println!("  Orders updated:   {}", style(result.updated).yellow());
    }
    if result.overwritten > 0 {
        println!("  Overwritten:      {}", style(result.overwritten).yellow());
    }
    if result.skipped > 0 {
        println!("  Skipped:          {}", style(result.skipped).dim());
    }
    println!(
        "  Line items:       {} tasks, {} parts, {} supplies",
        result.created.tasks, result.created.parts, result.created.supplies
    );
    if result.raw_captured > 0 {
        println!("  Raw captures:     {}", style(result.raw_captured).dim());
    }
    if !result.resolved_columns.is_empty() {
        println!("  Columns:          {}", style(result.resolved_columns.join(", ")).dim());
    }
    if !result.missing_columns.is_empty() {
        println!("  Missing columns:  {}", style(result.missing_columns.join(", ")).yellow());
    }

    if !result.diagnostics.is_empty() {
        println!();
        println!(
            "{} {} record(s) reported problems:",
            style("!").yellow(),
            result.diagnostics.len()
        );
        for diagnostic in result.diagnostics.iter().take(MAX_LISTED_DIAGNOSTICS) {
            match &diagnostic.folio {
                Some(folio) => println!(
                    "  {} [{}] {}",
                    style(&diagnostic.location).dim(),
                    style(folio).cyan(),
                    diagnostic.message
                ),
                None => println!("  {} {}", style(&diagnostic.location).dim(), diagnostic.message),
            }
        }
        if result.diagnostics.len() > MAX_LISTED_DIAGNOSTICS {
            println!("  ... and {} more", result.diagnostics.len() - MAX_LISTED_DIAGNOSTICS);
        }
    }

    if result.dry_run {
        println!();
        println!("{}", style("Dry run complete. Nothing was written.").yellow());
    }
}
