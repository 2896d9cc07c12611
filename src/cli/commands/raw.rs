//! `wot raw` command - Inspect raw captures of imported rows and sheets

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{escape_csv, truncate_str, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum RawCommands {
    /// List raw captures, newest first
    List(ListArgs),

    /// Show one raw capture
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only captures from this source file name
    #[arg(long)]
    pub file: Option<String>,

    /// Limit number of results
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Capture id (from `wot raw list`)
    pub id: i64,
}

pub fn run(cmd: RawCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RawCommands::List(args) => run_list(args, global),
        RawCommands::Show(args) => run_show(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let store = workspace.open_store()?;
    let captures = store
        .raw_captures(args.file.as_deref(), Some(args.limit))
        .map_err(|e| miette::miette!("{}", e))?;

    if captures.is_empty() {
        if !global.quiet {
            println!("No raw captures found.");
        }
        return Ok(());
    }

    let format = match workspace.format(global.format) {
        OutputFormat::Auto => OutputFormat::Tsv,
        other => other,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&captures).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&captures).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Id => {
            for capture in &captures {
                println!("{}", capture.id.unwrap_or_default());
            }
        }
        OutputFormat::Csv => {
            println!("id,batch,source_file,sheet,row,captured_at");
            for capture in &captures {
                println!(
                    "{},{},{},{},{},{}",
                    capture.id.unwrap_or_default(),
                    capture.batch,
                    escape_csv(&capture.source_file),
                    escape_csv(capture.sheet.as_deref().unwrap_or("")),
                    capture.row,
                    capture.captured_at.to_rfc3339()
                );
            }
        }
        OutputFormat::Md => {
            println!("| Id | File | Sheet | Row | Captured |");
            println!("|---|---|---|---|---|");
            for capture in &captures {
                println!(
                    "| {} | {} | {} | {} | {} |",
                    capture.id.unwrap_or_default(),
                    capture.source_file,
                    capture.sheet.as_deref().unwrap_or(""),
                    capture.row,
                    capture.captured_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            println!(
                "{:<6} {:<28} {:<16} {:>5}  {:<17}",
                style("ID").bold(),
                style("FILE").bold(),
                style("SHEET").bold(),
                style("ROW").bold(),
                style("CAPTURED").bold()
            );
            println!("{}", "-".repeat(76));
            for capture in &captures {
                println!(
                    "{:<6} {:<28} {:<16} {:>5}  {:<17}",
                    style(capture.id.unwrap_or_default()).cyan(),
                    truncate_str(&capture.source_file, 28),
                    truncate_str(capture.sheet.as_deref().unwrap_or("-"), 16),
                    capture.row,
                    capture.captured_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!();
            println!(
                "{} capture(s). Use {} for the captured values.",
                style(captures.len()).cyan(),
                style("wot raw show <id>").cyan()
            );
        }
    }

    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let store = workspace.open_store()?;
    let capture = store
        .raw_capture(args.id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No raw capture with id {}", args.id))?;

    match workspace.format(global.format) {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&capture).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(&capture).into_diagnostic()?;
            print!("{}", yaml);
        }
    }
    Ok(())
}
