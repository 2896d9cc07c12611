//! `wot export` command - Write orders to xlsx, csv or html

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::Workspace;
use crate::cli::GlobalOpts;
use crate::core::store::OrderFilter;
use crate::export::{default_path, export_order, export_orders, ExportFormat};

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Folio of the order to export
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub folio: Option<String>,

    /// Export every stored order as one table
    #[arg(long)]
    pub all: bool,

    /// Target format
    #[arg(long, value_enum, default_value = "xlsx")]
    pub to: ExportFormat,

    /// Output path (default: OT_<folio>.<ext>, or ordenes.<ext> with --all)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let store = workspace.open_store()?;

    let path = match args.folio.as_deref() {
        Some(folio) => {
            let order = store
                .get(folio.trim())
                .map_err(|e| miette::miette!("{}", e))?
                .ok_or_else(|| miette::miette!("No work order found with folio '{}'", folio))?;
            let path = args.output.unwrap_or_else(|| default_path(Some(&order.folio), args.to));
            export_order(&order, args.to, &path).map_err(|e| miette::miette!("{}", e))?;
            path
        }
        None => {
            if args.to == ExportFormat::Html {
                return Err(miette::miette!(
                    "html export covers a single order; pass a folio or use --to xlsx|csv"
                ));
            }
            let orders = store.list(&OrderFilter::default()).map_err(|e| miette::miette!("{}", e))?;
            if orders.is_empty() {
                return Err(miette::miette!("No work orders to export"));
            }
            let path = args.output.unwrap_or_else(|| default_path(None, args.to));
            export_orders(&orders, args.to, &path).map_err(|e| miette::miette!("{}", e))?;
            path
        }
    };

    if !global.quiet {
        println!(
            "{} Exported {} to {}",
            style("✓").green(),
            args.to,
            style(path.display()).cyan()
        );
    }
    Ok(())
}
