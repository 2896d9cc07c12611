//! `wot order` command - Work order management

use chrono::{Datelike, Local};
use clap::{Subcommand, ValueEnum};
use console::style;
use miette::{IntoDiagnostic, Result};
use std::io::Read;
use std::path::PathBuf;

use crate::cli::helpers::{cell, escape_csv, truncate_str, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::store::{OrderFilter, SortBy, UpsertOutcome};
use crate::entities::work_order::{OrderStatus, WorkOrder};
use crate::export::table::date_text;
use crate::schema::submit;

#[derive(Subcommand, Debug)]
pub enum OrderCommands {
    /// List orders with filtering
    List(ListArgs),

    /// Show one order with its line items
    Show(ShowArgs),

    /// Create or update an order from a JSON document
    Submit(SubmitArgs),

    /// Delete an order and its line items
    Delete(DeleteArgs),

    /// Print the next sequential folio for a year
    NextFolio(NextFolioArgs),
}

/// Status filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Pending,
    InProgress,
    Done,
    All,
}

impl StatusFilter {
    fn status(self) -> Option<OrderStatus> {
        match self {
            StatusFilter::Pending => Some(OrderStatus::Pending),
            StatusFilter::InProgress => Some(OrderStatus::InProgress),
            StatusFilter::Done => Some(OrderStatus::Done),
            StatusFilter::All => None,
        }
    }
}

/// List sort field
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum SortField {
    /// Most recent start date first
    #[default]
    Start,
    Folio,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, short = 's', default_value = "all")]
    pub status: StatusFilter,

    /// Filter by responsible (substring, case-insensitive)
    #[arg(long, short = 'r')]
    pub responsible: Option<String>,

    /// Filter by machine (substring, case-insensitive)
    #[arg(long, short = 'm')]
    pub machine: Option<String>,

    /// Only orders missing responsible, machine and fault type
    #[arg(long)]
    pub incomplete: bool,

    /// Only orders imported from this file name
    #[arg(long)]
    pub file: Option<String>,

    /// Search in folio, machine and description
    #[arg(long)]
    pub search: Option<String>,

    /// Sort field
    #[arg(long, default_value = "start")]
    pub sort: SortField,

    /// Reverse sort order
    #[arg(long)]
    pub reverse: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Folio of the order
    pub folio: String,
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    /// JSON document to submit ("-" or omitted reads stdin)
    pub file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Folio of the order
    pub folio: String,
}

#[derive(clap::Args, Debug)]
pub struct NextFolioArgs {
    /// Year the folio belongs to (default: current year)
    #[arg(long)]
    pub year: Option<i32>,
}

pub fn run(cmd: OrderCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        OrderCommands::List(args) => run_list(args, global),
        OrderCommands::Show(args) => run_show(args, global),
        OrderCommands::Submit(args) => run_submit(args, global),
        OrderCommands::Delete(args) => run_delete(args, global),
        OrderCommands::NextFolio(args) => run_next_folio(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let store = workspace.open_store()?;

    let filter = OrderFilter {
        status: args.status.status(),
        responsible: args.responsible,
        machine: args.machine,
        incomplete: args.incomplete.then_some(true),
        source_file: args.file,
        search: args.search,
        sort: match args.sort {
            SortField::Start => SortBy::StartDate,
            SortField::Folio => SortBy::Folio,
        },
        reverse: args.reverse,
        limit: args.limit,
    };
    let orders = store.list(&filter).map_err(|e| miette::miette!("{}", e))?;

    // Count only
    if args.count {
        println!("{}", orders.len());
        return Ok(());
    }

    // No results
    if orders.is_empty() {
        if !global.quiet {
            println!("No work orders found.");
        }
        return Ok(());
    }

    // Output based on format
    let format = match workspace.format(global.format) {
        OutputFormat::Auto => OutputFormat::Tsv,
        other => other,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&orders).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&orders).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Csv => {
            println!("folio,start_date,machine,responsible,fault_type,status,labor_hours,items,incomplete");
            for order in &orders {
                println!(
                    "{},{},{},{},{},{},{},{},{}",
                    escape_csv(&order.folio),
                    date_text(order.start_date),
                    escape_csv(&order.machine),
                    escape_csv(&order.responsible),
                    escape_csv(&order.fault_type),
                    order.status,
                    order.labor_hours,
                    order.item_count(),
                    order.incomplete
                );
            }
        }
        OutputFormat::Tsv => {
            println!(
                "{:<12} {:<11} {:<20} {:<18} {:<16} {:<12} {:>6} {:>5}",
                style("FOLIO").bold(),
                style("START").bold(),
                style("MACHINE").bold(),
                style("RESPONSIBLE").bold(),
                style("FAULT").bold(),
                style("STATUS").bold(),
                style("HH").bold(),
                style("ITEMS").bold()
            );
            println!("{}", "-".repeat(108));

            for order in &orders {
                let status_styled = match order.status {
                    OrderStatus::Done => style(order.status.to_string()).green(),
                    OrderStatus::InProgress => style(order.status.to_string()).yellow(),
                    OrderStatus::Pending => style(order.status.to_string()).white(),
                };
                let folio = if order.incomplete {
                    style(truncate_str(&order.folio, 12)).red()
                } else {
                    style(truncate_str(&order.folio, 12)).cyan()
                };
                let start = order.start_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();

                println!(
                    "{:<12} {:<11} {:<20} {:<18} {:<16} {:<12} {:>6} {:>5}",
                    folio,
                    start,
                    truncate_str(&cell(&order.machine), 20),
                    truncate_str(&cell(&order.responsible), 18),
                    truncate_str(&cell(&order.fault_type), 16),
                    status_styled,
                    order.labor_hours,
                    order.item_count()
                );
            }

            let incomplete = orders.iter().filter(|o| o.incomplete).count();
            println!();
            if incomplete > 0 {
                println!(
                    "{} order(s) found, {} incomplete (shown in {}).",
                    style(orders.len()).cyan(),
                    style(incomplete).red(),
                    style("red").red()
                );
            } else {
                println!("{} order(s) found.", style(orders.len()).cyan());
            }
        }
        OutputFormat::Id => {
            for order in &orders {
                println!("{}", order.folio);
            }
        }
        OutputFormat::Md => {
            println!("| Folio | Start | Machine | Responsible | Fault | Status | HH |");
            println!("|---|---|---|---|---|---|---|");
            for order in &orders {
                println!(
                    "| {} | {} | {} | {} | {} | {} | {} |",
                    order.folio,
                    date_text(order.start_date),
                    cell(&order.machine),
                    cell(&order.responsible),
                    cell(&order.fault_type),
                    order.status,
                    order.labor_hours
                );
            }
        }
        OutputFormat::Auto => unreachable!(),
    }

    Ok(())
}

fn find_order(workspace: &Workspace, folio: &str) -> Result<WorkOrder> {
    let store = workspace.open_store()?;
    store
        .get(folio.trim())
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No work order found with folio '{}'", folio))
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let order = find_order(&workspace, &args.folio)?;

    match workspace.format(global.format) {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&order).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Id => println!("{}", order.folio),
        _ => {
            let yaml = serde_yml::to_string(&order).into_diagnostic()?;
            print!("{}", yaml);
        }
    }

    Ok(())
}

fn run_submit(args: SubmitArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let mut store = workspace.open_store()?;

    let json = match &args.file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path).into_diagnostic()?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).into_diagnostic()?;
            buffer
        }
    };

    let (outcome, order) = submit(&mut store, &json).map_err(|e| miette::miette!("{}", e))?;

    if global.format == OutputFormat::Id {
        println!("{}", order.folio);
    } else if !global.quiet {
        let verb = match outcome {
            UpsertOutcome::Created => "Created",
            UpsertOutcome::Updated => "Updated",
        };
        println!(
            "{} {} work order {} ({} line items)",
            style("✓").green(),
            verb,
            style(&order.folio).cyan(),
            order.item_count()
        );
        if order.incomplete {
            println!(
                "  {} responsible, machine and fault type are all unspecified",
                style("!").yellow()
            );
        }
    }

    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let mut store = workspace.open_store()?;

    let deleted = store.delete(args.folio.trim()).map_err(|e| miette::miette!("{}", e))?;
    if !deleted {
        return Err(miette::miette!("No work order found with folio '{}'", args.folio));
    }

    if !global.quiet {
        println!("{} Deleted work order {}", style("✓").green(), style(args.folio.trim()).cyan());
    }
    Ok(())
}

fn run_next_folio(args: NextFolioArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let store = workspace.open_store()?;

    let year = args.year.unwrap_or_else(|| Local::now().year());
    let folio = store.next_folio(year).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", folio);
    Ok(())
}
