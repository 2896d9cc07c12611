//! `wot summary` command - Analytics over stored orders

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::Workspace;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::store::{GroupStat, Summary};

#[derive(clap::Args, Debug)]
pub struct SummaryArgs {
    /// Rows shown per grouping table
    #[arg(long, short = 'n', default_value = "10")]
    pub top: usize,
}

pub fn run(args: SummaryArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let store = workspace.open_store()?;
    let summary = store.summary().map_err(|e| miette::miette!("{}", e))?;

    match workspace.format(global.format) {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&summary).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Md => print!("{}", render(&summary, args.top, true)),
        _ => {
            if summary.total_orders == 0 {
                println!("No work orders stored yet. Run {} first.", style("wot import <file>").yellow());
                return Ok(());
            }
            print!("{}", render(&summary, args.top, false));
        }
    }

    Ok(())
}

fn finish(builder: Builder, markdown: bool) -> String {
    let mut table = builder.build();
    if markdown {
        table.with(Style::markdown());
    } else {
        table.with(Style::rounded());
    }
    table.to_string()
}

fn group_table(title: &str, groups: &[GroupStat], top: usize, markdown: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record([title, "Orders", "Total HH", "Mean HH"]);
    for group in groups.iter().take(top) {
        builder.push_record([
            group.name.clone(),
            group.count.to_string(),
            format!("{:.1}", group.total_hours),
            format!("{:.1}", group.mean_hours),
        ]);
    }
    finish(builder, markdown)
}

/// Text rendering of every summary table (markdown or boxed)
pub fn render(summary: &Summary, top: usize, markdown: bool) -> String {
    let mut output = String::new();

    let mut totals = Builder::default();
    totals.push_record(["Metric", "Value"]);
    totals.push_record(["Orders".to_string(), summary.total_orders.to_string()]);
    totals.push_record(["Incomplete".to_string(), summary.incomplete.to_string()]);
    totals.push_record(["Labor hours".to_string(), format!("{:.1}", summary.total_hours)]);
    output.push_str("## Totals\n\n");
    output.push_str(&finish(totals, markdown));

    output.push_str("\n\n## Status\n\n");
    let mut status = Builder::default();
    status.push_record(["Status", "Orders", "Share"]);
    for share in &summary.by_status {
        status.push_record([
            share.status.to_string(),
            share.count.to_string(),
            format!("{:.1}%", share.percent),
        ]);
    }
    output.push_str(&finish(status, markdown));

    output.push_str("\n\n## By responsible\n\n");
    output.push_str(&group_table("Responsible", &summary.by_responsible, top, markdown));

    output.push_str("\n\n## By fault type\n\n");
    output.push_str(&group_table("Fault type", &summary.by_fault_type, top, markdown));

    if !summary.monthly.is_empty() {
        output.push_str("\n\n## Monthly\n\n");
        let mut monthly = Builder::default();
        monthly.push_record(["Month", "Orders", "Total HH"]);
        for month in &summary.monthly {
            monthly.push_record([
                format!("{}-{:02}", month.year, month.month),
                month.count.to_string(),
                format!("{:.1}", month.total_hours),
            ]);
        }
        output.push_str(&finish(monthly, markdown));
    }

    output.push('\n');
    output
}
