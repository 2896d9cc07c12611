//! `wot reset` command - Delete every stored order and raw capture

use console::style;
use miette::Result;

use crate::cli::helpers::Workspace;
use crate::cli::GlobalOpts;
use crate::core::store::StoreCounts;

#[derive(clap::Args, Debug)]
pub struct ResetArgs {
    /// Actually delete (without it, only the counts are shown)
    #[arg(long)]
    pub confirm: bool,
}

fn print_counts(counts: &StoreCounts) {
    println!("  Orders:       {}", style(counts.orders).cyan());
    println!("  Tasks:        {}", style(counts.tasks).cyan());
    println!("  Parts:        {}", style(counts.parts).cyan());
    println!("  Supplies:     {}", style(counts.supplies).cyan());
    println!("  Raw captures: {}", style(counts.raw_rows).cyan());
}

pub fn run(args: ResetArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::discover(global)?;
    let mut store = workspace.open_store()?;

    if !args.confirm {
        let counts = store.counts().map_err(|e| miette::miette!("{}", e))?;
        println!("{} This would delete:", style("!").yellow());
        print_counts(&counts);
        println!();
        println!("Run {} to delete everything.", style("wot reset --confirm").yellow());
        return Ok(());
    }

    let deleted = store.reset().map_err(|e| miette::miette!("{}", e))?;
    log::info!("reset deleted {} rows", deleted.total());
    if !global.quiet {
        println!("{} Deleted:", style("✓").green());
        print_counts(&deleted);
    }
    Ok(())
}
