//! `wot init` command - Initialize a new work order project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::project::{Project, ProjectError};
use crate::core::Config;
use crate::core::store::OrderStore;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Rewrite the configuration even if .wot/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    match Project::init(&path, args.force) {
        Ok(project) => {
            let db_path = Config::load(Some(&project)).database_path(&project);
            OrderStore::open(&db_path).map_err(|e| miette::miette!("{}", e))?;

            println!(
                "{} Initialized work order project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!("  config:   {}", style(project.wot_dir().join("config.yaml").display()).dim());
            println!("  database: {}", style(db_path.display()).dim());
            println!();
            println!("Next steps:");
            println!("  {} Import a spreadsheet", style("wot import ordenes.xlsx").yellow());
            println!("  {} List imported orders", style("wot order list").yellow());
            println!("  {} Show analytics", style("wot summary").yellow());
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} Work order project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("wot init --force").yellow());
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
