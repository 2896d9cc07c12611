//! `wot completions` - print a shell completion script
//!
//! ```bash
//! source <(wot completions bash)
//! wot completions fish > ~/.config/fish/completions/wot.fish
//! ```

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use miette::Result;

use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    log::debug!("generating {} completions for {}", args.shell, bin);
    generate(args.shell, &mut cmd, bin, &mut std::io::stdout().lock());
    Ok(())
}
