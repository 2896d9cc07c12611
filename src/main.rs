use clap::Parser;
use log::LevelFilter;
use miette::Result;
use wot::cli::{Cli, Commands, GlobalOpts};

fn init_logging(global: &GlobalOpts) {
    let level = if global.verbose {
        LevelFilter::Debug
    } else if global.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    };

    // RUST_LOG, when set, wins over the flags
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    match cli.command {
        Commands::Init(args) => wot::cli::commands::init::run(args),
        Commands::Import(args) => wot::cli::commands::import::run(args, &global),
        Commands::Order(cmd) => wot::cli::commands::order::run(cmd, &global),
        Commands::Summary(args) => wot::cli::commands::summary::run(args, &global),
        Commands::Export(args) => wot::cli::commands::export::run(args, &global),
        Commands::Raw(cmd) => wot::cli::commands::raw::run(cmd, &global),
        Commands::Reset(args) => wot::cli::commands::reset::run(args, &global),
        Commands::Completions(args) => wot::cli::commands::completions::run(args),
    }
}
