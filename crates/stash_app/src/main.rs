mod config;
mod effects;
mod filing;
mod render;
mod session;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use stash_core::ListingType;
use stash_engine::Stash;
use stash_logging::{stash_error, stash_info, DEFAULT_LOG_FILE};

use crate::config::StashConfig;

#[derive(Debug, Parser)]
#[command(name = "artstash", version, about = "Mirror an artist's listings into a local stash")]
struct Cli {
    /// RON configuration file [default: ./stash.ron]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Stash root folder; overrides `stash_root` from the configuration
    #[arg(long, global = true)]
    stash: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download every submission of a user's listing into the stash
    Download {
        user: String,
        #[arg(short, long, default_value = "gallery")]
        listing: ListingType,
    },
    /// Copy the files of input folders into per-author folders
    Sort {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output folder [default: the stash root]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Move single files into the stash
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = StashConfig::load(cli.config.as_deref())?;
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        config.level_filter()
    };
    stash_logging::initialize(config.log_destination, level, Path::new(DEFAULT_LOG_FILE));

    let result = run(cli, config).await;
    if let Err(err) = &result {
        stash_error!("{:#}", err);
    }
    result
}

async fn run(cli: Cli, config: StashConfig) -> anyhow::Result<()> {
    let stash_root = cli.stash.or_else(|| config.stash_root.clone());

    match cli.command {
        Command::Download { user, listing } => {
            let stash = open_stash(stash_root)?;
            let coordinator = session::build_coordinator(&config, &stash)?;
            let report = session::run_download(coordinator, user, listing).await?;
            println!("{}", render::summary(&report));
        }
        Command::Sort { inputs, output } => {
            let output = output
                .or(stash_root)
                .context("no output folder: pass --output or --stash")?;
            let report = filing::sort_folders(&inputs, &output)?;
            println!("{}", filing::summary(&report));
        }
        Command::Import { files } => {
            let stash = open_stash(stash_root)?;
            let report = filing::import_files(&stash, &files)?;
            println!("{}", filing::summary(&report));
        }
    }
    Ok(())
}

fn open_stash(root: Option<PathBuf>) -> anyhow::Result<Stash> {
    let root = root.context("no stash selected: pass --stash or set stash_root")?;
    let stash = Stash::open(&root).with_context(|| format!("cannot open stash {}", root.display()))?;
    stash_info!("Stash {:?} holds {} file(s)", stash.root(), stash.index().len());
    Ok(stash)
}
