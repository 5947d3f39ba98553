//! TriStack CLI: stack three clips into one vertical collage video.
//!
//! Usage:
//!   tristack compose <A> <B> <C>   Compose, export and save a collage
//!   tristack plan <A> <B> <C>      Print the render plan without encoding
//!   tristack probe <FILE>          Show the media header of a clip
//!   tristack check                 Check for ffmpeg and ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tristack_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tristack",
    about = "Stack three video clips into one vertical collage",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/tristack/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose three clips and export the collage
    Compose {
        /// Clips, top band first
        #[arg(num_args = 3, required = true)]
        clips: Vec<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Library directory the finished collage is copied into
        #[arg(long)]
        library: Option<PathBuf>,

        /// Keep the export where it is and skip the library copy
        #[arg(long)]
        no_save: bool,

        /// Use the original 1080x720 @ 610px band constants
        #[arg(long)]
        legacy_layout: bool,
    },

    /// Print the render spec and ffmpeg arguments for three clips
    Plan {
        /// Clips, top band first
        #[arg(num_args = 3, required = true)]
        clips: Vec<PathBuf>,

        /// Use the original 1080x720 @ 610px band constants
        #[arg(long)]
        legacy_layout: bool,
    },

    /// Show the media header of a clip
    Probe {
        /// Path to the media file
        path: PathBuf,
    },

    /// Check for the external tools TriStack needs
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    tristack_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Compose {
            clips,
            output,
            library,
            no_save,
            legacy_layout,
        } => commands::compose::run(&config, clips, output, library, no_save, legacy_layout).await,
        Commands::Plan {
            clips,
            legacy_layout,
        } => commands::plan::run(&config, clips, legacy_layout),
        Commands::Probe { path } => commands::probe::run(&config, path),
        Commands::Check => commands::check::run(&config),
    }
}
