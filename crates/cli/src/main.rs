//! dramareel - render short vertical episode videos from a script
//!
//! Generates one frame per panel slot, narrates the hook, picks a music bed,
//! burns in captions and encodes the result with ffmpeg. When the cinematic
//! render fails the original panels are encoded as a plain slideshow.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dramareel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render episode videos from generated frames, narration and captions")]
#[command(long_about = r#"
dramareel turns an episode script and its panel images into a vertical video.

Examples:
  dramareel render -s episode.json -e ep12 -p p1.png p2.png p3.png p4.png p5.png p6.png
  dramareel plan   -s episode.json -e ep12 -p p1.png p2.png p3.png p4.png p5.png p6.png
  dramareel config
"#)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, env = "DRAMAREEL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an episode and store the video
    Render {
        #[command(flatten)]
        episode: commands::EpisodeArgs,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the ffmpeg invocation of the cinematic render without running it
    Plan {
        #[command(flatten)]
        episode: commands::EpisodeArgs,
    },

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Render { episode, json } => commands::render(&config, &episode, json).await?,
        Commands::Plan { episode } => commands::plan(&config, &episode)?,
        Commands::Config => commands::show_config(&config)?,
    }

    Ok(())
}
