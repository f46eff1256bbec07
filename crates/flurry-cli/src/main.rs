//! Flurry CLI - falling-particle overlay player and headless renderer

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use commands::{options::EmitterArgs, play, render};

#[derive(Parser)]
#[command(name = "flurry")]
#[command(about = "GPU-batched falling particle overlay", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log detail (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a window and let it snow
    Play {
        #[command(flatten)]
        emitter: EmitterArgs,

        /// Window width in pixels
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Window height in pixels
        #[arg(long, default_value = "720")]
        height: u32,

        /// Launch in fullscreen mode
        #[arg(long)]
        fullscreen: bool,
    },

    /// Simulate a fixed number of frames offscreen and save the last one as PNG
    Render {
        #[command(flatten)]
        emitter: EmitterArgs,

        /// Output image path
        #[arg(short, long, default_value = "flurry.png")]
        output: String,

        /// Image width in pixels
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Image height in pixels
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Frames to simulate before capturing
        #[arg(long, default_value = "300")]
        frames: u32,

        /// Simulated milliseconds per frame
        #[arg(long, default_value = "16")]
        step_ms: f64,
    },
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Play {
            emitter,
            width,
            height,
            fullscreen,
        } => play::run(play::PlayArgs {
            emitter,
            width,
            height,
            fullscreen,
        }),
        Commands::Render {
            emitter,
            output,
            width,
            height,
            frames,
            step_ms,
        } => render::run(render::RenderArgs {
            emitter,
            output,
            width,
            height,
            frames,
            step_ms,
        }),
    }
}
