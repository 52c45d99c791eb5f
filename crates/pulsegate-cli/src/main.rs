use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod classify;
mod video;

#[derive(Parser)]
#[command(name = "pulsegate", version, about = "Finger liveness gate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Video-based check: look for a pulse in the fingertip's colour
    Video(video::VideoArgs),
    /// Static-image check with a pre-trained classifier
    Image(classify::ImageArgs),
}

/// Verdict line printed on stdout.
pub(crate) fn verdict(is_live: bool) -> &'static str {
    if is_live {
        "LIVE"
    } else {
        "SPOOF"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let is_live = match cli.command {
        Command::Video(args) => video::run(args).await?,
        Command::Image(args) => classify::run(args)?,
    };

    println!("{}", verdict(is_live));
    Ok(())
}
