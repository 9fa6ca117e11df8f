mod command;
mod core;
mod render;

use std::path::PathBuf;

use clap::Parser;
use shuffle_core::config::Config;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Shuffle through a YouTube channel's uploads in mpv.
#[derive(Parser, Debug)]
#[command(name = "yt-shuffle", version)]
struct Args {
    /// Config file (default: ~/.config/yt-shuffle/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Channel to load at startup
    #[arg(long)]
    channel: Option<String>,

    /// Refetch the startup channel instead of using the cache
    #[arg(long, requires = "channel")]
    refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // File logging
    let data_dir = shuffle_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("yt-shuffle.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,shuffle_core=debug,yt_shuffle=debug")
            }),
        )
        .init();

    eprintln!("yt-shuffle log: {}", log_path.display());
    info!("Log file: {:?}", log_path);

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!(
        "Config loaded from: {:?}",
        args.config.clone().unwrap_or_else(Config::config_path)
    );
    info!("yt-dlp: {:?}", config.fetch.resolved_binary());
    info!("mpv: {:?}", config.player.resolved_binary());

    // Every input funnels into ShuffleCore through this channel.
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<core::ShuffleEvent>(256);

    let shuffle_core = core::ShuffleCore::new(&config, event_tx);
    let initial = args.channel.map(|c| (c, args.refresh));

    info!("yt-shuffle initialised, running event loop");
    shuffle_core.run(event_rx, initial).await?;

    info!("yt-shuffle exiting");
    Ok(())
}
