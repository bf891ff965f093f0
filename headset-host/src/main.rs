//! Headset control plane over stdin/stdout

use std::path::PathBuf;

use clap::Parser;
use headset_host::{FileNvram, HostConfig, HostRelay, HostResult, HostRuntime};
use log::{debug, error, info};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

static MIC_RELAY: HostRelay = HostRelay::new();

#[derive(Parser, Debug)]
#[command(name = "headset-host", version, about = "Bluetooth headset control plane")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "headset.json")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is unset (overrides the config file)
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match HostConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let filter = cli.log.clone().unwrap_or_else(|| config.log_filter.clone());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: HostConfig) -> HostResult<()> {
    let nvram = FileNvram::open(&config.nvram_path)?;

    // no radio on a host: frames are counted and dropped
    let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(16);
    tokio::spawn(async move {
        let mut frames: u64 = 0;
        while audio_rx.recv().await.is_some() {
            frames += 1;
            if frames % 1000 == 0 {
                debug!("{} SCO frames, relay {:?}", frames, MIC_RELAY.stats());
            }
        }
    });

    let mut runtime = HostRuntime::spawn(
        &config,
        nvram,
        &MIC_RELAY,
        tokio::io::stdin(),
        tokio::io::stdout(),
        audio_tx,
    );

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
        result = runtime.host_link_closed() => result,
    };
    runtime.shutdown();
    result
}
