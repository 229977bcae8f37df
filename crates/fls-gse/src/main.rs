//! CLI front-end standing in for the out-of-scope GUI: wires the
//! session worker's observer events to stdout/tracing, drives
//! `fls-session`, and owns process exit status.

mod config;
mod error;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fls_session::{Event, SessionConfig, check_wifi, start_session};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::GseConfig;
use crate::error::{GseError, Result};

#[derive(Parser)]
#[command(name = "fls-gse")]
#[command(about = "Ground-side ARINC 615A FLS uploader", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML). Overridden field-by-field by any
    /// flags passed alongside `upload`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ARINC 615A upload session end to end.
    Upload {
        /// Target LRU IPv4 address. Overrides the config file value.
        #[arg(long)]
        target_ip: Option<Ipv4Addr>,

        /// Path to the FLS image. Overrides the config file value.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Part number (must match EMB-...). Overrides the config file
        /// value.
        #[arg(long)]
        part_number: Option<String>,

        /// Skip the Wi-Fi pre-flight gate (C5). Off by default.
        #[arg(long)]
        skip_wifi_check: bool,
    },

    /// Run the Wi-Fi pre-flight gate (C5) standalone and exit.
    CheckWifi {
        /// Expected SSID. Overrides the config file value.
        #[arg(long)]
        ssid: Option<String>,
    },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fls_gse=info,fls_session=info,fls_tftp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fls-gse exited with an error");
            eprintln!("error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let base_config = match &cli.config {
        Some(path) => GseConfig::load(path)?,
        None => GseConfig::default(),
    };

    match cli.command {
        Commands::Upload { target_ip, image, part_number, skip_wifi_check } => {
            let mut config = base_config;
            if let Some(ip) = target_ip {
                config.target_ip = ip;
            }
            if let Some(path) = image {
                config.image_path = path;
            }
            if let Some(pn) = part_number {
                config.part_number = pn;
            }
            upload(config, skip_wifi_check).await
        }
        Commands::CheckWifi { ssid } => {
            let ssid = ssid.unwrap_or(base_config.expected_ssid);
            if ssid.is_empty() {
                return Err(GseError::Config(
                    "no SSID given on the command line or in the config file".to_string(),
                ));
            }
            check_wifi(&ssid, |line: &str| info!(%line, "wifi check"))?;
            println!("Wi-Fi check passed: associated with {ssid}");
            Ok(())
        }
    }
}

async fn upload(config: GseConfig, skip_wifi_check: bool) -> Result<()> {
    config.validate()?;

    if !skip_wifi_check {
        check_wifi(&config.expected_ssid, |line: &str| info!(%line, "wifi check"))?;
    }

    let handshake = config.handshake_keys()?;
    let session_config = SessionConfig {
        target_ip: config.target_ip,
        remote_port: config.remote_port,
        image_path: config.image_path.clone(),
        part_number: config.part_number.clone(),
        recv_timeout: Duration::from_secs(config.recv_timeout_secs),
        final_lus_timeout: Some(Duration::from_secs(config.final_lus_timeout_secs)),
        max_retries: Some(config.max_retries),
        handshake,
    };

    info!(target_ip = %config.target_ip, image = %config.image_path.display(), "starting upload session");
    let (handle, mut events) = start_session(session_config);

    let mut ok = false;
    while let Some(event) = events.recv().await {
        match event {
            Event::TransferStarted(ip) => println!("transfer started to {ip}"),
            Event::FileDetailsReady { part_number, path } => {
                println!("uploading {} (part {part_number})", path.display());
            }
            Event::Log(line) => println!("{line}"),
            Event::Progress(pct) => println!("progress: {pct}%"),
            Event::Completed(success) => {
                ok = success;
                break;
            }
        }
    }
    handle.await.map_err(|e| GseError::Other(anyhow::anyhow!(e)))?;

    if ok {
        println!("upload completed successfully");
        Ok(())
    } else {
        Err(GseError::UploadFailed)
    }
}
