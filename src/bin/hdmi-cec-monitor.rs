//! HDMI-CEC monitor - turns an Android TV off over ADB when the bus goes to standby
//!
//! Watches the HDMI-CEC bus and, whenever a standby broadcast appears, sends
//! the power keypress to the TV through an ADB-over-TCP session.
//!
//! # Usage
//!
//! ```bash
//! # Run in the foreground
//! hdmi-cec-monitor --tv-ip-address 192.168.1.20 --adb-key-filepath ~/.android/adbkey
//!
//! # Run in the background, logging to /tmp/hdmi_cec_to_adb.log
//! hdmi-cec-monitor -d --tv-ip-address 192.168.1.20 --adb-key-filepath ~/.android/adbkey
//!
//! # Take the settings from the environment
//! TV_IP_ADDRESS=192.168.1.20 ADB_KEY_FILEPATH=/home/pi/.android/adbkey hdmi-cec-monitor -v
//!
//! # Fine-grained logging
//! RUST_LOG=adb_protocol=trace hdmi-cec-monitor ...
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop listening and exit; an in-flight session is abandoned

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cec_adbd::bus::{BusDriver, CecClientDriver, DEFAULT_CEC_CLIENT, DEFAULT_CEC_DEVICE};
use cec_adbd::config::{MonitorConfig, DEFAULT_ADB_PORT, DISK_LOG_PATH};
use cec_adbd::control::AdbControlClient;
use cec_adbd::guard::{ensure_single_instance, GuardError};
use cec_adbd::heartbeat::{spawn_heartbeat_task, HEARTBEAT_INTERVAL};
use cec_adbd::listener::EventBusListener;
use cec_adbd::logging::init_logging_to;
use cec_adbd::tvservice::TvService;

/// Start the HDMI CEC monitor
#[derive(Parser, Debug)]
#[command(name = "hdmi-cec-monitor", version, about)]
struct Args {
    /// IP address of the Android TV
    #[arg(long, visible_alias = "tv_ip_address", env = "TV_IP_ADDRESS")]
    tv_ip_address: Option<String>,

    /// ADB port used to connect
    #[arg(long, visible_alias = "adb_port", default_value_t = DEFAULT_ADB_PORT)]
    adb_port: u16,

    /// Path to the ADB private key, usually ~/.android/adbkey; the public
    /// key must sit next to it with a .pub suffix
    #[arg(long, visible_alias = "adb_key_filepath", env = "ADB_KEY_FILEPATH")]
    adb_key_filepath: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long)]
    verbose: bool,

    /// Also log to /tmp/hdmi_cec_to_adb.log
    #[arg(short = 'l', long, visible_alias = "log_to_disk")]
    log_to_disk: bool,

    /// Run as a background daemon (fork to background)
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Where CEC frames come from
    #[arg(long, value_enum, default_value_t = BusKind::CecClient)]
    bus: BusKind,

    /// cec-client program used by the cec-client bus
    #[arg(long, default_value = DEFAULT_CEC_CLIENT)]
    cec_client: PathBuf,

    /// CEC device node used by the device bus
    #[arg(long, default_value = DEFAULT_CEC_DEVICE)]
    cec_device: PathBuf,

    /// Run `tvservice --off` before listening (Raspberry Pi)
    #[arg(long)]
    tvservice_off: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BusKind {
    /// Parse the output of `cec-client --monitor`
    CecClient,
    /// Read raw frames from a Linux CEC device
    Device,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = build_config(&args)?;

    // A daemon's stderr goes to the log file once it has forked
    let log_file = (config.log_to_disk() && !args.daemon).then(|| Path::new(DISK_LOG_PATH));
    init_logging_to(config.verbose(), log_file).context("Failed to initialise logging")?;

    // Lock before forking so a duplicate launch fails in the caller's process
    let mut instance = match ensure_single_instance() {
        Ok(guard) => guard,
        Err(GuardError::DuplicateInstance { .. }) => {
            eprintln!("hdmi-cec-monitor is already running.");
            process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to take instance lock"),
    };

    if args.daemon {
        // Daemonize before starting tokio runtime
        daemonize()?;
        instance.record_pid();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        tv = %config.endpoint(),
        "HDMI-CEC monitor starting"
    );

    if args.tvservice_off {
        TvService::default()
            .power_off()
            .context("Failed to turn off HDMI output")?;
    }

    let driver = build_driver(&args)?;

    let result = run_monitor(config, driver);
    drop(instance);
    result
}

/// Validates the command line into a `MonitorConfig`.
fn build_config(args: &Args) -> Result<MonitorConfig> {
    let mut builder = MonitorConfig::builder()
        .port(args.adb_port)
        .verbose(args.verbose)
        .log_to_disk(args.log_to_disk);

    if let Some(address) = &args.tv_ip_address {
        builder = builder.address(address);
    }

    if let Some(key_path) = &args.adb_key_filepath {
        // Daemon mode changes directory to /
        let key_path = if key_path.is_relative() {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(key_path)
        } else {
            key_path.clone()
        };
        builder = builder.key_path(key_path);
    }

    builder.build().context("Invalid configuration")
}

fn build_driver(args: &Args) -> Result<Box<dyn BusDriver>> {
    match args.bus {
        BusKind::CecClient => Ok(Box::new(CecClientDriver::new(&args.cec_client))),
        BusKind::Device => device_driver(&args.cec_device),
    }
}

#[cfg(feature = "cec-device")]
fn device_driver(path: &Path) -> Result<Box<dyn BusDriver>> {
    Ok(Box::new(cec_adbd::bus::CecDeviceDriver::new(path)))
}

#[cfg(not(feature = "cec-device"))]
fn device_driver(path: &Path) -> Result<Box<dyn BusDriver>> {
    anyhow::bail!(
        "cannot read {}: built without the cec-device feature",
        path.display()
    )
}

/// Daemonizes the current process.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let open_log = || {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(DISK_LOG_PATH)
            .context("Failed to open log file for daemon output")
    };

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(open_log()?)
        .stderr(open_log()?);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

/// Runs the monitor (async entry point).
#[tokio::main]
async fn run_monitor(config: MonitorConfig, driver: Box<dyn BusDriver>) -> Result<()> {
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let _heartbeat = spawn_heartbeat_task(HEARTBEAT_INTERVAL, cancel_token.clone());

    let client = AdbControlClient::new(Arc::new(config));
    let listener = EventBusListener::new(Arc::new(client));
    let handle = listener
        .register(driver, cancel_token.clone())
        .context("Failed to start CEC bus driver")?;

    let result = handle.wait().await;
    cancel_token.cancel();

    match result {
        Ok(()) => {
            info!("HDMI-CEC monitor stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "CEC bus stopped");
            Err(e).context("CEC bus stopped")
        }
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_accept_underscore_aliases() {
        let args = Args::try_parse_from([
            "hdmi-cec-monitor",
            "--tv_ip_address",
            "10.0.0.2",
            "--adb_port",
            "5556",
            "--adb_key_filepath",
            "/tmp/k",
            "-v",
            "-l",
        ])
        .unwrap();

        assert_eq!(args.tv_ip_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(args.adb_port, 5556);
        assert_eq!(args.adb_key_filepath, Some(PathBuf::from("/tmp/k")));
        assert!(args.verbose);
        assert!(args.log_to_disk);
        assert_eq!(args.bus, BusKind::CecClient);
    }

    #[test]
    fn test_build_config_keeps_absolute_key_path() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("adbkey");
        std::fs::write(&key_path, "private").unwrap();
        std::fs::write(dir.path().join("adbkey.pub"), "public").unwrap();

        let args = Args::try_parse_from([
            "hdmi-cec-monitor",
            "--tv-ip-address",
            "127.0.0.1",
            "--adb-key-filepath",
            key_path.to_str().unwrap(),
        ])
        .unwrap();

        let config = build_config(&args).unwrap();
        assert_eq!(config.endpoint(), "127.0.0.1:5555");
        assert!(config.key_path().is_absolute());
    }

    #[test]
    fn test_build_config_requires_address() {
        // Built directly so TV_IP_ADDRESS in the environment cannot fill it in
        let args = Args {
            tv_ip_address: None,
            adb_port: DEFAULT_ADB_PORT,
            adb_key_filepath: Some(PathBuf::from("/tmp/k")),
            verbose: false,
            log_to_disk: false,
            daemon: false,
            bus: BusKind::CecClient,
            cec_client: PathBuf::from(DEFAULT_CEC_CLIENT),
            cec_device: PathBuf::from(DEFAULT_CEC_DEVICE),
            tvservice_off: false,
        };

        let err = build_config(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<cec_adbd::config::ConfigError>(),
            Some(cec_adbd::config::ConfigError::MissingAddress)
        ));
    }

    #[test]
    fn test_cec_device_defaults_to_shared_constant() {
        let args = Args::try_parse_from(["hdmi-cec-monitor"]).unwrap();
        assert_eq!(args.cec_device, PathBuf::from(DEFAULT_CEC_DEVICE));
        assert_eq!(args.cec_client, PathBuf::from(DEFAULT_CEC_CLIENT));
    }
}
