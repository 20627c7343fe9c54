//! Taplink - Entry point.
//!
//! Attaches to an existing TAP device, answers ARP for the configured
//! address and suppresses looping ARP broadcasts. Statistics are logged at
//! a fixed interval. With `manual_injection` enabled, hex encoded frames
//! typed on stdin are written to the device.

use std::borrow::Cow;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taplink::config::Config;
use taplink::interface::{Interface, InterfaceConfig};
use taplink::network::{
    Injector, LineAssembler, MAX_LINE_LEN, ResponderConfig, TapDevice, detect_mac,
};

/// Lines buffered between the stdin reader and the worker.
const INJECTION_QUEUE: usize = 64;

/// Spawn the task feeding stdin lines to the injection channel.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut assembler = LineAssembler::new();
        let mut chunk = vec![0u8; MAX_LINE_LEN];
        loop {
            match stdin.read(&mut chunk).await {
                Ok(0) => {
                    debug!("stdin closed, manual injection finished");
                    break;
                }
                Ok(read) => {
                    for line in assembler.push(&chunk[..read]) {
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!("Failed to read stdin: {err}");
                    break;
                }
            }
        }
    })
}

async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("taplink.toml"));
    let config = Config::load(config_path.as_ref()).context("Failed to load configuration")?;

    // Initialize metrics before the worker records anything
    taplink::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!("Starting taplink on {}...", config.interface);
    let device = TapDevice::open(&config.interface).context("Failed to open TAP device")?;

    let local_mac = if let Some(mac) = config.local_mac {
        info!("Using configured MAC: {mac}");
        mac
    } else {
        let detected = detect_mac(device.name()).context("Failed to detect device MAC")?;
        info!("Detected device MAC: {detected}");
        detected
    };

    let (injector, stdin_handle) = if config.manual_injection {
        info!("Manual injection enabled, reading hex frames from stdin");
        let (tx, injector) = Injector::channel(INJECTION_QUEUE);
        (Some(injector), Some(spawn_stdin_reader(tx)))
    } else {
        (None, None)
    };

    let interface_config = InterfaceConfig {
        responder: ResponderConfig {
            local_ip: config.local_ip,
            local_mac,
            rebroadcast_cooldown: config.rebroadcast_cooldown(),
        },
        idle_backoff: config.idle_backoff(),
    };
    let mut interface = Interface::start(interface_config, device, injector)
        .context("Failed to start interface worker")?;

    let mut ticker = tokio::time::interval(config.report_interval());
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                if !interface.is_running() {
                    warn!("Interface worker exited unexpectedly");
                    break;
                }
                info!("{}", interface.report());
            }
        }
    }

    interface.stop();
    if let Some(handle) = stdin_handle {
        handle.abort();
    }
    info!("Final statistics: {}", interface.report().total);
    info!("Shutdown complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    run().await
}
