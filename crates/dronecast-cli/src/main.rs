//! CLI entry point for the drone telemetry publisher.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use dronecast::{config::SimConfig, protocol::Dialect, runner, transport::TransportKind};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dronecast")]
#[command(about = "Publish simulated drone telemetry and sensor status messages")]
#[command(version)]
struct Cli {
    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// multicast, broadcast or zmq
    #[arg(short, long)]
    transport: Option<TransportKind>,

    /// Multicast group, broadcast address or pub/sub bind host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port for drone messages (event-xml, basic-id-json)
    #[arg(long)]
    telemetry_port: Option<u16>,

    /// Port for sensor status messages (status-json, status-xml)
    #[arg(long)]
    status_port: Option<u16>,

    /// Multicast TTL
    #[arg(long)]
    ttl: Option<u32>,

    /// Pub/sub topic prefix
    #[arg(long)]
    topic: Option<String>,

    /// Seconds between ticks, 0.1 to 60
    #[arg(short, long)]
    interval: Option<f64>,

    /// Message kind to emit; repeat for several
    #[arg(short, long = "kind")]
    kinds: Vec<Dialect>,

    /// Fixed drone id instead of a random one per message
    #[arg(long)]
    identity: Option<String>,

    /// Fixed sensor host serial for status messages
    #[arg(long)]
    host_serial: Option<String>,

    /// Seed for reproducible samples
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(short = 'D', long)]
    duration: Option<f64>,

    /// Log filter, e.g. "debug" or "dronecast=trace"; defaults to RUST_LOG, then "info"
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimConfig::default(),
        };
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.telemetry_port {
            config.telemetry_port = port;
        }
        if let Some(port) = self.status_port {
            config.status_port = port;
        }
        if let Some(ttl) = self.ttl {
            config.ttl = ttl;
        }
        if let Some(topic) = &self.topic {
            config.topic = Some(topic.clone());
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if !self.kinds.is_empty() {
            config.kinds = self.kinds.clone();
        }
        if let Some(identity) = &self.identity {
            config.identity = Some(identity.clone());
        }
        if let Some(serial) = &self.host_serial {
            config.host_serial = Some(serial.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        config.validate()?;
        Ok(config)
    }

    fn duration(&self) -> Result<Option<Duration>> {
        self.duration
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid duration {secs}"))
            })
            .transpose()
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    Ok(())
}

/// Cancel on SIGINT, SIGTERM or when the optional run duration elapses.
async fn shutdown_signal(cancel: CancellationToken, duration: Option<Duration>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let elapsed = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, stopping"),
        _ = terminate => info!("SIGTERM received, stopping"),
        _ = elapsed => info!("run duration reached, stopping"),
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let config = cli.sim_config()?;
    let duration = cli.duration()?;
    info!(
        "{} to {} (telemetry {}, status {}), kinds {:?}",
        config.transport, config.host, config.telemetry_port, config.status_port, config.kinds
    );

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(shutdown_signal(cancel.clone(), duration));

    let result = runner::run(config, cancel.clone()).await;
    cancel.cancel();
    signals.await.ok();

    for report in result? {
        info!(
            "{}: {} sent, {} failed, {}",
            report.target, report.sent, report.failed, report.state
        );
    }
    Ok(())
}
