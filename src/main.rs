//! `level-monitor` -- headless noise level monitor.
//!
//! Connects to a push server, logs every state change and accepts commands
//! on stdin (see [`level_monitor::command`]).
//!
//! # Environment variables
//!
//! | Variable                          | Default                 |
//! |-----------------------------------|-------------------------|
//! | `LEVEL_MONITOR_API_URL`           | `http://localhost:3000` |
//! | `LEVEL_MONITOR_WARNING_THRESHOLD` | `45`                    |
//! | `LEVEL_MONITOR_CRITICAL_THRESHOLD`| `70`                    |
//! | `LEVEL_MONITOR_RECONNECT_DELAY_MS`| `1000`                  |
//! | `RUST_LOG`                        | `level_monitor=info`    |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use level_monitor::command::{self, Command, Outcome};
use level_monitor::transport::EventReceiver;
use level_monitor::{
    LevelMonitor, Session, Settings, SocketIoOptions, SocketIoTransport, StateChange,
    StreamTransport, Thresholds, Transport,
};

#[derive(Parser, Debug)]
#[command(name = "level-monitor")]
#[command(about = "Headless client for a live classroom noise level feed")]
struct Args {
    /// Settings file (TOML)
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Socket.IO server base address (overrides settings)
    #[arg(short, long, conflicts_with = "connect")]
    url: Option<String>,

    /// Connect to a line-delimited JSON feed over TCP instead (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Warning threshold (overrides settings)
    #[arg(long)]
    warning: Option<f64>,

    /// Critical threshold (overrides settings)
    #[arg(long)]
    critical: Option<f64>,

    /// Session id under which grade changes are forwarded
    #[arg(short, long)]
    session: Option<String>,

    /// Teacher name for the session
    #[arg(long, default_value = "")]
    teacher: String,

    /// Course name for the session
    #[arg(long, default_value = "")]
    course: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "level_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("loading settings")?;

    let defaults = settings.thresholds();
    let thresholds = Thresholds::new(
        args.warning.unwrap_or(defaults.warning),
        args.critical.unwrap_or(defaults.critical),
    );

    let (transport, events): (Arc<dyn Transport>, EventReceiver) = match args.connect {
        Some(ref addr) => {
            let (transport, events) = StreamTransport::connect(addr.as_str(), addr)
                .await
                .with_context(|| format!("connecting to {}", addr))?;
            (Arc::new(transport) as Arc<dyn Transport>, events)
        }
        None => {
            let url = args.url.clone().unwrap_or_else(|| settings.api_url.clone());
            let options = SocketIoOptions {
                reconnect_delay: settings.reconnect_delay(),
                ..SocketIoOptions::default()
            };
            let (transport, events, _handle) = SocketIoTransport::connect(&url, options)?;
            (Arc::new(transport) as Arc<dyn Transport>, events)
        }
    };

    tracing::info!(
        transport = transport.description(),
        warning = thresholds.warning,
        critical = thresholds.critical,
        "Starting level-monitor",
    );

    let monitor = Arc::new(LevelMonitor::new(transport, thresholds));
    if let Some(id) = args.session {
        monitor.set_session(Session::new(id, args.teacher, args.course));
    }

    let log_task = tokio::spawn(log_changes(monitor.subscribe()));

    tokio::select! {
        _ = monitor.run(events) => {
            tracing::info!("Transport closed");
        }
        result = read_commands(&monitor) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    monitor.shutdown();
    log_task.abort();
    Ok(())
}

/// Read commands from stdin until `quit` or EOF.
async fn read_commands(monitor: &LevelMonitor) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match command::apply(monitor, command) {
            Outcome::Continue => {}
            Outcome::Report(text) => println!("{}", text),
            Outcome::Quit => return Ok(()),
        }
    }

    // Keep monitoring after stdin closes (e.g. when run as a service).
    std::future::pending::<()>().await;
    Ok(())
}

/// Log every field-level change.
async fn log_changes(mut changes: broadcast::Receiver<StateChange>) {
    loop {
        match changes.recv().await {
            Ok(StateChange::Alert(alert)) if alert.is_active() => {
                tracing::warn!(alert = alert.symbol(), "Noise alert");
            }
            Ok(StateChange::NoiseLevel(level)) => {
                tracing::debug!(level, "Level");
            }
            Ok(change) => {
                tracing::info!(?change, "State changed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Change log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
