use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use js5watch_client::ClientConfig;
use js5watch_monitor::{EndpointSet, LastReset, MonitorConfig, ResetMonitor};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

mod http;
mod store;

use store::SqliteStore;

#[derive(Parser, Debug)]
#[clap(name = "js5watch")]
struct Opt {
    /// JS5 endpoint to watch. The first is probed continuously; the rest corroborate its failures.
    #[clap(
        long = "endpoint",
        default_values = &[
            "oldschool2.runescape.com:43594",
            "oldschool143.runescape.com:43594",
            "oldschool128.runescape.com:43594",
        ],
    )]
    endpoints: Vec<String>,
    /// Revision to start negotiating from
    #[clap(long, default_value = "223")]
    revision: u32,
    /// Most revision increments a single handshake may go through
    #[clap(long, default_value = "50")]
    max_revision_bumps: u32,
    /// Seconds between pings, and between reconnect attempts
    #[clap(long, default_value = "5")]
    probe_interval: u64,
    /// Seconds before a connect, read, or write is abandoned
    #[clap(long, default_value = "5")]
    socket_timeout: u64,

    /// Address to serve reset status on
    #[clap(long, default_value = "[::]:8081")]
    listen: SocketAddr,
    /// SQLite database holding reset history
    #[clap(parse(from_os_str), long, default_value = "js5watch.db")]
    database: PathBuf,

    /// Also append logs to this file
    #[clap(parse(from_os_str), long)]
    log_file: Option<PathBuf>,
    /// Also send logs to journald
    #[clap(long)]
    journald: bool,
}

fn main() {
    let opt = Opt::parse();
    let code = {
        if let Err(e) = run(opt) {
            eprintln!("ERROR: {:#}", e);
            1
        } else {
            0
        }
    };
    ::std::process::exit(code);
}

#[tokio::main]
async fn run(options: Opt) -> Result<()> {
    let _log_guard = init_logging(&options)?;

    let client_config = ClientConfig {
        timeout: Duration::from_secs(options.socket_timeout),
        max_revision_bumps: options.max_revision_bumps,
    };
    let endpoints = EndpointSet::from_addrs(options.endpoints.iter().cloned(), &client_config)?;
    let store = SqliteStore::open(&options.database)
        .with_context(|| format!("opening {}", options.database.display()))?;
    let last_reset = LastReset::new();
    let monitor = ResetMonitor::new(
        endpoints,
        store,
        last_reset.clone(),
        MonitorConfig {
            probe_interval: Duration::from_secs(options.probe_interval),
            baseline_revision: options.revision,
        },
    );

    let listener = tokio::net::TcpListener::bind(options.listen)
        .await
        .with_context(|| format!("binding {}", options.listen))?;
    info!(address = %options.listen, "serving reset status");

    let cancel = CancellationToken::new();
    let monitor = tokio::spawn(monitor.run(cancel.clone()));
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutting down");
            cancel.cancel();
        }
    });

    let served = axum::serve(listener, http::router(last_reset))
        .with_graceful_shutdown({
            let cancel = cancel.clone();
            async move { cancel.cancelled().await }
        })
        .await
        .context("serving status");
    cancel.cancel();
    monitor.await.context("monitor task")?;
    served
}

/// Install the global subscriber. The returned guard flushes the log file when dropped.
fn init_logging(options: &Opt) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file, guard) = match options.log_file {
        Some(ref path) => {
            let dir = path.parent().filter(|x| !x.as_os_str().is_empty());
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("log file {} has no file name", path.display()))?;
            let dir = dir.unwrap_or_else(|| ".".as_ref());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let journald = if options.journald {
        Some(tracing_journald::layer().context("connecting to journald")?)
    } else {
        None
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file)
        .with(journald)
        .try_init()
        .context("installing log subscriber")?;
    Ok(guard)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
