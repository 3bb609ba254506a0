mod config;
mod detector;
mod device;
mod error;
mod fetcher;
mod scheduler;
mod state;
mod sync;
mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, CONNECTIVITY_CACHE_MS};
use crate::device::host::{LogRenderer, SystemClock, TcpReachability, TerminalBell};
use crate::device::Device;
use crate::error::Result;
use crate::fetcher::transport::TlsTransport;
use crate::fetcher::DocumentFetcher;
use crate::scheduler::{Scheduler, SchedulerSettings};
use crate::sync::{Endpoints, ScoreboardClient};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let timeout = Duration::from_secs(cfg.http_timeout_secs);
    let transport = TlsTransport::new(timeout)?;
    let client = ScoreboardClient::new(
        DocumentFetcher::new(transport, cfg.medals_api_auth.clone()),
        Endpoints::from_config(&cfg),
    );

    let device = Device {
        connectivity: Box::new(TcpReachability::new(
            cfg.connectivity_target.clone(),
            timeout,
            Duration::from_millis(CONNECTIVITY_CACHE_MS),
        )),
        renderer: Box::new(LogRenderer::new(cfg.schedule_utc_offset)),
        sound: Box::new(TerminalBell),
        clock: Box::new(SystemClock),
    };

    info!(
        favorite = %cfg.favorite_country,
        connectivity = %cfg.connectivity_target,
        timeout_secs = cfg.http_timeout_secs,
        "Starting scoreboard for {}",
        cfg.favorite_country
    );

    let mut scheduler = Scheduler::new(client, device, SchedulerSettings::from_config(&cfg));
    let shutdown = Arc::new(AtomicBool::new(false));
    let loop_flag = shutdown.clone();
    let mut control_loop = tokio::task::spawn_blocking(move || scheduler.run(&loop_flag));

    tokio::select! {
        joined = &mut control_loop => {
            joined?;
            warn!("Control loop exited on its own");
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("Shutdown requested");
                    shutdown.store(true, Ordering::Relaxed);
                }
                Err(e) => warn!("Failed to listen for Ctrl-C, running until the loop exits: {e}"),
            }
            control_loop.await?;
        }
    }

    Ok(())
}
