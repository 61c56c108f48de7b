mod config;
mod display;
mod error;
mod listener;
mod server;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use kiosk::gesture::GestureRecognizer;
use kiosk::supervisor::{ProcessLauncher, SharedSupervisor, Supervisor};
use kiosk::touch_device::TouchDevice;

use crate::config::{Config, parse_config};
use crate::display::{DeviceFramebuffer, Renderer};
use crate::error::KioskError;
use crate::listener::TouchLoop;
use crate::server::{ServerState, run_server};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Touch kiosk: swipe between a dashboard, a slideshow and a video player"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(default_value = "/etc/kiosk/config.toml")]
    config: PathBuf,

    /// Log gesture metrics and other debug output
    #[arg(short, long)]
    verbose: bool,
}

fn run_shutdown_thread(
    task_tracker: &TaskTracker,
    shutdown_token: CancellationToken,
) -> Result<(), KioskError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    task_tracker.spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    error!("Unable to listen for shutdown signal: {err}");
                }
                info!("received Ctrl-C, shutting down");
            }
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = shutdown_token.cancelled() => return,
        }
        shutdown_token.cancel();
    });
    Ok(())
}

async fn run(
    config: &Config,
    supervisor: SharedSupervisor,
    task_tracker: &TaskTracker,
    shutdown_token: CancellationToken,
) -> Result<(), KioskError> {
    let device = TouchDevice::open(&config.touch_device).await?;
    let recognizer = GestureRecognizer::new(device.calibration(&config.gestures)?);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| KioskError::Bind(config.port, e))?;
    run_server(
        task_tracker,
        listener,
        ServerState {
            supervisor: supervisor.clone(),
        },
        shutdown_token.clone(),
    );
    run_shutdown_thread(task_tracker, shutdown_token.clone())?;

    let renderer = Renderer::new(
        DeviceFramebuffer::new(config.framebuffer_device.clone(), config.rotate_180),
        config.dashboard.clone(),
    );
    TouchLoop::new(config.initial_app, supervisor, renderer)
        .await
        .run(device.gestures(recognizer), shutdown_token)
        .await
}

/// Stop accepting work, let in-flight remote requests finish, then take down
/// whatever they left running.
async fn shut_down(
    supervisor: &SharedSupervisor,
    task_tracker: &TaskTracker,
    shutdown_token: &CancellationToken,
) {
    shutdown_token.cancel();
    task_tracker.close();
    task_tracker.wait().await;
    supervisor.lock().await.terminate_current().await;
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), KioskError> {
    let args = Args::parse();
    kiosk::init_logging(if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let config = parse_config(&args.config).await?;

    let mut supervisor = Supervisor::new(
        config.supervisor.clone(),
        config.apps.clone(),
        ProcessLauncher,
    );
    // a previous run may have died with an app still on screen
    supervisor.sweep_orphans().await;
    let supervisor = supervisor.into_shared();

    let task_tracker = TaskTracker::new();
    let shutdown_token = CancellationToken::new();
    let result = run(&config, supervisor.clone(), &task_tracker, shutdown_token.clone()).await;
    if let Err(e) = &result {
        error!("{e}");
    }

    shut_down(&supervisor, &task_tracker, &shutdown_token).await;

    info!("kiosk stopped");
    result
}
