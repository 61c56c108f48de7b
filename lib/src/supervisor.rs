//! Keeps at most one app in charge of the display.
//!
//! Apps other than the in-process dashboard run as their own process group, so
//! that a video player and the decoders it forks can be torn down together.
//! Every launch first tears down whatever ran before, then sweeps leftovers
//! from earlier crashes, and only then starts the next app.
//!
//! The supervisor is shared between the touch loop and the HTTP remote as a
//! [`SharedSupervisor`]; holding its mutex across a whole `launch` is what
//! keeps two launches from interleaving.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep, timeout};

use crate::App;

pub type SharedSupervisor = Arc<Mutex<Supervisor>>;

const MIN_GRACE_PERIOD: Duration = Duration::from_secs(1);
const MAX_GRACE_PERIOD: Duration = Duration::from_secs(3);
const REAP_TIMEOUT: Duration = Duration::from_secs(1);
const GROUP_EXIT_TIMEOUT: Duration = Duration::from_secs(1);
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How long an app gets to exit after SIGTERM before it is killed.
    pub grace_period_ms: u64,
    /// An app that exits within this window after spawning failed to launch.
    pub confirm_window_ms: u64,
    /// Binaries that may hold the framebuffer after a crash.
    pub orphan_processes: Vec<String>,
    /// Where the running app's process group id is recorded, so a restarted
    /// supervisor can clean up after a crashed one. Should live on a tmpfs.
    pub pid_file: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 2000,
            confirm_window_ms: 500,
            orphan_processes: vec!["fbi".to_string(), "ffmpeg".to_string()],
            pid_file: Some(PathBuf::from("/run/kiosk/active.pgid")),
        }
    }
}

impl SupervisorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms).clamp(MIN_GRACE_PERIOD, MAX_GRACE_PERIOD)
    }

    pub fn confirm_window(&self) -> Duration {
        Duration::from_millis(self.confirm_window_ms)
    }
}

/// Command line for each app. An empty dashboard command means the daemon
/// draws the dashboard itself.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppCommands {
    pub dashboard: Vec<String>,
    pub photos: Vec<String>,
    pub video: Vec<String>,
}

impl Default for AppCommands {
    fn default() -> Self {
        Self {
            dashboard: Vec::new(),
            photos: vec!["/opt/kiosk/bin/slideshow".to_string()],
            video: vec!["/opt/kiosk/bin/video-player".to_string()],
        }
    }
}

impl AppCommands {
    pub fn get(&self, app: App) -> &[String] {
        match app {
            App::Dashboard => &self.dashboard,
            App::Photos => &self.photos,
            App::Video => &self.video,
        }
    }
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("no command configured for {0}")]
    NotConfigured(App),
    #[error("{app}: {program:?} not found")]
    NotFound { app: App, program: String },
    #[error("{app}: failed to start {program:?}: {source}")]
    Spawn {
        app: App,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{app} exited right after starting ({status})")]
    ExitedImmediately { app: App, status: ExitStatus },
}

/// A running app and everything it spawned.
#[async_trait]
pub trait AppProcess: Send {
    /// Process group id, which is also the leader's pid.
    fn id(&self) -> u32;

    /// Non-blocking check whether the leader has exited.
    fn has_exited(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Wait at most `within` for the leader to exit.
    async fn wait_for_exit(&mut self, within: Duration) -> io::Result<Option<ExitStatus>>;

    /// SIGTERM the whole tree, wait up to `grace`, then SIGKILL whatever is
    /// left. Returns once the tree is gone or a bounded wait ran out.
    async fn terminate_tree(&mut self, grace: Duration);
}

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn spawn(&self, app: App, argv: &[String]) -> io::Result<Box<dyn AppProcess>>;

    /// Kill a process group left behind by an earlier run.
    async fn kill_group(&self, pgid: u32);

    /// Kill every process with exactly this name.
    async fn kill_by_name(&self, name: &str);
}

pub struct ActiveApp {
    pub app: App,
    pub started_at: DateTime<Local>,
    process: Option<Box<dyn AppProcess>>,
}

impl ActiveApp {
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.id())
    }

    /// True for the dashboard when the daemon draws it itself.
    pub fn in_process(&self) -> bool {
        self.process.is_none()
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    commands: AppCommands,
    launcher: Box<dyn Launcher>,
    active: Option<ActiveApp>,
    changes: watch::Sender<Option<App>>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        commands: AppCommands,
        launcher: impl Launcher + 'static,
    ) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            config,
            commands,
            launcher: Box::new(launcher),
            active: None,
            changes,
        }
    }

    pub fn into_shared(self) -> SharedSupervisor {
        Arc::new(Mutex::new(self))
    }

    /// Notified with the new active app after every change.
    pub fn subscribe(&self) -> watch::Receiver<Option<App>> {
        self.changes.subscribe()
    }

    pub fn active(&self) -> Option<&ActiveApp> {
        self.active.as_ref()
    }

    pub fn active_app(&self) -> Option<App> {
        self.active.as_ref().map(|a| a.app)
    }

    /// Stop the current app, sweep orphans, and start `app`.
    pub async fn launch(&mut self, app: App) -> Result<(), LaunchError> {
        self.terminate_current().await;
        self.sweep_orphans().await;

        let argv = self.commands.get(app).to_vec();
        let Some(program) = argv.first().cloned() else {
            if app != App::Dashboard {
                return Err(LaunchError::NotConfigured(app));
            }
            info!("showing {app} in-process");
            self.record(ActiveApp {
                app,
                started_at: Local::now(),
                process: None,
            })
            .await;
            return Ok(());
        };

        info!("starting {app}: {}", argv.join(" "));
        let mut process = match self.launcher.spawn(app, &argv).await {
            Ok(process) => process,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LaunchError::NotFound { app, program });
            }
            Err(source) => {
                return Err(LaunchError::Spawn {
                    app,
                    program,
                    source,
                });
            }
        };

        match process.wait_for_exit(self.config.confirm_window()).await {
            Ok(Some(status)) => {
                // the leader is gone, but it may have forked before dying
                process.terminate_tree(Duration::ZERO).await;
                return Err(LaunchError::ExitedImmediately { app, status });
            }
            Ok(None) => {}
            Err(e) => warn!("couldn't confirm {app} started: {e}"),
        }

        self.record(ActiveApp {
            app,
            started_at: Local::now(),
            process: Some(process),
        })
        .await;
        Ok(())
    }

    /// Stop the current app, if any.
    pub async fn terminate_current(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        info!("stopping {}", active.app);
        if let Some(process) = active.process.as_mut() {
            process.terminate_tree(self.config.grace_period()).await;
        }
        forget_pid(self.config.pid_file.as_deref()).await;
        self.changes.send_replace(None);
    }

    /// Kill anything left over from a previous run that may still hold the
    /// framebuffer or touch device.
    pub async fn sweep_orphans(&mut self) {
        if let Some(path) = &self.config.pid_file
            && let Ok(contents) = tokio::fs::read_to_string(path).await
        {
            match contents.trim().parse::<u32>() {
                Ok(pgid) if pgid > 1 => {
                    warn!("killing process group {pgid} left behind by a previous run");
                    self.launcher.kill_group(pgid).await;
                }
                _ => warn!("ignoring garbage in {}", path.display()),
            }
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!("failed to remove {}: {e}", path.display());
            }
        }

        for name in &self.config.orphan_processes {
            self.launcher.kill_by_name(name).await;
        }
    }

    /// Forget the active app if its process died on its own.
    pub async fn refresh(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(process) = active.process.as_mut() else {
            return;
        };
        match process.has_exited() {
            Ok(Some(status)) => {
                warn!("{} exited on its own ({status})", active.app);
                // leader is gone; descendants may not be
                process.terminate_tree(Duration::ZERO).await;
                self.active = None;
                forget_pid(self.config.pid_file.as_deref()).await;
                self.changes.send_replace(None);
            }
            Ok(None) => {}
            Err(e) => error!("failed to poll {}: {e}", active.app),
        }
    }

    /// The apps currently running: empty, or exactly one.
    pub async fn status(&mut self) -> Vec<App> {
        self.refresh().await;
        self.active_app().into_iter().collect()
    }

    async fn record(&mut self, active: ActiveApp) {
        let app = active.app;
        if let (Some(path), Some(pgid)) = (&self.config.pid_file, active.pid())
            && let Err(e) = write_pid_file(path, pgid).await
        {
            warn!("failed to record process group in {}: {e}", path.display());
        }
        self.active = Some(active);
        self.changes.send_replace(Some(app));
    }
}

async fn forget_pid(pid_file: Option<&Path>) {
    if let Some(path) = pid_file {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove {}: {e}", path.display()),
        }
    }
}

async fn write_pid_file(path: &Path, pgid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, format!("{pgid}\n")).await
}

/// Spawns apps as real processes, each leading its own process group.
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn spawn(&self, _app: App, argv: &[String]) -> io::Result<Box<dyn AppProcess>> {
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
        };
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()?;
        let pgid = child
            .id()
            .ok_or_else(|| io::Error::other("child exited before its pid was read"))?;
        debug!("{program} started as process group {pgid}");
        Ok(Box::new(ProcessGroup { child, pgid }))
    }

    async fn kill_group(&self, pgid: u32) {
        signal_group(pgid, Signal::SIGKILL);
    }

    async fn kill_by_name(&self, name: &str) {
        match Command::new("pkill").args(["-KILL", "-x", name]).output().await {
            Ok(out) if out.status.success() => info!("killed lingering {name}"),
            // pkill exits 1 when nothing matched
            Ok(out) if out.status.code() == Some(1) => {}
            Ok(out) => warn!(
                "pkill {name} failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Err(e) => warn!("failed to run pkill for {name}: {e}"),
        }
    }
}

struct ProcessGroup {
    child: Child,
    pgid: u32,
}

#[async_trait]
impl AppProcess for ProcessGroup {
    fn id(&self) -> u32 {
        self.pgid
    }

    fn has_exited(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    async fn wait_for_exit(&mut self, within: Duration) -> io::Result<Option<ExitStatus>> {
        match timeout(within, self.child.wait()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn terminate_tree(&mut self, grace: Duration) {
        let pgid = self.pgid;
        signal_group(pgid, Signal::SIGTERM);
        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!("process group {pgid} leader exited ({status})"),
            Ok(Err(e)) => warn!("failed to wait for process group {pgid}: {e}"),
            Err(_) => warn!("process group {pgid} still running after {grace:?}, killing"),
        }

        // children can outlive a leader that handled SIGTERM
        signal_group(pgid, Signal::SIGKILL);
        if let Err(e) = timeout(REAP_TIMEOUT, self.child.wait()).await {
            warn!("process group {pgid} leader not reaped: {e}");
        }

        let deadline = Instant::now() + GROUP_EXIT_TIMEOUT;
        while group_alive(pgid) {
            if Instant::now() >= deadline {
                warn!("process group {pgid} still has members after SIGKILL");
                break;
            }
            sleep(GROUP_POLL_INTERVAL).await;
        }
    }
}

fn signal_group(pgid: u32, signal: Signal) {
    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("failed to send {signal} to process group {pgid}: {e}"),
    }
}

fn group_alive(pgid: u32) -> bool {
    killpg(Pid::from_raw(pgid as i32), None).is_ok()
}
