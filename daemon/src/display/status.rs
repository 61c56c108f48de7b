//! What the dashboard detail pages show, gathered from the host when a page is
//! opened.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::warn;
use tokio::process::Command;
use tokio::time::timeout;

use kiosk::navigation::Page;

use crate::config::DashboardConfig;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub percent: f32,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    Bars(Vec<Bar>),
    Health(Vec<(String, ServiceState)>),
    Log(Vec<String>),
}

pub async fn gather(page: Page, config: &DashboardConfig) -> PageContent {
    match page {
        Page::Storage => {
            let mut bars = Vec::new();
            for path in &config.storage_paths {
                bars.push(storage_bar(path).await);
            }
            PageContent::Bars(bars)
        }
        Page::Performance => PageContent::Bars(performance_bars().await),
        Page::Services => {
            let mut health = Vec::new();
            for service in &config.services {
                health.push((service.clone(), service_state(service).await));
            }
            PageContent::Health(health)
        }
        Page::NginxLogs => PageContent::Log(journal(&config.nginx_unit, config.log_lines).await),
        Page::SquidLogs => PageContent::Log(journal(&config.squid_unit, config.log_lines).await),
        Page::ImmichLogs => {
            let lines = config.log_lines.to_string();
            let args = ["logs", "--tail", lines.as_str(), config.immich_container.as_str()];
            PageContent::Log(log_or_error(run_lines("docker", &args, true).await))
        }
    }
}

async fn run(program: &str, args: &[&str]) -> Result<std::process::Output> {
    timeout(COMMAND_TIMEOUT, Command::new(program).args(args).kill_on_drop(true).output())
        .await
        .with_context(|| format!("{program} timed out"))?
        .with_context(|| format!("failed to run {program}"))
}

/// Output lines of a command that has to succeed. `docker logs` replays the
/// container's stderr on its own stderr, so that can be folded in.
async fn run_lines(program: &str, args: &[&str], with_stderr: bool) -> Result<Vec<String>> {
    let out = run(program, args).await?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!(
            "{program} failed: {}",
            stderr.lines().last().unwrap_or("no output")
        );
    }
    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    if with_stderr {
        text.push_str(&String::from_utf8_lossy(&out.stderr));
    }
    Ok(text.lines().map(str::to_string).collect())
}

fn log_or_error(lines: Result<Vec<String>>) -> Vec<String> {
    match lines {
        Ok(lines) if lines.is_empty() => vec!["(no log entries)".to_string()],
        Ok(lines) => lines,
        Err(e) => {
            warn!("{e:#}");
            vec![format!("{e:#}")]
        }
    }
}

async fn journal(unit: &str, lines: usize) -> Vec<String> {
    let lines = lines.to_string();
    let args = ["-u", unit, "-n", lines.as_str(), "--no-pager", "-o", "cat"];
    log_or_error(run_lines("journalctl", &args, false).await)
}

async fn service_state(service: &str) -> ServiceState {
    match run("systemctl", &["is-active", "--quiet", service]).await {
        Ok(out) if out.status.success() => ServiceState::Active,
        Ok(_) => ServiceState::Inactive,
        Err(e) => {
            warn!("{e:#}");
            ServiceState::Unknown
        }
    }
}

async fn storage_bar(path: &Path) -> Bar {
    let label = path.display().to_string();
    let path = label.as_str();
    let usage = run_lines("df", &["-P", "-k", path], false)
        .await
        .and_then(|lines| parse_df(&lines.join("\n")));
    match usage {
        Ok((used_kb, total_kb)) => usage_bar(label, used_kb * 1024, total_kb * 1024),
        Err(e) => {
            warn!("no usage for {label}: {e:#}");
            Bar {
                label,
                percent: 0.0,
                detail: "unavailable".to_string(),
            }
        }
    }
}

fn usage_bar(label: String, used: u64, total: u64) -> Bar {
    let percent = if total > 0 {
        (used as f64 / total as f64 * 100.0) as f32
    } else {
        0.0
    };
    Bar {
        label,
        percent,
        detail: format!("{:.1} GB / {:.1} GB", used as f64 / GIB, total as f64 / GIB),
    }
}

/// Used and total KiB from `df -P -k` output.
fn parse_df(output: &str) -> Result<(u64, u64)> {
    let row = output.lines().nth(1).context("df printed no filesystem")?;
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 6 {
        bail!("unexpected df row: {row}");
    }
    let total = fields[1].parse().context("bad df size")?;
    let used = fields[2].parse().context("bad df used")?;
    Ok((used, total))
}

#[derive(Debug, Default, PartialEq)]
struct MemInfo {
    total_kb: u64,
    available_kb: u64,
    swap_total_kb: u64,
    swap_free_kb: u64,
}

fn parse_meminfo(text: &str) -> MemInfo {
    let mut info = MemInfo::default();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse() else { continue };
        match key {
            "MemTotal:" => info.total_kb = value,
            "MemAvailable:" => info.available_kb = value,
            "SwapTotal:" => info.swap_total_kb = value,
            "SwapFree:" => info.swap_free_kb = value,
            _ => {}
        }
    }
    info
}

/// One-minute load average as a share of the available cores.
fn load_percent(loadavg: &str, cores: usize) -> Option<f32> {
    let load: f32 = loadavg.split_whitespace().next()?.parse().ok()?;
    Some((load / cores.max(1) as f32 * 100.0).min(100.0))
}

async fn performance_bars() -> Vec<Bar> {
    let mut bars = Vec::new();

    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match tokio::fs::read_to_string("/proc/loadavg").await {
        Ok(loadavg) => {
            let percent = load_percent(&loadavg, cores).unwrap_or(0.0);
            let load = loadavg.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
            bars.push(Bar {
                label: "CPU load".to_string(),
                percent,
                detail: format!("{load} on {cores} cores"),
            });
        }
        Err(e) => warn!("failed to read /proc/loadavg: {e}"),
    }

    match tokio::fs::read_to_string("/proc/meminfo").await {
        Ok(text) => {
            let mem = parse_meminfo(&text);
            bars.push(usage_bar(
                "Memory".to_string(),
                mem.total_kb.saturating_sub(mem.available_kb) * 1024,
                mem.total_kb * 1024,
            ));
            bars.push(usage_bar(
                "Swap".to_string(),
                mem.swap_total_kb.saturating_sub(mem.swap_free_kb) * 1024,
                mem.swap_total_kb * 1024,
            ));
        }
        Err(e) => warn!("failed to read /proc/meminfo: {e}"),
    }

    bars
}
