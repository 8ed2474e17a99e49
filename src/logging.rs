//! Tracing setup, host resource reporting and log retention.
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Settings;

/// Install the global subscriber: compact stdout plus `<log_path>/<component>.log`.
/// `RUST_LOG` wins over the configured level; `verbose` forces `debug`.
pub fn init(settings: &Settings, component: &str, verbose: bool) -> Result<()> {
    fs::create_dir_all(&settings.logging.path)
        .with_context(|| format!("failed to create log dir {}", settings.logging.path))?;
    let path = settings.log_file(component);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let level = if verbose {
        "debug".to_string()
    } else {
        settings.logging.level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("tracing subscriber already installed")?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MemInfo {
    total_kb: u64,
    available_kb: u64,
}

fn parse_meminfo(text: &str) -> Option<MemInfo> {
    let field = |name: &str| {
        text.lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
    };
    Some(MemInfo {
        total_kb: field("MemTotal:")?,
        available_kb: field("MemAvailable:")?,
    })
}

fn parse_loadavg(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Log memory use and 1-minute load average, when `/proc` is readable.
pub fn log_system_resources() {
    let mem = fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|t| parse_meminfo(&t));
    let load = fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|t| parse_loadavg(&t));
    match mem {
        Some(mem) => {
            let used_mb = mem.total_kb.saturating_sub(mem.available_kb) / 1024;
            let total_mb = mem.total_kb / 1024;
            let percent = if mem.total_kb == 0 {
                0.0
            } else {
                (mem.total_kb - mem.available_kb) as f64 / mem.total_kb as f64 * 100.0
            };
            info!(
                used_mb,
                total_mb,
                percent = %format!("{percent:.1}"),
                load_1m = ?load,
                "system resources"
            );
        }
        None => debug!("system resource information unavailable"),
    }
}

/// Delete `*.log` files in `dir` not modified for `days` days. A missing
/// directory deletes nothing.
pub fn cleanup_old_logs(dir: &Path, days: u32) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(u64::from(days) * 24 * 60 * 60))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut deleted = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(err) => {
                warn!(?err, path = %path.display(), "cannot stat log file");
                continue;
            }
        };
        if modified < cutoff {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "deleted old log file");
                    deleted += 1;
                }
                Err(err) => warn!(?err, path = %path.display(), "failed to delete log file"),
            }
        }
    }
    Ok(deleted)
}
