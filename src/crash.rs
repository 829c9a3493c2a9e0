//! Panic reports
//!
//! A panic on the panel thread or the engine thread is appended to
//! `crash.log` in the log directory before the default hook runs. The file is
//! written synchronously so the report survives an unattended appliance
//! restarting.

use std::fs::OpenOptions;
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use tracing::error;

const CRASH_LOG_FILENAME: &str = "crash.log";

/// Install the panic hook. Returns the crash log path.
pub fn install_panic_hook(log_dir: &Path) -> PathBuf {
    let crash_log = log_dir.join(CRASH_LOG_FILENAME);
    let hook_path = crash_log.clone();

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        record_panic(&hook_path, info);
        default_hook(info);
    }));

    crash_log
}

fn record_panic(crash_log: &Path, info: &PanicHookInfo<'_>) {
    let message = panic_message(info);
    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "unknown location".to_string());
    let thread = std::thread::current()
        .name()
        .unwrap_or("unnamed")
        .to_string();

    let report = format_report(
        &chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        &thread,
        &location,
        &message,
        &std::backtrace::Backtrace::force_capture().to_string(),
    );

    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(crash_log) {
        let _ = file.write_all(report.as_bytes());
        let _ = file.sync_all();
    }

    error!("PANIC in thread '{}' at {}: {}", thread, location, message);
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    }
}

fn format_report(
    timestamp: &str,
    thread: &str,
    location: &str,
    message: &str,
    backtrace: &str,
) -> String {
    let rule = "=".repeat(72);
    format!(
        "\n{rule}\nPANIC at {timestamp} in thread '{thread}'\n{rule}\n\
         Location: {location}\nMessage: {message}\n\nBacktrace:\n{backtrace}\n{rule}\n"
    )
}
