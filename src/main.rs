//! picorder
//!
//! Front-panel driven audio recorder for single-board computers. The panel
//! loop runs on the main thread; recording runs on its own engine thread.

mod audio;
mod audition;
mod config;
mod crash;
mod engine;
mod logging;
mod panel;
mod storage;
#[cfg(test)]
mod testing;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use audio::{AudioBackend, CpalBackend, DeviceCatalog, NO_DEVICE};
use audition::AuditionPlayer;
use config::Config;
use engine::{EngineSettings, RecorderHandle};
use panel::{create_switch_input, Panel, PanelSettings, TerminalDisplay};
use storage::RecordingPointer;

/// How long the startup banner stays up
const BANNER_TIME: Duration = Duration::from_secs(2);
/// How long "goodbye!" stays up
const FAREWELL_TIME: Duration = Duration::from_secs(3);

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    help: bool,
    config: Option<PathBuf>,
    print_config: bool,
    list_devices: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "-c" | "--config" => {
                let path = args
                    .next()
                    .with_context(|| format!("{} needs a file path", arg))?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--print-config" => parsed.print_config = true,
            "--list-devices" => parsed.list_devices = true,
            other => bail!("Unknown argument: {} (try --help)", other),
        }
    }

    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    if args.help {
        print_help();
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    if args.print_config {
        print!("{}", config.summary());
        return Ok(());
    }

    let backend: Arc<dyn AudioBackend> = Arc::new(CpalBackend::new());

    if args.list_devices {
        let catalog = DeviceCatalog::new(backend.as_ref());
        println!("Capture devices:");
        for name in catalog.capture_devices() {
            println!("    {}", name);
        }
        println!();
        println!(
            "'{}' resolves to: {}",
            config.device.name,
            catalog.resolve(&config.device.name)
        );
        return Ok(());
    }

    let _log_guard = logging::init_logging()?;
    match logging::get_log_dir() {
        Ok(log_dir) => {
            let crash_log = crash::install_panic_hook(&log_dir);
            info!("Panic reports go to {:?}", crash_log);
        }
        Err(e) => warn!("Panic reports disabled: {:#}", e),
    }

    info!("picorder {} starting", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {:?}", config.config_path()?);
    for line in config.summary().lines().filter(|l| !l.is_empty()) {
        info!("{}", line);
    }

    let device = DeviceCatalog::new(backend.as_ref()).resolve(&config.device.name);
    if device == NO_DEVICE {
        warn!(
            "No capture device matches '{}', recording will fail until one is connected",
            config.device.name
        );
    } else {
        info!("Capture device: {}", device);
    }

    let recorder = RecorderHandle::spawn(
        EngineSettings {
            format: config.audio_format(),
            device,
            loop_period: config.engine_loop_period(),
        },
        backend.clone(),
        config.recording.output_directory.clone(),
        RecordingPointer::new(config.recording.pointer_file.clone()),
    )?;

    let auditioner = AuditionPlayer::new(
        backend.clone(),
        config.device.name.clone(),
        config.audition_duration(),
    );

    // SIGINT, SIGTERM and SIGHUP end the panel loop
    let running = Arc::new(AtomicBool::new(true));
    let signal_running = running.clone();
    ctrlc::set_handler(move || {
        info!("Stop signal received, shutting down...");
        signal_running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    let mut panel = Panel::new(
        create_switch_input(&config.switches),
        TerminalDisplay::new(),
        recorder,
        auditioner,
        PanelSettings {
            tick: config.tick_period(),
            mode_hold_ticks: config.mode_hold_ticks(),
            idle_ticks: config.idle_ticks(),
        },
    );

    panel.startup(BANNER_TIME);
    panel.run(&running);
    panel.graceful_exit(FAREWELL_TIME);

    info!("Shutdown complete");
    Ok(())
}

fn print_help() {
    println!("picorder - front panel audio recorder");
    println!();
    println!("USAGE:");
    println!("    picorder [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help           Print this help message");
    println!("    -c, --config <FILE>  Use this config file");
    println!("        --print-config   Print the active configuration and exit");
    println!("        --list-devices   List capture devices and exit");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG             Set log level (e.g., debug, info, warn)");
    println!("    PICORDER_LOG_PATH    Write logs to this directory");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(args(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_config_path_and_flags() {
        let parsed = args(&["-c", "piRecord.toml", "--print-config"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("piRecord.toml")));
        assert!(parsed.print_config);
        assert!(!parsed.list_devices);
    }

    #[test]
    fn test_config_without_path_is_rejected() {
        assert!(args(&["--config"]).is_err());
    }

    #[test]
    fn test_unknown_argument_is_rejected() {
        assert!(args(&["--record-now"]).is_err());
    }
}
