//! ovr-io - Host-side driver daemon for OVR scent devices
//!
//! Reads odorant commands from stdin, one per line:
//!
//! ```text
//! <name>,<slot>,<burst|ambient>,<intensity>
//! ```
//!
//! and forwards them to the device every `session.tick_interval_ms`, over
//! USB serial when a device answers there and over WiFi otherwise.

use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use ovr_io::{Admission, AppConfig, Error, OdorantCommand, Result, Session};
use std::env;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_CONFIG_PATH: &str = "/etc/ovrio.toml";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `ovr-io <path>` (positional)
/// - `ovr-io --config <path>` (flag-based)
/// - `ovr-io -c <path>` (short flag)
///
/// Defaults to `/etc/ovrio.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    DEFAULT_CONFIG_PATH.to_string()
}

/// Forward stdin lines to the main loop; the channel disconnects at EOF
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn stdin reader: {}", e)))?;
    Ok(rx)
}

fn submit_line(session: &mut Session, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }

    match line.parse::<OdorantCommand>() {
        Ok(command) => {
            if session.submit(command) == Admission::Rejected {
                log::debug!("Rejected: {}", line);
            }
        }
        Err(e) => log::warn!("Skipping '{}': {}", line, e),
    }
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    // Initialize logger (RUST_LOG overrides the configured level)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("ovr-io v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_found {
        log::info!("Using config: {}", config_path);
    } else {
        log::warn!("Config {} not found, using defaults", config_path);
    }
    log::info!(
        "Device: {} ({} commands per cycle)",
        config.device.hostname,
        config.device.max_commands()
    );

    let mut session = Session::from_config(&config)?;

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let lines = spawn_stdin_reader()?;
    let tick_interval = Duration::from_millis(config.session.tick_interval_ms);
    let mut last_tick = Instant::now();

    log::info!("ovr-io running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        let input_open = loop {
            match lines.try_recv() {
                Ok(line) => submit_line(&mut session, &line),
                Err(TryRecvError::Empty) => break true,
                Err(TryRecvError::Disconnected) => break false,
            }
        };

        let now = Instant::now();
        session.tick(now - last_tick);
        last_tick = now;

        if !input_open {
            log::info!("End of input");
            break;
        }
        thread::sleep(tick_interval);
    }

    log::info!("Shutting down...");
    drop(session);
    log::info!("ovr-io stopped");
    Ok(())
}
