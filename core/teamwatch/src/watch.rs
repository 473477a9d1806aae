//! Live monitoring loop.
//!
//! One thread owns the monitor. Transport reader threads and the console
//! reader feed a single channel; a scheduled reconnect is driven by the
//! receive timeout.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use teamwatch_core::{
    load_config, EventDisposition, EventInbox, MemoryCredentialStore, Monitor, MonitorError,
    ReconnectBackoff, ReconnectConfig, RouteOutcome, TaggedEvent, Transport,
};

use crate::read_login;
use crate::tcp_transport::TcpTransport;

pub struct WatchOptions {
    pub login: PathBuf,
    pub server: Option<String>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Send(String),
    Status,
    Logout,
}

enum LoopInput {
    Inbound(TaggedEvent),
    Console(ConsoleCommand),
}

pub fn run(options: WatchOptions) -> Result<(), String> {
    let config = load_config(options.config).map_err(String::from)?;
    let address = options
        .server
        .unwrap_or_else(|| config.server.address.clone());
    let exchange = read_login(&options.login)?;

    let (tx, rx) = mpsc::channel::<LoopInput>();
    let inbound_tx = tx.clone();
    let inbox: EventInbox =
        Arc::new(move |event| inbound_tx.send(LoopInput::Inbound(event)).is_ok());

    info!(address = %address, "Starting watch");
    let transport = TcpTransport::new(address, config.server.connect_timeout());
    let mut monitor = Monitor::new(
        transport,
        MemoryCredentialStore::new(),
        config.sync_options(),
        inbox,
    );
    monitor.login(exchange).map_err(String::from)?;
    spawn_console_reader(tx)?;

    let mut backoff = ReconnectBackoff::new(&config.reconnect);
    let mut reconnect_at = if monitor.has_connection() {
        None
    } else {
        schedule_reconnect(&config.reconnect, &mut backoff)
    };
    print_snapshot(&monitor)?;

    loop {
        let input = match reconnect_at {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(input) => Some(input),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(input) => Some(input),
                Err(_) => break,
            },
        };

        let Some(input) = input else {
            reconnect_at = None;
            match monitor.reconnect() {
                Ok(connection) => info!(%connection, "Reconnect attempt started"),
                Err(err) => {
                    warn!(error = %err, "Reconnect failed");
                    reconnect_at = schedule_reconnect(&config.reconnect, &mut backoff);
                }
            }
            continue;
        };

        match input {
            LoopInput::Inbound(event) => {
                let disposition = monitor.handle_event(event);
                match &disposition {
                    EventDisposition::Routed(RouteOutcome::Health(true)) => {
                        backoff.reset();
                        reconnect_at = None;
                    }
                    EventDisposition::Routed(RouteOutcome::Health(false)) => {
                        reconnect_at = schedule_reconnect(&config.reconnect, &mut backoff);
                    }
                    _ => {}
                }
                if disposition.changed_view() {
                    print_snapshot(&monitor)?;
                }
            }
            LoopInput::Console(ConsoleCommand::Send(text)) => {
                let mut fields = Map::new();
                fields.insert("text".to_string(), Value::String(text));
                match monitor.send(fields) {
                    Ok(_) => print_snapshot(&monitor)?,
                    Err(MonitorError::NotConnected) => {
                        eprintln!("teamwatch: not connected; message not sent")
                    }
                    Err(err) => eprintln!("teamwatch: message not sent: {}", err),
                }
            }
            LoopInput::Console(ConsoleCommand::Status) => print_snapshot(&monitor)?,
            LoopInput::Console(ConsoleCommand::Logout) => {
                monitor.logout();
                info!("Logged out");
                break;
            }
        }
    }

    Ok(())
}

fn schedule_reconnect(
    config: &ReconnectConfig,
    backoff: &mut ReconnectBackoff,
) -> Option<Instant> {
    if !config.enabled {
        return None;
    }
    let delay = backoff.next_delay(Utc::now());
    info!(
        delay_ms = delay.as_millis() as u64,
        attempts = backoff.attempts_in_window(),
        "Reconnect scheduled"
    );
    Some(Instant::now() + delay)
}

fn spawn_console_reader(tx: mpsc::Sender<LoopInput>) -> Result<(), String> {
    thread::Builder::new()
        .name("teamwatch-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "Console read failed");
                        break;
                    }
                };
                let Some(command) = parse_command(&line) else {
                    continue;
                };
                if tx.send(LoopInput::Console(command)).is_err() {
                    break;
                }
            }
        })
        .map(|_| ())
        .map_err(|err| format!("Failed to spawn console reader: {}", err))
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let trimmed = line.trim();
    match trimmed {
        "" => None,
        "/status" => Some(ConsoleCommand::Status),
        "/logout" | "/quit" => Some(ConsoleCommand::Logout),
        other if other.starts_with('/') => {
            eprintln!("teamwatch: unknown command {}", other);
            None
        }
        text => Some(ConsoleCommand::Send(text.to_string())),
    }
}

fn print_snapshot<T: Transport>(monitor: &Monitor<T>) -> Result<(), String> {
    let line = serde_json::to_string(&monitor.snapshot())
        .map_err(|err| format!("Failed to serialize snapshot: {}", err))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", line)
        .and_then(|_| out.flush())
        .map_err(|err| format!("Failed to write snapshot: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_lines_map_to_commands() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("/status"), Some(ConsoleCommand::Status));
        assert_eq!(parse_command("/logout"), Some(ConsoleCommand::Logout));
        assert_eq!(parse_command("/nope"), None);
        assert_eq!(
            parse_command("  on my way "),
            Some(ConsoleCommand::Send("on my way".to_string()))
        );
    }

    #[test]
    fn disabled_reconnect_never_schedules() {
        let config = ReconnectConfig {
            enabled: false,
            ..ReconnectConfig::default()
        };
        let mut backoff = ReconnectBackoff::new(&config);
        assert!(schedule_reconnect(&config, &mut backoff).is_none());
        assert_eq!(backoff.attempts_in_window(), 0);
    }
}
