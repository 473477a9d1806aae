//! Offline replay of a recorded event stream.
//!
//! The recorded frames are fed through the same parse, guard and reduce path a
//! live connection uses. The only difference is the transport.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use tracing::{info, warn};

use teamwatch_core::protocol::{parse_frame, Frame, InboundEvent, LoginExchange};
use teamwatch_core::{
    channel_inbox, load_config, ConnectRequest, Connection, EventSink, MemoryCredentialStore,
    Monitor, MonitorConfig, MonitorSnapshot, Transport, TransportError,
};

use crate::read_login;

/// Delivers a fixed event list on the first connect: `connect`, the recorded
/// events, then `disconnect`.
struct ReplayTransport {
    events: Vec<InboundEvent>,
}

struct ReplayConnection;

impl Connection for ReplayConnection {
    fn emit(&mut self, _frame: &Frame) -> Result<(), TransportError> {
        Err(TransportError::new("Replay connections are read-only"))
    }

    fn close(&mut self) {}
}

impl Transport for ReplayTransport {
    fn connect(
        &mut self,
        _request: ConnectRequest<'_>,
        sink: EventSink,
    ) -> Result<Box<dyn Connection>, TransportError> {
        sink.deliver(InboundEvent::Connect);
        for event in std::mem::take(&mut self.events) {
            sink.deliver(event);
        }
        sink.deliver(InboundEvent::Disconnect);
        Ok(Box::new(ReplayConnection))
    }
}

pub fn run(login: &Path, events: &Path, config: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(config).map_err(String::from)?;
    let exchange = read_login(login)?;
    let events = read_events(events)?;
    let snapshot = replay(exchange, events, &config)?;

    let rendered = serde_json::to_string_pretty(&snapshot)
        .map_err(|err| format!("Failed to serialize snapshot: {}", err))?;
    println!("{}", rendered);
    Ok(())
}

fn replay(
    exchange: LoginExchange,
    events: Vec<InboundEvent>,
    config: &MonitorConfig,
) -> Result<MonitorSnapshot, String> {
    let (tx, rx) = mpsc::channel();
    let mut monitor = Monitor::new(
        ReplayTransport { events },
        MemoryCredentialStore::new(),
        config.sync_options(),
        channel_inbox(tx),
    );
    monitor.login(exchange).map_err(String::from)?;

    let mut routed = 0usize;
    while let Ok(event) = rx.try_recv() {
        monitor.handle_event(event);
        routed += 1;
    }
    info!(events = routed, "Replay complete");
    Ok(monitor.snapshot())
}

/// Reads one frame per line. Malformed frames are logged and skipped.
fn read_events(path: &Path) -> Result<Vec<InboundEvent>, String> {
    let content = fs_err::read_to_string(path)
        .map_err(|err| format!("Failed to read events file: {}", err))?;

    let mut events = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_frame(line.as_bytes()) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(err) => warn!(
                line = index + 1,
                code = %err.code,
                message = %err.message,
                "Skipping malformed frame"
            ),
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use teamwatch_core::protocol::{parse_login, AgentStatus};

    #[test]
    fn replay_applies_recorded_events() {
        let exchange = parse_login(json!({
            "user": {"agentCode": "S1", "agentName": "Sam"},
            "teamData": [{"agentCode": "A1", "agentName": "Alice"}],
            "token": "tok"
        }))
        .expect("login");
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("events.jsonl");
        fs_err::write(
            &path,
            concat!(
                "{\"event\":\"agent_connected\",\"data\":{\"agentCode\":\"A1\",\"timestamp\":\"2026-02-01T09:00:00Z\"}}\n",
                "garbage\n",
                "\n",
                "{\"event\":\"typing\",\"data\":{}}\n",
                "{\"event\":\"agent_status_update\",\"data\":{\"agentCode\":\"A1\",\"status\":\"Busy\",\"timestamp\":\"2026-02-01T09:01:00Z\"}}\n",
            ),
        )
        .expect("write events");

        let events = read_events(&path).expect("read events");
        assert_eq!(events.len(), 2);

        let snapshot = replay(exchange, events, &MonitorConfig::default()).expect("replay");
        assert!(!snapshot.connected);
        assert!(snapshot.agents[0].is_online);
        assert_eq!(snapshot.agents[0].current_status, AgentStatus::Busy);
    }
}
