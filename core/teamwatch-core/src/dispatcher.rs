//! Outbound dispatcher.
//!
//! Requires a healthy connection and a logged-in supervisor. Emits the
//! `send_message` frame first and appends to the local log only after the
//! transport accepted it. The two steps are not transactional: an accepted
//! emit may still be lost in flight.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use teamwatch_protocol::{send_message_frame, MessageRecord};

use crate::error::{MonitorError, Result};
use crate::lifecycle::ConnectionManager;
use crate::session::Session;
use crate::transport::Transport;

pub fn send<T: Transport>(
    connection: &mut ConnectionManager<T>,
    session: Option<&mut Session>,
    fields: Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<MessageRecord> {
    let session = match session {
        Some(session) if connection.is_healthy() => session,
        Some(_) => {
            warn!("Send rejected: connection is not healthy");
            return Err(MonitorError::NotConnected);
        }
        None => {
            warn!("Send rejected: no active session");
            return Err(MonitorError::NotConnected);
        }
    };

    let frame = send_message_frame(fields.clone(), &session.supervisor.supervisor_code);
    connection.emit(&frame).map_err(|err| {
        warn!(error = %err, "Failed to emit send_message");
        MonitorError::from(err)
    })?;

    let record = session
        .messages
        .append_outbound(fields, &session.supervisor, now);
    debug!(messages = session.messages.len(), "Outbound message appended");
    Ok(record)
}
