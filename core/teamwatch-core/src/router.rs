//! Event ingestion router.
//!
//! A total match over `InboundEvent`: transport signals go to the lifecycle
//! manager, presence and status events to the roster, messages to the log.
//! Each event is handled on its own; there is no buffering or ordering across
//! kinds.

use tracing::{debug, info};

use teamwatch_protocol::InboundEvent;

use crate::lifecycle::ConnectionManager;
use crate::roster::RosterUpdate;
use crate::session::Session;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Health(bool),
    Roster(RosterUpdate),
    MessageAppended,
}

pub fn route<T: Transport>(
    session: &mut Session,
    connection: &mut ConnectionManager<T>,
    event: InboundEvent,
) -> RouteOutcome {
    match event {
        InboundEvent::Connect => {
            connection.mark_connected();
            info!(
                supervisor_code = %session.supervisor.supervisor_code,
                "Connected"
            );
            RouteOutcome::Health(true)
        }
        InboundEvent::Disconnect => {
            connection.mark_disconnected();
            info!(
                supervisor_code = %session.supervisor.supervisor_code,
                "Disconnected"
            );
            RouteOutcome::Health(false)
        }
        InboundEvent::AgentStatusUpdate(update) => {
            let outcome = session.roster.apply_status_update(&update);
            trace_roster("agent_status_update", &update.agent_code, &outcome);
            session.stats.record(&outcome);
            RouteOutcome::Roster(outcome)
        }
        InboundEvent::AgentConnected(change) => {
            let outcome = session.roster.apply_connected(&change);
            trace_roster("agent_connected", &change.agent_code, &outcome);
            session.stats.record(&outcome);
            RouteOutcome::Roster(outcome)
        }
        InboundEvent::AgentDisconnected(change) => {
            let outcome = session.roster.apply_disconnected(&change);
            trace_roster("agent_disconnected", &change.agent_code, &outcome);
            session.stats.record(&outcome);
            RouteOutcome::Roster(outcome)
        }
        InboundEvent::NewMessage(message) => {
            debug!(from_code = ?message.from_code(), "New message");
            session.messages.append_inbound(message);
            RouteOutcome::MessageAppended
        }
    }
}

fn trace_roster(event: &str, agent_code: &str, outcome: &RosterUpdate) {
    match outcome {
        RosterUpdate::Applied(record) => debug!(
            event,
            agent_code,
            is_online = record.is_online,
            status = record.current_status.as_str(),
            "Roster updated"
        ),
        RosterUpdate::UnknownAgent => {
            debug!(event, agent_code, "Ignoring event for unknown agent")
        }
        RosterUpdate::Stale => debug!(event, agent_code, "Ignoring stale event"),
    }
}
