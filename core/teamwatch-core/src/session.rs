//! The state owned by one login: supervisor identity, roster, message log.
//!
//! A `Session` is created on login and dropped on logout. Nothing outside the
//! owning `Monitor` holds a reference to it.

use serde::Serialize;

use teamwatch_protocol::LoginExchange;

use crate::config::SyncOptions;
use crate::message_log::MessageLog;
use crate::roster::{Roster, RosterUpdate};
use crate::types::SupervisorContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub unknown_agent_events: u64,
    pub stale_events: u64,
    /// Events that arrived for a connection that is no longer current.
    pub discarded_events: u64,
    pub evicted_messages: u64,
}

impl SyncStats {
    pub fn record(&mut self, update: &RosterUpdate) {
        match update {
            RosterUpdate::Applied(_) => {}
            RosterUpdate::UnknownAgent => self.unknown_agent_events += 1,
            RosterUpdate::Stale => self.stale_events += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub supervisor: SupervisorContext,
    pub roster: Roster,
    pub messages: MessageLog,
    pub stats: SyncStats,
}

impl Session {
    pub fn start(exchange: &LoginExchange, options: SyncOptions) -> Self {
        let mut roster = Roster::new(options.staleness);
        roster.seed(exchange.team_data.clone());

        Self {
            supervisor: SupervisorContext::from(&exchange.user),
            roster,
            messages: MessageLog::new(options.message_log_capacity),
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            evicted_messages: self.messages.evicted(),
            ..self.stats
        }
    }
}
