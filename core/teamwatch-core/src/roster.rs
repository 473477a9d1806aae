//! Roster state reducer.
//!
//! Holds one `AgentRecord` per team member and folds presence and status
//! events into it. The reducers are pure over a single record; `Roster` looks
//! the record up and writes the result back.
//!
//! ```text
//! agent_status_update  → currentStatus, lastUpdate
//! agent_connected      → isOnline = true,  lastSeen
//! agent_disconnected   → isOnline = false, lastSeen
//! unknown agentCode    → no-op (never creates a record)
//! ```
//!
//! Only `seed` adds or removes keys.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use teamwatch_protocol::{validate_agent_code, PresenceChange, StatusUpdate, TeamMember};

use crate::types::AgentRecord;

/// How to treat an event whose timestamp is older than what is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Apply events in arrival order, even when a late event regresses state.
    #[default]
    LastReceivedWins,
    /// Skip events older than the stored timestamp for the same field pair.
    RejectOlder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RosterUpdate {
    Applied(AgentRecord),
    UnknownAgent,
    Stale,
}

pub fn reduce_status(
    current: Option<&AgentRecord>,
    update: &StatusUpdate,
    policy: StalenessPolicy,
) -> RosterUpdate {
    let Some(record) = current else {
        return RosterUpdate::UnknownAgent;
    };
    if is_stale(record.last_update, update.timestamp, policy) {
        return RosterUpdate::Stale;
    }

    let mut next = record.clone();
    next.current_status = update.status.clone();
    next.last_update = Some(update.timestamp);
    RosterUpdate::Applied(next)
}

pub fn reduce_presence(
    current: Option<&AgentRecord>,
    change: &PresenceChange,
    online: bool,
    policy: StalenessPolicy,
) -> RosterUpdate {
    let Some(record) = current else {
        return RosterUpdate::UnknownAgent;
    };
    if is_stale(record.last_seen, change.timestamp, policy) {
        return RosterUpdate::Stale;
    }

    let mut next = record.clone();
    next.is_online = online;
    next.last_seen = Some(change.timestamp);
    RosterUpdate::Applied(next)
}

fn is_stale(stored: Option<DateTime<Utc>>, incoming: DateTime<Utc>, policy: StalenessPolicy) -> bool {
    match policy {
        StalenessPolicy::LastReceivedWins => false,
        StalenessPolicy::RejectOlder => stored.map(|ts| incoming < ts).unwrap_or(false),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<AgentRecord>,
    index: HashMap<String, usize>,
    policy: StalenessPolicy,
}

impl Roster {
    pub fn new(policy: StalenessPolicy) -> Self {
        Self {
            agents: Vec::new(),
            index: HashMap::new(),
            policy,
        }
    }

    /// Replaces the whole set. Members without a usable code are skipped;
    /// duplicate codes keep their first occurrence.
    pub fn seed(&mut self, members: Vec<TeamMember>) -> usize {
        self.agents.clear();
        self.index.clear();

        for member in members {
            if let Err(err) = validate_agent_code(&member.agent_code, "teamData.agentCode") {
                warn!(
                    agent_name = %member.agent_name,
                    code = %err.code,
                    "Skipping team member without a usable agent code"
                );
                continue;
            }
            if self.index.contains_key(&member.agent_code) {
                warn!(agent_code = %member.agent_code, "Duplicate agent in team data; keeping first");
                continue;
            }
            self.index
                .insert(member.agent_code.clone(), self.agents.len());
            self.agents.push(AgentRecord::seeded(member));
        }

        self.agents.len()
    }

    pub fn apply_status_update(&mut self, update: &StatusUpdate) -> RosterUpdate {
        let position = self.index.get(&update.agent_code).copied();
        let current = position.map(|index| &self.agents[index]);
        let outcome = reduce_status(current, update, self.policy);
        self.commit(position, outcome)
    }

    pub fn apply_connected(&mut self, change: &PresenceChange) -> RosterUpdate {
        self.apply_presence(change, true)
    }

    pub fn apply_disconnected(&mut self, change: &PresenceChange) -> RosterUpdate {
        self.apply_presence(change, false)
    }

    fn apply_presence(&mut self, change: &PresenceChange, online: bool) -> RosterUpdate {
        let position = self.index.get(&change.agent_code).copied();
        let current = position.map(|index| &self.agents[index]);
        let outcome = reduce_presence(current, change, online, self.policy);
        self.commit(position, outcome)
    }

    fn commit(&mut self, position: Option<usize>, outcome: RosterUpdate) -> RosterUpdate {
        if let (Some(index), RosterUpdate::Applied(record)) = (position, &outcome) {
            self.agents[index] = record.clone();
        }
        outcome
    }

    pub fn get(&self, agent_code: &str) -> Option<&AgentRecord> {
        self.index.get(agent_code).map(|index| &self.agents[*index])
    }

    /// Records in seed order.
    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.agents.iter().filter(|agent| agent.is_online).count()
    }

    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }
}
