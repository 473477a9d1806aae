//! Session-scoped records shared across the core.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use teamwatch_protocol::{AgentStatus, LoginUser, TeamMember};

/// Identity of the logged-in supervisor. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorContext {
    pub supervisor_code: String,
    pub name: String,
    pub team_id: String,
    pub team_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&LoginUser> for SupervisorContext {
    fn from(user: &LoginUser) -> Self {
        Self {
            supervisor_code: user.agent_code.clone(),
            name: user.agent_name.clone(),
            team_id: user.team_id.clone(),
            team_name: user.team_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Profile keys owned by the reducers; seeded values for these are dropped.
const MANAGED_FIELDS: [&str; 4] = ["isOnline", "currentStatus", "lastUpdate", "lastSeen"];

/// One team member as seen by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_code: String,
    pub agent_name: String,
    pub is_online: bool,
    pub current_status: AgentStatus,
    pub last_update: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    /// Extra fields from the login exchange, carried for display.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl AgentRecord {
    /// Every member starts offline until the server says otherwise.
    pub fn seeded(member: TeamMember) -> Self {
        let mut profile = member.profile;
        for key in MANAGED_FIELDS {
            profile.remove(key);
        }
        Self {
            agent_code: member.agent_code,
            agent_name: member.agent_name,
            is_online: false,
            current_status: AgentStatus::Offline,
            last_update: None,
            last_seen: None,
            profile,
        }
    }
}

/// Identifies one established connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
