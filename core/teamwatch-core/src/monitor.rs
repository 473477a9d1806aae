//! The session controller.
//!
//! `Monitor` is the only owner of session state. It builds a `Session` on
//! login, drives the connection lifecycle, filters inbound events down to the
//! current connection, and routes them. Everything runs on the caller's
//! thread; transports only push tagged events into the inbox.
//!
//! ```rust,ignore
//! let (tx, rx) = std::sync::mpsc::channel();
//! let mut monitor = Monitor::new(transport, MemoryCredentialStore::new(), options, channel_inbox(tx));
//! monitor.login(exchange)?;
//! while let Ok(event) = rx.recv() {
//!     monitor.handle_event(event);
//! }
//! ```

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use teamwatch_protocol::{LoginExchange, MessageRecord};

use crate::config::SyncOptions;
use crate::credentials::CredentialStore;
use crate::dispatcher;
use crate::error::{MonitorError, Result};
use crate::lifecycle::ConnectionManager;
use crate::roster::RosterUpdate;
use crate::router::{self, RouteOutcome};
use crate::session::{Session, SyncStats};
use crate::transport::{EventInbox, TaggedEvent, Transport};
use crate::types::{AgentRecord, ConnectionId, SupervisorContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoSession,
    /// The event came from a connection that was torn down or replaced.
    StaleConnection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventDisposition {
    Routed(RouteOutcome),
    Discarded(DiscardReason),
}

impl EventDisposition {
    /// Whether the event changed anything a viewer would see.
    pub fn changed_view(&self) -> bool {
        match self {
            EventDisposition::Routed(RouteOutcome::Health(_)) => true,
            EventDisposition::Routed(RouteOutcome::MessageAppended) => true,
            EventDisposition::Routed(RouteOutcome::Roster(update)) => {
                matches!(update, RosterUpdate::Applied(_))
            }
            EventDisposition::Discarded(_) => false,
        }
    }
}

/// Read-only view for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub supervisor: Option<SupervisorContext>,
    pub connected: bool,
    pub agents: Vec<AgentRecord>,
    pub messages: Vec<MessageRecord>,
    pub stats: SyncStats,
}

pub struct Monitor<T: Transport> {
    connection: ConnectionManager<T>,
    credentials: Box<dyn CredentialStore>,
    session: Option<Session>,
    options: SyncOptions,
}

impl<T: Transport> Monitor<T> {
    pub fn new(
        transport: T,
        credentials: impl CredentialStore + 'static,
        options: SyncOptions,
        inbox: EventInbox,
    ) -> Self {
        Self {
            connection: ConnectionManager::new(transport, inbox),
            credentials: Box::new(credentials),
            session: None,
            options,
        }
    }

    /// Starts a session from a login exchange, tearing down any previous one.
    ///
    /// A connection failure does not fail the login: the session stays active
    /// with health false and can be reconnected.
    pub fn login(&mut self, exchange: LoginExchange) -> Result<()> {
        exchange
            .validate()
            .map_err(|err| MonitorError::InvalidLogin(err.to_string()))?;

        if self.session.is_some() {
            self.logout();
        }

        let session = Session::start(&exchange, self.options);
        info!(
            supervisor_code = %session.supervisor.supervisor_code,
            team_id = %session.supervisor.team_id,
            agents = session.roster.len(),
            "Session started"
        );
        let session_key = session.supervisor.supervisor_code.clone();
        self.session = Some(session);
        self.credentials.set_token(&exchange.token);

        if let Err(err) = self
            .connection
            .enter_session(&session_key, self.credentials.token())
        {
            warn!(error = %err, "Session started without a connection");
        }
        Ok(())
    }

    /// Tears down the connection and discards all session state.
    pub fn logout(&mut self) {
        self.connection.leave_session();
        self.credentials.clear();
        if let Some(session) = self.session.take() {
            info!(
                supervisor_code = %session.supervisor.supervisor_code,
                messages = session.messages.len(),
                "Session ended"
            );
        }
    }

    pub fn handle_event(&mut self, tagged: TaggedEvent) -> EventDisposition {
        let Some(session) = self.session.as_mut() else {
            debug!(
                connection = %tagged.connection,
                event = tagged.event.name(),
                "Discarding event without a session"
            );
            return EventDisposition::Discarded(DiscardReason::NoSession);
        };

        if !self.connection.is_current(tagged.connection) {
            session.stats.discarded_events += 1;
            debug!(
                connection = %tagged.connection,
                event = tagged.event.name(),
                "Discarding event from stale connection"
            );
            return EventDisposition::Discarded(DiscardReason::StaleConnection);
        }

        EventDisposition::Routed(router::route(
            session,
            &mut self.connection,
            tagged.event,
        ))
    }

    pub fn send(&mut self, fields: Map<String, Value>) -> Result<MessageRecord> {
        dispatcher::send(
            &mut self.connection,
            self.session.as_mut(),
            fields,
            Utc::now(),
        )
    }

    /// Replaces the session's connection. Events from the old one are
    /// discarded from here on.
    pub fn reconnect(&mut self) -> Result<ConnectionId> {
        if self.session.is_none() {
            return Err(MonitorError::NotConnected);
        }
        self.connection
            .reconnect(self.credentials.token())
            .map_err(MonitorError::from)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_healthy()
    }

    pub fn has_connection(&self) -> bool {
        self.connection.current_connection().is_some()
    }

    pub fn last_transport_error(&self) -> Option<&str> {
        self.connection.last_error()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        match &self.session {
            Some(session) => MonitorSnapshot {
                supervisor: Some(session.supervisor.clone()),
                connected: self.connection.is_healthy(),
                agents: session.roster.agents().to_vec(),
                messages: session.messages.iter().cloned().collect(),
                stats: session.stats(),
            },
            None => MonitorSnapshot {
                supervisor: None,
                connected: false,
                agents: Vec::new(),
                messages: Vec::new(),
                stats: SyncStats::default(),
            },
        }
    }
}
