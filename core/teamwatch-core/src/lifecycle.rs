//! Connection lifecycle manager.
//!
//! Owns the single logical connection of the active session and the
//! connection-health flag. Health turns true only on the transport's
//! `connect` signal and false on `disconnect` or teardown.
//!
//! Every established connection gets a fresh `ConnectionId`; events tagged
//! with any other id are not current and must not touch session state.

use tracing::{debug, info, warn};

use teamwatch_protocol::Frame;

use crate::error::TransportError;
use crate::transport::{ConnectRequest, Connection, EventInbox, EventSink, Transport};
use crate::types::ConnectionId;

struct ActiveConnection {
    id: ConnectionId,
    handle: Box<dyn Connection>,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    inbox: EventInbox,
    next_id: u64,
    session_key: Option<String>,
    active: Option<ActiveConnection>,
    healthy: bool,
    last_error: Option<String>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, inbox: EventInbox) -> Self {
        Self {
            transport,
            inbox,
            next_id: 1,
            session_key: None,
            active: None,
            healthy: false,
            last_error: None,
        }
    }

    /// Establishes a connection scoped to `session_key`.
    ///
    /// Re-entering with the same key while a connection exists is a no-op;
    /// a different key tears the old connection down first.
    pub fn enter_session(
        &mut self,
        session_key: &str,
        token: Option<&str>,
    ) -> Result<ConnectionId, TransportError> {
        if self.session_key.as_deref() == Some(session_key) {
            if let Some(active) = &self.active {
                debug!(connection = %active.id, session_key, "Session already active");
                return Ok(active.id);
            }
        } else if self.session_key.is_some() {
            self.leave_session();
        }

        self.session_key = Some(session_key.to_string());
        self.establish(session_key, token)
    }

    /// Replaces the current connection with a fresh one for the same session.
    pub fn reconnect(&mut self, token: Option<&str>) -> Result<ConnectionId, TransportError> {
        let session_key = self
            .session_key
            .clone()
            .ok_or_else(|| TransportError::new("no session to reconnect"))?;
        self.drop_connection();
        self.establish(&session_key, token)
    }

    /// Tears down unconditionally. Safe with no connection.
    pub fn leave_session(&mut self) {
        self.drop_connection();
        if let Some(session_key) = self.session_key.take() {
            info!(session_key = %session_key, "Left session");
        }
        self.last_error = None;
    }

    fn establish(
        &mut self,
        session_key: &str,
        token: Option<&str>,
    ) -> Result<ConnectionId, TransportError> {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let sink = EventSink::new(id, self.inbox.clone());
        let request = ConnectRequest { session_key, token };
        match self.transport.connect(request, sink) {
            Ok(handle) => {
                info!(connection = %id, session_key, "Connection established");
                self.active = Some(ActiveConnection { id, handle });
                self.last_error = None;
                Ok(id)
            }
            Err(err) => {
                warn!(connection = %id, session_key, error = %err, "Connection failed");
                self.last_error = Some(err.message.clone());
                Err(err)
            }
        }
    }

    fn drop_connection(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.close();
            debug!(connection = %active.id, "Connection closed");
        }
        self.healthy = false;
    }

    pub fn is_current(&self, id: ConnectionId) -> bool {
        self.active.as_ref().map(|active| active.id == id).unwrap_or(false)
    }

    pub fn mark_connected(&mut self) {
        self.healthy = true;
    }

    pub fn mark_disconnected(&mut self) {
        self.healthy = false;
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.active.as_ref().map(|active| active.id)
    }

    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Emits on the current connection, whatever its health.
    pub fn emit(&mut self, frame: &Frame) -> Result<(), TransportError> {
        match self.active.as_mut() {
            Some(active) => active.handle.emit(frame),
            None => Err(TransportError::new("no active connection")),
        }
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.drop_connection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::transport::channel_inbox;
    use std::sync::mpsc;

    fn manager() -> (ConnectionManager<FakeTransport>, FakeTransport) {
        let transport = FakeTransport::default();
        let (tx, _rx) = mpsc::channel();
        (
            ConnectionManager::new(transport.clone(), channel_inbox(tx)),
            transport,
        )
    }

    #[test]
    fn health_starts_false_until_connect_signal() {
        let (mut manager, transport) = manager();
        let id = manager.enter_session("S1", Some("tok")).expect("connect");

        assert!(!manager.is_healthy());
        assert!(manager.is_current(id));
        assert_eq!(
            transport.connects(),
            vec![("S1".to_string(), Some("tok".to_string()))]
        );

        manager.mark_connected();
        assert!(manager.is_healthy());
    }

    #[test]
    fn leave_session_is_safe_without_connection() {
        let (mut manager, _transport) = manager();
        manager.leave_session();
        manager.leave_session();
        assert!(!manager.is_healthy());
        assert!(manager.current_connection().is_none());
    }

    #[test]
    fn leave_session_closes_and_resets_health() {
        let (mut manager, transport) = manager();
        let id = manager.enter_session("S1", None).expect("connect");
        manager.mark_connected();

        manager.leave_session();
        assert!(!manager.is_healthy());
        assert!(!manager.is_current(id));
        assert_eq!(transport.closed(), vec![id]);
        assert!(manager.session_key().is_none());
    }

    #[test]
    fn reentering_same_identity_keeps_connection() {
        let (mut manager, transport) = manager();
        let first = manager.enter_session("S1", None).expect("connect");
        let second = manager.enter_session("S1", None).expect("connect");

        assert_eq!(first, second);
        assert_eq!(transport.connects().len(), 1);
        assert!(transport.closed().is_empty());
    }

    #[test]
    fn reentering_different_identity_tears_down_first() {
        let (mut manager, transport) = manager();
        let first = manager.enter_session("S1", None).expect("connect");
        manager.mark_connected();
        let second = manager.enter_session("S2", None).expect("connect");

        assert_ne!(first, second);
        assert_eq!(transport.closed(), vec![first]);
        assert!(!manager.is_current(first));
        assert!(manager.is_current(second));
        assert!(!manager.is_healthy());
        assert_eq!(manager.session_key(), Some("S2"));
    }

    #[test]
    fn failed_connect_keeps_session_key_for_reconnect() {
        let (mut manager, transport) = manager();
        transport.set_fail_connect(true);

        let err = manager.enter_session("S1", None).expect_err("refused");
        assert_eq!(manager.last_error(), Some(err.message.as_str()));
        assert!(manager.current_connection().is_none());
        assert!(!manager.is_healthy());

        transport.set_fail_connect(false);
        let id = manager.reconnect(None).expect("reconnect");
        assert!(manager.is_current(id));
        assert!(manager.last_error().is_none());
    }

    #[test]
    fn reconnect_issues_new_connection_id() {
        let (mut manager, transport) = manager();
        let first = manager.enter_session("S1", None).expect("connect");
        let second = manager.reconnect(None).expect("reconnect");

        assert_ne!(first, second);
        assert!(!manager.is_current(first));
        assert_eq!(transport.closed(), vec![first]);
    }

    #[test]
    fn emit_without_connection_fails() {
        let (mut manager, _transport) = manager();
        let frame = Frame::new("send_message", serde_json::json!({}));
        assert!(manager.emit(&frame).is_err());
    }
}
