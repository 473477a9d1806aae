//! Transport capability consumed by the core.
//!
//! A transport establishes one logical connection per call to `connect`,
//! pushes inbound events into the supplied `EventSink`, and accepts outbound
//! frames through the returned `Connection`. The core never reconnects on its
//! own; see `reconnect::ReconnectBackoff` for the caller-side policy.

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;

use teamwatch_protocol::{Frame, InboundEvent};

use crate::error::TransportError;
use crate::types::ConnectionId;

/// An inbound event stamped with the connection that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub connection: ConnectionId,
    pub event: InboundEvent,
}

/// Destination for tagged events. Returns `false` once the receiver is gone.
pub type EventInbox = Arc<dyn Fn(TaggedEvent) -> bool + Send + Sync>;

pub fn channel_inbox(sender: mpsc::Sender<TaggedEvent>) -> EventInbox {
    Arc::new(move |event| sender.send(event).is_ok())
}

/// Handed to a transport on connect; tags everything it delivers.
#[derive(Clone)]
pub struct EventSink {
    connection: ConnectionId,
    inbox: EventInbox,
}

impl EventSink {
    pub fn new(connection: ConnectionId, inbox: EventInbox) -> Self {
        Self { connection, inbox }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn deliver(&self, event: InboundEvent) -> bool {
        (self.inbox)(TaggedEvent {
            connection: self.connection,
            event,
        })
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest<'a> {
    /// The supervisor code the connection is scoped to.
    pub session_key: &'a str,
    pub token: Option<&'a str>,
}

pub trait Connection: Send {
    fn emit(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Stops delivery and releases the connection. Must be safe to call twice.
    fn close(&mut self);
}

pub trait Transport {
    fn connect(
        &mut self,
        request: ConnectRequest<'_>,
        sink: EventSink,
    ) -> Result<Box<dyn Connection>, TransportError>;
}
