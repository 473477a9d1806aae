//! In-memory transport for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use teamwatch_protocol::Frame;

use crate::error::TransportError;
use crate::transport::{ConnectRequest, Connection, EventSink, Transport};
use crate::types::ConnectionId;

#[derive(Default)]
struct Recorded {
    connects: Vec<(String, Option<String>)>,
    sinks: Vec<EventSink>,
    emitted: Vec<(ConnectionId, Frame)>,
    closed: Vec<ConnectionId>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    recorded: Arc<Mutex<Recorded>>,
    fail_connect: Arc<AtomicBool>,
    fail_emit: Arc<AtomicBool>,
}

impl FakeTransport {
    pub(crate) fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_emit(&self, fail: bool) {
        self.fail_emit.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn connects(&self) -> Vec<(String, Option<String>)> {
        self.recorded.lock().unwrap().connects.clone()
    }

    pub(crate) fn last_sink(&self) -> EventSink {
        self.recorded
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no connection established")
    }

    pub(crate) fn emitted(&self) -> Vec<(ConnectionId, Frame)> {
        self.recorded.lock().unwrap().emitted.clone()
    }

    pub(crate) fn closed(&self) -> Vec<ConnectionId> {
        self.recorded.lock().unwrap().closed.clone()
    }
}

impl Transport for FakeTransport {
    fn connect(
        &mut self,
        request: ConnectRequest<'_>,
        sink: EventSink,
    ) -> Result<Box<dyn Connection>, TransportError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::new("connection refused"));
        }
        let id = sink.connection();
        let mut recorded = self.recorded.lock().unwrap();
        recorded.connects.push((
            request.session_key.to_string(),
            request.token.map(str::to_string),
        ));
        recorded.sinks.push(sink);
        Ok(Box::new(FakeConnection {
            id,
            recorded: Arc::clone(&self.recorded),
            fail_emit: Arc::clone(&self.fail_emit),
            closed: false,
        }))
    }
}

struct FakeConnection {
    id: ConnectionId,
    recorded: Arc<Mutex<Recorded>>,
    fail_emit: Arc<AtomicBool>,
    closed: bool,
}

impl Connection for FakeConnection {
    fn emit(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(TransportError::new("broken pipe"));
        }
        self.recorded
            .lock()
            .unwrap()
            .emitted
            .push((self.id, frame.clone()));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.recorded.lock().unwrap().closed.push(self.id);
        }
    }
}
