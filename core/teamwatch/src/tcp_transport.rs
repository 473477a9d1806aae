//! Newline-delimited JSON transport over TCP.
//!
//! One socket per logical connection. A reader thread tags every parsed line
//! with the connection id and pushes it into the monitor's inbox; writes happen
//! on the caller's thread through the returned `Connection`.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use teamwatch_core::protocol::{
    encode_frame, parse_frame, Frame, InboundEvent, JoinRequest, MAX_FRAME_BYTES,
};
use teamwatch_core::{ConnectRequest, Connection, EventSink, Transport, TransportError};

const WRITE_TIMEOUT_MS: u64 = 2000;

pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

impl Transport for TcpTransport {
    fn connect(
        &mut self,
        request: ConnectRequest<'_>,
        sink: EventSink,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let mut stream = open_stream(&self.address, self.connect_timeout)?;
        prepare_stream(&stream)?;

        let join = JoinRequest::new(request.session_key, request.token).to_frame();
        write_frame(&mut stream, &join)?;

        let reader = stream
            .try_clone()
            .map_err(|err| TransportError::new(format!("Failed to clone socket: {}", err)))?;
        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = Arc::clone(&closed);
        let connection = sink.connection();
        thread::Builder::new()
            .name(format!("teamwatch-{}", connection))
            .spawn(move || read_loop(reader, sink, reader_closed))
            .map_err(|err| {
                TransportError::new(format!("Failed to spawn reader thread: {}", err))
            })?;

        debug!(address = %self.address, %connection, "Socket connected");
        Ok(Box::new(TcpConnection { stream, closed }))
    }
}

struct TcpConnection {
    stream: TcpStream,
    closed: Arc<AtomicBool>,
}

impl Connection for TcpConnection {
    fn emit(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::new("Connection is closed"));
        }
        write_frame(&mut self.stream, frame)
    }

    fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_stream(address: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|err| TransportError::new(format!("Failed to resolve {}: {}", address, err)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }

    Err(TransportError::new(match last_error {
        Some(err) => format!("Failed to connect to {}: {}", address, err),
        None => format!("No addresses resolved for {}", address),
    }))
}

/// A write timeout is required so `emit` can never block the caller forever.
fn prepare_stream(stream: &TcpStream) -> Result<(), TransportError> {
    if let Err(err) = stream.set_nodelay(true) {
        debug!(error = %err, "Failed to disable Nagle on socket");
    }
    stream
        .set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)))
        .map_err(|err| TransportError::new(format!("Failed to set write timeout: {}", err)))?;
    Ok(())
}

fn write_frame(stream: &mut TcpStream, frame: &Frame) -> Result<(), TransportError> {
    let bytes = encode_frame(frame)?;
    stream
        .write_all(&bytes)
        .map_err(|err| TransportError::new(format!("Failed to write frame: {}", err)))?;
    stream
        .flush()
        .map_err(|err| TransportError::new(format!("Failed to flush frame: {}", err)))
}

fn read_loop(stream: TcpStream, sink: EventSink, closed: Arc<AtomicBool>) {
    if !sink.deliver(InboundEvent::Connect) {
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let limit = MAX_FRAME_BYTES as u64 + 1;

    loop {
        line.clear();
        match reader.by_ref().take(limit).read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                if line.len() > MAX_FRAME_BYTES && line.last() != Some(&b'\n') {
                    warn!(
                        connection = %sink.connection(),
                        "Frame exceeded maximum size; dropping connection"
                    );
                    break;
                }

                let frame = trim_line(&line);
                if frame.is_empty() {
                    continue;
                }
                match parse_frame(frame) {
                    Ok(Some(event)) => {
                        if !sink.deliver(event) {
                            return;
                        }
                    }
                    Ok(None) => debug!("Ignoring unhandled event"),
                    Err(err) => {
                        warn!(code = %err.code, message = %err.message, "Rejected inbound frame")
                    }
                }
            }
            Err(err) => {
                if !closed.load(Ordering::SeqCst) {
                    warn!(error = %err, "Socket read failed");
                }
                break;
            }
        }
    }

    if !closed.load(Ordering::SeqCst) {
        sink.deliver(InboundEvent::Disconnect);
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}
