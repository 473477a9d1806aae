//! # teamwatch-core
//!
//! Realtime synchronization core for the teamwatch supervisor client. It keeps
//! a live view of a team's agents and an ordered message log, driven by
//! server-pushed events over a single logical connection.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Transports push tagged
//!   events into an inbox; the caller drains it on one thread.
//! - **Single owner**: `Monitor` owns the only `Session`; nothing else holds
//!   roster or log state.
//! - **Current connection only**: events from a torn-down or replaced
//!   connection are discarded before they reach a reducer.
//! - **Absorb, don't fail**: unknown agents and stale events are counted and
//!   logged; only sends surface errors to the caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use teamwatch_core::{channel_inbox, MemoryCredentialStore, Monitor, SyncOptions};
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let mut monitor = Monitor::new(transport, MemoryCredentialStore::new(), SyncOptions::default(), channel_inbox(tx));
//! monitor.login(exchange)?;
//! for event in rx {
//!     monitor.handle_event(event);
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod message_log;
pub mod monitor;
pub mod reconnect;
pub mod roster;
pub mod router;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{load_config, MonitorConfig, ReconnectConfig, ServerConfig, SyncConfig, SyncOptions};
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use error::{MonitorError, Result, TransportError};
pub use lifecycle::ConnectionManager;
pub use message_log::MessageLog;
pub use monitor::{DiscardReason, EventDisposition, Monitor, MonitorSnapshot};
pub use reconnect::ReconnectBackoff;
pub use roster::{Roster, RosterUpdate, StalenessPolicy};
pub use router::RouteOutcome;
pub use session::{Session, SyncStats};
pub use transport::{
    channel_inbox, ConnectRequest, Connection, EventInbox, EventSink, TaggedEvent, Transport,
};
pub use types::{AgentRecord, ConnectionId, SupervisorContext};

pub use teamwatch_protocol as protocol;
