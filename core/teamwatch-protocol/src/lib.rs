//! Wire protocol types and validation for the teamwatch supervisor client.
//!
//! This crate is shared by the client and by test servers to prevent schema
//! drift. The server pushes one JSON frame per line; the client validates every
//! frame at the boundary so malformed input never reaches the reducers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_FRAME_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_AGENT_CODE_LEN: usize = 128;

pub mod events {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const AGENT_STATUS_UPDATE: &str = "agent_status_update";
    pub const AGENT_CONNECTED: &str = "agent_connected";
    pub const AGENT_DISCONNECTED: &str = "agent_disconnected";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const JOIN: &str = "join";
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// One line on the wire: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Frame {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentStatus {
    #[default]
    Offline,
    Available,
    Busy,
    Other(String),
}

impl AgentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AgentStatus::Offline => "Offline",
            AgentStatus::Available => "Available",
            AgentStatus::Busy => "Busy",
            AgentStatus::Other(value) => value.as_str(),
        }
    }
}

impl From<String> for AgentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Offline" => AgentStatus::Offline,
            "Available" => AgentStatus::Available,
            "Busy" => AgentStatus::Busy,
            _ => AgentStatus::Other(value),
        }
    }
}

impl From<&str> for AgentStatus {
    fn from(value: &str) -> Self {
        AgentStatus::from(value.to_string())
    }
}

impl From<AgentStatus> for String {
    fn from(status: AgentStatus) -> Self {
        match status {
            AgentStatus::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub agent_code: String,
    pub status: AgentStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub agent_code: String,
    pub timestamp: DateTime<Utc>,
}

/// A chat message, inbound or locally originated.
///
/// The payload is kept exactly as received so it re-serializes unchanged.
/// `fromCode`, `sender` and `timestamp` are read through accessors that
/// return `None` when the value does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRecord {
    pub fields: Map<String, Value>,
}

impl MessageRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_code(&self) -> Option<&str> {
        self.fields.get("fromCode").and_then(Value::as_str)
    }

    pub fn sender(&self) -> Option<&str> {
        self.fields.get("sender").and_then(Value::as_str)
    }

    /// The `timestamp` field when it is an RFC3339 string.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.fields
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Every event kind the client reacts to.
///
/// `Connect` and `Disconnect` are synthesized by the transport and are never
/// accepted from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connect,
    Disconnect,
    AgentStatusUpdate(StatusUpdate),
    AgentConnected(PresenceChange),
    AgentDisconnected(PresenceChange),
    NewMessage(MessageRecord),
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::Connect => events::CONNECT,
            InboundEvent::Disconnect => events::DISCONNECT,
            InboundEvent::AgentStatusUpdate(_) => events::AGENT_STATUS_UPDATE,
            InboundEvent::AgentConnected(_) => events::AGENT_CONNECTED,
            InboundEvent::AgentDisconnected(_) => events::AGENT_DISCONNECTED,
            InboundEvent::NewMessage(_) => events::NEW_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub protocol_version: u32,
    pub supervisor_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl JoinRequest {
    pub fn new(supervisor_code: &str, token: Option<&str>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            supervisor_code: supervisor_code.to_string(),
            token: token.map(str::to_string),
        }
    }

    pub fn to_frame(&self) -> Frame {
        Frame::new(
            events::JOIN,
            serde_json::to_value(self).unwrap_or(Value::Null),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Login exchange
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    #[serde(default)]
    pub agent_code: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub team_id: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default)]
    pub agent_code: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginExchange {
    pub user: LoginUser,
    #[serde(default)]
    pub team_data: Vec<TeamMember>,
    #[serde(default)]
    pub token: String,
}

impl LoginExchange {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        validate_agent_code(&self.user.agent_code, "user.agentCode")?;
        if self.token.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "token is required"));
        }
        Ok(())
    }
}

/// Parses the login endpoint's result, with or without its `data` envelope.
pub fn parse_login(value: Value) -> Result<LoginExchange, ErrorInfo> {
    let body = match value {
        Value::Object(mut object) if !object.contains_key("user") => match object.remove("data")
        {
            Some(data) => data,
            None => Value::Object(object),
        },
        other => other,
    };

    let exchange: LoginExchange = serde_json::from_value(body).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("login payload is invalid: {}", err),
        )
    })?;
    exchange.validate()?;
    Ok(exchange)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parses one wire line into a typed event.
///
/// Returns `Ok(None)` for event names this client does not handle.
pub fn parse_frame(bytes: &[u8]) -> Result<Option<InboundEvent>, ErrorInfo> {
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(ErrorInfo::new(
            "frame_too_large",
            "frame exceeded maximum size",
        ));
    }

    let frame: Frame = serde_json::from_slice(bytes).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("frame was not valid JSON: {}", err))
    })?;
    parse_inbound(frame)
}

pub fn parse_inbound(frame: Frame) -> Result<Option<InboundEvent>, ErrorInfo> {
    match frame.event.as_str() {
        events::CONNECT | events::DISCONNECT => Err(ErrorInfo::new(
            "reserved_event",
            format!("{} is a transport-level event", frame.event),
        )),
        events::AGENT_STATUS_UPDATE => {
            let mut data = require_object(frame.data)?;
            let agent_code = take_agent_code(&mut data)?;
            let status = take_string(&mut data, "status")?
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ErrorInfo::new("missing_field", "status is required"))?;
            let timestamp = require_timestamp(&mut data)?;
            Ok(Some(InboundEvent::AgentStatusUpdate(StatusUpdate {
                agent_code,
                status: AgentStatus::from(status),
                timestamp,
            })))
        }
        events::AGENT_CONNECTED => {
            let change = parse_presence(frame.data)?;
            Ok(Some(InboundEvent::AgentConnected(change)))
        }
        events::AGENT_DISCONNECTED => {
            let change = parse_presence(frame.data)?;
            Ok(Some(InboundEvent::AgentDisconnected(change)))
        }
        events::NEW_MESSAGE => {
            let fields = require_object(frame.data)?;
            Ok(Some(InboundEvent::NewMessage(MessageRecord::new(fields))))
        }
        _ => Ok(None),
    }
}

/// Builds the outbound `send_message` frame. The injected `fromCode` replaces
/// any value the caller supplied.
pub fn send_message_frame(mut fields: Map<String, Value>, from_code: &str) -> Frame {
    fields.insert(
        "fromCode".to_string(),
        Value::String(from_code.to_string()),
    );
    Frame::new(events::SEND_MESSAGE, Value::Object(fields))
}

pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ErrorInfo> {
    let mut bytes = serde_json::to_vec(frame).map_err(|err| {
        ErrorInfo::new(
            "serialization_error",
            format!("failed to serialize frame: {}", err),
        )
    })?;
    if bytes.len() >= MAX_FRAME_BYTES {
        return Err(ErrorInfo::new(
            "frame_too_large",
            "frame exceeded maximum size",
        ));
    }
    bytes.push(b'\n');
    Ok(bytes)
}

fn parse_presence(data: Value) -> Result<PresenceChange, ErrorInfo> {
    let mut data = require_object(data)?;
    let agent_code = take_agent_code(&mut data)?;
    let timestamp = require_timestamp(&mut data)?;
    Ok(PresenceChange {
        agent_code,
        timestamp,
    })
}

fn require_object(data: Value) -> Result<Map<String, Value>, ErrorInfo> {
    match data {
        Value::Object(object) => Ok(object),
        _ => Err(ErrorInfo::new(
            "invalid_params",
            "event payload must be an object",
        )),
    }
}

fn take_string(data: &mut Map<String, Value>, field: &str) -> Result<Option<String>, ErrorInfo> {
    match data.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(ErrorInfo::new(
            "invalid_params",
            format!("{} must be a string", field),
        )),
    }
}

fn take_agent_code(data: &mut Map<String, Value>) -> Result<String, ErrorInfo> {
    let agent_code = take_string(data, "agentCode")?
        .ok_or_else(|| ErrorInfo::new("missing_field", "agentCode is required"))?;
    validate_agent_code(&agent_code, "agentCode")?;
    Ok(agent_code)
}

pub fn validate_agent_code(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if value.len() > MAX_AGENT_CODE_LEN {
        return Err(ErrorInfo::new(
            "invalid_agent_code",
            format!("{} must be 128 characters or fewer", field),
        ));
    }
    Ok(())
}

fn take_timestamp(data: &mut Map<String, Value>) -> Result<Option<DateTime<Utc>>, ErrorInfo> {
    match take_string(data, "timestamp") {
        Ok(None) => Ok(None),
        Ok(Some(value)) => DateTime::parse_from_rfc3339(&value)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ErrorInfo::new("invalid_timestamp", "timestamp must be RFC3339")),
        Err(_) => Err(ErrorInfo::new(
            "invalid_timestamp",
            "timestamp must be RFC3339",
        )),
    }
}

fn require_timestamp(data: &mut Map<String, Value>) -> Result<DateTime<Utc>, ErrorInfo> {
    take_timestamp(data)?.ok_or_else(|| ErrorInfo::new("missing_field", "timestamp is required"))
}
