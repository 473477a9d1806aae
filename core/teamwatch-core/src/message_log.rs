//! Append-only message log, ordered by arrival at this client.
//!
//! An optional capacity turns the log into a sliding window: once full, each
//! append evicts the oldest entry. Entries are never edited in place.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::VecDeque;

use teamwatch_protocol::MessageRecord;

use crate::types::SupervisorContext;

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: VecDeque<MessageRecord>,
    capacity: Option<usize>,
    evicted: u64,
}

impl MessageLog {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.filter(|value| *value > 0),
            evicted: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn append_inbound(&mut self, message: MessageRecord) {
        self.push(message);
    }

    /// Stamps `fromCode`, `sender` and `timestamp` from the supervisor and
    /// appends the result. Caller-supplied values for those keys are replaced.
    pub fn append_outbound(
        &mut self,
        mut fields: Map<String, Value>,
        sender: &SupervisorContext,
        now: DateTime<Utc>,
    ) -> MessageRecord {
        fields.insert(
            "fromCode".to_string(),
            Value::String(sender.supervisor_code.clone()),
        );
        fields.insert("sender".to_string(), Value::String(sender.name.clone()));
        fields.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        let record = MessageRecord::new(fields);
        self.push(record.clone());
        record
    }

    fn push(&mut self, record: MessageRecord) {
        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity {
                self.entries.pop_front();
                self.evicted += 1;
            }
        }
        self.entries.push_back(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&MessageRecord> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
