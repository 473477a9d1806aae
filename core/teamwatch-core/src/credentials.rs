//! Credential context.
//!
//! The token comes from the external login exchange. The core only stores it
//! and hands it to the transport when a connection is set up.

pub trait CredentialStore: Send {
    fn set_token(&mut self, token: &str);
    fn token(&self) -> Option<&str>;
    fn clear(&mut self);
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Option<String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn clear(&mut self) {
        self.token = None;
    }
}
