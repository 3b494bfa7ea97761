use serde::{Deserialize, Serialize};

use crate::server::ServerId;

/// A field value paired with the server that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ServerId,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: ServerId) -> Self {
        Self { value, source }
    }

    pub fn is_from(&self, server: &ServerId) -> bool {
        &self.source == server
    }
}

impl<T: PartialEq> Sourced<T> {
    /// True when writing `candidate` from `server` would change nothing.
    pub fn matches(&self, candidate: &T, server: &ServerId) -> bool {
        &self.value == candidate && &self.source == server
    }
}
