use std::collections::HashMap;

use serde_json::Value;
use snafu::{ResultExt as _, Snafu};

#[derive(Debug, Snafu)]
pub enum PayloadError {
    #[snafu(display("Failed to encode session payload"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Malformed session payload"))]
    Decode { source: serde_json::Error },
}

pub type PayloadResult<T> = std::result::Result<T, PayloadError>;

/// In-memory key/value content of one session.
///
/// Stored as a JSON object, which keeps nested containers and scalars
/// intact across a round-trip through the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData(HashMap<String, Value>);

impl SessionData {
    pub fn encode(&self) -> PayloadResult<Vec<u8>> {
        serde_json::to_vec(&self.0).context(EncodeSnafu)
    }

    /// Parse a payload read from the backend.
    ///
    /// Anything that is not a JSON object is rejected.
    pub fn decode(bytes: &[u8]) -> PayloadResult<Self> {
        serde_json::from_slice(bytes).map(Self).context(DecodeSnafu)
    }

    /// Copy all entries of `other` in, overwriting keys present in both.
    pub fn merge(&mut self, other: SessionData) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(String, Value)> for SessionData {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
