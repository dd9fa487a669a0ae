use std::fmt;
use std::str::FromStr;

use rand::RngCore as _;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Number of random bytes behind a generated id (128 bits).
const SESSION_ID_BYTES: usize = 16;

/// Opaque, high-entropy name of a session instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

#[derive(Debug, Snafu)]
#[snafu(display("Session id can't be empty"))]
pub struct EmptySessionIdError;

impl SessionId {
    /// Generate a fresh id from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(data_encoding::HEXLOWER.encode(&bytes))
    }

    /// Interpret a value presented by the client.
    ///
    /// An empty cookie value means "no session".
    pub fn from_cookie_value(value: &str) -> Option<Self> {
        Self::from_str(value).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = EmptySessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return EmptySessionIdSnafu.fail();
        }
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
