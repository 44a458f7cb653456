//! Vocabulary shared by game servers and game clients talking to a list server
//!
//! The list server speaks form-encoded HTTP POSTs. Game servers use the operations in [`game`] to
//! advertise themselves; game clients use [`client`] to fetch the current listing. Both go through
//! a [`DirectoryClient`], which performs exactly one round trip per call over a [`Transport`].

pub mod client;
mod directory;
mod error;
pub mod game;
mod transport;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use client::{ServerList, ServerListEntry};
pub use directory::DirectoryClient;
pub use error::Error;
pub use game::ServerInfo;
pub use transport::{HttpTransport, Response, Transport};

/// Form field carrying the shared secret, sent with every request
pub const KEY_FIELD: &str = "serverKey";
/// Form field carrying the instance identity
pub const UUID_FIELD: &str = "serverUuid";

/// Ordered form fields, as placed on the wire
pub type Form = Vec<(&'static str, String)>;

/// Stable identity of one game server instance
///
/// The list server keys its entries by this value, so it must not change between the registration,
/// updates and removal of one listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh random identity
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InstanceId {
    fn from(x: String) -> Self {
        Self(x.trim().to_owned())
    }
}

impl From<&str> for InstanceId {
    fn from(x: &str) -> Self {
        Self(x.trim().to_owned())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
