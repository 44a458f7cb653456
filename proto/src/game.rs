//! Protocol for communication between game servers and list servers

use serde::{Deserialize, Serialize};

use crate::{Form, InstanceId, KEY_FIELD, UUID_FIELD};

/// Path registering a new listing
pub const REGISTER_PATH: &str = "/add";
/// Path refreshing an existing listing
pub const UPDATE_PATH: &str = "/update";
/// Path removing a listing
pub const REMOVE_PATH: &str = "/remove";

/// What a game server advertises about itself
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    /// The port game clients should connect to
    ///
    /// Not necessarily the port the game is bound to locally.
    pub port: u16,
    /// Number of connected players
    pub players: u32,
    /// Maximum number of players, or 0 if unlimited
    pub capacity: u32,
    /// Opaque payload passed through to game clients
    #[serde(default)]
    pub extras: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_players(mut self, players: u32, capacity: u32) -> Self {
        self.players = players;
        self.capacity = capacity;
        self
    }

    pub fn with_extras(mut self, extras: impl Into<String>) -> Self {
        self.extras = extras.into();
        self
    }
}

/// Fields for [`REGISTER_PATH`]
pub fn register_form(key: &str, id: &InstanceId, info: &ServerInfo) -> Form {
    vec![
        (KEY_FIELD, key.trim().to_owned()),
        (UUID_FIELD, id.to_string()),
        ("serverName", info.name.trim().to_owned()),
        ("serverPort", info.port.to_string()),
        ("serverPlayers", info.players.to_string()),
        ("serverCapacity", info.capacity.to_string()),
        ("serverExtras", info.extras.clone()),
    ]
}

/// Fields for [`UPDATE_PATH`]
///
/// The port is fixed at registration and is not resent.
pub fn update_form(key: &str, id: &InstanceId, info: &ServerInfo) -> Form {
    vec![
        (KEY_FIELD, key.trim().to_owned()),
        (UUID_FIELD, id.to_string()),
        ("serverName", info.name.trim().to_owned()),
        ("serverPlayers", info.players.to_string()),
        ("serverCapacity", info.capacity.to_string()),
        ("serverExtras", info.extras.clone()),
    ]
}

/// Fields for [`REMOVE_PATH`]
pub fn remove_form(key: &str, id: &InstanceId) -> Form {
    vec![(KEY_FIELD, key.trim().to_owned()), (UUID_FIELD, id.to_string())]
}
