//! Protocol for communication between game clients and list servers

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Form, KEY_FIELD};

/// Path returning every live listing
pub const LIST_PATH: &str = "/list";

/// Prefix some list servers put on IPv4 peers accepted over a dual-stack socket
const MAPPED_IPV4_PREFIX: &str = "::ffff:";

/// Fields for [`LIST_PATH`]
pub fn list_form(key: &str) -> Form {
    vec![(KEY_FIELD, key.trim().to_owned())]
}

/// Every server known to the list server at the time of the query
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerList {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub servers: Vec<ServerListEntry>,
    /// How often the list server suggests querying, in seconds
    #[serde(
        default,
        rename = "updateFrequency",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_frequency: Option<u64>,
}

impl ServerList {
    /// Decode a `/list` response body
    pub fn decode(body: &str) -> Result<Self, Error> {
        serde_json::from_str(body).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Refresh interval suggested by the list server, if any
    pub fn suggested_refresh(&self) -> Option<Duration> {
        self.update_frequency
            .filter(|&x| x > 0)
            .map(Duration::from_secs)
    }
}

/// A single advertised game server
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerListEntry {
    /// Address as observed by the list server, verbatim
    #[serde(rename = "ip")]
    pub address: String,
    pub name: String,
    pub port: u16,
    pub players: u32,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub extras: String,
}

impl ServerListEntry {
    /// The address with any IPv4-mapped IPv6 prefix removed
    pub fn display_address(&self) -> &str {
        self.address
            .strip_prefix(MAPPED_IPV4_PREFIX)
            .unwrap_or(&self.address)
    }

    /// `players`, or `players / capacity` when capacity is bounded
    pub fn occupancy(&self) -> String {
        if self.capacity > 0 {
            format!("{} / {}", self.players, self.capacity)
        } else {
            self.players.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "count": 2,
        "servers": [
            {"ip": "::ffff:10.0.0.4", "name": "Alpha", "port": 7777, "players": 3, "capacity": 16, "extras": "ctf"},
            {"ip": "2001:db8::1", "name": "Beta", "port": 7778, "players": 0, "capacity": 0, "extras": ""}
        ],
        "updateFrequency": 30
    }"#;

    #[test]
    fn decodes_listing() {
        let list = ServerList::decode(BODY).unwrap();
        assert_eq!(list.count, 2);
        assert_eq!(list.servers.len(), 2);
        assert_eq!(list.servers[0].address, "::ffff:10.0.0.4");
        assert_eq!(list.servers[0].name, "Alpha");
        assert_eq!(list.servers[1].port, 7778);
        assert_eq!(list.suggested_refresh(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_frequency_and_extras() {
        let list = ServerList::decode(
            r#"{"count":1,"servers":[{"ip":"1.2.3.4","name":"x","port":1,"players":2}]}"#,
        )
        .unwrap();
        assert_eq!(list.update_frequency, None);
        assert_eq!(list.suggested_refresh(), None);
        assert_eq!(list.servers[0].extras, "");
        assert_eq!(list.servers[0].capacity, 0);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        match ServerList::decode("<html>nope</html>") {
            Err(Error::Decode(_)) => {}
            x => panic!("unexpected {:?}", x),
        }
        match ServerList::decode(r#"{"servers": [{"name": 5}]}"#) {
            Err(Error::Decode(_)) => {}
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn display_helpers() {
        let list = ServerList::decode(BODY).unwrap();
        assert_eq!(list.servers[0].display_address(), "10.0.0.4");
        assert_eq!(list.servers[0].address, "::ffff:10.0.0.4");
        assert_eq!(list.servers[1].display_address(), "2001:db8::1");
        assert_eq!(list.servers[0].occupancy(), "3 / 16");
        assert_eq!(list.servers[1].occupancy(), "0");
    }
}
