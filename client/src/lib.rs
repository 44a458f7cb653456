//! Discover game servers through a list server

mod watch;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub use listserve_proto as proto;
use listserve_proto::{
    client::{self, ServerList},
    DirectoryClient, Error, Transport,
};
use tracing::{debug, warn};

pub use watch::ServerListWatcher;

/// Fetches listings from one list server
///
/// Cheap to clone; clones share the same busy indicator.
#[derive(Debug, Clone)]
pub struct DirectoryQueryClient {
    client: DirectoryClient,
    in_flight: Arc<AtomicUsize>,
}

impl DirectoryQueryClient {
    /// Query the list server at `endpoint` over HTTP
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::from_client(DirectoryClient::new(endpoint))
    }

    pub fn with_transport(endpoint: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self::from_client(DirectoryClient::with_transport(endpoint, transport))
    }

    pub fn from_client(client: DirectoryClient) -> Self {
        Self {
            client,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether a query is outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Fetch every server currently listed
    ///
    /// Failures are returned as-is; nothing is retried.
    pub async fn query(&self, key: &str) -> Result<ServerList, Error> {
        let _busy = InFlight::enter(&self.in_flight);
        let body = self
            .client
            .send("query", client::LIST_PATH, &client::list_form(key))
            .await?;
        let list = ServerList::decode(&body).map_err(|e| {
            warn!(error = %e, "list server sent an unreadable listing");
            e
        })?;
        if list.count as usize != list.servers.len() {
            debug!(
                count = list.count,
                received = list.servers.len(),
                "listing count disagrees with entries"
            );
        }
        debug!(servers = list.servers.len(), "fetched server list");
        Ok(list)
    }

    /// Keep a fresh copy of the listing, re-querying every `interval` or as often as the list
    /// server suggests
    pub fn watch(&self, key: impl Into<String>, interval: std::time::Duration) -> ServerListWatcher {
        ServerListWatcher::spawn(self.clone(), key.into(), interval)
    }
}

/// Marks a query as outstanding for as long as it lives
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
