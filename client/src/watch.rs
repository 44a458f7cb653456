use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use listserve_proto::{client::ServerList, Error};
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time,
};
use tracing::{debug, warn};

use crate::DirectoryQueryClient;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// A periodically refreshed server list
///
/// Queries immediately, then once per interval. Each successful query replaces the previous
/// snapshot wholesale; a failed one leaves it in place. Stops when dropped.
#[derive(Debug)]
pub struct ServerListWatcher {
    snapshots: watch::Receiver<Option<Arc<ServerList>>>,
    refresh: Arc<Notify>,
    last_error: Arc<Mutex<Option<Error>>>,
    task: JoinHandle<()>,
}

impl ServerListWatcher {
    pub(crate) fn spawn(query: DirectoryQueryClient, key: String, interval: Duration) -> Self {
        let (send, snapshots) = watch::channel(None);
        let refresh = Arc::new(Notify::new());
        let last_error = Arc::new(Mutex::new(None));
        let task = tokio::spawn(run(
            query,
            key,
            interval.max(MIN_INTERVAL),
            send,
            refresh.clone(),
            last_error.clone(),
        ));
        Self {
            snapshots,
            refresh,
            last_error,
            task,
        }
    }

    /// The most recently fetched list, if any query has succeeded yet
    pub fn latest(&self) -> Option<Arc<ServerList>> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next successfully fetched list
    pub async fn changed(&mut self) -> Option<Arc<ServerList>> {
        self.snapshots.changed().await.ok()?;
        self.snapshots.borrow().clone()
    }

    /// Query again now rather than waiting out the interval
    ///
    /// Requests made while a query is running collapse into one.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Why the most recent query failed, if it did
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ServerListWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    query: DirectoryQueryClient,
    key: String,
    base: Duration,
    send: watch::Sender<Option<Arc<ServerList>>>,
    refresh: Arc<Notify>,
    last_error: Arc<Mutex<Option<Error>>>,
) {
    let mut interval = base;
    loop {
        if query.is_busy() {
            debug!("query already outstanding, skipping refresh");
        } else {
            let result = query.query(&key).await;
            let failure = match result {
                Ok(list) => {
                    interval = list
                        .suggested_refresh()
                        .map_or(base, |x| x.max(MIN_INTERVAL));
                    if send.send(Some(Arc::new(list))).is_err() {
                        return;
                    }
                    None
                }
                Err(e) => {
                    warn!(error = %e, "failed to refresh server list");
                    Some(e)
                }
            };
            *last_error.lock().unwrap_or_else(PoisonError::into_inner) = failure;
        }
        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = refresh.notified() => {}
        }
    }
}
