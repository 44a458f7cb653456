use std::{any::Any, fmt, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use tracing::{debug, error};

use crate::{Error, HttpTransport, Transport, KEY_FIELD};

/// Sends single requests to one list server
///
/// Performs exactly one round trip per [`send`](Self::send); retry policy belongs to callers.
#[derive(Clone)]
pub struct DirectoryClient {
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl DirectoryClient {
    /// Talk to the list server at `endpoint`, e.g. `http://127.0.0.1:8889`, over HTTP
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_transport(endpoint, Arc::new(HttpTransport::default()))
    }

    pub fn with_transport(endpoint: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_owned(),
            transport,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Absolute URL of `path` under the configured endpoint
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// POST `form` to `path`, returning the trimmed body of a 200 response
    ///
    /// `operation` only labels log output. Fails without touching the network if the endpoint or
    /// the shared key in `form` is empty.
    pub async fn send(
        &self,
        operation: &str,
        path: &str,
        form: &[(&'static str, String)],
    ) -> Result<String, Error> {
        if self.endpoint.is_empty() {
            return Err(Error::Configuration("list server endpoint is empty"));
        }
        let has_key = form
            .iter()
            .any(|(name, value)| *name == KEY_FIELD && !value.trim().is_empty());
        if !has_key {
            return Err(Error::Configuration("communication key is empty"));
        }

        let url = self.url(path);
        debug!(operation, %url, "sending list server request");
        let response = AssertUnwindSafe(self.transport.post(&url, form))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let reason = panic_message(&*payload);
                error!(operation, %url, reason, "transport panicked");
                Err(Error::Transport(format!("transport panicked: {}", reason)))
            })
            .map_err(|e| match e {
                // Anything a transport reports is a transport failure, whatever it called it
                Error::Transport(_) => e,
                other => Error::Transport(other.to_string()),
            })?;
        if response.status != 200 {
            debug!(operation, status = response.status, "list server rejected request");
            return Err(Error::Status {
                status: response.status,
                body: response.body.trim().to_owned(),
            });
        }
        debug!(operation, "list server request succeeded");
        Ok(response.body.trim().to_owned())
    }
}

impl fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(x) = payload.downcast_ref::<&'static str>() {
        return *x;
    }
    payload
        .downcast_ref::<String>()
        .map_or("unknown cause", |x| x.as_str())
}
