use std::time::Duration;

use async_trait::async_trait;

use crate::Error;

/// Raw outcome of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Carries one form-encoded POST to a list server
///
/// Implementations must report every failure to obtain a response as [`Error::Transport`] rather
/// than panicking, and must not retry internally.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, form: &[(&'static str, String)]) -> Result<Response, Error>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Construct a transport which gives up on requests that take longer than `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| Error::Configuration("failed to initialize HTTP client"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, form: &[(&'static str, String)]) -> Result<Response, Error> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Response { status, body })
    }
}
