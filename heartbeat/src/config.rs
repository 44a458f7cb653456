use std::time::Duration;

use listserve_proto::{Error, InstanceId};
use serde::{Deserialize, Serialize};

/// How a game server registers with its list server
///
/// Fixed for the lifetime of a [`Registration`](crate::Registration).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Base URL of the list server, e.g. `http://127.0.0.1:8889`
    pub endpoint: String,
    /// Shared secret the list server expects
    pub key: String,
    /// Identity of this instance; a random one is generated when absent
    pub instance_id: Option<InstanceId>,
    /// Milliseconds between heartbeats; 0 disables periodic updates
    pub update_period_ms: u64,
    /// Whether a failed registration is retried once as an update, e.g. after a connection blip
    /// left the listing alive
    pub retry_register_as_update: bool,
    /// Whether a failed update is retried once as a fresh registration, e.g. after the list server
    /// restarted and forgot us
    pub retry_update_as_register: bool,
    /// Milliseconds before an HTTP request is abandoned
    pub request_timeout_ms: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8889".into(),
            key: "NodeListServerDefaultKey".into(),
            instance_id: None,
            update_period_ms: 5 * 60 * 1000,
            retry_register_as_update: true,
            retry_update_as_register: false,
            request_timeout_ms: 10 * 1000,
        }
    }
}

impl RegistrationConfig {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_instance_id(mut self, id: impl Into<InstanceId>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    pub fn with_update_period(mut self, period: Duration) -> Self {
        self.update_period_ms = millis(period);
        self
    }

    pub fn with_retry_register_as_update(mut self, enabled: bool) -> Self {
        self.retry_register_as_update = enabled;
        self
    }

    pub fn with_retry_update_as_register(mut self, enabled: bool) -> Self {
        self.retry_update_as_register = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = millis(timeout);
        self
    }

    /// Interval between heartbeats, if periodic updates are enabled
    pub fn update_period(&self) -> Option<Duration> {
        match self.update_period_ms {
            0 => None,
            x => Some(Duration::from_millis(x)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    /// Check that everything needed to talk to the list server is present
    pub fn validate(&self) -> Result<(), Error> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Configuration("list server endpoint is empty"));
        }
        if self.key.trim().is_empty() {
            return Err(Error::Configuration("communication key is empty"));
        }
        if matches!(self.instance_id, Some(ref id) if id.as_str().is_empty()) {
            return Err(Error::Configuration("instance id is empty"));
        }
        Ok(())
    }
}

/// Whole milliseconds in `x`, rounding any nonzero duration up so it can't read as "disabled"
fn millis(x: Duration) -> u64 {
    if x.is_zero() {
        return 0;
    }
    u64::try_from(x.as_millis()).unwrap_or(u64::MAX).max(1)
}
