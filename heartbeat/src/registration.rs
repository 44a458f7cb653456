use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use listserve_proto::{
    game::{self, ServerInfo},
    DirectoryClient, Error, HttpTransport, InstanceId, Transport,
};
use tracing::{debug, error, info, warn};

use crate::{HeartbeatScheduler, RegistrationConfig};

/// Where an instance stands with its list server
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
    Updating,
    Deregistering,
}

impl RegistrationState {
    /// Whether a request is outstanding
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            RegistrationState::Registering
                | RegistrationState::Updating
                | RegistrationState::Deregistering
        )
    }
}

/// Supplies the current state of the game server whenever an update is about to be sent
///
/// Called with internal locks released, but must not block.
pub trait InfoSource: Send + Sync {
    fn snapshot(&self) -> ServerInfo;
}

impl<F> InfoSource for F
where
    F: Fn() -> ServerInfo + Send + Sync,
{
    fn snapshot(&self) -> ServerInfo {
        self()
    }
}

/// Keeps one game server listed on a list server
///
/// Registers on [`start`](Self::start), sends a heartbeat every configured period while
/// registered, and removes the listing on [`stop`](Self::stop). At most one request is in flight
/// at a time; any operation attempted meanwhile fails with [`Error::Busy`] without touching the
/// network. Clones share the same listing.
#[derive(Clone)]
pub struct Registration {
    shared: Arc<Shared>,
}

struct Shared {
    config: RegistrationConfig,
    id: InstanceId,
    client: DirectoryClient,
    source: Mutex<Option<Arc<dyn InfoSource>>>,
    state: Mutex<State>,
}

struct State {
    phase: RegistrationState,
    info: ServerInfo,
    ack: Option<String>,
    scheduler: HeartbeatScheduler,
    /// Bumped whenever the heartbeat is (re)armed or disarmed, so that ticks from a stale
    /// schedule are recognizable
    generation: u64,
}

impl Registration {
    /// Register over HTTP according to `config`
    pub fn new(config: RegistrationConfig) -> Result<Self, Error> {
        let transport = HttpTransport::with_timeout(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: RegistrationConfig, transport: Arc<dyn Transport>) -> Self {
        let client = DirectoryClient::with_transport(config.endpoint.clone(), transport);
        let id = config
            .instance_id
            .clone()
            .unwrap_or_else(InstanceId::generate);
        Self {
            shared: Arc::new(Shared {
                config,
                id,
                client,
                source: Mutex::new(None),
                state: Mutex::new(State {
                    phase: RegistrationState::Unregistered,
                    info: ServerInfo::default(),
                    ack: None,
                    scheduler: HeartbeatScheduler::new(),
                    generation: 0,
                }),
            }),
        }
    }

    /// Pull fresh server info from `source` before every heartbeat
    pub fn set_info_source(&self, source: impl InfoSource + 'static) {
        *lock(&self.shared.source) = Some(Arc::new(source));
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.shared.id
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.shared.config
    }

    pub fn state(&self) -> RegistrationState {
        self.state_lock().phase
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Whether heartbeats are currently scheduled
    pub fn is_scheduled(&self) -> bool {
        self.state_lock().scheduler.is_armed()
    }

    /// The most recent info sent, or to be sent, to the list server
    pub fn cached_info(&self) -> ServerInfo {
        self.state_lock().info.clone()
    }

    /// Body of the list server's reply to the last successful registration
    pub fn last_ack(&self) -> Option<String> {
        self.state_lock().ack.clone()
    }

    /// Register `info` with the list server
    ///
    /// On success, heartbeats begin one period from now. If registration fails and
    /// [`retry_register_as_update`](RegistrationConfig::retry_register_as_update) is set, a single
    /// update is attempted instead, on the theory that our listing survived a connection blip.
    pub async fn start(&self, info: ServerInfo) -> Result<(), Error> {
        self.check_config("register")?;
        let attempt = {
            let mut state = self.state_lock();
            let attempt = self.claim(
                &mut state,
                "register",
                RegistrationState::Registering,
                RegistrationState::Unregistered,
            )?;
            self.disarm(&mut state);
            state.info = info;
            state.ack = None;
            attempt
        };
        info!(instance = %self.shared.id, "registering with list server");

        let err = match self.send_register().await {
            Ok(()) => {
                attempt.finish();
                return Ok(());
            }
            Err(e) => e,
        };
        if !self.shared.config.retry_register_as_update {
            error!(instance = %self.shared.id, error = %err, "registration failed");
            self.settle(RegistrationState::Unregistered);
            attempt.finish();
            return Err(err);
        }

        warn!(instance = %self.shared.id, error = %err, "registration failed, retrying as an update");
        self.state_lock().phase = RegistrationState::Updating;
        let result = match self.send_update().await {
            Ok(()) => {
                info!(instance = %self.shared.id, "existing listing confirmed by update");
                self.settle_registered(None);
                Ok(())
            }
            Err(e) => {
                error!(instance = %self.shared.id, error = %e, "registration failed, and so did the update");
                self.settle(RegistrationState::Unregistered);
                Err(e)
            }
        };
        attempt.finish();
        result
    }

    /// Send a heartbeat now, pulling fresh info from the [`InfoSource`] if one is set
    ///
    /// Does nothing unless registered.
    pub async fn update(&self) -> Result<(), Error> {
        self.heartbeat(None, None).await
    }

    /// Replace the advertised info, and push it to the list server immediately if registered
    ///
    /// Meant for changes such as a player joining or leaving. When not registered the info is
    /// only remembered for the next registration.
    pub async fn refresh(&self, info: ServerInfo) -> Result<(), Error> {
        self.heartbeat(Some(info), None).await
    }

    /// Remove our listing from the list server
    ///
    /// Heartbeats are cancelled before the request is sent. Whatever the outcome of the request,
    /// the instance ends up [`Unregistered`](RegistrationState::Unregistered); a failure is still
    /// returned so the caller can judge whether the listing might linger until it expires. This
    /// holds even if the returned future is dropped before the request completes.
    pub async fn stop(&self) -> Result<(), Error> {
        self.check_config("deregister")?;
        let attempt = {
            let mut state = self.state_lock();
            let attempt = self.claim(
                &mut state,
                "deregister",
                RegistrationState::Deregistering,
                RegistrationState::Unregistered,
            )?;
            self.disarm(&mut state);
            attempt
        };
        info!(instance = %self.shared.id, "deregistering from list server");

        let form = game::remove_form(&self.shared.config.key, &self.shared.id);
        let result = self
            .shared
            .client
            .send("deregister", game::REMOVE_PATH, &form)
            .await
            .map(|_| ());
        {
            let mut state = self.state_lock();
            state.phase = RegistrationState::Unregistered;
            state.ack = None;
        }
        attempt.finish();
        match result {
            Ok(()) => info!(instance = %self.shared.id, "deregistered"),
            Err(ref e) => error!(
                instance = %self.shared.id,
                error = %e,
                "deregistration failed; the listing may persist until it expires"
            ),
        }
        result
    }

    /// Shared body of scheduled, manual and info-driven updates
    ///
    /// `generation` identifies the schedule a timer tick came from.
    async fn heartbeat(&self, info: Option<ServerInfo>, generation: Option<u64>) -> Result<(), Error> {
        let pushed = info.is_some();
        let pulled = match info {
            Some(_) => None,
            None => self.pull(),
        };
        let mut attempt = {
            let mut state = self.state_lock();
            if generation.map_or(false, |x| x != state.generation) {
                debug!(instance = %self.shared.id, "ignoring tick from a cancelled schedule");
                return Ok(());
            }
            if state.phase.is_busy() {
                warn!(instance = %self.shared.id, "update rejected: a list server request is already in flight");
                return Err(Error::Busy);
            }
            if let Some(x) = info.or(pulled) {
                state.info = x;
            }
            if state.phase != RegistrationState::Registered {
                debug!(instance = %self.shared.id, "not registered, skipping update");
                return Ok(());
            }
            state.phase = RegistrationState::Updating;
            Attempt::new(self, "update", RegistrationState::Registered)
        };

        let err = match self.send_update().await {
            Ok(()) => {
                debug!(instance = %self.shared.id, "listing updated");
                self.settle_registered(None);
                attempt.finish();
                return Ok(());
            }
            Err(e) => e,
        };
        if !self.shared.config.retry_update_as_register {
            error!(
                instance = %self.shared.id,
                error = %err,
                "update failed; the listing may expire"
            );
            self.settle(RegistrationState::Registered);
            attempt.finish();
            return Err(err);
        }

        warn!(instance = %self.shared.id, error = %err, "update failed, retrying as a registration");
        // Pushed info is what the caller asked for; otherwise the source may have moved on
        let fresh = if pushed { None } else { self.pull() };
        {
            let mut state = self.state_lock();
            if let Some(x) = fresh {
                state.info = x;
            }
            state.phase = RegistrationState::Registering;
        }
        attempt.abandoned = Some(RegistrationState::Unregistered);
        let result = match self.send_register().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(instance = %self.shared.id, error = %e, "update failed, and so did re-registration");
                let mut state = self.state_lock();
                state.phase = RegistrationState::Unregistered;
                state.ack = None;
                self.disarm(&mut state);
                Err(e)
            }
        };
        attempt.finish();
        result
    }

    /// Current info from the installed [`InfoSource`], if any
    fn pull(&self) -> Option<ServerInfo> {
        let source = lock(&self.shared.source).clone();
        source.map(|x| x.snapshot())
    }

    /// POST `/add` with the cached info, settling as registered on success
    async fn send_register(&self) -> Result<(), Error> {
        let form = game::register_form(
            &self.shared.config.key,
            &self.shared.id,
            &self.state_lock().info,
        );
        let ack = self
            .shared
            .client
            .send("register", game::REGISTER_PATH, &form)
            .await?;
        info!(instance = %self.shared.id, "registered with list server");
        self.settle_registered(Some(ack));
        Ok(())
    }

    async fn send_update(&self) -> Result<(), Error> {
        let form = game::update_form(
            &self.shared.config.key,
            &self.shared.id,
            &self.state_lock().info,
        );
        self.shared
            .client
            .send("update", game::UPDATE_PATH, &form)
            .await
            .map(|_| ())
    }

    fn check_config(&self, operation: &'static str) -> Result<(), Error> {
        self.shared.config.validate().map_err(|e| {
            error!(instance = %self.shared.id, operation, error = %e, "refusing to contact list server");
            e
        })
    }

    /// Atomically take the instance for `operation`, or fail if it's busy
    ///
    /// Should the returned attempt be dropped unfinished, the instance falls back to `abandoned`.
    fn claim(
        &self,
        state: &mut State,
        operation: &'static str,
        phase: RegistrationState,
        abandoned: RegistrationState,
    ) -> Result<Attempt<'_>, Error> {
        if state.phase.is_busy() {
            warn!(
                instance = %self.shared.id,
                operation,
                current = ?state.phase,
                "rejected: a list server request is already in flight"
            );
            return Err(Error::Busy);
        }
        state.phase = phase;
        Ok(Attempt::new(self, operation, abandoned))
    }

    fn settle(&self, phase: RegistrationState) {
        self.state_lock().phase = phase;
    }

    /// Mark registered and restart the heartbeat from now
    fn settle_registered(&self, ack: Option<String>) {
        let mut state = self.state_lock();
        state.phase = RegistrationState::Registered;
        if ack.is_some() {
            state.ack = ack;
        }
        self.arm(&mut state);
    }

    fn arm(&self, state: &mut State) {
        let period = match self.shared.config.update_period() {
            Some(x) => x,
            None => return,
        };
        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(&self.shared);
        state.scheduler.arm(period, move || {
            let shared = match weak.upgrade() {
                Some(x) => x,
                None => return,
            };
            let registration = Registration { shared };
            tokio::spawn(async move {
                // Failures are logged where they're classified
                let _ = registration.heartbeat(None, Some(generation)).await;
            });
        });
    }

    fn disarm(&self, state: &mut State) {
        state.generation += 1;
        if state.scheduler.disarm() {
            debug!(instance = %self.shared.id, "heartbeat cancelled");
        }
    }

    fn state_lock(&self) -> MutexGuard<'_, State> {
        lock(&self.shared.state)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("instance", &self.shared.id)
            .field("endpoint", &self.shared.client.endpoint())
            .field("state", &self.state())
            .finish()
    }
}

/// An operation holding the instance busy
///
/// Dropped without [`finish`](Self::finish), e.g. because the caller stopped polling or something
/// panicked mid-request, it returns the instance to a resting phase so it can't stay busy forever.
struct Attempt<'a> {
    registration: &'a Registration,
    operation: &'static str,
    abandoned: Option<RegistrationState>,
}

impl<'a> Attempt<'a> {
    fn new(
        registration: &'a Registration,
        operation: &'static str,
        abandoned: RegistrationState,
    ) -> Self {
        Self {
            registration,
            operation,
            abandoned: Some(abandoned),
        }
    }

    /// The operation settled the phase itself
    fn finish(mut self) {
        self.abandoned = None;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        let phase = match self.abandoned.take() {
            Some(x) => x,
            None => return,
        };
        let registration = self.registration;
        warn!(
            instance = %registration.shared.id,
            operation = self.operation,
            resting = ?phase,
            "list server request abandoned before it completed"
        );
        let mut state = registration.state_lock();
        state.phase = phase;
        if phase == RegistrationState::Unregistered {
            state.ack = None;
            registration.disarm(&mut state);
        }
    }
}

fn lock<T>(x: &Mutex<T>) -> MutexGuard<'_, T> {
    x.lock().unwrap_or_else(PoisonError::into_inner)
}
