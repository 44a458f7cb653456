//! Keep a game server listed on a list server
//!
//! ```no_run
//! # async fn run() -> Result<(), listserve_heartbeat::proto::Error> {
//! use listserve_heartbeat::{proto::ServerInfo, Registration, RegistrationConfig};
//!
//! let config = RegistrationConfig::new("http://127.0.0.1:8889", "NodeListServerDefaultKey");
//! let registration = Registration::new(config)?;
//! registration.start(ServerInfo::new("My Server", 7777).with_players(0, 16)).await?;
//! // ...serve the game, calling `refresh` as players come and go...
//! registration.stop().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod registration;
mod scheduler;

pub use listserve_proto as proto;

pub use config::RegistrationConfig;
pub use registration::{InfoSource, Registration, RegistrationState};
pub use scheduler::HeartbeatScheduler;
