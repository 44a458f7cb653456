use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use listserve_heartbeat::{proto::ServerInfo, Registration, RegistrationConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[clap(name = "demo")]
struct Opt {
    /// List server to register with
    #[clap(default_value = "http://127.0.0.1:8889")]
    endpoint: String,
    /// Communication key expected by the list server
    #[clap(long = "key", default_value = "NodeListServerDefaultKey")]
    key: String,
    /// Name to advertise
    #[clap(long = "name", default_value = "Demo Server")]
    name: String,
    /// Port game clients should connect to
    #[clap(long = "port", default_value = "7777")]
    port: u16,
    /// Maximum player count, or 0 for unlimited
    #[clap(long = "capacity", default_value = "16")]
    capacity: u32,
    /// Seconds between heartbeats
    #[clap(long = "period", default_value = "10")]
    period: u64,
    /// Retry failed heartbeats as fresh registrations
    #[clap(long = "reregister")]
    reregister: bool,
}

fn main() {
    let opt = Opt::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let code = {
        if let Err(e) = run(opt) {
            eprintln!("ERROR: {:#}", e);
            1
        } else {
            0
        }
    };
    ::std::process::exit(code);
}

#[tokio::main(flavor = "current_thread")]
async fn run(options: Opt) -> Result<()> {
    let config = RegistrationConfig::new(options.endpoint, options.key)
        .with_update_period(Duration::from_secs(options.period))
        .with_retry_update_as_register(options.reregister);
    let registration = Registration::new(config).context("setting up registration")?;
    info!(instance = %registration.instance_id(), "starting");

    // Pretend players wander in over time
    let players = Arc::new(AtomicU32::new(0));
    let snapshot = {
        let name = options.name.clone();
        let (port, capacity) = (options.port, options.capacity);
        let players = players.clone();
        move || {
            ServerInfo::new(name.clone(), port)
                .with_players(players.load(Ordering::Relaxed), capacity)
        }
    };
    registration.set_info_source(snapshot.clone());
    registration
        .start(snapshot())
        .await
        .context("registering with list server")?;

    let mut interval = tokio::time::interval(Duration::from_secs(7));
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let count = players.fetch_add(1, Ordering::Relaxed) + 1;
                if let Err(e) = registration.refresh(snapshot()).await {
                    info!(players = count, error = %e, "couldn't push player count");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for ctrl-c")?;
                break;
            }
        }
    }

    registration
        .stop()
        .await
        .context("deregistering from list server")?;
    Ok(())
}
