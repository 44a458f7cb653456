use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use listserve_client::DirectoryQueryClient;

#[derive(Parser, Debug)]
#[clap(name = "print")]
struct Opt {
    /// List server to query
    #[clap(default_value = "http://127.0.0.1:8889")]
    endpoint: String,
    /// Communication key expected by the list server
    #[clap(long = "key", default_value = "NodeListServerDefaultKey")]
    key: String,
    /// Keep printing the list every this many seconds instead of exiting
    #[clap(long = "watch")]
    watch: Option<u64>,
}

fn main() {
    let opt = Opt::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
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
    let client = DirectoryQueryClient::new(options.endpoint);

    let period = match options.watch {
        None => {
            let list = client
                .query(&options.key)
                .await
                .context("querying list server")?;
            print(&list);
            return Ok(());
        }
        Some(x) => Duration::from_secs(x),
    };

    let mut watcher = client.watch(options.key, period);
    while let Some(list) = watcher.changed().await {
        print(&list);
    }
    Ok(())
}

fn print(list: &listserve_client::proto::ServerList) {
    println!("{} servers:", list.servers.len());
    for server in &list.servers {
        println!(
            "\t{}:{}\t{}\t{}\t{}",
            server.display_address(),
            server.port,
            server.name,
            server.occupancy(),
            server.extras
        );
    }
}
