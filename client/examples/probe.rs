use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use js5watch_client::{ClientConfig, Js5Client, Transport};

#[derive(Parser, Debug)]
#[clap(name = "probe")]
struct Opt {
    /// JS5 endpoint to watch
    #[clap(default_value = "oldschool2.runescape.com:43594")]
    endpoint: String,
    /// Revision to start negotiating from
    #[clap(long, default_value = "223")]
    revision: u32,
    /// Seconds between pings
    #[clap(long, default_value = "5")]
    interval: u64,
}

fn main() {
    let opt = Opt::parse();
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
    let mut client = Js5Client::new(options.endpoint.clone(), ClientConfig::default());
    let revision = client
        .connect(options.revision)
        .await
        .with_context(|| format!("connecting to {}", options.endpoint))?;
    println!("connected to {} at revision {}", options.endpoint, revision);

    let interval = Duration::from_secs(options.interval);
    let start = Instant::now();
    loop {
        let elapsed = start.elapsed().as_secs();
        match client.ping().await {
            Ok(response) => {
                let shown = &response[..response.len().min(10)];
                println!("response {:02x?} | {}s elapsed", shown, elapsed);
            }
            Err(e) => {
                println!("connection broken after {}s: {}", elapsed, e);
                return Ok(());
            }
        }
        tokio::time::sleep(interval).await;
    }
}
