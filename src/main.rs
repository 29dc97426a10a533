use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hexel_htp::HtpEngine;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    info!("hexel starting");
    let stdin = io::stdin();
    let mut engine = HtpEngine::new();
    engine.run(stdin.lock(), io::stdout())?;
    Ok(())
}
