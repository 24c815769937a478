// src/main.rs

use sshscript::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        tracing::error!("{err:#}");
        eprintln!("sshscript error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    logging::init_logging()?;
    let args = cli::parse();
    run(args).await?;
    Ok(())
}
