use anyhow::Result;
use clap::Parser;
use doc_qc::cli;
use tracing::error;

// PDF page streams are not Send, so everything runs on one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args).await {
        error!("{:#}", err);
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}
