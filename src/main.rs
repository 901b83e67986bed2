use anyhow::Result;
use tracing::info;

use pprof_uploader::config::SystemEnvironment;
use pprof_uploader::pipeline::{configure, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = configure(&SystemEnvironment)?;
    info!("target source = {:?}", cfg.target_source);

    let pipeline = Pipeline::from_config(&cfg).await?;
    let report = pipeline.run().await?;
    info!("Run finished: {} messages posted", report.posts.len());

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
