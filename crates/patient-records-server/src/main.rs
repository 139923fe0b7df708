//! Binary entrypoint for the patient records HTTP service.

use anyhow::Result;
use patient_records_server::{run, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("patient_records_server=info,patient_records_core=info,warn")
            }),
        )
        .init();
    let config = ServerConfig::from_env()?;
    run(config).await
}
