use anyhow::Context;

use formref_worker::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    formref_worker::init_tracing(config.log_format);

    tracing::info!("Reference worker starting");

    match formref_worker::run(&config).await {
        Ok(document) => {
            tracing::info!(
                run_id = %document.run_id,
                output = %config.output_path.display(),
                "Reference worker finished"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = ?e, "Reference worker failed");
            Err(e)
        }
    }
}
