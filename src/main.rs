use hendry_template::config::AppConfig;
use hendry_template::logging::init_logging;
use hendry_template::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    log::info!(
        "Configuration loaded: server={}:{} storage={:?} environment={:?}",
        config.server.host,
        config.server.port,
        config.storage,
        config.environment
    );

    run_server(config).await
}
