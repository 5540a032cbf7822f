//! livedash server - binary entry point

use livedash::{Config, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        version = livedash::VERSION,
        bind = %config.bind,
        db_path = %config.db_path.display(),
        "Starting livedash"
    );

    let server = match Server::build(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
