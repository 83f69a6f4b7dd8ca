use board_server::config::DEFAULT_CONFIG_PATH;
use board_server::{GameServer, ServerConfig, ServerError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
/// Activates tracing, loads the configuration, binds the room server and
/// runs until the process is stopped. An external registrar is expected to
/// advertise the bound port over mDNS.
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = ServerConfig::load(&config_path).await?;

    let handle = GameServer::with_defaults(config)?.bind().await?;
    tracing::info!(
        port = handle.port(),
        instance = protocol::DEFAULT_INSTANCE_NAME,
        service = protocol::SERVICE_TYPE,
        "Board server up."
    );

    handle.join().await;
    Ok(())
}
