use cloudwatch_bridge::{Builder, Callbacks, ClientConfig, Error};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .compact()
        .init();

    let registry = Builder::from_config(ClientConfig::from_env()).with_aws().init()?;

    let mut metrics = registry.metrics_emitter("CloudWatchBridgeExample", "Map");
    metrics.set_observer(Arc::new(Callbacks::new(
        || info!("metric delivered"),
        |message: &str| warn!("metric failed: {message}"),
    )));
    metrics.emit("Forest", "PlayersOnline", 12.0);
    metrics.idle().await;

    let logs = registry.log_appender("CloudWatchBridgeExample", "session-1");
    logs.append("server started");
    logs.idle().await;
    logs.append("player joined");
    logs.append("player left");
    logs.idle().await;
    logs.flush()?;
    logs.idle().await;

    registry.shutdown();
    Ok(())
}
