use bookwire::{config::Config, logging};
use bookwire_data::{
    market::MarketService,
    store::memory::InMemoryEntityStore,
    sync::{RedisWatermarkCache, SyncGate},
};
use bookwire_gateway::{
    GatewayConfig,
    consumer::EventConsumer,
    registry::Registry,
    server::{AppState, gateway_router, health_router},
};
use bookwire_integration::stream::redis::RedisStreamBus;
use std::sync::{Arc, atomic::Ordering};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    logging::init_logging(&config.log_level);
    info!(
        chain = %config.chain,
        port = config.port,
        health_port = config.health_port,
        "starting bookwire"
    );

    let bus = Arc::new(RedisStreamBus::connect(&config.redis_url).await?);
    let cache = RedisWatermarkCache::connect(&config.redis_url).await?;
    let store = Arc::new(InMemoryEntityStore::new());

    // Resolve the watermark once per process: explicit override, else the
    // cached value, else the head observed at boot (zero here; the indexer
    // embedding the Reducer passes the real head when it drives events).
    let gate = SyncGate::initialise(
        &cache,
        config.chain,
        config.enable_websocket_block_number,
        0,
    )
    .await?;
    info!(watermark = gate.watermark(), "sync watermark resolved");

    let registry = Arc::new(Registry::new());
    let state = AppState {
        registry: Arc::clone(&registry),
        market: MarketService::new(Arc::clone(&store), config.chain),
        store: Arc::clone(&store),
        bus: Arc::clone(&bus),
        config: GatewayConfig::default(),
    };

    let consumer = Arc::new(EventConsumer::new(
        Arc::clone(&bus),
        Arc::clone(&registry),
        config.chain,
        config.consumer_group(),
        config.consumer_id.clone(),
        config.batch_size,
        config.poll_interval,
    ));
    consumer.init_groups().await?;
    let consumer_task = tokio::spawn({
        let consumer = Arc::clone(&consumer);
        async move { consumer.run().await }
    });

    let gateway_listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(addr = %gateway_listener.local_addr()?, "websocket gateway listening");
    let gateway_task = tokio::spawn(
        axum::serve(gateway_listener, gateway_router(state.clone())).into_future(),
    );

    let health_listener = TcpListener::bind(("0.0.0.0", config.health_port)).await?;
    info!(addr = %health_listener.local_addr()?, "health endpoint listening");
    let health_task = tokio::spawn(axum::serve(health_listener, health_router(state)).into_future());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    consumer.stop_handle().store(false, Ordering::Release);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), consumer_task).await;
    gateway_task.abort();
    health_task.abort();

    info!("bookwire stopped");
    Ok(())
}
