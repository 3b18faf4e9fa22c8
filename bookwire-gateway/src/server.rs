//! HTTP / WebSocket routers and the health endpoint.

use crate::{GatewayConfig, registry::Registry, rest, session::run_session};
use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use bookwire_data::{market::MarketService, store::EntityStore};
use bookwire_integration::stream::StreamBus;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Shared handler state for the WebSocket, REST, and health surfaces.
#[derive(Debug)]
pub struct AppState<Store, Bus> {
    pub registry: Arc<Registry>,
    pub market: MarketService<Store>,
    pub store: Arc<Store>,
    pub bus: Arc<Bus>,
    pub config: GatewayConfig,
}

impl<Store, Bus> Clone for AppState<Store, Bus> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            market: self.market.clone(),
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
            config: self.config.clone(),
        }
    }
}

/// Main listener router: public / user WebSocket endpoints plus the REST
/// surface under `/api`.
pub fn gateway_router<S, B>(state: AppState<S, B>) -> Router
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    Router::new()
        .route("/", get(ws_public::<S, B>))
        .route("/ws", get(ws_public::<S, B>))
        .route("/ws/{address}", get(ws_user::<S, B>))
        .route("/api/pairs", get(rest::pairs::<S, B>))
        .route("/api/markets", get(rest::pairs::<S, B>))
        .route("/api/currencies", get(rest::currencies::<S, B>))
        .route("/api/currency", get(rest::currency::<S, B>))
        .route("/api/ticker/price", get(rest::ticker_price::<S, B>))
        .route("/api/ticker/24hr", get(rest::ticker_24hr::<S, B>))
        .route("/api/depth", get(rest::depth::<S, B>))
        .route("/api/trades", get(rest::trades::<S, B>))
        .route("/api/klines", get(rest::klines::<S, B>))
        .route("/api/openOrders", get(rest::open_orders::<S, B>))
        .route("/api/allOrders", get(rest::all_orders::<S, B>))
        .route("/api/account", get(rest::account::<S, B>))
        .fallback(rest::not_found)
        .with_state(state)
}

/// Health listener router.
pub fn health_router<S, B>(state: AppState<S, B>) -> Router
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    Router::new()
        .route("/health", get(health::<S, B>))
        .with_state(state)
}

async fn ws_public<S, B>(
    State(state): State<AppState<S, B>>,
    upgrade: WebSocketUpgrade,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let registry = Arc::clone(&state.registry);
    let config = state.config.clone();
    upgrade.on_upgrade(move |socket| run_session(socket, registry, config, None))
}

async fn ws_user<S, B>(
    State(state): State<AppState<S, B>>,
    Path(address): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let Some(address) = normalize_address(&address) else {
        return rest::failure(
            StatusCode::BAD_REQUEST,
            format!("invalid user address: {address}"),
        );
    };
    debug!(%address, "user websocket upgrade");
    let registry = Arc::clone(&state.registry);
    let config = state.config.clone();
    upgrade.on_upgrade(move |socket| run_session(socket, registry, config, Some(address)))
}

/// Validate and lowercase a `/ws/<address>` path segment: 0x + 40 hex chars.
pub fn normalize_address(input: &str) -> Option<String> {
    let hex = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X"))?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex.to_ascii_lowercase()))
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    redis: bool,
    database: bool,
    websocket: WebsocketHealth,
}

#[derive(Debug, Serialize)]
struct WebsocketHealth {
    stats: crate::registry::GatewayStatsView,
}

async fn health<S, B>(State(state): State<AppState<S, B>>) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let redis = state.bus.ping().await.is_ok();
    let database = state.store.ping().await.is_ok();
    let healthy = redis && database;

    let body = HealthBody {
        status: if healthy { "ok" } else { "degraded" },
        redis,
        database,
        websocket: WebsocketHealth {
            stats: state.registry.stats(),
        },
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}
