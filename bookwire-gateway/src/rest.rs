//! REST endpoint handlers.
//!
//! Every response is `{success, data?|error?}`; missing required parameters
//! and unknown symbols translate to 400, infrastructure failures to 500.

use crate::server::AppState;
use alloy_primitives::Address;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bookwire_data::{
    candle::Interval,
    error::DataError,
    market::{
        DEFAULT_DEPTH_LIMIT, DEFAULT_KLINES_LIMIT, DEFAULT_ORDERS_LIMIT, DEFAULT_TRADES_LIMIT,
    },
    store::EntityStore,
};
use bookwire_instrument::symbol::Symbol;
use bookwire_integration::stream::StreamBus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// `{success, data?|error?}` envelope for every REST response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

pub fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(error.into()),
        }),
    )
        .into_response()
}

fn from_data_error(error: DataError) -> Response {
    match &error {
        DataError::SymbolUnknown(_) | DataError::MalformedEvent { .. } => {
            failure(StatusCode::BAD_REQUEST, error.to_string())
        }
        _ => failure(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}

fn require<T>(value: Option<T>, name: &str) -> Result<T, Response> {
    value.ok_or_else(|| failure(StatusCode::BAD_REQUEST, format!("missing parameter: {name}")))
}

fn parse_address(value: &str) -> Result<Address, Response> {
    Address::from_str(value)
        .map_err(|_| failure(StatusCode::BAD_REQUEST, format!("invalid address: {value}")))
}

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub symbol: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct KlinesQuery {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub limit: Option<usize>,
    #[serde(rename = "startTime")]
    pub start_time: Option<u64>,
    #[serde(rename = "endTime")]
    pub end_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub symbol: Option<String>,
    pub address: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub symbol: Option<String>,
    pub limit: Option<usize>,
    // Accepted for surface compatibility; recent trades are pool-scoped.
    #[allow(dead_code)]
    pub user: Option<String>,
}

macro_rules! try_param {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}

pub async fn pairs<S, B>(State(state): State<AppState<S, B>>) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    match state.market.pairs().await {
        Ok(pairs) => ok(pairs),
        Err(error) => from_data_error(error),
    }
}

pub async fn currencies<S, B>(State(state): State<AppState<S, B>>) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    match state.market.currencies().await {
        Ok(currencies) => ok(currencies),
        Err(error) => from_data_error(error),
    }
}

pub async fn currency<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<AddressQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let address = try_param!(require(query.address, "address"));
    let address = try_param!(parse_address(&address));
    match state.market.currency(&address).await {
        Ok(Some(currency)) => ok(currency),
        Ok(None) => failure(StatusCode::NOT_FOUND, "currency not found"),
        Err(error) => from_data_error(error),
    }
}

pub async fn ticker_price<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<SymbolQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    match state.market.ticker_price(&Symbol::new(symbol)).await {
        Ok(price) => ok(price),
        Err(error) => from_data_error(error),
    }
}

pub async fn ticker_24hr<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<SymbolQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    match state.market.ticker_24hr(&Symbol::new(symbol)).await {
        Ok(ticker) => ok(ticker),
        Err(error) => from_data_error(error),
    }
}

pub async fn depth<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<SymbolQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    let limit = query.limit.unwrap_or(DEFAULT_DEPTH_LIMIT).min(1_000);
    match state.market.depth(&Symbol::new(symbol), limit).await {
        Ok(book) => ok(book),
        Err(error) => from_data_error(error),
    }
}

pub async fn trades<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<TradesQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    let limit = query.limit.unwrap_or(DEFAULT_TRADES_LIMIT).min(1_000);
    match state.market.trades(&Symbol::new(symbol), limit).await {
        Ok(trades) => ok(trades),
        Err(error) => from_data_error(error),
    }
}

pub async fn klines<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<KlinesQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    let interval = try_param!(require(query.interval, "interval"));
    let Ok(interval) = Interval::from_str(&interval) else {
        return failure(
            StatusCode::BAD_REQUEST,
            format!("invalid interval: {interval}"),
        );
    };
    let limit = query.limit.unwrap_or(DEFAULT_KLINES_LIMIT).min(1_000);
    // Range bounds arrive in milliseconds, bucket open times are seconds.
    let start_time = query.start_time.map(|ms| ms / 1000);
    let end_time = query.end_time.map(|ms| ms / 1000);
    match state
        .market
        .klines(&Symbol::new(symbol), interval, start_time, end_time, limit)
        .await
    {
        Ok(klines) => ok(klines),
        Err(error) => from_data_error(error),
    }
}

pub async fn open_orders<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<OrdersQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    let address = try_param!(require(query.address, "address"));
    let address = try_param!(parse_address(&address));
    match state
        .market
        .open_orders(&Symbol::new(symbol), &address)
        .await
    {
        Ok(orders) => ok(orders),
        Err(error) => from_data_error(error),
    }
}

pub async fn all_orders<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<OrdersQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let symbol = try_param!(require(query.symbol, "symbol"));
    let address = try_param!(require(query.address, "address"));
    let address = try_param!(parse_address(&address));
    let limit = query.limit.unwrap_or(DEFAULT_ORDERS_LIMIT).min(1_000);
    match state
        .market
        .all_orders(&Symbol::new(symbol), &address, limit)
        .await
    {
        Ok(orders) => ok(orders),
        Err(error) => from_data_error(error),
    }
}

pub async fn account<S, B>(
    State(state): State<AppState<S, B>>,
    Query(query): Query<AddressQuery>,
) -> Response
where
    S: EntityStore + 'static,
    B: StreamBus + 'static,
{
    let address = try_param!(require(query.address, "address"));
    let address = try_param!(parse_address(&address));
    match state.market.account(&address).await {
        Ok(balances) => ok(balances),
        Err(error) => from_data_error(error),
    }
}

pub async fn not_found() -> Response {
    failure(StatusCode::NOT_FOUND, "route not found")
}
