use bookwire_instrument::ChainId;
use std::time::Duration;
use thiserror::Error;

/// Service configuration, loaded from the environment.
///
/// Recognised options: `PORT`, `HEALTH_PORT`, `REDIS_URL`, `DATABASE_URL`,
/// `DEFAULT_CHAIN_ID`, `CONSUMER_GROUP`, `CONSUMER_ID`, `BATCH_SIZE`,
/// `POLL_INTERVAL` (milliseconds), `ENABLE_WEBSOCKET_BLOCK_NUMBER`,
/// `LOG_LEVEL`.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket / REST listener port.
    pub port: u16,
    /// HTTP health endpoint port.
    pub health_port: u16,
    /// Stream bus endpoint.
    pub redis_url: String,
    /// External entity-store connection string, surfaced to the embedding
    /// deployment; the service itself talks to the store through the
    /// `EntityStore` seam.
    pub database_url: Option<String>,
    /// Chain namespace for stream keys and the consumer group.
    pub chain: ChainId,
    /// Consumer group override; defaults to `websocket-consumers-<chainId>`.
    pub consumer_group: Option<String>,
    pub consumer_id: String,
    pub batch_size: usize,
    /// Consumer block timeout.
    pub poll_interval: Duration,
    /// Explicit sync watermark; else derived from the cached value or the
    /// boot head.
    pub enable_websocket_block_number: Option<u64>,
    /// Default tracing directive when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("invalid value for {key}: {value}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

fn parse_env<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError { key, value }),
        _ => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chain = ChainId(parse_env::<u64>("DEFAULT_CHAIN_ID")?.unwrap_or(1));
        Ok(Self {
            port: parse_env("PORT")?.unwrap_or(8081),
            health_port: parse_env("HEALTH_PORT")?.unwrap_or(8082),
            redis_url: parse_env("REDIS_URL")?
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            database_url: parse_env("DATABASE_URL")?,
            chain,
            consumer_group: parse_env("CONSUMER_GROUP")?,
            consumer_id: parse_env("CONSUMER_ID")?
                .unwrap_or_else(|| format!("consumer-{}", std::process::id())),
            batch_size: parse_env("BATCH_SIZE")?.unwrap_or(10),
            poll_interval: Duration::from_millis(parse_env("POLL_INTERVAL")?.unwrap_or(1000)),
            enable_websocket_block_number: parse_env("ENABLE_WEBSOCKET_BLOCK_NUMBER")?,
            log_level: parse_env("LOG_LEVEL")?.unwrap_or_else(|| "info".to_string()),
        })
    }

    /// The effective consumer group name.
    pub fn consumer_group(&self) -> String {
        self.consumer_group
            .clone()
            .unwrap_or_else(|| format!("websocket-consumers-{}", self.chain.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Avoid touching the process environment: defaults are what an
        // empty environment produces for these keys.
        let config = Config {
            port: 8081,
            health_port: 8082,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            database_url: None,
            chain: ChainId(1),
            consumer_group: None,
            consumer_id: "consumer-1".to_string(),
            batch_size: 10,
            poll_interval: Duration::from_millis(1000),
            enable_websocket_block_number: None,
            log_level: "info".to_string(),
        };
        assert_eq!(config.consumer_group(), "websocket-consumers-1");

        let config = Config {
            consumer_group: Some("custom".to_string()),
            ..config
        };
        assert_eq!(config.consumer_group(), "custom");
    }
}
