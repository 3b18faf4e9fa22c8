use super::{Record, RecordId, StreamBatch, StreamBus};
use crate::{codec::FieldMap, error::BusError};
use async_trait::async_trait;
use redis::{
    AsyncCommands, ErrorKind,
    aio::MultiplexedConnection,
    streams::{StreamReadOptions, StreamReadReply},
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Redis Streams backed [`StreamBus`] used in production.
///
/// Appends and control commands share a multiplexed connection; blocking
/// group reads run on a dedicated connection so `XREADGROUP BLOCK` cannot
/// stall unrelated commands.
#[derive(Clone)]
pub struct RedisStreamBus {
    conn: MultiplexedConnection,
    read_conn: Arc<tokio::sync::Mutex<MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisStreamBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamBus").finish()
    }
}

impl RedisStreamBus {
    /// Connect to the provided Redis URL, eg/ `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(BusError::from)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        let read_conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self {
            conn,
            read_conn: Arc::new(tokio::sync::Mutex::new(read_conn)),
        })
    }
}

#[async_trait]
impl StreamBus for RedisStreamBus {
    async fn append(&self, stream: &str, fields: FieldMap) -> Result<RecordId, BusError> {
        let id: String = self.conn.clone().xadd_map(stream, "*", fields).await?;
        Ok(RecordId::from(id))
    }

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        create_stream: bool,
    ) -> Result<(), BusError> {
        // Groups start at "0" so a freshly created group replays the stream
        // backlog rather than only tailing new appends.
        let mut conn = self.conn.clone();
        let result: Result<String, redis::RedisError> = if create_stream {
            conn.xgroup_create_mkstream(stream, group, "0").await
        } else {
            conn.xgroup_create(stream, group, "0").await
        };

        match result {
            Ok(_) => Ok(()),
            // BUSYGROUP: the group already exists, which is the idempotent
            // success case.
            Err(error) if error.code() == Some("BUSYGROUP") => Ok(()),
            Err(error) if error.kind() == ErrorKind::ResponseError => {
                Err(BusError::GroupNotFound {
                    stream: stream.to_string(),
                    group: group.to_string(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        streams: &[String],
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamBatch>, BusError> {
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block.as_millis() as usize);
        let cursors = vec![">"; streams.len()];

        let reply: StreamReadReply = {
            let mut conn = self.read_conn.lock().await;
            match conn.xread_options(streams, &cursors, &options).await {
                Ok(reply) => reply,
                Err(error) if error.code() == Some("NOGROUP") => {
                    return Err(BusError::GroupNotFound {
                        stream: streams.first().cloned().unwrap_or_default(),
                        group: group.to_string(),
                    });
                }
                Err(error) => return Err(error.into()),
            }
        };

        let batches = reply
            .keys
            .into_iter()
            .map(|key| {
                let records = key
                    .ids
                    .into_iter()
                    .map(|entry| {
                        let fields = entry
                            .map
                            .into_iter()
                            .filter_map(|(field, value)| {
                                match redis::from_redis_value::<String>(&value) {
                                    Ok(value) => Some((field, value)),
                                    Err(error) => {
                                        warn!(
                                            %field,
                                            %error,
                                            stream = %key.key,
                                            "discarding non-string stream record field"
                                        );
                                        None
                                    }
                                }
                            })
                            .collect::<FieldMap>();
                        Record {
                            id: RecordId::from(entry.id),
                            fields,
                        }
                    })
                    .collect();
                StreamBatch {
                    stream: key.key,
                    records,
                }
            })
            .collect();

        Ok(batches)
    }

    async fn ack(&self, stream: &str, group: &str, id: &RecordId) -> Result<(), BusError> {
        let _acked: i64 = self
            .conn
            .clone()
            .xack(stream, group, &[id.0.as_str()])
            .await?;
        Ok(())
    }

    async fn destroy_group(&self, stream: &str, group: &str) -> Result<(), BusError> {
        let result: Result<i64, redis::RedisError> =
            self.conn.clone().xgroup_destroy(stream, group).await;
        match result {
            Ok(_) => Ok(()),
            // Destroying a group on an absent stream is idempotent cleanup.
            Err(error) if error.kind() == ErrorKind::ResponseError => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn stream_exists(&self, stream: &str) -> Result<bool, BusError> {
        Ok(self.conn.clone().exists(stream).await?)
    }

    async fn ping(&self) -> Result<(), BusError> {
        let _pong: String = redis::cmd("PING")
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }
}
