use super::{Record, RecordId, StreamBatch, StreamBus};
use crate::{codec::FieldMap, error::BusError};
use async_trait::async_trait;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Notify;

/// In-memory [`StreamBus`] used for testing.
///
/// Preserves the production contract: per-stream total order, idempotent
/// group management, pending-until-ack delivery, and redelivery of another
/// consumer's unacked records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStreamBus {
    inner: Arc<Mutex<FnvHashMap<String, StreamState>>>,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct StreamState {
    next_seq: u64,
    entries: Vec<(RecordId, FieldMap)>,
    groups: FnvHashMap<String, GroupState>,
}

#[derive(Debug, Default)]
struct GroupState {
    cursor: usize,
    pending: Vec<Pending>,
}

#[derive(Debug)]
struct Pending {
    index: usize,
    consumer: String,
}

impl InMemoryStreamBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records ever appended to the stream. Test helper.
    pub fn len(&self, stream: &str) -> usize {
        self.inner
            .lock()
            .get(stream)
            .map(|state| state.entries.len())
            .unwrap_or(0)
    }

    /// Number of delivered-but-unacked records for a (stream, group). Test helper.
    pub fn pending_len(&self, stream: &str, group: &str) -> usize {
        self.inner
            .lock()
            .get(stream)
            .and_then(|state| state.groups.get(group))
            .map(|group| group.pending.len())
            .unwrap_or(0)
    }

    fn try_read(
        &self,
        group: &str,
        consumer: &str,
        streams: &[String],
        count: usize,
    ) -> Result<Vec<StreamBatch>, BusError> {
        let mut inner = self.inner.lock();
        let mut batches = Vec::new();

        for stream in streams {
            let Some(state) = inner.get_mut(stream.as_str()) else {
                return Err(BusError::GroupNotFound {
                    stream: stream.clone(),
                    group: group.to_string(),
                });
            };
            let StreamState {
                entries, groups, ..
            } = state;
            let Some(group_state) = groups.get_mut(group) else {
                return Err(BusError::GroupNotFound {
                    stream: stream.clone(),
                    group: group.to_string(),
                });
            };

            let mut records = Vec::new();

            // Redeliver unacked records that were claimed by other consumers
            // of the same group.
            for pending in group_state.pending.iter_mut() {
                if records.len() >= count {
                    break;
                }
                if pending.consumer != consumer {
                    pending.consumer = consumer.to_string();
                    let (id, fields) = &entries[pending.index];
                    records.push(Record {
                        id: id.clone(),
                        fields: fields.clone(),
                    });
                }
            }

            while records.len() < count && group_state.cursor < entries.len() {
                let index = group_state.cursor;
                let (id, fields) = &entries[index];
                records.push(Record {
                    id: id.clone(),
                    fields: fields.clone(),
                });
                group_state.pending.push(Pending {
                    index,
                    consumer: consumer.to_string(),
                });
                group_state.cursor += 1;
            }

            if !records.is_empty() {
                batches.push(StreamBatch {
                    stream: stream.clone(),
                    records,
                });
            }
        }

        Ok(batches)
    }
}

#[async_trait]
impl StreamBus for InMemoryStreamBus {
    async fn append(&self, stream: &str, fields: FieldMap) -> Result<RecordId, BusError> {
        let id = {
            let mut inner = self.inner.lock();
            let state = inner.entry(stream.to_string()).or_default();
            state.next_seq += 1;
            let id = RecordId::from(format!("{}-0", state.next_seq));
            state.entries.push((id.clone(), fields));
            id
        };
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        create_stream: bool,
    ) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        let state = match (inner.get_mut(stream), create_stream) {
            (Some(state), _) => state,
            (None, true) => inner.entry(stream.to_string()).or_default(),
            (None, false) => {
                return Err(BusError::GroupNotFound {
                    stream: stream.to_string(),
                    group: group.to_string(),
                });
            }
        };

        // Idempotent: an existing group keeps its cursor and pending set.
        state.groups.entry(group.to_string()).or_default();
        Ok(())
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        streams: &[String],
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamBatch>, BusError> {
        let deadline = Instant::now() + block;
        loop {
            let notified = self.notify.notified();

            let batches = self.try_read(group, consumer, streams, count)?;
            if !batches.is_empty() {
                return Ok(batches);
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Ok(Vec::new());
            };
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            let _ = tokio::time::timeout(remaining, notified).await;
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &RecordId) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.get_mut(stream) {
            let StreamState {
                entries, groups, ..
            } = state;
            if let Some(group_state) = groups.get_mut(group) {
                group_state
                    .pending
                    .retain(|pending| &entries[pending.index].0 != id);
            }
        }
        Ok(())
    }

    async fn destroy_group(&self, stream: &str, group: &str) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.get_mut(stream) {
            state.groups.remove(group);
        }
        Ok(())
    }

    async fn stream_exists(&self, stream: &str) -> Result<bool, BusError> {
        Ok(self.inner.lock().contains_key(stream))
    }

    async fn ping(&self) -> Result<(), BusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FieldMapBuilder;

    fn fields(seq: u64) -> FieldMap {
        FieldMapBuilder::new().field("seq", seq).build()
    }

    #[tokio::test]
    async fn test_append_preserves_fifo_order() {
        let bus = InMemoryStreamBus::new();
        bus.create_group("chain:1:trades", "group", true)
            .await
            .unwrap();

        for seq in 0..5u64 {
            bus.append("chain:1:trades", fields(seq)).await.unwrap();
        }

        let batches = bus
            .read_group(
                "group",
                "consumer-0",
                &["chain:1:trades".to_string()],
                10,
                Duration::ZERO,
            )
            .await
            .unwrap();

        let observed = batches[0]
            .records
            .iter()
            .map(|record| record.fields["seq"].clone())
            .collect::<Vec<_>>();
        assert_eq!(observed, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_create_group_idempotent_and_requires_stream() {
        let bus = InMemoryStreamBus::new();

        assert!(matches!(
            bus.create_group("absent", "group", false).await,
            Err(BusError::GroupNotFound { .. })
        ));

        bus.create_group("stream", "group", true).await.unwrap();
        bus.append("stream", fields(1)).await.unwrap();
        bus.read_group(
            "group",
            "consumer-0",
            &["stream".to_string()],
            10,
            Duration::ZERO,
        )
        .await
        .unwrap();

        // Re-creating the group must not reset its cursor.
        bus.create_group("stream", "group", false).await.unwrap();
        let batches = bus
            .read_group(
                "group",
                "consumer-0",
                &["stream".to_string()],
                10,
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_unacked_records_redelivered_to_new_consumer() {
        let bus = InMemoryStreamBus::new();
        bus.create_group("stream", "group", true).await.unwrap();
        bus.append("stream", fields(7)).await.unwrap();

        let batches = bus
            .read_group(
                "group",
                "consumer-0",
                &["stream".to_string()],
                10,
                Duration::ZERO,
            )
            .await
            .unwrap();
        let id = batches[0].records[0].id.clone();
        assert_eq!(bus.pending_len("stream", "group"), 1);

        // consumer-0 dies without acking: consumer-1 inherits the record.
        let batches = bus
            .read_group(
                "group",
                "consumer-1",
                &["stream".to_string()],
                10,
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert_eq!(batches[0].records[0].id, id);

        bus.ack("stream", "group", &id).await.unwrap();
        assert_eq!(bus.pending_len("stream", "group"), 0);

        let batches = bus
            .read_group(
                "group",
                "consumer-1",
                &["stream".to_string()],
                10,
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_blocking_read_wakes_on_append() {
        let bus = InMemoryStreamBus::new();
        bus.create_group("stream", "group", true).await.unwrap();

        let reader = {
            let bus = bus.clone();
            tokio::spawn(async move {
                bus.read_group(
                    "group",
                    "consumer-0",
                    &["stream".to_string()],
                    10,
                    Duration::from_secs(5),
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.append("stream", fields(42)).await.unwrap();

        let batches = reader.await.unwrap().unwrap();
        assert_eq!(batches[0].records[0].fields["seq"], "42");
    }
}
