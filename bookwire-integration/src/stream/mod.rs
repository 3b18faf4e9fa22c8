use crate::{codec::FieldMap, error::BusError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// In-memory [`StreamBus`] used for testing.
pub mod memory;

/// Redis Streams backed [`StreamBus`] used in production.
pub mod redis;

/// Identifier assigned to a record on append. Monotonic within a stream;
/// Redis `<ms>-<seq>` form in production, `<seq>-0` in memory.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct RecordId(pub String);

impl<S: Into<String>> From<S> for RecordId {
    fn from(input: S) -> Self {
        Self(input.into())
    }
}

/// A single stream record: assigned id plus flat string fields.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: FieldMap,
}

/// Records delivered from one stream by a group read.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct StreamBatch {
    pub stream: String,
    pub records: Vec<Record>,
}

/// Append-only ordered streams with consumer groups.
///
/// Contract:
/// - [`append`](Self::append) assigns monotonic ids; total order is preserved
///   per stream and appends are durable before the call returns.
/// - [`create_group`](Self::create_group) is idempotent. Without
///   `create_stream`, creating a group on an absent stream fails.
/// - [`read_group`](Self::read_group) blocks up to `block` for unclaimed
///   records; every delivered id is pending for the (group, consumer) pair
///   until [`ack`](Self::ack)ed. Pending records of a dead consumer are
///   redelivered to other consumers of the same group.
/// - [`destroy_group`](Self::destroy_group) is idempotent cleanup.
#[async_trait]
pub trait StreamBus: Send + Sync {
    async fn append(&self, stream: &str, fields: FieldMap) -> Result<RecordId, BusError>;

    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        create_stream: bool,
    ) -> Result<(), BusError>;

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        streams: &[String],
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamBatch>, BusError>;

    async fn ack(&self, stream: &str, group: &str, id: &RecordId) -> Result<(), BusError>;

    async fn destroy_group(&self, stream: &str, group: &str) -> Result<(), BusError>;

    async fn stream_exists(&self, stream: &str) -> Result<bool, BusError>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> Result<(), BusError>;
}
