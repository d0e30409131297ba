use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::HelperError;
use crate::reply::{DataType, Reply};

/// Operations on plain value-type entries.
///
/// Payloads cross the connection boundary as serialized text; the helper layer
/// above owns the typed encode/decode.
#[async_trait]
pub trait ValueOps: Send + Sync {
    /// Read the payload stored under `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, HelperError>;

    /// Unconditionally write `payload` under `key`.
    async fn set(&self, key: &str, payload: &str) -> Result<(), HelperError>;

    /// Write `payload` under `key` with a relative TTL.
    ///
    /// The TTL is expected to be positive; the helper rejects non-positive
    /// durations before this call is made.
    async fn set_with_ttl(
        &self,
        key: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<(), HelperError>;

    /// Atomically add `delta` to the integer value under `key`.
    ///
    /// An absent key counts from zero. A non-integer value is a store error.
    async fn increment(&self, key: &str, delta: i64) -> Result<Reply<i64>, HelperError>;

    /// Atomically add `delta` to the float value under `key`.
    async fn increment_float(&self, key: &str, delta: f64) -> Result<Reply<f64>, HelperError>;
}

/// Operations on hash-type entries.
#[async_trait]
pub trait HashOps: Send + Sync {
    /// Read one field's payload, `None` when the field or key is absent.
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, HelperError>;

    /// Read all fields and payloads of the hash under `key`.
    async fn entries(&self, key: &str) -> Result<HashMap<String, String>, HelperError>;

    /// Unconditionally write one field.
    async fn put_field(&self, key: &str, field: &str, payload: &str) -> Result<(), HelperError>;

    /// Write multiple fields in one batched command.
    async fn put_fields(&self, key: &str, entries: &[(String, String)]) -> Result<(), HelperError>;

    /// Write one field only if it does not already exist.
    ///
    /// Returns `true` iff the field was absent and has been written.
    async fn put_field_if_absent(
        &self,
        key: &str,
        field: &str,
        payload: &str,
    ) -> Result<bool, HelperError>;

    /// All field names of the hash under `key`.
    async fn fields(&self, key: &str) -> Result<Reply<HashSet<String>>, HelperError>;

    /// Delete the given fields, returning how many existed and were removed.
    async fn delete_fields(&self, key: &str, fields: &[String]) -> Result<Reply<i64>, HelperError>;

    /// Whether `field` exists in the hash under `key`.
    async fn has_field(&self, key: &str, field: &str) -> Result<Reply<bool>, HelperError>;

    /// Atomically add `delta` to the integer value of one hash field.
    async fn increment_field(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Reply<i64>, HelperError>;

    /// Atomically add `delta` to the float value of one hash field.
    async fn increment_field_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<Reply<f64>, HelperError>;
}

/// Whole-key operations, independent of the entry's structural type.
#[async_trait]
pub trait KeyOps: Send + Sync {
    /// Delete one key. `Present(true)` iff the key existed.
    async fn delete(&self, key: &str) -> Result<Reply<bool>, HelperError>;

    /// Delete several keys in one batched command, returning the removal count.
    ///
    /// Callers are expected to short-circuit empty input before reaching the
    /// connection.
    async fn delete_all(&self, keys: &[String]) -> Result<Reply<i64>, HelperError>;

    /// Set a relative TTL on an existing key. `Present(false)` when the key
    /// does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<Reply<bool>, HelperError>;

    /// Set an absolute expiration deadline on an existing key.
    async fn expire_at(&self, key: &str, deadline: SystemTime) -> Result<Reply<bool>, HelperError>;

    /// Remaining TTL in seconds.
    ///
    /// `Present(PERPETUAL)` for a key with no expiry, `Absent` for a missing
    /// key.
    async fn ttl(&self, key: &str) -> Result<Reply<i64>, HelperError>;

    /// Whether `key` exists.
    async fn exists(&self, key: &str) -> Result<Reply<bool>, HelperError>;

    /// Structural type of the entry under `key`.
    async fn data_type(&self, key: &str) -> Result<DataType, HelperError>;
}

/// Operations on set-type entries.
#[async_trait]
pub trait SetOps: Send + Sync {
    /// Add members, returning how many were newly inserted.
    async fn add(&self, key: &str, members: &[String]) -> Result<i64, HelperError>;

    /// Remove members, returning how many were present and removed.
    async fn remove(&self, key: &str, members: &[String]) -> Result<i64, HelperError>;

    /// All members of the set under `key`.
    async fn members(&self, key: &str) -> Result<HashSet<String>, HelperError>;

    /// Whether `member` is in the set under `key`.
    async fn contains(&self, key: &str, member: &str) -> Result<bool, HelperError>;

    /// Cardinality of the set under `key`.
    async fn size(&self, key: &str) -> Result<i64, HelperError>;
}

/// Operations on list-type entries.
#[async_trait]
pub trait ListOps: Send + Sync {
    /// Prepend a payload, returning the new list length.
    async fn push_front(&self, key: &str, payload: &str) -> Result<i64, HelperError>;

    /// Append a payload, returning the new list length.
    async fn push_back(&self, key: &str, payload: &str) -> Result<i64, HelperError>;

    /// Pop from the head, `None` when the list is empty or missing.
    async fn pop_front(&self, key: &str) -> Result<Option<String>, HelperError>;

    /// Inclusive range of payloads; negative indices count from the tail.
    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, HelperError>;

    /// Length of the list under `key`.
    async fn len(&self, key: &str) -> Result<i64, HelperError>;
}

/// Operations on sorted-set-type entries.
#[async_trait]
pub trait ZSetOps: Send + Sync {
    /// Add one member with a score. Returns `true` iff the member was new.
    async fn add(&self, key: &str, member: &str, score: f64) -> Result<bool, HelperError>;

    /// Remove members, returning how many were present and removed.
    async fn remove(&self, key: &str, members: &[String]) -> Result<i64, HelperError>;

    /// Score of `member`, `None` when absent.
    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, HelperError>;

    /// Members in the inclusive rank range, ordered by ascending score.
    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, HelperError>;

    /// Cardinality of the sorted set under `key`.
    async fn size(&self, key: &str) -> Result<i64, HelperError>;
}

/// Geospatial operations.
#[async_trait]
pub trait GeoOps: Send + Sync {
    /// Register a member at a longitude/latitude, returning how many members
    /// were newly added.
    async fn add(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        member: &str,
    ) -> Result<i64, HelperError>;

    /// Position of `member` as `(longitude, latitude)`, `None` when absent.
    async fn position(&self, key: &str, member: &str)
        -> Result<Option<(f64, f64)>, HelperError>;

    /// Distance in meters between two members, `None` if either is absent.
    async fn distance_meters(
        &self,
        key: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<f64>, HelperError>;
}

/// HyperLogLog cardinality-estimation operations.
#[async_trait]
pub trait HyperLogLogOps: Send + Sync {
    /// Observe elements. Returns `true` iff the estimate changed.
    async fn add(&self, key: &str, elements: &[String]) -> Result<bool, HelperError>;

    /// Approximate number of distinct elements observed.
    async fn count(&self, key: &str) -> Result<i64, HelperError>;

    /// Merge the source structures into `destination`.
    async fn merge(&self, destination: &str, sources: &[String]) -> Result<(), HelperError>;
}

/// Cluster-level operations.
///
/// Topology management (slot assignment, resharding, failover) belongs to the
/// store and its client; this surface only reports liveness and cluster state.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Liveness check against the store.
    async fn ping(&self) -> Result<String, HelperError>;

    /// The store's cluster state report, one `field:value` line per entry.
    ///
    /// Standalone deployments report `cluster_enabled:0`.
    async fn cluster_info(&self) -> Result<String, HelperError>;
}

/// Append-log (stream) operations.
#[async_trait]
pub trait StreamOps: Send + Sync {
    /// Append one entry of field/payload pairs, returning its generated id.
    async fn append(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<String, HelperError>;

    /// Number of entries in the stream under `key`.
    async fn len(&self, key: &str) -> Result<i64, HelperError>;

    /// Delete entries by id, returning how many were removed.
    async fn delete_entries(&self, key: &str, ids: &[String]) -> Result<i64, HelperError>;
}

/// A capability-typed handle to the backing store.
///
/// `StoreConnection` is the composition of the narrow per-data-structure
/// capability traits. The connection is injected into the helper, assumed safe
/// for concurrent use, and owns pooling, timeouts and cancellation; the layers
/// above issue single-attempt commands and never retry.
pub trait StoreConnection:
    ValueOps
    + HashOps
    + KeyOps
    + SetOps
    + ListOps
    + ZSetOps
    + GeoOps
    + HyperLogLogOps
    + StreamOps
    + ClusterOps
{
}

impl<T> StoreConnection for T where
    T: ValueOps
        + HashOps
        + KeyOps
        + SetOps
        + ListOps
        + ZSetOps
        + GeoOps
        + HyperLogLogOps
        + StreamOps
        + ClusterOps
{
}
