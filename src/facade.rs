//! Capability routing over a store connection.
//!
//! `OpsFacade` selects the per-data-structure sub-API for a call without
//! adding any behavior of its own; the bound variants fix the key once so
//! repeated operations against the same entry read naturally.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{
    ClusterOps, GeoOps, HashOps, HyperLogLogOps, KeyOps, ListOps, SetOps, StoreConnection,
    StreamOps, ValueOps, ZSetOps,
};
use crate::error::HelperError;
use crate::reply::Reply;

/// Routes calls to the typed sub-APIs of the underlying connection.
///
/// Pure delegation: no validation, no transformation. Failures are whatever
/// the connection raises.
pub struct OpsFacade<C> {
    conn: Arc<C>,
}

impl<C> Clone for OpsFacade<C> {
    fn clone(&self) -> Self {
        OpsFacade {
            conn: Arc::clone(&self.conn),
        }
    }
}

impl<C> OpsFacade<C>
where
    C: StoreConnection,
{
    /// Wrap an injected connection.
    pub fn new(conn: Arc<C>) -> Self {
        OpsFacade { conn }
    }

    /// The underlying connection handle.
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Value (plain key/value) operations.
    pub fn ops_for_value(&self) -> &dyn ValueOps {
        &*self.conn
    }

    /// Hash operations.
    pub fn ops_for_hash(&self) -> &dyn HashOps {
        &*self.conn
    }

    /// Whole-key operations (delete, expire, type, exists).
    pub fn ops_for_key(&self) -> &dyn KeyOps {
        &*self.conn
    }

    /// Set operations.
    pub fn ops_for_set(&self) -> &dyn SetOps {
        &*self.conn
    }

    /// List operations.
    pub fn ops_for_list(&self) -> &dyn ListOps {
        &*self.conn
    }

    /// Sorted-set operations.
    pub fn ops_for_zset(&self) -> &dyn ZSetOps {
        &*self.conn
    }

    /// Geospatial operations.
    pub fn ops_for_geo(&self) -> &dyn GeoOps {
        &*self.conn
    }

    /// HyperLogLog operations.
    pub fn ops_for_hyper_log_log(&self) -> &dyn HyperLogLogOps {
        &*self.conn
    }

    /// Stream operations.
    pub fn ops_for_stream(&self) -> &dyn StreamOps {
        &*self.conn
    }

    /// Cluster-level operations (liveness, cluster state).
    pub fn ops_for_cluster(&self) -> &dyn ClusterOps {
        &*self.conn
    }

    /// Value operations bound to one key.
    pub fn bound_value_ops<'a>(&'a self, key: &str) -> BoundValueOps<'a> {
        BoundValueOps {
            ops: self.ops_for_value(),
            key: key.to_string(),
        }
    }

    /// Hash operations bound to one key.
    pub fn bound_hash_ops<'a>(&'a self, key: &str) -> BoundHashOps<'a> {
        BoundHashOps {
            ops: self.ops_for_hash(),
            key: key.to_string(),
        }
    }

    /// Set operations bound to one key.
    pub fn bound_set_ops<'a>(&'a self, key: &str) -> BoundSetOps<'a> {
        BoundSetOps {
            ops: self.ops_for_set(),
            key: key.to_string(),
        }
    }

    /// List operations bound to one key.
    pub fn bound_list_ops<'a>(&'a self, key: &str) -> BoundListOps<'a> {
        BoundListOps {
            ops: self.ops_for_list(),
            key: key.to_string(),
        }
    }

    /// Sorted-set operations bound to one key.
    pub fn bound_zset_ops<'a>(&'a self, key: &str) -> BoundZSetOps<'a> {
        BoundZSetOps {
            ops: self.ops_for_zset(),
            key: key.to_string(),
        }
    }

    /// Geospatial operations bound to one key.
    pub fn bound_geo_ops<'a>(&'a self, key: &str) -> BoundGeoOps<'a> {
        BoundGeoOps {
            ops: self.ops_for_geo(),
            key: key.to_string(),
        }
    }

    /// Stream operations bound to one key.
    pub fn bound_stream_ops<'a>(&'a self, key: &str) -> BoundStreamOps<'a> {
        BoundStreamOps {
            ops: self.ops_for_stream(),
            key: key.to_string(),
        }
    }
}

/// Value operations with the key fixed at construction.
pub struct BoundValueOps<'a> {
    ops: &'a dyn ValueOps,
    key: String,
}

impl BoundValueOps<'_> {
    pub async fn get(&self) -> Result<Option<String>, HelperError> {
        self.ops.get(&self.key).await
    }

    pub async fn set(&self, payload: &str) -> Result<(), HelperError> {
        self.ops.set(&self.key, payload).await
    }

    pub async fn set_with_ttl(&self, payload: &str, ttl: Duration) -> Result<(), HelperError> {
        self.ops.set_with_ttl(&self.key, payload, ttl).await
    }

    pub async fn increment(&self, delta: i64) -> Result<Reply<i64>, HelperError> {
        self.ops.increment(&self.key, delta).await
    }
}

/// Hash operations with the key fixed at construction.
pub struct BoundHashOps<'a> {
    ops: &'a dyn HashOps,
    key: String,
}

impl BoundHashOps<'_> {
    pub async fn get_field(&self, field: &str) -> Result<Option<String>, HelperError> {
        self.ops.get_field(&self.key, field).await
    }

    pub async fn entries(&self) -> Result<HashMap<String, String>, HelperError> {
        self.ops.entries(&self.key).await
    }

    pub async fn put_field(&self, field: &str, payload: &str) -> Result<(), HelperError> {
        self.ops.put_field(&self.key, field, payload).await
    }

    pub async fn fields(&self) -> Result<Reply<HashSet<String>>, HelperError> {
        self.ops.fields(&self.key).await
    }

    pub async fn has_field(&self, field: &str) -> Result<Reply<bool>, HelperError> {
        self.ops.has_field(&self.key, field).await
    }
}

/// Set operations with the key fixed at construction.
pub struct BoundSetOps<'a> {
    ops: &'a dyn SetOps,
    key: String,
}

impl BoundSetOps<'_> {
    pub async fn add(&self, members: &[String]) -> Result<i64, HelperError> {
        self.ops.add(&self.key, members).await
    }

    pub async fn remove(&self, members: &[String]) -> Result<i64, HelperError> {
        self.ops.remove(&self.key, members).await
    }

    pub async fn members(&self) -> Result<HashSet<String>, HelperError> {
        self.ops.members(&self.key).await
    }

    pub async fn contains(&self, member: &str) -> Result<bool, HelperError> {
        self.ops.contains(&self.key, member).await
    }

    pub async fn size(&self) -> Result<i64, HelperError> {
        self.ops.size(&self.key).await
    }
}

/// List operations with the key fixed at construction.
pub struct BoundListOps<'a> {
    ops: &'a dyn ListOps,
    key: String,
}

impl BoundListOps<'_> {
    pub async fn push_front(&self, payload: &str) -> Result<i64, HelperError> {
        self.ops.push_front(&self.key, payload).await
    }

    pub async fn push_back(&self, payload: &str) -> Result<i64, HelperError> {
        self.ops.push_back(&self.key, payload).await
    }

    pub async fn pop_front(&self) -> Result<Option<String>, HelperError> {
        self.ops.pop_front(&self.key).await
    }

    pub async fn range(&self, start: i64, stop: i64) -> Result<Vec<String>, HelperError> {
        self.ops.range(&self.key, start, stop).await
    }

    pub async fn len(&self) -> Result<i64, HelperError> {
        self.ops.len(&self.key).await
    }
}

/// Sorted-set operations with the key fixed at construction.
pub struct BoundZSetOps<'a> {
    ops: &'a dyn ZSetOps,
    key: String,
}

impl BoundZSetOps<'_> {
    pub async fn add(&self, member: &str, score: f64) -> Result<bool, HelperError> {
        self.ops.add(&self.key, member, score).await
    }

    pub async fn remove(&self, members: &[String]) -> Result<i64, HelperError> {
        self.ops.remove(&self.key, members).await
    }

    pub async fn score(&self, member: &str) -> Result<Option<f64>, HelperError> {
        self.ops.score(&self.key, member).await
    }

    pub async fn range(&self, start: i64, stop: i64) -> Result<Vec<String>, HelperError> {
        self.ops.range(&self.key, start, stop).await
    }

    pub async fn size(&self) -> Result<i64, HelperError> {
        self.ops.size(&self.key).await
    }
}

/// Geospatial operations with the key fixed at construction.
pub struct BoundGeoOps<'a> {
    ops: &'a dyn GeoOps,
    key: String,
}

impl BoundGeoOps<'_> {
    pub async fn add(
        &self,
        longitude: f64,
        latitude: f64,
        member: &str,
    ) -> Result<i64, HelperError> {
        self.ops.add(&self.key, longitude, latitude, member).await
    }

    pub async fn position(&self, member: &str) -> Result<Option<(f64, f64)>, HelperError> {
        self.ops.position(&self.key, member).await
    }

    pub async fn distance_meters(&self, from: &str, to: &str) -> Result<Option<f64>, HelperError> {
        self.ops.distance_meters(&self.key, from, to).await
    }
}

/// Stream operations with the key fixed at construction.
pub struct BoundStreamOps<'a> {
    ops: &'a dyn StreamOps,
    key: String,
}

impl BoundStreamOps<'_> {
    pub async fn append(&self, entries: &[(String, String)]) -> Result<String, HelperError> {
        self.ops.append(&self.key, entries).await
    }

    pub async fn len(&self) -> Result<i64, HelperError> {
        self.ops.len(&self.key).await
    }

    pub async fn delete_entries(&self, ids: &[String]) -> Result<i64, HelperError> {
        self.ops.delete_entries(&self.key, ids).await
    }
}
