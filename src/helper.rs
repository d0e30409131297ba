use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{de::DeserializeOwned, Serialize};

use crate::connection::StoreConnection;
use crate::error::HelperError;
use crate::facade::OpsFacade;
use crate::reply::{DataType, Reply};
use crate::utils::ttl_until;

/// Typed helper over a store connection.
///
/// `KeyValueHelper` is the behavioral layer: it computes TTLs, guards writes
/// against invalid expirations, decodes hash fields into caller-requested
/// types, and short-circuits empty bulk deletions. Values are serialized to
/// JSON on the way in and decoded on the way out; the connection only ever
/// sees text payloads.
///
/// The helper is stateless and holds nothing but the injected connection, so
/// it is safe to share across tasks. Every method issues at most one store
/// command and never retries; store failures propagate unchanged.
///
/// # Example
/// ```ignore
/// let conn = Arc::new(RedisConnection::new(config).await?);
/// let helper: KeyValueHelper<User, _> = KeyValueHelper::new(conn);
///
/// helper.set("user:1", &alice).await?;
/// let user = helper.get("user:1").await?;
/// ```
pub struct KeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    facade: OpsFacade<C>,
    _marker: PhantomData<V>,
}

impl<V, C> Clone for KeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    fn clone(&self) -> Self {
        KeyValueHelper {
            facade: self.facade.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V, C> KeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    /// Create a new helper over an injected connection.
    pub fn new(conn: Arc<C>) -> Self {
        KeyValueHelper {
            facade: OpsFacade::new(conn),
            _marker: PhantomData,
        }
    }

    /// The capability facade, for direct access to the sub-APIs.
    ///
    /// Methods here return unnormalized `Reply` values; use this when a call
    /// site needs to distinguish a deferred-batch result from absence.
    pub fn ops(&self) -> &OpsFacade<C> {
        &self.facade
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, HelperError> {
        serde_json::to_string(value)
            .map_err(|e| HelperError::Serialization(format!("encode failed: {}", e)))
    }

    fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T, HelperError> {
        serde_json::from_str(payload)
            .map_err(|e| HelperError::Serialization(format!("decode failed: {}", e)))
    }

    /// Read the value stored under `key`, `None` on a miss.
    pub async fn get(&self, key: &str) -> Result<Option<V>, HelperError> {
        match self.facade.ops_for_value().get(key).await? {
            None => Ok(None),
            Some(payload) => Ok(Some(self.decode(&payload)?)),
        }
    }

    /// Unconditionally write `value` under `key`.
    ///
    /// Returns `&self` so writes can be chained.
    pub async fn set(&self, key: &str, value: &V) -> Result<&Self, HelperError> {
        let payload = self.encode(value)?;
        self.facade.ops_for_value().set(key, &payload).await?;
        Ok(self)
    }

    /// Write `value` with an absolute expiration deadline.
    ///
    /// The deadline is resolved into a relative TTL against the current time.
    /// If it is at or before now, nothing is written and `false` is returned:
    /// an already-expired deadline is an expected caller mistake, not an
    /// error.
    pub async fn set_with_expiration_at(
        &self,
        key: &str,
        value: &V,
        deadline: SystemTime,
    ) -> Result<bool, HelperError> {
        let Some(ttl) = ttl_until(deadline) else {
            return Ok(false);
        };
        let payload = self.encode(value)?;
        self.facade
            .ops_for_value()
            .set_with_ttl(key, &payload, ttl)
            .await?;
        Ok(true)
    }

    /// Write `value` with a relative TTL.
    ///
    /// A zero TTL performs no write and returns `false`.
    pub async fn set_with_expiration(
        &self,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<bool, HelperError> {
        if ttl.is_zero() {
            return Ok(false);
        }
        let payload = self.encode(value)?;
        self.facade
            .ops_for_value()
            .set_with_ttl(key, &payload, ttl)
            .await?;
        Ok(true)
    }

    /// Write `value` with a TTL given in minutes, the default unit.
    ///
    /// Non-positive `minutes` performs no write and returns `false`.
    pub async fn set_with_expiration_minutes(
        &self,
        key: &str,
        value: &V,
        minutes: i64,
    ) -> Result<bool, HelperError> {
        if minutes <= 0 {
            return Ok(false);
        }
        self.set_with_expiration(key, value, Duration::from_secs(minutes as u64 * 60))
            .await
    }

    /// Read one hash field untyped, `None` when the field is absent.
    pub async fn get_field(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<serde_json::Value>, HelperError> {
        match self.facade.ops_for_hash().get_field(key, field).await? {
            None => Ok(None),
            Some(payload) => Ok(Some(self.decode(&payload)?)),
        }
    }

    /// Read one hash field decoded into `T`.
    ///
    /// Returns `None` only when the field is absent. A field that exists but
    /// cannot be decoded into `T` is a `TypeMismatch` error, never a silent
    /// `None`: the caller asked for a type the stored value does not have.
    pub async fn get_field_as<T: DeserializeOwned>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>, HelperError> {
        match self.facade.ops_for_hash().get_field(key, field).await? {
            None => Ok(None),
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| HelperError::type_mismatch(key, field, e.to_string())),
        }
    }

    /// Read all fields and values of the hash under `key`.
    pub async fn entries(
        &self,
        key: &str,
    ) -> Result<HashMap<String, serde_json::Value>, HelperError> {
        let raw = self.facade.ops_for_hash().entries(key).await?;
        let mut decoded = HashMap::with_capacity(raw.len());
        for (field, payload) in raw {
            let value = self.decode(&payload)?;
            decoded.insert(field, value);
        }
        Ok(decoded)
    }

    /// Unconditionally write one hash field.
    pub async fn put<F: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &F,
    ) -> Result<&Self, HelperError> {
        let payload = self.encode(value)?;
        self.facade
            .ops_for_hash()
            .put_field(key, field, &payload)
            .await?;
        Ok(self)
    }

    /// Write all entries of `map` into the hash under `key` in one command.
    pub async fn put_all<F: Serialize>(
        &self,
        key: &str,
        map: &HashMap<String, F>,
    ) -> Result<&Self, HelperError> {
        let mut encoded = Vec::with_capacity(map.len());
        for (field, value) in map {
            encoded.push((field.clone(), self.encode(value)?));
        }
        self.facade.ops_for_hash().put_fields(key, &encoded).await?;
        Ok(self)
    }

    /// Write one hash field only if it does not already exist.
    ///
    /// Returns `true` iff the field was absent and has been written.
    pub async fn put_if_absent<F: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &F,
    ) -> Result<bool, HelperError> {
        let payload = self.encode(value)?;
        self.facade
            .ops_for_hash()
            .put_field_if_absent(key, field, &payload)
            .await
    }

    /// All field names of the hash under `key`.
    ///
    /// `Deferred` when the call executed inside a batched context.
    pub async fn fields(&self, key: &str) -> Result<Reply<HashSet<String>>, HelperError> {
        self.facade.ops_for_hash().fields(key).await
    }

    /// Set an absolute expiration deadline on an existing key.
    ///
    /// `Deferred` signals a batched context, not failure.
    pub async fn expire_at(
        &self,
        key: &str,
        deadline: SystemTime,
    ) -> Result<Reply<bool>, HelperError> {
        self.facade.ops_for_key().expire_at(key, deadline).await
    }

    /// Set a relative TTL on an existing key.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<Reply<bool>, HelperError> {
        self.facade.ops_for_key().expire(key, ttl).await
    }

    /// Remaining TTL of `key` in seconds.
    ///
    /// `Present(PERPETUAL)` for a key with no expiration, `Absent` for a
    /// missing key, `Deferred` in a batched context.
    pub async fn get_expire(&self, key: &str) -> Result<Reply<i64>, HelperError> {
        self.facade.ops_for_key().ttl(key).await
    }

    /// Delete one key, normalized to a boolean.
    ///
    /// An absent key reads as `false`; so does a deferred-batch result, which
    /// is indistinguishable after this normalization.
    pub async fn delete(&self, key: &str) -> Result<bool, HelperError> {
        let reply = self.facade.ops_for_key().delete(key).await?;
        Ok(reply.present_or(false))
    }

    /// Delete several keys, returning how many were removed.
    ///
    /// Empty input short-circuits to `Present(0)` without a store round trip.
    pub async fn delete_all(&self, keys: &[&str]) -> Result<Reply<i64>, HelperError> {
        if keys.is_empty() {
            return Ok(Reply::Present(0));
        }
        let owned: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.facade.ops_for_key().delete_all(&owned).await
    }

    /// Delete one hash field.
    ///
    /// `Present(true)` iff the field existed; `Deferred` only in a batched
    /// context.
    pub async fn delete_field(&self, key: &str, field: &str) -> Result<Reply<bool>, HelperError> {
        let reply = self
            .facade
            .ops_for_hash()
            .delete_fields(key, &[field.to_string()])
            .await?;
        Ok(reply.map(|count| count > 0))
    }

    /// Delete several hash fields, returning how many were removed.
    ///
    /// Empty input short-circuits to `Present(0)` without a store round trip.
    pub async fn delete_fields(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Reply<i64>, HelperError> {
        if fields.is_empty() {
            return Ok(Reply::Present(0));
        }
        let owned: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        self.facade.ops_for_hash().delete_fields(key, &owned).await
    }

    /// Structural type of the entry under `key`.
    pub async fn data_type(&self, key: &str) -> Result<DataType, HelperError> {
        self.facade.ops_for_key().data_type(key).await
    }

    /// Atomically add `delta` to the integer value under `key`.
    ///
    /// An absent key counts from zero (the store's semantics); a non-numeric
    /// existing value is a store error, propagated unchanged.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<Reply<i64>, HelperError> {
        self.facade.ops_for_value().increment(key, delta).await
    }

    /// Atomically add `delta` to the float value under `key`.
    pub async fn increment_float(
        &self,
        key: &str,
        delta: f64,
    ) -> Result<Reply<f64>, HelperError> {
        self.facade
            .ops_for_value()
            .increment_float(key, delta)
            .await
    }

    /// Atomically add `delta` to the integer value of one hash field.
    pub async fn increment_field(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Reply<i64>, HelperError> {
        self.facade
            .ops_for_hash()
            .increment_field(key, field, delta)
            .await
    }

    /// Atomically add `delta` to the float value of one hash field.
    pub async fn increment_field_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<Reply<f64>, HelperError> {
        self.facade
            .ops_for_hash()
            .increment_field_float(key, field, delta)
            .await
    }

    /// Whether `key` exists, normalized to a boolean.
    ///
    /// Callers that must distinguish a deferred-batch result from absence
    /// use `ops().ops_for_key().exists(..)` directly.
    pub async fn has_key(&self, key: &str) -> Result<bool, HelperError> {
        let reply = self.facade.ops_for_key().exists(key).await?;
        Ok(reply.present_or(false))
    }

    /// Whether `field` exists in the hash under `key`, normalized to a
    /// boolean.
    pub async fn has_field(&self, key: &str, field: &str) -> Result<bool, HelperError> {
        let reply = self.facade.ops_for_hash().has_field(key, field).await?;
        Ok(reply.present_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::memory::MemoryConnection;

    fn helper() -> KeyValueHelper<String, MemoryConnection> {
        KeyValueHelper::new(Arc::new(MemoryConnection::new()))
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let helper = helper();

        helper.set("k", &"hello".to_string()).await.unwrap();
        assert_eq!(helper.get("k").await.unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_fluent_chaining() {
        let helper = helper();

        helper
            .set("a", &"1".to_string())
            .await
            .unwrap()
            .set("b", &"2".to_string())
            .await
            .unwrap();

        assert!(helper.has_key("a").await.unwrap());
        assert!(helper.has_key("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_past_deadline_writes_nothing() {
        let helper = helper();
        let past = SystemTime::now() - Duration::from_secs(5);

        let written = helper
            .set_with_expiration_at("k", &"v".to_string(), past)
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(helper.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_writes_nothing() {
        let helper = helper();

        let written = helper
            .set_with_expiration("k", &"v".to_string(), Duration::ZERO)
            .await
            .unwrap();
        assert!(!written);

        let written = helper
            .set_with_expiration_minutes("k", &"v".to_string(), -3)
            .await
            .unwrap();
        assert!(!written);

        assert_eq!(helper.get("k").await.unwrap(), None);
    }
}
