use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::connection::StoreConnection;
use crate::error::HelperError;
use crate::facade::OpsFacade;
use crate::helper::KeyValueHelper;
use crate::reply::{DataType, Reply};

/// Predicate deciding whether a key may be written under.
pub type KeyValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A [`KeyValueHelper`] that validates keys before every mutating write.
///
/// The validator is an injected predicate, swappable per instance without
/// subclassing or wrapping. A rejected key is logged and surfaces as
/// [`HelperError::InvalidKey`] before any store command is issued; the store
/// is never contacted for a rejected key.
///
/// Only value-setting and field-putting operations are guarded. Reads,
/// deletions, expirations and increments pass through unvalidated, matching
/// the guard's intent of keeping bad keys out of the store rather than
/// policing every access.
pub struct ValidatingKeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    inner: KeyValueHelper<V, C>,
    validator: KeyValidator,
}

impl<V, C> std::fmt::Debug for ValidatingKeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatingKeyValueHelper")
            .finish_non_exhaustive()
    }
}

impl<V, C> Clone for ValidatingKeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    fn clone(&self) -> Self {
        ValidatingKeyValueHelper {
            inner: self.inner.clone(),
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<V, C> ValidatingKeyValueHelper<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: StoreConnection,
{
    /// Create a helper with the default validator, which rejects empty keys.
    pub fn new(conn: Arc<C>) -> Self {
        Self::with_validator(conn, Arc::new(|key: &str| !key.is_empty()))
    }

    /// Create a helper with a custom validation predicate.
    pub fn with_validator(conn: Arc<C>, validator: KeyValidator) -> Self {
        ValidatingKeyValueHelper {
            inner: KeyValueHelper::new(conn),
            validator,
        }
    }

    /// The capability facade of the wrapped helper.
    pub fn ops(&self) -> &OpsFacade<C> {
        self.inner.ops()
    }

    fn verify_key(&self, key: &str) -> Result<(), HelperError> {
        if (self.validator)(key) {
            return Ok(());
        }
        error!("key '{}' rejected by validator, refusing to write", key);
        Err(HelperError::invalid_key(format!(
            "key '{}' rejected by validator",
            key
        )))
    }

    /// Validated variant of [`KeyValueHelper::set`].
    pub async fn set(&self, key: &str, value: &V) -> Result<&Self, HelperError> {
        self.verify_key(key)?;
        self.inner.set(key, value).await?;
        Ok(self)
    }

    /// Validated variant of [`KeyValueHelper::set_with_expiration_at`].
    pub async fn set_with_expiration_at(
        &self,
        key: &str,
        value: &V,
        deadline: SystemTime,
    ) -> Result<bool, HelperError> {
        self.verify_key(key)?;
        self.inner.set_with_expiration_at(key, value, deadline).await
    }

    /// Validated variant of [`KeyValueHelper::set_with_expiration`].
    pub async fn set_with_expiration(
        &self,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<bool, HelperError> {
        self.verify_key(key)?;
        self.inner.set_with_expiration(key, value, ttl).await
    }

    /// Validated variant of [`KeyValueHelper::set_with_expiration_minutes`].
    pub async fn set_with_expiration_minutes(
        &self,
        key: &str,
        value: &V,
        minutes: i64,
    ) -> Result<bool, HelperError> {
        self.verify_key(key)?;
        self.inner
            .set_with_expiration_minutes(key, value, minutes)
            .await
    }

    /// Validated variant of [`KeyValueHelper::put`].
    pub async fn put<F: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &F,
    ) -> Result<&Self, HelperError> {
        self.verify_key(key)?;
        self.inner.put(key, field, value).await?;
        Ok(self)
    }

    /// Validated variant of [`KeyValueHelper::put_all`].
    pub async fn put_all<F: Serialize>(
        &self,
        key: &str,
        map: &HashMap<String, F>,
    ) -> Result<&Self, HelperError> {
        self.verify_key(key)?;
        self.inner.put_all(key, map).await?;
        Ok(self)
    }

    /// Validated variant of [`KeyValueHelper::put_if_absent`].
    pub async fn put_if_absent<F: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &F,
    ) -> Result<bool, HelperError> {
        self.verify_key(key)?;
        self.inner.put_if_absent(key, field, value).await
    }

    // Unguarded pass-throughs.

    pub async fn get(&self, key: &str) -> Result<Option<V>, HelperError> {
        self.inner.get(key).await
    }

    pub async fn get_field(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<serde_json::Value>, HelperError> {
        self.inner.get_field(key, field).await
    }

    pub async fn get_field_as<T: DeserializeOwned>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>, HelperError> {
        self.inner.get_field_as(key, field).await
    }

    pub async fn entries(
        &self,
        key: &str,
    ) -> Result<HashMap<String, serde_json::Value>, HelperError> {
        self.inner.entries(key).await
    }

    pub async fn fields(&self, key: &str) -> Result<Reply<HashSet<String>>, HelperError> {
        self.inner.fields(key).await
    }

    pub async fn expire_at(
        &self,
        key: &str,
        deadline: SystemTime,
    ) -> Result<Reply<bool>, HelperError> {
        self.inner.expire_at(key, deadline).await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<Reply<bool>, HelperError> {
        self.inner.expire(key, ttl).await
    }

    pub async fn get_expire(&self, key: &str) -> Result<Reply<i64>, HelperError> {
        self.inner.get_expire(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, HelperError> {
        self.inner.delete(key).await
    }

    pub async fn delete_all(&self, keys: &[&str]) -> Result<Reply<i64>, HelperError> {
        self.inner.delete_all(keys).await
    }

    pub async fn delete_field(&self, key: &str, field: &str) -> Result<Reply<bool>, HelperError> {
        self.inner.delete_field(key, field).await
    }

    pub async fn delete_fields(
        &self,
        key: &str,
        fields: &[&str],
    ) -> Result<Reply<i64>, HelperError> {
        self.inner.delete_fields(key, fields).await
    }

    pub async fn data_type(&self, key: &str) -> Result<DataType, HelperError> {
        self.inner.data_type(key).await
    }

    pub async fn increment(&self, key: &str, delta: i64) -> Result<Reply<i64>, HelperError> {
        self.inner.increment(key, delta).await
    }

    pub async fn increment_float(
        &self,
        key: &str,
        delta: f64,
    ) -> Result<Reply<f64>, HelperError> {
        self.inner.increment_float(key, delta).await
    }

    pub async fn increment_field(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Reply<i64>, HelperError> {
        self.inner.increment_field(key, field, delta).await
    }

    pub async fn increment_field_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<Reply<f64>, HelperError> {
        self.inner.increment_field_float(key, field, delta).await
    }

    pub async fn has_key(&self, key: &str) -> Result<bool, HelperError> {
        self.inner.has_key(key).await
    }

    pub async fn has_field(&self, key: &str, field: &str) -> Result<bool, HelperError> {
        self.inner.has_field(key, field).await
    }
}
