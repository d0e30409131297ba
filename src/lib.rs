//! redis-helper - a typed, validation-guarded helper layer over Redis
//!
//! This library provides a small stack of layers over a store connection:
//! - Narrow capability traits per data structure, composed into
//!   [`StoreConnection`]
//! - [`OpsFacade`] for routing to the sub-APIs, with key-bound variants
//! - [`KeyValueHelper`] for typed values, TTL arithmetic and normalized
//!   booleans
//! - [`ValidatingKeyValueHelper`] for key validation before every write
//!
//! # Example
//!
//! ```ignore
//! use redis_helper::{KeyValueHelper, RedisConnection, RedisConnectionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), redis_helper::HelperError> {
//!     let conn = Arc::new(
//!         RedisConnection::new(RedisConnectionConfig {
//!             url: "redis://127.0.0.1:6379".to_string(),
//!         })
//!         .await?,
//!     );
//!
//!     let helper: KeyValueHelper<String, _> = KeyValueHelper::new(conn);
//!     helper.set("greeting", &"hello".to_string()).await?;
//!     let value = helper.get("greeting").await?;
//!     assert_eq!(value.as_deref(), Some("hello"));
//!     Ok(())
//! }
//! ```

mod connection;
pub mod connections;
mod error;
mod facade;
mod helper;
mod reply;
mod utils;
mod validated;

// Re-export public API
pub use connection::{
    ClusterOps, GeoOps, HashOps, HyperLogLogOps, KeyOps, ListOps, SetOps, StoreConnection,
    StreamOps, ValueOps, ZSetOps,
};
pub use connections::memory::MemoryConnection;
pub use connections::redis::{RedisConnection, RedisConnectionConfig};
pub use error::HelperError;
pub use facade::{
    BoundGeoOps, BoundHashOps, BoundListOps, BoundSetOps, BoundStreamOps, BoundValueOps,
    BoundZSetOps, OpsFacade,
};
pub use helper::KeyValueHelper;
pub use reply::{DataType, Reply, PERPETUAL};
pub use validated::{KeyValidator, ValidatingKeyValueHelper};
