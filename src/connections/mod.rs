//! Connection backends implementing the capability traits.

pub mod memory;
pub mod redis;
