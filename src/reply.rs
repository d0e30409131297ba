//! Tri-state command replies and key type tags.

/// TTL sentinel for keys that never expire.
pub const PERPETUAL: i64 = -1;

/// Result of a store command that may be unavailable in a batched context.
///
/// Connections executing inside a pipeline or transaction queue commands and
/// defer their results until the batch completes. `Reply` makes that third
/// state explicit instead of overloading `None`:
///
/// - `Present(v)` - the command executed and produced `v`
/// - `Absent` - the command executed and the target did not exist
/// - `Deferred` - the command was queued; no result is available yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<T> {
    Present(T),
    Absent,
    Deferred,
}

impl<T> Reply<T> {
    /// Returns `true` for `Present`.
    pub fn is_present(&self) -> bool {
        matches!(self, Reply::Present(_))
    }

    /// Returns `true` for `Deferred`.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Reply::Deferred)
    }

    /// Collapse to an `Option`, dropping the distinction between `Absent`
    /// and `Deferred`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Reply::Present(v) => Some(v),
            Reply::Absent | Reply::Deferred => None,
        }
    }

    /// Collapse to a plain value, substituting `default` for both `Absent`
    /// and `Deferred`.
    ///
    /// This is the normalization the boolean-returning helper methods use.
    /// It deliberately makes a deferred result indistinguishable from a
    /// genuine absence; callers that need the tri-state must keep the `Reply`.
    pub fn present_or(self, default: T) -> T {
        match self {
            Reply::Present(v) => v,
            Reply::Absent | Reply::Deferred => default,
        }
    }

    /// Map the `Present` value, leaving `Absent` and `Deferred` untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reply<U> {
        match self {
            Reply::Present(v) => Reply::Present(f(v)),
            Reply::Absent => Reply::Absent,
            Reply::Deferred => Reply::Deferred,
        }
    }
}

/// Structural type of a top-level store entry, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// The key does not exist.
    None,
    String,
    Hash,
    List,
    Set,
    ZSet,
    Stream,
}

impl DataType {
    /// Parse the store's `TYPE` reply.
    ///
    /// Unrecognized tags map to `DataType::None`.
    pub fn from_type_tag(tag: &str) -> DataType {
        match tag {
            "string" => DataType::String,
            "hash" => DataType::Hash,
            "list" => DataType::List,
            "set" => DataType::Set,
            "zset" => DataType::ZSet,
            "stream" => DataType::Stream,
            _ => DataType::None,
        }
    }
}
