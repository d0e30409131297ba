use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::connection::{
    ClusterOps, GeoOps, HashOps, HyperLogLogOps, KeyOps, ListOps, SetOps, StreamOps, ValueOps,
    ZSetOps,
};
use crate::error::HelperError;
use crate::reply::{DataType, Reply, PERPETUAL};

// Earth radius Redis uses for GEODIST.
const EARTH_RADIUS_METERS: f64 = 6_372_797.560856;

/// Structural payload of one top-level entry.
enum Slot {
    Value(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    List(VecDeque<String>),
    ZSet(HashMap<String, f64>),
    Geo(HashMap<String, (f64, f64)>),
    Hll(HashSet<String>),
    Stream(Vec<(String, Vec<(String, String)>)>),
}

impl Slot {
    fn data_type(&self) -> DataType {
        match self {
            Slot::Value(_) => DataType::String,
            Slot::Hash(_) => DataType::Hash,
            Slot::Set(_) => DataType::Set,
            Slot::List(_) => DataType::List,
            Slot::ZSet(_) => DataType::ZSet,
            // Redis represents geo indexes as sorted sets and HyperLogLogs
            // as opaque strings; report the same tags.
            Slot::Geo(_) => DataType::ZSet,
            Slot::Hll(_) => DataType::String,
            Slot::Stream(_) => DataType::Stream,
        }
    }
}

struct Keyed {
    slot: Slot,
    expires_at: Option<SystemTime>,
}

impl Keyed {
    fn new(slot: Slot) -> Self {
        Keyed {
            slot,
            expires_at: None,
        }
    }

    fn expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= SystemTime::now())
    }
}

/// Thread-safe in-process store connection.
///
/// Mirrors the Redis command semantics closely enough for the helper's
/// contracts: lazy expiry, default-zero counters, wrong-type errors. Commands
/// execute immediately, so this backend never yields `Reply::Deferred`.
///
/// Intended for tests and local development; the suite asserts call volume
/// through `commands_issued`.
#[derive(Default)]
pub struct MemoryConnection {
    state: RwLock<HashMap<String, Keyed>>,
    commands: AtomicU64,
    stream_seq: AtomicU64,
}

impl MemoryConnection {
    /// Create a new, empty MemoryConnection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands issued against this connection so far.
    ///
    /// Bulk operations count as one command, matching the batched commands
    /// the Redis backend issues.
    pub fn commands_issued(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }

    fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::SeqCst);
    }
}

fn wrong_type(op: &str, key: &str) -> HelperError {
    HelperError::store(
        op,
        key,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )
}

/// Drop the entry when its expiry has passed, so lookups below see a miss.
fn evict_expired(state: &mut HashMap<String, Keyed>, key: &str) {
    if state.get(key).is_some_and(|e| e.expired()) {
        state.remove(key);
    }
}

/// Normalize an inclusive, possibly-negative index range against `len`.
fn normalize_range(len: i64, start: i64, stop: i64) -> Option<(usize, usize)> {
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn increment_integer(current: &str, delta: i64, op: &str, key: &str) -> Result<i64, HelperError> {
    let parsed: i64 = current
        .parse()
        .map_err(|_| HelperError::store(op, key, "value is not an integer or out of range"))?;
    Ok(parsed + delta)
}

fn increment_float(current: &str, delta: f64, op: &str, key: &str) -> Result<f64, HelperError> {
    let parsed: f64 = current
        .parse()
        .map_err(|_| HelperError::store(op, key, "value is not a valid float"))?;
    Ok(parsed + delta)
}

#[async_trait]
impl ValueOps for MemoryConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                Slot::Value(payload) => Ok(Some(payload.clone())),
                _ => Err(wrong_type("GET", key)),
            },
        }
    }

    async fn set(&self, key: &str, payload: &str) -> Result<(), HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        state.insert(key.to_string(), Keyed::new(Slot::Value(payload.to_string())));
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<(), HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        state.insert(
            key.to_string(),
            Keyed {
                slot: Slot::Value(payload.to_string()),
                expires_at: Some(SystemTime::now() + ttl),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<Reply<i64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Value("0".to_string())));
        match &mut entry.slot {
            Slot::Value(payload) => {
                let next = increment_integer(payload, delta, "INCRBY", key)?;
                *payload = next.to_string();
                Ok(Reply::Present(next))
            }
            _ => Err(wrong_type("INCRBY", key)),
        }
    }

    async fn increment_float(&self, key: &str, delta: f64) -> Result<Reply<f64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Value("0".to_string())));
        match &mut entry.slot {
            Slot::Value(payload) => {
                let next = increment_float(payload, delta, "INCRBYFLOAT", key)?;
                *payload = next.to_string();
                Ok(Reply::Present(next))
            }
            _ => Err(wrong_type("INCRBYFLOAT", key)),
        }
    }
}

#[async_trait]
impl HashOps for MemoryConnection {
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                Slot::Hash(fields) => Ok(fields.get(field).cloned()),
                _ => Err(wrong_type("HGET", key)),
            },
        }
    }

    async fn entries(&self, key: &str) -> Result<HashMap<String, String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(HashMap::new()),
            Some(entry) => match &entry.slot {
                Slot::Hash(fields) => Ok(fields.clone()),
                _ => Err(wrong_type("HGETALL", key)),
            },
        }
    }

    async fn put_field(&self, key: &str, field: &str, payload: &str) -> Result<(), HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hash(HashMap::new())));
        match &mut entry.slot {
            Slot::Hash(fields) => {
                fields.insert(field.to_string(), payload.to_string());
                Ok(())
            }
            _ => Err(wrong_type("HSET", key)),
        }
    }

    async fn put_fields(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<(), HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hash(HashMap::new())));
        match &mut entry.slot {
            Slot::Hash(fields) => {
                for (field, payload) in entries {
                    fields.insert(field.clone(), payload.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type("HSET", key)),
        }
    }

    async fn put_field_if_absent(
        &self,
        key: &str,
        field: &str,
        payload: &str,
    ) -> Result<bool, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hash(HashMap::new())));
        match &mut entry.slot {
            Slot::Hash(fields) => {
                if fields.contains_key(field) {
                    Ok(false)
                } else {
                    fields.insert(field.to_string(), payload.to_string());
                    Ok(true)
                }
            }
            _ => Err(wrong_type("HSETNX", key)),
        }
    }

    async fn fields(&self, key: &str) -> Result<Reply<HashSet<String>>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(Reply::Present(HashSet::new())),
            Some(entry) => match &entry.slot {
                Slot::Hash(fields) => Ok(Reply::Present(fields.keys().cloned().collect())),
                _ => Err(wrong_type("HKEYS", key)),
            },
        }
    }

    async fn delete_fields(
        &self,
        key: &str,
        fields: &[String],
    ) -> Result<Reply<i64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let (removed, now_empty) = match state.get_mut(key) {
            None => return Ok(Reply::Present(0)),
            Some(entry) => match &mut entry.slot {
                Slot::Hash(existing) => {
                    let mut removed = 0;
                    for field in fields {
                        if existing.remove(field).is_some() {
                            removed += 1;
                        }
                    }
                    (removed, existing.is_empty())
                }
                _ => return Err(wrong_type("HDEL", key)),
            },
        };
        if now_empty {
            state.remove(key);
        }
        Ok(Reply::Present(removed))
    }

    async fn has_field(&self, key: &str, field: &str) -> Result<Reply<bool>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(Reply::Present(false)),
            Some(entry) => match &entry.slot {
                Slot::Hash(fields) => Ok(Reply::Present(fields.contains_key(field))),
                _ => Err(wrong_type("HEXISTS", key)),
            },
        }
    }

    async fn increment_field(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<Reply<i64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hash(HashMap::new())));
        match &mut entry.slot {
            Slot::Hash(fields) => {
                let current = fields.get(field).map(String::as_str).unwrap_or("0");
                let next = increment_integer(current, delta, "HINCRBY", key)?;
                fields.insert(field.to_string(), next.to_string());
                Ok(Reply::Present(next))
            }
            _ => Err(wrong_type("HINCRBY", key)),
        }
    }

    async fn increment_field_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<Reply<f64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hash(HashMap::new())));
        match &mut entry.slot {
            Slot::Hash(fields) => {
                let current = fields.get(field).map(String::as_str).unwrap_or("0");
                let next = increment_float(current, delta, "HINCRBYFLOAT", key)?;
                fields.insert(field.to_string(), next.to_string());
                Ok(Reply::Present(next))
            }
            _ => Err(wrong_type("HINCRBYFLOAT", key)),
        }
    }
}

#[async_trait]
impl KeyOps for MemoryConnection {
    async fn delete(&self, key: &str) -> Result<Reply<bool>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        Ok(Reply::Present(state.remove(key).is_some()))
    }

    async fn delete_all(&self, keys: &[String]) -> Result<Reply<i64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        let mut removed = 0;
        for key in keys {
            evict_expired(&mut state, key);
            if state.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(Reply::Present(removed))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<Reply<bool>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get_mut(key) {
            None => Ok(Reply::Present(false)),
            Some(entry) => {
                entry.expires_at = Some(SystemTime::now() + ttl);
                Ok(Reply::Present(true))
            }
        }
    }

    async fn expire_at(
        &self,
        key: &str,
        deadline: SystemTime,
    ) -> Result<Reply<bool>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        if !state.contains_key(key) {
            return Ok(Reply::Present(false));
        }
        if deadline <= SystemTime::now() {
            // A past deadline removes the key immediately, as Redis does.
            state.remove(key);
        } else if let Some(entry) = state.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(Reply::Present(true))
    }

    async fn ttl(&self, key: &str) -> Result<Reply<i64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(Reply::Absent),
            Some(Keyed {
                expires_at: None, ..
            }) => Ok(Reply::Present(PERPETUAL)),
            Some(Keyed {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at
                    .duration_since(SystemTime::now())
                    .unwrap_or(Duration::ZERO);
                let mut seconds = remaining.as_secs() as i64;
                if remaining.subsec_nanos() > 0 {
                    seconds += 1;
                }
                Ok(Reply::Present(seconds))
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<Reply<bool>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        Ok(Reply::Present(state.contains_key(key)))
    }

    async fn data_type(&self, key: &str) -> Result<DataType, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        Ok(state
            .get(key)
            .map(|entry| entry.slot.data_type())
            .unwrap_or(DataType::None))
    }
}

#[async_trait]
impl SetOps for MemoryConnection {
    async fn add(&self, key: &str, members: &[String]) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Set(HashSet::new())));
        match &mut entry.slot {
            Slot::Set(existing) => {
                let mut added = 0;
                for member in members {
                    if existing.insert(member.clone()) {
                        added += 1;
                    }
                }
                Ok(added)
            }
            _ => Err(wrong_type("SADD", key)),
        }
    }

    async fn remove(&self, key: &str, members: &[String]) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let (removed, now_empty) = match state.get_mut(key) {
            None => return Ok(0),
            Some(entry) => match &mut entry.slot {
                Slot::Set(existing) => {
                    let mut removed = 0;
                    for member in members {
                        if existing.remove(member) {
                            removed += 1;
                        }
                    }
                    (removed, existing.is_empty())
                }
                _ => return Err(wrong_type("SREM", key)),
            },
        };
        if now_empty {
            state.remove(key);
        }
        Ok(removed)
    }

    async fn members(&self, key: &str) -> Result<HashSet<String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(HashSet::new()),
            Some(entry) => match &entry.slot {
                Slot::Set(members) => Ok(members.clone()),
                _ => Err(wrong_type("SMEMBERS", key)),
            },
        }
    }

    async fn contains(&self, key: &str, member: &str) -> Result<bool, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(false),
            Some(entry) => match &entry.slot {
                Slot::Set(members) => Ok(members.contains(member)),
                _ => Err(wrong_type("SISMEMBER", key)),
            },
        }
    }

    async fn size(&self, key: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.slot {
                Slot::Set(members) => Ok(members.len() as i64),
                _ => Err(wrong_type("SCARD", key)),
            },
        }
    }
}

#[async_trait]
impl ListOps for MemoryConnection {
    async fn push_front(&self, key: &str, payload: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::List(VecDeque::new())));
        match &mut entry.slot {
            Slot::List(items) => {
                items.push_front(payload.to_string());
                Ok(items.len() as i64)
            }
            _ => Err(wrong_type("LPUSH", key)),
        }
    }

    async fn push_back(&self, key: &str, payload: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::List(VecDeque::new())));
        match &mut entry.slot {
            Slot::List(items) => {
                items.push_back(payload.to_string());
                Ok(items.len() as i64)
            }
            _ => Err(wrong_type("RPUSH", key)),
        }
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let (popped, now_empty) = match state.get_mut(key) {
            None => return Ok(None),
            Some(entry) => match &mut entry.slot {
                Slot::List(items) => {
                    let popped = items.pop_front();
                    (popped, items.is_empty())
                }
                _ => return Err(wrong_type("LPOP", key)),
            },
        };
        if now_empty {
            state.remove(key);
        }
        Ok(popped)
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match &entry.slot {
                Slot::List(items) => {
                    match normalize_range(items.len() as i64, start, stop) {
                        None => Ok(Vec::new()),
                        Some((from, to)) => {
                            Ok(items.iter().skip(from).take(to - from + 1).cloned().collect())
                        }
                    }
                }
                _ => Err(wrong_type("LRANGE", key)),
            },
        }
    }

    async fn len(&self, key: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.slot {
                Slot::List(items) => Ok(items.len() as i64),
                _ => Err(wrong_type("LLEN", key)),
            },
        }
    }
}

#[async_trait]
impl ZSetOps for MemoryConnection {
    async fn add(&self, key: &str, member: &str, score: f64) -> Result<bool, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::ZSet(HashMap::new())));
        match &mut entry.slot {
            Slot::ZSet(scored) => Ok(scored.insert(member.to_string(), score).is_none()),
            _ => Err(wrong_type("ZADD", key)),
        }
    }

    async fn remove(&self, key: &str, members: &[String]) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let (removed, now_empty) = match state.get_mut(key) {
            None => return Ok(0),
            Some(entry) => match &mut entry.slot {
                Slot::ZSet(scored) => {
                    let mut removed = 0;
                    for member in members {
                        if scored.remove(member).is_some() {
                            removed += 1;
                        }
                    }
                    (removed, scored.is_empty())
                }
                _ => return Err(wrong_type("ZREM", key)),
            },
        };
        if now_empty {
            state.remove(key);
        }
        Ok(removed)
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                Slot::ZSet(scored) => Ok(scored.get(member).copied()),
                _ => Err(wrong_type("ZSCORE", key)),
            },
        }
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match &entry.slot {
                Slot::ZSet(scored) => {
                    let mut ordered: Vec<(&String, &f64)> = scored.iter().collect();
                    ordered.sort_by(|a, b| {
                        a.1.partial_cmp(b.1)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then_with(|| a.0.cmp(b.0))
                    });
                    match normalize_range(ordered.len() as i64, start, stop) {
                        None => Ok(Vec::new()),
                        Some((from, to)) => Ok(ordered[from..=to]
                            .iter()
                            .map(|(member, _)| (*member).clone())
                            .collect()),
                    }
                }
                _ => Err(wrong_type("ZRANGE", key)),
            },
        }
    }

    async fn size(&self, key: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.slot {
                Slot::ZSet(scored) => Ok(scored.len() as i64),
                _ => Err(wrong_type("ZCARD", key)),
            },
        }
    }
}

#[async_trait]
impl GeoOps for MemoryConnection {
    async fn add(
        &self,
        key: &str,
        longitude: f64,
        latitude: f64,
        member: &str,
    ) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Geo(HashMap::new())));
        match &mut entry.slot {
            Slot::Geo(positions) => Ok(
                if positions
                    .insert(member.to_string(), (longitude, latitude))
                    .is_none()
                {
                    1
                } else {
                    0
                },
            ),
            _ => Err(wrong_type("GEOADD", key)),
        }
    }

    async fn position(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<(f64, f64)>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                Slot::Geo(positions) => Ok(positions.get(member).copied()),
                _ => Err(wrong_type("GEOPOS", key)),
            },
        }
    }

    async fn distance_meters(
        &self,
        key: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<f64>, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                Slot::Geo(positions) => {
                    let (Some(a), Some(b)) = (positions.get(from), positions.get(to)) else {
                        return Ok(None);
                    };
                    Ok(Some(haversine_meters(*a, *b)))
                }
                _ => Err(wrong_type("GEODIST", key)),
            },
        }
    }
}

fn haversine_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lon1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lon2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[async_trait]
impl HyperLogLogOps for MemoryConnection {
    async fn add(&self, key: &str, elements: &[String]) -> Result<bool, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hll(HashSet::new())));
        match &mut entry.slot {
            Slot::Hll(observed) => {
                let mut changed = false;
                for element in elements {
                    changed |= observed.insert(element.clone());
                }
                Ok(changed)
            }
            _ => Err(wrong_type("PFADD", key)),
        }
    }

    async fn count(&self, key: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.slot {
                // Exact counting stands in for the probabilistic estimate.
                Slot::Hll(observed) => Ok(observed.len() as i64),
                _ => Err(wrong_type("PFCOUNT", key)),
            },
        }
    }

    async fn merge(&self, destination: &str, sources: &[String]) -> Result<(), HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        let mut merged: HashSet<String> = HashSet::new();
        for source in sources {
            evict_expired(&mut state, source);
            match state.get(source) {
                None => {}
                Some(entry) => match &entry.slot {
                    Slot::Hll(observed) => merged.extend(observed.iter().cloned()),
                    _ => return Err(wrong_type("PFMERGE", source)),
                },
            }
        }
        evict_expired(&mut state, destination);
        let entry = state
            .entry(destination.to_string())
            .or_insert_with(|| Keyed::new(Slot::Hll(HashSet::new())));
        match &mut entry.slot {
            Slot::Hll(observed) => {
                observed.extend(merged);
                Ok(())
            }
            _ => Err(wrong_type("PFMERGE", destination)),
        }
    }
}

#[async_trait]
impl ClusterOps for MemoryConnection {
    async fn ping(&self) -> Result<String, HelperError> {
        self.record_command();
        Ok("PONG".to_string())
    }

    async fn cluster_info(&self) -> Result<String, HelperError> {
        self.record_command();
        // A single in-process node, reported the way a standalone server does.
        Ok("cluster_enabled:0\r\ncluster_known_nodes:1".to_string())
    }
}

#[async_trait]
impl StreamOps for MemoryConnection {
    async fn append(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<String, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| Keyed::new(Slot::Stream(Vec::new())));
        match &mut entry.slot {
            Slot::Stream(log) => {
                let millis = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_millis();
                let seq = self.stream_seq.fetch_add(1, Ordering::SeqCst);
                let id = format!("{}-{}", millis, seq);
                log.push((id.clone(), entries.to_vec()));
                Ok(id)
            }
            _ => Err(wrong_type("XADD", key)),
        }
    }

    async fn len(&self, key: &str) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.slot {
                Slot::Stream(log) => Ok(log.len() as i64),
                _ => Err(wrong_type("XLEN", key)),
            },
        }
    }

    async fn delete_entries(&self, key: &str, ids: &[String]) -> Result<i64, HelperError> {
        self.record_command();
        let mut state = self.state.write().await;
        evict_expired(&mut state, key);
        match state.get_mut(key) {
            None => Ok(0),
            Some(entry) => match &mut entry.slot {
                Slot::Stream(log) => {
                    let before = log.len();
                    log.retain(|(id, _)| !ids.contains(id));
                    Ok((before - log.len()) as i64)
                }
                _ => Err(wrong_type("XDEL", key)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_delete() {
        let conn = MemoryConnection::new();

        let result = ValueOps::get(&conn, "key1").await.unwrap();
        assert!(result.is_none());

        ValueOps::set(&conn, "key1", "value1").await.unwrap();
        let result = ValueOps::get(&conn, "key1").await.unwrap();
        assert_eq!(result.as_deref(), Some("value1"));

        let removed = KeyOps::delete(&conn, "key1").await.unwrap();
        assert_eq!(removed, Reply::Present(true));
        assert!(ValueOps::get(&conn, "key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_missing() {
        let conn = MemoryConnection::new();
        conn.set_with_ttl("key1", "value1", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(ValueOps::get(&conn, "key1").await.unwrap().is_none());
        assert_eq!(KeyOps::ttl(&conn, "key1").await.unwrap(), Reply::Absent);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numeric_value() {
        let conn = MemoryConnection::new();
        ValueOps::set(&conn, "key1", "not a number").await.unwrap();

        let err = ValueOps::increment(&conn, "key1", 1).await.unwrap_err();
        assert!(matches!(err, HelperError::Store { .. }));
    }

    #[tokio::test]
    async fn test_increment_on_wrong_slot_type() {
        let conn = MemoryConnection::new();
        conn.put_field("hash1", "f", "v").await.unwrap();

        let err = ValueOps::increment(&conn, "hash1", 1).await.unwrap_err();
        assert!(matches!(err, HelperError::Store { .. }));
    }

    #[tokio::test]
    async fn test_commands_issued_counts_each_call() {
        let conn = MemoryConnection::new();
        assert_eq!(conn.commands_issued(), 0);

        ValueOps::set(&conn, "key1", "v").await.unwrap();
        ValueOps::get(&conn, "key1").await.unwrap();
        KeyOps::delete_all(&conn, &["key1".to_string(), "key2".to_string()])
            .await
            .unwrap();

        assert_eq!(conn.commands_issued(), 3);
    }

    #[tokio::test]
    async fn test_data_type_tags() {
        let conn = MemoryConnection::new();
        ValueOps::set(&conn, "v", "1").await.unwrap();
        conn.put_field("h", "f", "1").await.unwrap();
        SetOps::add(&conn, "s", &["a".to_string()]).await.unwrap();
        conn.push_back("l", "a").await.unwrap();
        ZSetOps::add(&conn, "z", "a", 1.0).await.unwrap();

        assert_eq!(conn.data_type("v").await.unwrap(), DataType::String);
        assert_eq!(conn.data_type("h").await.unwrap(), DataType::Hash);
        assert_eq!(conn.data_type("s").await.unwrap(), DataType::Set);
        assert_eq!(conn.data_type("l").await.unwrap(), DataType::List);
        assert_eq!(conn.data_type("z").await.unwrap(), DataType::ZSet);
        assert_eq!(conn.data_type("missing").await.unwrap(), DataType::None);
    }

    #[tokio::test]
    async fn test_zset_range_orders_by_score() {
        let conn = MemoryConnection::new();
        ZSetOps::add(&conn, "z", "c", 3.0).await.unwrap();
        ZSetOps::add(&conn, "z", "a", 1.0).await.unwrap();
        ZSetOps::add(&conn, "z", "b", 2.0).await.unwrap();

        let members = ZSetOps::range(&conn, "z", 0, -1).await.unwrap();
        assert_eq!(members, vec!["a", "b", "c"]);
    }
}
