//! Memoization in front of [`PoincareMap`].
//!
//! Results are cached per exact (a, b, c) triple in an injected [`ResultStore`]. The
//! store only ever holds complete results behind an `Arc`, and at most one computation
//! per key is in flight: concurrent callers asking for the same triple wait for the
//! first one to publish instead of integrating again.

use crate::error::PoincareError;
use crate::poincare::{PoincareMap, PoincareResult};
use crate::rossler::Parameters;
use crate::section::Section;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::trace;

pub type SharedResult<P> = Arc<PoincareResult<P>>;

/// Exact bit patterns of (a, b, c). `0.0` and `-0.0` are different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey([u64; 3]);

impl From<Parameters> for ParamKey {
    fn from(params: Parameters) -> Self {
        ParamKey([params.a.to_bits(), params.b.to_bits(), params.c.to_bits()])
    }
}

/// Key-value storage for finished results.
pub trait ResultStore<V: Clone>: Send {
    fn get(&mut self, key: &ParamKey) -> Option<V>;
    fn insert(&mut self, key: ParamKey, value: V);
    fn len(&self) -> usize;
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grows without limit for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct UnboundedStore<V> {
    entries: HashMap<ParamKey, V>,
}

impl<V> Default for UnboundedStore<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone + Send> ResultStore<V> for UnboundedStore<V> {
    fn get(&mut self, key: &ParamKey) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: ParamKey, value: V) {
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Keeps at most `capacity` entries, evicting the least recently used.
#[derive(Debug, Clone)]
pub struct LruStore<V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<ParamKey, (V, u64)>,
    recency: BTreeMap<u64, ParamKey>,
}

impl<V> LruStore<V> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&mut self, key: ParamKey) -> u64 {
        self.tick += 1;
        self.recency.insert(self.tick, key);
        self.tick
    }
}

impl<V: Clone + Send> ResultStore<V> for LruStore<V> {
    fn get(&mut self, key: &ParamKey) -> Option<V> {
        let last_used = self.entries.get(key)?.1;
        self.recency.remove(&last_used);
        let tick = self.touch(*key);
        let entry = self.entries.get_mut(key)?;
        entry.1 = tick;
        Some(entry.0.clone())
    }

    fn insert(&mut self, key: ParamKey, value: V) {
        if let Some((_, last_used)) = self.entries.remove(&key) {
            self.recency.remove(&last_used);
        } else if self.entries.len() >= self.capacity {
            if let Some((_, oldest)) = self.recency.pop_first() {
                self.entries.remove(&oldest);
                trace!(?oldest, "evicted least recently used result");
            }
        }
        let tick = self.touch(key);
        self.entries.insert(key, (value, tick));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Number of times the integrator actually ran.
    pub computations: u64,
}

struct CacheState<St> {
    store: St,
    in_flight: HashSet<ParamKey>,
}

/// A [`PoincareMap`] with a result cache in front of it.
pub struct CachedPoincareMap<S: Section, St> {
    map: PoincareMap<S>,
    state: Mutex<CacheState<St>>,
    published: Condvar,
    hits: AtomicU64,
    computations: AtomicU64,
}

impl<S: Section> CachedPoincareMap<S, UnboundedStore<SharedResult<S::Point>>> {
    pub fn unbounded(map: PoincareMap<S>) -> Self {
        Self::with_store(map, UnboundedStore::default())
    }
}

impl<S: Section> CachedPoincareMap<S, LruStore<SharedResult<S::Point>>> {
    pub fn lru(map: PoincareMap<S>, capacity: usize) -> Self {
        Self::with_store(map, LruStore::new(capacity))
    }
}

impl<S, St> CachedPoincareMap<S, St>
where
    S: Section,
    St: ResultStore<SharedResult<S::Point>>,
{
    pub fn with_store(map: PoincareMap<S>, store: St) -> Self {
        Self {
            map,
            state: Mutex::new(CacheState {
                store,
                in_flight: HashSet::new(),
            }),
            published: Condvar::new(),
            hits: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    // Only complete results are ever written, so a poisoned lock still guards a
    // consistent store.
    fn lock(&self) -> MutexGuard<'_, CacheState<St>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached result for `params`, computing it if no one has yet.
    pub fn get_or_compute(
        &self,
        params: Parameters,
    ) -> Result<SharedResult<S::Point>, PoincareError> {
        params.validate()?;
        let key = ParamKey::from(params);

        let mut state = self.lock();
        loop {
            if let Some(hit) = state.store.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(?key, "cache hit");
                return Ok(hit);
            }
            if !state.in_flight.contains(&key) {
                break;
            }
            trace!(?key, "joining in-flight computation");
            state = self
                .published
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight.insert(key);
        drop(state);

        let claim = InFlight { owner: self, key };
        self.computations.fetch_add(1, Ordering::Relaxed);
        let result = Arc::new(self.map.compute(params)?);
        claim.publish(result.clone());
        Ok(result)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().store.clear();
    }
}

/// Marks a key as being computed. Dropping it without publishing (error or panic)
/// releases the key so a waiter can take over.
struct InFlight<'a, S, St>
where
    S: Section,
    St: ResultStore<SharedResult<S::Point>>,
{
    owner: &'a CachedPoincareMap<S, St>,
    key: ParamKey,
}

impl<S, St> InFlight<'_, S, St>
where
    S: Section,
    St: ResultStore<SharedResult<S::Point>>,
{
    fn publish(self, result: SharedResult<S::Point>) {
        self.owner.lock().store.insert(self.key, result);
    }
}

impl<S, St> Drop for InFlight<'_, S, St>
where
    S: Section,
    St: ResultStore<SharedResult<S::Point>>,
{
    fn drop(&mut self) {
        self.owner.lock().in_flight.remove(&self.key);
        self.owner.published.notify_all();
    }
}
