//! Cache of per-master computations, keyed by object and time.
//!
//! Bounding cylinders and remapped points of a master do not depend on the
//! strand they are bent on, so they are computed once per master and time
//! and shared by every strand that picks that master.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::provider::ObjectId;

/// Time quantized to a thousandth of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey(i64);

impl TimeKey {
    pub fn new(time: f64) -> Self {
        Self((time * 1000.0).round() as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub object: ObjectId,
    pub time: TimeKey,
}

impl CacheKey {
    pub fn new(object: ObjectId, time: f64) -> Self {
        Self {
            object,
            time: TimeKey::new(time),
        }
    }
}

/// Shared storage of computed values with a lookup table into it.
#[derive(Debug)]
pub struct InstanceCache<T> {
    entries: Vec<Arc<T>>,
    index: HashMap<CacheKey, usize>,
    uncacheable: HashSet<ObjectId>,
    computations: usize,
    hits: usize,
}

impl<T> Default for InstanceCache<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            uncacheable: HashSet::new(),
            computations: 0,
            hits: 0,
        }
    }
}

impl<T> InstanceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` or compute and store it.
    ///
    /// `is_cacheable` is asked once per object; objects it rejects are
    /// recomputed on every lookup and never stored. A failed computation
    /// stores nothing.
    pub fn lookup_or_insert<E>(
        &mut self,
        key: CacheKey,
        is_cacheable: impl FnOnce() -> bool,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if self.uncacheable.contains(&key.object) {
            self.computations += 1;
            return compute().map(Arc::new);
        }

        match self.index.entry(key) {
            Entry::Occupied(slot) => {
                self.hits += 1;
                Ok(Arc::clone(&self.entries[*slot.get()]))
            }
            Entry::Vacant(slot) => {
                if !is_cacheable() {
                    self.uncacheable.insert(key.object);
                    self.computations += 1;
                    return compute().map(Arc::new);
                }
                self.computations += 1;
                let value = Arc::new(compute()?);
                slot.insert(self.entries.len());
                self.entries.push(Arc::clone(&value));
                Ok(value)
            }
        }
    }

    pub fn is_uncacheable(&self, object: ObjectId) -> bool {
        self.uncacheable.contains(&object)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times a value was computed.
    pub fn computations(&self) -> usize {
        self.computations
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
