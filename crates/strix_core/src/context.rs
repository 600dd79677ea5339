//! Per-pass export state.
//!
//! One [`ExportContext`] is built for a frame, owns the master cache and the
//! configuration for that frame, and is dropped once the pass is over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::InstanceCache;
use crate::config::ExportConfig;
use crate::instance::MasterInstances;

/// Cancellation flag shared with whoever may stop the pass.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters reported at the end of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub objects_exported: usize,
    pub objects_failed: usize,
    pub strands: usize,
    pub nodes: usize,
    pub cache_hits: usize,
    pub cache_computations: usize,
    pub motion_blur_downgrades: usize,
}

pub struct ExportContext {
    pub config: ExportConfig,
    pub cache: InstanceCache<MasterInstances>,
    pub abort: AbortSignal,
    pub stats: ExportStats,
}

impl ExportContext {
    pub fn new(config: ExportConfig) -> Self {
        Self::with_abort(config, AbortSignal::new())
    }

    pub fn with_abort(config: ExportConfig, abort: AbortSignal) -> Self {
        Self {
            config,
            cache: InstanceCache::new(),
            abort,
            stats: ExportStats::default(),
        }
    }

    /// Copy the cache counters into the stats.
    pub fn sync_cache_stats(&mut self) {
        self.stats.cache_hits = self.cache.hits();
        self.stats.cache_computations = self.cache.computations();
    }
}
