//! Launch context: the shared runtime state every array is created against.
//!
//! A [`LaunchContext`] owns the shape cache, the TAD cache, the memory
//! ledger and the configuration. Arrays keep an `Arc` to the context they
//! were created with, so contexts can be swapped per test or per device
//! without any global state.
//!
//! # Examples
//!
//! ```
//! use ndrt_core::{LaunchContext, RuntimeConfig};
//!
//! let host = LaunchContext::host();
//! assert!(!host.is_accelerated());
//!
//! let device = LaunchContext::new(RuntimeConfig::accelerated().with_num_devices(2)).unwrap();
//! assert!(device.is_accelerated());
//! assert_eq!(device.shape_cache().num_devices(), 2);
//! ```

use crate::buffer::{MemoryCounter, MemoryGroup};
use crate::config::RuntimeConfig;
use crate::error::NdResult;
use crate::shape::{ConstantShapeBuffer, ShapeCache, ShapeDescriptor};
use crate::tad::{compute_tad_with_threshold, TadCache, TadDescriptor, TadPack};
use std::fmt;
use std::sync::{Arc, OnceLock};

pub struct LaunchContext {
    config: RuntimeConfig,
    shapes: ShapeCache,
    tads: TadCache,
    memory: Arc<MemoryCounter>,
}

impl LaunchContext {
    /// Build a context from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the error of [`RuntimeConfig::validate`].
    pub fn new(config: RuntimeConfig) -> NdResult<Arc<Self>> {
        config.validate()?;
        let memory = Arc::new(MemoryCounter::new());
        if let Some(limit) = config.host_memory_limit {
            memory.set_group_limit(MemoryGroup::Host, limit);
        }
        if let Some(limit) = config.device_memory_limit {
            memory.set_group_limit(MemoryGroup::Device, limit);
        }
        tracing::debug!(
            accelerated = config.accelerated,
            devices = config.num_devices,
            device_id = config.device_id,
            "created launch context"
        );
        Ok(Arc::new(Self {
            shapes: ShapeCache::new(config.num_devices, config.accelerated),
            tads: TadCache::with_parallel_threshold(config.parallel_threshold),
            memory,
            config,
        }))
    }

    /// Fresh host-only context with default configuration.
    pub fn host() -> Arc<Self> {
        Arc::new(Self {
            shapes: ShapeCache::new(1, false),
            tads: TadCache::with_parallel_threshold(RuntimeConfig::default().parallel_threshold),
            memory: Arc::new(MemoryCounter::new()),
            config: RuntimeConfig::default(),
        })
    }

    /// Process-wide default host-only context.
    pub fn default_context() -> Arc<Self> {
        static DEFAULT: OnceLock<Arc<LaunchContext>> = OnceLock::new();
        Arc::clone(DEFAULT.get_or_init(LaunchContext::host))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn is_accelerated(&self) -> bool {
        self.config.accelerated
    }

    pub fn device_id(&self) -> usize {
        self.config.device_id
    }

    pub fn shape_cache(&self) -> &ShapeCache {
        &self.shapes
    }

    pub fn tad_cache(&self) -> &TadCache {
        &self.tads
    }

    pub fn memory_counter(&self) -> &Arc<MemoryCounter> {
        &self.memory
    }

    /// Intern a descriptor on this context's device.
    pub fn intern(&self, descriptor: &ShapeDescriptor) -> ConstantShapeBuffer {
        self.shapes.intern_on(descriptor, self.config.device_id)
    }

    /// TAD pack for `descriptor`, through the cache when enabled.
    pub fn tad_pack(
        &self,
        descriptor: &ShapeDescriptor,
        dims_to_exclude: &[usize],
        keep_unities: bool,
    ) -> NdResult<Arc<TadPack>> {
        if self.config.cache_tads {
            self.tads
                .get_or_compute(&TadDescriptor::new(descriptor, dims_to_exclude, keep_unities))
        } else {
            compute_tad_with_threshold(
                descriptor,
                dims_to_exclude,
                keep_unities,
                self.config.parallel_threshold,
            )
            .map(Arc::new)
        }
    }
}

impl fmt::Debug for LaunchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchContext")
            .field("config", &self.config)
            .field("shapes", &self.shapes)
            .field("tads", &self.tads.len())
            .finish()
    }
}
