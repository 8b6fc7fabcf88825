//! Cache Probe - transparent instrumentation for key-value cache clients
//!
//! Wraps any cache backend so every operation is timed, counted and
//! classified as a hit or miss, with call sites captured for diagnostics.
//!
//! ```
//! use std::sync::Arc;
//! use cache_probe::{CallBus, MemoryCache, ObservedCache, StatsCollector};
//!
//! let bus = CallBus::new();
//! let collector = Arc::new(StatsCollector::new());
//! let _sub = bus.subscribe(collector.clone());
//!
//! let mut cache = ObservedCache::new(MemoryCache::new(), bus);
//! cache.set("greeting", "hello".to_string(), None, None).unwrap();
//! cache.get("greeting", None).unwrap();
//! cache.get("missing", None).unwrap();
//!
//! assert_eq!(collector.hits(), 1);
//! assert_eq!(collector.misses(), 1);
//! assert_eq!(collector.call_count(), 3);
//! ```

pub mod backend;
pub mod error;
pub mod observe;

pub use backend::{CacheBackend, MemoryCache};
pub use error::{CacheError, Result};
pub use observe::{
    CacheOp, CallBus, CallEvent, CallObserver, CallOutcome, CallRecord, ContextProvider, Frame,
    ObserveOptions, ObservedCache, StatsCollector, StatsSnapshot, Subscription,
};
