//! Observation Module
//!
//! The instrumentation layer: a transparent proxy that times every cache
//! call, a publish/subscribe bus carrying the resulting events, and a
//! collector turning the event stream into display-ready statistics.

mod bus;
mod collector;
mod event;
mod proxy;


// Re-export public types
pub use bus::{CallBus, CallObserver, Subscription};
pub use collector::{CallRecord, StatsCollector, StatsSnapshot};
pub use event::{CacheOp, CallEvent, CallOutcome, Frame};
pub use proxy::{ContextProvider, ObserveOptions, ObservedCache};
