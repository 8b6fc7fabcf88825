//! Observing Proxy Module
//!
//! Wraps any [`CacheBackend`] so every call is timed and published as a Call
//! Event without changing the backend's behavior. All eleven operations run
//! through one shared instrumentation path; the only per-operation variation
//! is which backend method is delegated to and how its result maps to a
//! [`CallOutcome`].

use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::trace;

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::observe::bus::CallBus;
use crate::observe::event::{CacheOp, CallEvent, CallOutcome, Frame};

// == Context Provider Trait ==
/// Host-supplied hook resolving the rendering context of the current call.
///
/// Replaces reflective stack walking: the host environment, which knows what
/// a "rendering frame" looks like, hands the proxy an explicit capability.
/// Resolution is best-effort; any `Err` degrades to "no hint".
pub trait ContextProvider: Send + Sync {
    /// Frames describing the current call site beyond the immediate caller,
    /// innermost first. Defaults to none.
    fn call_frames(&self) -> Vec<Frame> {
        Vec::new()
    }

    /// Identifier of the enclosing rendering context (e.g. a template name),
    /// or `None` if the call did not originate from one.
    fn render_context(&self) -> Result<Option<String>>;
}

// == Observe Options ==
/// Tunables for the proxy.
#[derive(Debug, Clone)]
pub struct ObserveOptions {
    /// Maximum length of the displayable argument text; longer text is
    /// truncated with a trailing ellipsis
    pub max_arg_len: usize,
    /// Whether to capture call sites at all
    pub capture_call_site: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            max_arg_len: 200,
            capture_call_site: true,
        }
    }
}

// == Observed Cache ==
/// Transparent instrumenting wrapper around a cache backend.
///
/// Presents the full capability contract with identical signatures and
/// return values. Each successful call emits exactly one event on the bus,
/// synchronously, before the result is returned; a failed delegated call
/// emits no event and the error is propagated unchanged.
pub struct ObservedCache<B> {
    backend: B,
    bus: CallBus,
    context: Option<Arc<dyn ContextProvider>>,
    options: ObserveOptions,
}

impl<B: CacheBackend> ObservedCache<B> {
    // == Constructor ==
    /// Wraps `backend`, publishing events on `bus`.
    pub fn new(backend: B, bus: CallBus) -> Self {
        Self {
            backend,
            bus,
            context: None,
            options: ObserveOptions::default(),
        }
    }

    /// Attaches a host-supplied context provider.
    pub fn with_context(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    /// Overrides the default options.
    pub fn with_options(mut self, options: ObserveOptions) -> Self {
        self.options = options;
        self
    }

    /// The bus this proxy publishes on.
    pub fn bus(&self) -> &CallBus {
        &self.bus
    }

    /// Unwraps the proxy, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }

    // == Instrumentation Core ==
    /// Shared observation path for every operation.
    ///
    /// Times the delegated call, and on success builds and publishes one
    /// event before handing the untouched result back. On failure the error
    /// is returned as-is and nothing is published.
    fn observe<T>(
        &mut self,
        op: CacheOp,
        args: String,
        caller: &'static Location<'static>,
        delegate: impl FnOnce(&mut B) -> Result<T>,
        outcome: impl FnOnce(&T) -> CallOutcome,
    ) -> Result<T> {
        let started = Instant::now();
        let value = delegate(&mut self.backend)?;
        let duration = started.elapsed();

        let event = CallEvent {
            op,
            duration,
            args: self.display_args(args),
            outcome: outcome(&value),
            call_site: self.call_site(caller),
            context_hint: self.context_hint(),
            at: Utc::now(),
        };
        trace!(op = %event.op, duration_us = duration.as_micros() as u64, "cache call observed");
        self.bus.publish(&event);

        Ok(value)
    }

    fn display_args(&self, raw: String) -> String {
        if raw.chars().count() <= self.options.max_arg_len {
            return raw;
        }
        let mut cut: String = raw.chars().take(self.options.max_arg_len).collect();
        cut.push_str("...");
        cut
    }

    fn call_site(&self, caller: &'static Location<'static>) -> Vec<Frame> {
        if !self.options.capture_call_site {
            return Vec::new();
        }
        // The innermost frame is the direct caller; the provider may know
        // about outer frames the proxy cannot see.
        let mut frames = vec![Frame::new(caller.file(), caller.line())];
        if let Some(provider) = &self.context {
            frames.extend(provider.call_frames());
        }
        frames
    }

    fn context_hint(&self) -> Option<String> {
        let provider = self.context.as_ref()?;
        match provider.render_context() {
            Ok(hint) => hint,
            Err(err) => {
                trace!(error = %err, "context hint resolution failed, dropping hint");
                None
            }
        }
    }

    // == Contract Operations ==
    /// Stores `value` only if `key` is absent. See [`CacheBackend::add`].
    #[track_caller]
    pub fn add(
        &mut self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<bool> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Add,
            key.to_string(),
            caller,
            |backend| backend.add(key, value, ttl, version),
            |stored| CallOutcome::Flag(*stored),
        )
    }

    /// Retrieves the value under `key`, or `None` if absent.
    #[track_caller]
    pub fn get(&mut self, key: &str, version: Option<u32>) -> Result<Option<String>> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Get,
            key.to_string(),
            caller,
            |backend| backend.get(key, version),
            |value| CallOutcome::Value(value.clone()),
        )
    }

    /// Stores `value` under `key`.
    #[track_caller]
    pub fn set(
        &mut self,
        key: &str,
        value: String,
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<()> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Set,
            key.to_string(),
            caller,
            |backend| backend.set(key, value, ttl, version),
            |_| CallOutcome::Unit,
        )
    }

    /// Removes `key` from the wrapped cache.
    #[track_caller]
    pub fn delete(&mut self, key: &str, version: Option<u32>) -> Result<bool> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Delete,
            key.to_string(),
            caller,
            |backend| backend.delete(key, version),
            |removed| CallOutcome::Flag(*removed),
        )
    }

    /// Retrieves several keys at once.
    #[track_caller]
    pub fn get_many(
        &mut self,
        keys: &[String],
        version: Option<u32>,
    ) -> Result<BTreeMap<String, Option<String>>> {
        let caller = Location::caller();
        self.observe(
            CacheOp::GetMany,
            format!("{keys:?}"),
            caller,
            |backend| backend.get_many(keys, version),
            |found| CallOutcome::Values(found.clone()),
        )
    }

    /// Stores several key-value pairs at once.
    #[track_caller]
    pub fn set_many(
        &mut self,
        entries: &[(String, String)],
        ttl: Option<u64>,
        version: Option<u32>,
    ) -> Result<()> {
        let caller = Location::caller();
        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
        self.observe(
            CacheOp::SetMany,
            format!("{keys:?}"),
            caller,
            |backend| backend.set_many(entries, ttl, version),
            |_| CallOutcome::Unit,
        )
    }

    /// Removes several keys at once.
    #[track_caller]
    pub fn delete_many(&mut self, keys: &[String], version: Option<u32>) -> Result<()> {
        let caller = Location::caller();
        self.observe(
            CacheOp::DeleteMany,
            format!("{keys:?}"),
            caller,
            |backend| backend.delete_many(keys, version),
            |_| CallOutcome::Unit,
        )
    }

    /// Returns whether `key` currently holds a value.
    #[track_caller]
    pub fn has_key(&mut self, key: &str, version: Option<u32>) -> Result<bool> {
        let caller = Location::caller();
        self.observe(
            CacheOp::HasKey,
            key.to_string(),
            caller,
            |backend| backend.has_key(key, version),
            |present| CallOutcome::Flag(*present),
        )
    }

    /// Increments the numeric value under `key`.
    #[track_caller]
    pub fn incr(&mut self, key: &str, delta: i64, version: Option<u32>) -> Result<i64> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Incr,
            key.to_string(),
            caller,
            |backend| backend.incr(key, delta, version),
            |count| CallOutcome::Count(*count),
        )
    }

    /// Decrements the numeric value under `key`.
    #[track_caller]
    pub fn decr(&mut self, key: &str, delta: i64, version: Option<u32>) -> Result<i64> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Decr,
            key.to_string(),
            caller,
            |backend| backend.decr(key, delta, version),
            |count| CallOutcome::Count(*count),
        )
    }

    /// Removes every entry from the wrapped cache.
    #[track_caller]
    pub fn clear(&mut self) -> Result<()> {
        let caller = Location::caller();
        self.observe(
            CacheOp::Clear,
            String::new(),
            caller,
            |backend| backend.clear(),
            |_| CallOutcome::Unit,
        )
    }
}
