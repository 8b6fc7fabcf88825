//! Call Event Module
//!
//! Defines the immutable record emitted once per observed cache call.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Operation ==
/// The eleven operation kinds of the cache capability contract.
///
/// The enum is closed: an event can never carry an operation the collector
/// does not know about, so the "unknown operation" failure mode is ruled out
/// at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOp {
    Add,
    Get,
    Set,
    Delete,
    GetMany,
    SetMany,
    DeleteMany,
    HasKey,
    Incr,
    Decr,
    Clear,
}

impl CacheOp {
    /// Every operation kind, in contract order.
    pub const ALL: [CacheOp; 11] = [
        CacheOp::Add,
        CacheOp::Get,
        CacheOp::Set,
        CacheOp::Delete,
        CacheOp::GetMany,
        CacheOp::SetMany,
        CacheOp::DeleteMany,
        CacheOp::HasKey,
        CacheOp::Incr,
        CacheOp::Decr,
        CacheOp::Clear,
    ];

    /// Stable display name used in logs and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOp::Add => "add",
            CacheOp::Get => "get",
            CacheOp::Set => "set",
            CacheOp::Delete => "delete",
            CacheOp::GetMany => "get_many",
            CacheOp::SetMany => "set_many",
            CacheOp::DeleteMany => "delete_many",
            CacheOp::HasKey => "has_key",
            CacheOp::Incr => "incr",
            CacheOp::Decr => "decr",
            CacheOp::Clear => "clear",
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Stack Frame ==
/// One frame of the captured call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Source file path
    pub file: String,
    /// Line number within the file
    pub line: u32,
    /// Enclosing function name, when the introspection facility knows it
    pub function: Option<String>,
    /// Source line text, when available
    pub source: Option<String>,
}

impl Frame {
    /// Builds a frame with only file and line, the minimum a call site needs.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            function: None,
            source: None,
        }
    }
}

// == Call Outcome ==
/// What the delegated call returned, shaped so the collector can classify
/// hits and misses without re-querying the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// A `get` result: the stored value or the explicit absent marker
    Value(Option<String>),
    /// A `get_many` result: one entry per requested key
    Values(BTreeMap<String, Option<String>>),
    /// A boolean result (add/delete/has_key)
    Flag(bool),
    /// A counter result (incr/decr)
    Count(i64),
    /// No meaningful return value (set/set_many/delete_many/clear)
    Unit,
}

// == Call Event ==
/// Immutable record describing one observed cache call.
///
/// Created by the proxy immediately after a delegated call returns and never
/// mutated afterwards; subscribers receive it by shared reference during the
/// synchronous publish.
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Which contract operation was invoked
    pub op: CacheOp,
    /// Wall-clock time spent inside the delegated call only
    pub duration: Duration,
    /// Display form of the primary argument(s)
    pub args: String,
    /// The delegated call's return value
    pub outcome: CallOutcome,
    /// Call site, innermost frame first, proxy frames excluded
    pub call_site: Vec<Frame>,
    /// Enclosing rendering context, when the host could resolve one
    pub context_hint: Option<String>,
    /// When the call was made
    pub at: DateTime<Utc>,
}
