//! Integration tests for the observation layer
//!
//! Exercises the public API end to end: proxy, bus and collector wired
//! together the way a host application would use them.

use std::sync::Arc;

use cache_probe::{
    CacheBackend, CacheError, CacheOp, CallBus, ContextProvider, Frame, MemoryCache,
    ObservedCache, Result, StatsCollector,
};

fn wired() -> (
    ObservedCache<MemoryCache>,
    Arc<StatsCollector>,
    cache_probe::Subscription,
) {
    let bus = CallBus::new();
    let collector = Arc::new(StatsCollector::new());
    let sub = bus.subscribe(collector.clone());
    (ObservedCache::new(MemoryCache::new(), bus), collector, sub)
}

#[test]
fn test_basic_scenario() {
    let (mut cache, collector, _sub) = wired();

    cache.set("x", "1".to_string(), None, None).unwrap();
    assert_eq!(cache.get("x", None).unwrap(), Some("1".to_string()));
    assert_eq!(cache.get("y", None).unwrap(), None);
    assert!(cache.delete("x", None).unwrap());

    let counts = collector.op_counts();
    assert_eq!(counts[&CacheOp::Set], 1);
    assert_eq!(counts[&CacheOp::Get], 2);
    assert_eq!(counts[&CacheOp::Delete], 1);
    for op in CacheOp::ALL {
        if !matches!(op, CacheOp::Set | CacheOp::Get | CacheOp::Delete) {
            assert_eq!(counts[&op], 0, "unexpected count for {op}");
        }
    }

    assert_eq!(collector.hits(), 1);
    assert_eq!(collector.misses(), 1);
    assert!(collector.total_time_ms() >= 0.0);

    let calls = collector.calls();
    assert_eq!(calls.len(), 4);
    let ops: Vec<CacheOp> = calls.iter().map(|call| call.op).collect();
    assert_eq!(
        ops,
        vec![CacheOp::Set, CacheOp::Get, CacheOp::Get, CacheOp::Delete]
    );
    assert_eq!(calls[1].args, "x");
}

#[test]
fn test_delete_actually_deletes() {
    // Regression guard: delete must delegate to the backend's delete, which
    // is only provable by checking the stored value is gone afterwards.
    let (mut cache, _collector, _sub) = wired();

    cache.set("k", "v".to_string(), None, None).unwrap();
    cache.delete("k", None).unwrap();

    let mut backend = cache.into_inner();
    assert_eq!(backend.get("k", None).unwrap(), None);
    assert!(!backend.has_key("k", None).unwrap());
}

#[test]
fn test_get_many_classification() {
    let (mut cache, collector, _sub) = wired();

    cache.set("b", "x".to_string(), None, None).unwrap();
    let hits_before = collector.hits();
    let misses_before = collector.misses();

    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let found = cache.get_many(&keys, None).unwrap();

    assert_eq!(found["a"], None);
    assert_eq!(found["b"], Some("x".to_string()));
    assert_eq!(found["c"], None);
    assert_eq!(collector.misses() - misses_before, 2);
    assert_eq!(collector.hits() - hits_before, 1);
    assert_eq!(collector.op_counts()[&CacheOp::GetMany], 1);
}

#[test]
fn test_bulk_writes_pass_through() {
    let (mut cache, collector, _sub) = wired();

    let entries = vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
        ("c".to_string(), "3".to_string()),
    ];
    cache.set_many(&entries, None, None).unwrap();
    cache
        .delete_many(&["a".to_string(), "b".to_string()], None)
        .unwrap();

    assert_eq!(cache.get("c", None).unwrap(), Some("3".to_string()));
    assert_eq!(cache.get("a", None).unwrap(), None);
    assert_eq!(collector.op_counts()[&CacheOp::SetMany], 1);
    assert_eq!(collector.op_counts()[&CacheOp::DeleteMany], 1);
}

#[test]
fn test_counters_and_flags() {
    let (mut cache, collector, _sub) = wired();

    assert!(cache.add("n", "10".to_string(), None, None).unwrap());
    assert!(!cache.add("n", "20".to_string(), None, None).unwrap());
    assert_eq!(cache.incr("n", 5, None).unwrap(), 15);
    assert_eq!(cache.decr("n", 1, None).unwrap(), 14);
    assert!(cache.has_key("n", None).unwrap());
    cache.clear().unwrap();
    assert!(!cache.has_key("n", None).unwrap());

    let counts = collector.op_counts();
    assert_eq!(counts[&CacheOp::Add], 2);
    assert_eq!(counts[&CacheOp::Incr], 1);
    assert_eq!(counts[&CacheOp::Decr], 1);
    assert_eq!(counts[&CacheOp::HasKey], 2);
    assert_eq!(counts[&CacheOp::Clear], 1);
    // Counter and existence ops never classify hits or misses.
    assert_eq!(collector.hits(), 0);
    assert_eq!(collector.misses(), 0);
}

#[test]
fn test_failed_call_leaves_no_trace() {
    let (mut cache, collector, _sub) = wired();

    let result = cache.incr("missing", 1, None);
    assert!(matches!(result, Err(CacheError::NotFound(_))));
    assert_eq!(collector.call_count(), 0);
    assert_eq!(collector.total_time_ms(), 0.0);
}

#[test]
fn test_collector_lifetime_is_the_subscription() {
    let bus = CallBus::new();
    let mut cache = ObservedCache::new(MemoryCache::new(), bus.clone());

    // First unit of work.
    let first = Arc::new(StatsCollector::new());
    let sub = bus.subscribe(first.clone());
    cache.set("k", "v".to_string(), None, None).unwrap();
    sub.unsubscribe();

    // Second unit of work only sees its own calls.
    let second = Arc::new(StatsCollector::new());
    let _sub = bus.subscribe(second.clone());
    cache.get("k", None).unwrap();

    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
    assert_eq!(second.op_counts()[&CacheOp::Get], 1);
    assert_eq!(second.op_counts()[&CacheOp::Set], 0);
}

#[test]
fn test_two_collectors_both_receive() {
    let bus = CallBus::new();
    let first = Arc::new(StatsCollector::new());
    let second = Arc::new(StatsCollector::new());
    let _sub_a = bus.subscribe(first.clone());
    let _sub_b = bus.subscribe(second.clone());

    let mut cache = ObservedCache::new(MemoryCache::new(), bus);
    cache.get("k", None).unwrap();

    assert_eq!(first.misses(), 1);
    assert_eq!(second.misses(), 1);
}

struct PageContext;

impl ContextProvider for PageContext {
    fn call_frames(&self) -> Vec<Frame> {
        vec![Frame {
            file: "templates/index.html".to_string(),
            line: 12,
            function: Some("render".to_string()),
            source: Some("{% cache_fragment \"sidebar\" %}".to_string()),
        }]
    }

    fn render_context(&self) -> Result<Option<String>> {
        Ok(Some("index.html".to_string()))
    }
}

#[test]
fn test_context_hint_flows_into_call_log() {
    let bus = CallBus::new();
    let collector = Arc::new(StatsCollector::new());
    let _sub = bus.subscribe(collector.clone());
    let mut cache =
        ObservedCache::new(MemoryCache::new(), bus).with_context(Arc::new(PageContext));

    cache.get("sidebar", None).unwrap();

    let calls = collector.calls();
    assert_eq!(calls[0].context_hint, Some("index.html".to_string()));
    // Innermost frame is this test; the provider's rendering frame follows.
    assert_eq!(calls[0].call_site.len(), 2);
    assert_eq!(calls[0].call_site[1].file, "templates/index.html");
    assert_eq!(calls[0].call_site[1].function.as_deref(), Some("render"));
}

#[test]
fn test_snapshot_renders_to_json() {
    let (mut cache, collector, _sub) = wired();

    cache.set("x", "1".to_string(), None, None).unwrap();
    cache.get("x", None).unwrap();

    let json = serde_json::to_value(collector.snapshot()).unwrap();
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 0);
    assert_eq!(json["total_calls"], 2);
    assert_eq!(json["op_counts"]["set"], 1);
    assert_eq!(json["calls"][0]["op"], "set");
    assert!(json["calls"][0]["time_ms"].as_f64().unwrap() >= 0.0);
}
