//! Per-document stage profiling and cache metrics tracking.
//!
//! The profiler is owned by a single document task and never shared, so
//! plain `&mut self` begin/end calls replace the context managers of more
//! dynamic runtimes. Disabling it at construction turns every call into a
//! no-op; profiling never affects functional behavior.

use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Timing of one stage, microsecond precision, with nested sub-stages.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub name: String,
    pub start_us: u64,
    pub end_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_stages: Vec<StageTiming>,
}

impl StageTiming {
    pub fn duration_us(&self) -> Option<u64> {
        self.end_us.map(|end| end - self.start_us)
    }
}

/// Nested stage timer for one pipeline run.
pub struct PipelineProfiler {
    enabled: bool,
    origin: Instant,
    finished: Vec<StageTiming>,
    stack: Vec<StageTiming>,
}

impl PipelineProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            origin: Instant::now(),
            finished: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    /// Open a stage. Stages opened while another is active become its
    /// sub-stages.
    pub fn begin(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        let parent = self.stack.last().map(|s| s.name.clone());
        self.stack.push(StageTiming {
            name: name.to_string(),
            start_us: self.now_us(),
            end_us: None,
            parent,
            metadata: Map::new(),
            sub_stages: Vec::new(),
        });
    }

    /// Close the innermost open stage.
    pub fn end(&mut self) {
        if !self.enabled {
            return;
        }
        let Some(mut stage) = self.stack.pop() else {
            return;
        };
        stage.end_us = Some(self.now_us());
        match self.stack.last_mut() {
            Some(parent) => parent.sub_stages.push(stage),
            None => self.finished.push(stage),
        }
    }

    /// Attach metadata to the innermost open stage.
    pub fn annotate(&mut self, key: &str, value: Value) {
        if !self.enabled {
            return;
        }
        if let Some(stage) = self.stack.last_mut() {
            stage.metadata.insert(key.to_string(), value);
        }
    }

    pub fn total_elapsed_us(&self) -> u64 {
        self.now_us()
    }

    pub fn stage(&self, name: &str) -> Option<&StageTiming> {
        self.finished.iter().find(|s| s.name == name)
    }

    /// Export completed stages for storage. Open stages are not included.
    pub fn export(&self) -> Value {
        if !self.enabled {
            return Value::Null;
        }
        json!({
            "total_duration_us": self.total_elapsed_us(),
            "stages": self.finished,
        })
    }
}

/// Accumulated cache operation counts and latencies, split by tier.
#[derive(Debug, Default)]
pub struct CacheMetricsTracker {
    l1_hits: u64,
    l1_misses: u64,
    l1_latency_total_us: u64,
    l2_hits: u64,
    l2_misses: u64,
    l2_latency_total_us: u64,
    evictions: u64,
    started: Option<Instant>,
}

impl CacheMetricsTracker {
    pub fn new() -> Self {
        Self {
            started: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_operation(&mut self, tier: crate::cache::CacheTier, hit: bool, latency_us: u64) {
        match tier {
            crate::cache::CacheTier::L1 => {
                self.l1_latency_total_us += latency_us;
                if hit {
                    self.l1_hits += 1;
                } else {
                    self.l1_misses += 1;
                }
            }
            crate::cache::CacheTier::L2 => {
                self.l2_latency_total_us += latency_us;
                if hit {
                    self.l2_hits += 1;
                } else {
                    self.l2_misses += 1;
                }
            }
        }
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn l1_hit_rate(&self) -> f64 {
        ratio(self.l1_hits, self.l1_hits + self.l1_misses)
    }

    pub fn l2_hit_rate(&self) -> f64 {
        ratio(self.l2_hits, self.l2_hits + self.l2_misses)
    }

    pub fn combined_hit_rate(&self) -> f64 {
        let hits = self.l1_hits + self.l2_hits;
        let total = hits + self.l1_misses + self.l2_misses;
        ratio(hits, total)
    }

    /// Operations per second since construction.
    pub fn throughput(&self) -> f64 {
        let Some(started) = self.started else {
            return 0.0;
        };
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let ops = self.l1_hits + self.l1_misses + self.l2_hits + self.l2_misses;
        ops as f64 / elapsed
    }

    pub fn export(&self) -> Value {
        json!({
            "l1": {
                "hits": self.l1_hits,
                "misses": self.l1_misses,
                "hit_rate": self.l1_hit_rate(),
                "avg_latency_us": avg(self.l1_latency_total_us, self.l1_hits + self.l1_misses),
            },
            "l2": {
                "hits": self.l2_hits,
                "misses": self.l2_misses,
                "hit_rate": self.l2_hit_rate(),
                "avg_latency_us": avg(self.l2_latency_total_us, self.l2_hits + self.l2_misses),
            },
            "combined_hit_rate": self.combined_hit_rate(),
            "evictions": self.evictions,
            "throughput_ops_per_sec": self.throughput(),
        })
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn avg(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTier;

    #[test]
    fn test_nested_stages() {
        let mut profiler = PipelineProfiler::new(true);
        profiler.begin("detection");
        profiler.begin("primary_engine");
        profiler.end();
        profiler.begin("fallback_engine");
        profiler.end();
        profiler.end();

        let detection = profiler.stage("detection").unwrap();
        assert_eq!(detection.sub_stages.len(), 2);
        assert_eq!(detection.sub_stages[0].name, "primary_engine");
        assert_eq!(
            detection.sub_stages[0].parent.as_deref(),
            Some("detection")
        );
        assert!(detection.duration_us().is_some());
    }

    #[test]
    fn test_disabled_profiler_is_noop() {
        let mut profiler = PipelineProfiler::new(false);
        profiler.begin("x");
        profiler.end();
        assert!(profiler.stage("x").is_none());
        assert_eq!(profiler.export(), Value::Null);
    }

    #[test]
    fn test_annotate() {
        let mut profiler = PipelineProfiler::new(true);
        profiler.begin("cache_lookup");
        profiler.annotate("tier", json!("l1"));
        profiler.end();
        let stage = profiler.stage("cache_lookup").unwrap();
        assert_eq!(stage.metadata.get("tier"), Some(&json!("l1")));
    }

    #[test]
    fn test_unbalanced_end_is_harmless() {
        let mut profiler = PipelineProfiler::new(true);
        profiler.end();
        profiler.begin("x");
        profiler.end();
        profiler.end();
        assert!(profiler.stage("x").is_some());
    }

    #[test]
    fn test_cache_metrics_rates() {
        let mut tracker = CacheMetricsTracker::new();
        tracker.record_operation(CacheTier::L1, true, 100);
        tracker.record_operation(CacheTier::L1, false, 150);
        tracker.record_operation(CacheTier::L2, true, 4000);
        tracker.record_eviction();

        assert!((tracker.l1_hit_rate() - 0.5).abs() < 1e-9);
        assert!((tracker.l2_hit_rate() - 1.0).abs() < 1e-9);
        assert!((tracker.combined_hit_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!(tracker.throughput() > 0.0);

        let exported = tracker.export();
        assert_eq!(exported["evictions"], json!(1));
        assert_eq!(exported["l1"]["hits"], json!(1));
    }

    #[test]
    fn test_empty_tracker_rates_are_zero() {
        let tracker = CacheMetricsTracker::default();
        assert_eq!(tracker.l1_hit_rate(), 0.0);
        assert_eq!(tracker.combined_hit_rate(), 0.0);
        assert_eq!(tracker.throughput(), 0.0);
    }
}
