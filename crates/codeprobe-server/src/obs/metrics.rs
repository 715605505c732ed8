//! Probe metrics registry.
//!
//! Counter/gauge/histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram observations are accumulated in integer microseconds
//! and rendered in seconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use codeprobe_core::{CodeBucket, FailureKind};

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn write_sample(out: &mut String, name: &str, labels: &str, value: impl std::fmt::Display) {
    if labels.is_empty() {
        let _ = writeln!(out, "{} {}", name, value);
    } else {
        let _ = writeln!(out, "{}{{{}}} {}", name, labels, value);
    }
}

fn micros_as_secs(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value; 0 for a label set that was never touched.
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "counter");
        let mut rows: Vec<(LabelKey, u64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (key, val) in rows {
            write_sample(out, name, &label_str(&key), val);
        }
    }
}

/// Unlabeled gauge.
#[derive(Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "gauge");
        write_sample(out, name, "", self.get());
    }
}

// Upper bounds in microseconds:
// 5ms, 10ms, 25ms, 50ms, 75ms, 100ms, 250ms, 500ms, 750ms, 1s, 2.5s, 5s, 7.5s, 10s
const BUCKETS_MICROS: [u64; 14] = [
    5_000, 10_000, 25_000, 50_000, 75_000, 100_000, 250_000, 500_000, 750_000, 1_000_000,
    2_500_000, 5_000_000, 7_500_000, 10_000_000,
];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; 14],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_micros.fetch_add(micros, Ordering::Relaxed);

        // Cumulative: every bucket whose bound is >= value
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum of observations.
    pub fn sum(&self, labels: &[(&str, &str)]) -> Duration {
        self.map
            .get(&label_key(labels))
            .map(|h| Duration::from_micros(h.sum_micros.load(Ordering::Relaxed)))
            .unwrap_or_default()
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "histogram");
        let mut keys: Vec<LabelKey> = self.map.iter().map(|r| r.key().clone()).collect();
        keys.sort();

        for key in keys {
            let Some(hist) = self.map.get(&key) else { continue };
            let labels = label_str(&key);
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(
                    out,
                    "{}_bucket{{{}le=\"{}\"}} {}",
                    name,
                    prefix,
                    micros_as_secs(le),
                    count
                );
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = micros_as_secs(hist.sum_micros.load(Ordering::Relaxed));
            write_sample(out, &format!("{}_sum", name), &labels, sum);
            write_sample(out, &format!("{}_count", name), &labels, count);
        }
    }
}

/// Registry for everything the prober records.
///
/// Constructed once at startup and shared by `Arc` between the prober task
/// and the `/metrics` handler. All updates are independent atomics, so a
/// scrape can land between two updates of the same iteration.
#[derive(Default)]
pub struct ProbeMetrics {
    probes: CounterVec,
    latency: HistogramVec,
    in_flight: Gauge,
    failures: CounterVec,
}

impl ProbeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a dispatch and take the in-flight slot.
    pub fn record_dispatch(&self, bucket: CodeBucket) {
        let code = bucket.to_string();
        self.probes.inc(&[("code", code.as_str())]);
        self.in_flight.inc();
    }

    pub fn record_success(&self, bucket: CodeBucket, elapsed: Duration) {
        let code = bucket.to_string();
        self.latency.observe(&[("code", code.as_str())], elapsed);
    }

    pub fn record_failure(&self, bucket: CodeBucket, kind: FailureKind) {
        let code = bucket.to_string();
        self.failures
            .inc(&[("code", code.as_str()), ("error", kind.as_str())]);
    }

    /// Release the in-flight slot. Prefer [`ProbeMetrics::dispatch`], which
    /// pairs this with `record_dispatch` automatically.
    pub fn record_completion(&self) {
        self.in_flight.dec();
    }

    /// `record_dispatch` + a guard that calls `record_completion` on drop.
    pub fn dispatch(&self, bucket: CodeBucket) -> InFlightGuard<'_> {
        self.record_dispatch(bucket);
        InFlightGuard { metrics: self }
    }

    pub fn probes_total(&self, bucket: CodeBucket) -> u64 {
        self.probes.get(&[("code", bucket.to_string().as_str())])
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.get()
    }

    pub fn latency_count(&self, bucket: CodeBucket) -> u64 {
        self.latency.count(&[("code", bucket.to_string().as_str())])
    }

    pub fn latency_sum(&self, bucket: CodeBucket) -> Duration {
        self.latency.sum(&[("code", bucket.to_string().as_str())])
    }

    pub fn failures(&self, bucket: CodeBucket, kind: FailureKind) -> u64 {
        self.failures
            .get(&[("code", bucket.to_string().as_str()), ("error", kind.as_str())])
    }

    /// Render all series in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.probes.render("probes_total", "Total probes", &mut out);
        self.latency
            .render("probe_latency_seconds", "Probe latency", &mut out);
        self.in_flight
            .render("probes_in_flight", "Probes in flight", &mut out);
        self.failures
            .render("probe_failures_total", "Probe failures", &mut out);
        out
    }
}

/// Holds one in-flight slot; releases it when dropped.
///
/// Dropping happens on every exit path of a probe: normal return, early
/// return, future cancellation and panic unwinding.
#[must_use = "dropping the guard immediately releases the in-flight slot"]
pub struct InFlightGuard<'a> {
    metrics: &'a ProbeMetrics,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record_completion();
    }
}
