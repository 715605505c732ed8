//! Probe loop.
//!
//! One iteration: pick a bucket, count the dispatch, GET
//! `<base_url>/status/<bucket>`, record latency or failure, release the
//! in-flight slot, sleep. Failures are absorbed into metrics and never end
//! the loop; only the cancellation token does.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use rand::seq::SliceRandom;
use reqwest::Url;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use codeprobe_core::error::{CodeProbeError, Result};
use codeprobe_core::{CodeBucket, FailureKind};

use crate::config::ProbeSection;
use crate::obs::ProbeMetrics;
use crate::transport::ProbeTransport;

/// Result of a single iteration. Consumed by logging, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub bucket: CodeBucket,
    pub elapsed: Duration,
    /// Status returned by the target; `None` on failure.
    pub status: Option<u16>,
    pub error: Option<FailureKind>,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Prober {
    metrics: Arc<ProbeMetrics>,
    transport: Arc<dyn ProbeTransport>,
    base_url: Url,
    buckets: Vec<CodeBucket>,
    interval: Duration,
    timeout: Duration,
}

impl Prober {
    pub fn new(
        cfg: &ProbeSection,
        metrics: Arc<ProbeMetrics>,
        transport: Arc<dyn ProbeTransport>,
    ) -> Result<Self> {
        if cfg.codes.is_empty() {
            return Err(CodeProbeError::InvalidConfig("probe.codes must not be empty".into()));
        }
        Ok(Self {
            metrics,
            transport,
            base_url: cfg.url()?,
            buckets: cfg.codes.clone(),
            interval: cfg.interval(),
            timeout: cfg.timeout(),
        })
    }

    pub fn url_for(&self, bucket: CodeBucket) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}/status/{}", url.path().trim_end_matches('/'), bucket);
        url.set_path(&path);
        url
    }

    fn pick_bucket(&self) -> CodeBucket {
        // `new` guarantees a non-empty set.
        self.buckets
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(CodeBucket::OK)
    }

    /// Run one iteration without the trailing sleep.
    ///
    /// A panic below this point is counted as an `other` failure for the
    /// chosen bucket instead of unwinding into the loop.
    pub async fn probe_once(&self) -> ProbeOutcome {
        let bucket = self.pick_bucket();
        let start = Instant::now();

        match AssertUnwindSafe(self.probe_bucket(bucket)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                // In-flight slot was already released during unwinding.
                self.metrics.record_failure(bucket, FailureKind::Other);
                tracing::warn!(code = %bucket, "probe panicked, counted as failure");
                ProbeOutcome {
                    bucket,
                    elapsed: start.elapsed(),
                    status: None,
                    error: Some(FailureKind::Other),
                }
            }
        }
    }

    async fn probe_bucket(&self, bucket: CodeBucket) -> ProbeOutcome {
        let url = self.url_for(bucket);

        let _in_flight = self.metrics.dispatch(bucket);
        let start = Instant::now();

        match self.transport.get(&url, self.timeout).await {
            Ok(status) => {
                let elapsed = start.elapsed();
                self.metrics.record_success(bucket, elapsed);
                tracing::debug!(code = %bucket, status, elapsed_ms = millis(elapsed), "probe ok");
                ProbeOutcome {
                    bucket,
                    elapsed,
                    status: Some(status),
                    error: None,
                }
            }
            Err(kind) => {
                self.metrics.record_failure(bucket, kind);
                tracing::debug!(code = %bucket, error = %kind, "probe failed");
                ProbeOutcome {
                    bucket,
                    elapsed: start.elapsed(),
                    status: None,
                    error: Some(kind),
                }
            }
        }
    }

    /// Probe forever, sleeping `interval` after every iteration.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            target_url = %self.base_url,
            interval_ms = millis(self.interval),
            timeout_ms = millis(self.timeout),
            "prober started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.probe_once() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("prober stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Sleeps `delay` then answers with `result`.
    struct ScriptedTransport {
        delay: Duration,
        result: std::result::Result<u16, FailureKind>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(delay: Duration, result: std::result::Result<u16, FailureKind>) -> Arc<Self> {
            Arc::new(Self {
                delay,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProbeTransport for ScriptedTransport {
        async fn get(&self, _url: &Url, _timeout: Duration) -> std::result::Result<u16, FailureKind> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result
        }
    }

    /// Blocks until released, so the test can scrape mid-request.
    struct GatedTransport {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ProbeTransport for GatedTransport {
        async fn get(&self, _url: &Url, _timeout: Duration) -> std::result::Result<u16, FailureKind> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(200)
        }
    }

    struct PanickingTransport;

    /// Panics on the first call, answers 200 afterwards.
    struct PanicOnceTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProbeTransport for PanicOnceTransport {
        async fn get(&self, _url: &Url, _timeout: Duration) -> std::result::Result<u16, FailureKind> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("unexpected transport state");
            }
            Ok(200)
        }
    }

    #[async_trait]
    impl ProbeTransport for PanickingTransport {
        async fn get(&self, _url: &Url, _timeout: Duration) -> std::result::Result<u16, FailureKind> {
            panic!("unexpected transport state");
        }
    }

    fn section(codes: &[u16]) -> ProbeSection {
        ProbeSection {
            codes: codes.iter().map(|c| CodeBucket::new(*c).unwrap()).collect(),
            ..ProbeSection::default()
        }
    }

    fn bucket(code: u16) -> CodeBucket {
        CodeBucket::new(code).unwrap()
    }

    #[test]
    fn builds_status_url() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = ScriptedTransport::new(Duration::ZERO, Ok(200));
        let mut cfg = section(&[200]);
        cfg.base_url = "http://localhost:9000/echo/".into();
        let prober = Prober::new(&cfg, metrics, transport).unwrap();
        assert_eq!(
            prober.url_for(bucket(404)).as_str(),
            "http://localhost:9000/echo/status/404"
        );

        let prober = Prober::new(
            &section(&[200]),
            Arc::new(ProbeMetrics::new()),
            ScriptedTransport::new(Duration::ZERO, Ok(200)),
        )
        .unwrap();
        assert_eq!(prober.url_for(bucket(200)).as_str(), "https://httpbin.org/status/200");
    }

    #[test]
    fn rejects_empty_bucket_set() {
        let cfg = ProbeSection {
            codes: vec![],
            ..ProbeSection::default()
        };
        let transport = ScriptedTransport::new(Duration::ZERO, Ok(200));
        assert!(Prober::new(&cfg, Arc::new(ProbeMetrics::new()), transport).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn success_records_latency() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = ScriptedTransport::new(Duration::from_millis(120), Ok(200));
        let prober = Prober::new(&section(&[200]), metrics.clone(), transport).unwrap();

        let outcome = prober.probe_once().await;

        assert!(outcome.is_success());
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.elapsed, Duration::from_millis(120));
        assert_eq!(metrics.probes_total(bucket(200)), 1);
        assert_eq!(metrics.latency_count(bucket(200)), 1);
        assert_eq!(metrics.latency_sum(bucket(200)), Duration::from_millis(120));
        assert_eq!(metrics.failures(bucket(200), FailureKind::Timeout), 0);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_records_failure_only() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = ScriptedTransport::new(Duration::from_secs(10), Err(FailureKind::Timeout));
        let prober = Prober::new(&section(&[500]), metrics.clone(), transport).unwrap();

        let outcome = prober.probe_once().await;

        assert_eq!(outcome.error, Some(FailureKind::Timeout));
        assert_eq!(metrics.probes_total(bucket(500)), 1);
        assert_eq!(metrics.failures(bucket(500), FailureKind::Timeout), 1);
        assert_eq!(metrics.latency_count(bucket(500)), 0);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn iterations_keep_buckets_apart() {
        let metrics = Arc::new(ProbeMetrics::new());

        let ok = Prober::new(
            &section(&[200]),
            metrics.clone(),
            ScriptedTransport::new(Duration::from_millis(5), Ok(200)),
        )
        .unwrap();
        let failing = Prober::new(
            &section(&[400]),
            metrics.clone(),
            ScriptedTransport::new(Duration::ZERO, Err(FailureKind::Connect)),
        )
        .unwrap();

        ok.probe_once().await;
        failing.probe_once().await;

        assert_eq!(metrics.probes_total(bucket(200)), 1);
        assert_eq!(metrics.probes_total(bucket(400)), 1);
        assert_eq!(metrics.latency_count(bucket(200)), 1);
        assert_eq!(metrics.latency_count(bucket(400)), 0);
        assert_eq!(metrics.failures(bucket(400), FailureKind::Connect), 1);
        assert_eq!(metrics.failures(bucket(200), FailureKind::Connect), 0);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[tokio::test]
    async fn scrape_mid_request_sees_dispatch() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = Arc::new(GatedTransport {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let prober = Prober::new(&section(&[300]), metrics.clone(), transport.clone()).unwrap();

        let task = tokio::spawn(async move { prober.probe_once().await });
        transport.entered.notified().await;

        assert_eq!(metrics.in_flight(), 1);
        assert_eq!(metrics.probes_total(bucket(300)), 1);
        let body = metrics.render();
        assert!(body.contains("probes_in_flight 1\n"));
        assert!(body.contains("probes_total{code=\"300\"} 1\n"));

        transport.release.notify_one();
        let outcome = task.await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(metrics.in_flight(), 0);
    }

    #[tokio::test]
    async fn panic_in_transport_counts_as_other_failure() {
        let metrics = Arc::new(ProbeMetrics::new());
        let prober = Prober::new(&section(&[500]), metrics.clone(), Arc::new(PanickingTransport)).unwrap();

        let outcome = prober.probe_once().await;

        assert_eq!(outcome.error, Some(FailureKind::Other));
        assert_eq!(metrics.probes_total(bucket(500)), 1);
        assert_eq!(metrics.failures(bucket(500), FailureKind::Other), 1);
        assert_eq!(metrics.latency_count(bucket(500)), 0);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_panicking_iteration() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = Arc::new(PanicOnceTransport {
            calls: AtomicUsize::new(0),
        });
        let prober = Prober::new(&section(&[200]), metrics.clone(), transport.clone()).unwrap();
        let cancel = CancellationToken::new();
        let handle = prober.spawn(cancel.clone());

        // t=0 panics, then t=3, t=6, t=9 succeed.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!handle.is_finished());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
        assert_eq!(metrics.probes_total(bucket(200)), 4);
        assert_eq!(metrics.failures(bucket(200), FailureKind::Other), 1);
        assert_eq!(metrics.latency_count(bucket(200)), 3);
        assert_eq!(metrics.in_flight(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn picks_every_default_bucket() {
        let cfg = ProbeSection::default();
        let prober = Prober::new(
            &cfg,
            Arc::new(ProbeMetrics::new()),
            ScriptedTransport::new(Duration::ZERO, Ok(200)),
        )
        .unwrap();

        let seen: HashSet<CodeBucket> = (0..400).map(|_| prober.pick_bucket()).collect();
        let expected: HashSet<CodeBucket> = CodeBucket::defaults().into_iter().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_sleeps_fixed_interval_and_stops_on_cancel() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = ScriptedTransport::new(Duration::ZERO, Err(FailureKind::Connect));
        let prober = Prober::new(&section(&[200]), metrics.clone(), transport.clone()).unwrap();
        let cancel = CancellationToken::new();
        let handle = prober.spawn(cancel.clone());

        // t=0 first probe, then one every 3s regardless of failures.
        tokio::time::sleep(Duration::from_millis(6_500)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.probes_total(bucket(200)), 3);
        assert_eq!(metrics.failures(bucket(200), FailureKind::Connect), 3);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(metrics.in_flight(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_request_releases_in_flight() {
        let metrics = Arc::new(ProbeMetrics::new());
        let transport = ScriptedTransport::new(Duration::from_secs(60), Ok(200));
        let prober = Prober::new(&section(&[200]), metrics.clone(), transport).unwrap();
        let cancel = CancellationToken::new();
        let handle = prober.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(metrics.in_flight(), 1);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(metrics.in_flight(), 0);
        assert_eq!(metrics.latency_count(bucket(200)), 0);
    }
}
