//! Scan coordinator - drives batches of candidates through both probes

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::control::ScanHandle;
use super::generator::CandidateGenerator;
use super::observer::ScanObserver;
use super::state::{BatchReport, ScanState, UnitGuard};
use super::total_space;
use crate::error::{Result, SweepError};
use crate::probe::{
    HickoryResolver, HttpFetcher, NameResolver, ReachabilityProbe, ReqwestFetcher,
    ResolutionProbe,
};
use crate::sink::ResultSink;
use crate::types::{Candidate, ProbeOutcome, RunConfig, ScanPhase, ScanReport};

/// Idle connections kept per host by the HTTP client
const IDLE_CONNECTIONS_PER_HOST: usize = 50;

/// Scanner for randomly sampled live hosts
pub struct Scanner {
    config: RunConfig,
    resolver: Arc<dyn NameResolver>,
    fetcher: Arc<dyn HttpFetcher>,
    observer: Arc<dyn ScanObserver>,
    seed: Option<u64>,
}

impl Scanner {
    /// Create a scanner using the real DNS resolver and HTTP client
    pub fn new(config: RunConfig, observer: Arc<dyn ScanObserver>) -> Result<Self> {
        let resolver = HickoryResolver::new(&config.nameservers, config.request_timeout())?;
        let fetcher = ReqwestFetcher::new(
            config.request_timeout(),
            &config.user_agent,
            IDLE_CONNECTIONS_PER_HOST,
        )?;

        Ok(Self::with_backends(
            config,
            Arc::new(resolver),
            Arc::new(fetcher),
            observer,
        ))
    }

    /// Create a scanner over arbitrary resolver and fetcher backends
    pub fn with_backends(
        config: RunConfig,
        resolver: Arc<dyn NameResolver>,
        fetcher: Arc<dyn HttpFetcher>,
        observer: Arc<dyn ScanObserver>,
    ) -> Self {
        Self {
            config,
            resolver,
            fetcher,
            observer,
            seed: None,
        }
    }

    /// Make candidate generation reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Spawn the scan on the current tokio runtime and return its control handle
    pub fn start(self) -> ScanHandle {
        let cancel = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(ScanPhase::Idle);
        let state = Arc::new(ScanState::new(total_space(
            self.config.min_length,
            self.config.max_length,
            self.config.suffixes.len(),
        )));

        let timeout = self.config.request_timeout();
        let unit = Arc::new(BatchUnit {
            resolution: ResolutionProbe::new(self.resolver, timeout),
            reachability: ReachabilityProbe::new(self.fetcher, timeout),
            sink: Arc::new(ResultSink::new(self.config.output.clone())),
            observer: Arc::clone(&self.observer),
            state: Arc::clone(&state),
            throttle: self.config.throttle(),
        });

        let session = Session {
            config: self.config,
            observer: self.observer,
            state: Arc::clone(&state),
            cancel: cancel.clone(),
            phase_tx,
            unit,
            seed: self.seed,
            started_at: Utc::now(),
        };

        let task: JoinHandle<ScanReport> = tokio::spawn(session.run());
        ScanHandle::new(cancel, phase_rx, state, task)
    }
}

/// How the scanning loop ended
#[derive(Debug, Default)]
struct LoopSummary {
    batches_dispatched: u64,
    abandoned_batches: usize,
    lost_batches: u64,
    stopped: bool,
}

/// One running scan, owned by the coordinator task
struct Session {
    config: RunConfig,
    observer: Arc<dyn ScanObserver>,
    state: Arc<ScanState>,
    cancel: CancellationToken,
    phase_tx: watch::Sender<ScanPhase>,
    unit: Arc<BatchUnit>,
    seed: Option<u64>,
    started_at: DateTime<Utc>,
}

impl Session {
    async fn run(self) -> ScanReport {
        self.enter(ScanPhase::Validating);
        if let Err(e) = self.config.validate() {
            self.observer.on_log(&e.to_string());
            return self.finish(ScanPhase::Finished, Some(e), LoopSummary::default());
        }
        if self.cancel.is_cancelled() {
            return self.finish(ScanPhase::Aborted, None, stopped());
        }

        self.enter(ScanPhase::Warmup);
        match self.warmup().await {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                return self.finish(ScanPhase::Aborted, None, stopped());
            }
            Err(e) => {
                tracing::error!(error = %e, "Warmup failed");
                self.observer.on_log(&e.to_string());
                return self.finish(ScanPhase::Finished, Some(e), LoopSummary::default());
            }
        }

        if let Err(e) = self.unit.sink.ensure_exists() {
            tracing::warn!(error = %e, "Output file could not be created");
            self.observer.on_log(&e.to_string());
        }

        self.enter(ScanPhase::Scanning);
        self.observer.on_log(&format!(
            "Length range: {}-{}, suffixes: {}",
            self.config.min_length,
            self.config.max_length,
            self.config.suffixes.join(", ")
        ));
        self.observer.on_log(&format!(
            "Total possible domains: {}",
            self.state.total_space()
        ));

        let summary = self.scan().await;
        let phase = if summary.abandoned_batches > 0 {
            ScanPhase::Aborted
        } else {
            ScanPhase::Finished
        };
        self.finish(phase, None, summary)
    }

    /// Resolve and probe the canary host to tell "no live candidates" apart
    /// from "this machine has no working network path"
    async fn warmup(&self) -> Result<()> {
        let host = self.config.canary_host.as_str();

        match self.unit.resolution.resolve(host, &self.cancel).await {
            ProbeOutcome::NameResolved => {
                self.observer
                    .on_log(&format!("DNS check: {} resolved successfully", host));
            }
            ProbeOutcome::Cancelled => return Err(SweepError::Cancelled),
            other => {
                return Err(SweepError::connectivity(format!(
                    "canary {} did not resolve ({})",
                    host,
                    other.describe(host)
                )));
            }
        }

        match self.unit.reachability.probe(host, &self.cancel).await {
            outcome if outcome.is_reachable() => {
                self.observer
                    .on_log(&format!("HTTP check: {}", outcome.describe(host)));
                Ok(())
            }
            ProbeOutcome::Cancelled => Err(SweepError::Cancelled),
            other => Err(SweepError::connectivity(format!(
                "canary {} is not reachable ({})",
                host,
                other.describe(host)
            ))),
        }
    }

    /// Steady-state loop: one permit per batch, stop on cancel or exhaustion
    async fn scan(&self) -> LoopSummary {
        let mut generator = match self.seed {
            Some(seed) => CandidateGenerator::seeded(
                self.config.min_length,
                self.config.max_length,
                self.config.suffixes.clone(),
                seed,
            ),
            None => CandidateGenerator::new(
                self.config.min_length,
                self.config.max_length,
                self.config.suffixes.clone(),
            ),
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut in_flight: FuturesUnordered<JoinHandle<BatchReport>> = FuturesUnordered::new();
        let total = self.state.total_space();
        let mut dispatched = 0u64;
        let mut summary = LoopSummary::default();

        // Exhaustion is counted on dispatched candidates so the last batch is
        // trimmed and `checked` lands exactly on `total`.
        while dispatched < total {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(joined) = in_flight.next(), if !in_flight.is_empty() => {
                    if !self.absorb(joined) {
                        summary.lost_batches += 1;
                    }
                }
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    if self.cancel.is_cancelled() {
                        break;
                    }

                    let size = (self.config.batch_size as u64).min(total - dispatched) as usize;
                    let batch = generator.generate_batch(size);
                    dispatched += size as u64;
                    summary.batches_dispatched += 1;

                    let unit = Arc::clone(&self.unit);
                    let token = self.cancel.clone();
                    in_flight.push(tokio::spawn(async move {
                        let report = unit.run(batch, &token).await;
                        drop(permit);
                        report
                    }));
                }
            }
        }

        // Everything is dispatched; a stop can still land while the tail runs
        if !self.cancel.is_cancelled() {
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    joined = in_flight.next() => match joined {
                        Some(joined) => {
                            if !self.absorb(joined) {
                                summary.lost_batches += 1;
                            }
                        }
                        None => break,
                    },
                }
            }
        }

        if self.cancel.is_cancelled() {
            summary.stopped = true;
            self.enter(ScanPhase::Draining);
            self.observer
                .on_log("Stop requested, waiting for running batches...");

            let grace = self.config.stop_grace();
            let mut lost = 0u64;
            let drain = async {
                while let Some(joined) = in_flight.next().await {
                    if !self.absorb(joined) {
                        lost += 1;
                    }
                }
            };
            if tokio::time::timeout(grace, drain).await.is_err() {
                summary.abandoned_batches = in_flight.len();
                tracing::warn!(
                    abandoned = summary.abandoned_batches,
                    grace_ms = grace.as_millis() as u64,
                    "Grace period elapsed, abandoning running batches"
                );
                self.observer.on_log(&format!(
                    "Abandoned {} batches after {:?}",
                    summary.abandoned_batches, grace
                ));
            }
            summary.lost_batches += lost;
        }

        // Dropping the remaining handles detaches, never aborts, those tasks
        drop(in_flight);
        summary
    }

    /// Fold one finished batch into the counters and publish progress.
    /// Returns false when the batch task itself failed.
    fn absorb(&self, joined: std::result::Result<BatchReport, JoinError>) -> bool {
        match joined {
            Ok(report) => {
                let stats = self.state.record_batch(&report);
                self.observer.on_progress(stats.checked, stats.total);
                self.observer.on_stats(&stats);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Batch task failed");
                self.observer.on_log(&format!("Batch failed: {}", e));
                false
            }
        }
    }

    fn enter(&self, phase: ScanPhase) {
        self.phase_tx.send_replace(phase);
        self.observer.on_phase(phase);
        tracing::info!(phase = %phase, "Scan phase changed");
    }

    fn finish(&self, phase: ScanPhase, fatal: Option<SweepError>, summary: LoopSummary) -> ScanReport {
        let snapshot = self.state.snapshot();

        match &fatal {
            Some(e) => self.observer.on_log(&e.user_message()),
            None if summary.stopped => self.observer.on_log(&format!(
                "Stopped. Checked: {}, live sites: {}",
                snapshot.checked, snapshot.found
            )),
            None => self.observer.on_log(&format!(
                "Completed! Checked: {}, live sites: {}",
                snapshot.checked, snapshot.found
            )),
        }

        let report = ScanReport {
            phase,
            checked: snapshot.checked,
            found: snapshot.found,
            resolved: snapshot.resolved,
            errors: snapshot.errors,
            persist_failures: snapshot.persist_failures,
            total_space: snapshot.total_space,
            batches_dispatched: summary.batches_dispatched,
            abandoned_batches: summary.abandoned_batches,
            lost_batches: summary.lost_batches,
            peak_in_flight: snapshot.peak_in_flight,
            stopped: summary.stopped,
            error: fatal.as_ref().map(|e| e.to_string()),
            fatal,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            phase = %report.phase,
            checked = report.checked,
            found = report.found,
            batches = report.batches_dispatched,
            "Scan ended"
        );

        self.enter(phase);
        self.observer.on_finished();
        report
    }
}

fn stopped() -> LoopSummary {
    LoopSummary {
        stopped: true,
        ..Default::default()
    }
}

/// Everything a batch task needs, shared across all of them
struct BatchUnit {
    resolution: ResolutionProbe,
    reachability: ReachabilityProbe,
    sink: Arc<ResultSink>,
    observer: Arc<dyn ScanObserver>,
    state: Arc<ScanState>,
    throttle: Option<(usize, Duration)>,
}

impl BatchUnit {
    /// Probe every candidate of the batch in generation order
    async fn run(&self, batch: Vec<Candidate>, cancel: &CancellationToken) -> BatchReport {
        let _unit = UnitGuard::enter(&self.state);
        let mut report = BatchReport::default();
        let len = batch.len() as u64;

        for (i, candidate) in batch.iter().enumerate() {
            if let Some((every, pause)) = self.throttle {
                if i > 0 && i % every == 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }
            if cancel.is_cancelled() {
                report.cancelled += len - i as u64;
                break;
            }

            self.evaluate(candidate, cancel, &mut report).await;
        }

        report
    }

    /// Resolution, then reachability, then persistence for one candidate
    async fn evaluate(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
        report: &mut BatchReport,
    ) -> ProbeOutcome {
        let domain = candidate.fqdn();

        let resolution = self.resolution.resolve(&domain, cancel).await;
        match resolution {
            ProbeOutcome::Cancelled => {
                report.cancelled += 1;
                return resolution;
            }
            ProbeOutcome::NameResolved => {
                self.observer.on_log(&resolution.describe(&domain));
            }
            _ => {
                report.checked += 1;
                if resolution.is_transient() {
                    report.errors += 1;
                    tracing::warn!(domain = %domain, outcome = ?resolution, "Resolution failed");
                } else {
                    tracing::debug!(domain = %domain, "Name does not exist");
                }
                self.observer.on_log(&resolution.describe(&domain));
                return resolution;
            }
        }

        let outcome = self.reachability.probe(&domain, cancel).await;
        if outcome == ProbeOutcome::Cancelled {
            report.cancelled += 1;
            return outcome;
        }
        report.resolved += 1;
        report.checked += 1;
        self.observer.on_log(&outcome.describe(&domain));

        if outcome.is_reachable() {
            match Arc::clone(&self.sink).append_async(domain.clone()).await {
                Ok(()) => {
                    report.found += 1;
                    self.observer.on_found(&domain);
                }
                Err(e) => {
                    report.persist_failures += 1;
                    tracing::warn!(domain = %domain, error = %e, "Discovery could not be saved");
                    self.observer.on_log(&e.to_string());
                }
            }
        } else if outcome.is_transient() {
            report.errors += 1;
            tracing::warn!(domain = %domain, outcome = ?outcome, "Probe failed");
        }

        tracing::debug!(domain = %domain, outcome = ?outcome, "Candidate probed");
        outcome
    }
}
