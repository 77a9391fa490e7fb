//! Core types and structures for domain-sweep

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SweepError;

/// Browser-like user agent sent with every probe request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Reference host probed once before scanning
pub const DEFAULT_CANARY_HOST: &str = "google.com";

/// A randomly generated domain name that is not yet known to be live
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    name: String,
    suffix: String,
}

impl Candidate {
    /// Create a candidate from a bare name and a dotted suffix (e.g. `.com`)
    pub fn new(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Fully-qualified domain: name followed by its suffix
    pub fn fqdn(&self) -> String {
        format!("{}{}", self.name, self.suffix)
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.suffix)
    }
}

/// Result of running a candidate through one probe stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Resolver gave a definitive "no such name / no address" answer
    NameNotFound,
    /// At least one address record came back
    NameResolved,
    /// Host did not answer usefully (timeout or non-success status)
    Unreachable { reason: String },
    ReachableHttps { status: u16 },
    ReachableHttp { status: u16 },
    /// Resolver hiccup or unexpected transport failure; never retried
    TransientError { reason: String },
    Cancelled,
}

impl ProbeOutcome {
    /// Whether the candidate answered over HTTPS or HTTP
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::ReachableHttps { .. } | Self::ReachableHttp { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError { .. })
    }

    /// Human-readable log line for this outcome
    pub fn describe(&self, domain: &str) -> String {
        match self {
            Self::NameNotFound => format!("DNS name does not exist: {}", domain),
            Self::NameResolved => format!("DNS resolved: {}", domain),
            Self::Unreachable { reason } => format!("Unreachable: {} ({})", domain, reason),
            Self::ReachableHttps { status } => {
                format!("HTTPS reachable: {} (status: {})", domain, status)
            }
            Self::ReachableHttp { status } => {
                format!("HTTP reachable: {} (status: {})", domain, status)
            }
            Self::TransientError { reason } => format!("Error for {}: {}", domain, reason),
            Self::Cancelled => format!("Cancelled: {}", domain),
        }
    }
}

/// Scan coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Validating,
    Warmup,
    Scanning,
    Draining,
    Finished,
    Aborted,
}

impl ScanPhase {
    /// Finished and Aborted accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::Idle => write!(f, "idle"),
            ScanPhase::Validating => write!(f, "validating"),
            ScanPhase::Warmup => write!(f, "warmup"),
            ScanPhase::Scanning => write!(f, "scanning"),
            ScanPhase::Draining => write!(f, "draining"),
            ScanPhase::Finished => write!(f, "finished"),
            ScanPhase::Aborted => write!(f, "aborted"),
        }
    }
}

/// Configuration snapshot for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Dotted suffixes a candidate may end with
    pub suffixes: Vec<String>,
    /// Number of batches allowed in flight at once
    pub max_concurrency: usize,
    pub batch_size: usize,
    /// Per-request timeout for DNS and HTTP calls (ms)
    pub request_timeout_ms: u64,
    /// Pause inserted every `delay_every` candidates of a batch (ms)
    pub delay_ms: u64,
    pub delay_every: usize,
    pub output: PathBuf,
    /// Upstream DNS servers; empty means system configuration
    pub nameservers: Vec<IpAddr>,
    pub canary_host: String,
    /// How long `stop` waits for in-flight batches before abandoning them (ms)
    pub stop_grace_ms: u64,
    pub user_agent: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 4,
            suffixes: vec![".com".to_string(), ".org".to_string(), ".net".to_string()],
            max_concurrency: 500,
            batch_size: 100,
            request_timeout_ms: 10_000,
            delay_ms: 0,
            delay_every: 100,
            output: PathBuf::from("sites.txt"),
            nameservers: vec![
                IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
                IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
                IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)),
                IpAddr::V4(Ipv4Addr::new(1, 0, 0, 1)),
            ],
            canary_host: DEFAULT_CANARY_HOST.to_string(),
            stop_grace_ms: 10_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RunConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Throttle as `(every K candidates, pause)`, if enabled
    pub fn throttle(&self) -> Option<(usize, Duration)> {
        if self.delay_ms == 0 || self.delay_every == 0 {
            None
        } else {
            Some((self.delay_every, Duration::from_millis(self.delay_ms)))
        }
    }
}

/// Stats summary emitted after every batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub checked: u64,
    pub total: u64,
    pub found: u64,
}

impl ScanStats {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.checked as f64 / self.total as f64) * 100.0
        }
    }
}

impl std::fmt::Display for ScanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Checked: {}/{} | Found: {}",
            self.checked, self.total, self.found
        )
    }
}

/// Final summary of a scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub phase: ScanPhase,
    pub checked: u64,
    pub found: u64,
    pub resolved: u64,
    pub errors: u64,
    pub persist_failures: u64,
    pub total_space: u64,
    pub batches_dispatched: u64,
    /// In-flight batches left running when the stop grace period ran out
    pub abandoned_batches: usize,
    /// Batch tasks that panicked; their candidates are not counted
    pub lost_batches: u64,
    pub peak_in_flight: usize,
    pub stopped: bool,
    /// Fatal error that ended the run, if any
    pub error: Option<String>,
    #[serde(skip)]
    pub fatal: Option<SweepError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn stats(&self) -> ScanStats {
        ScanStats {
            checked: self.checked,
            total: self.total_space,
            found: self.found,
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_fqdn() {
        let candidate = Candidate::new("ab1", ".com");
        assert_eq!(candidate.fqdn(), "ab1.com");
        assert_eq!(candidate.to_string(), "ab1.com");
    }

    #[test]
    fn test_outcome_reachability() {
        assert!(ProbeOutcome::ReachableHttps { status: 200 }.is_reachable());
        assert!(ProbeOutcome::ReachableHttp { status: 301 }.is_reachable());
        assert!(!ProbeOutcome::NameResolved.is_reachable());
        assert!(!ProbeOutcome::Unreachable {
            reason: "timeout".to_string()
        }
        .is_reachable());
    }

    #[test]
    fn test_phase_terminal() {
        assert!(ScanPhase::Finished.is_terminal());
        assert!(ScanPhase::Aborted.is_terminal());
        assert!(!ScanPhase::Draining.is_terminal());
    }

    #[test]
    fn test_stats_display() {
        let stats = ScanStats {
            checked: 10,
            total: 100,
            found: 2,
        };
        assert_eq!(stats.to_string(), "Checked: 10/100 | Found: 2");
        assert_eq!(stats.percent(), 10.0);
    }

    #[test]
    fn test_throttle_disabled_by_default() {
        assert!(RunConfig::default().throttle().is_none());
    }
}
