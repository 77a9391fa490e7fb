//! Scan observers - how progress, log lines and discoveries leave the core

use tokio::sync::mpsc;

use crate::types::{ScanPhase, ScanStats};

/// Receives scan events. Every method defaults to a no-op.
///
/// Methods are called from the coordinator and from batch tasks, so
/// implementations must be cheap and must not block.
pub trait ScanObserver: Send + Sync {
    /// `(checked, total)` after each completed batch
    fn on_progress(&self, _checked: u64, _total: u64) {}

    /// Free-text diagnostic line, one per probe outcome
    fn on_log(&self, _line: &str) {}

    /// Stats summary after each completed batch
    fn on_stats(&self, _stats: &ScanStats) {}

    /// A domain was confirmed reachable and persisted
    fn on_found(&self, _domain: &str) {}

    /// Coordinator state transition
    fn on_phase(&self, _phase: ScanPhase) {}

    /// The run reached Finished or Aborted
    fn on_finished(&self) {}
}

/// Observer that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ScanObserver for NullObserver {}

/// Observer that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn on_log(&self, line: &str) {
        tracing::debug!("{}", line);
    }

    fn on_stats(&self, stats: &ScanStats) {
        tracing::info!(
            checked = stats.checked,
            total = stats.total,
            found = stats.found,
            "Batch completed"
        );
    }

    fn on_found(&self, domain: &str) {
        tracing::info!(domain = %domain, "Live host found");
    }

    fn on_phase(&self, phase: ScanPhase) {
        tracing::info!(phase = %phase, "Scan phase changed");
    }
}

/// Owned form of every observer callback
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress { checked: u64, total: u64 },
    Log(String),
    Stats(ScanStats),
    Found(String),
    Phase(ScanPhase),
    Finished,
}

/// Observer that turns callbacks into [`ScanEvent`]s on an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its event stream
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ScanEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl ScanObserver for ChannelObserver {
    fn on_progress(&self, checked: u64, total: u64) {
        self.send(ScanEvent::Progress { checked, total });
    }

    fn on_log(&self, line: &str) {
        self.send(ScanEvent::Log(line.to_string()));
    }

    fn on_stats(&self, stats: &ScanStats) {
        self.send(ScanEvent::Stats(*stats));
    }

    fn on_found(&self, domain: &str) {
        self.send(ScanEvent::Found(domain.to_string()));
    }

    fn on_phase(&self, phase: ScanPhase) {
        self.send(ScanEvent::Phase(phase));
    }

    fn on_finished(&self) {
        self.send(ScanEvent::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_found("abc.com");
        observer.on_progress(10, 100);
        observer.on_finished();

        assert_eq!(rx.try_recv().unwrap(), ScanEvent::Found("abc.com".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            ScanEvent::Progress {
                checked: 10,
                total: 100
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ScanEvent::Finished);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_default_observers_accept_every_callback() {
        let observers: Vec<Box<dyn ScanObserver>> =
            vec![Box::new(NullObserver), Box::new(TracingObserver)];
        let stats = ScanStats {
            checked: 1,
            total: 2,
            found: 1,
        };
        for observer in &observers {
            observer.on_phase(ScanPhase::Scanning);
            observer.on_progress(1, 2);
            observer.on_log("DNS resolved: a.com");
            observer.on_stats(&stats);
            observer.on_found("a.com");
            observer.on_finished();
        }
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        observer.on_log("still fine");
    }
}
