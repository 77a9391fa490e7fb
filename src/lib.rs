//! Domain Sweep - random live web host discovery
//!
//! Samples short random domain names, resolves them, probes the resolved ones
//! over HTTPS with an HTTP fallback and appends every reachable host to a
//! text file.

pub mod config;
pub mod error;
pub mod probe;
pub mod sink;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SweepError};
pub use types::{Candidate, ProbeOutcome, RunConfig, ScanPhase, ScanReport, ScanStats};

// Re-export main functionality
pub use sink::ResultSink;
pub use sweep::{ChannelObserver, ScanEvent, ScanHandle, ScanObserver, Scanner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() -> Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();
    Ok(())
}
