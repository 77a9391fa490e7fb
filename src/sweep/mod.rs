//! Sweep module - randomly sample short domains and keep the live ones
//!
//! A scan pulls batches of random candidates, resolves each one, probes the
//! resolved ones over HTTPS (falling back to HTTP) and appends every
//! reachable host to the output file.

mod control;
mod generator;
mod observer;
mod scanner;
mod state;

pub use control::ScanHandle;
pub use generator::CandidateGenerator;
pub use observer::{ChannelObserver, NullObserver, ScanEvent, ScanObserver, TracingObserver};
pub use scanner::Scanner;
pub use state::{BatchReport, ScanSnapshot, ScanState};

/// Characters a candidate name is drawn from (a-z, 0-9)
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Number of distinct fully-qualified names for the given bounds.
///
/// Saturates instead of overflowing for absurd bounds.
pub fn total_space(min_length: usize, max_length: usize, suffix_count: usize) -> u64 {
    let base = ALPHABET.len() as u64;
    (min_length..=max_length)
        .map(|len| base.saturating_pow(len as u32))
        .fold(0u64, |acc, n| acc.saturating_add(n))
        .saturating_mul(suffix_count as u64)
}
