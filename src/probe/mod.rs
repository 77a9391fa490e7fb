//! Probe stages: name resolution then reachability
//!
//! The network backends sit behind small traits so each stage can map its
//! transport-specific failures into [`ProbeOutcome`](crate::types::ProbeOutcome)
//! at one boundary, and so tests can substitute simulated backends.

pub mod dns;
pub mod http;

pub use dns::{HickoryResolver, ResolutionProbe};
pub use http::{ReachabilityProbe, ReqwestFetcher};

use std::net::IpAddr;

use async_trait::async_trait;

/// Why an address lookup produced no address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Definitive answer: the name does not exist or has no address record
    NotFound,
    Timeout,
    /// Server failure, unreachable resolver, malformed answer...
    Failed(String),
}

/// Address-record lookups
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, LookupError>;
}

/// Why an HTTP(S) request produced no response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Timeout,
    /// TCP connect or TLS handshake (including certificate) failure
    Connect(String),
    Other(String),
}

/// Single GET request that reports the final status after redirects
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch_status(&self, url: &str) -> Result<u16, FetchError>;
}
