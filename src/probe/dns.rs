//! Resolution probe - the cheap first filter in front of HTTP

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{LookupIpStrategy, NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use tokio_util::sync::CancellationToken;

use super::{LookupError, NameResolver};
use crate::error::{Result, SweepError};
use crate::types::ProbeOutcome;

/// [`NameResolver`] backed by hickory's tokio resolver, IPv4 only
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Build a resolver against `nameservers`, or the system configuration when empty
    pub fn new(nameservers: &[IpAddr], timeout: Duration) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;

        let resolver = if nameservers.is_empty() {
            let (config, _) = hickory_resolver::system_conf::read_system_conf().map_err(|e| {
                SweepError::resolver(format!("cannot read system DNS configuration: {}", e))
            })?;
            TokioAsyncResolver::tokio(config, opts)
        } else {
            let group = NameServerConfigGroup::from_ips_clear(nameservers, 53, true);
            TokioAsyncResolver::tokio(ResolverConfig::from_parts(None, vec![], group), opts)
        };

        Ok(Self { resolver })
    }
}

#[async_trait]
impl NameResolver for HickoryResolver {
    async fn lookup(&self, name: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
        self.resolver
            .lookup_ip(name)
            .await
            .map(|lookup| lookup.iter().collect())
            .map_err(|e| classify(name, e))
    }
}

/// Only NXDOMAIN and NODATA are definitive. hickory also reports SERVFAIL,
/// REFUSED and friends as `NoRecordsFound`, and those are server failures.
fn classify(name: &str, err: ResolveError) -> LookupError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match response_code {
            ResponseCode::NXDomain | ResponseCode::NoError => {
                tracing::trace!(name = %name, response_code = ?response_code, "No address records");
                LookupError::NotFound
            }
            code => LookupError::Failed(code.to_string()),
        },
        ResolveErrorKind::Timeout => LookupError::Timeout,
        _ => LookupError::Failed(err.to_string()),
    }
}

/// First probe stage: does the candidate have an address at all?
#[derive(Clone)]
pub struct ResolutionProbe {
    resolver: Arc<dyn NameResolver>,
    timeout: Duration,
}

impl ResolutionProbe {
    pub fn new(resolver: Arc<dyn NameResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Resolve `name` once. Failures other than a definitive "not found" are
    /// transient and are never retried here.
    pub async fn resolve(&self, name: &str, cancel: &CancellationToken) -> ProbeOutcome {
        if cancel.is_cancelled() {
            return ProbeOutcome::Cancelled;
        }

        let lookup = tokio::time::timeout(self.timeout, self.resolver.lookup(name));
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ProbeOutcome::Cancelled,
            result = lookup => result,
        };

        match result {
            Ok(Ok(addrs)) if !addrs.is_empty() => ProbeOutcome::NameResolved,
            Ok(Ok(_)) | Ok(Err(LookupError::NotFound)) => ProbeOutcome::NameNotFound,
            Ok(Err(LookupError::Timeout)) | Err(_) => ProbeOutcome::TransientError {
                reason: "DNS timeout".to_string(),
            },
            Ok(Err(LookupError::Failed(message))) => ProbeOutcome::TransientError {
                reason: format!("DNS error: {}", message),
            },
        }
    }
}
