//! Reachability probe - HTTPS first, plain HTTP when TLS or connect fails

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::{FetchError, HttpFetcher};
use crate::error::Result;
use crate::types::ProbeOutcome;

const MAX_REDIRECTS: usize = 10;

/// [`HttpFetcher`] backed by a shared reqwest client with certificate validation on
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str, idle_per_host: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch_status(&self, url: &str) -> std::result::Result<u16, FetchError> {
        // Only the status line matters; the body is dropped unread.
        self.client
            .get(url)
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Https,
    Http,
}

impl Scheme {
    fn url(&self, domain: &str) -> String {
        match self {
            Scheme::Https => format!("https://{}", domain),
            Scheme::Http => format!("http://{}", domain),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Scheme::Https => "HTTPS",
            Scheme::Http => "HTTP",
        }
    }

    fn reachable(&self, status: u16) -> ProbeOutcome {
        match self {
            Scheme::Https => ProbeOutcome::ReachableHttps { status },
            Scheme::Http => ProbeOutcome::ReachableHttp { status },
        }
    }
}

enum Attempt {
    Status(u16),
    Timeout,
    ConnectFailed(String),
    Failed(String),
    Cancelled,
}

/// Second probe stage: does the resolved candidate serve HTTP(S)?
#[derive(Clone)]
pub struct ReachabilityProbe {
    fetcher: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl ReachabilityProbe {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Probe `domain` over HTTPS, falling back to HTTP exactly once when the
    /// HTTPS attempt fails at the TLS or TCP level. A status in `[200, 400)`
    /// counts as reachable.
    pub async fn probe(&self, domain: &str, cancel: &CancellationToken) -> ProbeOutcome {
        match self.attempt(Scheme::Https, domain, cancel).await {
            Attempt::Status(status) => judge(Scheme::Https, status),
            Attempt::Timeout => ProbeOutcome::Unreachable {
                reason: "HTTPS timeout".to_string(),
            },
            Attempt::Failed(reason) => ProbeOutcome::TransientError {
                reason: format!("HTTPS error: {}", reason),
            },
            Attempt::Cancelled => ProbeOutcome::Cancelled,
            Attempt::ConnectFailed(reason) => {
                tracing::debug!(domain = %domain, reason = %reason, "HTTPS connect failed, trying HTTP");
                self.fallback(domain, cancel).await
            }
        }
    }

    async fn fallback(&self, domain: &str, cancel: &CancellationToken) -> ProbeOutcome {
        match self.attempt(Scheme::Http, domain, cancel).await {
            Attempt::Status(status) => judge(Scheme::Http, status),
            Attempt::Timeout => ProbeOutcome::Unreachable {
                reason: "HTTP timeout".to_string(),
            },
            // Neither scheme accepted a connection
            Attempt::ConnectFailed(reason) => ProbeOutcome::Unreachable {
                reason: format!("connection failed: {}", reason),
            },
            Attempt::Failed(reason) => ProbeOutcome::TransientError {
                reason: format!("HTTP error: {}", reason),
            },
            Attempt::Cancelled => ProbeOutcome::Cancelled,
        }
    }

    async fn attempt(&self, scheme: Scheme, domain: &str, cancel: &CancellationToken) -> Attempt {
        if cancel.is_cancelled() {
            return Attempt::Cancelled;
        }

        let url = scheme.url(domain);
        let request = tokio::time::timeout(self.timeout, self.fetcher.fetch_status(&url));
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Attempt::Cancelled,
            result = request => result,
        };

        match result {
            Ok(Ok(status)) => Attempt::Status(status),
            Ok(Err(FetchError::Timeout)) | Err(_) => Attempt::Timeout,
            Ok(Err(FetchError::Connect(reason))) => Attempt::ConnectFailed(reason),
            Ok(Err(FetchError::Other(reason))) => Attempt::Failed(reason),
        }
    }
}

fn judge(scheme: Scheme, status: u16) -> ProbeOutcome {
    if (200..400).contains(&status) {
        scheme.reachable(status)
    } else {
        ProbeOutcome::Unreachable {
            reason: format!("{} status {}", scheme.label(), status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Answers per scheme and records every URL requested
    struct ScriptedFetcher {
        https: std::result::Result<u16, FetchError>,
        http: std::result::Result<u16, FetchError>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(
            https: std::result::Result<u16, FetchError>,
            http: std::result::Result<u16, FetchError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                https,
                http,
                requested: Mutex::new(Vec::new()),
            })
        }

        fn http_attempts(&self) -> usize {
            self.requested
                .lock()
                .iter()
                .filter(|u| u.starts_with("http://"))
                .count()
        }
    }

    #[async_trait]
    impl HttpFetcher for ScriptedFetcher {
        async fn fetch_status(&self, url: &str) -> std::result::Result<u16, FetchError> {
            self.requested.lock().push(url.to_string());
            if url.starts_with("https://") {
                self.https.clone()
            } else {
                self.http.clone()
            }
        }
    }

    fn probe_with(fetcher: Arc<ScriptedFetcher>) -> ReachabilityProbe {
        ReachabilityProbe::new(fetcher, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_https_success_skips_fallback() {
        let fetcher = ScriptedFetcher::new(Ok(200), Ok(200));
        let outcome = probe_with(fetcher.clone())
            .probe("abc.com", &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::ReachableHttps { status: 200 });
        assert_eq!(fetcher.http_attempts(), 0);
        assert_eq!(*fetcher.requested.lock(), vec!["https://abc.com".to_string()]);
    }

    #[tokio::test]
    async fn test_tls_failure_falls_back_once() {
        let fetcher = ScriptedFetcher::new(
            Err(FetchError::Connect("invalid peer certificate".to_string())),
            Ok(301),
        );
        let outcome = probe_with(fetcher.clone())
            .probe("abc.com", &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::ReachableHttp { status: 301 });
        assert_eq!(fetcher.http_attempts(), 1);
    }

    #[tokio::test]
    async fn test_both_schemes_refused() {
        let fetcher = ScriptedFetcher::new(
            Err(FetchError::Connect("refused".to_string())),
            Err(FetchError::Connect("refused".to_string())),
        );
        let outcome = probe_with(fetcher.clone())
            .probe("abc.com", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, ProbeOutcome::Unreachable { .. }));
        assert_eq!(fetcher.http_attempts(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_unreachable_without_fallback() {
        let fetcher = ScriptedFetcher::new(Ok(503), Ok(200));
        let outcome = probe_with(fetcher.clone())
            .probe("abc.com", &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Unreachable {
                reason: "HTTPS status 503".to_string()
            }
        );
        assert_eq!(fetcher.http_attempts(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable_without_fallback() {
        let fetcher = ScriptedFetcher::new(Err(FetchError::Timeout), Ok(200));
        let outcome = probe_with(fetcher.clone())
            .probe("abc.com", &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Unreachable {
                reason: "HTTPS timeout".to_string()
            }
        );
        assert_eq!(fetcher.http_attempts(), 0);
    }

    #[tokio::test]
    async fn test_other_transport_error_is_transient() {
        let fetcher = ScriptedFetcher::new(Err(FetchError::Other("too many redirects".to_string())), Ok(200));
        let outcome = probe_with(fetcher.clone())
            .probe("abc.com", &CancellationToken::new())
            .await;

        assert!(outcome.is_transient());
        assert_eq!(fetcher.http_attempts(), 0);
    }

    #[tokio::test]
    async fn test_status_range_edges() {
        assert!(judge(Scheme::Https, 200).is_reachable());
        assert!(judge(Scheme::Https, 399).is_reachable());
        assert!(!judge(Scheme::Https, 400).is_reachable());
        assert!(!judge(Scheme::Http, 199).is_reachable());
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let fetcher = ScriptedFetcher::new(Ok(200), Ok(200));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = probe_with(fetcher.clone()).probe("abc.com", &token).await;
        assert_eq!(outcome, ProbeOutcome::Cancelled);
        assert!(fetcher.requested.lock().is_empty());
    }

    #[test]
    fn test_reqwest_fetcher_builds() {
        assert!(ReqwestFetcher::new(Duration::from_secs(5), "domain-sweep-test", 8).is_ok());
    }
}
