// ── Runtime bridge configuration ──
//
// Describes *how* to reach the Afero cloud and how often to poll it.
// Carries the bearer token but never touches disk: the CLI (via
// afero-config) constructs a `BridgeConfig` and hands it in.

use std::time::Duration;

use afero_api::{AferoClientKind, Endpoints, RetryPolicy, TransportConfig};
use secrecy::SecretString;

/// Default interval between two full-fleet polls.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for one bridge (one account on one Afero deployment).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Which deployment the account lives on.
    pub client: AferoClientKind,
    /// Bearer token. Obtaining and refreshing it is the caller's job.
    pub token: SecretString,
    /// Interval between full-fleet polls.
    pub polling_interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry budget for throttled requests.
    pub retry: RetryPolicy,
    /// Base URL override (proxies, test servers). `None` uses the
    /// deployment's public hosts.
    pub endpoints: Option<Endpoints>,
}

impl BridgeConfig {
    pub fn new(client: AferoClientKind, token: SecretString) -> Self {
        Self {
            client,
            token,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            endpoints: None,
        }
    }

    pub(crate) fn resolve_endpoints(&self) -> Result<Endpoints, afero_api::Error> {
        match &self.endpoints {
            Some(ep) => Ok(ep.clone()),
            None => Endpoints::for_client(self.client),
        }
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            retry: self.retry,
            ..TransportConfig::default()
        }
    }
}
