// Afero cloud HTTP client
//
// Wraps `reqwest::Client` with bearer-token auth, the throttling retry
// loop, and account discovery. Callers only ever see domain payloads or a
// typed `Error`; status-code handling stays inside this module.

use arc_swap::ArcSwap;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::endpoints::Endpoints;
use crate::error::Error;
use crate::models::{RawMetadevice, RawState, RawUser, StatePayload};
use crate::transport::{RetryPolicy, TransportConfig};

/// Raw HTTP client for the Afero metadevice API.
///
/// The token can be swapped at runtime ([`set_token`](Self::set_token))
/// without rebuilding the client; the account id is resolved lazily on
/// first use and cached for the life of the client.
pub struct AferoClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    retry: RetryPolicy,
    token: ArcSwap<SecretString>,
    account_id: OnceCell<String>,
}

impl AferoClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// The user agent of `endpoints` wins over the one in `transport`, since
    /// the cloud gates some routes on it.
    pub fn new(
        endpoints: Endpoints,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut config = transport.clone();
        endpoints.user_agent().clone_into(&mut config.user_agent);
        let http = config.build_client()?;
        Ok(Self::with_client(http, endpoints, token, transport.retry))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoints: Endpoints,
        token: SecretString,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            endpoints,
            retry,
            token: ArcSwap::from_pointee(token),
            account_id: OnceCell::new(),
        }
    }

    /// Replace the bearer token used by subsequent requests.
    pub fn set_token(&self, token: SecretString) {
        self.token.store(std::sync::Arc::new(token));
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// The account the token belongs to (`accountAccess[0]`), cached.
    pub async fn account_id(&self) -> Result<&str, Error> {
        let id = self
            .account_id
            .get_or_try_init(|| async {
                let url = self.endpoints.account_url()?;
                let user: RawUser = self.get_json(url).await?;
                user.account_access
                    .into_iter()
                    .next()
                    .map(|access| access.account.account_id)
                    .ok_or(Error::MissingAccount)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Every metadevice of the account, with state expanded.
    pub async fn list_metadevices(&self) -> Result<Vec<RawMetadevice>, Error> {
        let account = self.account_id().await?;
        let mut url = self.endpoints.metadevices_url(account)?;
        url.query_pairs_mut().append_pair("expansions", "state");
        self.get_json(url).await
    }

    /// Write a batch of state entries to one metadevice.
    ///
    /// A 400 answer becomes [`Error::InvalidPayload`] so callers can tell a
    /// rejected value apart from a transport failure.
    pub async fn put_state(&self, device_id: &str, values: &[RawState]) -> Result<(), Error> {
        let account = self.account_id().await?;
        let url = self.endpoints.device_state_url(account, device_id)?;
        let body = StatePayload {
            metadevice_id: device_id,
            values,
        };
        let resp = self.request(Method::PUT, url.clone(), Some(&body)).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = resp.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            return Err(Error::InvalidPayload {
                status: status.as_u16(),
                message,
            });
        }
        Err(Error::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.request::<()>(Method::GET, url.clone(), None).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Send one request, retrying throttled answers with linear back-off.
    ///
    /// Returns the response for any status that is neither throttling nor
    /// an auth failure; callers interpret the rest.
    pub async fn request<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, Error> {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            debug!(%method, %url, attempt, "sending request");
            let token = self.token.load_full();
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(token.expose_secret());
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let resp = builder.send().await?;

            match resp.status() {
                StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                    warn!(status = %resp.status(), %url, attempt, "throttled, retrying");
                }
                StatusCode::UNAUTHORIZED => {
                    return Err(Error::InvalidAuth {
                        message: format!("token rejected by {url}"),
                    });
                }
                StatusCode::FORBIDDEN => {
                    return Err(Error::Forbidden {
                        url: url.to_string(),
                    });
                }
                _ => return Ok(resp),
            }
        }

        Err(Error::RetriesExhausted {
            attempts,
            url: url.to_string(),
        })
    }
}
