// ── Transport seam ──
//
// The core never talks HTTP itself. It consumes a `Transport`: one call
// returning the whole fleet, one call writing states to a device. The
// cloud implementation wraps `afero_api::AferoClient`; tests plug in an
// in-memory fake.

use async_trait::async_trait;
use tracing::debug;

use afero_api::AferoClient;

use crate::config::BridgeConfig;
use crate::convert::{snapshot_from_raw, state_to_raw};
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, StateEntry};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Every device of the account, already converted to snapshots.
    async fn fetch_fleet(&self) -> Result<Vec<DeviceSnapshot>, CoreError>;

    /// Write `states` to one device. Retries are the transport's business;
    /// callers make exactly one attempt.
    async fn send_device_write(
        &self,
        device_id: &str,
        states: &[StateEntry],
    ) -> Result<(), CoreError>;
}

/// [`Transport`] backed by the Afero cloud API.
pub struct CloudTransport {
    client: AferoClient,
}

impl CloudTransport {
    pub fn new(config: &BridgeConfig) -> Result<Self, CoreError> {
        let endpoints = config.resolve_endpoints()?;
        let client = AferoClient::new(endpoints, config.token.clone(), &config.transport_config())?;
        Ok(Self { client })
    }

    pub fn from_client(client: AferoClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AferoClient {
        &self.client
    }
}

#[async_trait]
impl Transport for CloudTransport {
    async fn fetch_fleet(&self) -> Result<Vec<DeviceSnapshot>, CoreError> {
        let raw = self.client.list_metadevices().await?;
        debug!(count = raw.len(), "fetched metadevices");
        Ok(raw.iter().map(snapshot_from_raw).collect())
    }

    async fn send_device_write(
        &self,
        device_id: &str,
        states: &[StateEntry],
    ) -> Result<(), CoreError> {
        let values: Vec<_> = states.iter().map(state_to_raw).collect();
        self.client.put_state(device_id, &values).await?;
        Ok(())
    }
}
