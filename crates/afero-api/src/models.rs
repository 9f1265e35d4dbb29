// Raw wire types for the Afero metadevice API.
//
// These mirror the JSON exactly; `afero-core` converts them into domain
// snapshots. Unknown fields are ignored and missing ones defaulted, since
// the cloud omits whole blocks for some device kinds.

use serde::{Deserialize, Serialize};

/// One `(functionClass, functionInstance, value)` triple as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawState {
    pub function_class: String,
    #[serde(default)]
    pub function_instance: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub last_update_time: i64,
}

/// A metadevice as returned by `GET /v1/accounts/{id}/metadevices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetadevice {
    pub id: String,
    /// Type discriminator, e.g. `metadevice.device` or `metadevice.room`.
    pub type_id: String,
    /// Parent (physical) device id.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub description: RawDescription,
    #[serde(default)]
    pub state: RawStateBlock,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDescription {
    #[serde(default)]
    pub default_image: Option<String>,
    #[serde(default)]
    pub device: RawDeviceDescription,
    /// Capabilities of the device, with the values each one accepts.
    #[serde(default)]
    pub functions: Vec<RawFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFunction {
    pub function_class: String,
    #[serde(default)]
    pub function_instance: Option<String>,
    #[serde(default)]
    pub values: Vec<RawFunctionValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFunctionValue {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceDescription {
    #[serde(default)]
    pub default_name: Option<String>,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStateBlock {
    #[serde(default)]
    pub metadevice_id: Option<String>,
    #[serde(default)]
    pub values: Vec<RawState>,
}

/// Body of `PUT /v1/accounts/{a}/metadevices/{d}/state`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload<'a> {
    pub metadevice_id: &'a str,
    pub values: &'a [RawState],
}

/// Response of `GET /v1/users/me` (only the fields we read).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawUser {
    #[serde(default)]
    pub account_access: Vec<RawAccountAccess>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAccountAccess {
    pub account: RawAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAccount {
    pub account_id: String,
}
