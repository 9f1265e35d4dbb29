use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Which Afero-hosted brand the account lives on.
///
/// Each brand is a separate deployment of the same API with its own
/// hostnames. Unknown brands can be reached through [`Endpoints::custom`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AferoClientKind {
    /// Hubspace (Home Depot) devices.
    #[default]
    Hubspace,
    /// Myko devices.
    Myko,
}

impl AferoClientKind {
    /// Host serving account lookups.
    pub fn api_host(self) -> &'static str {
        match self {
            Self::Hubspace => "api2.afero.net",
            Self::Myko => "api2.sxz2xlhh.afero.net",
        }
    }

    /// Host serving metadevice state.
    pub fn data_host(self) -> &'static str {
        match self {
            Self::Hubspace => "semantics2.afero.net",
            Self::Myko => "semantics2.sxz2xlhh.afero.net",
        }
    }

    /// User agent the vendor mobile apps present.
    pub fn user_agent(self) -> &'static str {
        "Dart/2.15 (dart:io)"
    }
}

/// Resolved base URLs for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base: Url,
    data_base: Url,
    user_agent: String,
}

impl Endpoints {
    /// Endpoints of a known brand.
    pub fn for_client(kind: AferoClientKind) -> Result<Self, Error> {
        Ok(Self {
            api_base: Url::parse(&format!("https://{}", kind.api_host()))?,
            data_base: Url::parse(&format!("https://{}", kind.data_host()))?,
            user_agent: kind.user_agent().to_owned(),
        })
    }

    /// Arbitrary base URLs (proxies, test servers).
    pub fn custom(api_base: Url, data_base: Url) -> Self {
        Self {
            api_base,
            data_base,
            user_agent: AferoClientKind::default().user_agent().to_owned(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// `GET` target returning the account the token belongs to.
    pub fn account_url(&self) -> Result<Url, Error> {
        join(&self.api_base, "v1/users/me")
    }

    /// `GET` target listing every metadevice of an account.
    pub fn metadevices_url(&self, account_id: &str) -> Result<Url, Error> {
        join(
            &self.data_base,
            &format!("v1/accounts/{account_id}/metadevices"),
        )
    }

    /// `PUT` target for one metadevice's state.
    pub fn device_state_url(&self, account_id: &str, device_id: &str) -> Result<Url, Error> {
        join(
            &self.data_base,
            &format!("v1/accounts/{account_id}/metadevices/{device_id}/state"),
        )
    }
}

fn join(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}
