// afero-api: Async Rust client for the Afero IoT cloud metadevice API

pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

pub use client::AferoClient;
pub use endpoints::{AferoClientKind, Endpoints};
pub use error::Error;
pub use models::{RawFunction, RawMetadevice, RawState};
pub use transport::{RetryPolicy, TransportConfig};
