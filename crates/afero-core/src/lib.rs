//! Client-side synchronization layer for Afero-connected devices.
//!
//! Every device is a generic state vector of `(function class, function
//! instance, value)` entries. This crate turns that vector into typed
//! per-category resources and keeps them in sync:
//!
//! - **[`EventStream`]** polls the whole fleet, diffs each poll against a
//!   baseline cache, and feeds Added / Updated / Deleted events (plus
//!   locally injected jobs) through one FIFO queue to its subscribers.
//!
//! - **[`ResourceController<C>`]** is generic over a [`Category`] plugin
//!   (light, lock, switch, fan, valve, and a catch-all for every other
//!   device class). It reconciles stream events into
//!   typed resources, notifies subscribers once per observable change, and
//!   performs optimistic writes that roll back when the cloud rejects them.
//!
//! - **[`Bridge`]** is the composition root: it owns the stream, one
//!   controller per category and the [`DeviceRegistry`], and routes raw
//!   service requests to the controller that owns the device.
//!
//! - **[`Transport`]** is the seam to the cloud. [`CloudTransport`] wraps
//!   `afero_api::AferoClient`; tests plug in an in-memory fake.

pub mod bridge;
pub mod category;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod event;
pub mod model;
pub mod registry;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, BridgeCallback};
pub use category::{
    AnyResource, Category, CategoryKind, ChangedFields, Device, DeviceCategory, DeviceUpdate, Fan,
    FanCategory, FanUpdate, Light, LightCategory, LightUpdate, Lock, LockCategory, LockUpdate,
    Resource, Switch, SwitchCategory, SwitchUpdate, Valve, ValveCategory, ValveUpdate,
};
pub use config::{BridgeConfig, DEFAULT_POLLING_INTERVAL};
pub use controller::{
    DeviceController, FanController, LightController, LockController, ResourceController,
    SwitchController, UpdateOutcome, ValveController,
};
pub use error::CoreError;
pub use event::{Event, EventType, LocalWrite};
pub use registry::DeviceRegistry;
pub use store::{ResourceWatch, Snapshot};
pub use stream::{EventStream, StreamCallback, StreamStatus};
pub use subscription::Unsubscribe;
pub use transport::{CloudTransport, Transport};

pub use model::{DeviceInformation, DeviceSnapshot, FunctionDef, StateEntry};

// Transport-level types consumers need to build a `BridgeConfig`.
pub use afero_api::{AferoClientKind, Endpoints, RetryPolicy};
