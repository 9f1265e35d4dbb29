// ── Event envelope ──
//
// The single ordered timeline produced by the event stream: device
// additions, updates and deletions observed by polling, echoes of local
// writes, and control-plane signals.

use serde::Serialize;

use crate::model::DeviceSnapshot;

/// Discriminant of an [`Event`], used for subscriber filters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventType {
    ResourceAdded,
    ResourceUpdated,
    ResourceDeleted,
    Reconnected,
    InvalidAuth,
}

/// Identifies the echo of one optimistic write so it can be revoked if
/// the write is rolled back before the echo is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalWrite(pub(crate) u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Added(DeviceSnapshot),
    Updated {
        snapshot: DeviceSnapshot,
        /// Deliver to subscribers even if no field changed.
        force_forward: bool,
        local_write: Option<LocalWrite>,
    },
    /// Carries the last known snapshot so category filters can route it.
    Deleted {
        device_id: String,
        snapshot: DeviceSnapshot,
    },
    Reconnected,
    AuthInvalid,
}

impl Event {
    pub fn updated(snapshot: DeviceSnapshot) -> Self {
        Self::Updated {
            snapshot,
            force_forward: false,
            local_write: None,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::Added(_) => EventType::ResourceAdded,
            Self::Updated { .. } => EventType::ResourceUpdated,
            Self::Deleted { .. } => EventType::ResourceDeleted,
            Self::Reconnected => EventType::Reconnected,
            Self::AuthInvalid => EventType::InvalidAuth,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::Added(snapshot) | Self::Updated { snapshot, .. } => Some(&snapshot.id),
            Self::Deleted { device_id, .. } => Some(device_id),
            Self::Reconnected | Self::AuthInvalid => None,
        }
    }

    pub fn snapshot(&self) -> Option<&DeviceSnapshot> {
        match self {
            Self::Added(snapshot)
            | Self::Updated { snapshot, .. }
            | Self::Deleted { snapshot, .. } => Some(snapshot),
            Self::Reconnected | Self::AuthInvalid => None,
        }
    }

    /// The local write this event echoes, if any.
    pub fn local_write(&self) -> Option<LocalWrite> {
        match self {
            Self::Updated { local_write, .. } => *local_write,
            _ => None,
        }
    }

    /// Category tag used by stream filters: the device class. Control-plane
    /// events have none.
    pub fn category(&self) -> Option<&str> {
        self.snapshot().map(|s| s.device_class.as_str())
    }

    pub fn is_control_plane(&self) -> bool {
        self.device_id().is_none()
    }
}
