// ── Category plugins ──
//
// A category (light, lock, switch, fan, valve, plus the catch-all
// device category) is a zero-sized type
// implementing `Category`: how to build its resource from a snapshot, how
// to absorb a partial snapshot, and how to diff a partial domain update
// into wire fragments. `ResourceController<C>` is generic over it.

pub mod device;
pub mod fan;
pub mod light;
pub mod lock;
pub mod switch;
pub mod valve;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::{DEVICE_TYPE_ID, DeviceInformation, DeviceSnapshot, Feature, StateEntry};

pub use device::{Device, DeviceCategory, DeviceUpdate};
pub use fan::{Fan, FanCategory, FanUpdate};
pub use light::{Light, LightCategory, LightUpdate};
pub use lock::{Lock, LockCategory, LockUpdate};
pub use switch::{Switch, SwitchCategory, SwitchUpdate};
pub use valve::{Valve, ValveCategory, ValveUpdate};

/// Device kinds with a dedicated controller.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CategoryKind {
    Light,
    Lock,
    Switch,
    Fan,
    Valve,
    /// Every device class no other category claims.
    Device,
}

/// Changed field names reported by [`Category::apply`].
pub type ChangedFields = BTreeSet<String>;

/// A typed per-category resource.
pub trait Resource: Clone + PartialEq + fmt::Debug + Serialize + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn info(&self) -> &DeviceInformation;
}

/// Category behaviour injected into the generic controller.
pub trait Category: Send + Sync + 'static {
    type Resource: Resource;
    /// Partial domain object: `None` fields are left untouched.
    type Update: Default + fmt::Debug + Send + 'static;

    const KIND: CategoryKind;
    /// Type discriminator a snapshot must carry.
    const TYPE_ID: &'static str = DEVICE_TYPE_ID;
    /// Device classes this category owns.
    const DEVICE_CLASSES: &'static [&'static str];
    /// Resource field name to wire function class.
    const FIELD_MAP: &'static [(&'static str, &'static str)];

    /// Construct a resource from a full snapshot.
    fn build(snapshot: &DeviceSnapshot) -> Self::Resource;

    /// Absorb a (possibly partial) snapshot, returning what changed.
    fn apply(resource: &mut Self::Resource, snapshot: &DeviceSnapshot) -> ChangedFields;

    /// Wire fragments for every field of `update` that differs from
    /// `resource`. Empty when nothing would change.
    fn to_states(resource: &Self::Resource, update: &Self::Update) -> Vec<StateEntry>;

    /// Write the set fields of `update` into `resource`.
    fn merge(resource: &mut Self::Resource, update: Self::Update);

    fn wrap(resource: Self::Resource) -> AnyResource;

    fn matches(snapshot: &DeviceSnapshot) -> bool {
        snapshot.type_id == Self::TYPE_ID
            && Self::DEVICE_CLASSES.contains(&snapshot.device_class.as_str())
    }

    /// Device classes the controller subscribes to on the stream; `None`
    /// receives every device event.
    fn stream_filter() -> Option<BTreeSet<String>> {
        Some(Self::DEVICE_CLASSES.iter().map(|c| (*c).to_owned()).collect())
    }

    fn function_class(field: &str) -> &str {
        Self::FIELD_MAP
            .iter()
            .find(|(name, _)| *name == field)
            .map_or(field, |(_, class)| *class)
    }
}

/// Any resource, as delivered by the bridge-wide subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum AnyResource {
    Light(Light),
    Lock(Lock),
    Switch(Switch),
    Fan(Fan),
    Valve(Valve),
    Device(Device),
}

impl AnyResource {
    pub fn kind(&self) -> CategoryKind {
        match self {
            Self::Light(_) => CategoryKind::Light,
            Self::Lock(_) => CategoryKind::Lock,
            Self::Switch(_) => CategoryKind::Switch,
            Self::Fan(_) => CategoryKind::Fan,
            Self::Valve(_) => CategoryKind::Valve,
            Self::Device(_) => CategoryKind::Device,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Light(r) => r.id(),
            Self::Lock(r) => r.id(),
            Self::Switch(r) => r.id(),
            Self::Fan(r) => r.id(),
            Self::Valve(r) => r.id(),
            Self::Device(r) => r.id(),
        }
    }

    pub fn info(&self) -> &DeviceInformation {
        match self {
            Self::Light(r) => r.info(),
            Self::Lock(r) => r.info(),
            Self::Switch(r) => r.info(),
            Self::Fan(r) => r.info(),
            Self::Valve(r) => r.info(),
            Self::Device(r) => r.info(),
        }
    }

    /// One-line human summary of the controllable state.
    pub fn summary(&self) -> String {
        match self {
            Self::Light(r) => r.summary(),
            Self::Lock(r) => r.summary(),
            Self::Switch(r) => r.summary(),
            Self::Fan(r) => r.summary(),
            Self::Valve(r) => r.summary(),
            Self::Device(r) => r.summary(),
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Append the wire form of `desired` when it differs from `current`.
pub(crate) fn diff_feature<F: Feature>(
    out: &mut Vec<StateEntry>,
    function_class: &str,
    instance: Option<&str>,
    current: Option<&F>,
    desired: Option<&F>,
) {
    if let Some(desired) = desired {
        if current != Some(desired) {
            out.extend(desired.to_states(function_class, instance));
        }
    }
}

/// Replace `slot` with `value` and record `field` if it changed.
pub(crate) fn set_field<T: PartialEq>(
    changed: &mut ChangedFields,
    field: &str,
    slot: &mut Option<T>,
    value: T,
) {
    if slot.as_ref() != Some(&value) {
        *slot = Some(value);
        changed.insert(field.to_owned());
    }
}

/// Instance each function class was last seen under.
pub(crate) fn record_instance(
    instances: &mut BTreeMap<String, Option<String>>,
    state: &StateEntry,
) {
    instances.insert(state.function_class.clone(), state.function_instance.clone());
}

/// Serialize an instance-keyed map as the list of its values; the
/// values carry their own instance.
pub(crate) fn values_only<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_seq(map.values())
}
