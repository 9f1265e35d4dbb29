// ── Domain model ──
//
// Wire-level state vectors, typed feature values, and the device
// metadata every resource carries.

pub mod features;
pub mod sensor;
pub mod state;

use serde::{Deserialize, Serialize};

pub use features::{
    ColorFeature, ColorModeFeature, ColorTemperatureFeature, CurrentPosition,
    CurrentPositionFeature, DimmingFeature, DirectionFeature, EffectFeature, Feature, ModeFeature,
    OnFeature, OpenFeature, PresetFeature, SpeedFeature,
};
pub use sensor::{AferoBinarySensor, AferoSensor, Sensors};
pub use state::{DEVICE_TYPE_ID, DeviceSnapshot, FunctionDef, StateEntry};

/// Descriptive metadata kept on every resource so that a snapshot can be
/// rebuilt for a manual state write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInformation {
    pub name: String,
    pub model: String,
    pub device_class: String,
    pub parent_id: Option<String>,
    pub type_id: String,
    pub default_name: String,
    pub default_image: String,
}

impl DeviceInformation {
    pub fn from_snapshot(snapshot: &DeviceSnapshot) -> Self {
        Self {
            name: snapshot.friendly_name.clone(),
            model: snapshot.model.clone(),
            device_class: snapshot.device_class.clone(),
            parent_id: snapshot.parent_id.clone(),
            type_id: snapshot.type_id.clone(),
            default_name: snapshot.default_name.clone(),
            default_image: snapshot.default_image.clone(),
        }
    }

    /// Synthetic snapshot carrying only `states`, used for local writes.
    pub fn snapshot_with(&self, id: &str, states: Vec<StateEntry>) -> DeviceSnapshot {
        DeviceSnapshot {
            id: id.to_owned(),
            parent_id: self.parent_id.clone(),
            type_id: self.type_id.clone(),
            model: self.model.clone(),
            device_class: self.device_class.clone(),
            default_name: self.default_name.clone(),
            default_image: self.default_image.clone(),
            friendly_name: self.name.clone(),
            functions: Vec::new(),
            states,
        }
    }
}
