use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::{
    AnyResource, Category, CategoryKind, ChangedFields, FanCategory, LightCategory, LockCategory,
    Resource, SwitchCategory, ValveCategory,
};
use crate::model::sensor::{BINARY_SENSORS, MAPPED_SENSORS};
use crate::model::{DeviceInformation, DeviceSnapshot, Sensors, StateEntry};

/// Classes that have a dedicated category and are never tracked here.
const CLAIMED: &[&[&str]] = &[
    LightCategory::DEVICE_CLASSES,
    LockCategory::DEVICE_CLASSES,
    SwitchCategory::DEVICE_CLASSES,
    FanCategory::DEVICE_CLASSES,
    ValveCategory::DEVICE_CLASSES,
];

fn is_claimed(device_class: &str) -> bool {
    CLAIMED.iter().any(|classes| classes.contains(&device_class))
}

/// A device no other category owns: hubs, thermostats, sensors.
///
/// Read-only in the typed API. Known sensor classes are decoded into
/// [`Sensors`]; every other entry is kept as its raw value, keyed by
/// `class` or `class/instance`. Raw state writes still work through the
/// bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub device_information: DeviceInformation,
    pub sensors: Sensors,
    pub values: BTreeMap<String, Value>,
}

impl Device {
    pub(crate) fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .sensors
            .sensors
            .values()
            .map(|s| format!("{}={}", s.id, display(&s.value)))
            .collect();
        parts.extend(
            self.sensors
                .binary_sensors
                .values()
                .filter(|s| s.value())
                .map(|s| format!("{}!", s.id)),
        );
        if !self.values.is_empty() {
            parts.push(format!("{} states", self.values.len()));
        }
        parts.join(" ")
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_key(state: &StateEntry) -> String {
    match state.instance() {
        Some(instance) => format!("{}/{instance}", state.function_class),
        None => state.function_class.clone(),
    }
}

impl Resource for Device {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> &DeviceInformation {
        &self.device_information
    }
}

/// Generic devices have no typed fields to update.
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate;

pub struct DeviceCategory;

impl Category for DeviceCategory {
    type Resource = Device;
    type Update = DeviceUpdate;

    const KIND: CategoryKind = CategoryKind::Device;
    const DEVICE_CLASSES: &'static [&'static str] = &[];
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[];

    fn build(snapshot: &DeviceSnapshot) -> Device {
        let mut device = Device {
            id: snapshot.id.clone(),
            device_information: DeviceInformation::from_snapshot(snapshot),
            sensors: Sensors::default(),
            values: BTreeMap::new(),
        };
        Self::apply(&mut device, snapshot);
        device
    }

    fn apply(device: &mut Device, snapshot: &DeviceSnapshot) -> ChangedFields {
        let mut changed = ChangedFields::new();
        for state in &snapshot.states {
            let class = state.function_class.as_str();
            if MAPPED_SENSORS.contains(&class) || BINARY_SENSORS.contains(&class) {
                if let Some(field) = device.sensors.apply(&device.id, state) {
                    changed.insert(field);
                }
                continue;
            }
            let key = value_key(state);
            if device.values.get(&key) != Some(&state.value) {
                device.values.insert(key.clone(), state.value.clone());
                changed.insert(format!("state-{key}"));
            }
        }
        changed
    }

    fn to_states(_: &Device, _: &DeviceUpdate) -> Vec<StateEntry> {
        Vec::new()
    }

    fn merge(_: &mut Device, _: DeviceUpdate) {}

    fn wrap(device: Device) -> AnyResource {
        AnyResource::Device(device)
    }

    fn matches(snapshot: &DeviceSnapshot) -> bool {
        snapshot.type_id == Self::TYPE_ID && !is_claimed(&snapshot.device_class)
    }

    /// Unclaimed classes are open-ended, so this controller listens to
    /// every device event and lets [`matches`](Self::matches) decide.
    fn stream_filter() -> Option<BTreeSet<String>> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::category::fixtures::{snapshot, state};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn claims_only_unowned_classes() {
        assert!(DeviceCategory::matches(&snapshot("t1", "thermostat", Vec::new())));
        assert!(DeviceCategory::matches(&snapshot("h1", "hub", Vec::new())));
        assert!(!DeviceCategory::matches(&snapshot("l1", "light", Vec::new())));
        assert!(!DeviceCategory::matches(&snapshot("v1", "water-timer", Vec::new())));

        let mut other_type = snapshot("x1", "thermostat", Vec::new());
        other_type.type_id = "metadevice.room".into();
        assert!(!DeviceCategory::matches(&other_type));
    }

    #[test]
    fn sensors_and_raw_values_are_tracked() {
        let device = DeviceCategory::build(&snapshot(
            "t1",
            "thermostat",
            vec![
                state("battery-level", None, 80),
                state("error", None, "alerting"),
                state("temperature", Some("current-temp"), 21.5),
            ],
        ));
        assert_eq!(device.sensors.sensors["battery-level"].value, json!(80));
        assert!(device.sensors.binary_sensors["error"].value());
        assert_eq!(device.values["temperature/current-temp"], json!(21.5));
        assert_eq!(device.summary(), "battery-level=80 error! 1 states");
    }

    #[test]
    fn apply_reports_only_moved_values() {
        let mut device = DeviceCategory::build(&snapshot(
            "t1",
            "thermostat",
            vec![state("mode", None, "heat"), state("watts", None, 5)],
        ));
        let changed = DeviceCategory::apply(
            &mut device,
            &snapshot("t1", "thermostat", vec![state("mode", None, "cool"), state("watts", None, 5)]),
        );
        assert_eq!(changed, ChangedFields::from(["state-mode".to_owned()]));
        assert_eq!(device.values["mode"], json!("cool"));
    }
}
