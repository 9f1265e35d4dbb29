// ── Read-only sensor values ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::StateEntry;

/// Function classes reported as plain sensors.
pub const MAPPED_SENSORS: &[&str] = &["battery-level", "output-voltage-switch", "watts", "wifi-rssi"];

/// Function classes reported as binary sensors.
pub const BINARY_SENSORS: &[&str] = &["error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AferoSensor {
    pub id: String,
    pub owner: String,
    pub value: Value,
    pub instance: Option<String>,
}

/// Binary sensor; `alerting` on the wire means `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AferoBinarySensor {
    pub id: String,
    pub owner: String,
    pub raw: String,
    pub instance: Option<String>,
}

impl AferoBinarySensor {
    pub fn value(&self) -> bool {
        self.raw == "alerting"
    }
}

/// Sensors attached to one resource, keyed by function class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensors {
    pub sensors: BTreeMap<String, AferoSensor>,
    pub binary_sensors: BTreeMap<String, AferoBinarySensor>,
}

impl Sensors {
    pub fn from_states<'a>(
        owner: &str,
        states: impl IntoIterator<Item = &'a StateEntry>,
    ) -> Self {
        let mut sensors = Self::default();
        for state in states {
            sensors.apply(owner, state);
        }
        sensors
    }

    /// Absorb one entry. Returns the field name if a sensor value moved.
    pub fn apply(&mut self, owner: &str, state: &StateEntry) -> Option<String> {
        let class = state.function_class.as_str();
        if MAPPED_SENSORS.contains(&class) {
            let sensor = AferoSensor {
                id: class.to_owned(),
                owner: owner.to_owned(),
                value: state.value.clone(),
                instance: state.function_instance.clone(),
            };
            let previous = self.sensors.insert(class.to_owned(), sensor.clone());
            return (previous.as_ref() != Some(&sensor)).then(|| format!("sensor-{class}"));
        }
        if BINARY_SENSORS.contains(&class) {
            let sensor = AferoBinarySensor {
                id: class.to_owned(),
                owner: owner.to_owned(),
                raw: state.as_str().unwrap_or_default().to_owned(),
                instance: state.function_instance.clone(),
            };
            let previous = self.binary_sensors.insert(class.to_owned(), sensor.clone());
            return (previous.as_ref() != Some(&sensor)).then(|| format!("binary-{class}"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_sensor_is_true_when_alerting() {
        let mut sensors = Sensors::default();
        let changed = sensors.apply("d1", &StateEntry::new("error", "alerting"));
        assert_eq!(changed.as_deref(), Some("binary-error"));
        assert!(sensors.binary_sensors["error"].value());
    }

    #[test]
    fn unchanged_sensor_reports_nothing() {
        let mut sensors = Sensors::from_states("d1", [&StateEntry::new("watts", json!(12))]);
        assert!(sensors.apply("d1", &StateEntry::new("watts", json!(12))).is_none());
        assert_eq!(
            sensors.apply("d1", &StateEntry::new("watts", json!(13))).as_deref(),
            Some("sensor-watts")
        );
    }

    #[test]
    fn unrelated_classes_are_ignored() {
        let mut sensors = Sensors::default();
        assert!(sensors.apply("d1", &StateEntry::new("power", "on")).is_none());
        assert!(sensors.sensors.is_empty());
    }
}
