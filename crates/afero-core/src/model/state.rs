// ── State vector ──
//
// The protocol-neutral representation of one device: an ordered list of
// (function class, function instance, value) triples plus descriptive
// metadata. Everything else in the crate is derived from these types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type discriminator carried by physical devices.
pub const DEVICE_TYPE_ID: &str = "metadevice.device";

/// One wire-level attribute value.
///
/// `function_instance == None` is the default (or only) instance of the
/// class. A newer entry with the same key supersedes an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub function_class: String,
    pub function_instance: Option<String>,
    pub value: Value,
    /// Epoch milliseconds.
    pub last_update_time: i64,
}

impl StateEntry {
    pub fn new(function_class: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            function_class: function_class.into(),
            function_instance: None,
            value: value.into(),
            last_update_time: 0,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.function_instance = Some(instance.into());
        self
    }

    pub fn with_optional_instance(mut self, instance: Option<String>) -> Self {
        self.function_instance = instance;
        self
    }

    pub fn at(mut self, last_update_time: i64) -> Self {
        self.last_update_time = last_update_time;
        self
    }

    /// `true` if this entry targets the same (class, instance) pair.
    pub fn same_key(&self, other: &Self) -> bool {
        self.function_class == other.function_class
            && self.function_instance == other.function_instance
    }

    pub fn instance(&self) -> Option<&str> {
        self.function_instance.as_deref()
    }

    /// String payload, if the value is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// A capability advertised by the device, with the values it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub function_class: String,
    pub function_instance: Option<String>,
    pub values: Vec<String>,
}

/// Full wire-level truth for one device at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub parent_id: Option<String>,
    pub type_id: String,
    pub model: String,
    pub device_class: String,
    pub default_name: String,
    pub default_image: String,
    pub friendly_name: String,
    pub functions: Vec<FunctionDef>,
    pub states: Vec<StateEntry>,
}

impl DeviceSnapshot {
    /// Latest entry for the given key. Later entries win over earlier ones.
    pub fn state(&self, function_class: &str, instance: Option<&str>) -> Option<&StateEntry> {
        self.states
            .iter()
            .rev()
            .find(|s| s.function_class == function_class && s.instance() == instance)
    }

    /// Every entry of a class, whatever its instance.
    pub fn states_of<'a>(&'a self, function_class: &'a str) -> impl Iterator<Item = &'a StateEntry> {
        self.states
            .iter()
            .filter(move |s| s.function_class == function_class)
    }

    /// Accepted values of a function, in the order the device lists them.
    pub fn function_values(&self, function_class: &str, instance: Option<&str>) -> &[String] {
        self.functions
            .iter()
            .find(|f| f.function_class == function_class && f.function_instance.as_deref() == instance)
            .map_or(&[], |f| f.values.as_slice())
    }

    /// Instances a function class is exposed under.
    pub fn function_instances(&self, function_class: &str) -> Vec<Option<String>> {
        self.functions
            .iter()
            .filter(|f| f.function_class == function_class)
            .map(|f| f.function_instance.clone())
            .collect()
    }
}

/// Collapse duplicate keys so the last entry for each (class, instance)
/// wins, keeping the position of its first occurrence.
pub fn dedupe_states(states: Vec<StateEntry>) -> Vec<StateEntry> {
    let mut out: Vec<StateEntry> = Vec::with_capacity(states.len());
    for state in states {
        if let Some(existing) = out.iter_mut().find(|s| s.same_key(&state)) {
            *existing = state;
        } else {
            out.push(state);
        }
    }
    out
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(states: Vec<StateEntry>) -> DeviceSnapshot {
        DeviceSnapshot {
            id: "d1".into(),
            parent_id: None,
            type_id: DEVICE_TYPE_ID.into(),
            model: String::new(),
            device_class: "switch".into(),
            default_name: String::new(),
            default_image: String::new(),
            friendly_name: String::new(),
            functions: Vec::new(),
            states,
        }
    }

    #[test]
    fn later_entry_wins_lookup() {
        let snap = snapshot(vec![
            StateEntry::new("power", "off").at(1),
            StateEntry::new("power", "on").at(2),
        ]);
        assert_eq!(snap.state("power", None).map(|s| &s.value), Some(&json!("on")));
    }

    #[test]
    fn instances_are_distinct_keys() {
        let snap = snapshot(vec![
            StateEntry::new("toggle", "on").with_instance("zone-1"),
            StateEntry::new("toggle", "off").with_instance("zone-2"),
        ]);
        assert_eq!(snap.state("toggle", Some("zone-2")).and_then(StateEntry::as_str), Some("off"));
        assert!(snap.state("toggle", None).is_none());
        assert_eq!(snap.states_of("toggle").count(), 2);
    }

    #[test]
    fn dedupe_keeps_last_value_in_first_position() {
        let out = dedupe_states(vec![
            StateEntry::new("power", "on"),
            StateEntry::new("brightness", 10),
            StateEntry::new("power", "off"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].value, json!("off"));
        assert_eq!(out[1].function_class, "brightness");
    }
}
