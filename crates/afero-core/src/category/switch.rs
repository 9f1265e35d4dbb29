use std::collections::BTreeMap;

use serde::Serialize;

use super::{AnyResource, Category, CategoryKind, ChangedFields, Resource, diff_feature, values_only};
use crate::model::{DeviceInformation, DeviceSnapshot, OnFeature, Sensors, StateEntry};

/// Switches, outlets, landscape transformers and glass doors.
///
/// Multi-zone devices expose one `toggle` per zone next to the main
/// `power`; every output is keyed by its function instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Switch {
    pub id: String,
    pub device_information: DeviceInformation,
    #[serde(serialize_with = "values_only")]
    pub on: BTreeMap<Option<String>, OnFeature>,
    pub sensors: Sensors,
}

impl Switch {
    pub fn output(&self, instance: Option<&str>) -> Option<&OnFeature> {
        self.on.get(&instance.map(str::to_owned))
    }

    pub(crate) fn summary(&self) -> String {
        self.on
            .values()
            .map(|f| {
                let state = if f.on { "on" } else { "off" };
                match &f.func_instance {
                    Some(instance) => format!("{instance}={state}"),
                    None => state.to_owned(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Resource for Switch {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> &DeviceInformation {
        &self.device_information
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwitchUpdate {
    /// Output to set; its `func_instance` selects the zone.
    pub on: Option<OnFeature>,
}

pub struct SwitchCategory;

const OUTPUT_CLASSES: &[&str] = &["power", "toggle"];

impl Category for SwitchCategory {
    type Resource = Switch;
    type Update = SwitchUpdate;

    const KIND: CategoryKind = CategoryKind::Switch;
    const DEVICE_CLASSES: &'static [&'static str] =
        &["switch", "power-outlet", "landscape-transformer", "glass-door"];
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[("on", "power")];

    fn build(snapshot: &DeviceSnapshot) -> Switch {
        let mut switch = Switch {
            id: snapshot.id.clone(),
            device_information: DeviceInformation::from_snapshot(snapshot),
            on: BTreeMap::new(),
            sensors: Sensors::default(),
        };
        Self::apply(&mut switch, snapshot);
        switch
    }

    fn apply(switch: &mut Switch, snapshot: &DeviceSnapshot) -> ChangedFields {
        let mut changed = ChangedFields::new();
        for state in &snapshot.states {
            if OUTPUT_CLASSES.contains(&state.function_class.as_str()) {
                let feature = OnFeature::from_state(state);
                let previous = switch.on.insert(state.function_instance.clone(), feature.clone());
                if previous.as_ref() != Some(&feature) {
                    changed.insert("on".to_owned());
                }
            } else if let Some(field) = switch.sensors.apply(&switch.id, state) {
                changed.insert(field);
            }
        }
        changed
    }

    fn to_states(switch: &Switch, update: &SwitchUpdate) -> Vec<StateEntry> {
        let mut out = Vec::new();
        if let Some(desired) = &update.on {
            let current = switch.on.get(&desired.func_instance);
            diff_feature(&mut out, Self::function_class("on"), None, current, Some(desired));
        }
        out
    }

    fn merge(switch: &mut Switch, update: SwitchUpdate) {
        if let Some(feature) = update.on {
            switch.on.insert(feature.func_instance.clone(), feature);
        }
    }

    fn wrap(switch: Switch) -> AnyResource {
        AnyResource::Switch(switch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::category::fixtures::{snapshot, state};
    use pretty_assertions::assert_eq;

    fn transformer() -> DeviceSnapshot {
        snapshot(
            "transformer-1",
            "landscape-transformer",
            vec![
                state("power", None, "off"),
                state("toggle", Some("zone-1"), "off"),
                state("toggle", Some("zone-2"), "on"),
                state("watts", None, 0),
            ],
        )
    }

    #[test]
    fn zones_are_keyed_by_instance() {
        let switch = SwitchCategory::build(&transformer());
        assert_eq!(switch.on.len(), 3);
        assert!(!switch.output(None).unwrap().on);
        let zone2 = switch.output(Some("zone-2")).unwrap();
        assert!(zone2.on);
        assert_eq!(zone2.func_class, "toggle");
    }

    #[test]
    fn zone_update_targets_its_own_key() {
        let switch = SwitchCategory::build(&transformer());
        let update = SwitchUpdate {
            on: Some(OnFeature {
                on: true,
                func_class: "toggle".into(),
                func_instance: Some("zone-1".into()),
            }),
        };
        let states = SwitchCategory::to_states(&switch, &update);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].function_class, "toggle");
        assert_eq!(states[0].instance(), Some("zone-1"));
        assert_eq!(states[0].as_str(), Some("on"));

        let mut merged = switch.clone();
        SwitchCategory::merge(&mut merged, update);
        let mut replayed = switch;
        let changed = SwitchCategory::apply(&mut replayed, &snapshot("transformer-1", "landscape-transformer", states));
        assert!(changed.contains("on"));
        assert_eq!(replayed, merged);
    }

    #[test]
    fn matching_uses_type_and_class() {
        assert!(SwitchCategory::matches(&transformer()));
        let mut room = transformer();
        room.type_id = "metadevice.room".into();
        assert!(!SwitchCategory::matches(&room));
        assert!(!SwitchCategory::matches(&snapshot("l", "light", Vec::new())));
    }

    #[test]
    fn serializes_outputs_as_list() {
        let json = serde_json::to_value(SwitchCategory::build(&transformer())).unwrap();
        assert_eq!(json["on"].as_array().unwrap().len(), 3);
    }
}
