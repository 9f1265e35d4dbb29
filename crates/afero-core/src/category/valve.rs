use std::collections::BTreeMap;

use serde::Serialize;

use super::{AnyResource, Category, CategoryKind, ChangedFields, Resource, diff_feature, values_only};
use crate::model::{DeviceInformation, DeviceSnapshot, OpenFeature, Sensors, StateEntry};

/// Water timers: one `toggle` per spigot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Valve {
    pub id: String,
    pub device_information: DeviceInformation,
    #[serde(serialize_with = "values_only")]
    pub open: BTreeMap<Option<String>, OpenFeature>,
    pub sensors: Sensors,
}

impl Valve {
    pub fn spigot(&self, instance: Option<&str>) -> Option<&OpenFeature> {
        self.open.get(&instance.map(str::to_owned))
    }

    pub(crate) fn summary(&self) -> String {
        self.open
            .values()
            .map(|f| {
                let state = if f.open { "open" } else { "closed" };
                match &f.func_instance {
                    Some(instance) => format!("{instance}={state}"),
                    None => state.to_owned(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Resource for Valve {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> &DeviceInformation {
        &self.device_information
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValveUpdate {
    pub open: Option<OpenFeature>,
}

pub struct ValveCategory;

impl Category for ValveCategory {
    type Resource = Valve;
    type Update = ValveUpdate;

    const KIND: CategoryKind = CategoryKind::Valve;
    const DEVICE_CLASSES: &'static [&'static str] = &["water-timer"];
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[("open", "toggle")];

    fn build(snapshot: &DeviceSnapshot) -> Valve {
        let mut valve = Valve {
            id: snapshot.id.clone(),
            device_information: DeviceInformation::from_snapshot(snapshot),
            open: BTreeMap::new(),
            sensors: Sensors::default(),
        };
        Self::apply(&mut valve, snapshot);
        valve
    }

    fn apply(valve: &mut Valve, snapshot: &DeviceSnapshot) -> ChangedFields {
        let mut changed = ChangedFields::new();
        for state in &snapshot.states {
            if state.function_class == Self::function_class("open") {
                let feature = OpenFeature::from_state(state);
                let previous = valve.open.insert(state.function_instance.clone(), feature.clone());
                if previous.as_ref() != Some(&feature) {
                    changed.insert("open".to_owned());
                }
            } else if let Some(field) = valve.sensors.apply(&valve.id, state) {
                changed.insert(field);
            }
        }
        changed
    }

    fn to_states(valve: &Valve, update: &ValveUpdate) -> Vec<StateEntry> {
        let mut out = Vec::new();
        if let Some(desired) = &update.open {
            let current = valve.open.get(&desired.func_instance);
            diff_feature(&mut out, Self::function_class("open"), None, current, Some(desired));
        }
        out
    }

    fn merge(valve: &mut Valve, update: ValveUpdate) {
        if let Some(feature) = update.open {
            valve.open.insert(feature.func_instance.clone(), feature);
        }
    }

    fn wrap(valve: Valve) -> AnyResource {
        AnyResource::Valve(valve)
    }
}
