use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{
    AnyResource, Category, CategoryKind, ChangedFields, Resource, diff_feature, record_instance,
    set_field,
};
use crate::model::{
    DeviceInformation, DeviceSnapshot, DirectionFeature, ModeFeature, OnFeature, PresetFeature,
    Sensors, SpeedFeature, StateEntry,
};

/// Speed value meaning "stopped"; not part of the ordered speed list.
const SPEED_OFF: &str = "fan-speed-000";
pub(crate) const PRESET_INSTANCE: &str = "comfort-breeze";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fan {
    pub id: String,
    pub device_information: DeviceInformation,
    pub on: Option<OnFeature>,
    pub speed: Option<SpeedFeature>,
    pub direction: Option<DirectionFeature>,
    pub preset: Option<PresetFeature>,
    pub mode: Option<ModeFeature>,
    pub sensors: Sensors,
    #[serde(skip)]
    instances: BTreeMap<String, Option<String>>,
}

impl Fan {
    pub fn is_on(&self) -> bool {
        self.on.as_ref().is_some_and(|f| f.on)
    }

    /// Ordered speed list, lowest first.
    pub fn speeds(&self) -> &[String] {
        self.speed.as_ref().map_or(&[], |s| s.speeds.as_slice())
    }

    fn instance(&self, function_class: &str) -> Option<&str> {
        self.instances.get(function_class).and_then(|i| i.as_deref())
    }

    pub(crate) fn summary(&self) -> String {
        let mut parts = vec![if self.is_on() { "on" } else { "off" }.to_owned()];
        if let Some(speed) = &self.speed {
            parts.push(format!("speed={}%", speed.speed));
        }
        if let Some(direction) = self.direction {
            parts.push(if direction.forward { "forward" } else { "reverse" }.to_owned());
        }
        if self.preset.as_ref().is_some_and(|p| p.enabled) {
            parts.push(PRESET_INSTANCE.to_owned());
        }
        if let Some(mode) = &self.mode {
            parts.push(format!("mode={}", mode.mode));
        }
        parts.join(" ")
    }
}

impl Resource for Fan {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> &DeviceInformation {
        &self.device_information
    }
}

#[derive(Debug, Clone, Default)]
pub struct FanUpdate {
    pub on: Option<OnFeature>,
    pub speed: Option<SpeedFeature>,
    pub direction: Option<DirectionFeature>,
    pub preset: Option<PresetFeature>,
    pub mode: Option<ModeFeature>,
}

pub struct FanCategory;

fn speed_list(snapshot: &DeviceSnapshot) -> Vec<String> {
    snapshot
        .functions
        .iter()
        .filter(|f| f.function_class == "fan-speed")
        .flat_map(|f| f.values.iter())
        .filter(|v| v.as_str() != SPEED_OFF)
        .cloned()
        .collect()
}

fn mode_list(snapshot: &DeviceSnapshot) -> BTreeSet<String> {
    snapshot
        .functions
        .iter()
        .filter(|f| f.function_class == "mode")
        .flat_map(|f| f.values.iter().cloned())
        .collect()
}

impl Category for FanCategory {
    type Resource = Fan;
    type Update = FanUpdate;

    const KIND: CategoryKind = CategoryKind::Fan;
    const DEVICE_CLASSES: &'static [&'static str] = &["fan"];
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[
        ("on", "power"),
        ("speed", "fan-speed"),
        ("direction", "fan-reverse"),
        ("preset", "toggle"),
        ("mode", "mode"),
    ];

    fn build(snapshot: &DeviceSnapshot) -> Fan {
        let mut fan = Fan {
            id: snapshot.id.clone(),
            device_information: DeviceInformation::from_snapshot(snapshot),
            on: None,
            speed: None,
            direction: None,
            preset: None,
            mode: None,
            sensors: Sensors::default(),
            instances: BTreeMap::new(),
        };
        Self::apply(&mut fan, snapshot);
        fan
    }

    fn apply(fan: &mut Fan, snapshot: &DeviceSnapshot) -> ChangedFields {
        let mut changed = ChangedFields::new();
        for state in &snapshot.states {
            match state.function_class.as_str() {
                "power" => set_field(&mut changed, "on", &mut fan.on, OnFeature::from_state(state)),
                "fan-speed" => {
                    let speeds = fan
                        .speed
                        .as_ref()
                        .map_or_else(|| speed_list(snapshot), |s| s.speeds.clone());
                    if let Some(speed) = SpeedFeature::from_state(state, speeds) {
                        set_field(&mut changed, "speed", &mut fan.speed, speed);
                    }
                }
                "fan-reverse" => {
                    let forward = state.as_str() != Some("reverse");
                    set_field(&mut changed, "direction", &mut fan.direction, DirectionFeature { forward });
                }
                "mode" => {
                    let modes = fan
                        .mode
                        .as_ref()
                        .map_or_else(|| mode_list(snapshot), |m| m.modes.clone());
                    if let Some(mode) = ModeFeature::from_state(state, modes) {
                        set_field(&mut changed, "mode", &mut fan.mode, mode);
                    }
                }
                "toggle" if state.instance() == Some(PRESET_INSTANCE) => {
                    let preset = PresetFeature {
                        enabled: state.as_str() == Some("enabled"),
                        func_class: state.function_class.clone(),
                        func_instance: PRESET_INSTANCE.to_owned(),
                    };
                    set_field(&mut changed, "preset", &mut fan.preset, preset);
                }
                _ => {
                    if let Some(field) = fan.sensors.apply(&fan.id, state) {
                        changed.insert(field);
                    }
                    continue;
                }
            }
            record_instance(&mut fan.instances, state);
        }
        changed
    }

    fn to_states(fan: &Fan, update: &FanUpdate) -> Vec<StateEntry> {
        let mut out = Vec::new();
        let class = Self::function_class;
        diff_feature(&mut out, class("on"), None, fan.on.as_ref(), update.on.as_ref());
        diff_feature(
            &mut out,
            class("speed"),
            fan.instance(class("speed")),
            fan.speed.as_ref(),
            update.speed.as_ref(),
        );
        diff_feature(
            &mut out,
            class("direction"),
            fan.instance(class("direction")),
            fan.direction.as_ref(),
            update.direction.as_ref(),
        );
        diff_feature(&mut out, class("preset"), None, fan.preset.as_ref(), update.preset.as_ref());
        diff_feature(
            &mut out,
            class("mode"),
            fan.instance(class("mode")),
            fan.mode.as_ref(),
            update.mode.as_ref(),
        );
        out
    }

    fn merge(fan: &mut Fan, update: FanUpdate) {
        if update.on.is_some() {
            fan.on = update.on;
        }
        if update.speed.is_some() {
            fan.speed = update.speed;
        }
        if update.direction.is_some() {
            fan.direction = update.direction;
        }
        if update.preset.is_some() {
            fan.preset = update.preset;
        }
        if update.mode.is_some() {
            fan.mode = update.mode;
        }
    }

    fn wrap(fan: Fan) -> AnyResource {
        AnyResource::Fan(fan)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::category::fixtures::{function, snapshot, state};
    use pretty_assertions::assert_eq;

    fn fan_snapshot() -> DeviceSnapshot {
        let mut snap = snapshot(
            "fan-1",
            "fan",
            vec![
                state("power", Some("fan-power"), "on"),
                state("fan-speed", Some("fan-speed"), "fan-speed-6-050"),
                state("fan-reverse", Some("fan-reverse"), "forward"),
                state("toggle", Some("comfort-breeze"), "disabled"),
            ],
        );
        snap.functions = vec![function(
            "fan-speed",
            Some("fan-speed"),
            &[
                "fan-speed-000",
                "fan-speed-6-016",
                "fan-speed-6-033",
                "fan-speed-6-050",
                "fan-speed-6-066",
                "fan-speed-6-083",
                "fan-speed-6-100",
            ],
        )];
        snap
    }

    #[test]
    fn build_maps_speed_to_percentage() {
        let fan = FanCategory::build(&fan_snapshot());
        assert!(fan.is_on());
        assert_eq!(fan.speeds().len(), 6);
        assert_eq!(fan.speed.as_ref().unwrap().speed, 50);
        assert!(fan.direction.unwrap().forward);
        assert!(!fan.preset.as_ref().unwrap().enabled);
    }

    #[test]
    fn mode_keeps_the_advertised_list() {
        let mut snap = fan_snapshot();
        snap.states.push(state("mode", None, "auto"));
        snap.functions.push(function("mode", None, &["auto", "manual"]));
        let mut fan = FanCategory::build(&snap);
        let mode = fan.mode.clone().unwrap();
        assert_eq!(mode.mode, "auto");
        assert!(mode.supports("manual"));
        assert!(fan.summary().ends_with("mode=auto"));

        // Partial snapshots carry no function list; the known one stays.
        let changed = FanCategory::apply(&mut fan, &snapshot("fan-1", "fan", vec![state("mode", None, "manual")]));
        assert!(changed.contains("mode"));
        assert_eq!(fan.mode.as_ref().unwrap().modes.len(), 2);
    }

    #[test]
    fn speed_diff_uses_list_item_and_instance() {
        let fan = FanCategory::build(&fan_snapshot());
        let update = FanUpdate {
            speed: Some(SpeedFeature {
                speed: 100,
                speeds: fan.speeds().to_vec(),
            }),
            direction: Some(DirectionFeature { forward: false }),
            ..FanUpdate::default()
        };
        let states = FanCategory::to_states(&fan, &update);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].instance(), Some("fan-speed"));
        assert_eq!(states[0].as_str(), Some("fan-speed-6-100"));
        assert_eq!(states[1].as_str(), Some("reverse"));

        let mut merged = fan.clone();
        FanCategory::merge(&mut merged, update);
        let mut replayed = fan;
        FanCategory::apply(&mut replayed, &snapshot("fan-1", "fan", states));
        assert_eq!(replayed, merged);
    }
}
