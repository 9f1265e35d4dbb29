use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{
    AnyResource, Category, CategoryKind, ChangedFields, Resource, diff_feature, record_instance,
    set_field,
};
use crate::model::features::{EFFECT_CLASS, PRESET_GROUP};
use crate::model::{
    ColorFeature, ColorModeFeature, ColorTemperatureFeature, DeviceInformation, DeviceSnapshot,
    DimmingFeature, EffectFeature, OnFeature, Sensors, StateEntry,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Light {
    pub id: String,
    pub device_information: DeviceInformation,
    pub on: Option<OnFeature>,
    pub dimming: Option<DimmingFeature>,
    pub color_temperature: Option<ColorTemperatureFeature>,
    pub color: Option<ColorFeature>,
    pub color_mode: Option<ColorModeFeature>,
    pub effect: Option<EffectFeature>,
    pub sensors: Sensors,
    #[serde(skip)]
    instances: BTreeMap<String, Option<String>>,
}

impl Light {
    pub fn is_on(&self) -> bool {
        self.on.as_ref().is_some_and(|f| f.on)
    }

    pub fn brightness(&self) -> Option<u8> {
        self.dimming.map(|d| d.brightness)
    }

    /// Instance a function class was last reported under.
    pub fn instance(&self, function_class: &str) -> Option<&str> {
        self.instances.get(function_class).and_then(|i| i.as_deref())
    }

    pub(crate) fn summary(&self) -> String {
        let mut parts = vec![if self.is_on() { "on" } else { "off" }.to_owned()];
        if let Some(b) = self.brightness() {
            parts.push(format!("{b}%"));
        }
        if let Some(t) = &self.color_temperature {
            parts.push(format!("{}K", t.temperature));
        }
        if let Some(c) = self.color {
            parts.push(format!("rgb({},{},{})", c.red, c.green, c.blue));
        }
        if let Some(e) = &self.effect {
            parts.push(format!("effect={}", e.effect));
        }
        parts.join(" ")
    }
}

impl Resource for Light {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> &DeviceInformation {
        &self.device_information
    }
}

#[derive(Debug, Clone, Default)]
pub struct LightUpdate {
    pub on: Option<OnFeature>,
    pub dimming: Option<DimmingFeature>,
    pub color_temperature: Option<ColorTemperatureFeature>,
    pub color: Option<ColorFeature>,
    pub color_mode: Option<ColorModeFeature>,
    pub effect: Option<EffectFeature>,
}

pub struct LightCategory;

fn supported_temperatures(snapshot: &DeviceSnapshot) -> Vec<u32> {
    snapshot
        .function_values("color-temperature", None)
        .iter()
        .filter_map(|v| ColorTemperatureFeature::parse_kelvin(v))
        .collect()
}

fn effect_groups(snapshot: &DeviceSnapshot) -> BTreeMap<String, BTreeSet<String>> {
    snapshot
        .functions
        .iter()
        .filter(|f| f.function_class == EFFECT_CLASS)
        .filter_map(|f| {
            let group = f.function_instance.clone()?;
            Some((group, f.values.iter().cloned().collect()))
        })
        .collect()
}

/// Resolve the effect named by the `color-sequence` entries of a snapshot.
///
/// The `preset` instance holds either a preset effect or the name of a
/// custom group, whose own instance then holds the effect.
fn resolve_effect(light: &Light, snapshot: &DeviceSnapshot) -> Option<EffectFeature> {
    let effects = light
        .effect
        .as_ref()
        .map_or_else(|| effect_groups(snapshot), |e| e.effects.clone());
    let entry = |group: &str| {
        snapshot
            .state(EFFECT_CLASS, Some(group))
            .and_then(StateEntry::as_str)
            .map(str::to_owned)
    };

    let effect = match entry(PRESET_GROUP) {
        Some(selected) if !effects.contains_key(&selected) => Some(selected),
        Some(group) => entry(&group),
        None => light
            .effect
            .as_ref()
            .and_then(|e| e.group_of(&e.effect))
            .filter(|group| *group != PRESET_GROUP)
            .and_then(entry),
    }?;
    Some(EffectFeature { effect, effects })
}

impl Category for LightCategory {
    type Resource = Light;
    type Update = LightUpdate;

    const KIND: CategoryKind = CategoryKind::Light;
    const DEVICE_CLASSES: &'static [&'static str] = &["light"];
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[
        ("on", "power"),
        ("dimming", "brightness"),
        ("color_temperature", "color-temperature"),
        ("color", "color-rgb"),
        ("color_mode", "color-mode"),
        ("effect", "color-sequence"),
    ];

    fn build(snapshot: &DeviceSnapshot) -> Light {
        let mut light = Light {
            id: snapshot.id.clone(),
            device_information: DeviceInformation::from_snapshot(snapshot),
            on: None,
            dimming: None,
            color_temperature: None,
            color: None,
            color_mode: None,
            effect: None,
            sensors: Sensors::default(),
            instances: BTreeMap::new(),
        };
        Self::apply(&mut light, snapshot);
        light
    }

    fn apply(light: &mut Light, snapshot: &DeviceSnapshot) -> ChangedFields {
        let mut changed = ChangedFields::new();
        for state in &snapshot.states {
            match state.function_class.as_str() {
                "power" => set_field(&mut changed, "on", &mut light.on, OnFeature::from_state(state)),
                "brightness" => {
                    if let Some(dimming) = DimmingFeature::from_state(state) {
                        set_field(&mut changed, "dimming", &mut light.dimming, dimming);
                    }
                }
                "color-temperature" => {
                    let supported = light
                        .color_temperature
                        .as_ref()
                        .map_or_else(|| supported_temperatures(snapshot), |t| t.supported.clone());
                    if let Some(temp) = ColorTemperatureFeature::from_state(state, supported) {
                        set_field(&mut changed, "color_temperature", &mut light.color_temperature, temp);
                    }
                }
                "color-rgb" => {
                    if let Some(color) = ColorFeature::from_state(state) {
                        set_field(&mut changed, "color", &mut light.color, color);
                    }
                }
                "color-mode" => {
                    if let Some(mode) = state.as_str() {
                        let mode = ColorModeFeature { mode: mode.to_owned() };
                        set_field(&mut changed, "color_mode", &mut light.color_mode, mode);
                    }
                }
                EFFECT_CLASS => continue,
                _ => {
                    if let Some(field) = light.sensors.apply(&light.id, state) {
                        changed.insert(field);
                    }
                    continue;
                }
            }
            record_instance(&mut light.instances, state);
        }
        if let Some(effect) = resolve_effect(light, snapshot) {
            set_field(&mut changed, "effect", &mut light.effect, effect);
        }
        changed
    }

    fn to_states(light: &Light, update: &LightUpdate) -> Vec<StateEntry> {
        let mut out = Vec::new();
        let class = Self::function_class;
        diff_feature(&mut out, class("on"), None, light.on.as_ref(), update.on.as_ref());
        diff_feature(
            &mut out,
            class("dimming"),
            light.instance(class("dimming")),
            light.dimming.as_ref(),
            update.dimming.as_ref(),
        );
        diff_feature(
            &mut out,
            class("color_temperature"),
            light.instance(class("color_temperature")),
            light.color_temperature.as_ref(),
            update.color_temperature.as_ref(),
        );
        diff_feature(
            &mut out,
            class("color"),
            light.instance(class("color")),
            light.color.as_ref(),
            update.color.as_ref(),
        );
        diff_feature(
            &mut out,
            class("color_mode"),
            light.instance(class("color_mode")),
            light.color_mode.as_ref(),
            update.color_mode.as_ref(),
        );
        diff_feature(&mut out, class("effect"), None, light.effect.as_ref(), update.effect.as_ref());
        out
    }

    fn merge(light: &mut Light, update: LightUpdate) {
        let LightUpdate {
            on,
            dimming,
            color_temperature,
            color,
            color_mode,
            effect,
        } = update;
        if on.is_some() {
            light.on = on;
        }
        if dimming.is_some() {
            light.dimming = dimming;
        }
        if color_temperature.is_some() {
            light.color_temperature = color_temperature;
        }
        if color.is_some() {
            light.color = color;
        }
        if color_mode.is_some() {
            light.color_mode = color_mode;
        }
        if effect.is_some() {
            light.effect = effect;
        }
    }

    fn wrap(light: Light) -> AnyResource {
        AnyResource::Light(light)
    }
}
