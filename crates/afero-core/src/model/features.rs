// ── Feature values ──
//
// Typed values that resources are built from. Each one knows how to turn
// itself back into wire fragments so a diff of two resources can be sent
// to the cloud as-is.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::state::StateEntry;

/// Deterministic conversion of a feature value to wire fragments.
///
/// `function_class` / `instance` are the defaults from the category's
/// field map; features that carry their own key ignore them.
pub trait Feature: Clone + PartialEq {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry>;
}

fn single(function_class: &str, instance: Option<&str>, value: Value) -> Vec<StateEntry> {
    vec![StateEntry::new(function_class, value).with_optional_instance(instance.map(str::to_owned))]
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

// ── Binary features ─────────────────────────────────────────────────

/// Power (or zone toggle) state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnFeature {
    pub on: bool,
    pub func_class: String,
    pub func_instance: Option<String>,
}

impl OnFeature {
    pub fn power(on: bool) -> Self {
        Self {
            on,
            func_class: "power".into(),
            func_instance: None,
        }
    }

    pub fn from_state(state: &StateEntry) -> Self {
        Self {
            on: state.as_str() == Some("on"),
            func_class: state.function_class.clone(),
            func_instance: state.function_instance.clone(),
        }
    }
}

impl Feature for OnFeature {
    fn to_states(&self, _: &str, _: Option<&str>) -> Vec<StateEntry> {
        single(
            &self.func_class,
            self.func_instance.as_deref(),
            json!(on_off(self.on)),
        )
    }
}

/// Open / closed state of a valve-like output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFeature {
    pub open: bool,
    pub func_class: String,
    pub func_instance: Option<String>,
}

impl OpenFeature {
    pub fn from_state(state: &StateEntry) -> Self {
        Self {
            open: state.as_str() == Some("on"),
            func_class: state.function_class.clone(),
            func_instance: state.function_instance.clone(),
        }
    }
}

impl Feature for OpenFeature {
    fn to_states(&self, _: &str, _: Option<&str>) -> Vec<StateEntry> {
        single(
            &self.func_class,
            self.func_instance.as_deref(),
            json!(on_off(self.open)),
        )
    }
}

/// Named toggle such as a fan's comfort-breeze preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetFeature {
    pub enabled: bool,
    pub func_class: String,
    pub func_instance: String,
}

impl Feature for PresetFeature {
    fn to_states(&self, _: &str, _: Option<&str>) -> Vec<StateEntry> {
        let value = if self.enabled { "enabled" } else { "disabled" };
        single(&self.func_class, Some(&self.func_instance), json!(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionFeature {
    pub forward: bool,
}

impl Feature for DirectionFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        let value = if self.forward { "forward" } else { "reverse" };
        single(function_class, instance, json!(value))
    }
}

// ── Light features ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimmingFeature {
    pub brightness: u8,
}

impl DimmingFeature {
    pub fn from_state(state: &StateEntry) -> Option<Self> {
        let brightness = state.value.as_u64()?;
        Some(Self {
            brightness: u8::try_from(brightness.min(100)).unwrap_or(100),
        })
    }
}

impl Feature for DimmingFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        single(function_class, instance, json!(self.brightness))
    }
}

/// White temperature in kelvin, sent as `"{kelvin}K"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTemperatureFeature {
    pub temperature: u32,
    pub supported: Vec<u32>,
}

impl ColorTemperatureFeature {
    pub fn parse_kelvin(raw: &str) -> Option<u32> {
        raw.trim().trim_end_matches(['K', 'k']).parse().ok()
    }

    pub fn from_state(state: &StateEntry, supported: Vec<u32>) -> Option<Self> {
        let temperature = match &state.value {
            Value::String(s) => Self::parse_kelvin(s)?,
            Value::Number(n) => u32::try_from(n.as_u64()?).ok()?,
            _ => return None,
        };
        Some(Self {
            temperature,
            supported,
        })
    }
}

impl Feature for ColorTemperatureFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        single(
            function_class,
            instance,
            json!(format!("{}K", self.temperature)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorFeature {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorFeature {
    pub fn from_state(state: &StateEntry) -> Option<Self> {
        let rgb = state.value.get("color-rgb")?;
        let channel = |key: &str| {
            rgb.get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u8::try_from(v).ok())
        };
        Some(Self {
            red: channel("r")?,
            green: channel("g")?,
            blue: channel("b")?,
        })
    }
}

impl Feature for ColorFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        single(
            function_class,
            instance,
            json!({ "color-rgb": { "r": self.red, "g": self.green, "b": self.blue } }),
        )
    }
}

/// Which light output drives the colour (`white`, `color`, `sequence`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorModeFeature {
    pub mode: String,
}

impl Feature for ColorModeFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        single(function_class, instance, json!(self.mode))
    }
}

/// Active light effect.
///
/// Effects are grouped by `color-sequence` instance: the `preset` group
/// holds built-in effects, other groups hold custom sequences. Selecting a
/// custom effect writes the group name to the `preset` instance and the
/// effect to the group's own instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectFeature {
    pub effect: String,
    pub effects: BTreeMap<String, BTreeSet<String>>,
}

pub const EFFECT_CLASS: &str = "color-sequence";
pub const PRESET_GROUP: &str = "preset";

impl EffectFeature {
    pub fn is_preset(&self, effect: &str) -> bool {
        self.effects
            .get(PRESET_GROUP)
            .is_some_and(|set| set.contains(effect))
    }

    /// Group the effect belongs to, preferring the preset group.
    pub fn group_of(&self, effect: &str) -> Option<&str> {
        if self.is_preset(effect) {
            return Some(PRESET_GROUP);
        }
        self.effects
            .iter()
            .find(|(_, set)| set.contains(effect))
            .map(|(group, _)| group.as_str())
    }
}

impl Feature for EffectFeature {
    fn to_states(&self, _: &str, _: Option<&str>) -> Vec<StateEntry> {
        match self.group_of(&self.effect) {
            Some(group) if group != PRESET_GROUP => vec![
                StateEntry::new(EFFECT_CLASS, json!(group)).with_instance(PRESET_GROUP),
                StateEntry::new(EFFECT_CLASS, json!(self.effect)).with_instance(group),
            ],
            _ => vec![StateEntry::new(EFFECT_CLASS, json!(self.effect)).with_instance(PRESET_GROUP)],
        }
    }
}

// ── Fan features ────────────────────────────────────────────────────

/// Fan speed as a percentage of an ordered list of device speeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedFeature {
    pub speed: u8,
    pub speeds: Vec<String>,
}

impl SpeedFeature {
    pub fn from_state(state: &StateEntry, speeds: Vec<String>) -> Option<Self> {
        let item = state.as_str()?;
        let speed = ordered_list_item_to_percentage(&speeds, item).unwrap_or(0);
        Some(Self { speed, speeds })
    }
}

impl Feature for SpeedFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        let item = percentage_to_ordered_list_item(&self.speeds, self.speed).unwrap_or_default();
        single(function_class, instance, json!(item))
    }
}

/// Operating mode of a fan, one of the values its `mode` function lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFeature {
    pub mode: String,
    pub modes: BTreeSet<String>,
}

impl ModeFeature {
    pub fn from_state(state: &StateEntry, modes: BTreeSet<String>) -> Option<Self> {
        Some(Self {
            mode: state.as_str()?.to_owned(),
            modes,
        })
    }

    pub fn supports(&self, mode: &str) -> bool {
        self.modes.contains(mode)
    }
}

impl Feature for ModeFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        single(function_class, instance, json!(self.mode))
    }
}

/// Pick the list item covering `percentage` (1..=100). Percentages past
/// the last bucket map to the last item.
pub fn percentage_to_ordered_list_item(list: &[String], percentage: u8) -> Option<String> {
    let len = u32::try_from(list.len()).ok().filter(|len| *len > 0)?;
    for (position, item) in (1u32..).zip(list) {
        let upper_bound = position * 100 / len;
        if u32::from(percentage) <= upper_bound {
            return Some(item.clone());
        }
    }
    list.last().cloned()
}

/// Percentage at the upper bound of the item's bucket.
pub fn ordered_list_item_to_percentage(list: &[String], item: &str) -> Option<u8> {
    let len = u32::try_from(list.len()).ok().filter(|len| *len > 0)?;
    let position = u32::try_from(list.iter().position(|s| s == item)? + 1).ok()?;
    u8::try_from(position * 100 / len).ok()
}

// ── Lock features ───────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CurrentPosition {
    Locked,
    Locking,
    #[default]
    Unknown,
    Unlocked,
    Unlocking,
}

impl CurrentPosition {
    /// Parse a wire value; anything unrecognised is `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPositionFeature {
    pub position: CurrentPosition,
}

impl Feature for CurrentPositionFeature {
    fn to_states(&self, function_class: &str, instance: Option<&str>) -> Vec<StateEntry> {
        single(function_class, instance, json!(self.position.as_ref()))
    }
}
