// ── Category convenience actions ──
//
// Thin helpers over `ResourceController::update` that build the partial
// update from the current model.

use super::{ResourceController, UpdateOutcome};
use crate::category::fan::PRESET_INSTANCE;
use crate::category::{
    DeviceCategory, FanCategory, FanUpdate, LightCategory, LightUpdate, LockCategory, LockUpdate, SwitchCategory,
    SwitchUpdate, ValveCategory, ValveUpdate,
};
use crate::error::CoreError;
use crate::model::{
    ColorFeature, ColorModeFeature, ColorTemperatureFeature, CurrentPosition,
    CurrentPositionFeature, DimmingFeature, DirectionFeature, EffectFeature, ModeFeature,
    OnFeature, OpenFeature, PresetFeature, SpeedFeature,
};

pub type LightController = ResourceController<LightCategory>;
pub type LockController = ResourceController<LockCategory>;
pub type SwitchController = ResourceController<SwitchCategory>;
pub type FanController = ResourceController<FanCategory>;
pub type ValveController = ResourceController<ValveCategory>;
pub type DeviceController = ResourceController<DeviceCategory>;

fn power(current: Option<&OnFeature>, on: bool) -> OnFeature {
    let mut feature = current.cloned().unwrap_or_else(|| OnFeature::power(on));
    feature.on = on;
    feature
}

fn color_mode(mode: &str) -> Option<ColorModeFeature> {
    Some(ColorModeFeature { mode: mode.into() })
}

// ── Light ────────────────────────────────────────────────────────

impl LightController {
    pub async fn turn_on(&self, device_id: &str) -> Result<UpdateOutcome, CoreError> {
        self.set_power(device_id, true).await
    }

    pub async fn turn_off(&self, device_id: &str) -> Result<UpdateOutcome, CoreError> {
        self.set_power(device_id, false).await
    }

    async fn set_power(&self, device_id: &str, on: bool) -> Result<UpdateOutcome, CoreError> {
        let light = self.get(device_id)?;
        let update = LightUpdate {
            on: Some(power(light.on.as_ref(), on)),
            ..LightUpdate::default()
        };
        self.update(device_id, update).await
    }

    /// Brightness in percent; values above 100 are clamped.
    pub async fn set_brightness(&self, device_id: &str, brightness: u8) -> Result<UpdateOutcome, CoreError> {
        let update = LightUpdate {
            dimming: Some(DimmingFeature {
                brightness: brightness.min(100),
            }),
            ..LightUpdate::default()
        };
        self.update(device_id, update).await
    }

    /// Switch to white output at `kelvin`.
    pub async fn set_color_temperature(&self, device_id: &str, kelvin: u32) -> Result<UpdateOutcome, CoreError> {
        let light = self.get(device_id)?;
        let supported = light
            .color_temperature
            .as_ref()
            .map(|t| t.supported.clone())
            .unwrap_or_default();
        let update = LightUpdate {
            color_temperature: Some(ColorTemperatureFeature {
                temperature: kelvin,
                supported,
            }),
            color_mode: color_mode("white"),
            ..LightUpdate::default()
        };
        self.update(device_id, update).await
    }

    pub async fn set_color(&self, device_id: &str, red: u8, green: u8, blue: u8) -> Result<UpdateOutcome, CoreError> {
        let update = LightUpdate {
            color: Some(ColorFeature { red, green, blue }),
            color_mode: color_mode("color"),
            ..LightUpdate::default()
        };
        self.update(device_id, update).await
    }

    pub async fn set_effect(&self, device_id: &str, effect: &str) -> Result<UpdateOutcome, CoreError> {
        let light = self.get(device_id)?;
        let effects = light
            .effect
            .as_ref()
            .map(|e| e.effects.clone())
            .unwrap_or_default();
        let update = LightUpdate {
            effect: Some(EffectFeature {
                effect: effect.to_owned(),
                effects,
            }),
            color_mode: color_mode("sequence"),
            ..LightUpdate::default()
        };
        self.update(device_id, update).await
    }
}

// ── Lock ─────────────────────────────────────────────────────────

impl LockController {
    pub async fn lock(&self, device_id: &str) -> Result<UpdateOutcome, CoreError> {
        self.set_position(device_id, CurrentPosition::Locking).await
    }

    pub async fn unlock(&self, device_id: &str) -> Result<UpdateOutcome, CoreError> {
        self.set_position(device_id, CurrentPosition::Unlocking).await
    }

    async fn set_position(&self, device_id: &str, position: CurrentPosition) -> Result<UpdateOutcome, CoreError> {
        let update = LockUpdate {
            position: Some(CurrentPositionFeature { position }),
        };
        self.update(device_id, update).await
    }
}

// ── Switch ───────────────────────────────────────────────────────

impl SwitchController {
    /// Turn on the output for `instance` (`None` is the main power).
    pub async fn turn_on(&self, device_id: &str, instance: Option<&str>) -> Result<UpdateOutcome, CoreError> {
        self.set_output(device_id, instance, true).await
    }

    pub async fn turn_off(&self, device_id: &str, instance: Option<&str>) -> Result<UpdateOutcome, CoreError> {
        self.set_output(device_id, instance, false).await
    }

    async fn set_output(
        &self,
        device_id: &str,
        instance: Option<&str>,
        on: bool,
    ) -> Result<UpdateOutcome, CoreError> {
        let switch = self.get(device_id)?;
        let output = match switch.output(instance) {
            Some(current) => power(Some(current), on),
            None => OnFeature {
                on,
                func_class: if instance.is_some() { "toggle" } else { "power" }.into(),
                func_instance: instance.map(str::to_owned),
            },
        };
        self.update(device_id, SwitchUpdate { on: Some(output) }).await
    }
}

// ── Fan ──────────────────────────────────────────────────────────

impl FanController {
    pub async fn turn_on(&self, device_id: &str) -> Result<UpdateOutcome, CoreError> {
        self.set_power(device_id, true).await
    }

    pub async fn turn_off(&self, device_id: &str) -> Result<UpdateOutcome, CoreError> {
        self.set_power(device_id, false).await
    }

    async fn set_power(&self, device_id: &str, on: bool) -> Result<UpdateOutcome, CoreError> {
        let fan = self.get(device_id)?;
        let update = FanUpdate {
            on: Some(power(fan.on.as_ref(), on)),
            ..FanUpdate::default()
        };
        self.update(device_id, update).await
    }

    /// Speed as a percentage, mapped onto the fan's own speed list.
    pub async fn set_speed(&self, device_id: &str, percentage: u8) -> Result<UpdateOutcome, CoreError> {
        let fan = self.get(device_id)?;
        let update = FanUpdate {
            speed: Some(SpeedFeature {
                speed: percentage.min(100),
                speeds: fan.speeds().to_vec(),
            }),
            ..FanUpdate::default()
        };
        self.update(device_id, update).await
    }

    pub async fn set_direction(&self, device_id: &str, forward: bool) -> Result<UpdateOutcome, CoreError> {
        let update = FanUpdate {
            direction: Some(DirectionFeature { forward }),
            ..FanUpdate::default()
        };
        self.update(device_id, update).await
    }

    pub async fn set_preset(&self, device_id: &str, enabled: bool) -> Result<UpdateOutcome, CoreError> {
        let update = FanUpdate {
            preset: Some(PresetFeature {
                enabled,
                func_class: "toggle".into(),
                func_instance: PRESET_INSTANCE.into(),
            }),
            ..FanUpdate::default()
        };
        self.update(device_id, update).await
    }

    /// Switch to one of the modes the fan advertises. Unknown modes fail
    /// before any request is made.
    pub async fn set_mode(&self, device_id: &str, mode: &str) -> Result<UpdateOutcome, CoreError> {
        let fan = self.get(device_id)?;
        let modes = fan.mode.as_ref().map(|m| m.modes.clone()).unwrap_or_default();
        if !modes.contains(mode) {
            return Err(CoreError::UnsupportedValue {
                device_id: device_id.to_owned(),
                field: "mode".into(),
                value: mode.to_owned(),
            });
        }
        let update = FanUpdate {
            mode: Some(ModeFeature {
                mode: mode.to_owned(),
                modes,
            }),
            ..FanUpdate::default()
        };
        self.update(device_id, update).await
    }
}

// ── Valve ────────────────────────────────────────────────────────

impl ValveController {
    /// Open the spigot at `instance` (`None` for single-outlet timers).
    pub async fn open_valve(&self, device_id: &str, instance: Option<&str>) -> Result<UpdateOutcome, CoreError> {
        self.set_open(device_id, instance, true).await
    }

    pub async fn close_valve(&self, device_id: &str, instance: Option<&str>) -> Result<UpdateOutcome, CoreError> {
        self.set_open(device_id, instance, false).await
    }

    async fn set_open(
        &self,
        device_id: &str,
        instance: Option<&str>,
        open: bool,
    ) -> Result<UpdateOutcome, CoreError> {
        let valve = self.get(device_id)?;
        let mut spigot = valve.spigot(instance).cloned().unwrap_or_else(|| OpenFeature {
            open,
            func_class: "toggle".into(),
            func_instance: instance.map(str::to_owned),
        });
        spigot.open = open;
        self.update(device_id, ValveUpdate { open: Some(spigot) }).await
    }
}
