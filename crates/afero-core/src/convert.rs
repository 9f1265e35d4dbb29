// ── API-to-domain type conversions ──
//
// Bridges raw `afero_api` wire types into `afero_core::model` snapshots
// and back. Missing optional metadata is filled with empty strings so
// snapshots compare by value without `Option` noise.

use afero_api::models::{RawFunction, RawMetadevice, RawState};

use crate::model::{DeviceSnapshot, FunctionDef, StateEntry};

pub fn snapshot_from_raw(raw: &RawMetadevice) -> DeviceSnapshot {
    let device = &raw.description.device;
    DeviceSnapshot {
        id: raw.id.clone(),
        parent_id: raw.device_id.clone(),
        type_id: raw.type_id.clone(),
        model: device.model.clone().unwrap_or_default(),
        device_class: device.device_class.clone().unwrap_or_default(),
        default_name: device.default_name.clone().unwrap_or_default(),
        default_image: raw.description.default_image.clone().unwrap_or_default(),
        friendly_name: raw.friendly_name.clone().unwrap_or_default(),
        functions: raw.description.functions.iter().map(function_from_raw).collect(),
        states: raw.state.values.iter().map(state_from_raw).collect(),
    }
}

fn function_from_raw(raw: &RawFunction) -> FunctionDef {
    FunctionDef {
        function_class: raw.function_class.clone(),
        function_instance: raw.function_instance.clone(),
        values: raw.values.iter().map(|v| v.name.clone()).collect(),
    }
}

pub fn state_from_raw(raw: &RawState) -> StateEntry {
    StateEntry {
        function_class: raw.function_class.clone(),
        function_instance: raw.function_instance.clone(),
        value: raw.value.clone(),
        last_update_time: raw.last_update_time,
    }
}

pub fn state_to_raw(state: &StateEntry) -> RawState {
    RawState {
        function_class: state.function_class.clone(),
        function_instance: state.function_instance.clone(),
        value: state.value.clone(),
        last_update_time: state.last_update_time,
    }
}
