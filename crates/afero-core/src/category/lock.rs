use std::collections::BTreeMap;

use serde::Serialize;

use super::{
    AnyResource, Category, CategoryKind, ChangedFields, Resource, diff_feature, record_instance,
    set_field,
};
use crate::model::{
    CurrentPosition, CurrentPositionFeature, DeviceInformation, DeviceSnapshot, Sensors, StateEntry,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lock {
    pub id: String,
    pub device_information: DeviceInformation,
    pub position: Option<CurrentPositionFeature>,
    pub sensors: Sensors,
    #[serde(skip)]
    instances: BTreeMap<String, Option<String>>,
}

impl Lock {
    pub fn current_position(&self) -> CurrentPosition {
        self.position.map(|p| p.position).unwrap_or_default()
    }

    pub(crate) fn summary(&self) -> String {
        self.current_position().to_string()
    }
}

impl Resource for Lock {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> &DeviceInformation {
        &self.device_information
    }
}

#[derive(Debug, Clone, Default)]
pub struct LockUpdate {
    pub position: Option<CurrentPositionFeature>,
}

pub struct LockCategory;

impl Category for LockCategory {
    type Resource = Lock;
    type Update = LockUpdate;

    const KIND: CategoryKind = CategoryKind::Lock;
    const DEVICE_CLASSES: &'static [&'static str] = &["door-lock"];
    const FIELD_MAP: &'static [(&'static str, &'static str)] = &[("position", "lock-control")];

    fn build(snapshot: &DeviceSnapshot) -> Lock {
        let mut lock = Lock {
            id: snapshot.id.clone(),
            device_information: DeviceInformation::from_snapshot(snapshot),
            position: None,
            sensors: Sensors::default(),
            instances: BTreeMap::new(),
        };
        Self::apply(&mut lock, snapshot);
        lock
    }

    fn apply(lock: &mut Lock, snapshot: &DeviceSnapshot) -> ChangedFields {
        let mut changed = ChangedFields::new();
        for state in &snapshot.states {
            if state.function_class == Self::function_class("position") {
                let position = CurrentPosition::from_wire(state.as_str().unwrap_or_default());
                set_field(
                    &mut changed,
                    "position",
                    &mut lock.position,
                    CurrentPositionFeature { position },
                );
                record_instance(&mut lock.instances, state);
            } else if let Some(field) = lock.sensors.apply(&lock.id, state) {
                changed.insert(field);
            }
        }
        changed
    }

    fn to_states(lock: &Lock, update: &LockUpdate) -> Vec<StateEntry> {
        let mut out = Vec::new();
        let class = Self::function_class("position");
        let instance = lock.instances.get(class).and_then(|i| i.as_deref());
        diff_feature(&mut out, class, instance, lock.position.as_ref(), update.position.as_ref());
        out
    }

    fn merge(lock: &mut Lock, update: LockUpdate) {
        if update.position.is_some() {
            lock.position = update.position;
        }
    }

    fn wrap(lock: Lock) -> AnyResource {
        AnyResource::Lock(lock)
    }
}
