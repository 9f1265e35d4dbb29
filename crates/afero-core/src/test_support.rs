// In-memory transport for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{DeviceSnapshot, StateEntry};
use crate::transport::Transport;

#[derive(Default)]
pub(crate) struct FakeTransport {
    fleet: Mutex<Vec<DeviceSnapshot>>,
    fetch_auth_failure: AtomicBool,
    fail_writes: AtomicBool,
    write_auth_failure: AtomicBool,
    fetches: AtomicUsize,
    writes: Mutex<Vec<(String, Vec<StateEntry>)>>,
}

impl FakeTransport {
    pub(crate) fn with_fleet(fleet: Vec<DeviceSnapshot>) -> Arc<Self> {
        let transport = Self::default();
        *transport.fleet.lock().unwrap_or_else(PoisonError::into_inner) = fleet;
        Arc::new(transport)
    }

    pub(crate) fn set_fleet(&self, fleet: Vec<DeviceSnapshot>) {
        *self.fleet.lock().unwrap_or_else(PoisonError::into_inner) = fleet;
    }

    pub(crate) fn fail_fetch_with_auth(&self) {
        self.fetch_auth_failure.store(true, Ordering::SeqCst);
    }

    pub(crate) fn recover_fetch(&self) {
        self.fetch_auth_failure.store(false, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes_with_auth(&self) {
        self.write_auth_failure.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> Vec<(String, Vec<StateEntry>)> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_fleet(&self) -> Result<Vec<DeviceSnapshot>, CoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fetch_auth_failure.load(Ordering::SeqCst) {
            return Err(CoreError::AuthInvalid {
                message: "token rejected".into(),
            });
        }
        Ok(self.fleet.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn send_device_write(&self, device_id: &str, states: &[StateEntry]) -> Result<(), CoreError> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((device_id.to_owned(), states.to_vec()));
        if self.write_auth_failure.load(Ordering::SeqCst) {
            return Err(CoreError::AuthInvalid {
                message: "token rejected".into(),
            });
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::InvalidPayload {
                message: "rejected".into(),
            });
        }
        Ok(())
    }
}
