//! Device registry.

use crate::device::Device;
use crate::error::RegistryError;
use async_trait::async_trait;
use chatdeck_core::RetryPolicy;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Read-only view of the registered devices.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Lists devices, most recently registered first. Empty is valid.
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError>;

    /// Looks up a device. Fails with [`RegistryError::NotFound`] if absent.
    async fn get_device(&self, entity_id: &str) -> Result<Device, RegistryError>;
}

/// Device registry held in process memory.
#[derive(Debug, Default)]
pub struct MemoryDeviceRegistry {
    devices: Mutex<Vec<Device>>,
    list_calls: AtomicUsize,
}

impl MemoryDeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `devices`.
    #[must_use]
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            devices: Mutex::new(devices),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Registers a device.
    pub async fn add(&self, device: Device) {
        self.devices.lock().await.push(device);
    }

    /// Number of `list_devices` calls served.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceRegistry for MemoryDeviceRegistry {
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut devices = self.devices.lock().await.clone();
        devices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(devices)
    }

    async fn get_device(&self, entity_id: &str) -> Result<Device, RegistryError> {
        self.devices
            .lock()
            .await
            .iter()
            .find(|d| d.entity_id == entity_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                entity_id: entity_id.to_string(),
            })
    }
}

/// Wraps a registry with a bounded retry policy for storage failures.
pub struct RetryingRegistry<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: DeviceRegistry> RetryingRegistry<R> {
    /// Wraps `inner`.
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<R: DeviceRegistry> DeviceRegistry for RetryingRegistry<R> {
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError> {
        self.policy
            .run("list_devices", || self.inner.list_devices())
            .await
    }

    async fn get_device(&self, entity_id: &str) -> Result<Device, RegistryError> {
        self.policy
            .run("get_device", || self.inner.get_device(entity_id))
            .await
    }
}
