//! Home Assistant devices for chatdeck.
//!
//! This crate provides:
//!
//! - **Devices**: the device model and type-derived icon and action
//! - **Registry**: read-only device listing
//! - **Control**: the home-automation capability and its HTTP client
//! - **Menu**: device menu rendering and callback payloads

pub mod client;
pub mod control;
pub mod device;
pub mod error;
pub mod menu;
pub mod registry;

pub use client::HomeAssistantClient;
pub use control::{EntityState, HomeControl, RetryingControl};
pub use device::{Device, DeviceAction, DeviceKind, device_type};
pub use error::{ControlError, RegistryError};
pub use menu::{
    ActionButton, ActionMenu, CONTROL_NAMESPACE, REFRESH_TOKEN, control_payload,
    render_device_menu,
};
pub use registry::{DeviceRegistry, MemoryDeviceRegistry, RetryingRegistry};
