//! Device menu and device callback handling.

use crate::event::CallbackAction;
use crate::transport::{ChatTransport, MessageRef};
use chatdeck_home::{ActionMenu, DeviceRegistry, HomeControl, RegistryError, render_device_menu};
use std::sync::Arc;
use tracing::{debug, error, info};

pub(crate) const DEVICES_REFRESHED: &str = "✅ Devices refreshed";
pub(crate) const NO_DEVICES: &str = "📱 No devices found";
pub(crate) const NO_DEVICES_IN_DATABASE: &str = "📱 No devices found in database";
pub(crate) const DEVICE_NOT_FOUND: &str = "❌ Device not found";
pub(crate) const REFRESH_FAILED: &str = "❌ Error refreshing devices";
pub(crate) const EDIT_FAILED: &str = "❌ Error refreshing";
pub(crate) const LIST_FAILED: &str = "❌ Error getting devices";
pub(crate) const LOOKUP_FAILED: &str = "❌ Error getting device";

/// Maps device callbacks to registry reads and control calls.
#[derive(Clone)]
pub struct DeviceController {
    registry: Arc<dyn DeviceRegistry>,
    control: Arc<dyn HomeControl>,
}

impl DeviceController {
    /// Creates a controller.
    #[must_use]
    pub fn new(registry: Arc<dyn DeviceRegistry>, control: Arc<dyn HomeControl>) -> Self {
        Self { registry, control }
    }

    /// Renders the current device menu, or `None` if no devices exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub async fn device_menu(&self) -> Result<Option<ActionMenu>, RegistryError> {
        let devices = self.registry.list_devices().await?;
        if devices.is_empty() {
            return Ok(None);
        }
        Ok(Some(render_device_menu(&devices)))
    }

    /// Handles a device callback and returns the acknowledgement text.
    pub async fn handle(
        &self,
        action: CallbackAction,
        message: Option<MessageRef>,
        transport: &dyn ChatTransport,
    ) -> String {
        match action {
            CallbackAction::Refresh => self.refresh(message, transport).await,
            CallbackAction::Device(entity_id) => self.operate(&entity_id).await,
        }
    }

    async fn refresh(&self, message: Option<MessageRef>, transport: &dyn ChatTransport) -> String {
        let menu = match self.device_menu().await {
            Ok(Some(menu)) => menu,
            Ok(None) => return NO_DEVICES.to_string(),
            Err(e) => {
                error!(error = %e, "failed to list devices for refresh");
                return REFRESH_FAILED.to_string();
            }
        };

        if let Some(message) = message {
            if let Err(e) = transport.edit_menu(message, &menu).await {
                error!(error = %e, "failed to edit device menu");
                return EDIT_FAILED.to_string();
            }
        }
        DEVICES_REFRESHED.to_string()
    }

    async fn operate(&self, entity_id: &str) -> String {
        let device = match self.registry.get_device(entity_id).await {
            Ok(device) => device,
            Err(RegistryError::NotFound { .. }) => {
                debug!(entity_id, "device not registered");
                return DEVICE_NOT_FOUND.to_string();
            }
            Err(e) => {
                error!(entity_id, error = %e, "failed to look up device");
                return LOOKUP_FAILED.to_string();
            }
        };

        let action = device.kind().action();
        match action.apply(self.control.as_ref(), entity_id).await {
            Ok(()) => {
                info!(entity_id, %action, "device controlled");
                format!("✅ {} {}", device.name, action.verb())
            }
            Err(report) => {
                error!(entity_id, %action, error = %report, "device control failed");
                format!("❌ Failed to control {}", device.name)
            }
        }
    }
}
