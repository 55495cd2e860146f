//! Device menu rendering.
//!
//! Every button carries a `control:` payload: either `control:<entity_id>`
//! or `control:refresh`.

use crate::device::Device;
use serde::{Deserialize, Serialize};

/// Namespace of device-control callback payloads.
pub const CONTROL_NAMESPACE: &str = "control:";

/// Payload suffix that re-reads the registry.
pub const REFRESH_TOKEN: &str = "refresh";

/// Heading of the device menu.
pub const MENU_HEADING: &str = "🏠 Home Assistant Devices:";

/// Label of the refresh button.
pub const REFRESH_LABEL: &str = "🔄 Refresh";

/// A button that sends a callback payload when tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    /// Button label.
    pub label: String,
    /// Callback payload.
    pub payload: String,
}

impl ActionButton {
    /// Creates a button.
    #[must_use]
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// A message with rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMenu {
    /// Message text above the buttons.
    pub text: String,
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<ActionButton>>,
}

/// Builds a `control:` payload.
#[must_use]
pub fn control_payload(suffix: &str) -> String {
    format!("{CONTROL_NAMESPACE}{suffix}")
}

/// Renders one row per device followed by the refresh row.
#[must_use]
pub fn render_device_menu(devices: &[Device]) -> ActionMenu {
    let mut rows: Vec<Vec<ActionButton>> = devices
        .iter()
        .map(|device| {
            vec![ActionButton::new(
                format!("{} {}", device.kind().icon(), device.name),
                control_payload(&device.entity_id),
            )]
        })
        .collect();
    rows.push(vec![ActionButton::new(
        REFRESH_LABEL,
        control_payload(REFRESH_TOKEN),
    )]);

    ActionMenu {
        text: MENU_HEADING.to_string(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_device_plus_refresh() {
        let devices = vec![
            Device::new("light.kitchen", "Kitchen"),
            Device::new("button.doorbell", "Doorbell"),
        ];
        let menu = render_device_menu(&devices);

        assert_eq!(menu.text, MENU_HEADING);
        assert_eq!(menu.rows.len(), 3);
        assert_eq!(
            menu.rows[0][0],
            ActionButton::new("💡 Kitchen", "control:light.kitchen")
        );
        assert_eq!(
            menu.rows[1][0],
            ActionButton::new("🔘 Doorbell", "control:button.doorbell")
        );
        assert_eq!(
            menu.rows[2][0],
            ActionButton::new("🔄 Refresh", "control:refresh")
        );
    }

    #[test]
    fn empty_list_renders_refresh_only() {
        let menu = render_device_menu(&[]);
        assert_eq!(menu.rows.len(), 1);
        assert_eq!(menu.rows[0][0].payload, "control:refresh");
    }
}
