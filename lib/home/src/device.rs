//! Device model.
//!
//! A device's type is the domain prefix of its entity id
//! (`light.kitchen` is a `light`). The type decides the menu icon and the
//! action a tap triggers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of devices with dedicated handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// `light.*`
    Light,
    /// `switch.*`
    Switch,
    /// `button.*`
    Button,
    /// Any other domain.
    Other,
}

impl DeviceKind {
    /// Classifies a device type.
    #[must_use]
    pub fn from_type(device_type: &str) -> Self {
        match device_type {
            "light" => Self::Light,
            "switch" => Self::Switch,
            "button" => Self::Button,
            _ => Self::Other,
        }
    }

    /// Menu icon.
    #[must_use]
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Light => "💡",
            Self::Switch => "🔌",
            Self::Button => "🔘",
            Self::Other => "📱",
        }
    }

    /// Action triggered by tapping the device.
    #[must_use]
    pub fn action(&self) -> DeviceAction {
        match self {
            Self::Button => DeviceAction::Press,
            Self::Light | Self::Switch | Self::Other => DeviceAction::Toggle,
        }
    }
}

/// Action performed on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    /// Flip on/off.
    Toggle,
    /// Press a button entity.
    Press,
}

impl DeviceAction {
    /// Past-tense verb used in acknowledgements.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Toggle => "toggled",
            Self::Press => "pressed",
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toggle => write!(f, "toggle"),
            Self::Press => write!(f, "press"),
        }
    }
}

/// Returns the domain prefix of an entity id, or the whole id if it has no `.`.
#[must_use]
pub fn device_type(entity_id: &str) -> &str {
    entity_id
        .split_once('.')
        .map_or(entity_id, |(domain, _)| domain)
}

/// A controllable device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Home Assistant entity id, e.g. `light.kitchen`.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// When the device was registered.
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Creates a device registered now.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Domain prefix of the entity id.
    #[must_use]
    pub fn device_type(&self) -> &str {
        device_type(&self.entity_id)
    }

    /// Kind derived from the device type.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        DeviceKind::from_type(self.device_type())
    }
}
