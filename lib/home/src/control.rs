//! Home-automation control capability.

use crate::device::DeviceAction;
use crate::error::ControlError;
use async_trait::async_trait;
use chatdeck_core::{Result, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current state of an entity as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Entity id.
    pub entity_id: String,
    /// State value, e.g. `on` or `off`.
    pub state: String,
    /// Entity attributes.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Operations on home-automation entities.
#[async_trait]
pub trait HomeControl: Send + Sync {
    /// Turns an entity on.
    async fn turn_on(&self, entity_id: &str) -> Result<(), ControlError>;

    /// Turns an entity off.
    async fn turn_off(&self, entity_id: &str) -> Result<(), ControlError>;

    /// Toggles an entity.
    async fn toggle(&self, entity_id: &str) -> Result<(), ControlError>;

    /// Presses a button entity.
    async fn press(&self, entity_id: &str) -> Result<(), ControlError>;

    /// Reads an entity's state.
    async fn get_state(&self, entity_id: &str) -> Result<EntityState, ControlError>;
}

impl DeviceAction {
    /// Performs this action on `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns the control error unchanged.
    pub async fn apply(&self, control: &dyn HomeControl, entity_id: &str) -> Result<(), ControlError> {
        match self {
            Self::Toggle => control.toggle(entity_id).await,
            Self::Press => control.press(entity_id).await,
        }
    }
}

/// Wraps a control with a bounded retry policy for transient failures.
///
/// Only idempotent calls are retried. `toggle` and `press` go through once:
/// a request that timed out may already have been applied, and sending it
/// again would undo or repeat it.
pub struct RetryingControl<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: HomeControl> RetryingControl<C> {
    /// Wraps `inner`.
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: HomeControl> HomeControl for RetryingControl<C> {
    async fn turn_on(&self, entity_id: &str) -> Result<(), ControlError> {
        self.policy
            .run("turn_on", || self.inner.turn_on(entity_id))
            .await
    }

    async fn turn_off(&self, entity_id: &str) -> Result<(), ControlError> {
        self.policy
            .run("turn_off", || self.inner.turn_off(entity_id))
            .await
    }

    async fn toggle(&self, entity_id: &str) -> Result<(), ControlError> {
        self.inner.toggle(entity_id).await
    }

    async fn press(&self, entity_id: &str) -> Result<(), ControlError> {
        self.inner.press(entity_id).await
    }

    async fn get_state(&self, entity_id: &str) -> Result<EntityState, ControlError> {
        self.policy
            .run("get_state", || self.inner.get_state(entity_id))
            .await
    }
}
