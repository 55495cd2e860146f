//! Home Assistant REST client.

use crate::control::{EntityState, HomeControl};
use crate::device::device_type;
use crate::error::ControlError;
use async_trait::async_trait;
use chatdeck_core::Result;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Request timeout for every Home Assistant call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ServiceRequest<'a> {
    entity_id: &'a str,
}

/// Client for the Home Assistant REST API.
#[derive(Clone)]
pub struct HomeAssistantClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantClient {
    /// Creates a client for `base_url` authenticated with a long-lived token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ControlError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ControlError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
    ) -> Result<(), ControlError> {
        let response = self
            .http
            .post(self.url(&service_path(domain, service)))
            .bearer_auth(&self.token)
            .json(&ServiceRequest { entity_id })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        check_status(response).await?;
        debug!(domain, service, entity_id, "service called");
        Ok(())
    }
}

/// Path of a service call.
fn service_path(domain: &str, service: &str) -> String {
    format!("/api/services/{domain}/{service}")
}

fn transport_error(e: &reqwest::Error) -> ControlError {
    if e.is_timeout() {
        ControlError::Timeout
    } else {
        ControlError::ConnectionFailed {
            reason: e.to_string(),
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ControlError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ControlError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    }
    .into())
}

#[async_trait]
impl HomeControl for HomeAssistantClient {
    #[instrument(skip(self))]
    async fn turn_on(&self, entity_id: &str) -> Result<(), ControlError> {
        self.call_service(device_type(entity_id), "turn_on", entity_id)
            .await
    }

    #[instrument(skip(self))]
    async fn turn_off(&self, entity_id: &str) -> Result<(), ControlError> {
        self.call_service(device_type(entity_id), "turn_off", entity_id)
            .await
    }

    #[instrument(skip(self))]
    async fn toggle(&self, entity_id: &str) -> Result<(), ControlError> {
        self.call_service(device_type(entity_id), "toggle", entity_id)
            .await
    }

    #[instrument(skip(self))]
    async fn press(&self, entity_id: &str) -> Result<(), ControlError> {
        self.call_service("button", "press", entity_id).await
    }

    #[instrument(skip(self))]
    async fn get_state(&self, entity_id: &str) -> Result<EntityState, ControlError> {
        let response = self
            .http
            .get(self.url(&format!("/api/states/{entity_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let response = check_status(response).await?;
        let state = response
            .json::<EntityState>()
            .await
            .map_err(|e| ControlError::InvalidResponse {
                reason: e.to_string(),
            })?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_paths_use_entity_domain() {
        assert_eq!(
            service_path(device_type("light.kitchen"), "toggle"),
            "/api/services/light/toggle"
        );
        assert_eq!(
            service_path(device_type("switch.fan"), "turn_off"),
            "/api/services/switch/turn_off"
        );
        assert_eq!(service_path("button", "press"), "/api/services/button/press");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HomeAssistantClient::new("http://ha.local:8123/", "token").expect("client");
        assert_eq!(
            client.url("/api/states/light.kitchen"),
            "http://ha.local:8123/api/states/light.kitchen"
        );
    }

    #[test]
    fn state_payload_decodes() {
        let state: EntityState = serde_json::from_str(
            r#"{"entity_id":"light.kitchen","state":"on","attributes":{"brightness":255}}"#,
        )
        .expect("decode");
        assert_eq!(state.state, "on");
        assert_eq!(state.attributes["brightness"], serde_json::json!(255));
    }
}
