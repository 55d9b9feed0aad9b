//! Read-only access to Home Assistant entity state over its REST API.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{HomeAssistantSettings, join_url};
use crate::daypart::SunPosition;
use crate::error::CanvasError;

/// Boxed future returned by [`StateSource`]
pub type StateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<EntityState>, CanvasError>> + Send + 'a>>;

/// State of a single entity as returned by `GET /api/states/{entity_id}`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EntityState {
    /// eg `weather.forecast_home`
    pub entity_id: String,
    /// eg `sunny`, `above_horizon`
    pub state: String,
    /// Loosely typed attribute map
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    /// Attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Reads the sun entity; `None` if the rise/set attributes are missing or unparseable.
    pub fn sun_position(&self) -> Option<SunPosition> {
        Some(SunPosition {
            is_day: self.state == "above_horizon",
            next_rising: self.timestamp("next_rising")?,
            next_setting: self.timestamp("next_setting")?,
        })
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.attribute(name)?.as_str()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                debug!("Couldn't parse {}.{name}={raw}: {err}", self.entity_id);
                None
            }
        }
    }
}

/// Something that can look up entity state.
pub trait StateSource: Send + Sync {
    /// `Ok(None)` when the entity doesn't exist.
    fn entity_state<'a>(&'a self, entity_id: &'a str) -> StateFuture<'a>;
}

/// [`StateSource`] backed by the Home Assistant REST API
#[derive(Clone, Debug)]
pub struct HomeAssistantClient {
    http: reqwest::Client,
    settings: HomeAssistantSettings,
}

#[derive(Deserialize)]
struct ApiConfig {
    #[serde(default)]
    location_name: Option<String>,
}

impl HomeAssistantClient {
    /// New client with its own connection pool
    pub fn new(settings: HomeAssistantSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(join_url(&self.settings.base_url, path));
        match self.settings.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetches one entity.
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<EntityState>, CanvasError> {
        let response = self.get(&format!("api/states/{entity_id}")).send().await?;
        let status = response.status();
        debug!("GET state {entity_id}: {status}");
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CanvasError::UpstreamStatus {
                service: "Home Assistant",
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// The `location_name` from Home Assistant's core config, if set.
    pub async fn fetch_location_name(&self) -> Result<Option<String>, CanvasError> {
        let response = self.get("api/config").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CanvasError::UpstreamStatus {
                service: "Home Assistant",
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        let config: ApiConfig = serde_json::from_slice(&bytes)?;
        Ok(config.location_name.filter(|name| !name.trim().is_empty()))
    }
}

impl StateSource for HomeAssistantClient {
    fn entity_state<'a>(&'a self, entity_id: &'a str) -> StateFuture<'a> {
        Box::pin(self.get_state(entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use serde_json::json;
    use url::Url;

    fn sun_state(state: &str) -> EntityState {
        serde_json::from_value(json!({
            "entity_id": "sun.sun",
            "state": state,
            "attributes": {
                "next_rising": "2024-07-16T04:12:30.123456+00:00",
                "next_setting": "2024-07-15T19:45:00+00:00",
                "elevation": 42.1
            }
        }))
        .expect("entity state")
    }

    #[test]
    fn parses_sun_entity() {
        let sun = sun_state("above_horizon").sun_position().expect("sun");
        assert!(sun.is_day);
        assert_eq!(sun.next_setting.to_rfc3339(), "2024-07-15T19:45:00+00:00");

        let night = sun_state("below_horizon").sun_position().expect("sun");
        assert!(!night.is_day);
    }

    #[test]
    fn sun_without_times_is_none() {
        let state = EntityState {
            entity_id: "sun.sun".to_string(),
            state: "above_horizon".to_string(),
            attributes: Map::new(),
        };
        assert!(state.sun_position().is_none());
    }

    async fn state_handler(Path(entity_id): Path<String>, headers: HeaderMap) -> impl IntoResponse {
        let authorized = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer secret");
        if !authorized {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        if entity_id == "weather.forecast_home" {
            axum::Json(json!({
                "entity_id": entity_id,
                "state": "rainy",
                "attributes": {"temperature": 12.5, "cloud_coverage": 80}
            }))
            .into_response()
        } else {
            axum::http::StatusCode::NOT_FOUND.into_response()
        }
    }

    async fn spawn_fake_ha() -> Url {
        let app = Router::new()
            .route("/api/states/{entity_id}", get(state_handler))
            .route(
                "/api/config",
                get(|| async { axum::Json(json!({"location_name": "Springfield"})) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}")).expect("url")
    }

    fn client(base_url: Url, token: Option<&str>) -> HomeAssistantClient {
        HomeAssistantClient::new(HomeAssistantSettings {
            base_url,
            token: token.map(str::to_string),
            weather_entity: "weather.forecast_home".to_string(),
            sun_entity: "sun.sun".to_string(),
        })
    }

    #[tokio::test]
    async fn fetches_entity_state() {
        let ha = client(spawn_fake_ha().await, Some("secret"));
        let state = ha
            .entity_state("weather.forecast_home")
            .await
            .expect("request")
            .expect("entity");
        assert_eq!(state.state, "rainy");
        assert_eq!(state.attribute("cloud_coverage"), Some(&json!(80)));
    }

    #[tokio::test]
    async fn missing_entity_is_none() {
        let ha = client(spawn_fake_ha().await, Some("secret"));
        let state = ha.entity_state("weather.nowhere").await.expect("request");
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn rejected_token_is_upstream_error() {
        let ha = client(spawn_fake_ha().await, None);
        let err = ha
            .entity_state("weather.forecast_home")
            .await
            .expect_err("unauthorized");
        assert!(matches!(
            err,
            CanvasError::UpstreamStatus { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn reads_location_name() {
        let ha = client(spawn_fake_ha().await, Some("secret"));
        assert_eq!(
            ha.fetch_location_name().await.expect("config").as_deref(),
            Some("Springfield")
        );
    }
}
