//! The invokable operations: write a prompt, paint it, or show a test card.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, error, info};

use crate::config::CanvasConfig;
use crate::constants::{TEST_IMAGE_URL, UNKNOWN_LOCATION, UNKNOWN_TIME};
use crate::display::{DisplayHub, DisplayUpdate, Displays, PromptPair};
use crate::homeassistant::{EntityState, HomeAssistantClient, StateSource};
use crate::image_fetcher::ImageFetcher;
use crate::prompt::{PromptComposer, PromptContext};
use crate::season::Season;
use crate::weather::describe_weather;

/// Wires the pipeline stages to the host state and the displays.
#[derive(Clone)]
pub struct Canvas {
    config: Arc<CanvasConfig>,
    states: Arc<dyn StateSource>,
    composer: PromptComposer,
    fetcher: ImageFetcher,
    hub: DisplayHub,
    displays: Displays,
}

impl Canvas {
    /// Canvas from explicit parts
    pub fn new(
        config: Arc<CanvasConfig>,
        states: Arc<dyn StateSource>,
        composer: PromptComposer,
        fetcher: ImageFetcher,
        hub: DisplayHub,
        displays: Displays,
    ) -> Self {
        Self {
            config,
            states,
            composer,
            fetcher,
            hub,
            displays,
        }
    }

    /// Canvas talking to the real Home Assistant and OpenAI.
    pub fn from_config(config: CanvasConfig, hub: DisplayHub, displays: Displays) -> Self {
        let states = Arc::new(HomeAssistantClient::new(config.home_assistant.clone()));
        let composer = PromptComposer::openai(config.openai.clone());
        let fetcher = ImageFetcher::new(config.openai.clone(), config.image_path.clone());
        Self::new(Arc::new(config), states, composer, fetcher, hub, displays)
    }

    /// Shared configuration
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Display state this canvas reads from
    pub fn displays(&self) -> &Displays {
        &self.displays
    }

    /// Place name used in prompts
    pub fn location(&self) -> &str {
        self.config
            .location_name
            .as_deref()
            .unwrap_or(UNKNOWN_LOCATION)
    }

    async fn entity(&self, entity_id: &str) -> Option<EntityState> {
        match self.states.entity_state(entity_id).await {
            Ok(Some(state)) => Some(state),
            Ok(None) => {
                error!("Entity {entity_id} not found");
                None
            }
            Err(err) => {
                error!("Failed to read {entity_id}: {err}");
                None
            }
        }
    }

    /// Day or night phrase for `now`, "Unknown time" when the sun can't tell us.
    pub async fn time_phrase(&self, now: DateTime<Utc>) -> &'static str {
        let sun_entity = &self.config.home_assistant.sun_entity;
        let Some(sun) = self
            .entity(sun_entity)
            .await
            .and_then(|state| state.sun_position())
        else {
            error!("Sun position could not be retrieved from {sun_entity}");
            return UNKNOWN_TIME;
        };
        sun.describe(now)
    }

    /// Weather sentence, or the fixed "could not be retrieved" text.
    pub async fn weather_sentence(&self) -> String {
        let weather = self
            .entity(&self.config.home_assistant.weather_entity)
            .await;
        describe_weather(weather.as_ref())
    }

    /// The description handed to the prompt writer, as of `now`.
    pub async fn prompt_input(&self, now: DateTime<Utc>) -> String {
        let time_phrase = self.time_phrase(now).await;
        let season = Season::of(&now.with_timezone(&Local));
        let weather = self.weather_sentence().await;
        PromptContext {
            location: self.location(),
            time_phrase,
            season,
            weather: &weather,
        }
        .input()
    }

    /// Writes a new image prompt and pushes it to the prompt sensor.
    pub async fn create_prompt(&self) -> PromptPair {
        let prompt_in = self.prompt_input(Utc::now()).await;
        debug!("{prompt_in}");
        let prompt_out = self.composer.create(&prompt_in).await;
        let pair = PromptPair {
            prompt_in,
            prompt_out,
        };
        self.hub.publish(DisplayUpdate::Prompt(pair.clone()));
        pair
    }

    /// Paints the prompt currently on the sensor. Returns the remote image URL.
    pub async fn create_image(&self) -> Option<String> {
        let sensor = self.displays.prompt().await;
        let Some(prompt) = sensor.prompt_out() else {
            error!("No prompt found for image generation");
            return None;
        };
        self.paint(prompt).await
    }

    /// Paints `prompt` and pushes the result to the camera.
    pub async fn paint(&self, prompt: &str) -> Option<String> {
        let image_url = self.fetcher.fetch(prompt).await?;
        self.hub.publish(DisplayUpdate::Image(image_url.clone()));
        Some(image_url)
    }

    /// Puts a placeholder on the camera.
    pub fn load_test_image(&self) {
        info!("Loading test image");
        self.hub
            .publish(DisplayUpdate::Image(TEST_IMAGE_URL.to_string()));
    }
}
