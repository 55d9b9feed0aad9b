//! The prompt sensor and the camera, fed by a broadcast channel.
//!
//! Producers publish [`DisplayUpdate`]s and forget about them. Each subscriber gets every update
//! at most once; one that falls behind skips what it missed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::DISPLAY_CHANNEL_CAPACITY;

/// What went into and came out of the prompt writer
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PromptPair {
    /// Composed description sent to the model
    pub prompt_in: String,
    /// The model's image prompt (or an `Error: ...` string)
    pub prompt_out: String,
}

/// Something for the displays to show
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayUpdate {
    /// New prompt pair for the sensor
    Prompt(PromptPair),
    /// New image URL for the camera
    Image(String),
}

/// Latest prompt, like a sensor entity with attributes
#[derive(Clone, Debug, Default, Serialize)]
pub struct PromptSensor {
    /// Last prompt pair, if any
    #[serde(flatten)]
    pub prompt: Option<PromptPair>,
    /// When it last changed
    pub updated_at: Option<DateTime<Utc>>,
}

impl PromptSensor {
    /// The last image prompt, if there is a non-empty one
    pub fn prompt_out(&self) -> Option<&str> {
        self.prompt
            .as_ref()
            .map(|pair| pair.prompt_out.as_str())
            .filter(|prompt| !prompt.trim().is_empty())
    }
}

/// Latest image URL, like a camera entity
#[derive(Clone, Debug, Default, Serialize)]
pub struct CameraState {
    /// Remote URL of the last image
    pub image_url: Option<String>,
    /// When it last changed
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sending side of the display channel
#[derive(Clone, Debug)]
pub struct DisplayHub {
    sender: broadcast::Sender<DisplayUpdate>,
}

impl Default for DisplayHub {
    fn default() -> Self {
        Self::new(DISPLAY_CHANNEL_CAPACITY)
    }
}

impl DisplayHub {
    /// Hub buffering up to `capacity` updates per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire and forget. Returns how many subscribers will see it.
    pub fn publish(&self, update: DisplayUpdate) -> usize {
        match self.sender.send(update) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Display update dropped, nobody is listening");
                0
            }
        }
    }

    /// New subscription, sees updates published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayUpdate> {
        self.sender.subscribe()
    }
}

/// Shared view of the sensor and camera
#[derive(Clone, Debug, Default)]
pub struct Displays {
    sensor: Arc<RwLock<PromptSensor>>,
    camera: Arc<RwLock<CameraState>>,
}

impl Displays {
    /// Applies one update
    pub async fn apply(&self, update: DisplayUpdate) {
        let now = Utc::now();
        match update {
            DisplayUpdate::Prompt(pair) => {
                let mut sensor = self.sensor.write().await;
                sensor.prompt = Some(pair);
                sensor.updated_at = Some(now);
            }
            DisplayUpdate::Image(url) => {
                let mut camera = self.camera.write().await;
                camera.image_url = Some(url);
                camera.updated_at = Some(now);
            }
        }
    }

    /// Snapshot of the prompt sensor
    pub async fn prompt(&self) -> PromptSensor {
        self.sensor.read().await.clone()
    }

    /// Snapshot of the camera
    pub async fn camera(&self) -> CameraState {
        self.camera.read().await.clone()
    }

    /// Applies updates from `receiver` until every sender is gone.
    pub async fn listen(&self, mut receiver: broadcast::Receiver<DisplayUpdate>) {
        loop {
            match receiver.recv().await {
                Ok(update) => self.apply(update).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Display listener lagged, skipped {skipped} updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Runs [`Self::listen`] on its own task.
    pub fn spawn_listener(&self, hub: &DisplayHub) -> JoinHandle<()> {
        let displays = self.clone();
        let receiver = hub.subscribe();
        tokio::spawn(async move { displays.listen(receiver).await })
    }
}
