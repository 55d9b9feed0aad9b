//! Optional periodic refresh

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::services::Canvas;

/// One refresh: new prompt, then a picture of it.
pub async fn refresh(canvas: &Canvas) -> Option<String> {
    let pair = canvas.create_prompt().await;
    if pair.prompt_out.starts_with("Error:") {
        warn!("Skipping image generation: {}", pair.prompt_out);
        return None;
    }
    canvas.paint(&pair.prompt_out).await
}

/// Runs [`refresh`] every `every`, starting straight away.
pub fn spawn_refresh(canvas: Canvas, every: Duration) -> JoinHandle<()> {
    info!("Refreshing the canvas every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let _ = refresh(&canvas).await;
        }
    })
}
