use clap::Parser;
use tracing::{error, info, warn};
use weathercanvas::cli::CliOptions;
use weathercanvas::config::{CanvasConfig, setup_logging};
use weathercanvas::display::{DisplayHub, Displays};
use weathercanvas::homeassistant::HomeAssistantClient;
use weathercanvas::services::Canvas;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = CliOptions::parse();

    if let Err(err) = setup_logging(cli.debug) {
        eprintln!("Logging setup failed: {err}");
        return;
    }

    let mut config = match CanvasConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return;
        }
    };

    if config.openai.api_key.is_none() {
        warn!("No OpenAI API key configured, prompt and image generation will fail");
    }

    if config.location_name.is_none() {
        let ha = HomeAssistantClient::new(config.home_assistant.clone());
        match ha.fetch_location_name().await {
            Ok(Some(name)) => {
                info!("Using Home Assistant location name {name:?}");
                config.location_name = Some(name);
            }
            Ok(None) => warn!("Home Assistant has no location name configured"),
            Err(err) => warn!("Couldn't read location name from Home Assistant: {err}"),
        }
    }

    let refresh_interval = config.refresh_interval;
    let hub = DisplayHub::default();
    let displays = Displays::default();
    let _listener = displays.spawn_listener(&hub);
    let canvas = Canvas::from_config(config, hub, displays);

    if let Some(every) = refresh_interval {
        let _refresh = weathercanvas::scheduler::spawn_refresh(canvas.clone(), every);
    }

    if let Err(err) = weathercanvas::web::setup_server(&cli.listen_address, cli.port, canvas).await
    {
        error!("Application error: {}", err);
    }
}
