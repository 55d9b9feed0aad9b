//! Config handling

use std::path::PathBuf;
use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::CliOptions;
use crate::error::CanvasError;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("ureq", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// OpenAI credentials and model choices
#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    /// `None` when no (or a blank) key was given
    pub api_key: Option<String>,
    /// API root, eg `https://api.openai.com/v1`
    pub base_url: Url,
    /// Model used by the prompt composer
    pub chat_model: String,
    /// Model used by the image fetcher
    pub image_model: String,
}

impl OpenAiSettings {
    /// Builds `{base}/{path}`
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Where to find Home Assistant and which entities to read
#[derive(Clone, Debug)]
pub struct HomeAssistantSettings {
    /// eg `http://homeassistant.local:8123`
    pub base_url: Url,
    /// Long-lived access token
    pub token: Option<String>,
    /// Weather entity id
    pub weather_entity: String,
    /// Sun entity id
    pub sun_entity: String,
}

/// Everything the handlers need, passed around explicitly.
#[derive(Clone, Debug)]
pub struct CanvasConfig {
    /// Place name used in prompts
    pub location_name: Option<String>,
    /// OpenAI settings
    pub openai: OpenAiSettings,
    /// Home Assistant settings
    pub home_assistant: HomeAssistantSettings,
    /// Fixed path the latest image is written to
    pub image_path: PathBuf,
    /// Periodic refresh, if any
    pub refresh_interval: Option<Duration>,
}

impl CanvasConfig {
    /// Validates and converts parsed CLI options.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, CanvasError> {
        Ok(Self {
            location_name: non_blank(cli.location_name.as_deref()),
            openai: OpenAiSettings {
                api_key: non_blank(cli.openai_api_key.as_deref()),
                base_url: Url::parse(&cli.openai_base_url)?,
                chat_model: cli.gpt_model_name.clone(),
                image_model: cli.image_model_name.clone(),
            },
            home_assistant: HomeAssistantSettings {
                base_url: Url::parse(&cli.ha_url)?,
                token: non_blank(cli.ha_token.as_deref()),
                weather_entity: cli.weather_entity.clone(),
                sun_entity: cli.sun_entity.clone(),
            },
            image_path: cli.image_path.clone(),
            refresh_interval: cli
                .refresh_minutes
                .map(|minutes| Duration::from_secs(minutes.get().saturating_mul(60))),
        })
    }
}

pub(crate) fn join_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
