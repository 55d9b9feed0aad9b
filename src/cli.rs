//! CLI parser
use clap::Parser;
use std::num::{NonZeroU16, NonZeroU64};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_GPT_MODEL, DEFAULT_HA_URL, DEFAULT_IMAGE_MODEL, DEFAULT_IMAGE_PATH,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_SUN_ENTITY, DEFAULT_WEATHER_ENTITY,
};

#[derive(Parser, Debug, Clone)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "WEATHERCANVAS_DEBUG")]
    /// Enable debug logging. Env: WEATHERCANVAS_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9100", env = "WEATHERCANVAS_PORT")]
    /// http listener, defaults to `9100`.
    /// Env: WEATHERCANVAS_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "WEATHERCANVAS_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: WEATHERCANVAS_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "WEATHERCANVAS_LOCATION")]
    /// Place name used in prompts. Falls back to Home Assistant's configured location name.
    /// Env: WEATHERCANVAS_LOCATION
    pub location_name: Option<String>,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// OpenAI API key. Env: OPENAI_API_KEY
    pub openai_api_key: Option<String>,
    #[clap(long, default_value = DEFAULT_OPENAI_BASE_URL, env = "OPENAI_BASE_URL")]
    /// Base URL of the OpenAI-compatible API. Env: OPENAI_BASE_URL
    pub openai_base_url: String,
    #[clap(long, default_value = DEFAULT_GPT_MODEL, env = "WEATHERCANVAS_GPT_MODEL")]
    /// Text model used to write the image prompt
    pub gpt_model_name: String,
    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "WEATHERCANVAS_IMAGE_MODEL")]
    /// Image model
    pub image_model_name: String,

    #[clap(long, default_value = DEFAULT_HA_URL, env = "HA_URL")]
    /// Home Assistant base URL. Env: HA_URL
    pub ha_url: String,
    #[clap(long, env = "HA_TOKEN", hide_env_values = true)]
    /// Home Assistant long-lived access token. Env: HA_TOKEN
    pub ha_token: Option<String>,
    #[clap(long, default_value = DEFAULT_WEATHER_ENTITY)]
    /// Weather entity to describe
    pub weather_entity: String,
    #[clap(long, default_value = DEFAULT_SUN_ENTITY)]
    /// Sun entity providing `next_rising` / `next_setting`
    pub sun_entity: String,

    #[clap(long, default_value = DEFAULT_IMAGE_PATH, env = "WEATHERCANVAS_IMAGE_PATH")]
    /// Where the latest image is written, eg `/config/www/dalle.png`.
    /// Env: WEATHERCANVAS_IMAGE_PATH
    pub image_path: PathBuf,

    #[clap(long, env = "WEATHERCANVAS_REFRESH_MINUTES")]
    /// Regenerate the prompt and image every N minutes. Off by default.
    pub refresh_minutes: Option<NonZeroU64>,
}
