//! Shared constants for things
//!

/// Default OpenAI API root
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default text model for prompt writing
pub const DEFAULT_GPT_MODEL: &str = "gpt-3.5-turbo";

/// Default image model
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Default Home Assistant address
pub const DEFAULT_HA_URL: &str = "http://homeassistant.local:8123";

/// Default weather entity
pub const DEFAULT_WEATHER_ENTITY: &str = "weather.forecast_home";

/// Default sun entity
pub const DEFAULT_SUN_ENTITY: &str = "sun.sun";

/// The default place we put the latest image
pub const DEFAULT_IMAGE_PATH: &str = "./www/dalle.png";

/// Used when neither the CLI nor Home Assistant provide a place name
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Image size requested from the image model
pub const IMAGE_SIZE: &str = "1024x1024";

/// Placeholder published by the `load_test_image` service
pub const TEST_IMAGE_URL: &str = "https://via.placeholder.com/300.png?text=Dalle+Test";

/// Returned when the sun position can't be placed in a segment
pub const UNKNOWN_TIME: &str = "Unknown time";

/// Returned when the weather entity is missing
pub const WEATHER_UNAVAILABLE: &str = "Weather data could not be retrieved.";

/// Returned when no API key is configured
pub const MISSING_API_KEY: &str = "Error: OpenAI API key is not configured.";

/// Returned when the completion has no usable choice
pub const NO_COMPLETION: &str = "Error: No response from ChatGPT.";

/// System instruction for the prompt-writing model
pub const PROMPT_SYSTEM_INSTRUCTION: &str = "Create a succinct DALL-E prompt under 100 words, that will create an artistic image, focusing on the most visually striking aspects of the given city/region, weather, and time of day. Highlight key elements that define the scene's character, such as specific landmarks, weather effects, folkore or cultural features, in a direct and vivid manner. Avoid elaborate descriptions; instead, aim for a prompt that vividly captures the essence of the scene in a concise format, suitable for generating a distinct and compelling image.";

/// Sampling settings for the completion request
pub const COMPLETION_TEMPERATURE: f32 = 1.0;
/// Token cap for the completion request
pub const COMPLETION_MAX_TOKENS: u32 = 256;

/// Cache-Control for the camera image, it changes whenever a new image lands
pub const CAMERA_CACHE_CONTROL: &str = "no-cache";

/// Buffered display updates before slow listeners start dropping them
pub const DISPLAY_CHANNEL_CAPACITY: usize = 16;
