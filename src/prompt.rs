//! Writes the image prompt with a chat completion model.
//!
//! The completion client is blocking (ureq) so every call is pushed onto tokio's blocking pool.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::OpenAiSettings;
use crate::constants::{
    COMPLETION_MAX_TOKENS, COMPLETION_TEMPERATURE, MISSING_API_KEY, NO_COMPLETION,
    PROMPT_SYSTEM_INSTRUCTION,
};
use crate::error::CanvasError;
use crate::season::Season;

/// Everything that goes into the prompt-writing request for one invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptContext<'a> {
    /// Where we are
    pub location: &'a str,
    /// Day or night phrase, eg "noon"
    pub time_phrase: &'a str,
    /// Current season
    pub season: Season,
    /// Output of the weather describer
    pub weather: &'a str,
}

impl PromptContext<'_> {
    /// "In {location}, it is {time} in {season}. {weather}"
    pub fn input(&self) -> String {
        format!(
            "In {}, it is {} in {}. {}",
            self.location, self.time_phrase, self.season, self.weather
        )
    }
}

/// A single chat message
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Body for POST /chat/completions
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChatRequest {
    /// Model name
    pub model: String,
    /// Ordered conversation
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion length cap
    pub max_tokens: u32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Repetition penalty
    pub frequency_penalty: f32,
    /// Topic penalty
    pub presence_penalty: f32,
}

impl ChatRequest {
    /// The image-prompt request for `input`
    pub fn image_prompt(model: &str, input: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage::new("system", PROMPT_SYSTEM_INSTRUCTION),
                ChatMessage::new("user", input),
            ],
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: COMPLETION_MAX_TOKENS,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Response from POST /chat/completions
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatResponse {
    /// Completion choices, usually one
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// One completion choice
#[derive(Clone, Debug, Deserialize)]
pub struct ChatChoice {
    /// The generated message
    pub message: ChoiceMessage,
}

/// Message inside a choice
#[derive(Clone, Debug, Deserialize)]
pub struct ChoiceMessage {
    /// Text, may be missing for refusals or tool calls
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Trimmed text of the first choice
    pub fn first_text(&self) -> Option<String> {
        let content = self.choices.first()?.message.content.as_deref()?;
        Some(content.trim().to_string())
    }
}

/// A blocking text completion backend.
pub trait TextCompleter: Send + Sync {
    /// Runs one completion. Blocks the calling thread.
    fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<ChatResponse, CanvasError>;
}

/// [`TextCompleter`] talking to an OpenAI compatible API with ureq
pub struct OpenAiCompleter {
    agent: ureq::Agent,
    endpoint: String,
}

impl OpenAiCompleter {
    /// Posts to `{base_url}/chat/completions`
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoint: settings.endpoint("chat/completions"),
        }
    }
}

const COMPLETION_SERVICE: &str = "text completion";

impl TextCompleter for OpenAiCompleter {
    fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<ChatResponse, CanvasError> {
        let body = serde_json::to_string(request)?;
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|err| CanvasError::from_ureq(COMPLETION_SERVICE, err))?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| CanvasError::from_ureq(COMPLETION_SERVICE, err))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Turns a [`PromptContext`] into an image prompt.
#[derive(Clone)]
pub struct PromptComposer {
    settings: OpenAiSettings,
    completer: Arc<dyn TextCompleter>,
}

impl PromptComposer {
    /// Composer using `completer` for the model call
    pub fn new(settings: OpenAiSettings, completer: Arc<dyn TextCompleter>) -> Self {
        Self {
            settings,
            completer,
        }
    }

    /// Composer backed by the OpenAI API
    pub fn openai(settings: OpenAiSettings) -> Self {
        let completer = Arc::new(OpenAiCompleter::new(&settings));
        Self::new(settings, completer)
    }

    /// Runs the completion, keeping failures typed.
    ///
    /// `Ok(None)` means the model answered without any usable text.
    pub async fn try_create(&self, input: &str) -> Result<Option<String>, CanvasError> {
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or(CanvasError::MissingApiKey)?;
        let request = ChatRequest::image_prompt(&self.settings.chat_model, input);
        let completer = self.completer.clone();
        let response =
            tokio::task::spawn_blocking(move || completer.complete(&api_key, &request)).await??;
        Ok(response.first_text())
    }

    /// The image prompt for `input`, or an `Error: ...` string. Never fails.
    pub async fn create(&self, input: &str) -> String {
        match self.try_create(input).await {
            Ok(Some(prompt)) => {
                debug!("Image prompt: {prompt}");
                prompt
            }
            Ok(None) => {
                error!("Completion returned no choices");
                NO_COMPLETION.to_string()
            }
            Err(CanvasError::MissingApiKey) => {
                error!("OpenAI API key is not configured.");
                MISSING_API_KEY.to_string()
            }
            Err(err) => {
                error!("Error calling OpenAI API: {err}");
                format!("Error: {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use serde_json::json;
    use url::Url;

    enum Reply {
        Text(&'static str),
        NoChoices,
        Fail,
    }

    struct FakeCompleter {
        reply: Reply,
        calls: AtomicUsize,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl FakeCompleter {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    impl TextCompleter for FakeCompleter {
        fn complete(
            &self,
            api_key: &str,
            request: &ChatRequest,
        ) -> Result<ChatResponse, CanvasError> {
            assert_eq!(api_key, "sk-test");
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match self.reply {
                Reply::Text(text) => Ok(serde_json::from_value(json!({
                    "choices": [{"message": {"role": "assistant", "content": text}}]
                }))?),
                Reply::NoChoices => Ok(ChatResponse::default()),
                Reply::Fail => Err(CanvasError::UpstreamStatus {
                    service: "text completion",
                    status: 500,
                }),
            }
        }
    }

    fn settings(api_key: Option<&str>) -> OpenAiSettings {
        OpenAiSettings {
            api_key: api_key.map(str::to_string),
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            chat_model: "gpt-3.5-turbo".to_string(),
            image_model: "dall-e-3".to_string(),
        }
    }

    #[test]
    fn input_reads_like_a_sentence() {
        let context = PromptContext {
            location: "Springfield",
            time_phrase: "noon",
            season: Season::Summer,
            weather: "It's a sunny day with a temperature of 25°C. A few wisps of clouds dot the sky.",
        };
        assert_eq!(
            context.input(),
            "In Springfield, it is noon in Summer. It's a sunny day with a temperature of 25°C. A few wisps of clouds dot the sky."
        );
    }

    #[test]
    fn request_carries_system_instruction_first() {
        let request = ChatRequest::image_prompt("gpt-4o", "In Paris");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], PROMPT_SYSTEM_INSTRUCTION);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "In Paris");
        assert_eq!(body["max_tokens"], 256);
    }

    #[tokio::test]
    async fn missing_key_never_calls_out() {
        let fake = FakeCompleter::new(Reply::Text("unused"));
        let composer = PromptComposer::new(settings(None), fake.clone());
        assert_eq!(
            composer.create("In Springfield").await,
            "Error: OpenAI API key is not configured."
        );
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn returns_trimmed_first_choice() {
        let fake = FakeCompleter::new(Reply::Text("  A sunlit town square, oil painting.\n"));
        let composer = PromptComposer::new(settings(Some("sk-test")), fake.clone());
        assert_eq!(
            composer.create("In Springfield").await,
            "A sunlit town square, oil painting."
        );
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        let request = fake.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages[1].content, "In Springfield");
    }

    #[tokio::test]
    async fn empty_choices_give_no_response_error() {
        let composer =
            PromptComposer::new(settings(Some("sk-test")), FakeCompleter::new(Reply::NoChoices));
        assert_eq!(composer.create("x").await, "Error: No response from ChatGPT.");
    }

    #[tokio::test]
    async fn failures_become_error_strings() {
        let composer =
            PromptComposer::new(settings(Some("sk-test")), FakeCompleter::new(Reply::Fail));
        assert_eq!(
            composer.create("x").await,
            "Error: text completion returned HTTP 500"
        );
    }

    struct SlowCompleter {
        finished: AtomicBool,
    }

    impl TextCompleter for SlowCompleter {
        fn complete(
            &self,
            _api_key: &str,
            _request: &ChatRequest,
        ) -> Result<ChatResponse, CanvasError> {
            std::thread::sleep(Duration::from_millis(300));
            self.finished.store(true, Ordering::SeqCst);
            Ok(serde_json::from_value(json!({
                "choices": [{"message": {"content": "A slow painting."}}]
            }))?)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn slow_completion_leaves_the_runtime_free() {
        let slow = Arc::new(SlowCompleter {
            finished: AtomicBool::new(false),
        });
        let composer = PromptComposer::new(settings(Some("sk-test")), slow.clone());
        let watcher = slow.clone();
        let ticker = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            watcher.finished.load(Ordering::SeqCst)
        });

        assert_eq!(composer.create("x").await, "A slow painting.");
        assert!(
            !ticker.await.expect("ticker"),
            "ticker only ran after the completion returned"
        );
    }

    async fn spawn_chat_server(status: StatusCode, body: &'static str) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move { (status, body).into_response() }),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}/v1")).expect("url")
    }

    fn openai_composer(base_url: Url) -> PromptComposer {
        PromptComposer::openai(OpenAiSettings {
            base_url,
            ..settings(Some("sk-test"))
        })
    }

    #[tokio::test]
    async fn server_error_becomes_error_string() {
        let base = spawn_chat_server(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        assert_eq!(
            openai_composer(base).create("In Springfield").await,
            "Error: text completion returned HTTP 500"
        );
    }

    #[tokio::test]
    async fn undecodable_reply_becomes_error_string() {
        let base = spawn_chat_server(StatusCode::OK, "not json at all").await;
        let composer = openai_composer(base);
        assert!(matches!(
            composer.try_create("In Springfield").await,
            Err(CanvasError::Decode(_))
        ));
        let text = composer.create("In Springfield").await;
        assert!(
            text.starts_with("Error: Failed to decode response: "),
            "{text}"
        );
    }

    #[test]
    fn system_instruction_is_kept_word_for_word() {
        assert!(
            PROMPT_SYSTEM_INSTRUCTION.starts_with("Create a succinct DALL-E prompt under 100 words")
        );
        assert!(
            PROMPT_SYSTEM_INSTRUCTION.contains("weather effects, folkore or cultural features")
        );
    }
}
