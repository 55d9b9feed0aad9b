//! Generates the picture and caches it on disk.

use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::OpenAiSettings;
use crate::constants::IMAGE_SIZE;
use crate::error::CanvasError;

/// Request body for POST /images/generations
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    prompt: &'a str,
    n: u8,
    model: &'a str,
    size: &'a str,
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// Best guess at the MIME type of image bytes
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Calls the image API and writes the result to a fixed path.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    http: reqwest::Client,
    settings: OpenAiSettings,
    output_path: PathBuf,
}

impl ImageFetcher {
    /// Fetcher writing to `output_path`
    pub fn new(settings: OpenAiSettings, output_path: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            output_path: output_path.into(),
        }
    }

    /// Where images land
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Generates, downloads and stores an image, returning the remote URL.
    ///
    /// The returned URL is the service's copy, which may expire; the persisted copy lives at
    /// [`Self::output_path`].
    pub async fn generate(&self, prompt: &str) -> Result<String, CanvasError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(CanvasError::MissingApiKey)?;

        let payload = ImagesGenerateRequest {
            prompt,
            n: 1,
            model: &self.settings.image_model,
            size: IMAGE_SIZE,
        };
        debug!("Payload for image API: {payload:?}");

        let response = self
            .http
            .post(self.settings.endpoint("images/generations"))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        debug!("Received response status: {status}");
        if status != StatusCode::OK {
            return Err(CanvasError::UpstreamStatus {
                service: "image generation",
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        let parsed: ImagesGenerateResponse = serde_json::from_slice(&body)?;

        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or(CanvasError::MissingImageData)?;
        let image_url = first
            .url
            .filter(|url| !url.is_empty())
            .ok_or(CanvasError::MissingImageUrl)?;

        let download = self.http.get(&image_url).send().await?;
        let status = download.status();
        if status != StatusCode::OK {
            return Err(CanvasError::UpstreamStatus {
                service: "image download",
                status: status.as_u16(),
            });
        }
        let bytes = download.bytes().await?;

        if let Some(parent) = self.output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output_path, &bytes).await?;
        debug!(
            "Saved {} bytes of {} to {}",
            bytes.len(),
            sniff_mime(&bytes),
            self.output_path.display()
        );

        Ok(image_url)
    }

    /// [`Self::generate`], with failures logged and turned into `None`.
    pub async fn fetch(&self, prompt: &str) -> Option<String> {
        match self.generate(prompt).await {
            Ok(url) => {
                info!("Image generated: {url}");
                Some(url)
            }
            Err(err) => {
                error!("Failed to generate image: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use url::Url;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n0000";

    #[derive(Clone, Copy)]
    enum Mode {
        Ok,
        GenerateFails,
        NoData,
        NoUrl,
        Garbled,
        DownloadFails,
    }

    #[derive(Clone)]
    struct FakeState {
        mode: Mode,
        addr: SocketAddr,
    }

    async fn generations(
        State(state): State<FakeState>,
        axum::Json(body): axum::Json<Value>,
    ) -> axum::response::Response {
        assert_eq!(body["n"], 1);
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["model"], "dall-e-3");
        match state.mode {
            Mode::GenerateFails => AxumStatus::TOO_MANY_REQUESTS.into_response(),
            Mode::NoData => axum::Json(json!({"created": 1, "data": []})).into_response(),
            Mode::NoUrl => axum::Json(json!({"data": [{"revised_prompt": "hi"}]})).into_response(),
            Mode::Garbled => "<html>gateway hiccup</html>".into_response(),
            Mode::Ok | Mode::DownloadFails => axum::Json(json!({
                "data": [{"url": format!("http://{}/files/picture.png", state.addr)}]
            }))
            .into_response(),
        }
    }

    async fn file(State(state): State<FakeState>) -> axum::response::Response {
        match state.mode {
            Mode::DownloadFails => AxumStatus::FORBIDDEN.into_response(),
            _ => PNG_MAGIC.to_vec().into_response(),
        }
    }

    async fn spawn_fake_openai(mode: Mode) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new()
            .route("/v1/images/generations", post(generations))
            .route("/files/picture.png", get(file))
            .with_state(FakeState { mode, addr });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}/v1")).expect("url")
    }

    fn fetcher(base_url: Url, api_key: Option<&str>, output: &Path) -> ImageFetcher {
        ImageFetcher::new(
            OpenAiSettings {
                api_key: api_key.map(str::to_string),
                base_url,
                chat_model: "gpt-3.5-turbo".to_string(),
                image_model: "dall-e-3".to_string(),
            },
            output,
        )
    }

    #[tokio::test]
    async fn saves_image_and_returns_remote_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("www").join("dalle.png");
        let fetcher = fetcher(spawn_fake_openai(Mode::Ok).await, Some("sk-test"), &output);

        let url = fetcher.generate("a rainy harbour").await.expect("image");
        assert!(url.ends_with("/files/picture.png"));
        let saved = std::fs::read(&output).expect("saved");
        assert_eq!(saved, PNG_MAGIC);
        assert_eq!(sniff_mime(&saved), "image/png");
    }

    #[tokio::test]
    async fn overwrites_the_previous_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("dalle.png");
        std::fs::write(&output, b"old picture that is longer").expect("seed");
        let fetcher = fetcher(spawn_fake_openai(Mode::Ok).await, Some("sk-test"), &output);

        assert!(fetcher.fetch("prompt").await.is_some());
        assert_eq!(std::fs::read(&output).expect("saved"), PNG_MAGIC);
    }

    #[tokio::test]
    async fn non_200_is_upstream_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("dalle.png");
        let fetcher = fetcher(
            spawn_fake_openai(Mode::GenerateFails).await,
            Some("sk-test"),
            &output,
        );
        let err = fetcher.generate("prompt").await.expect_err("429");
        assert!(matches!(
            err,
            CanvasError::UpstreamStatus {
                service: "image generation",
                status: 429
            }
        ));
        assert!(fetcher.fetch("prompt").await.is_none());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn empty_data_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = fetcher(
            spawn_fake_openai(Mode::NoData).await,
            Some("sk-test"),
            &dir.path().join("dalle.png"),
        );
        assert!(matches!(
            fetcher.generate("prompt").await,
            Err(CanvasError::MissingImageData)
        ));
    }

    #[tokio::test]
    async fn missing_url_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = fetcher(
            spawn_fake_openai(Mode::NoUrl).await,
            Some("sk-test"),
            &dir.path().join("dalle.png"),
        );
        assert!(matches!(
            fetcher.generate("prompt").await,
            Err(CanvasError::MissingImageUrl)
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("dalle.png");
        let fetcher = fetcher(
            spawn_fake_openai(Mode::Garbled).await,
            Some("sk-test"),
            &output,
        );
        assert!(matches!(
            fetcher.generate("prompt").await,
            Err(CanvasError::Decode(_))
        ));
        assert!(fetcher.fetch("prompt").await.is_none());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn failed_download_keeps_old_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("dalle.png");
        std::fs::write(&output, b"old").expect("seed");
        let fetcher = fetcher(
            spawn_fake_openai(Mode::DownloadFails).await,
            Some("sk-test"),
            &output,
        );
        assert!(matches!(
            fetcher.generate("prompt").await,
            Err(CanvasError::UpstreamStatus {
                service: "image download",
                status: 403
            })
        ));
        assert_eq!(std::fs::read(&output).expect("old file"), b"old");
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        // nothing listens on port 9
        let base = Url::parse("http://127.0.0.1:9/v1").expect("url");
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = fetcher(base, None, &dir.path().join("dalle.png"));
        assert!(matches!(
            fetcher.generate("prompt").await,
            Err(CanvasError::MissingApiKey)
        ));
    }
}
