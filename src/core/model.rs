use std::path::Path;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::responses::{
        CreateResponseArgs, EasyInputContent, EasyInputMessageArgs, ImageDetail, InputContent,
        InputImageContent, InputItem, InputParam, InputTextContent, OutputItem,
        OutputMessageContent, Role,
    },
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::config::Backend;
use crate::error::{Error, Result};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5.2";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl ImageInput {
    /// Picks the MIME type from the extension; only PNG and JPEG are accepted.
    pub fn mime_for(path: &Path) -> Result<&'static str> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok("image/png"),
            "jpg" | "jpeg" => Ok("image/jpeg"),
            _ => Err(Error::custom(format!(
                "unsupported image type for {}; expected png, jpg or jpeg",
                path.display()
            ))),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let mime_type = Self::mime_for(path)?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { bytes, mime_type })
    }

    fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub prompt: String,
    pub image: Option<ImageInput>,
}

impl ModelRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: ImageInput) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

/// One prompt (plus optional image) in, one block of text out.
pub trait ModelClient {
    async fn generate(&self, request: &ModelRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiModel {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModel {
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: async_openai::Client::with_config(config),
            model: model.to_string(),
        }
    }
}

impl ModelClient for OpenAiModel {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        let content = match &request.image {
            None => EasyInputContent::Text(request.prompt.clone()),
            Some(image) => EasyInputContent::ContentList(vec![
                InputContent::InputText(InputTextContent {
                    text: request.prompt.clone(),
                }),
                InputContent::InputImage(InputImageContent {
                    detail: ImageDetail::High,
                    file_id: None,
                    image_url: Some(image.data_url()),
                }),
            ]),
        };

        let create = CreateResponseArgs::default()
            .model(self.model.as_str())
            .input(InputParam::Items(vec![InputItem::EasyMessage(
                EasyInputMessageArgs::default()
                    .role(Role::User)
                    .content(content)
                    .build()?,
            )]))
            .build()?;

        tracing::debug!(
            model = %self.model,
            with_image = request.image.is_some(),
            "sending OpenAI request"
        );
        let response = self
            .client
            .responses()
            .create(create)
            .await
            .map_err(map_openai_error)?;

        let mut text = String::new();
        for output in response.output {
            if let OutputItem::Message(message) = output {
                for part in message.content {
                    match part {
                        OutputMessageContent::OutputText(t) => text.push_str(&t.text),
                        other => tracing::debug!(?other, "ignoring non-text output"),
                    }
                }
            }
        }

        if text.trim().is_empty() {
            return Err(Error::custom("model returned an empty answer"));
        }
        Ok(text)
    }
}

/// OpenAI reports throttling and exhausted credit through the error message.
fn map_openai_error(err: OpenAIError) -> Error {
    if let OpenAIError::ApiError(api) = &err {
        let lowered = api.message.to_lowercase();
        if lowered.contains("rate limit") || lowered.contains("quota") {
            return Error::RateLimited(api.message.clone());
        }
    }
    Error::OpenAi(err)
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum GeminiPart<'a> {
    Text(&'a str),
    InlineData { mime_type: &'a str, data: String },
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Google Gemini `generateContent` over plain HTTP.
#[derive(Clone)]
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: Url,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| Error::custom(format!("invalid Gemini base URL '{base_url}': {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url,
        })
    }

    fn endpoint(&self) -> Result<Url> {
        self.base_url
            .join(&format!("models/{}:generateContent", self.model))
            .map_err(|e| Error::custom(format!("invalid Gemini model '{}': {e}", self.model)))
    }
}

impl ModelClient for GeminiModel {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        let mut parts = vec![GeminiPart::Text(&request.prompt)];
        if let Some(image) = &request.image {
            parts.push(GeminiPart::InlineData {
                mime_type: image.mime_type,
                data: image.base64(),
            });
        }
        let body = GeminiRequest {
            contents: vec![GeminiContent { parts }],
        };

        tracing::debug!(
            model = %self.model,
            with_image = request.image.is_some(),
            "sending Gemini request"
        );
        let response = self
            .client
            .post(self.endpoint()?)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<GeminiErrorEnvelope>(&raw) {
                Ok(envelope) => format!("{} {}", envelope.error.status, envelope.error.message)
                    .trim()
                    .to_string(),
                Err(_) => raw,
            };
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(Error::custom("model returned an empty answer"));
        }
        Ok(text)
    }
}

/// Backend chosen at startup.
#[derive(Clone)]
pub enum Model {
    OpenAi(OpenAiModel),
    Gemini(GeminiModel),
}

impl Model {
    pub fn from_backend(backend: Backend, api_key: &str, model: &str) -> Result<Self> {
        Ok(match backend {
            Backend::OpenAi => Model::OpenAi(OpenAiModel::new(api_key, model)),
            Backend::Gemini => Model::Gemini(GeminiModel::new(api_key, model)?),
        })
    }
}

impl ModelClient for Model {
    async fn generate(&self, request: &ModelRequest) -> Result<String> {
        match self {
            Model::OpenAi(m) => m.generate(request).await,
            Model::Gemini(m) => m.generate(request).await,
        }
    }
}
