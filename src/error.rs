use derive_more::{Display, Error as DeriveError, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From, DeriveError)]
pub enum Error {
    #[display("{_0}")]
    Custom(#[error(not(source))] String),

    #[display("invalid configuration for {var}: {reason}")]
    Config { var: String, reason: String },

    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    #[display("HTTP error: {_0}")]
    #[from]
    Http(reqwest::Error),

    #[display("OpenAI error: {_0}")]
    #[from]
    OpenAi(async_openai::error::OpenAIError),

    #[display("JSON error: {_0}")]
    #[from]
    Json(serde_json::Error),

    /// Non-success response from a remote API, with the HTTP status kept so
    /// the retry layer can recognise throttling.
    #[display("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[display("rate limited: {_0}")]
    RateLimited(#[error(not(source))] String),

    /// Terminal failure after every attempt was throttled.
    #[display("gave up after {attempts} rate-limited attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[display("invalid video candidate {title:?}: {reason}")]
    InvalidCandidate { title: String, reason: String },

    #[display("no image was analysed successfully; nothing to aggregate")]
    NothingToAggregate,
}

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    pub fn config(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
