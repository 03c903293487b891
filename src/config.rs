use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::core::analysis::DEFAULT_TREND_WINDOW_DAYS;
use crate::core::keywords::DEFAULT_KEYWORD_CAP;
use crate::core::model::{DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL};
use crate::core::retry::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::core::trends::{
    DEFAULT_MAX_SUBSCRIBERS, DEFAULT_MIN_RATIO, DEFAULT_TOP_K, TrendThresholds,
};
use crate::core::youtube::DEFAULT_SEARCH_MAX_RESULTS;
use crate::error::{Error, Result};

const UPLOAD_OPT_IN_ENV: &str = "SHORTSCOPE_ALLOW_UPLOAD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl Backend {
    pub fn default_model(self) -> &'static str {
        match self {
            Backend::OpenAi => DEFAULT_OPENAI_MODEL,
            Backend::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }

    fn key_var(self) -> &'static str {
        match self {
            Backend::OpenAi => "OPENAI_API_KEY",
            Backend::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Everything a run needs, resolved once at startup and passed down.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend: Backend,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub allow_upload: bool,
    pub retry: RetryPolicy,
    pub thresholds: TrendThresholds,
    pub top_k: usize,
    pub keyword_cap: usize,
    pub search_max_results: u32,
    pub trend_window_days: i64,
    pub prompts_dir: Option<PathBuf>,
}

/// Command-line values that win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub max_attempts: Option<u32>,
    pub backoff_secs: Option<u64>,
    pub prompts_dir: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub search_max_results: Option<u32>,
}

impl AppConfig {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        build_app_config(|key| std::env::var(key))
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(backend) = overrides.backend
            && backend != self.backend
        {
            self.backend = backend;
            self.model = backend.default_model().to_string();
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.retry = RetryPolicy::new(max_attempts, self.retry.backoff_base);
        }
        if let Some(secs) = overrides.backoff_secs {
            self.retry = RetryPolicy::new(self.retry.max_attempts, Duration::from_secs(secs));
        }
        if let Some(dir) = overrides.prompts_dir {
            self.prompts_dir = Some(dir);
        }
        if let Some(top_k) = overrides.top_k {
            self.top_k = top_k;
        }
        if let Some(max_results) = overrides.search_max_results {
            self.search_max_results = max_results;
        }
        self
    }

    /// Key for the selected model backend.
    pub fn model_api_key(&self) -> Result<&str> {
        let key = match self.backend {
            Backend::OpenAi => self.openai_api_key.as_deref(),
            Backend::Gemini => self.gemini_api_key.as_deref(),
        };
        key.ok_or_else(|| Error::config(self.backend.key_var(), "not set"))
    }

    pub fn youtube_api_key(&self) -> Result<&str> {
        self.youtube_api_key
            .as_deref()
            .ok_or_else(|| Error::config("YOUTUBE_API_KEY", "not set"))
    }

    /// Screenshots leave the machine only after an explicit opt-in.
    pub fn ensure_upload_allowed(&self) -> Result<()> {
        if self.allow_upload {
            Ok(())
        } else {
            Err(Error::custom(format!(
                "Analysis uploads screenshots to a hosted model and requires explicit opt-in. \
                 Set {UPLOAD_OPT_IN_ENV}=1 to enable."
            )))
        }
    }
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    fn parsed<T: std::str::FromStr>(var: &str, raw: Option<String>, default: T) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match raw {
            None => Ok(default),
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| Error::config(var, format!("{raw:?}: {e}"))),
        }
    }

    let backend = match optional("SHORTSCOPE_BACKEND") {
        None => Backend::OpenAi,
        Some(raw) => Backend::from_str(&raw, true).map_err(|_| {
            Error::config("SHORTSCOPE_BACKEND", format!("{raw:?}: expected openai or gemini"))
        })?,
    };
    let model =
        optional("SHORTSCOPE_MODEL").unwrap_or_else(|| backend.default_model().to_string());

    let max_attempts = parsed(
        "SHORTSCOPE_MAX_ATTEMPTS",
        optional("SHORTSCOPE_MAX_ATTEMPTS"),
        DEFAULT_MAX_ATTEMPTS,
    )?;
    if max_attempts == 0 {
        return Err(Error::config("SHORTSCOPE_MAX_ATTEMPTS", "must be at least 1"));
    }
    let backoff_secs = parsed(
        "SHORTSCOPE_BACKOFF_BASE_SECS",
        optional("SHORTSCOPE_BACKOFF_BASE_SECS"),
        DEFAULT_BACKOFF_BASE.as_secs(),
    )?;

    let max_subscribers = parsed(
        "SHORTSCOPE_MAX_SUBSCRIBERS",
        optional("SHORTSCOPE_MAX_SUBSCRIBERS"),
        DEFAULT_MAX_SUBSCRIBERS,
    )?;
    let min_ratio = parsed(
        "SHORTSCOPE_MIN_RATIO",
        optional("SHORTSCOPE_MIN_RATIO"),
        DEFAULT_MIN_RATIO,
    )?;
    if !min_ratio.is_finite() {
        return Err(Error::config("SHORTSCOPE_MIN_RATIO", "must be a finite number"));
    }

    let allow_upload = optional(UPLOAD_OPT_IN_ENV)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    Ok(AppConfig {
        backend,
        model,
        openai_api_key: optional("OPENAI_API_KEY"),
        gemini_api_key: optional("GEMINI_API_KEY").or_else(|| optional("GOOGLE_API_KEY")),
        youtube_api_key: optional("YOUTUBE_API_KEY"),
        allow_upload,
        retry: RetryPolicy::new(max_attempts, Duration::from_secs(backoff_secs)),
        thresholds: TrendThresholds {
            max_subscribers,
            min_ratio,
        },
        top_k: parsed("SHORTSCOPE_TOP_K", optional("SHORTSCOPE_TOP_K"), DEFAULT_TOP_K)?,
        keyword_cap: parsed(
            "SHORTSCOPE_KEYWORD_CAP",
            optional("SHORTSCOPE_KEYWORD_CAP"),
            DEFAULT_KEYWORD_CAP,
        )?,
        search_max_results: parsed(
            "SHORTSCOPE_SEARCH_MAX_RESULTS",
            optional("SHORTSCOPE_SEARCH_MAX_RESULTS"),
            DEFAULT_SEARCH_MAX_RESULTS,
        )?,
        trend_window_days: parsed(
            "SHORTSCOPE_TREND_WINDOW_DAYS",
            optional("SHORTSCOPE_TREND_WINDOW_DAYS"),
            DEFAULT_TREND_WINDOW_DAYS,
        )?,
        prompts_dir: optional("SHORTSCOPE_PROMPTS_DIR").map(PathBuf::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        build_app_config(|key| map.get(key).cloned().ok_or(VarError::NotPresent))
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.backend, Backend::OpenAi);
        assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.retry, RetryPolicy::new(3, Duration::from_secs(20)));
        assert_eq!(config.thresholds, TrendThresholds::default());
        assert_eq!(config.top_k, 3);
        assert_eq!(config.keyword_cap, 10);
        assert_eq!(config.search_max_results, 25);
        assert_eq!(config.trend_window_days, 7);
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(!config.allow_upload);
        assert!(config.model_api_key().is_err());
    }

    #[test]
    fn gemini_backend_falls_back_to_google_key() {
        let config = config_from(&[
            ("SHORTSCOPE_BACKEND", "Gemini"),
            ("GOOGLE_API_KEY", "g-key"),
        ])
        .unwrap();
        assert_eq!(config.backend, Backend::Gemini);
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.model_api_key().unwrap(), "g-key");
    }

    #[test]
    fn reads_tuning_values() {
        let config = config_from(&[
            ("SHORTSCOPE_MAX_ATTEMPTS", "5"),
            ("SHORTSCOPE_BACKOFF_BASE_SECS", "32"),
            ("SHORTSCOPE_MIN_RATIO", "1.5"),
            ("SHORTSCOPE_MAX_SUBSCRIBERS", "50000"),
            ("SHORTSCOPE_ALLOW_UPLOAD", "yes"),
        ])
        .unwrap();
        assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_secs(32)));
        assert_eq!(config.thresholds.max_subscribers, 50_000);
        assert!((config.thresholds.min_ratio - 1.5).abs() < f64::EPSILON);
        assert!(config.ensure_upload_allowed().is_ok());
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let err = config_from(&[("SHORTSCOPE_MAX_ATTEMPTS", "lots")]).unwrap_err();
        assert!(matches!(err, Error::Config { ref var, .. } if var == "SHORTSCOPE_MAX_ATTEMPTS"));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(config_from(&[("SHORTSCOPE_MAX_ATTEMPTS", "0")]).is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(config_from(&[("SHORTSCOPE_BACKEND", "claude")]).is_err());
    }

    #[test]
    fn overrides_win_and_switching_backend_resets_model() {
        let config = config_from(&[("SHORTSCOPE_MODEL", "gpt-custom")])
            .unwrap()
            .apply(Overrides {
                backend: Some(Backend::Gemini),
                max_attempts: Some(5),
                backoff_secs: Some(1),
                top_k: Some(7),
                ..Overrides::default()
            });
        assert_eq!(config.backend, Backend::Gemini);
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_secs(1)));
        assert_eq!(config.top_k, 7);
    }
}
