use std::path::{Path, PathBuf};

use chrono::{Duration as ChronoDuration, Utc};

use crate::core::keywords::KeywordSet;
use crate::core::model::{ImageInput, ModelClient, ModelRequest};
use crate::core::progress::{Progress, ProgressEvent};
use crate::core::prompts::PromptTemplates;
use crate::core::retry::{RetryPolicy, call_with_retry};
use crate::core::trends::{RankedVideo, TrendThresholds, rank};
use crate::core::youtube::YouTubeClient;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisItem {
    pub source_name: String,
    pub report_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageFailure {
    pub source_name: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub items: Vec<AnalysisItem>,
    pub failures: Vec<ImageFailure>,
    pub keywords: Vec<String>,
    pub trends: Vec<RankedVideo>,
    pub final_report: String,
}

/// Settings for the optional trend stage.
#[derive(Debug, Clone)]
pub struct TrendSettings {
    pub thresholds: TrendThresholds,
    pub top_k: usize,
    pub keyword_cap: usize,
    pub max_results: u32,
    pub window_days: i64,
}

pub struct Analyzer<M> {
    model: M,
    youtube: Option<YouTubeClient>,
    templates: PromptTemplates,
    retry: RetryPolicy,
    trend: TrendSettings,
    progress: Progress,
}

impl<M: ModelClient> Analyzer<M> {
    pub fn new(
        model: M,
        templates: PromptTemplates,
        retry: RetryPolicy,
        trend: TrendSettings,
        progress: Progress,
    ) -> Self {
        Self {
            model,
            youtube: None,
            templates,
            retry,
            trend,
            progress,
        }
    }

    pub fn with_youtube(mut self, youtube: YouTubeClient) -> Self {
        self.youtube = Some(youtube);
        self
    }

    /// Analyses `images` one after another, then asks for the aggregate report.
    ///
    /// A failing image is recorded and skipped. Failure of the aggregate call
    /// fails the whole run.
    pub async fn run(&self, images: &[PathBuf], with_trends: bool) -> Result<RunOutcome> {
        let total = images.len();
        let mut items = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut keywords = KeywordSet::new();

        self.progress.stage(format!("Analysing {total} screenshot(s)"));
        for (i, path) in images.iter().enumerate() {
            let index = i + 1;
            let name = source_name(path);
            self.progress.emit(ProgressEvent::ImageStarted {
                index,
                total,
                name: name.clone(),
            });

            let image = match ImageInput::from_path(path).await {
                Ok(image) => image,
                Err(err) => {
                    self.record_failure(&mut failures, index, total, name, err);
                    continue;
                }
            };

            match self.analyse_image(&name, &image).await {
                Ok(report_text) => {
                    tracing::info!(image = %name, "image analysed");
                    items.push(AnalysisItem {
                        source_name: name.clone(),
                        report_text,
                    });
                    self.progress.emit(ProgressEvent::ImageAnalysed {
                        index,
                        total,
                        name: name.clone(),
                    });
                }
                Err(err) => {
                    self.record_failure(&mut failures, index, total, name, err);
                    continue;
                }
            }

            if with_trends {
                match self.extract_keywords(&name, image).await {
                    Ok(answer) => {
                        let added = keywords.extend_from_answer(&answer);
                        tracing::debug!(
                            image = %name,
                            added,
                            total = keywords.len(),
                            "keywords extracted"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            image = %name,
                            error = %err,
                            "keyword extraction failed; continuing"
                        );
                    }
                }
            }
        }

        if items.is_empty() {
            return Err(Error::NothingToAggregate);
        }

        let capped: Vec<String> = keywords.capped(self.trend.keyword_cap).to_vec();
        let trends = if with_trends {
            self.lookup_trends(&capped).await
        } else {
            Vec::new()
        };

        self.progress.stage("Writing the consulting report");
        let prompt = self.templates.render_final_report(
            total,
            &combine(&items),
            &self.templates.render_trend_section(&trends),
        );
        let request = ModelRequest::text(prompt);
        let final_report = call_with_retry(&self.retry, &self.progress, "final report", || {
            self.model.generate(&request)
        })
        .await?;

        Ok(RunOutcome {
            items,
            failures,
            keywords: capped,
            trends,
            final_report,
        })
    }

    async fn analyse_image(&self, name: &str, image: &ImageInput) -> Result<String> {
        let request =
            ModelRequest::with_image(self.templates.image_analysis.clone(), image.clone());
        call_with_retry(&self.retry, &self.progress, name, || self.model.generate(&request)).await
    }

    async fn extract_keywords(&self, name: &str, image: ImageInput) -> Result<String> {
        let request = ModelRequest::with_image(self.templates.keyword_extraction.clone(), image);
        let label = format!("{name} keywords");
        call_with_retry(&self.retry, &self.progress, &label, || self.model.generate(&request)).await
    }

    /// Trend stage failures only cost the report its trend section.
    async fn lookup_trends(&self, keywords: &[String]) -> Vec<RankedVideo> {
        let Some(youtube) = &self.youtube else {
            tracing::warn!("trend lookup requested without a YouTube client; skipping");
            return Vec::new();
        };
        if keywords.is_empty() {
            tracing::info!("no keywords extracted; skipping trend lookup");
            return Vec::new();
        }

        self.progress
            .stage(format!("Searching trending videos for: {}", keywords.join(", ")));
        match find_trends(youtube, keywords, &self.trend).await {
            Ok(trends) => {
                tracing::info!(found = trends.len(), "trend lookup finished");
                trends
            }
            Err(err) => {
                tracing::error!(error = %err, "trend lookup failed; report will omit trends");
                self.progress.stage(format!("Trend lookup failed: {err}"));
                Vec::new()
            }
        }
    }

    fn record_failure(
        &self,
        failures: &mut Vec<ImageFailure>,
        index: usize,
        total: usize,
        name: String,
        err: Error,
    ) {
        tracing::error!(image = %name, error = %err, "image analysis failed");
        self.progress.emit(ProgressEvent::ImageFailed {
            index,
            total,
            name: name.clone(),
            error: err.to_string(),
        });
        failures.push(ImageFailure {
            source_name: name,
            error: err.to_string(),
        });
    }
}

/// How far back a search looks for recently published videos.
pub const DEFAULT_TREND_WINDOW_DAYS: i64 = 7;

/// Search, resolve statistics and rank, for the given keywords.
pub async fn find_trends(
    youtube: &YouTubeClient,
    keywords: &[String],
    settings: &TrendSettings,
) -> Result<Vec<RankedVideo>> {
    let published_after = Utc::now() - ChronoDuration::days(settings.window_days);
    let candidates = youtube
        .trending_candidates(keywords, settings.max_results, published_after)
        .await?;
    rank(&candidates, settings.top_k, &settings.thresholds)
}

/// Aggregate input: one `[name] text` block per analysed image.
pub fn combine(items: &[AnalysisItem]) -> String {
    items
        .iter()
        .map(|item| format!("[{}] {}", item.source_name, item.report_text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
