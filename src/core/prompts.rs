use std::path::Path;

use crate::core::trends::RankedVideo;
use crate::error::Result;

const IMAGE_ANALYSIS_FILE: &str = "image_analysis.md";
const KEYWORD_EXTRACTION_FILE: &str = "keyword_extraction.md";
const FINAL_REPORT_FILE: &str = "final_report.md";
const TREND_SECTION_FILE: &str = "trend_section.md";

const DEFAULT_IMAGE_ANALYSIS: &str = include_str!("../../prompts/image_analysis.md");
const DEFAULT_KEYWORD_EXTRACTION: &str = include_str!("../../prompts/keyword_extraction.md");
const DEFAULT_FINAL_REPORT: &str = include_str!("../../prompts/final_report.md");
const DEFAULT_TREND_SECTION: &str = include_str!("../../prompts/trend_section.md");

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub image_analysis: String,
    pub keyword_extraction: String,
    /// Placeholders: `{count}`, `{data}`, `{trends}`.
    pub final_report: String,
    /// Placeholder: `{videos}`.
    pub trend_section: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            image_analysis: DEFAULT_IMAGE_ANALYSIS.to_string(),
            keyword_extraction: DEFAULT_KEYWORD_EXTRACTION.to_string(),
            final_report: DEFAULT_FINAL_REPORT.to_string(),
            trend_section: DEFAULT_TREND_SECTION.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Built-in templates, with any file present in `dir` taking precedence.
    pub async fn load(dir: Option<&Path>) -> Result<Self> {
        let mut templates = Self::default();
        let Some(dir) = dir else {
            return Ok(templates);
        };

        let slots: [(&str, &mut String); 4] = [
            (IMAGE_ANALYSIS_FILE, &mut templates.image_analysis),
            (KEYWORD_EXTRACTION_FILE, &mut templates.keyword_extraction),
            (FINAL_REPORT_FILE, &mut templates.final_report),
            (TREND_SECTION_FILE, &mut templates.trend_section),
        ];
        for (file, slot) in slots {
            let path = dir.join(file);
            if tokio::fs::try_exists(&path).await? {
                *slot = tokio::fs::read_to_string(&path).await?;
                tracing::debug!(path = %path.display(), "using prompt override");
            }
        }

        Ok(templates)
    }

    pub fn render_final_report(&self, count: usize, data: &str, trends: &str) -> String {
        let count = count.to_string();
        fill(
            &self.final_report,
            &[("{count}", count.as_str()), ("{data}", data), ("{trends}", trends)],
        )
    }

    pub fn render_trend_section(&self, videos: &[RankedVideo]) -> String {
        if videos.is_empty() {
            return String::new();
        }
        let listing = videos
            .iter()
            .enumerate()
            .map(|(i, v)| {
                format!(
                    "{}. {} ({}) - {} views / {} subscribers, ratio {:.2} - {}",
                    i + 1,
                    v.candidate.title,
                    v.candidate.channel_name,
                    v.candidate.view_count,
                    v.candidate.subscriber_count,
                    v.ratio,
                    v.candidate.url
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.trend_section.replace("{videos}", &listing)
    }
}

/// Substitutes placeholders in one pass, so values are never re-scanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
