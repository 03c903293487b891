mod cli;
mod config;
mod core;
mod error;

use std::path::PathBuf;

use crate::cli::{Cli, Commands, ModelArgs};
use crate::config::{AppConfig, Overrides};
use crate::core::{
    Analyzer, Model, Progress, ProgressLog, PromptTemplates, RunOutcome, StorageService,
    TrendSettings, YouTubeClient, find_trends,
};
use crate::error::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            images,
            trends,
            save,
            output,
            model_args,
        } => {
            run_cli_analyze(AppConfig::load()?, model_args, images, trends, save, output).await?;
        }
        Commands::Trends {
            keywords,
            top_k,
            max_results,
        } => {
            let config = AppConfig::load()?.apply(Overrides {
                top_k,
                search_max_results: max_results,
                ..Overrides::default()
            });
            run_cli_trends(&config, keywords).await?;
        }
        Commands::List => {
            run_cli_list(&StorageService::default())?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SHORTSCOPE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("shortscope=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn trend_settings(config: &AppConfig) -> TrendSettings {
    TrendSettings {
        thresholds: config.thresholds,
        top_k: config.top_k,
        keyword_cap: config.keyword_cap,
        max_results: config.search_max_results,
        window_days: config.trend_window_days,
    }
}

async fn run_cli_analyze(
    config: AppConfig,
    model_args: ModelArgs,
    images: Vec<PathBuf>,
    with_trends: bool,
    save: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = config.apply(model_args.into());
    config.ensure_upload_allowed()?;

    let model = Model::from_backend(config.backend, config.model_api_key()?, &config.model)?;
    let templates = PromptTemplates::load(config.prompts_dir.as_deref()).await?;
    let youtube = if with_trends {
        Some(YouTubeClient::new(config.youtube_api_key()?)?)
    } else {
        None
    };

    tracing::info!(
        backend = ?config.backend,
        model = %config.model,
        images = images.len(),
        trends = with_trends,
        "starting analysis"
    );

    let (progress, rx) = Progress::channel();
    let printer = tokio::spawn(ProgressLog::new().drain(rx));

    let outcome = {
        let mut analyzer = Analyzer::new(
            model,
            templates,
            config.retry,
            trend_settings(&config),
            progress,
        );
        if let Some(youtube) = youtube {
            analyzer = analyzer.with_youtube(youtube);
        }
        analyzer.run(&images, with_trends).await
    };
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "progress printer stopped unexpectedly");
    }
    let outcome = outcome?;

    print_outcome(&outcome);

    if let Some(path) = output {
        StorageService::save_report_to(&path, &outcome.final_report).await?;
        println!("Report saved to: {}", path.display());
    } else if save {
        let path = StorageService::default()
            .save_report(&outcome.final_report)
            .await?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    for (i, item) in outcome.items.iter().enumerate() {
        println!("## {}. {}", i + 1, item.source_name);
        println!();
        println!("{}", item.report_text.trim());
        println!();
    }

    if !outcome.failures.is_empty() {
        println!("## Skipped screenshots");
        println!();
        for failure in &outcome.failures {
            println!("- {}: {}", failure.source_name, failure.error);
        }
        println!();
    }

    if !outcome.keywords.is_empty() {
        println!("Keywords: {}", outcome.keywords.join(", "));
        println!();
    }

    if !outcome.trends.is_empty() {
        println!("## Trending benchmarks");
        println!();
        for video in &outcome.trends {
            println!(
                "- {} ({}) ratio {:.2}: {}",
                video.candidate.title,
                video.candidate.channel_name,
                video.ratio,
                video.candidate.url
            );
        }
        println!();
    }

    println!("---");
    println!();
    println!("# Consulting report");
    println!();
    println!("{}", outcome.final_report.trim());
}

async fn run_cli_trends(config: &AppConfig, keywords: Vec<String>) -> Result<()> {
    let youtube = YouTubeClient::new(config.youtube_api_key()?)?;

    let mut set = crate::core::keywords::KeywordSet::new();
    for keyword in &keywords {
        set.insert(keyword);
    }
    if set.is_empty() {
        return Err(crate::error::Error::custom("no usable keywords given"));
    }
    let keywords = set.capped(config.keyword_cap).to_vec();

    println!("Searching trending videos for: {}", keywords.join(", "));
    let ranked = find_trends(&youtube, &keywords, &trend_settings(config)).await?;

    if ranked.is_empty() {
        println!("No videos passed the trend filter.");
        return Ok(());
    }

    println!(
        "{:<4} {:>7} {:>12} {:>12}  {}",
        "#", "ratio", "views", "subscribers", "title"
    );
    for (i, video) in ranked.iter().enumerate() {
        println!(
            "{:<4} {:>7.2} {:>12} {:>12}  {} ({})",
            i + 1,
            video.ratio,
            video.candidate.view_count,
            video.candidate.subscriber_count,
            video.candidate.title,
            video.candidate.channel_name
        );
        println!("{:<4} {}", "", video.candidate.url);
    }

    Ok(())
}

/// Needs no configuration, so a broken environment cannot block it.
fn run_cli_list(storage: &StorageService) -> Result<()> {
    let files = storage.list_reports()?;

    if files.is_empty() {
        println!("No saved reports.");
        return Ok(());
    }

    println!("Found {} reports:", files.len());
    println!();

    for file in files {
        let size_kb = file.size / 1024;
        let size_str = if size_kb < 1024 {
            format!("{size_kb}KB")
        } else {
            format!("{:.1}MB", size_kb as f64 / 1024.0)
        };
        let modified = chrono::DateTime::<chrono::Local>::from(file.modified)
            .format("%Y-%m-%d %H:%M");

        println!("{:<48} {:<17} {}", file.path.display(), modified, size_str);
    }

    Ok(())
}
