use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Backend, Overrides};

#[derive(Parser)]
#[command(name = "shortscope")]
#[command(about = "Shopping Shorts analytics consultant: screenshots in, consulting report out")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse analytics screenshots and write an aggregate consulting report
    Analyze {
        /// Screenshot files (png, jpg, jpeg), processed in the given order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Extract keywords and fold trending videos into the report
        #[arg(short, long)]
        trends: bool,

        /// Save the final report under ./reports
        #[arg(short, long)]
        save: bool,

        /// Write the final report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        model_args: ModelArgs,
    },

    /// Look up trending videos for keywords without analysing screenshots
    Trends {
        /// Keywords to search for
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Number of videos to keep after ranking
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Search results to fetch before ranking (1-50)
        #[arg(long)]
        max_results: Option<u32>,
    },

    /// List saved reports
    List,
}

#[derive(Args, Clone, Default)]
pub struct ModelArgs {
    /// Model provider
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Model identifier (defaults per backend)
    #[arg(long)]
    pub model: Option<String>,

    /// Attempts per call before giving up on rate limiting
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Base back-off in seconds; the n-th retry waits n times this
    #[arg(long)]
    pub backoff_secs: Option<u64>,

    /// Directory with prompt template overrides
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,
}

impl From<ModelArgs> for Overrides {
    fn from(args: ModelArgs) -> Self {
        Overrides {
            backend: args.backend,
            model: args.model,
            max_attempts: args.max_attempts,
            backoff_secs: args.backoff_secs,
            prompts_dir: args.prompts_dir,
            ..Overrides::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_analyze_with_overrides() {
        let cli = Cli::try_parse_from([
            "shortscope",
            "analyze",
            "a.png",
            "b.jpg",
            "--trends",
            "--backend",
            "gemini",
            "--max-attempts",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                images,
                trends,
                model_args,
                ..
            } => {
                assert_eq!(images.len(), 2);
                assert!(trends);
                assert_eq!(model_args.backend, Some(Backend::Gemini));
                assert_eq!(model_args.max_attempts, Some(5));
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn rejects_zero_attempts() {
        assert!(
            Cli::try_parse_from(["shortscope", "analyze", "a.png", "--max-attempts", "0"]).is_err()
        );
    }

    #[test]
    fn analyze_needs_images() {
        assert!(Cli::try_parse_from(["shortscope", "analyze"]).is_err());
    }
}
