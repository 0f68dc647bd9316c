//! Command-line interface for scriven
//!
//! Provides argument parsing using clap derive macros. With no subcommand
//! the binary runs the worker loop on stdin/stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Speaker-attributed transcription worker
#[derive(Parser, Debug)]
#[command(
    name = "scriven",
    version,
    about = "Speaker-attributed transcription worker driven by JSON messages on stdio"
)]
pub struct Cli {
    /// Subcommand to execute; omit to run the worker loop
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to store and look up models
    #[arg(long, global = true, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Whisper model (default: base, multilingual). Use base.en for English-only
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code for transcription. Examples: auto, en, de, es, fr
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage Whisper models
    Models {
        /// Action to perform
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Check configuration, models, and compute backend
    Check,
}

/// Model management actions
#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List catalog models and their installation status
    List,

    /// Download a model
    Download {
        /// Model name (e.g., tiny.en, base, large-v3)
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_runs_worker() {
        let cli = Cli::parse_from(["scriven"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
        assert!(cli.models_dir.is_none());
    }

    #[test]
    fn test_models_list() {
        let cli = Cli::parse_from(["scriven", "models", "list"]);
        match cli.command {
            Some(Commands::Models {
                action: ModelsAction::List,
            }) => {}
            other => panic!("expected models list, got {other:?}"),
        }
    }

    #[test]
    fn test_models_download_takes_name() {
        let cli = Cli::parse_from(["scriven", "models", "download", "small.en"]);
        match cli.command {
            Some(Commands::Models {
                action: ModelsAction::Download { name },
            }) => assert_eq!(name, "small.en"),
            other => panic!("expected models download, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "scriven",
            "--config",
            "/etc/scriven.toml",
            "--models-dir",
            "/opt/models",
            "check",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/scriven.toml")));
        assert_eq!(cli.models_dir, Some(PathBuf::from("/opt/models")));
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_model_and_language_overrides() {
        let cli = Cli::parse_from(["scriven", "--model", "small", "--language", "de"]);
        assert_eq!(cli.model.as_deref(), Some("small"));
        assert_eq!(cli.language.as_deref(), Some("de"));
    }
}
