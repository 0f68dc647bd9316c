use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use scriven::cli::{Cli, Commands, ModelsAction};
use scriven::config::Config;
use scriven::ipc::channel::MessageWriter;
use scriven::models::{default_models_dir, is_model_installed, list_installed_models};
use scriven::worker::{WorkerState, run_worker};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.stt.model = model;
    }
    if let Some(language) = cli.language {
        config.stt.language = language;
    }

    let models_dir: PathBuf = cli
        .models_dir
        .or_else(|| config.models.dir.clone())
        .unwrap_or_else(default_models_dir);

    match cli.command {
        None => {
            // Worker mode: stdout carries only JSON messages.
            let state = WorkerState::from_config(&config, models_dir);
            let writer = MessageWriter::new(Box::new(std::io::stdout()));
            run_worker(std::io::stdin().lock(), writer, state)?;
        }
        Some(Commands::Models { action }) => {
            handle_models_command(action, &models_dir)?;
        }
        Some(Commands::Check) => {
            run_check(&config, &models_dir);
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/scriven/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// Handle model management commands.
fn handle_models_command(action: ModelsAction, models_dir: &std::path::Path) -> Result<()> {
    match action {
        ModelsAction::List => {
            println!("Available models:");
            for model in scriven::models::catalog::list_models() {
                let status = if is_model_installed(models_dir, model.name) {
                    "[installed]"
                } else {
                    "[not installed]"
                };
                println!("  {:16} {:5} MB   {}", model.name, model.size_mb, status);
            }

            let extra: Vec<String> = list_installed_models(models_dir)
                .into_iter()
                .filter(|name| scriven::models::catalog::get_model(name).is_none())
                .collect();
            if !extra.is_empty() {
                println!("\nOther installed models:");
                for name in extra {
                    println!("  {name}");
                }
            }
        }
        ModelsAction::Download { name } => {
            download_model(models_dir, &name)?;
        }
    }
    Ok(())
}

#[cfg(feature = "model-download")]
fn download_model(models_dir: &std::path::Path, name: &str) -> Result<()> {
    let path = scriven::models::download::download_model_blocking(models_dir, name)?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(not(feature = "model-download"))]
fn download_model(_models_dir: &std::path::Path, name: &str) -> Result<()> {
    anyhow::bail!(
        "this build has no download support; fetch ggml-{name}.bin manually \
         or rebuild with the model-download feature"
    )
}

/// Print a human-readable summary of what this build would report in the
/// `ready` handshake, plus the model situation on disk.
fn run_check(config: &Config, models_dir: &std::path::Path) {
    let device = scriven::device::Device::detect();

    println!("scriven {}", scriven::version_string());
    println!("device:        {} ({})", device.name, device.compute_type);
    println!("models dir:    {}", models_dir.display());
    println!("default model: {}", config.stt.model);
    println!("language:      {}", config.stt.language);

    let installed = list_installed_models(models_dir);
    if installed.is_empty() {
        println!("installed:     none");
    } else {
        println!("installed:     {}", installed.join(", "));
    }

    if !is_model_installed(models_dir, &config.stt.model) {
        println!(
            "note: '{}' is not installed; the first loadModel will download it",
            config.stt.model
        );
    }
}
