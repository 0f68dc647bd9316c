//! Model download and installation.
//!
//! Downloads ggml Whisper models from HuggingFace, verifies their integrity,
//! and stores them in the models directory. Progress goes to stderr; the
//! worker reports download state to its host through the message channel,
//! so nothing here touches stdout.

use crate::error::{Result, ScrivenError};
use crate::models::catalog::get_model;
use crate::models::model_path;
use futures_util::StreamExt;
use sha1::{Digest, Sha1};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Core download: fetch url, save to path, verify sha1 if non-empty.
async fn download_to_path(name: &str, url: &str, sha1: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScrivenError::Download {
            message: format!("Failed to create models directory: {e}"),
        })?;
    }

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ScrivenError::Download {
            message: format!("Failed to start download: {e}"),
        })?;

    if !response.status().is_success() {
        return Err(ScrivenError::Download {
            message: format!("Download of '{name}' failed with status: {}", response.status()),
        });
    }

    // Stream to a .part file and rename on success so an interrupted
    // download never looks like an installed model.
    let part_path = output_path.with_extension("bin.part");
    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(&part_path).map_err(|e| ScrivenError::Download {
        message: format!("Failed to create output file: {e}"),
    })?;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ScrivenError::Download {
            message: format!("Failed to read download chunk: {e}"),
        })?;

        file.write_all(&chunk).map_err(|e| ScrivenError::Download {
            message: format!("Failed to write to file: {e}"),
        })?;

        hasher.update(&chunk);
    }
    drop(file);

    if !sha1.is_empty() {
        let calculated = format!("{:x}", hasher.finalize());
        if calculated != sha1 {
            if let Err(e) = fs::remove_file(&part_path) {
                eprintln!("scriven: failed to remove corrupted download: {e}");
            }
            return Err(ScrivenError::ChecksumMismatch {
                path: output_path.display().to_string(),
                expected: sha1.to_string(),
                actual: calculated,
            });
        }
    }

    fs::rename(&part_path, output_path)?;
    eprintln!("scriven: model installed to {}", output_path.display());
    Ok(())
}

/// Download a Whisper model into `dir` if it is not already present.
///
/// # Errors
///
/// Returns an error if:
/// - The model is not found in the catalog
/// - The download fails
/// - The SHA-1 checksum doesn't match
/// - The file cannot be written
pub async fn download_model(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = model_path(dir, name);
    if path.is_file() {
        return Ok(path);
    }

    let info = get_model(name).ok_or_else(|| ScrivenError::Download {
        message: format!("Model '{name}' not found in catalog"),
    })?;

    eprintln!("scriven: downloading {} ({} MB)...", info.name, info.size_mb);
    download_to_path(info.name, &info.url(), info.sha1, &path).await?;
    Ok(path)
}

/// Blocking wrapper around [`download_model`] for callers that live on the
/// synchronous worker thread.
pub fn download_model_blocking(dir: &Path, name: &str) -> Result<PathBuf> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ScrivenError::Download {
            message: format!("Failed to start download runtime: {e}"),
        })?;
    runtime.block_on(download_model(dir, name))
}
