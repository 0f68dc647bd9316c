//! Whisper model catalog, storage layout, and download.

pub mod catalog;
#[cfg(feature = "model-download")]
pub mod download;

use std::path::{Path, PathBuf};

/// Directory where models are stored by default.
///
/// Uses `~/.cache/scriven/models/` on Linux/Unix.
#[cfg(any(feature = "model-download", feature = "cli"))]
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("scriven")
        .join("models")
}

/// Full path for a model file inside `dir`.
///
/// Always returns a path regardless of whether the model is in the catalog.
/// The file may or may not exist on disk.
pub fn model_path(dir: &Path, name: &str) -> PathBuf {
    let resolved = catalog::resolve_name(name);
    dir.join(format!("ggml-{resolved}.bin"))
}

/// Check if a model file is present in `dir`.
pub fn is_model_installed(dir: &Path, name: &str) -> bool {
    model_path(dir, name).is_file()
}

/// List installed model names by scanning `dir` for `ggml-*.bin` files,
/// catalog models or not. Names come back sorted with prefix and suffix
/// stripped.
pub fn list_installed_models(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let name = name.to_str()?;
            let model = name.strip_prefix("ggml-")?.strip_suffix(".bin")?;
            if entry.path().is_file() {
                Some(model.to_string())
            } else {
                None
            }
        })
        .collect();

    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_filename_format() {
        let path = model_path(Path::new("/models"), "tiny.en");
        assert_eq!(path, PathBuf::from("/models/ggml-tiny.en.bin"));
    }

    #[test]
    fn test_model_path_for_unknown_model() {
        let path = model_path(Path::new("/models"), "nonexistent");
        assert!(path.to_string_lossy().contains("ggml-nonexistent.bin"));
    }

    #[test]
    fn test_model_path_resolves_alias() {
        let path = model_path(Path::new("/models"), "large");
        assert!(
            path.to_string_lossy().contains("large-v3"),
            "unexpected path {}",
            path.display()
        );
    }

    #[test]
    fn test_is_model_installed_false_for_missing() {
        assert!(!is_model_installed(Path::new("/nonexistent"), "base"));
    }

    #[test]
    fn test_is_model_installed_true_for_present_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-base.bin"), b"stub").unwrap();
        assert!(is_model_installed(dir.path(), "base"));
    }

    #[test]
    fn test_list_installed_models_strips_prefix_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-tiny.bin"), b"stub").unwrap();
        std::fs::write(dir.path().join("ggml-base.en.bin"), b"stub").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let installed = list_installed_models(dir.path());
        assert_eq!(installed, vec!["base.en", "tiny"]);
    }

    #[test]
    fn test_list_installed_models_missing_dir_is_empty() {
        assert!(list_installed_models(Path::new("/nonexistent/models")).is_empty());
    }
}
