use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub stt: SttConfig,
    pub diarization: DiarizationConfig,
    pub format: FormatSettings,
    pub models: ModelsConfig,
}

/// Worker loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Heartbeat tick interval in seconds for long blocking stages.
    pub heartbeat_interval_secs: u64,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
    /// Whisper decode threads; 0 means auto (all cores, capped).
    pub threads: u32,
}

/// Speaker diarization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiarizationConfig {
    pub clustering_threshold: f32,
    pub min_duration_on: f64,
    pub min_duration_off: f64,
    pub energy_threshold: f32,
}

/// Paragraph formatting configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormatSettings {
    pub pause_threshold: f64,
    pub min_sentences_per_paragraph: usize,
}

/// Model storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ModelsConfig {
    /// Override for the model cache directory; None uses the platform cache.
    pub dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: defaults::HEARTBEAT_TICK_SECS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: 0,
        }
    }
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self {
            clustering_threshold: defaults::CLUSTERING_THRESHOLD,
            min_duration_on: defaults::MIN_DURATION_ON,
            min_duration_off: defaults::MIN_DURATION_OFF,
            energy_threshold: defaults::SEGMENTER_ENERGY_THRESHOLD,
        }
    }
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            pause_threshold: defaults::PARAGRAPH_PAUSE_THRESHOLD,
            min_sentences_per_paragraph: defaults::MIN_SENTENCES_PER_PARAGRAPH,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is a hard
    /// error since silently ignoring it would mask typos.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIVEN_MODEL → stt.model
    /// - SCRIVEN_LANGUAGE → stt.language
    /// - SCRIVEN_MODELS_DIR → models.dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("SCRIVEN_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("SCRIVEN_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(dir) = std::env::var("SCRIVEN_MODELS_DIR")
            && !dir.is_empty()
        {
            self.models.dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scriven/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("scriven")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_scriven_env() {
        remove_env("SCRIVEN_MODEL");
        remove_env("SCRIVEN_LANGUAGE");
        remove_env("SCRIVEN_MODELS_DIR");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.worker.heartbeat_interval_secs, 3);

        assert_eq!(config.stt.model, "base");
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.stt.threads, 0);

        assert_eq!(config.diarization.clustering_threshold, 0.5);
        assert_eq!(config.diarization.min_duration_on, 0.3);
        assert_eq!(config.diarization.min_duration_off, 0.5);

        assert_eq!(config.format.pause_threshold, 0.7);
        assert_eq!(config.format.min_sentences_per_paragraph, 3);

        assert_eq!(config.models.dir, None);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[worker]
heartbeat_interval_secs = 5

[stt]
model = "small"
language = "de"
threads = 4

[diarization]
clustering_threshold = 0.4

[format]
pause_threshold = 1.0
min_sentences_per_paragraph = 2

[models]
dir = "/opt/models"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.worker.heartbeat_interval_secs, 5);
        assert_eq!(config.stt.model, "small");
        assert_eq!(config.stt.language, "de");
        assert_eq!(config.stt.threads, 4);
        assert_eq!(config.diarization.clustering_threshold, 0.4);
        assert_eq!(config.format.pause_threshold, 1.0);
        assert_eq!(config.format.min_sentences_per_paragraph, 2);
        assert_eq!(config.models.dir, Some(PathBuf::from("/opt/models")));
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[stt]
model = "medium"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.stt.model, "medium");
        // Everything else falls back to defaults
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.worker.heartbeat_interval_secs, 3);
        assert_eq!(config.diarization.clustering_threshold, 0.5);
    }

    #[test]
    fn test_load_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not [valid toml").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_invalid_toml_still_errors() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[stt\nmodel=").unwrap();

        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_scriven_env();

        set_env("SCRIVEN_MODEL", "large-v3");
        set_env("SCRIVEN_LANGUAGE", "fr");
        set_env("SCRIVEN_MODELS_DIR", "/tmp/models");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.model, "large-v3");
        assert_eq!(config.stt.language, "fr");
        assert_eq!(config.models.dir, Some(PathBuf::from("/tmp/models")));

        clear_scriven_env();
    }

    #[test]
    fn test_env_overrides_ignore_empty_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_scriven_env();

        set_env("SCRIVEN_MODEL", "");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.stt.model, "base");

        clear_scriven_env();
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config {
            stt: SttConfig {
                model: "small.en".to_string(),
                language: "en".to_string(),
                threads: 2,
            },
            ..Config::default()
        };

        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
