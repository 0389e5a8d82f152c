use facesort_core::{EuclideanMatcher, InferenceOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// An environment override whose value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    pub key: &'static str,
    pub value: String,
}

/// Run configuration.
///
/// Layered as defaults, then an optional TOML file, then `FACESORT_*`
/// environment variables. CLI flags are applied last by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// Maximum Euclidean distance between embeddings for a match.
    pub tolerance: f32,
    /// Request GPU inference.
    pub use_gpu: bool,
    /// ONNX Runtime intra-op threads per model.
    pub intra_threads: usize,
    /// Descend into subdirectories of the dataset folder.
    pub recursive: bool,
    /// Log a progress line every N images.
    pub progress_interval: usize,
    /// Log file written alongside stderr output. `None` disables it.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: facesort_core::default_model_dir(),
            tolerance: EuclideanMatcher::DEFAULT_TOLERANCE,
            use_gpu: true,
            intra_threads: 2,
            recursive: false,
            progress_interval: 50,
            log_file: Some(PathBuf::from("face_recognition.log")),
        }
    }
}

impl Config {
    /// Load defaults, the optional config file and environment overrides.
    ///
    /// Rejected overrides are returned rather than logged, since this runs
    /// before the subscriber is installed.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<RejectedOverride>), ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with environment lookups routed through `lookup`.
    pub fn load_with(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Vec<RejectedOverride>), ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let rejected = config.apply_overrides(lookup);
        Ok((config, rejected))
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `FACESORT_*` overrides read through `lookup`.
    ///
    /// Values that fail to parse leave the setting unchanged and are
    /// returned so the caller can report them.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<RejectedOverride> {
        let mut rejected = Vec::new();
        if let Some(dir) = lookup("FACESORT_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var(&lookup, "FACESORT_TOLERANCE", &mut rejected) {
            self.tolerance = v;
        }
        if let Some(v) = lookup("FACESORT_USE_GPU") {
            self.use_gpu = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = parse_var(&lookup, "FACESORT_THREADS", &mut rejected) {
            self.intra_threads = v;
        }
        if let Some(v) = lookup("FACESORT_RECURSIVE") {
            self.recursive = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = parse_var(&lookup, "FACESORT_PROGRESS_INTERVAL", &mut rejected) {
            self.progress_interval = v;
        }
        if let Some(v) = lookup("FACESORT_LOG_FILE") {
            self.log_file = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        rejected
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if self.intra_threads == 0 {
            return Err(ConfigError::Invalid("intra_threads must be at least 1".into()));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::Invalid("progress_interval must be at least 1".into()));
        }
        Ok(())
    }

    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            intra_threads: self.intra_threads,
            use_gpu: self.use_gpu,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    rejected: &mut Vec<RejectedOverride>,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            rejected.push(RejectedOverride { key, value: raw });
            None
        }
    }
}
