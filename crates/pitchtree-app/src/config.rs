// Configuration loading and parsing (dashboard.toml, scoring.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use pitchtree_client::ClientSettings;
use pitchtree_core::scoring::{CountScoringEngine, ScoreBounds};
use pitchtree_core::weights::{CountDifficultyModifier, CountWeights};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub report: ReportConfig,
    pub demo: DemoConfig,
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
}

impl Config {
    /// Scoring engine built from the validated tables.
    pub fn engine(&self) -> Result<CountScoringEngine, ConfigError> {
        CountScoringEngine::new(
            self.scoring.weights.clone(),
            self.scoring.modifiers.clone(),
            self.scoring.bounds,
        )
        .map_err(|e| ConfigError::ValidationError {
            field: "scoring".into(),
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// dashboard.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire dashboard.toml file.
#[derive(Debug, Clone, Deserialize)]
struct DashboardFile {
    backend: BackendConfig,
    report: ReportConfig,
    #[serde(default)]
    demo: DemoConfig,
    session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl BackendConfig {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            upload_timeout: Duration::from_secs(self.upload_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Pitches kept per count node.
    pub top_n: usize,
    pub default_min_pitches: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// scoring.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct ScoringFile {
    #[serde(default)]
    bounds: ScoreBounds,
    #[serde(default)]
    weights: CountWeights,
    #[serde(default)]
    modifiers: CountDifficultyModifier,
}

/// Scoring tables: the built-in calibration with any scoring.toml entries
/// layered on top.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub bounds: ScoreBounds,
    pub weights: CountWeights,
    pub modifiers: CountDifficultyModifier,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            bounds: ScoreBounds::default(),
            weights: CountWeights::calibrated(),
            modifiers: CountDifficultyModifier::calibrated(),
        }
    }
}

impl ScoringConfig {
    fn from_file(file: ScoringFile) -> Self {
        let mut config = ScoringConfig {
            bounds: file.bounds,
            ..ScoringConfig::default()
        };
        for (count, w) in file.weights.iter() {
            config.weights.insert(*count, *w);
        }
        for count in pitchtree_core::Count::all() {
            if let Some(m) = file.modifiers.get(count) {
                config.modifiers.insert(count, m);
            }
        }
        config
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load `config/dashboard.toml` and (optionally) `config/scoring.toml`
/// relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- dashboard.toml (required) ---
    let dashboard_path = config_dir.join("dashboard.toml");
    let dashboard_text = read_file(&dashboard_path)?;
    let dashboard: DashboardFile =
        toml::from_str(&dashboard_text).map_err(|e| ConfigError::ParseError {
            path: dashboard_path.clone(),
            source: e,
        })?;

    // --- scoring.toml (optional) ---
    let scoring_path = config_dir.join("scoring.toml");
    let scoring = if scoring_path.exists() {
        let text = read_file(&scoring_path)?;
        let file: ScoringFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: scoring_path.clone(),
            source: e,
        })?;
        ScoringConfig::from_file(file)
    } else {
        ScoringConfig::default()
    };

    let config = Config {
        backend: dashboard.backend,
        report: dashboard.report,
        demo: dashboard.demo,
        session: dashboard.session,
        scoring,
    };

    validate(&config)?;

    Ok(config)
}

/// A file shipped in `defaults/`.
#[derive(Debug, Clone, Copy)]
enum ShippedFile {
    Dashboard,
    Scoring,
}

impl ShippedFile {
    const ALL: [ShippedFile; 2] = [ShippedFile::Dashboard, ShippedFile::Scoring];

    fn file_name(self) -> &'static str {
        match self {
            ShippedFile::Dashboard => "dashboard.toml",
            ShippedFile::Scoring => "scoring.toml",
        }
    }

    /// `scoring.toml` may be absent; the built-in calibration applies then.
    fn required(self) -> bool {
        matches!(self, ShippedFile::Dashboard)
    }

    /// Parse `text` as this file's config type.
    fn check(self, path: &Path, text: &str) -> Result<(), ConfigError> {
        let parsed = match self {
            ShippedFile::Dashboard => toml::from_str::<DashboardFile>(text).map(drop),
            ShippedFile::Scoring => toml::from_str::<ScoringFile>(text).map(drop),
        };
        parsed.map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Seed `config/` with the shipped `dashboard.toml` and `scoring.toml`.
///
/// A default is copied only when `config/` lacks that file, and only after
/// it parses, so a broken default is reported against `defaults/` rather
/// than as a config error later. Existing files are never overwritten.
/// Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let mut copied = Vec::new();

    for file in ShippedFile::ALL {
        let target = config_dir.join(file.file_name());
        if target.exists() {
            continue;
        }

        let source = defaults_dir.join(file.file_name());
        if !source.is_file() {
            if file.required() {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!(
                        "{} is missing and no default exists at {}; \
                         run from the project root or restore defaults/",
                        target.display(),
                        source.display()
                    ),
                });
            }
            continue;
        }

        let text = read_file(&source)?;
        file.check(&source, &text)?;

        std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create config directory: {e}"),
        })?;
        // create_new: another process may have written the file meanwhile.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                std::io::Write::write_all(&mut dest, text.as_bytes()).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying default
/// files into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let backend = &config.backend;
    if backend.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "backend.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    let timeouts: &[(&str, u64)] = &[
        ("backend.request_timeout_secs", backend.request_timeout_secs),
        ("backend.connect_timeout_secs", backend.connect_timeout_secs),
        ("backend.upload_timeout_secs", backend.upload_timeout_secs),
    ];
    for (name, val) in timeouts {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if config.report.top_n == 0 {
        return Err(ConfigError::ValidationError {
            field: "report.top_n".into(),
            message: "must be > 0".into(),
        });
    }
    if config.report.default_min_pitches == 0 {
        return Err(ConfigError::ValidationError {
            field: "report.default_min_pitches".into(),
            message: "must be > 0".into(),
        });
    }

    if config.session.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "session.db_path".into(),
            message: "must not be empty".into(),
        });
    }

    let scoring = &config.scoring;
    scoring
        .bounds
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "scoring.bounds".into(),
            message: e.to_string(),
        })?;
    scoring
        .weights
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "scoring.weights".into(),
            message: e.to_string(),
        })?;
    scoring
        .modifiers
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "scoring.modifiers".into(),
            message: e.to_string(),
        })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
