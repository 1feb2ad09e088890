//! Configuration for placepro paths and service settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PLACEPRO_HOME, PLACEPRO_UPLOAD_URL, ...)
//! 2. Config file (.placepro/config.yaml)
//! 3. Defaults (~/.placepro)
//!
//! Config file discovery:
//! - Searches current directory and parents for .placepro/config.yaml
//! - Paths in config file are relative to the config file's parent directory
//!
//! Provider credentials are read once at startup and never rotated at
//! runtime; the API key itself stays in the environment and only the
//! variable name lives in the config file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub session: Option<SessionConfig>,
    #[serde(default)]
    pub speech: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Upload endpoint of the remote storage provider
    pub upload_url: Option<String>,
    /// Environment variable holding the provider API key
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub answer_timeout_secs: Option<u64>,
    pub prompt_delay_ms: Option<u64>,
    /// Base URL of the placement backend (for the interview API)
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Command used to speak a question aloud (text passed as last arg)
    pub synthesizer_cmd: Option<String>,
    #[serde(default)]
    pub synthesizer_args: Vec<String>,
    /// Command used to record microphone audio (output path as last arg)
    pub capture_cmd: Option<String>,
    #[serde(default)]
    pub capture_args: Vec<String>,
    /// Command used to transcribe recorded audio (whisper-style JSON output)
    pub transcriber_cmd: Option<String>,
    /// Transcription model name
    pub transcriber_model: Option<String>,
    /// Command spawned to hold the camera/mic preview stream open
    pub media_cmd: Option<String>,
    #[serde(default)]
    pub media_args: Vec<String>,
}

/// Resolved configuration with absolute paths and defaults filled in
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to placepro home (ledger, session logs)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Storage provider settings
    pub storage: StorageSettings,
    /// Interview session settings
    pub session: SessionSettings,
    /// Speech engine settings
    pub speech: SpeechSettings,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub upload_url: String,
    pub api_key_env: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_url: "https://assets.placepro.local/v1/upload".to_string(),
            api_key_env: "PLACEPRO_STORAGE_KEY".to_string(),
        }
    }
}

impl StorageSettings {
    /// Read the provider API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).with_context(|| {
            format!("Storage API key not set (expected in ${})", self.api_key_env)
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// How long recognition may run before a question is marked unanswered
    pub answer_timeout_secs: u64,
    /// Pause between question playback and the start of capture
    pub prompt_delay_ms: u64,
    pub api_base: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            answer_timeout_secs: 60,
            prompt_delay_ms: 500,
            api_base: "http://localhost:4000".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub synthesizer_cmd: Option<String>,
    pub synthesizer_args: Vec<String>,
    pub capture_cmd: Option<String>,
    pub capture_args: Vec<String>,
    pub transcriber_cmd: Option<String>,
    pub transcriber_model: String,
    pub media_cmd: Option<String>,
    pub media_args: Vec<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            synthesizer_cmd: None,
            synthesizer_args: Vec::new(),
            capture_cmd: None,
            capture_args: Vec::new(),
            transcriber_cmd: None,
            transcriber_model: "base".to_string(),
            media_cmd: None,
            media_args: Vec::new(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".placepro").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".placepro");

    let config_file = find_config_file();

    let (home, storage, session, speech) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // home is relative to the .placepro/ directory
        let home = if let Ok(env_home) = std::env::var("PLACEPRO_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            let placepro_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(placepro_dir, home_path)
        } else {
            default_home.clone()
        };

        let storage = resolve_storage(config.storage);
        let session = resolve_session(config.session);
        let speech = resolve_speech(config.speech);

        (home, storage, session, speech)
    } else {
        let home = std::env::var("PLACEPRO_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        (
            home,
            resolve_storage(None),
            resolve_session(None),
            resolve_speech(None),
        )
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        storage,
        session,
        speech,
    })
}

fn resolve_storage(file: Option<StorageConfig>) -> StorageSettings {
    let defaults = StorageSettings::default();

    let upload_url = std::env::var("PLACEPRO_UPLOAD_URL")
        .ok()
        .or_else(|| file.as_ref().and_then(|s| s.upload_url.clone()));

    StorageSettings {
        upload_url: upload_url.unwrap_or(defaults.upload_url),
        api_key_env: file
            .as_ref()
            .and_then(|s| s.api_key_env.clone())
            .unwrap_or(defaults.api_key_env),
    }
}

fn resolve_session(file: Option<SessionConfig>) -> SessionSettings {
    let defaults = SessionSettings::default();

    let api_base = std::env::var("PLACEPRO_API_BASE")
        .ok()
        .or_else(|| file.as_ref().and_then(|s| s.api_base.clone()));

    SessionSettings {
        answer_timeout_secs: file
            .as_ref()
            .and_then(|s| s.answer_timeout_secs)
            .unwrap_or(defaults.answer_timeout_secs),
        prompt_delay_ms: file
            .as_ref()
            .and_then(|s| s.prompt_delay_ms)
            .unwrap_or(defaults.prompt_delay_ms),
        api_base: api_base.unwrap_or(defaults.api_base),
    }
}

fn resolve_speech(file: Option<SpeechConfig>) -> SpeechSettings {
    let defaults = SpeechSettings::default();

    match file {
        Some(s) => SpeechSettings {
            synthesizer_cmd: s.synthesizer_cmd,
            synthesizer_args: s.synthesizer_args,
            capture_cmd: s.capture_cmd,
            capture_args: s.capture_args,
            transcriber_cmd: s.transcriber_cmd,
            transcriber_model: s.transcriber_model.unwrap_or(defaults.transcriber_model),
            media_cmd: s.media_cmd,
            media_args: s.media_args,
        },
        None => defaults,
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the placepro home directory.
pub fn placepro_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the upload ledger path ($PLACEPRO_HOME/uploads.jsonl)
pub fn ledger_path() -> Result<PathBuf> {
    Ok(config()?.home.join("uploads.jsonl"))
}

/// Get the session logs directory ($PLACEPRO_HOME/sessions)
pub fn sessions_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("sessions"))
}
