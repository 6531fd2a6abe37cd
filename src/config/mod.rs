use crate::errors::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
pub const STORAGE_API_BASE: &str = "https://storage.googleapis.com";

/// Runtime settings. Every field defaults to the value the tool shipped with,
/// so no config file is needed for the stock behaviour.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub label_name: String,
    pub inbox_label: String,
    pub recipient_prefix: String,
    pub greeting: String,
    pub attachment_text: String,
    pub no_attachment_text: String,
    pub follow_pages: bool,
    pub safe_mode: bool,
    pub api_base: String,
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploadSettings {
    pub bucket: String,
    pub local_path: PathBuf,
    pub destination: String,
    pub token_path: PathBuf,
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            label_name: "PROCESSED".to_string(),
            inbox_label: "INBOX".to_string(),
            recipient_prefix: "mi".to_string(),
            greeting: "Hello Michael! ".to_string(),
            attachment_text: "Your attachment is saved!".to_string(),
            no_attachment_text: "There is no attachment.".to_string(),
            follow_pages: false,
            safe_mode: false,
            api_base: GMAIL_API_BASE.to_string(),
            upload: UploadSettings::default(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            bucket: "xaimail".to_string(),
            local_path: PathBuf::from("A:/xai.xai"),
            destination: "xai.txt".to_string(),
            token_path: PathBuf::from("storage_token.json"),
            api_base: STORAGE_API_BASE.to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (explicit path, `MAILMARK_CONFIG`, or the
    /// per-user config dir if present), then `MAILMARK_*` env vars.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let mut settings = match config_file(explicit)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&raw)
            .map_err(|e| AppError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("MAILMARK_CREDENTIALS_PATH") {
            self.credentials_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("MAILMARK_TOKEN_PATH") {
            self.token_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("MAILMARK_LABEL") {
            self.label_name = v;
        }
        if let Ok(v) = env::var("MAILMARK_RECIPIENT_PREFIX") {
            self.recipient_prefix = v;
        }
        if let Some(v) = env_flag("MAILMARK_FOLLOW_PAGES") {
            self.follow_pages = v;
        }
        if let Some(v) = env_flag("MAILMARK_SAFE_MODE") {
            self.safe_mode = v;
        }
        if let Ok(v) = env::var("MAILMARK_GCS_BUCKET") {
            self.upload.bucket = v;
        }
        if let Ok(v) = env::var("MAILMARK_GCS_TOKEN_PATH") {
            self.upload.token_path = PathBuf::from(v);
        }
    }

    /// Store-side search predicate selecting items without the marker.
    pub fn unprocessed_query(&self) -> String {
        if self.label_name.chars().any(char::is_whitespace) {
            format!("-label:\"{}\"", self.label_name)
        } else {
            format!("-label:{}", self.label_name)
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
}

fn config_file(explicit: Option<&Path>) -> AppResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(custom) = env::var("MAILMARK_CONFIG") {
        return Ok(Some(PathBuf::from(custom)));
    }
    Ok(dirs::config_dir()
        .map(|dir| dir.join("mailmark").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists()))
}
