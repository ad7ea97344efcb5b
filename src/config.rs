//! Configuration types and loading logic.
//!
//! `Config` is built once from a dotenv-style `key=value` file and then passed
//! by reference to every component that needs it.  Nothing is exported into
//! the process environment: restic receives the repository on its command
//! line and the password through its child environment only.
//!
//! # File format
//!
//! ```text
//! # required
//! RESTIC_REPOSITORY=/srv/restic/laptop
//! RESTIC_PASSWORD=correct-horse-battery-staple
//!
//! # retention (any subset)
//! KEEP_LAST=3
//! KEEP_DAILY=7
//! KEEP_WEEKLY=4
//! KEEP_MONTHLY=6
//! KEEP_YEARLY=1
//!
//! # backup defaults, overridable on the command line
//! BACKUP_SOURCE_TYPE=dir
//! BACKUP_SOURCE_VALUE=/home/alice
//! BACKUP_EXCLUDE=*.log, node_modules/
//!
//! # notifications
//! NOTIFY_ON_ERROR=true
//! WEBHOOK_URL=https://chat.example.com/hooks/abc
//! WEBHOOK_CHANNEL=backups
//! ```

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use serde::{Serialize, Serializer};
use thiserror::Error;

// ─── Keys ─────────────────────────────────────────────────────────────────────

pub const KEY_REPOSITORY: &str = "RESTIC_REPOSITORY";
pub const KEY_PASSWORD: &str = "RESTIC_PASSWORD";
pub const KEY_BINARY: &str = "RESTIC_BIN";
pub const KEY_KEEP_LAST: &str = "KEEP_LAST";
pub const KEY_KEEP_DAILY: &str = "KEEP_DAILY";
pub const KEY_KEEP_WEEKLY: &str = "KEEP_WEEKLY";
pub const KEY_KEEP_MONTHLY: &str = "KEEP_MONTHLY";
pub const KEY_KEEP_YEARLY: &str = "KEEP_YEARLY";
pub const KEY_SOURCE_TYPE: &str = "BACKUP_SOURCE_TYPE";
pub const KEY_SOURCE_VALUE: &str = "BACKUP_SOURCE_VALUE";
pub const KEY_STDIN_FILENAME: &str = "BACKUP_STDIN_FILENAME";
pub const KEY_EXCLUDE: &str = "BACKUP_EXCLUDE";
pub const KEY_NOTIFY_SUCCESS: &str = "NOTIFY_ON_SUCCESS";
pub const KEY_NOTIFY_ERROR: &str = "NOTIFY_ON_ERROR";
pub const KEY_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const KEY_WEBHOOK_CHANNEL: &str = "WEBHOOK_CHANNEL";
pub const KEY_WEBHOOK_USERNAME: &str = "WEBHOOK_USERNAME";
pub const KEY_WEBHOOK_EMOJI: &str = "WEBHOOK_EMOJI";
pub const KEY_WEBHOOK_ERROR_EMOJI: &str = "WEBHOOK_ERROR_EMOJI";

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("config file '{}' cannot be read: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file '{}' is malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("required setting {0} is missing or empty")]
    MissingRequired(&'static str),

    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidRetentionValue { key: &'static str, value: String },

    #[error("{key} must be true or false, got '{value}'")]
    InvalidToggle { key: &'static str, value: String },
}

// ─── Top-level ────────────────────────────────────────────────────────────────

/// Root configuration object, resolved from the env file plus defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub repo: RepoConfig,
    pub retention: RetentionPolicy,
    pub backup: BackupDefaults,
    pub notify: NotifyConfig,
}

// ─── repo ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RepoConfig {
    /// Local path or remote locator (`sftp:…`, `s3:…`, `rest:…`).
    pub repository: String,

    /// Encryption password, handed to restic as `RESTIC_PASSWORD`.
    #[serde(serialize_with = "redact")]
    pub password: String,

    /// Name looked up on `PATH`, or a path to the binary.
    pub binary: String,
}

// ─── retention ────────────────────────────────────────────────────────────────

/// Counts passed to `restic forget`.  Unset counters are not passed at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    pub keep_last: Option<u32>,
    pub keep_daily: Option<u32>,
    pub keep_weekly: Option<u32>,
    pub keep_monthly: Option<u32>,
    pub keep_yearly: Option<u32>,
}

impl RetentionPolicy {
    /// `(restic flag, count)` for every configured counter, in a fixed order.
    pub fn flags(&self) -> Vec<(&'static str, u32)> {
        [
            ("--keep-last", self.keep_last),
            ("--keep-daily", self.keep_daily),
            ("--keep-weekly", self.keep_weekly),
            ("--keep-monthly", self.keep_monthly),
            ("--keep-yearly", self.keep_yearly),
        ]
        .into_iter()
        .filter_map(|(flag, count)| count.map(|n| (flag, n)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.flags().is_empty()
    }
}

// ─── backup ───────────────────────────────────────────────────────────────────

/// Backup source defaults.  Command-line flags override each of these.
#[derive(Debug, Clone, Serialize)]
pub struct BackupDefaults {
    /// `"dir"` or `"stdin"`; validated later, not here.
    pub source_type: String,
    pub source_value: Option<String>,
    pub stdin_filename: Option<String>,
    /// Raw comma-separated value of `BACKUP_EXCLUDE`.
    pub exclude: Option<String>,
}

// ─── notify ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct NotifyConfig {
    pub on_success: bool,
    pub on_error: bool,
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    pub username: String,
    pub emoji: String,
    pub error_emoji: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            on_success: false,
            on_error: false,
            webhook_url: None,
            channel: None,
            username: default_webhook_username(),
            emoji: default_webhook_emoji(),
            error_emoji: default_webhook_error_emoji(),
        }
    }
}

// ─── Defaults ─────────────────────────────────────────────────────────────────

pub fn default_binary() -> String {
    "restic".into()
}

pub fn default_source_type() -> String {
    "dir".into()
}

pub fn default_webhook_username() -> String {
    "resticw".into()
}

pub fn default_webhook_emoji() -> String {
    ":floppy_disk:".into()
}

pub fn default_webhook_error_emoji() -> String {
    ":rotating_light:".into()
}

/// Env file used when `--env-file` is not given.
///
/// `./.env` wins when present; otherwise `~/.config/resticw/env`.  If neither
/// exists `./.env` is returned so the loader reports a useful path.
pub fn default_env_file() -> PathBuf {
    let local = PathBuf::from(".env");
    if local.exists() {
        return local;
    }
    dirs_next::config_dir()
        .map(|d| d.join("resticw").join("env"))
        .filter(|p| p.exists())
        .unwrap_or(local)
}

fn redact<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("***")
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Read, parse, and resolve the env file at `path`.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let settings = parse_settings(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Config::from_settings(&settings)
}

/// Parse `key=value` lines.  A later assignment of the same key wins.
pub fn parse_settings(text: &str) -> Result<HashMap<String, String>, dotenvy::Error> {
    let mut settings = HashMap::new();
    for item in dotenvy::from_read_iter(text.as_bytes()) {
        let (key, value) = item?;
        settings.insert(key, value);
    }
    Ok(settings)
}

impl Config {
    /// Apply defaults and validate a parsed settings map.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            settings
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let repository = get(KEY_REPOSITORY).ok_or(ConfigError::MissingRequired(KEY_REPOSITORY))?;
        let password = get(KEY_PASSWORD).ok_or(ConfigError::MissingRequired(KEY_PASSWORD))?;

        let retention = RetentionPolicy {
            keep_last: parse_count(KEY_KEEP_LAST, get(KEY_KEEP_LAST))?,
            keep_daily: parse_count(KEY_KEEP_DAILY, get(KEY_KEEP_DAILY))?,
            keep_weekly: parse_count(KEY_KEEP_WEEKLY, get(KEY_KEEP_WEEKLY))?,
            keep_monthly: parse_count(KEY_KEEP_MONTHLY, get(KEY_KEEP_MONTHLY))?,
            keep_yearly: parse_count(KEY_KEEP_YEARLY, get(KEY_KEEP_YEARLY))?,
        };

        let notify = NotifyConfig {
            on_success: parse_toggle(KEY_NOTIFY_SUCCESS, get(KEY_NOTIFY_SUCCESS))?,
            on_error: parse_toggle(KEY_NOTIFY_ERROR, get(KEY_NOTIFY_ERROR))?,
            webhook_url: get(KEY_WEBHOOK_URL),
            channel: get(KEY_WEBHOOK_CHANNEL),
            username: get(KEY_WEBHOOK_USERNAME).unwrap_or_else(default_webhook_username),
            emoji: get(KEY_WEBHOOK_EMOJI).unwrap_or_else(default_webhook_emoji),
            error_emoji: get(KEY_WEBHOOK_ERROR_EMOJI).unwrap_or_else(default_webhook_error_emoji),
        };

        Ok(Self {
            repo: RepoConfig {
                repository,
                password,
                binary: get(KEY_BINARY).unwrap_or_else(default_binary),
            },
            retention,
            backup: BackupDefaults {
                source_type: get(KEY_SOURCE_TYPE).unwrap_or_else(default_source_type),
                source_value: get(KEY_SOURCE_VALUE),
                stdin_filename: get(KEY_STDIN_FILENAME),
                exclude: get(KEY_EXCLUDE),
            },
            notify,
        })
    }
}

fn parse_count(key: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    value
        .map(|v| {
            v.parse::<u32>()
                .map_err(|_| ConfigError::InvalidRetentionValue { key, value: v })
        })
        .transpose()
}

fn parse_toggle(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidToggle { key, value }),
    }
}

/// A valid config with `/srv/restic` + `hunter2`, plus `extra` settings.
#[cfg(test)]
pub(crate) fn for_tests(extra: &[(&str, &str)]) -> Config {
    let settings: HashMap<String, String> = [
        (KEY_REPOSITORY, "/srv/restic"),
        (KEY_PASSWORD, "hunter2"),
    ]
    .into_iter()
    .chain(extra.iter().copied())
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    Config::from_settings(&settings).expect("test settings must be valid")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
