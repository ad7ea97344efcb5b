//! The resolved request for one run: action plus parameters, with command-line
//! values layered over env-file defaults.

use std::path::PathBuf;

use crate::{
    cli::{Action, Cli},
    config::Config,
};

/// Exclude patterns from `BACKUP_EXCLUDE` followed by those from `--exclude`.
///
/// Each entry is trimmed and empty entries are dropped.  Order is kept since
/// the patterns are passed positionally to restic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeList {
    from_config: Vec<String>,
    from_cli: Vec<String>,
}

impl ExcludeList {
    pub fn new(config_value: Option<&str>, cli_values: &[String]) -> Self {
        let from_config = config_value
            .map(|raw| clean(raw.split(',')))
            .unwrap_or_default();
        Self {
            from_config,
            from_cli: clean(cli_values.iter().map(String::as_str)),
        }
    }

    /// All patterns, configuration first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.from_config
            .iter()
            .chain(&self.from_cli)
            .map(String::as_str)
    }

    pub fn from_config(&self) -> &[String] {
        &self.from_config
    }

    pub fn from_cli(&self) -> &[String] {
        &self.from_cli
    }

    pub fn len(&self) -> usize {
        self.from_config.len() + self.from_cli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn clean<'a>(patterns: impl Iterator<Item = &'a str>) -> Vec<String> {
    patterns
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Everything one run needs to know about what to do.  Built once, never
/// mutated.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub action: Action,
    pub source_type: String,
    pub source_value: Option<String>,
    pub stdin_filename: Option<String>,
    pub excludes: ExcludeList,
    pub snapshot_id: Option<String>,
    pub snapshot_id1: Option<String>,
    pub snapshot_id2: Option<String>,
    pub target_dir: Option<PathBuf>,
    pub pattern: Option<String>,
    pub mount_dir: Option<PathBuf>,
}

impl InvocationRequest {
    /// Merge command-line values over configuration defaults.
    pub fn resolve(action: Action, cli: &Cli, config: &Config) -> Self {
        let backup = &config.backup;
        Self {
            action,
            source_type: cli
                .source_type
                .clone()
                .unwrap_or_else(|| backup.source_type.clone()),
            source_value: cli.source_value.clone().or_else(|| backup.source_value.clone()),
            stdin_filename: cli
                .stdin_filename
                .clone()
                .or_else(|| backup.stdin_filename.clone()),
            excludes: ExcludeList::new(backup.exclude.as_deref(), &cli.exclude),
            snapshot_id: cli.snapshot_id.clone(),
            snapshot_id1: cli.snapshot_id1.clone(),
            snapshot_id2: cli.snapshot_id2.clone(),
            target_dir: cli.target_dir.clone(),
            pattern: cli.pattern.clone(),
            mount_dir: cli.mount_dir.clone(),
        }
    }
}
