//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  Parsing happens in two passes:
//!
//! 1. [`early_exit`] scans the raw tokens for `--help` / `--version` and wins over everything else,
//!    including unknown flags and a broken config file.
//! 2. [`Cli::try_parse_from`] does the strict parse; its errors are mapped onto [`ArgumentError`] so
//!    they exit with the same status as every other failure.

use std::{fmt, path::PathBuf, process::ExitCode};

use clap::{
    CommandFactory, Parser, ValueEnum,
    error::{ContextKind, ContextValue, ErrorKind},
};
use thiserror::Error;

/// Top-level CLI arguments.
#[derive(Parser, Debug, Default)]
#[command(
    name    = "resticw",
    about   = "A restic wrapper driven by an env file",
    version,
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Cli {
    /// Action to perform.
    #[arg(long, value_enum)]
    pub action: Option<Action>,

    /// Path to the env file.
    ///
    /// Defaults to `./.env`, then `~/.config/resticw/env`.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Append log lines to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print the resolved configuration (password redacted) and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Backup source type: `dir` or `stdin`.
    #[arg(long, value_name = "TYPE")]
    pub source_type: Option<String>,

    /// Directory to back up when the source type is `dir`.
    #[arg(long, value_name = "PATH")]
    pub source_value: Option<String>,

    /// File name recorded in the snapshot for stdin backups.
    #[arg(long, value_name = "NAME")]
    pub stdin_filename: Option<String>,

    /// Exclude pattern; may be repeated.  Added after `BACKUP_EXCLUDE`.
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Snapshot to restore or list.
    #[arg(long, value_name = "ID")]
    pub snapshot_id: Option<String>,

    /// Restore target directory.
    #[arg(long, value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// First snapshot for `diff`.
    #[arg(long = "snapshot-id1", value_name = "ID")]
    pub snapshot_id1: Option<String>,

    /// Second snapshot for `diff`.
    #[arg(long = "snapshot-id2", value_name = "ID")]
    pub snapshot_id2: Option<String>,

    /// Search pattern for `find`.
    #[arg(long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Mount point for `mount`.
    #[arg(long, value_name = "DIR")]
    pub mount_dir: Option<PathBuf>,
}

/// Named actions accepted by `--action`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List snapshots.
    Snapshots,
    /// Back up a directory or stdin.
    Backup,
    /// check, backup, check, forget/prune, cache cleanup, check, snapshots, stats.
    #[value(name = "backup-flow")]
    BackupFlow,
    /// Verify repository integrity.
    Check,
    /// Repository statistics.
    Stats,
    /// Statistics of the latest snapshot.
    #[value(name = "stats.latest")]
    StatsLatest,
    /// Remove stale cache directories.
    #[value(name = "cache.cleanup")]
    CacheCleanup,
    /// Apply the retention policy and prune.
    Forget,
    /// Create the repository.
    Init,
    /// Remove stale locks.
    Unlock,
    /// Restore a snapshot into --target-dir.
    Restore,
    /// Restore the latest snapshot into --target-dir.
    #[value(name = "restore.latest")]
    RestoreLatest,
    /// List files in a snapshot.
    Ls,
    /// Search snapshots for --pattern.
    Find,
    /// Mount the repository at --mount-dir.
    Mount,
    /// Compare two snapshots.
    Diff,
}

impl Action {
    /// The name as written on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snapshots => "snapshots",
            Self::Backup => "backup",
            Self::BackupFlow => "backup-flow",
            Self::Check => "check",
            Self::Stats => "stats",
            Self::StatsLatest => "stats.latest",
            Self::CacheCleanup => "cache.cleanup",
            Self::Forget => "forget",
            Self::Init => "init",
            Self::Unlock => "unlock",
            Self::Restore => "restore",
            Self::RestoreLatest => "restore.latest",
            Self::Ls => "ls",
            Self::Find => "find",
            Self::Mount => "mount",
            Self::Diff => "diff",
        }
    }

    /// Whether this action backs up data (and so needs a validated source).
    pub const fn backs_up(self) -> bool {
        matches!(self, Self::Backup | Self::BackupFlow)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),

    #[error("flag {0} requires a value")]
    MissingFlagValue(String),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("no action given; pass --action <NAME>")]
    MissingAction,

    #[error("{0}")]
    Invalid(String),
}

impl From<clap::Error> for ArgumentError {
    fn from(err: clap::Error) -> Self {
        let context = |kind| match err.get(kind) {
            Some(ContextValue::String(s)) => Some(s.clone()),
            _ => None,
        };
        // clap renders the offending option as `--flag <VALUE>`.
        let flag = context(ContextKind::InvalidArg)
            .and_then(|arg| arg.split_whitespace().next().map(str::to_owned))
            .unwrap_or_default();

        match err.kind() {
            ErrorKind::UnknownArgument => Self::UnknownArgument(flag),
            ErrorKind::InvalidValue => match context(ContextKind::InvalidValue) {
                Some(value) if !value.is_empty() => Self::InvalidValue { flag, value },
                _ => Self::MissingFlagValue(flag),
            },
            _ => {
                let rendered = err.to_string();
                let first = rendered.lines().next().unwrap_or_default();
                Self::Invalid(first.trim_start_matches("error: ").to_owned())
            },
        }
    }
}

// ─── Early pass ───────────────────────────────────────────────────────────────

/// Requests that end the process before configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyExit {
    Help,
    Version,
}

impl EarlyExit {
    /// Print help or version to stdout.
    pub fn run(self) -> ExitCode {
        match self {
            Self::Help => {
                // Nothing useful to do if stdout is gone.
                let _ = Cli::command().print_help();
            },
            Self::Version => {
                let cmd = Cli::command();
                println!("{} {}", cmd.get_name(), cmd.get_version().unwrap_or_default());
            },
        }
        ExitCode::SUCCESS
    }
}

/// Look for `--help` / `--version` anywhere in `args` (program name first).
///
/// All other tokens are ignored, valid or not.
pub fn early_exit(args: &[String]) -> Option<EarlyExit> {
    args.iter().skip(1).find_map(|arg| match arg.as_str() {
        "--help" | "-h" => Some(EarlyExit::Help),
        "--version" | "-V" => Some(EarlyExit::Version),
        _ => None,
    })
}

/// Usage line for the missing-action error.
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(extra: &[&str]) -> Vec<String> {
        std::iter::once("resticw")
            .chain(extra.iter().copied())
            .map(String::from)
            .collect()
    }

    fn parse(extra: &[&str]) -> Result<Cli, ArgumentError> {
        Cli::try_parse_from(argv(extra)).map_err(ArgumentError::from)
    }

    // ── early_exit ────────────────────────────────────────────────────────────

    #[test]
    fn help_wins_over_unknown_flags() {
        let args = argv(&["--bogus", "value", "--help"]);
        assert_eq!(early_exit(&args), Some(EarlyExit::Help));
    }

    #[test]
    fn version_is_recognised() {
        assert_eq!(early_exit(&argv(&["-V"])), Some(EarlyExit::Version));
    }

    #[test]
    fn first_early_flag_wins() {
        let args = argv(&["--version", "--help"]);
        assert_eq!(early_exit(&args), Some(EarlyExit::Version));
    }

    #[test]
    fn ordinary_args_are_not_early() {
        assert_eq!(early_exit(&argv(&["--action", "check"])), None);
        assert_eq!(early_exit(&argv(&[])), None);
    }

    // ── strict parse ──────────────────────────────────────────────────────────

    #[test]
    fn action_names_match_command_line_spelling() {
        for action in Action::value_variants() {
            let cli = parse(&["--action", action.as_str()]).unwrap();
            assert_eq!(cli.action, Some(*action));
        }
    }

    #[test]
    fn dotted_action_names_parse() {
        let cli = parse(&["--action", "restore.latest", "--target-dir", "/tmp/r"]).unwrap();
        assert_eq!(cli.action, Some(Action::RestoreLatest));
        assert_eq!(cli.target_dir, Some(PathBuf::from("/tmp/r")));
    }

    #[test]
    fn exclude_may_repeat_in_order() {
        let cli = parse(&["--exclude", "*.tmp", "--exclude", "cache/"]).unwrap();
        assert_eq!(cli.exclude, vec!["*.tmp", "cache/"]);
    }

    #[test]
    fn diff_snapshot_flags() {
        let cli = parse(&["--snapshot-id1", "aaa", "--snapshot-id2", "bbb"]).unwrap();
        assert_eq!(cli.snapshot_id1.as_deref(), Some("aaa"));
        assert_eq!(cli.snapshot_id2.as_deref(), Some("bbb"));
    }

    #[test]
    fn action_is_optional_at_parse_time() {
        assert!(parse(&[]).unwrap().action.is_none());
    }

    // ── error mapping ─────────────────────────────────────────────────────────

    #[test]
    fn unknown_flag_is_reported_by_name() {
        match parse(&["--frobnicate"]) {
            Err(ArgumentError::UnknownArgument(token)) => assert_eq!(token, "--frobnicate"),
            other => panic!("expected UnknownArgument, got {other:?}"),
        }
    }

    #[test]
    fn trailing_flag_without_value_is_missing_value() {
        match parse(&["--action", "restore", "--target-dir"]) {
            Err(ArgumentError::MissingFlagValue(flag)) => assert_eq!(flag, "--target-dir"),
            other => panic!("expected MissingFlagValue, got {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_invalid_value() {
        match parse(&["--action", "explode"]) {
            Err(ArgumentError::InvalidValue { flag, value }) => {
                assert_eq!(flag, "--action");
                assert_eq!(value, "explode");
            },
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn usage_mentions_binary() {
        assert!(usage().contains("resticw"));
    }
}
