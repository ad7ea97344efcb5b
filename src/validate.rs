//! Per-action parameter checks, run once before anything is executed.
//!
//! | action          | required                         |
//! |-----------------|----------------------------------|
//! | restore         | `--snapshot-id`, `--target-dir`  |
//! | restore.latest  | `--target-dir`                   |
//! | ls              | `--snapshot-id`                  |
//! | find            | `--pattern`                      |
//! | mount           | `--mount-dir`                    |
//! | diff            | `--snapshot-id1`, `--snapshot-id2` |
//! | backup          | a valid [`BackupSource`]         |
//! | backup-flow     | a valid [`BackupSource`] and a retention policy |
//! | forget          | a retention policy               |
//!
//! Independently of the action, a supplied `--target-dir` must have an
//! existing, writable parent and a supplied `--mount-dir` must exist and be
//! writable.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{cli::Action, config::Config, request::InvocationRequest};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("action {action} requires {flag}")]
    MissingParameter { action: Action, flag: &'static str },

    #[error("source type must be 'dir' or 'stdin', got '{0}'")]
    InvalidSourceType(String),

    #[error("source type 'dir' requires --source-value or BACKUP_SOURCE_VALUE")]
    MissingSourceValue,

    #[error("source directory '{}' does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source '{}' is not a directory", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("source directory '{}' is not readable: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source type 'stdin' requires --stdin-filename or BACKUP_STDIN_FILENAME")]
    MissingStdinFilename,

    #[error("stdin filename '{0}' must not contain whitespace or path separators")]
    UnsafeStdinFilename(String),

    #[error("parent of target directory '{}' does not exist", .0.display())]
    TargetParentMissing(PathBuf),

    #[error("parent of target directory '{}' is not writable", .0.display())]
    TargetParentNotWritable(PathBuf),

    #[error("mount directory '{}' does not exist", .0.display())]
    MountDirMissing(PathBuf),

    #[error("mount directory '{}' is not writable", .0.display())]
    MountDirNotWritable(PathBuf),

    #[error("action {0} needs at least one KEEP_* retention setting")]
    NoRetentionPolicy(Action),
}

/// What a backup reads from, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupSource {
    Directory(PathBuf),
    Stdin { filename: String },
}

/// Check `request` against the rules in the module docs.
///
/// Returns the validated backup source for `backup` and `backup-flow`, and
/// `None` for every other action.
pub fn validate(
    request: &InvocationRequest,
    config: &Config,
) -> Result<Option<BackupSource>, ValidationError> {
    let action = request.action;

    for (flag, value) in required_params(request) {
        if value.is_none_or(|v| v.trim().is_empty()) {
            return Err(ValidationError::MissingParameter { action, flag });
        }
    }

    if matches!(action, Action::Forget | Action::BackupFlow) && config.retention.is_empty() {
        return Err(ValidationError::NoRetentionPolicy(action));
    }

    let source = if action.backs_up() {
        Some(backup_source(request)?)
    } else {
        None
    };

    if let Some(target) = &request.target_dir {
        check_target_dir(target)?;
    }
    if let Some(mount) = &request.mount_dir {
        check_mount_dir(mount)?;
    }

    Ok(source)
}

/// `(flag, value)` pairs that must be present for `request.action`.
fn required_params(request: &InvocationRequest) -> Vec<(&'static str, Option<String>)> {
    let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());
    match request.action {
        Action::Restore => vec![
            ("--snapshot-id", request.snapshot_id.clone()),
            ("--target-dir", path(&request.target_dir)),
        ],
        Action::RestoreLatest => vec![("--target-dir", path(&request.target_dir))],
        Action::Ls => vec![("--snapshot-id", request.snapshot_id.clone())],
        Action::Find => vec![("--pattern", request.pattern.clone())],
        Action::Mount => vec![("--mount-dir", path(&request.mount_dir))],
        Action::Diff => vec![
            ("--snapshot-id1", request.snapshot_id1.clone()),
            ("--snapshot-id2", request.snapshot_id2.clone()),
        ],
        _ => vec![],
    }
}

/// Validate the source settings of a backup request.
pub fn backup_source(request: &InvocationRequest) -> Result<BackupSource, ValidationError> {
    match request.source_type.as_str() {
        "dir" => {
            let value = request
                .source_value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ValidationError::MissingSourceValue)?;
            let path = PathBuf::from(value);
            check_source_dir(&path)?;
            Ok(BackupSource::Directory(path))
        },
        "stdin" => {
            let filename = request
                .stdin_filename
                .as_deref()
                .filter(|f| !f.is_empty())
                .ok_or(ValidationError::MissingStdinFilename)?;
            if !is_safe_filename(filename) {
                return Err(ValidationError::UnsafeStdinFilename(filename.to_owned()));
            }
            Ok(BackupSource::Stdin {
                filename: filename.to_owned(),
            })
        },
        other => Err(ValidationError::InvalidSourceType(other.to_owned())),
    }
}

fn is_safe_filename(name: &str) -> bool {
    !name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '\\'))
}

fn check_source_dir(path: &Path) -> Result<(), ValidationError> {
    if !path.exists() {
        return Err(ValidationError::SourceNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ValidationError::SourceNotDirectory(path.to_path_buf()));
    }
    std::fs::read_dir(path)
        .map(drop)
        .map_err(|source| ValidationError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

fn check_target_dir(target: &Path) -> Result<(), ValidationError> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.is_dir() {
        return Err(ValidationError::TargetParentMissing(target.to_path_buf()));
    }
    if !is_writable(&parent) {
        return Err(ValidationError::TargetParentNotWritable(target.to_path_buf()));
    }
    Ok(())
}

fn check_mount_dir(mount: &Path) -> Result<(), ValidationError> {
    if !mount.is_dir() {
        return Err(ValidationError::MountDirMissing(mount.to_path_buf()));
    }
    if !is_writable(mount) {
        return Err(ValidationError::MountDirNotWritable(mount.to_path_buf()));
    }
    Ok(())
}

/// Probe by creating (and immediately removing) a temp file in `dir`.
fn is_writable(dir: &Path) -> bool {
    tempfile::Builder::new()
        .prefix(".resticw-probe")
        .tempfile_in(dir)
        .is_ok()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
