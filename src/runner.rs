//! restic invocation: argument construction and process execution.
//!
//! The `build_*` functions are pure: they turn configuration and request
//! values into an [`Invocation`] without touching the system, so every
//! argument vector is unit-testable without restic installed.
//!
//! Execution goes through the [`Executor`] trait.  [`ResticExecutor`] spawns
//! the real binary with stdout/stderr inherited, so restic's own progress
//! output reaches the terminal untouched; tests substitute a recording fake.
//!
//! Every invocation has the shape
//!
//! ```text
//! <RESTIC_BIN>  -r <repository>  <verb> [args…]
//! ```
//!
//! with the password passed as `RESTIC_PASSWORD` in the child environment.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::{debug, info};

use crate::{
    background::Interrupt,
    cli::Action,
    config::Config,
    error::{DependencyError, Error},
    request::{ExcludeList, InvocationRequest},
    validate::BackupSource,
};

// ─── Invocation ───────────────────────────────────────────────────────────────

/// One call into restic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// restic subcommand, used in log lines and error messages.
    pub verb: &'static str,
    /// Full argument vector, starting with `-r <repository>`.
    pub args: Vec<String>,
    /// Connect this process's stdin to restic (stdin backups only).
    pub stdin: bool,
}

/// Builds the argument prefix shared by every invocation: `-r <repository>`.
pub fn restic_base(cfg: &Config) -> Vec<String> {
    vec!["-r".into(), cfg.repo.repository.clone()]
}

fn invocation(cfg: &Config, verb: &'static str, extra: Vec<String>) -> Invocation {
    let mut args = restic_base(cfg);
    args.push(verb.into());
    args.extend(extra);
    Invocation {
        verb,
        args,
        stdin: false,
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ─── Argument builders ────────────────────────────────────────────────────────

pub fn build_snapshots(cfg: &Config) -> Invocation {
    invocation(cfg, "snapshots", vec![])
}

pub fn build_check(cfg: &Config) -> Invocation {
    invocation(cfg, "check", vec![])
}

pub fn build_init(cfg: &Config) -> Invocation {
    invocation(cfg, "init", vec![])
}

pub fn build_unlock(cfg: &Config) -> Invocation {
    invocation(cfg, "unlock", vec![])
}

/// `stats`, or `stats latest` for the most recent snapshot only.
pub fn build_stats(cfg: &Config, latest: bool) -> Invocation {
    let extra = if latest { vec!["latest".to_owned()] } else { vec![] };
    invocation(cfg, "stats", extra)
}

pub fn build_cache_cleanup(cfg: &Config) -> Invocation {
    invocation(cfg, "cache", vec!["--cleanup".to_owned()])
}

/// `forget --keep-… N … --prune` with only the configured counters.
pub fn build_forget(cfg: &Config) -> Invocation {
    let mut extra = Vec::new();
    for (flag, count) in cfg.retention.flags() {
        extra.push(flag.to_owned());
        extra.push(count.to_string());
    }
    extra.push("--prune".into());
    invocation(cfg, "forget", extra)
}

/// `backup --exclude=<p>… <path>` or `backup --stdin --stdin-filename <name> --exclude=<p>…`.
pub fn build_backup(cfg: &Config, source: &BackupSource, excludes: &ExcludeList) -> Invocation {
    let mut extra = Vec::new();
    if let BackupSource::Stdin { filename } = source {
        extra.extend(["--stdin".to_owned(), "--stdin-filename".to_owned(), filename.clone()]);
    }
    extra.extend(excludes.iter().map(|p| format!("--exclude={p}")));
    if let BackupSource::Directory(path) = source {
        extra.push(path_arg(path));
    }

    let mut inv = invocation(cfg, "backup", extra);
    inv.stdin = matches!(source, BackupSource::Stdin { .. });
    inv
}

pub fn build_restore(cfg: &Config, snapshot: &str, target: &Path) -> Invocation {
    invocation(cfg, "restore", vec![
        snapshot.to_owned(),
        "--target".to_owned(),
        path_arg(target),
    ])
}

pub fn build_ls(cfg: &Config, snapshot: &str) -> Invocation {
    invocation(cfg, "ls", vec![snapshot.to_owned()])
}

pub fn build_find(cfg: &Config, pattern: &str) -> Invocation {
    invocation(cfg, "find", vec![pattern.to_owned()])
}

pub fn build_mount(cfg: &Config, mount_dir: &Path) -> Invocation {
    invocation(cfg, "mount", vec![path_arg(mount_dir)])
}

pub fn build_diff(cfg: &Config, first: &str, second: &str) -> Invocation {
    invocation(cfg, "diff", vec![first.to_owned(), second.to_owned()])
}

/// The single invocation for a validated `request`.
///
/// Returns `None` for `backup-flow`, which is a sequence rather than one
/// call, and for `backup` when no validated source is supplied.
pub fn action_invocation(
    request: &InvocationRequest,
    cfg: &Config,
    source: Option<&BackupSource>,
) -> Option<Invocation> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let path = |p: &Option<PathBuf>| p.clone().unwrap_or_default();

    let inv = match request.action {
        Action::Snapshots => build_snapshots(cfg),
        Action::Backup => build_backup(cfg, source?, &request.excludes),
        Action::BackupFlow => return None,
        Action::Check => build_check(cfg),
        Action::Stats => build_stats(cfg, false),
        Action::StatsLatest => build_stats(cfg, true),
        Action::CacheCleanup => build_cache_cleanup(cfg),
        Action::Forget => build_forget(cfg),
        Action::Init => build_init(cfg),
        Action::Unlock => build_unlock(cfg),
        Action::Restore => build_restore(cfg, &text(&request.snapshot_id), &path(&request.target_dir)),
        Action::RestoreLatest => build_restore(cfg, "latest", &path(&request.target_dir)),
        Action::Ls => build_ls(cfg, &text(&request.snapshot_id)),
        Action::Find => build_find(cfg, &text(&request.pattern)),
        Action::Mount => build_mount(cfg, &path(&request.mount_dir)),
        Action::Diff => build_diff(
            cfg,
            &text(&request.snapshot_id1),
            &text(&request.snapshot_id2),
        ),
    };
    Some(inv)
}

// ─── Execution ────────────────────────────────────────────────────────────────

/// Runs invocations to completion, one at a time.
pub trait Executor {
    /// Block until restic exits.  A non-zero exit is an error.
    fn execute(&self, invocation: &Invocation) -> Result<(), Error>;
}

/// Spawns the real restic binary.
pub struct ResticExecutor {
    binary: PathBuf,
    password: String,
    interrupt: Interrupt,
}

impl ResticExecutor {
    pub fn new(binary: PathBuf, password: &str, interrupt: Interrupt) -> Self {
        Self {
            binary,
            password: password.to_owned(),
            interrupt,
        }
    }
}

impl Executor for ResticExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<(), Error> {
        if self.interrupt.is_set() {
            return Err(Error::Interrupted);
        }

        info!(verb = invocation.verb, args = ?invocation.args, "running restic");

        let stdin = if invocation.stdin {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let status = Command::new(&self.binary)
            .args(&invocation.args)
            .env("RESTIC_PASSWORD", &self.password)
            .stdin(stdin)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| Error::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        // restic saw the same SIGINT; whatever it exited with, the run was interrupted.
        if self.interrupt.is_set() {
            return Err(Error::Interrupted);
        }

        if status.success() {
            debug!(verb = invocation.verb, "restic finished");
            Ok(())
        } else {
            Err(Error::ExternalTool {
                action: invocation.verb.into(),
                code: status.code(),
            })
        }
    }
}

/// Resolve `name` on `PATH` (or as a path) once at startup.
pub fn locate_binary(name: &str) -> Result<PathBuf, DependencyError> {
    which::which(name).map_err(|source| DependencyError::BinaryNotFound {
        binary: name.to_owned(),
        source,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
