//! `--action backup-flow`: the fixed eight-step maintenance sequence.
//!
//! # Steps (in order)
//!
//! | # | Step            | restic call              |
//! |---|-----------------|--------------------------|
//! | 1 | pre-check       | `check`                  |
//! | 2 | backup          | `backup …`               |
//! | 3 | post-check      | `check`                  |
//! | 4 | forget/prune    | `forget --keep-… --prune`|
//! | 5 | cache cleanup   | `cache --cleanup`        |
//! | 6 | final check     | `check`                  |
//! | 7 | snapshots       | `snapshots`              |
//! | 8 | stats           | `stats`                  |
//!
//! A step runs only if every earlier step succeeded.  The first failure
//! stops the sequence; completed steps are never rolled back.  Nothing is
//! persisted, so a re-run always starts again at step 1.

use std::fmt;

use tracing::{info, warn};

use crate::{
    background::Interrupt,
    config::Config,
    error::Error,
    request::ExcludeList,
    runner::{self, Executor, Invocation},
    ui,
    validate::BackupSource,
};

// ─── Steps ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PreCheck,
    Backup,
    PostCheck,
    ForgetPrune,
    CacheCleanup,
    FinalCheck,
    ListSnapshots,
    Stats,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Self; 8] = [
        Self::PreCheck,
        Self::Backup,
        Self::PostCheck,
        Self::ForgetPrune,
        Self::CacheCleanup,
        Self::FinalCheck,
        Self::ListSnapshots,
        Self::Stats,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// 1-based position in [`Step::ALL`].
    pub const fn number(self) -> usize {
        self as usize + 1
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PreCheck => "pre-check",
            Self::Backup => "backup",
            Self::PostCheck => "post-check",
            Self::ForgetPrune => "forget/prune",
            Self::CacheCleanup => "cache cleanup",
            Self::FinalCheck => "final check",
            Self::ListSnapshots => "snapshots",
            Self::Stats => "stats",
        }
    }

    /// The restic call this step makes.
    pub fn invocation(self, cfg: &Config, source: &BackupSource, excludes: &ExcludeList) -> Invocation {
        match self {
            Self::PreCheck | Self::PostCheck | Self::FinalCheck => runner::build_check(cfg),
            Self::Backup => runner::build_backup(cfg, source, excludes),
            Self::ForgetPrune => runner::build_forget(cfg),
            Self::CacheCleanup => runner::build_cache_cleanup(cfg),
            Self::ListSnapshots => runner::build_snapshots(cfg),
            Self::Stats => runner::build_stats(cfg, false),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Results ──────────────────────────────────────────────────────────────────

/// What happened to one step that was reached.
#[derive(Debug)]
pub enum StepResult {
    Completed(Step),
    Failed(Step, Error),
}

impl StepResult {
    pub const fn step(&self) -> Step {
        match self {
            Self::Completed(step) | Self::Failed(step, _) => *step,
        }
    }
}

/// Terminal state of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Done,
    Aborted { step: Step },
}

/// Ordered trace of every step that was reached.  At most the last entry is
/// a failure.
#[derive(Debug, Default)]
pub struct FlowResult {
    trace: Vec<StepResult>,
}

impl FlowResult {
    pub fn trace(&self) -> &[StepResult] {
        &self.trace
    }

    /// Steps that finished successfully, in order.
    pub fn completed(&self) -> Vec<Step> {
        self.trace
            .iter()
            .filter_map(|r| match r {
                StepResult::Completed(step) => Some(*step),
                StepResult::Failed(..) => None,
            })
            .collect()
    }

    pub fn failed_step(&self) -> Option<Step> {
        self.trace.iter().find_map(|r| match r {
            StepResult::Failed(step, _) => Some(*step),
            StepResult::Completed(_) => None,
        })
    }

    pub fn state(&self) -> FlowState {
        match self.failed_step() {
            Some(step) => FlowState::Aborted { step },
            None => FlowState::Done,
        }
    }

    /// Collapse into the run's outcome: `FlowAborted` wrapping the failing
    /// step's error, or `Ok`.
    pub fn into_result(self) -> Result<(), Error> {
        for result in self.trace {
            if let StepResult::Failed(step, source) = result {
                return Err(Error::FlowAborted {
                    step,
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Run the eight steps in order, stopping at the first failure.
///
/// An interrupt observed before a step records that step as failed with
/// [`Error::Interrupted`] without calling restic.
pub fn run(
    executor: &dyn Executor,
    cfg: &Config,
    source: &BackupSource,
    excludes: &ExcludeList,
    interrupt: &Interrupt,
) -> FlowResult {
    let mut result = FlowResult::default();

    for step in Step::ALL {
        if interrupt.is_set() {
            warn!(step = step.label(), "interrupted before step");
            result.trace.push(StepResult::Failed(step, Error::Interrupted));
            break;
        }

        ui::step_banner(step);
        info!(step = step.label(), number = step.number(), "flow step started");

        match executor.execute(&step.invocation(cfg, source, excludes)) {
            Ok(()) => {
                ui::step_outcome(step, true);
                result.trace.push(StepResult::Completed(step));
            },
            Err(err) => {
                ui::step_outcome(step, false);
                result.trace.push(StepResult::Failed(step, err));
                break;
            },
        }
    }

    result
}

// ─── Tests ────────────────────────────────────────────────────────────────────
