//! One run from parsed arguments to exit code.
//!
//! [`App::run`] does the work and stops at the first error.  [`App::finish`]
//! is the single cleanup path for every outcome: it logs one `ERROR` line on
//! failure, prints the confirmation line on success, sends the matching
//! notification, and picks the exit code.

use std::{mem, process::ExitCode};

use anyhow::Context;
use tracing::{error, info};

use crate::{
    background::Background,
    cli::{self, Action, ArgumentError, Cli},
    commands,
    config,
    error::Error,
    notify::{EventContext, NotificationEvent, Notifier},
    request::InvocationRequest,
    runner::{self, ResticExecutor},
    ui,
    validate::validate,
};

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Ran(Action),
    PrintedConfig,
}

pub struct App<'a> {
    background: &'a Background,
    notifier: Option<Notifier>,
    context: EventContext,
}

impl<'a> App<'a> {
    pub fn new(background: &'a Background) -> Self {
        Self {
            background,
            notifier: None,
            context: EventContext::default(),
        }
    }

    /// Load config, locate restic, resolve and validate the request, then run it.
    pub fn run(&mut self, cli: &Cli) -> Result<Completion, Error> {
        if cli.action.is_none() && !cli.print_config {
            return Err(ArgumentError::MissingAction.into());
        }

        let path = cli.env_file.clone().unwrap_or_else(config::default_env_file);
        let cfg = config::load(&path)?;
        info!(path = %path.display(), "configuration loaded");

        if cli.print_config {
            let text = toml::to_string_pretty(&cfg).context("cannot render configuration")?;
            print!("{text}");
            return Ok(Completion::PrintedConfig);
        }
        let action = cli.action.ok_or(ArgumentError::MissingAction)?;

        self.context = mem::take(&mut self.context).with_config(&cfg);
        self.notifier = Some(Notifier::new(&cfg.notify, self.background.spawner()));

        let binary = runner::locate_binary(&cfg.repo.binary)?;
        info!(binary = %binary.display(), "restic located");

        let request = InvocationRequest::resolve(action, cli, &cfg);
        self.context = mem::take(&mut self.context).with_request(&request);
        let source = validate(&request, &cfg)?;

        let interrupt = self.background.interrupt();
        let executor = ResticExecutor::new(binary, &cfg.repo.password, interrupt.clone());
        commands::action::run(&executor, &cfg, &request, source.as_ref(), &interrupt)?;

        Ok(Completion::Ran(action))
    }

    /// Report `outcome` and turn it into the process exit code.
    pub fn finish(self, outcome: Result<Completion, Error>) -> ExitCode {
        ExitCode::from(self.report(outcome))
    }

    fn report(self, outcome: Result<Completion, Error>) -> u8 {
        match outcome {
            Ok(Completion::PrintedConfig) => 0,
            Ok(Completion::Ran(action)) => {
                ui::print_success(action);
                info!(%action, "action completed");
                self.send(&NotificationEvent::Success);
                0
            },
            Err(err) => {
                // restic may report an interrupt as an ordinary failure.
                let err = if self.background.interrupt().is_set() && !err.is_interrupt() {
                    Error::Interrupted
                } else {
                    err
                };

                error!("{err}");
                if matches!(err, Error::Argument(ArgumentError::MissingAction)) {
                    eprint!("{}", cli::usage());
                }
                self.send(&NotificationEvent::Error(err.to_string()));
                err.exit_code()
            },
        }
    }

    fn send(&self, event: &NotificationEvent) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(event, &self.context);
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::{config::ConfigError, error::DependencyError, validate::ValidationError};

    fn env_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("env");
        fs::write(&path, format!("RESTIC_REPOSITORY=/srv/restic\nRESTIC_PASSWORD=hunter2\n{body}"))
            .unwrap();
        path
    }

    fn cli(action: Option<Action>, env: PathBuf) -> Cli {
        Cli {
            action,
            env_file: Some(env),
            ..Cli::default()
        }
    }

    #[test]
    fn missing_action_fails_before_loading_config() {
        let background = Background::new();
        let mut app = App::new(&background);
        let cli = cli(None, PathBuf::from("/nonexistent/env"));
        let outcome = app.run(&cli);
        assert!(matches!(outcome, Err(Error::Argument(ArgumentError::MissingAction))));
        assert_eq!(app.report(outcome), 1);
    }

    #[test]
    fn missing_env_file_is_a_config_error() {
        let background = Background::new();
        let mut app = App::new(&background);
        let outcome = app.run(&cli(Some(Action::Check), PathBuf::from("/nonexistent/env")));
        assert!(matches!(outcome, Err(Error::Config(ConfigError::NotFound(_)))));
    }

    #[test]
    fn print_config_needs_no_action_or_restic() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_file(&dir, "RESTIC_BIN=/nonexistent/restic\n");
        let background = Background::new();
        let mut app = App::new(&background);
        let cli = Cli {
            print_config: true,
            ..cli(None, env)
        };
        let outcome = app.run(&cli);
        assert_eq!(outcome.unwrap(), Completion::PrintedConfig);
    }

    #[test]
    fn missing_binary_is_a_dependency_error() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_file(&dir, "RESTIC_BIN=no-such-restic-4b7f\n");
        let background = Background::new();
        let mut app = App::new(&background);
        let outcome = app.run(&cli(Some(Action::Check), env));
        assert!(matches!(
            outcome,
            Err(Error::Dependency(DependencyError::BinaryNotFound { .. }))
        ));
    }

    #[test]
    fn validation_runs_before_restic() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_file(&dir, "RESTIC_BIN=false\n");
        let background = Background::new();
        let mut app = App::new(&background);
        let outcome = app.run(&cli(Some(Action::Ls), env));
        assert!(matches!(
            outcome,
            Err(Error::Validation(ValidationError::MissingParameter { .. }))
        ));
    }

    #[test]
    fn successful_action_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_file(&dir, "RESTIC_BIN=true\n");
        let background = Background::new();
        let mut app = App::new(&background);
        let outcome = app.run(&cli(Some(Action::Check), env));
        assert_eq!(outcome.as_ref().ok(), Some(&Completion::Ran(Action::Check)));
        assert_eq!(app.report(outcome), 0);
    }

    #[test]
    fn failing_restic_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_file(&dir, "RESTIC_BIN=false\n");
        let background = Background::new();
        let mut app = App::new(&background);
        let outcome = app.run(&cli(Some(Action::Snapshots), env));
        assert!(matches!(outcome, Err(Error::ExternalTool { code: Some(1), .. })));
        assert_eq!(app.report(outcome), 1);
    }

    #[test]
    fn interrupt_turns_any_failure_into_130() {
        let background = Background::new();
        background.interrupt().trigger();
        let app = App::new(&background);
        let outcome = Err(Error::ExternalTool {
            action: "backup".into(),
            code: Some(1),
        });
        assert_eq!(app.report(outcome), 130);
    }
}
