//! Runs the validated request: one restic call, or the whole flow.

use tracing::info;

use crate::{
    background::Interrupt,
    cli::Action,
    commands::flow,
    config::Config,
    error::Error,
    request::InvocationRequest,
    runner::{self, Executor},
    ui,
    validate::{BackupSource, ValidationError},
};

/// Execute `request`.  `source` is the validated backup source for
/// `backup` and `backup-flow` and `None` otherwise.
pub fn run(
    executor: &dyn Executor,
    cfg: &Config,
    request: &InvocationRequest,
    source: Option<&BackupSource>,
    interrupt: &Interrupt,
) -> Result<(), Error> {
    if request.action == Action::BackupFlow {
        let source = source.ok_or(ValidationError::MissingSourceValue)?;
        let result = flow::run(executor, cfg, source, &request.excludes, interrupt);
        ui::print_flow_summary(&result);
        return result.into_result();
    }

    let invocation = runner::action_invocation(request, cfg, source)
        .ok_or(ValidationError::MissingSourceValue)?;
    info!(action = %request.action, "running action");
    executor.execute(&invocation)
}
