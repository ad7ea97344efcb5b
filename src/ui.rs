//! Terminal output: confirmation lines, flow step banners, and the flow
//! summary.
//!
//! restic's own output is passed through untouched, so everything printed
//! here is a short styled line framing it.  The `render_*` functions return
//! plain strings (styling aside) so tests can inspect them without a
//! terminal.

use console::style;

use crate::{
    cli::Action,
    commands::flow::{FlowResult, FlowState, Step, StepResult},
};

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Green ✓: a step or action succeeded.
fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
/// Red ✗: a step failed.
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
/// Dim ·: a step that never ran.
fn icon_skipped() -> console::StyledObject<&'static str> {
    style("·").dim()
}
/// Cyan ✓: the whole flow succeeded.
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Single actions ───────────────────────────────────────────────────────────

pub fn render_success(action: Action) -> String {
    format!("  {}  {} completed", icon_ok(), style(action).bold())
}

/// Confirmation line for a successful run.
pub fn print_success(action: Action) {
    println!("{}", render_success(action));
}

// ─── Flow ─────────────────────────────────────────────────────────────────────

pub fn render_banner(step: Step) -> String {
    format!(
        "  {} {}",
        style(format!("[{}/{}]", step.number(), Step::COUNT)).dim(),
        style(step.label()).bold()
    )
}

/// Printed before restic's output for `step`.
pub fn step_banner(step: Step) {
    println!();
    println!("{}", render_banner(step));
}

/// Printed after restic exits.
pub fn step_outcome(step: Step, success: bool) {
    if success {
        println!("  {}  {}", icon_ok(), style(step.label()).bold());
    } else {
        eprintln!("  {}  {}", icon_err(), style(step.label()).bold());
    }
}

/// One line per step: completed, failed, or not reached.
pub fn render_flow_summary(result: &FlowResult) -> Vec<String> {
    let trace = result.trace();
    Step::ALL
        .iter()
        .map(|step| {
            let icon = match trace.iter().find(|r| r.step() == *step) {
                Some(StepResult::Completed(_)) => icon_ok(),
                Some(StepResult::Failed(..)) => icon_err(),
                None => icon_skipped(),
            };
            format!("    {icon} {}", step.label())
        })
        .collect()
}

/// Final banner after the flow, with the per-step trace.
pub fn print_flow_summary(result: &FlowResult) {
    println!();
    match result.state() {
        FlowState::Done => {
            println!(
                "  {} {}",
                icon_done(),
                style("All flow steps completed successfully.").cyan().bold()
            );
        },
        FlowState::Aborted { step } => {
            eprintln!(
                "  {}  {}",
                icon_err(),
                style(format!("Flow aborted at step {} ({}).", step.number(), step.label()))
                    .red()
                    .bold()
            );
        },
    }
    for line in render_flow_summary(result) {
        println!("{line}");
    }
    println!();
}

// ─── Tests ────────────────────────────────────────────────────────────────────
