//! `resticw`: a restic wrapper driven by an env file.
//!
//! # Overview
//!
//! This binary turns a small set of named actions into [`restic`](https://restic.net)
//! invocations.  Repository, password, retention policy, backup defaults and
//! webhook settings come from a dotenv-style file; command-line flags
//! override the backup defaults.  `backup-flow` chains eight restic calls
//! into one maintenance run.
//!
//! # Usage
//!
//! ```text
//! resticw --action snapshots
//! resticw --action backup --source-value /home/alice --exclude '*.tmp'
//! pg_dump db | resticw --action backup --source-type stdin --stdin-filename db.sql
//! resticw --action restore --snapshot-id abc123 --target-dir /tmp/r
//! resticw --action backup-flow --log-file /var/log/resticw.log
//! resticw --print-config
//! ```
//!
//! Exit codes: `0` success, `1` any failure, `130` interrupted.
//!
//! # Module layout
//!
//! | Module                   | Responsibility                                  |
//! |--------------------------|-------------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap, early pass       |
//! | [`config`]               | `Config` struct + env-file loader               |
//! | [`request`]              | CLI-over-config merge, exclude list             |
//! | [`validate`]             | Per-action parameter checks                     |
//! | [`runner`]               | restic argument vectors and execution           |
//! | [`commands::action`]     | Dispatch of one validated request               |
//! | [`commands::flow`]       | The eight-step `backup-flow`                    |
//! | [`notify`]               | Fire-and-forget webhook notifications           |
//! | [`background`]           | Runtime for notifications and Ctrl-C            |
//! | [`logging`]              | `tracing` subscriber setup                      |
//! | [`ui`]                   | Confirmation lines, step banners, summary       |
//! | [`app`]                  | One run, and its single cleanup path            |
//! | [`error`]                | Crate error type and exit codes                 |

mod app;
mod background;
mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod notify;
mod request;
mod runner;
mod ui;
mod validate;

use std::process::ExitCode;

use app::App;
use background::Background;
use clap::Parser;
use cli::{ArgumentError, Cli};
use error::Error;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    // ── --help / --version win over everything ───────────────────────────────
    if let Some(early) = cli::early_exit(&args) {
        return early.run();
    }

    let parsed = Cli::try_parse_from(&args).map_err(|e| Error::from(ArgumentError::from(e)));
    let log_file = parsed.as_ref().ok().and_then(|c| c.log_file.clone());
    let logging = logging::init(log_file.as_deref()).map_err(Error::from);

    // Dropped last: drains in-flight notifications on every exit path.
    let background = Background::new();
    background.listen_for_interrupts();

    let mut app = App::new(&background);
    let outcome = parsed.and_then(|cli| {
        logging?;
        app.run(&cli)
    });
    app.finish(outcome)
}
