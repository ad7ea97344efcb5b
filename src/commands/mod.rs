//! Action handlers.
//!
//! | File        | Invocation                   | Description                         |
//! |-------------|------------------------------|-------------------------------------|
//! | `action.rs` | `resticw --action <NAME>`    | Dispatch one validated request      |
//! | `flow.rs`   | `resticw --action backup-flow` | Eight-step check/backup/prune flow |

pub mod action;
pub mod flow;
