//! The one place where anything runs concurrently with the main path.
//!
//! A single-worker tokio runtime hosts two kinds of work:
//!
//! - detached webhook notifications, spawned through a [`Spawner`] and never awaited by the caller;
//! - the Ctrl-C listener, which flips the shared [`Interrupt`] flag.
//!
//! Dropping [`Background`] is the guaranteed cleanup step of every exit path:
//! in-flight notifications get [`NOTIFICATION_GRACE`] to finish, then the
//! runtime is shut down.

use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::{Handle, Runtime},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::error::EXIT_INTERRUPTED;

/// How long exit waits for notifications that are still in flight.
pub const NOTIFICATION_GRACE: Duration = Duration::from_secs(5);

// ─── Interrupt flag ───────────────────────────────────────────────────────────

/// Set once the user has pressed Ctrl-C.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

// ─── Spawner ──────────────────────────────────────────────────────────────────

type Pending = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Spawns detached tasks whose handles are kept only for the exit drain.
#[derive(Clone)]
pub struct Spawner {
    handle: Handle,
    pending: Pending,
}

impl Spawner {
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join = self.handle.spawn(task);
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(join);
        }
    }
}

// ─── Background ───────────────────────────────────────────────────────────────

pub struct Background {
    runtime: Option<Runtime>,
    pending: Pending,
    interrupt: Interrupt,
}

impl Background {
    /// Build the runtime.  Failure is logged and leaves notifications and
    /// interrupt handling disabled; it never fails the run.
    pub fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("resticw-bg")
            .enable_all()
            .build()
            .inspect_err(|err| {
                warn!(error = %err, "background runtime unavailable; notifications and interrupt handling disabled");
            })
            .ok();

        Self {
            runtime,
            pending: Pending::default(),
            interrupt: Interrupt::default(),
        }
    }

    /// Install the Ctrl-C listener.
    ///
    /// The first interrupt only sets the flag; restic receives the same
    /// signal through the process group and is left to exit on its own.  A
    /// second interrupt exits immediately.
    pub fn listen_for_interrupts(&self) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        let interrupt = self.interrupt.clone();
        runtime.spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "cannot listen for Ctrl-C");
                return;
            }
            interrupt.trigger();
            warn!("interrupt received; waiting for restic to exit (press Ctrl-C again to abort)");

            if tokio::signal::ctrl_c().await.is_ok() {
                error!("second interrupt received; exiting immediately");
                std::process::exit(i32::from(EXIT_INTERRUPTED));
            }
        });
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// `None` when the runtime could not be built.
    pub fn spawner(&self) -> Option<Spawner> {
        self.runtime.as_ref().map(|rt| Spawner {
            handle: rt.handle().clone(),
            pending: Arc::clone(&self.pending),
        })
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        let pending = self
            .pending
            .lock()
            .map(|mut p| std::mem::take(&mut *p))
            .unwrap_or_default();

        if !pending.is_empty() {
            debug!(count = pending.len(), "waiting for in-flight notifications");
            let drained = runtime.block_on(async {
                tokio::time::timeout(NOTIFICATION_GRACE, async {
                    for handle in pending {
                        // A panicked or cancelled task has nothing left to wait for.
                        let _ = handle.await;
                    }
                })
                .await
            });
            if drained.is_err() {
                debug!("notification grace period elapsed; dropping remaining deliveries");
            }
        }

        runtime.shutdown_background();
    }
}
