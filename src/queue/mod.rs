//! Serialized background updates
//!
//! Commands run one at a time, in the order they were scheduled, on a single
//! worker thread that exists only while there is work. Failures are
//! collected into an `UpdateStatus` instead of stopping the drain.
//! Cancelling stops the drain before the next command, drops what is still
//! pending and trips the token handed to the running command.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, Result};

type Operation = Box<dyn FnOnce(&CancellationToken) -> Result<()> + Send>;

/// A deferred operation on one repository's index
pub struct UpdateCommand {
    uid: String,
    operation: Operation,
}

impl UpdateCommand {
    pub fn new(uid: impl Into<String>, operation: impl FnOnce(&CancellationToken) -> Result<()> + Send + 'static) -> Self {
        Self {
            uid: uid.into(),
            operation: Box::new(operation),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl std::fmt::Debug for UpdateCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCommand").field("uid", &self.uid).finish()
    }
}

/// Outcome of one drain of the queue
#[derive(Debug, Default)]
pub struct UpdateStatus {
    pub completed: usize,
    pub failures: Vec<(String, IndexError)>,
    pub cancelled: bool,
    /// Commands dropped by cancellation
    pub skipped: usize,
}

impl UpdateStatus {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<UpdateCommand>,
    running: bool,
    cancel: CancellationToken,
    current: UpdateStatus,
    last: Option<UpdateStatus>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Clone, Default)]
pub struct UpdateQueue {
    shared: Arc<Shared>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `command` and start the worker if it is not running.
    pub fn schedule(&self, command: UpdateCommand) {
        let mut state = self.shared.lock();
        tracing::debug!("Scheduling update of {}", command.uid);
        state.pending.push_back(command);
        if state.running {
            return;
        }

        state.running = true;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("artidex-update".to_string())
            .spawn(move || drain(&shared));

        if let Err(e) = spawned {
            tracing::error!("Cannot start update worker: {}", e);
            let dropped: Vec<UpdateCommand> = state.pending.drain(..).collect();
            for command in dropped {
                state
                    .current
                    .failures
                    .push((command.uid, IndexError::Io(std::io::Error::other(e.to_string()))));
            }
            finish(&mut state);
            self.shared.idle.notify_all();
        }
    }

    /// Stop the running drain. No-op when idle.
    pub fn cancel(&self) {
        let state = self.shared.lock();
        if state.running {
            tracing::info!("Cancelling {} pending update(s)", state.pending.len());
            state.cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Block until the queue is drained and take the status of the drain.
    /// A second waiter on the same drain gets an empty status.
    pub fn wait_idle(&self) -> UpdateStatus {
        let mut state = self.shared.lock();
        while state.running {
            state = self.shared.idle.wait(state).unwrap_or_else(|p| p.into_inner());
        }
        state.last.take().unwrap_or_default()
    }
}

fn drain(shared: &Shared) {
    loop {
        let (command, cancel) = {
            let mut state = shared.lock();
            if state.cancel.is_cancelled() {
                state.current.cancelled = true;
                state.current.skipped += state.pending.len();
                state.pending.clear();
            }
            match state.pending.pop_front() {
                Some(command) => (command, state.cancel.clone()),
                None => {
                    finish(&mut state);
                    shared.idle.notify_all();
                    return;
                }
            }
        };

        let UpdateCommand { uid, operation } = command;
        let result = panic::catch_unwind(AssertUnwindSafe(|| operation(&cancel))).unwrap_or_else(|_| {
            Err(IndexError::Io(std::io::Error::other(format!("update of {} panicked", uid))))
        });

        let mut state = shared.lock();
        match result {
            Ok(()) => state.current.completed += 1,
            Err(e) if e.is_cancelled() => {
                tracing::info!("Update of {} cancelled", uid);
                state.current.cancelled = true;
            }
            Err(e) => {
                tracing::warn!("Update of {} failed: {}", uid, e);
                state.current.failures.push((uid, e));
            }
        }
    }
}

fn finish(state: &mut QueueState) {
    let status = std::mem::take(&mut state.current);
    if !status.failures.is_empty() {
        tracing::warn!("Update queue drained with {} failure(s)", status.failures.len());
    }
    state.last = Some(status);
    state.running = false;
    state.cancel = CancellationToken::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_runs_in_schedule_order_and_collects_failures() {
        let queue = UpdateQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for uid in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            queue.schedule(UpdateCommand::new(uid, move |_| {
                order.lock().unwrap().push(uid);
                if uid == "b" {
                    return Err(IndexError::RepositoryNotFound(uid.to_string()));
                }
                Ok(())
            }));
        }

        let status = queue.wait_idle();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(status.completed, 2);
        assert_eq!(status.failures.len(), 1);
        assert_eq!(status.failures[0].0, "b");
        assert!(!status.cancelled);
        assert!(!queue.is_running());
    }

    #[test]
    fn test_cancel_drops_pending_commands() {
        let queue = UpdateQueue::new();
        let (started_tx, started_rx) = mpsc::channel();
        let ran_second = Arc::new(Mutex::new(false));

        queue.schedule(UpdateCommand::new("slow", move |cancel| {
            started_tx.send(()).unwrap();
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err(IndexError::Cancelled)
        }));
        let flag = Arc::clone(&ran_second);
        queue.schedule(UpdateCommand::new("next", move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        }));

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        queue.cancel();
        let status = queue.wait_idle();

        assert!(status.cancelled);
        assert_eq!(status.skipped, 1);
        assert!(status.failures.is_empty());
        assert!(!*ran_second.lock().unwrap());

        queue.schedule(UpdateCommand::new("after", |cancel| {
            assert!(!cancel.is_cancelled());
            Ok(())
        }));
        assert!(queue.wait_idle().is_ok());
    }
}
