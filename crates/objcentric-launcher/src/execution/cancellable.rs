//! Cancellation primitives for child processes and polling loops.
//!
//! Both poll every [`POLL_INTERVAL`] unless told otherwise, so a cancelled token is
//! observed within one interval.

use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared flag asking a running operation to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub enum CancellableResult<T> {
    Completed(T),
    Cancelled,
}

impl<T> CancellableResult<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancellableResult::Cancelled)
    }
}

/// A spawned child that is killed once its token is cancelled.
pub struct CancellableProcess {
    child: Child,
    cancellation_token: CancellationToken,
}

impl CancellableProcess {
    pub fn new(child: Child, cancellation_token: CancellationToken) -> Self {
        Self {
            child,
            cancellation_token,
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Wait for the child to exit, killing it if cancellation is requested first.
    ///
    /// Output streams are left as configured on the command, normally inherited.
    pub fn wait(mut self) -> CancellableResult<std::io::Result<ExitStatus>> {
        loop {
            if self.cancellation_token.is_cancelled() {
                self.kill();
                return CancellableResult::Cancelled;
            }

            match self.child.try_wait() {
                Ok(Some(status)) => return CancellableResult::Completed(Ok(status)),
                Ok(None) => {}
                Err(err) => {
                    self.kill();
                    return CancellableResult::Completed(Err(err));
                }
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Repeatedly evaluates a check until it yields a value or the token is cancelled.
pub struct CancellablePoller {
    cancellation_token: CancellationToken,
    poll_interval: Duration,
}

impl CancellablePoller {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self::with_interval(cancellation_token, POLL_INTERVAL)
    }

    pub fn with_interval(cancellation_token: CancellationToken, interval: Duration) -> Self {
        Self {
            cancellation_token,
            poll_interval: interval,
        }
    }

    pub fn poll_until<T, F>(&self, mut check_fn: F) -> CancellableResult<T>
    where
        F: FnMut() -> Option<T>,
    {
        loop {
            if self.cancellation_token.is_cancelled() {
                return CancellableResult::Cancelled;
            }

            if let Some(result) = check_fn() {
                return CancellableResult::Completed(result);
            }

            thread::sleep(self.poll_interval);
        }
    }
}
