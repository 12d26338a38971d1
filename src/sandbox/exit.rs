/*!
 * Intercepted Termination
 * Single-use exit signal published by a script's `os.exit` instead of ending the host process
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Raised inside the Lua state to unwind the script after `os.exit`
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("hook requested exit with code {code}")]
pub struct ExitRequested {
    pub code: i32,
}

/// One-shot termination channel shared between a runtime and its supervisor.
///
/// The first `publish` wins: the code is recorded, sent once, and the sender
/// is dropped. Later calls are no-ops.
#[derive(Debug)]
pub struct ExitSignal {
    sender: Mutex<Option<flume::Sender<i32>>>,
    code: OnceLock<i32>,
    requested: AtomicBool,
}

impl ExitSignal {
    /// Create a signal and the receiving end the supervisor races on
    pub fn channel() -> (Arc<Self>, flume::Receiver<i32>) {
        let (tx, rx) = flume::bounded(1);
        let signal = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            code: OnceLock::new(),
            requested: AtomicBool::new(false),
        });
        (signal, rx)
    }

    /// Publish `code`; returns false if an exit was already published
    pub fn publish(&self, code: i32) -> bool {
        if self.code.set(code).is_err() {
            return false;
        }
        self.requested.store(true, Ordering::SeqCst);

        if let Some(tx) = self.sender.lock().take() {
            // receiver gone means the supervisor already resolved; the code is still recorded
            let _ = tx.send(code);
        }
        true
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn code(&self) -> Option<i32> {
        self.code.get().copied()
    }

    /// Error to raise inside the script once an exit is pending
    pub fn pending(&self) -> Option<ExitRequested> {
        self.code().map(|code| ExitRequested { code })
    }
}
