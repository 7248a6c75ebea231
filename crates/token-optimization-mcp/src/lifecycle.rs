// Rust guideline compliant 2026-02-13

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use token_optimization::TokenOptimizer;

/// Server lifecycle: `Created -> Ready -> Closing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Ready,
    Closing,
    Closed,
}

/// What ended the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the transport.
    TransportClosed,
    TransportFailed(String),
    Signal(&'static str),
    StartupFailed(String),
}

impl CloseReason {
    /// Whether the process should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TransportFailed(_) | Self::StartupFailed(_))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportClosed => f.write_str("transport closed"),
            Self::TransportFailed(err) => write!(f, "transport failed: {err}"),
            Self::Signal(name) => write!(f, "received {name}"),
            Self::StartupFailed(err) => write!(f, "startup failed: {err}"),
        }
    }
}

/// Tracks the server phase and disposes the engine exactly once.
pub struct Lifecycle {
    phase: Mutex<Phase>,
    engine: Arc<dyn TokenOptimizer>,
}

impl Lifecycle {
    pub fn new(engine: Arc<dyn TokenOptimizer>) -> Self {
        Self {
            phase: Mutex::new(Phase::Created),
            engine,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.lock()
    }

    /// `Created -> Ready`. Returns `false` from any other phase.
    pub fn mark_ready(&self) -> bool {
        let mut phase = self.lock();
        if *phase != Phase::Created {
            return false;
        }
        *phase = Phase::Ready;
        log::info!("token optimization server ready");
        true
    }

    /// Dispose the engine and move to `Closed`.
    ///
    /// Only the first call does anything; later calls return `false`. A
    /// panicking engine is logged and the server still reaches `Closed`.
    pub fn close(&self, reason: &CloseReason) -> bool {
        {
            let mut phase = self.lock();
            if matches!(*phase, Phase::Closing | Phase::Closed) {
                log::debug!("close requested again ({reason}); already {:?}", *phase);
                return false;
            }
            *phase = Phase::Closing;
        }

        if reason.is_failure() {
            log::error!("shutting down: {reason}");
        } else {
            log::info!("shutting down: {reason}");
        }
        if catch_unwind(AssertUnwindSafe(|| self.engine.dispose())).is_err() {
            log::error!("optimizer panicked while being disposed");
        }

        *self.lock() = Phase::Closed;
        log::info!("token optimization server closed");
        true
    }

    fn lock(&self) -> parking_lot::MutexGuard<'_, Phase> {
        self.phase.lock()
    }
}
