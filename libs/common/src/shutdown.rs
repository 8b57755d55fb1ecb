//! Shutdown signals for long running commands
//!
//! `ShutdownListener` installs its handlers when it is created, so a signal
//! that arrives between setup and the first `recv` is still reported.

use std::fmt;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
#[cfg(unix)]
use tracing::warn;

/// Signal that asked the command to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM (Unix only)
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Ctrl+C, plus SIGTERM on Unix
///
/// Create it inside a tokio runtime. `recv` is cancel safe and may be
/// used as a `select!` branch in a loop.
pub struct ShutdownListener {
    #[cfg(unix)]
    interrupt: Option<Signal>,
    #[cfg(unix)]
    terminate: Option<Signal>,
}

#[cfg(unix)]
fn install(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(sig) => Some(sig),
        Err(e) => {
            warn!("Failed to install {} handler: {}", name, e);
            None
        },
    }
}

#[cfg(unix)]
async fn next(sig: &mut Option<Signal>) {
    if let Some(sig) = sig {
        if sig.recv().await.is_some() {
            return;
        }
    }
    // No handler, or the signal driver is gone
    std::future::pending::<()>().await
}

impl ShutdownListener {
    pub fn new() -> Self {
        #[cfg(unix)]
        {
            Self {
                interrupt: install(SignalKind::interrupt(), "SIGINT"),
                terminate: install(SignalKind::terminate(), "SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Wait for the next shutdown signal
    pub async fn recv(&mut self) -> ShutdownSignal {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = next(&mut self.interrupt) => ShutdownSignal::Interrupt,
                _ = next(&mut self.terminate) => ShutdownSignal::Terminate,
            }
        }
        #[cfg(not(unix))]
        {
            // An error means no handler could be installed: never resolve
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            ShutdownSignal::Interrupt
        }
    }
}

impl Default for ShutdownListener {
    fn default() -> Self {
        Self::new()
    }
}
