//! Process signals as session lifecycle hooks.
//!
//! A headless player has no foreground or background. Signals take that
//! role instead:
//! * Ctrl-C (SIGINT) and SIGTERM stop the session and exit
//! * SIGHUP stops the session and starts it again
//!
//! On Windows, only Ctrl-C is supported.
//!
//! # Example
//!
//! ```no_run
//! use onair::signal::{Handler, Lifecycle};
//!
//! async fn example() {
//!     let mut signals = Handler::new().unwrap();
//!
//!     if signals.recv().await == Lifecycle::Restart {
//!         println!("restarting");
//!     }
//! }
//! ```

use std::fmt;

use crate::error::Result;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Lifecycle transition requested by a signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Lifecycle {
    /// Interrupt signal (Ctrl-C/SIGINT): stop and exit
    Interrupt,
    /// Termination signal (SIGTERM): stop and exit
    Terminate,
    /// Hangup signal (SIGHUP): stop and start again
    Restart,
}

/// Listens for lifecycle signals.
pub struct Handler {
    #[cfg(unix)]
    sigterm: Signal,
    #[cfg(unix)]
    sighup: Signal,
}

impl Handler {
    /// Creates a new signal handler.
    ///
    /// # Errors
    ///
    /// Returns error if signal handlers cannot be registered.
    pub fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sighup: signal(SignalKind::hangup())?,
            })
        }

        #[cfg(not(unix))]
        Ok(Self {})
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Lifecycle {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => Lifecycle::Interrupt,
                _ = self.sigterm.recv() => Lifecycle::Terminate,
                _ = self.sighup.recv() => Lifecycle::Restart,
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            Lifecycle::Interrupt
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Interrupt => write!(f, "Ctrl+C"),
            Lifecycle::Terminate => write!(f, "SIGTERM"),
            Lifecycle::Restart => write!(f, "SIGHUP"),
        }
    }
}
