// Graceful shutdown on SIGINT/SIGTERM/SIGHUP (Ctrl+C on Windows)

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared shutdown state across the application
#[derive(Clone)]
pub struct ShutdownState {
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownState {
    /// Create a new shutdown state
    pub fn new() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request a shutdown
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        log::info!("Shutdown requested");
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// Register signal handlers for graceful shutdown
/// This sets up handlers for SIGINT (Ctrl+C), SIGTERM, and SIGHUP
#[cfg(unix)]
pub fn register_signal_handlers(state: ShutdownState) -> Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new(&[SIGINT, SIGTERM, SIGHUP])
        .map_err(|e| anyhow::anyhow!("Failed to register signal handlers: {}", e))?;

    thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGINT => {
                    log::info!("Received SIGINT (Ctrl+C)");
                    state.request_shutdown();
                }
                SIGTERM => {
                    log::info!("Received SIGTERM");
                    state.request_shutdown();
                }
                SIGHUP => {
                    log::info!("Received SIGHUP");
                    state.request_shutdown();
                }
                _ => {}
            }
        }
    });

    log::info!("Signal handlers registered (SIGINT, SIGTERM, SIGHUP)");
    Ok(())
}

/// Register signal handlers for Windows
#[cfg(windows)]
pub fn register_signal_handlers(state: ShutdownState) -> Result<()> {
    use ctrlc;

    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C");
        state.request_shutdown();
    })
    .map_err(|e| anyhow::anyhow!("Failed to register Ctrl+C handler: {}", e))?;

    log::info!("Signal handler registered (Ctrl+C)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shutdown_is_shared_between_clones() {
        let state = ShutdownState::new();
        let server_view = state.clone();
        assert!(!server_view.is_shutdown_requested());

        state.request_shutdown();
        assert!(server_view.is_shutdown_requested());
    }
}
