//! Cooperative cancellation via a shared atomic flag

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit code when a second signal forces the process down
pub const FORCED_EXIT_CODE: i32 = 130;

/// Stop request checked by drivers between pages and batches.
///
/// Clones share one flag, so a handle given to a driver observes a
/// request made through any other handle.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns whether a stop had already been requested.
    pub fn request(&self) -> bool {
        self.0.swap(true, Ordering::Relaxed)
    }

    /// SIGINT/SIGTERM: the first sets the flag, the second exits with 130.
    pub fn install_signal_handlers(&self) -> std::io::Result<()> {
        for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
            let flag = Arc::clone(&self.0);
            // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
            unsafe {
                signal_hook::low_level::register(signal, move || {
                    if flag.swap(true, Ordering::Relaxed) {
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                })?;
            }
        }
        Ok(())
    }
}
