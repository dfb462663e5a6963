//! Cooperative interrupt handling

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared flag checked by every polling loop.
///
/// The first Ctrl-C sets it and lets the run wind down and checkpoint;
/// a second one exits immediately.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Route SIGINT/SIGTERM into `flag`. Can only be installed once per process.
pub fn install_ctrlc_handler(flag: &ShutdownFlag) -> anyhow::Result<()> {
    let flag = flag.clone();
    let presses = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!("\n⚠️  Interrupt received. Stopping after cleanup (press Ctrl-C again to force)...");
            flag.request();
        } else {
            eprintln!("\nForced exit.");
            std::process::exit(130);
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_requested());
        flag.request();
        assert!(clone.is_requested());
    }
}
