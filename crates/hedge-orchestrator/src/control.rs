//! Operator control surface: the core defines no
//! CLI, just a boolean the orchestrator re-reads at the start of every
//! iteration. `hedge-bot` wires this to whatever config-reload mechanism it
//! uses; this crate only needs the read side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Re-read every iteration, never cached
/// across iterations, so an operator flipping the flag takes effect on the
/// very next loop tick.
pub trait ControlSource: Send + Sync {
    fn pause_new_openings(&self) -> bool;
}

/// The default control source: a shared atomic flag, set however the
/// binary's config-reload path chooses (a file watch, a signal handler, an
/// admin endpoint — out of scope for this crate).
#[derive(Debug, Clone, Default)]
pub struct AtomicControl {
    pause_new_openings: Arc<AtomicBool>,
}

impl AtomicControl {
    pub fn new(initial: bool) -> Self {
        Self {
            pause_new_openings: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set_pause_new_openings(&self, paused: bool) {
        self.pause_new_openings.store(paused, Ordering::Relaxed);
    }
}

impl ControlSource for AtomicControl {
    fn pause_new_openings(&self) -> bool {
        self.pause_new_openings.load(Ordering::Relaxed)
    }
}
