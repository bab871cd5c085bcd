use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Version tag of one render cycle's overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overlay lifecycle: `Empty -> Populated -> TornDown -> Populated -> ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Empty,
    Populated(Generation),
    TornDown(Generation),
}

/// Shared view of which generation is live. The overlay engine is the only
/// writer; everyone else checks a captured [`Generation`] against it.
#[derive(Debug, Clone)]
pub struct ActiveGeneration {
    state: Arc<RwLock<OverlayState>>,
}

impl Default for ActiveGeneration {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(OverlayState::Empty)),
        }
    }
}

impl ActiveGeneration {
    pub fn state(&self) -> OverlayState {
        *self.read()
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        *self.read() == OverlayState::Populated(generation)
    }

    /// Runs `apply` only while `generation` is the populated one. The state
    /// cannot change until `apply` returns.
    pub fn apply_if_current<R>(&self, generation: Generation, apply: impl FnOnce() -> R) -> Option<R> {
        let guard = self.read();
        if *guard == OverlayState::Populated(generation) {
            Some(apply())
        } else {
            None
        }
    }

    pub(crate) fn tear_down(&self) {
        let mut guard = self.write();
        if let OverlayState::Populated(generation) = *guard {
            debug!("tearing down overlay generation {}", generation);
            *guard = OverlayState::TornDown(generation);
        }
    }

    pub(crate) fn publish(&self, generation: Generation) {
        *self.write() = OverlayState::Populated(generation);
    }

    fn read(&self) -> RwLockReadGuard<'_, OverlayState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, OverlayState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
