use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::lookup::{Downloader, ImageResolutionService, ImageSearch, LookupStatus, display_path};
use crate::overlay::{ActiveGeneration, Generation, HotZone};

/// The image area that shows the organism picked last.
#[derive(Debug, Clone)]
pub struct DisplaySlot {
    current: Arc<Mutex<PathBuf>>,
}

impl DisplaySlot {
    pub fn new(initial: impl Into<PathBuf>) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial.into())),
        }
    }

    pub fn current(&self) -> PathBuf {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn show(&self, path: PathBuf) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = path;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The resolved image is now displayed.
    Shown { path: PathBuf },
    /// The lookup failed and the placeholder is displayed instead.
    Placeholder { status: LookupStatus, path: PathBuf },
    /// The hot zone's generation was superseded before the lookup finished.
    Discarded { generation: Generation },
}

/// Routes hot-zone clicks to the image lookup and applies results to the
/// display slot only while the clicked generation is still live.
pub struct InteractionController<S, D> {
    resolver: Arc<ImageResolutionService<S, D>>,
    active: ActiveGeneration,
    slot: DisplaySlot,
    placeholder: PathBuf,
}

impl<S, D> Clone for InteractionController<S, D> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            active: self.active.clone(),
            slot: self.slot.clone(),
            placeholder: self.placeholder.clone(),
        }
    }
}

impl<S, D> InteractionController<S, D>
where
    S: ImageSearch + 'static,
    D: Downloader + 'static,
{
    pub fn new(
        resolver: Arc<ImageResolutionService<S, D>>,
        active: ActiveGeneration,
        slot: DisplaySlot,
        placeholder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            active,
            slot,
            placeholder: placeholder.into(),
        }
    }

    pub fn slot(&self) -> &DisplaySlot {
        &self.slot
    }

    pub fn placeholder(&self) -> &Path {
        &self.placeholder
    }

    /// Starts the lookup for `zone` in the background.
    pub fn dispatch(&self, zone: &HotZone) -> JoinHandle<DispatchOutcome> {
        let this = self.clone();
        let generation = zone.generation;
        let label = zone.label.clone();
        tokio::spawn(async move { this.lookup(generation, &label).await })
    }

    pub async fn handle_click(&self, zone: &HotZone) -> DispatchOutcome {
        self.lookup(zone.generation, &zone.label).await
    }

    async fn lookup(&self, generation: Generation, label: &str) -> DispatchOutcome {
        info!("hot zone clicked: {:?} (generation {})", label, generation);
        let result = self.resolver.resolve(label).await;
        let path = display_path(&result, &self.placeholder).to_path_buf();
        let status = result.status;

        let applied = self
            .active
            .apply_if_current(generation, || self.slot.show(path.clone()));
        if applied.is_none() {
            info!(
                "discarding lookup for {:?}: generation {} is no longer active",
                label, generation
            );
            return DispatchOutcome::Discarded { generation };
        }
        match status {
            LookupStatus::Found => DispatchOutcome::Shown { path },
            status => DispatchOutcome::Placeholder { status, path },
        }
    }
}
