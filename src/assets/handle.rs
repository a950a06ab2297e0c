use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use arc_swap::ArcSwap;
use log::warn;

#[derive(Debug)]
pub enum AssetState<T> {
    /// Submitted, but the loader hasn't completed yet.
    Empty,
    Loaded(Arc<T>),
    Failed(String),
}

/// A stable reference to an asset that may not have been loaded yet. Handles are created
/// when the load is submitted and populated exactly once when it completes. Readers (e.g. the
/// renderer) can hold on to the handle and poll it from any thread without locking.
pub struct AssetHandle<T> {
    name: String,
    state: ArcSwap<AssetState<T>>,
    revision: AtomicU32,
}

impl<T> AssetHandle<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ArcSwap::from_pointee(AssetState::Empty),
            revision: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> Arc<AssetState<T>> {
        self.state.load_full()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        match self.state.load().as_ref() {
            AssetState::Loaded(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state.load().as_ref(), AssetState::Empty)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state.load().as_ref(), AssetState::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state.load().as_ref(), AssetState::Failed(_))
    }

    /// How often the handle has been populated, which is 0 or 1 unless something is broken.
    pub fn revision(&self) -> u32 {
        self.revision.load(Ordering::Acquire)
    }

    /// Moves the handle out of [`AssetState::Empty`]. There is only one writer per handle (the
    /// completion of its loader), so a populated handle is never overwritten.
    pub(crate) fn populate(&self, state: AssetState<T>) -> bool {
        if !self.is_empty() {
            warn!("Handle {} has already been populated, dropping the new state", self.name);
            return false;
        }

        self.state.store(Arc::new(state));
        self.revision.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub(crate) fn fail(&self, reason: impl Into<String>) -> bool {
        self.populate(AssetState::Failed(reason.into()))
    }

    pub(crate) fn fill(&self, value: T) -> bool {
        self.populate(AssetState::Loaded(Arc::new(value)))
    }
}
