use std::sync::Arc;

use crate::assets::decoder::AssetDecoder;
use crate::assets::{AssetKind, Payload};
use crate::io::error::LoadError;
use crate::io::registry::{AssetRegistry, AssetSource};
use crate::jobs::Job;

/// Reads and decodes one asset. Everything the work needs is captured on creation, the
/// registry is only touched again in [`LoadAssetJob::finish`].
pub struct LoadAssetJob {
    name: String,
    kind: AssetKind,
    source: AssetSource,
    decoder: Arc<dyn AssetDecoder>,
    result: Option<Result<Payload, LoadError>>,
}

impl LoadAssetJob {
    pub fn new(name: String, kind: AssetKind, source: AssetSource, decoder: Arc<dyn AssetDecoder>) -> Self {
        Self {
            name,
            kind,
            source,
            decoder,
            result: None,
        }
    }

    fn read_and_decode(&self) -> Result<Payload, LoadError> {
        let bytes = self.source.read()?;
        self.decoder
            .decode(self.kind, &self.name, bytes)
            .map_err(|err| LoadError::Decode {
                name: self.name.clone(),
                reason: err.to_string(),
            })
    }

    /// Populates the asset's handle with the outcome of [`Job::work`].
    pub fn finish(self, registry: &mut AssetRegistry) -> Result<(), LoadError> {
        let result = self.result.unwrap_or_else(|| {
            Err(LoadError::Decode {
                name: self.name.clone(),
                reason: "the loader never ran".to_string(),
            })
        });
        registry.apply(&self.name, self.kind, result)
    }

    /// Marks the asset's handle failed after [`Job::work`] panicked.
    pub fn fail(self, registry: &mut AssetRegistry, reason: &str) -> Result<(), LoadError> {
        let err = LoadError::Decode {
            name: self.name.clone(),
            reason: format!("loader panicked: {}", reason),
        };
        registry.apply(&self.name, self.kind, Err(err))
    }
}

impl Job<AssetRegistry> for LoadAssetJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn work(&mut self) {
        profiling::scope!("LoadAssetJob::work");
        self.result = Some(self.read_and_decode());
    }

    fn complete(self: Box<Self>, registry: &mut AssetRegistry) {
        // apply() already logged the failure and marked the handle.
        let _ = (*self).finish(registry);
    }

    fn abandon(self: Box<Self>, registry: &mut AssetRegistry, reason: &str) {
        let _ = (*self).fail(registry, reason);
    }
}
