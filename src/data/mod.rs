//! The entry point for everything that reads game data: owns the [`AssetRegistry`], the
//! worker pool that loads assets in the background and the caches of the small text formats.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::assets::decoder::{AssetDecoder, BlobDecoder};
use crate::assets::handle::AssetHandle;
use crate::assets::{AssetKind, Blob};
use crate::data::dynamic_objects::{DynamicObjectData, parse_dynamic_objects};
use crate::data::load_job::LoadAssetJob;
use crate::io::error::LoadError;
use crate::io::manifest::{DatCommand, parse_dat};
use crate::io::path::{normalize, resolve_real_case};
use crate::io::registry::AssetRegistry;
use crate::jobs::{Job, JobId, JobQueue, work_isolated};
use crate::rendering::atlas::{AtlasPage, TextureSlot};
use crate::settings::DataConfig;

pub mod dynamic_objects;
pub mod load_job;

#[cfg(test)]
mod tests;

/// What happened to a [`DataStore::load_async`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued(JobId),
    /// The name had been submitted before, nothing was queued.
    Duplicate,
}

pub struct DataStore {
    config: DataConfig,
    registry: AssetRegistry,
    queue: JobQueue<AssetRegistry>,
    decoder: Arc<dyn AssetDecoder>,
    dynamic_objects: HashMap<String, Arc<DynamicObjectData>>,
    splash: Option<String>,
}

impl DataStore {
    pub fn new(config: DataConfig) -> Self {
        Self::with_decoder(config, Arc::new(BlobDecoder))
    }

    pub fn with_decoder(config: DataConfig, decoder: Arc<dyn AssetDecoder>) -> Self {
        info!(
            "Reading game data from {} with {} asset workers",
            config.data_dir.display(),
            config.worker_count
        );

        Self {
            registry: AssetRegistry::new(config.data_dir.clone(), config.max_texture_size),
            queue: JobQueue::new(config.worker_count),
            config,
            decoder,
            dynamic_objects: HashMap::new(),
            splash: None,
        }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AssetRegistry {
        &mut self.registry
    }

    /// The real path of a file below the data directory, as written in the manifests.
    fn data_path(&self, relative: &str) -> PathBuf {
        let normalized = normalize(relative);
        resolve_real_case(&self.config.data_dir, &normalized)
            .unwrap_or_else(|| self.config.data_dir.join(normalized))
    }

    /// The startup sequence: reads both manifests, then the assets everything else depends on.
    /// Failures are logged and skipped.
    pub fn load(&mut self) {
        profiling::scope!("DataStore::load");

        self.load_manifest("data/default.dat");
        self.load_manifest("data/gta3.dat");

        self.registry
            .register_loose("wheels.dff", "models/generic/wheels.dff");
        self.registry
            .register_loose("loplyguy.dff", "models/generic/loplyguy.dff");
        self.registry
            .register_loose("particle.txd", "models/particle.txd");
        self.preload("wheels.dff", AssetKind::Model);
        self.preload("particle.txd", AssetKind::Texture);

        match self.load_dynamic_objects("data/object.dat") {
            Ok(count) => debug!("Loaded {} dynamic objects", count),
            Err(err) => warn!("No dynamic object data: {}", err),
        }

        self.registry.register_loose("anim/ped.ifp", "anim/ped.ifp");
        self.preload("anim/ped.ifp", AssetKind::Animation);
    }

    /// Reads a manifest relative to the data directory and applies every command in it.
    pub fn load_manifest(&mut self, relative_path: &str) {
        let path = self.data_path(relative_path);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!("Failed to open manifest {}: {}", path.display(), err);
                return;
            }
        };

        let commands = parse_dat(&text);
        info!("Applying {} commands from {}", commands.len(), path.display());
        for command in commands {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: DatCommand) {
        trace!("{:?}", command);
        match command {
            DatCommand::Ide(path) => {
                self.registry.register_ide(&path);
            }
            DatCommand::Ipl(path) => {
                self.registry.register_ipl(&path);
            }
            DatCommand::Img(path) => {
                if let Err(err) = self.register_archive(&path) {
                    error!("Skipping container {}: {:?}", path, err);
                }
            }
            DatCommand::Splash(name) => self.splash = Some(name),
            DatCommand::TexDiction(path) => {
                let name = self.registry.register_txd(&path);
                self.preload(&name, AssetKind::Texture);
            }
            DatCommand::ColFile { zone, path } => {
                let name = self.registry.register_collision(zone, &path);
                self.preload(&name, AssetKind::Collision);
            }
            DatCommand::ModelFile(path) => {
                let name = normalize(&path);
                self.registry.register_loose(&path, name.clone());
                self.preload(&name, AssetKind::Model);
            }
        }
    }

    /// Opens a container relative to the data directory and indexes its entries.
    pub fn register_archive(&mut self, relative_path: &str) -> Result<usize, LoadError> {
        let path = self.data_path(relative_path);
        self.registry.register_archive(&path)
    }

    pub fn splash(&self) -> Option<&str> {
        self.splash.as_deref()
    }

    /// Registers a file below the data directory under its own path and reads it.
    pub fn load_loose(&mut self, relative_path: &str) -> Result<Vec<u8>, LoadError> {
        let name = normalize(relative_path);
        self.registry.register_loose(relative_path, name.clone());
        self.registry.mark_and_open(&name)
    }

    /// Reads a file that has been indexed from a container. Loose files of the same name are
    /// not considered.
    pub fn load_from_archive(&mut self, name: &str) -> Result<Vec<u8>, LoadError> {
        let archived = self
            .registry
            .entry(name)
            .is_some_and(|entry| entry.archived);
        if !archived {
            return Err(LoadError::NotFound(name.to_string()));
        }
        self.registry.mark_and_open(name)
    }

    pub fn open_file(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        self.registry.open(name)
    }

    pub fn load_file(&mut self, name: &str) -> Result<Vec<u8>, LoadError> {
        self.registry.mark_and_open(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.registry.is_loaded(name)
    }

    /// Creates the asset's handle and captures where its bytes come from. The name has to be
    /// marked as submitted already.
    fn prepare(&mut self, name: &str, kind: AssetKind) -> Result<LoadAssetJob, LoadError> {
        self.registry.reserve(name, kind);
        let source = self.registry.source(name)?;
        Ok(LoadAssetJob::new(normalize(name), kind, source, self.decoder.clone()))
    }

    fn submit_once(&mut self, name: &str) -> Result<(), LoadError> {
        if self.registry.mark_submitted(name) {
            Ok(())
        } else {
            let err = LoadError::DuplicateSubmission(name.to_string());
            warn!("{}", err);
            Err(err)
        }
    }

    /// Queues the asset for loading on the worker threads. Its handle exists (and is empty)
    /// as soon as this returns, it gets populated by [`DataStore::process_completions`].
    pub fn load_async(&mut self, name: &str, kind: AssetKind) -> Result<Submission, LoadError> {
        if self.submit_once(name).is_err() {
            return Ok(Submission::Duplicate);
        }

        let job = self.prepare(name, kind)?;
        Ok(Submission::Queued(self.queue.submit(Box::new(job))))
    }

    /// Loads the asset on the calling thread, for everything that has to be there before the
    /// first frame. A panicking decoder fails the asset like it would on a worker.
    pub fn load_sync(&mut self, name: &str, kind: AssetKind) -> Result<(), LoadError> {
        self.submit_once(name)?;

        let mut job = self.prepare(name, kind)?;
        match work_isolated(|| job.work()) {
            Ok(()) => job.finish(&mut self.registry),
            Err(reason) => job.fail(&mut self.registry, &reason),
        }
    }

    /// Like [`DataStore::load_sync`], but for the startup sequence, where failures are only
    /// logged and a name that has been loaded before is skipped.
    fn preload(&mut self, name: &str, kind: AssetKind) {
        if !self.registry.mark_submitted(name) {
            debug!("{} has been loaded before", name);
            return;
        }

        match self.prepare(name, kind) {
            Ok(job) => self.queue.run_sync(Box::new(job), &mut self.registry),
            Err(err) => error!("Can't load {} {}: {}", kind, name, err),
        }
    }

    /// Applies every finished load, without blocking. Returns how many completed.
    pub fn process_completions(&mut self) -> usize {
        self.queue.process_completions(&mut self.registry)
    }

    pub fn wait_for_completions(&mut self, timeout: Duration) -> usize {
        self.queue.wait_for_completions(&mut self.registry, timeout)
    }

    pub fn wait_idle(&mut self) {
        self.queue.wait_idle(&mut self.registry);
    }

    pub fn loads_in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    /// The atlas page at `index`, which is created when it is the next one in line.
    pub fn atlas_page(&mut self, index: usize) -> Option<&AtlasPage> {
        self.registry
            .atlas_mut()
            .page_for(index)
            .map(|page| &*page)
    }

    pub fn model(&self, name: &str) -> Option<Arc<AssetHandle<Blob>>> {
        self.registry.model(name)
    }

    pub fn texture(&self, name: &str) -> Option<Arc<AssetHandle<TextureSlot>>> {
        self.registry.texture(name)
    }

    pub fn animation(&self, name: &str) -> Option<Arc<AssetHandle<Blob>>> {
        self.registry.animation(name)
    }

    pub fn collision(&self, name: &str) -> Option<Arc<AssetHandle<Blob>>> {
        self.registry.collision(name)
    }

    /// Reads `object.dat` style metadata relative to the data directory. Returns the number of
    /// objects read.
    pub fn load_dynamic_objects(&mut self, relative_path: &str) -> Result<usize, LoadError> {
        let path = self.data_path(relative_path);
        let text = fs::read_to_string(&path).map_err(|source| LoadError::Io { path, source })?;

        let objects = parse_dynamic_objects(&text);
        let count = objects.len();
        for object in objects {
            self.dynamic_objects
                .insert(normalize(&object.model_name), Arc::new(object));
        }
        Ok(count)
    }

    pub fn dynamic_object(&self, model_name: &str) -> Option<Arc<DynamicObjectData>> {
        self.dynamic_objects.get(&normalize(model_name)).cloned()
    }
}
