use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, trace, warn};

use img::Archive;

use crate::assets::handle::AssetHandle;
use crate::assets::{AssetKind, Blob, Payload};
use crate::io::error::LoadError;
use crate::io::img::loader::{ImgLoader, read_img_file_into_owned};
use crate::io::path::{normalize, resolve_real_case};
use crate::rendering::atlas::{AtlasAllocator, TextureSlot};

/// A row of the logical file table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalFileEntry {
    /// The normalized name, which is also the key of the table.
    pub name: String,
    pub archived: bool,
    /// The container when `archived`, the file on disk otherwise.
    pub location: PathBuf,
    /// The exact spelling inside the container.
    pub source_name: Option<String>,
    /// Every spelling this entry has been registered with.
    pub aliases: BTreeSet<String>,
}

/// Everything a loader job needs to get at the bytes of an asset, without going back to the
/// registry.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Archive { archive: Arc<Archive>, entry: String },
    Loose { root: PathBuf, path: PathBuf },
}

impl AssetSource {
    pub fn read(&self) -> Result<Vec<u8>, LoadError> {
        match self {
            AssetSource::Archive { archive, entry } => read_img_file_into_owned(archive, entry),
            AssetSource::Loose { root, path } => read_loose_file(root, path),
        }
    }
}

/// Reads a file below `root`, falling back to a case-insensitive lookup when the path as
/// registered doesn't exist.
pub fn read_loose_file(root: &Path, path: &Path) -> Result<Vec<u8>, LoadError> {
    let direct = root.join(path);
    let real_path = if direct.is_file() {
        direct
    } else {
        let relative = path.strip_prefix(root).unwrap_or(path);
        resolve_real_case(root, &normalize(&relative.to_string_lossy())).unwrap_or(direct)
    };

    fs::read(&real_path).map_err(|source| LoadError::Io {
        path: real_path,
        source,
    })
}

/// The logical file table and everything that hangs off it: opened archives, the set of
/// names that have been submitted for loading, the asset handles and the texture atlas.
///
/// The registry is owned by a single thread. Loader jobs capture an [`AssetSource`] when they
/// are created and hand their results back through [`AssetRegistry::apply`], so none of the
/// tables need locking.
pub struct AssetRegistry {
    data_dir: PathBuf,
    files: HashMap<String, LogicalFileEntry>,
    archives: ImgLoader,
    ide_locations: HashMap<String, PathBuf>,
    ipl_locations: HashMap<String, PathBuf>,
    collision_zones: HashMap<String, u8>,
    loaded: HashSet<String>,
    models: HashMap<String, Arc<AssetHandle<Blob>>>,
    textures: HashMap<String, Arc<AssetHandle<TextureSlot>>>,
    animations: HashMap<String, Arc<AssetHandle<Blob>>>,
    collisions: HashMap<String, Arc<AssetHandle<Blob>>>,
    atlas: AtlasAllocator,
}

impl AssetRegistry {
    pub fn new(data_dir: impl Into<PathBuf>, max_texture_size: u32) -> Self {
        Self {
            data_dir: data_dir.into(),
            files: HashMap::new(),
            archives: ImgLoader::new(),
            ide_locations: HashMap::new(),
            ipl_locations: HashMap::new(),
            collision_zones: HashMap::new(),
            loaded: HashSet::new(),
            models: HashMap::new(),
            textures: HashMap::new(),
            animations: HashMap::new(),
            collisions: HashMap::new(),
            atlas: AtlasAllocator::new(max_texture_size),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn insert(&mut self, spelling: &str, archived: bool, location: PathBuf, source_name: Option<String>) -> String {
        let name = normalize(spelling);
        let mut aliases = BTreeSet::from([spelling.to_string(), name.clone()]);

        // Last registration wins, but the spellings of the old row still lead here.
        if let Some(previous) = self.files.remove(&name) {
            if previous.location != location {
                trace!(
                    "{} moves from {} to {}",
                    name,
                    previous.location.display(),
                    location.display()
                );
            }
            aliases.extend(previous.aliases);
        }

        self.files.insert(
            name.clone(),
            LogicalFileEntry {
                name: name.clone(),
                archived,
                location,
                source_name,
                aliases,
            },
        );
        name
    }

    /// Records a loose file. `path` is relative to the data directory (or absolute).
    pub fn register_loose(&mut self, name: &str, path: impl Into<PathBuf>) -> String {
        self.insert(name, false, path.into(), None)
    }

    pub fn register_ide(&mut self, path: &str) -> String {
        let name = normalize(path);
        self.ide_locations
            .insert(name.clone(), self.data_dir.join(&name));
        self.register_loose(path, name)
    }

    pub fn register_ipl(&mut self, path: &str) -> String {
        let name = normalize(path);
        let real_path =
            resolve_real_case(&self.data_dir, &name).unwrap_or_else(|| self.data_dir.join(&name));
        self.ipl_locations.insert(name.clone(), real_path.clone());
        self.register_loose(path, real_path)
    }

    /// Texture dictionaries are known by their file name only. Returns that name.
    pub fn register_txd(&mut self, path: &str) -> String {
        let relative = normalize(path);
        let file_name = relative
            .rsplit('/')
            .next()
            .unwrap_or(relative.as_str())
            .to_string();
        self.register_loose(&file_name, relative)
    }

    pub fn register_collision(&mut self, zone: u8, path: &str) -> String {
        let name = normalize(path);
        self.collision_zones.insert(name.clone(), zone);
        self.register_loose(path, name)
    }

    /// Opens the container at `path` and indexes each of its files under the spelling stored in
    /// the container and under the normalized spelling. Returns the number of spellings indexed.
    pub fn register_archive(&mut self, path: &Path) -> Result<usize, LoadError> {
        let archive = self.archives.open_archive(path)?;

        let mut spellings = 0;
        for entry in archive.entries() {
            self.insert(&entry.name, true, path.to_path_buf(), Some(entry.name.clone()));
            spellings += 2;
        }

        Ok(spellings)
    }

    /// Indexes a single entry of `container` without opening it. Reading the entry fails with
    /// [`LoadError::ArchiveMissing`] until the container is opened through
    /// [`AssetRegistry::register_archive`].
    pub fn register_archived(&mut self, name: &str, container: impl Into<PathBuf>) -> String {
        self.insert(name, true, container.into(), Some(name.to_string()))
    }

    pub fn archives(&self) -> &ImgLoader {
        &self.archives
    }

    pub fn entry(&self, name: &str) -> Option<&LogicalFileEntry> {
        self.files.get(&normalize(name))
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogicalFileEntry> {
        self.files.values()
    }

    pub fn ide_locations(&self) -> &HashMap<String, PathBuf> {
        &self.ide_locations
    }

    pub fn ipl_locations(&self) -> &HashMap<String, PathBuf> {
        &self.ipl_locations
    }

    pub fn collision_zone(&self, name: &str) -> Option<u8> {
        self.collision_zones.get(&normalize(name)).copied()
    }

    /// Works out where the bytes of `name` come from, without reading them.
    pub fn source(&self, name: &str) -> Result<AssetSource, LoadError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        if !entry.archived {
            return Ok(AssetSource::Loose {
                root: self.data_dir.clone(),
                path: entry.location.clone(),
            });
        }

        let archive = self
            .archives
            .archive(&entry.location)
            .ok_or_else(|| LoadError::ArchiveMissing {
                name: name.to_string(),
                archive: entry.location.clone(),
            })?;

        Ok(AssetSource::Archive {
            archive: archive.clone(),
            entry: entry.source_name.clone().unwrap_or_else(|| name.to_string()),
        })
    }

    pub fn open(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        let result = self.source(name).and_then(|source| source.read());
        if let Err(err) = &result {
            error!("{}", err);
        }
        result
    }

    /// Flags the file as loaded, then opens it. Opening a file twice is a bug on the caller's
    /// side, but not one worth failing the load over.
    pub fn mark_and_open(&mut self, name: &str) -> Result<Vec<u8>, LoadError> {
        if !self.mark_submitted(name) {
            warn!("{}", LoadError::DuplicateSubmission(name.to_string()));
        }
        self.open(name)
    }

    /// Inserts the name into the set of submitted files. Returns false if it was already there.
    pub fn mark_submitted(&mut self, name: &str) -> bool {
        self.loaded.insert(normalize(name))
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(&normalize(name))
    }

    fn get_or_create<T>(handles: &mut HashMap<String, Arc<AssetHandle<T>>>, name: &str) -> Arc<AssetHandle<T>> {
        match handles.entry(normalize(name)) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                let handle = Arc::new(AssetHandle::new(vacant.key().clone()));
                vacant.insert(handle).clone()
            }
        }
    }

    pub fn model_handle(&mut self, name: &str) -> Arc<AssetHandle<Blob>> {
        Self::get_or_create(&mut self.models, name)
    }

    pub fn texture_slot(&mut self, name: &str) -> Arc<AssetHandle<TextureSlot>> {
        Self::get_or_create(&mut self.textures, name)
    }

    pub fn animation_handle(&mut self, name: &str) -> Arc<AssetHandle<Blob>> {
        Self::get_or_create(&mut self.animations, name)
    }

    pub fn collision_handle(&mut self, name: &str) -> Arc<AssetHandle<Blob>> {
        Self::get_or_create(&mut self.collisions, name)
    }

    pub fn model(&self, name: &str) -> Option<Arc<AssetHandle<Blob>>> {
        self.models.get(&normalize(name)).cloned()
    }

    pub fn texture(&self, name: &str) -> Option<Arc<AssetHandle<TextureSlot>>> {
        self.textures.get(&normalize(name)).cloned()
    }

    pub fn animation(&self, name: &str) -> Option<Arc<AssetHandle<Blob>>> {
        self.animations.get(&normalize(name)).cloned()
    }

    pub fn collision(&self, name: &str) -> Option<Arc<AssetHandle<Blob>>> {
        self.collisions.get(&normalize(name)).cloned()
    }

    /// Creates the (empty) handle of the given kind.
    pub fn reserve(&mut self, name: &str, kind: AssetKind) {
        match kind {
            AssetKind::Model => drop(self.model_handle(name)),
            AssetKind::Texture => drop(self.texture_slot(name)),
            AssetKind::Animation => drop(self.animation_handle(name)),
            AssetKind::Collision => drop(self.collision_handle(name)),
        }
    }

    pub fn atlas(&self) -> &AtlasAllocator {
        &self.atlas
    }

    pub fn atlas_mut(&mut self) -> &mut AtlasAllocator {
        &mut self.atlas
    }

    fn mark_failed(&mut self, name: &str, kind: AssetKind, reason: String) {
        let populated = match kind {
            AssetKind::Model => self.model_handle(name).fail(reason),
            AssetKind::Texture => self.texture_slot(name).fail(reason),
            AssetKind::Animation => self.animation_handle(name).fail(reason),
            AssetKind::Collision => self.collision_handle(name).fail(reason),
        };

        if !populated {
            warn!("{} {} failed, but its handle had already been populated", kind, name);
        }
    }

    /// The completion step of a loader: populates the handle of `name` with the decoded payload
    /// or with the failure.
    pub fn apply(&mut self, name: &str, kind: AssetKind, result: Result<Payload, LoadError>) -> Result<(), LoadError> {
        let outcome = result.and_then(|payload| self.store(name, kind, payload));

        if let Err(err) = &outcome {
            error!("Loading {} {} failed: {}", kind, name, err);
            self.mark_failed(name, kind, err.to_string());
        } else {
            trace!("Loaded {} {}", kind, name);
        }

        outcome
    }

    fn store(&mut self, name: &str, kind: AssetKind, payload: Payload) -> Result<(), LoadError> {
        if payload.kind() != kind {
            return Err(LoadError::Decode {
                name: name.to_string(),
                reason: format!("expected a {}, but the decoder produced a {}", kind, payload.kind()),
            });
        }

        let populated = match payload {
            Payload::Model(blob) => self.model_handle(name).fill(blob),
            Payload::Animation(blob) => self.animation_handle(name).fill(blob),
            Payload::Collision(blob) => self.collision_handle(name).fill(blob),
            Payload::Texture(texture) => {
                let slot = self.atlas.pack(&texture).map_err(|err| LoadError::Decode {
                    name: name.to_string(),
                    reason: err.to_string(),
                })?;
                self.texture_slot(name).fill(slot)
            }
        };

        if !populated {
            warn!("{} {} has been loaded more than once", kind, name);
        }
        Ok(())
    }
}
