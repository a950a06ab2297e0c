use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, trace, warn};

use img::Archive;

use crate::io::error::LoadError;

pub fn read_img_file_into_owned(archive: &Archive, file_name: &str) -> Result<Vec<u8>, LoadError> {
    archive
        .read_file(file_name)
        .map_err(|err| LoadError::from_extraction(file_name, archive.path().to_path_buf(), err))
}

/// The set of opened containers, keyed by the path they have been registered with.
/// Archives are immutable once opened and handed out as [`Arc`]s, so loader jobs can extract
/// from them on any thread.
#[derive(Default)]
pub struct ImgLoader {
    archives: HashMap<PathBuf, Arc<Archive>>,
}

impl ImgLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_archive(&mut self, path: &Path) -> Result<Arc<Archive>, LoadError> {
        profiling::scope!("ImgLoader::open_archive");
        let archive = Archive::open(path).map_err(|source| match source {
            img::Error::IOError(source) => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => LoadError::CorruptContainer {
                path: path.to_path_buf(),
                source,
            },
        })?;

        info!(
            "Opened {} ({:?}, {} entries)",
            path.display(),
            archive.version(),
            archive.asset_count()
        );

        let archive = Arc::new(archive);
        if self
            .archives
            .insert(path.to_path_buf(), archive.clone())
            .is_some()
        {
            // Entries already pointing at this path now resolve through the new archive.
            warn!("Archive {} has been opened twice, replacing it", path.display());
        }

        Ok(archive)
    }

    pub fn archive(&self, path: &Path) -> Option<&Arc<Archive>> {
        self.archives.get(path)
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn load_raw_owned(&self, archive_path: &Path, name: &str) -> Result<Vec<u8>, LoadError> {
        let archive = self
            .archives
            .get(archive_path)
            .ok_or_else(|| LoadError::ArchiveMissing {
                name: name.to_string(),
                archive: archive_path.to_path_buf(),
            })?;

        trace!("Loading {} from {}", name, archive_path.display());
        read_img_file_into_owned(archive, name)
    }
}
