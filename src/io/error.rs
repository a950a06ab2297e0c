use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while locating, reading or decoding a single asset.
/// None of these are fatal: the caller logs them and carries on with the next asset.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unable to locate file {0}")]
    NotFound(String),

    /// The file table points into a container that has never been opened. This is a data
    /// consistency bug rather than something that goes away when retrying.
    #[error("{name} is indexed in {}, but that archive was never opened", archive.display())]
    ArchiveMissing { name: String, archive: PathBuf },

    #[error("Error reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Container {} could not be indexed", path.display())]
    CorruptContainer {
        path: PathBuf,
        #[source]
        source: img::Error,
    },

    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("{0} has already been submitted for loading")]
    DuplicateSubmission(String),
}

impl LoadError {
    /// Maps an extraction failure of `name` inside the archive at `archive`.
    pub(crate) fn from_extraction(name: &str, archive: PathBuf, err: img::Error) -> Self {
        match err {
            img::Error::FileNotFound(_) => LoadError::NotFound(name.to_string()),
            img::Error::IOError(source) => LoadError::Io {
                path: archive,
                source,
            },
            source @ img::Error::Corrupt { .. } => LoadError::CorruptContainer {
                path: archive,
                source,
            },
        }
    }
}
