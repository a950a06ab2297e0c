use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{trace, warn};

use crate::directory::{read_v1_record, read_v2_record, Entry, RECORD_SIZE};
use crate::Error;

const V2_MAGIC: &[u8; 4] = b"VER2";
const V2_HEADER_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// A `.dir` file holding the directory table next to an `.img` file holding the data.
    V1,
    /// A single `.img` file starting with `VER2` and the entry count.
    V2,
}

/// An opened archive. Opening reads the complete directory table, afterwards the archive is
/// never mutated, so it can be shared between threads and read from concurrently.
#[derive(Debug)]
pub struct Archive {
    data_path: PathBuf,
    version: Version,
    entries: Vec<Entry>,
    lookup: HashMap<String, usize>,
}

impl Archive {
    /// Opens an archive from either the `.img`, the `.dir` or the path without an extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Archive, Error> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        if extension.as_deref() == Some("dir") {
            return Self::open_v1(path, &path.with_extension("img"));
        }

        let data_path = match extension {
            None => path.with_extension("img"),
            Some(_) => path.to_path_buf(),
        };

        if Self::has_v2_magic(&data_path)? {
            return Self::open_v2(&data_path);
        }

        let dir_path = data_path.with_extension("dir");
        if dir_path.is_file() {
            return Self::open_v1(&dir_path, &data_path);
        }

        if !data_path.exists() {
            return Err(Error::IOError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", data_path.display()),
            )));
        }

        Err(Error::Corrupt {
            reason: format!(
                "{} has no VER2 header and there is no directory file next to it",
                data_path.display()
            ),
        })
    }

    fn has_v2_magic(data_path: &Path) -> Result<bool, Error> {
        let mut file = match File::open(data_path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let mut magic = [0u8; 4];
        match file.read_exact(&mut magic) {
            Ok(()) => Ok(&magic == V2_MAGIC),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn open_v1(dir_path: &Path, data_path: &Path) -> Result<Archive, Error> {
        let dir_len = fs::metadata(dir_path)?.len();
        if dir_len % RECORD_SIZE != 0 {
            return Err(Error::Corrupt {
                reason: format!(
                    "{} is {} bytes long, which is not a multiple of the record size",
                    dir_path.display(),
                    dir_len
                ),
            });
        }

        // The data is only read on extraction, but a directory without data is useless.
        if !data_path.is_file() {
            return Err(Error::Corrupt {
                reason: format!("{} has no data file {}", dir_path.display(), data_path.display()),
            });
        }

        let mut rdr = BufReader::new(File::open(dir_path)?);
        let count = dir_len / RECORD_SIZE;
        let records = (0..count)
            .map(|_| read_v1_record(&mut rdr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_records(data_path.to_path_buf(), Version::V1, records))
    }

    fn open_v2(data_path: &Path) -> Result<Archive, Error> {
        let file_len = fs::metadata(data_path)?.len();
        let mut rdr = BufReader::new(File::open(data_path)?);

        let mut magic = [0u8; 4];
        rdr.read_exact(&mut magic)?;
        let count = u64::from(rdr.read_u32::<LittleEndian>()?);

        if V2_HEADER_SIZE + count * RECORD_SIZE > file_len {
            return Err(Error::Corrupt {
                reason: format!(
                    "the header declares {} entries, but {} is only {} bytes long",
                    count,
                    data_path.display(),
                    file_len
                ),
            });
        }

        let records = (0..count)
            .map(|_| read_v2_record(&mut rdr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_records(data_path.to_path_buf(), Version::V2, records))
    }

    fn from_records(data_path: PathBuf, version: Version, records: Vec<Entry>) -> Archive {
        let mut entries = Vec::with_capacity(records.len());
        let mut lookup = HashMap::with_capacity(records.len());

        for record in records {
            if record.size == 0 {
                // Placeholder records of the packing tool, there is nothing to load behind them.
                warn!("Asset {} in {} has no size, ignoring.", record.name, data_path.display());
                continue;
            }

            lookup.insert(record.name.clone(), entries.len());
            entries.push(record);
        }

        trace!("Indexed {} entries of {}", entries.len(), data_path.display());

        Archive {
            data_path,
            version,
            entries,
            lookup,
        }
    }

    /// The file that holds the entries' data.
    pub fn path(&self) -> &Path {
        &self.data_path
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn asset_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry_at(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Looks the entry up by its exact name, as stored in the directory table.
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.lookup.get(name).map(|&index| &self.entries[index])
    }

    pub fn contains_file(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Extracts the named file into a freshly allocated buffer.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, Error> {
        let entry = self
            .find(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        self.read_entry(entry)
    }

    pub fn read_entry(&self, entry: &Entry) -> Result<Vec<u8>, Error> {
        // Every read opens its own handle, so that concurrent readers never share a cursor.
        let mut file = File::open(&self.data_path)?;
        let file_len = file.metadata()?.len();
        if entry.end() > file_len {
            return Err(Error::Corrupt {
                reason: format!(
                    "{} ends at byte {}, but {} is only {} bytes long",
                    entry.name,
                    entry.end(),
                    self.data_path.display(),
                    file_len
                ),
            });
        }

        file.seek(SeekFrom::Start(entry.offset))?;

        let mut buf = vec![0; entry.size as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
