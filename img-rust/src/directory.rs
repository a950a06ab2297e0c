use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::Error;

/// Offsets and sizes in the directory table are counted in sectors of this many bytes.
pub const SECTOR_SIZE: u64 = 2048;

/// Every directory record is 32 bytes wide, regardless of the archive version.
pub const RECORD_SIZE: u64 = 32;

const NAME_LENGTH: usize = 24;

/// A single file inside an archive. `offset` and `size` are in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub offset: u64,
    pub size: u32,
}

impl Entry {
    fn from_sectors(name: String, offset_sectors: u32, size_sectors: u32) -> Result<Entry, Error> {
        let size = u64::from(size_sectors) * SECTOR_SIZE;
        let size = u32::try_from(size).map_err(|_| Error::Corrupt {
            reason: format!("{} spans {} sectors, which does not fit into 32 bits", name, size_sectors),
        })?;

        Ok(Entry {
            name,
            offset: u64::from(offset_sectors) * SECTOR_SIZE,
            size,
        })
    }

    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

fn read_name<R: Read>(rdr: &mut R) -> Result<String, Error> {
    let mut raw = [0u8; NAME_LENGTH];
    rdr.read_exact(&mut raw)?;

    // The name is NUL terminated, whatever follows the terminator is garbage from the packing tool.
    let len = raw.iter().position(|&c| c == 0).unwrap_or(NAME_LENGTH);
    Ok(String::from_utf8_lossy(&raw[..len]).into_owned())
}

/// Record layout of the legacy `.dir` files: `u32 offset, u32 size, char name[24]`.
pub(crate) fn read_v1_record<R: Read>(rdr: &mut R) -> Result<Entry, Error> {
    let offset = rdr.read_u32::<LittleEndian>()?;
    let size = rdr.read_u32::<LittleEndian>()?;
    let name = read_name(rdr)?;
    Entry::from_sectors(name, offset, size)
}

/// Record layout of `VER2` archives: `u32 offset, u16 streaming size, u16 archive size, char name[24]`.
pub(crate) fn read_v2_record<R: Read>(rdr: &mut R) -> Result<Entry, Error> {
    let offset = rdr.read_u32::<LittleEndian>()?;
    let streaming_size = rdr.read_u16::<LittleEndian>()?;
    let archive_size = rdr.read_u16::<LittleEndian>()?;
    let name = read_name(rdr)?;

    // The archive size is almost always 0 and only used when the streaming size is not set.
    let size = if streaming_size != 0 {
        streaming_size
    } else {
        archive_size
    };

    Entry::from_sectors(name, offset, u32::from(size))
}
