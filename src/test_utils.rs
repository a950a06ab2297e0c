use std::fs;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use image::{ImageFormat, Rgba, RgbaImage};
use img::{RECORD_SIZE, SECTOR_SIZE};

/// Writes a `VER2` container holding `files`, each starting at its own sector. A file with
/// no content gets a zero-size record.
pub fn write_ver2(path: &Path, files: &[(&str, &[u8])]) -> Result<(), anyhow::Error> {
    let sector = SECTOR_SIZE as usize;
    let directory_len = 8 + files.len() * RECORD_SIZE as usize;
    let mut next_sector = directory_len.div_ceil(sector);

    let mut out = Vec::new();
    out.extend_from_slice(b"VER2");
    out.write_u32::<LittleEndian>(files.len() as u32)?;

    let mut data = Vec::new();
    for (name, content) in files {
        let sectors = content.len().div_ceil(sector);
        out.write_u32::<LittleEndian>(next_sector as u32)?;
        out.write_u16::<LittleEndian>(sectors as u16)?;
        out.write_u16::<LittleEndian>(0)?;

        let mut field = [0u8; 24];
        field[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&field);

        let mut padded = content.to_vec();
        padded.resize(sectors * sector, 0);
        data.extend_from_slice(&padded);
        next_sector += sectors;
    }

    out.resize(directory_len.div_ceil(sector) * sector, 0);
    out.extend_from_slice(&data);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, out)?;
    Ok(())
}

pub fn write_file(path: &Path, content: &[u8]) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// A single colored PNG, as a stand-in for texture dictionaries.
pub fn png(width: u32, height: u32, alpha: u8) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, alpha]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("encoding a png in memory");
    out.into_inner()
}
