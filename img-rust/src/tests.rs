use std::fs;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{Archive, Error, Version, SECTOR_SIZE};

fn name_field(name: &str) -> [u8; 24] {
    let mut field = [0u8; 24];
    field[..name.len()].copy_from_slice(name.as_bytes());
    field
}

/// Lays every file out at its own sector, the directory sits in sector 0.
fn write_v2(path: &Path, files: &[(&str, &[u8])]) -> Result<(), anyhow::Error> {
    let mut out = Vec::new();
    out.extend_from_slice(b"VER2");
    out.write_u32::<LittleEndian>(files.len() as u32)?;

    let mut data = Vec::new();
    for (index, (name, content)) in files.iter().enumerate() {
        let sectors = (content.len() as u64).div_ceil(SECTOR_SIZE);
        out.write_u32::<LittleEndian>(index as u32 + 1)?;
        out.write_u16::<LittleEndian>(sectors as u16)?;
        out.write_u16::<LittleEndian>(0)?;
        out.extend_from_slice(&name_field(name));

        let mut padded = content.to_vec();
        padded.resize(SECTOR_SIZE as usize, 0);
        data.extend_from_slice(&padded);
    }

    out.resize(SECTOR_SIZE as usize, 0);
    out.extend_from_slice(&data);
    fs::write(path, out)?;
    Ok(())
}

#[test]
fn v2_archive_indexes_and_extracts() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gta3.img");
    write_v2(&path, &[("wheels.DFF", b"wheel data"), ("infernus.txd", b"texture")])?;

    let archive = Archive::open(&path)?;
    assert_eq!(archive.version(), Version::V2);
    assert_eq!(archive.asset_count(), 2);
    assert_eq!(archive.entry_at(0).map(|e| e.name.as_str()), Some("wheels.DFF"));
    assert_eq!(archive.entry_at(1).map(|e| e.offset), Some(2 * SECTOR_SIZE));
    assert!(archive.entry_at(2).is_none());

    let wheels = archive.read_file("wheels.DFF")?;
    assert_eq!(wheels.len(), SECTOR_SIZE as usize);
    assert_eq!(&wheels[..10], b"wheel data");

    // Lookups are exact, case folding is the registry's business.
    assert!(matches!(archive.read_file("WHEELS.DFF"), Err(Error::FileNotFound(_))));
    Ok(())
}

#[test]
fn v1_archive_is_found_from_every_spelling() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;

    let mut records = Vec::new();
    records.write_u32::<LittleEndian>(0)?;
    records.write_u32::<LittleEndian>(1)?;
    records.extend_from_slice(&name_field("cube.dff"));
    fs::write(dir.path().join("models.dir"), &records)?;

    let mut data = b"cube".to_vec();
    data.resize(SECTOR_SIZE as usize, 0);
    fs::write(dir.path().join("models.img"), &data)?;

    for spelling in ["models", "models.img", "models.dir"] {
        let archive = Archive::open(dir.path().join(spelling))?;
        assert_eq!(archive.version(), Version::V1);
        assert_eq!(archive.path(), dir.path().join("models.img"));
        assert_eq!(&archive.read_file("cube.dff")?[..4], b"cube");
    }
    Ok(())
}

#[test]
fn zero_sized_records_are_skipped() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gta3.img");
    write_v2(&path, &[("empty.dff", b""), ("full.dff", b"x")])?;

    let archive = Archive::open(&path)?;
    assert_eq!(archive.asset_count(), 1);
    assert!(!archive.contains_file("empty.dff"));
    assert!(matches!(archive.read_file("empty.dff"), Err(Error::FileNotFound(_))));
    assert!(archive.contains_file("full.dff"));
    Ok(())
}

#[test]
fn truncated_directory_is_corrupt() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.img");

    let mut out = b"VER2".to_vec();
    out.write_u32::<LittleEndian>(1000)?;
    fs::write(&path, out)?;

    assert!(matches!(Archive::open(&path), Err(Error::Corrupt { .. })));

    fs::write(dir.path().join("odd.dir"), [0u8; 33])?;
    fs::write(dir.path().join("odd.img"), [0u8; 16])?;
    assert!(matches!(
        Archive::open(dir.path().join("odd.dir")),
        Err(Error::Corrupt { .. })
    ));
    Ok(())
}

#[test]
fn entries_past_the_end_of_the_data_are_corrupt() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gta3.img");
    write_v2(&path, &[("first.dff", b"first"), ("second.dff", b"second")])?;

    // Cut the second entry's sector in half, the directory still claims all of it.
    let mut bytes = fs::read(&path)?;
    bytes.truncate(2 * SECTOR_SIZE as usize + 100);
    fs::write(&path, bytes)?;

    let archive = Archive::open(&path)?;
    assert_eq!(archive.entry_at(1).map(|e| e.end()), Some(3 * SECTOR_SIZE));
    assert_eq!(&archive.read_file("first.dff")?[..5], b"first");
    assert!(matches!(archive.read_file("second.dff"), Err(Error::Corrupt { .. })));
    Ok(())
}

#[test]
fn missing_archive_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Archive::open(dir.path().join("nothing.img"));
    assert!(matches!(result, Err(Error::IOError(_))));
}
