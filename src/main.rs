use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use img::Archive;
use itertools::Itertools;

use rwdata::data::DataStore;
use rwdata::settings::{CliArgs, DataConfig, OperationMode};

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);
    let config = DataConfig::from(&args);

    match args.operation_mode {
        OperationMode::List { archive } => list(&container_path(&config, &archive)),
        OperationMode::Extract {
            archive,
            name,
            output,
        } => extract(&container_path(&config, &archive), &name, output),
        OperationMode::Load => load(config),
        OperationMode::Open { name } => open(config, &name),
    }
}

/// Containers can be given relative to the data directory, too.
fn container_path(config: &DataConfig, archive: &Path) -> PathBuf {
    if archive.is_absolute() || archive.exists() {
        archive.to_path_buf()
    } else {
        config.data_dir.join(archive)
    }
}

fn list(path: &Path) -> Result<(), anyhow::Error> {
    let archive = Archive::open(path).with_context(|| format!("Opening {}", path.display()))?;

    for entry in archive.entries().iter().sorted_by_key(|entry| entry.offset) {
        println!("{:>10} {:>10} {}", entry.offset, entry.size, entry.name);
    }
    println!("{} entries ({:?})", archive.asset_count(), archive.version());
    Ok(())
}

fn extract(path: &Path, name: &str, output: Option<PathBuf>) -> Result<(), anyhow::Error> {
    let archive = Archive::open(path).with_context(|| format!("Opening {}", path.display()))?;
    let data = archive
        .read_file(name)
        .with_context(|| format!("Extracting {} from {}", name, path.display()))?;

    let output = output.unwrap_or_else(|| PathBuf::from(name));
    fs::write(&output, &data).with_context(|| format!("Writing {}", output.display()))?;
    log::info!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

fn load(config: DataConfig) -> Result<(), anyhow::Error> {
    let mut data = DataStore::new(config);
    data.load();
    data.wait_idle();

    let registry = data.registry();
    println!(
        "{} files in {} containers, splash {}",
        registry.entries().count(),
        registry.archives().len(),
        data.splash().unwrap_or("-")
    );
    println!(
        "{} definition files, {} placement files",
        registry.ide_locations().len(),
        registry.ipl_locations().len()
    );

    let atlas = registry.atlas();
    for page in atlas.pages() {
        println!(
            "atlas page {}: {} textures, {}/{} texels",
            page.id(),
            page.texture_count(),
            page.used_area(),
            page.capacity()
        );
    }
    Ok(())
}

fn open(config: DataConfig, name: &str) -> Result<(), anyhow::Error> {
    let mut data = DataStore::new(config);
    data.load();

    let entry = data
        .registry()
        .entry(name)
        .with_context(|| format!("{} is not known", name))?;
    let origin = if entry.archived { "inside" } else { "at" };
    println!("{} is {} {}", entry.name, origin, entry.location.display());
    println!("known as {}", entry.aliases.iter().join(", "));

    let bytes = data.open_file(name)?;
    println!("{} bytes", bytes.len());
    Ok(())
}
