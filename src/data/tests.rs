use std::path::Path;
use std::sync::{Arc, Barrier};

use crate::assets::Payload;
use crate::assets::decoder::DecodeError;
use crate::assets::handle::AssetState;
use crate::test_utils::{png, write_file, write_ver2};

use super::*;

fn config(data_dir: &Path, worker_count: usize) -> DataConfig {
    DataConfig {
        data_dir: data_dir.to_path_buf(),
        worker_count,
        max_texture_size: 64,
    }
}

/// Holds every decode until as many decodes as the barrier has parties are running.
struct RendezvousDecoder {
    barrier: Barrier,
}

impl AssetDecoder for RendezvousDecoder {
    fn decode(&self, kind: AssetKind, name: &str, bytes: Vec<u8>) -> Result<Payload, DecodeError> {
        self.barrier.wait();
        BlobDecoder.decode(kind, name, bytes)
    }
}

struct PanickingDecoder;

impl AssetDecoder for PanickingDecoder {
    fn decode(&self, kind: AssetKind, name: &str, bytes: Vec<u8>) -> Result<Payload, DecodeError> {
        if name.starts_with("broken") {
            panic!("malformed clump");
        }
        BlobDecoder.decode(kind, name, bytes)
    }
}

fn write_game(root: &Path) -> Result<(), anyhow::Error> {
    write_file(
        &root.join("data/default.dat"),
        b"# defaults\r\n\
        IDE DATA\\DEFAULT.IDE\r\n\
        TEXDICTION MODELS\\MISC.TXD\r\n\
        MODELFILE MODELS\\GENERIC\\ZONECYLB.DFF\r\n\
        SPLASH loadsc0\r\n",
    )?;
    write_file(
        &root.join("data/gta3.dat"),
        b"IMG MODELS\\GTA3.IMG\r\n\
        IMG MODELS\\BROKEN.IMG\r\n\
        COLFILE 0 MODELS\\COLL\\GENERIC.COL\r\n\
        IPL DATA\\MAPS\\INDUSTNE.IPL\r\n",
    )?;
    write_file(&root.join("data/default.ide"), b"objs\nend\n")?;
    write_file(&root.join("data/maps/Industne.IPL"), b"inst\nend\n")?;
    write_file(&root.join("data/object.dat"), b"; name, mass, ...\nlamppost1, 300, 800, 0.99, 0.1, 50, 0, 1, 0, 0, 0\n")?;
    write_file(&root.join("models/MISC.TXD"), &png(4, 4, 255))?;
    write_file(&root.join("models/particle.txd"), &png(2, 2, 128))?;
    write_file(&root.join("models/generic/wheels.DFF"), b"wheels")?;
    write_file(&root.join("models/generic/zonecylb.dff"), b"zone cylinder")?;
    write_file(&root.join("models/coll/generic.col"), b"COLL")?;
    write_file(&root.join("models/broken.img"), b"VER2\x05\x00\x00\x00")?;
    write_file(&root.join("anim/ped.ifp"), b"ANPK")?;
    write_ver2(
        &root.join("models/gta3.img"),
        &[
            ("infernus.dff", b"infernus"),
            ("Infernus.txd", &png(8, 8, 255)),
            ("placeholder.dff", b""),
        ],
    )?;
    Ok(())
}

#[test]
fn the_startup_sequence_loads_the_essentials() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    write_game(dir.path())?;

    let mut data = DataStore::new(config(dir.path(), 2));
    data.load();

    assert_eq!(data.splash(), Some("loadsc0"));
    assert!(data.registry().ide_locations().contains_key("data/default.ide"));
    assert_eq!(
        data.registry().ipl_locations().get("data/maps/industne.ipl"),
        Some(&dir.path().join("data/maps/Industne.IPL"))
    );

    // The broken container is skipped, the good one is indexed.
    assert_eq!(data.registry().archives().len(), 1);
    assert!(data.registry().entry("infernus.txd").is_some_and(|entry| entry.archived));
    assert!(data.registry().entry("placeholder.dff").is_none());

    let wheels = data.model("wheels.dff").and_then(|handle| handle.get()).unwrap();
    assert_eq!(wheels.data, b"wheels");
    assert!(data.model("models/generic/zonecylb.dff").is_some_and(|handle| handle.is_loaded()));
    assert!(data.texture("misc.txd").is_some_and(|handle| handle.is_loaded()));
    let particle = data.texture("particle.txd").and_then(|handle| handle.get()).unwrap();
    assert!(particle.transparent);
    assert!(data.collision("models/coll/generic.col").is_some_and(|handle| handle.is_loaded()));
    assert_eq!(data.registry().collision_zone("models/coll/generic.col"), Some(0));
    assert!(data.animation("anim/ped.ifp").is_some_and(|handle| handle.is_loaded()));

    assert_eq!(data.dynamic_object("LAMPPOST1").map(|object| object.mass), Some(300.0));
    assert!(data.is_loaded("particle.txd"));
    assert!(!data.is_loaded("infernus.dff"));
    assert_eq!(data.loads_in_flight(), 0);
    Ok(())
}

#[test]
fn duplicate_submissions_populate_once() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    write_ver2(&dir.path().join("models/gta3.img"), &[("infernus.dff", b"infernus")])?;

    let mut data = DataStore::new(config(dir.path(), 2));
    assert_eq!(data.register_archive(r"MODELS\GTA3.IMG")?, 2);

    assert!(matches!(data.load_async("infernus.dff", AssetKind::Model)?, Submission::Queued(_)));
    assert_eq!(data.load_async("INFERNUS.DFF", AssetKind::Model)?, Submission::Duplicate);

    let handle = data.model("infernus.dff").unwrap();
    data.wait_idle();
    assert!(handle.is_loaded());
    assert_eq!(handle.revision(), 1);

    assert_eq!(data.load_async("infernus.dff", AssetKind::Model)?, Submission::Duplicate);
    assert_eq!(data.process_completions(), 0);
    assert!(matches!(
        data.load_sync("infernus.dff", AssetKind::Model),
        Err(LoadError::DuplicateSubmission(_))
    ));
    assert_eq!(handle.revision(), 1);
    Ok(())
}

#[test]
fn models_and_textures_load_side_by_side() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let texture = png(8, 8, 255);
    write_ver2(
        &dir.path().join("models/gta3.img"),
        &[("infernus.dff", b"infernus"), ("infernus.txd", &texture)],
    )?;

    // Neither decode can finish before the other one started, so this only passes when both
    // jobs are worked on at the same time.
    let decoder = Arc::new(RendezvousDecoder {
        barrier: Barrier::new(2),
    });
    let mut data = DataStore::with_decoder(config(dir.path(), 2), decoder);
    data.register_archive("models/gta3.img")?;

    data.load_async("infernus.dff", AssetKind::Model)?;
    data.load_async("infernus.txd", AssetKind::Texture)?;
    let model = data.model("infernus.dff").unwrap();
    let slot = data.texture("infernus.txd").unwrap();
    assert!(model.is_empty());
    assert!(slot.is_empty());

    data.wait_idle();

    assert_eq!(&model.get().unwrap().data[..8], b"infernus");
    let slot = slot.get().unwrap();
    assert_eq!(slot.atlas_page_id, 0);
    assert_eq!((slot.rect.width, slot.rect.height), (8, 8));
    assert!(data.atlas_page(0).is_some_and(|page| page.texture_count() == 1));
    Ok(())
}

#[test]
fn entries_of_unopened_containers_leave_the_handle_empty() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let container = dir.path().join("models/gta3.img");

    let mut data = DataStore::new(config(dir.path(), 1));
    data.registry_mut()
        .register_archived("infernus.dff", container.clone());

    let result = data.load_sync("infernus.dff", AssetKind::Model);
    assert!(matches!(result, Err(LoadError::ArchiveMissing { archive, .. }) if archive == container));
    assert!(data.model("infernus.dff").is_some_and(|handle| handle.is_empty()));
    assert!(data.is_loaded("infernus.dff"));
    Ok(())
}

#[test]
fn failed_loads_mark_their_handles() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    write_file(&dir.path().join("models/broken.dff"), b"junk")?;
    write_file(&dir.path().join("models/junk.txd"), b"not a png")?;

    let mut data = DataStore::with_decoder(config(dir.path(), 1), Arc::new(PanickingDecoder));
    data.registry_mut()
        .register_loose("broken.dff", "models/broken.dff");
    data.registry_mut()
        .register_loose("junk.txd", "models/junk.txd");

    data.load_async("broken.dff", AssetKind::Model)?;

    let err = data
        .load_sync("junk.txd", AssetKind::Texture)
        .expect_err("junk is not an image");
    assert!(matches!(err, LoadError::Decode { .. }));
    assert!(data.texture("junk.txd").is_some_and(|handle| handle.is_failed()));

    data.wait_idle();
    match data.model("broken.dff").unwrap().state().as_ref() {
        AssetState::Failed(reason) => assert!(reason.contains("malformed clump"), "{}", reason),
        state => panic!("unexpected state {:?}", state),
    }

    assert!(matches!(
        data.load_async("ghost.dff", AssetKind::Model),
        Err(LoadError::NotFound(_))
    ));
    Ok(())
}

#[test]
fn a_panicking_decoder_fails_a_sync_load() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    write_file(&dir.path().join("models/broken.dff"), b"junk")?;
    write_file(&dir.path().join("models/fine.dff"), b"fine")?;

    let mut data = DataStore::with_decoder(config(dir.path(), 1), Arc::new(PanickingDecoder));
    data.registry_mut()
        .register_loose("broken.dff", "models/broken.dff");
    data.registry_mut()
        .register_loose("fine.dff", "models/fine.dff");

    match data.load_sync("broken.dff", AssetKind::Model) {
        Err(LoadError::Decode { reason, .. }) => assert!(reason.contains("malformed clump"), "{}", reason),
        result => panic!("unexpected result {:?}", result),
    }
    assert!(data.model("broken.dff").is_some_and(|handle| handle.is_failed()));

    // The store keeps working after the panic.
    data.load_sync("fine.dff", AssetKind::Model)?;
    assert_eq!(data.model("fine.dff").and_then(|handle| handle.get()).unwrap().data, b"fine");
    Ok(())
}

#[test]
fn loose_and_archived_files_are_read_directly() -> Result<(), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    write_ver2(&dir.path().join("models/gta3.img"), &[("Fist.dff", b"fist")])?;
    write_file(&dir.path().join("data/Carcols.DAT"), b"col\nend\n")?;

    let mut data = DataStore::new(config(dir.path(), 1));
    data.register_archive("models/gta3.img")?;

    assert_eq!(&data.load_from_archive("FIST.DFF")?[..4], b"fist");
    assert!(data.is_loaded("fist.dff"));

    assert_eq!(data.load_loose("data/carcols.dat")?, b"col\nend\n");
    assert!(matches!(
        data.load_from_archive("data/carcols.dat"),
        Err(LoadError::NotFound(_))
    ));
    assert_eq!(data.open_file(r"DATA\CARCOLS.DAT")?, b"col\nend\n");
    // A second load only warns.
    assert_eq!(data.load_file("data/carcols.dat")?, b"col\nend\n");
    assert!(matches!(data.open_file("missing.dat"), Err(LoadError::NotFound(_))));

    assert!(data.atlas_page(1).is_none());
    assert!(data.atlas_page(0).is_some());
    assert!(data.atlas_page(1).is_none());
    Ok(())
}
