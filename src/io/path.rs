use std::fs;
use std::path::{Path, PathBuf};

/// Turns a path as written in the game's data files (`MODELS\Generic\wheels.DFF`) into the
/// logical name every lookup uses (`models/generic/wheels.dff`).
pub fn normalize(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '\\' => '/',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Finds the on-disk spelling of a normalized path below `base`. The shipped data
/// rarely agrees with itself on case, which only matters on case-sensitive filesystems.
///
/// Returns `None` when a segment (or `base` itself) does not exist.
#[cfg(unix)]
pub fn resolve_real_case(base: &Path, normalized_path: &str) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    let mut segments = normalized_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .peekable();

    while let Some(segment) = segments.next() {
        let real_name = fs::read_dir(&current)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .find(|name| name.to_string_lossy().to_ascii_lowercase() == segment)?;

        current.push(real_name);

        // Interior segments have to be directories to descend into.
        if segments.peek().is_some() && !current.is_dir() {
            return None;
        }
    }

    Some(current)
}

#[cfg(not(unix))]
pub fn resolve_real_case(base: &Path, normalized_path: &str) -> Option<PathBuf> {
    let path = base.join(normalized_path);
    if fs::exists(&path).unwrap_or(false) {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_flips_slashes() {
        assert_eq!(normalize(r"MODELS\Generic\wheels.DFF"), "models/generic/wheels.dff");
        assert_eq!(normalize("already/fine.txd"), "already/fine.txd");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn resolves_mixed_case_tree() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("DATA/Maps"))?;
        fs::write(dir.path().join("DATA/Maps/Industne.IPL"), b"inst")?;

        let resolved = resolve_real_case(dir.path(), "data/maps/industne.ipl");
        assert_eq!(resolved, Some(dir.path().join("DATA/Maps/Industne.IPL")));
        Ok(())
    }

    #[test]
    fn missing_segments_resolve_to_nothing() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("data"))?;
        fs::write(dir.path().join("data/file.dat"), b"")?;

        assert_eq!(resolve_real_case(dir.path(), "data/other.dat"), None);
        assert_eq!(resolve_real_case(dir.path(), "nope/file.dat"), None);
        // A file can't be descended into.
        assert_eq!(resolve_real_case(dir.path(), "data/file.dat/deeper"), None);
        assert_eq!(resolve_real_case(&dir.path().join("absent"), "data"), None);
        Ok(())
    }
}
