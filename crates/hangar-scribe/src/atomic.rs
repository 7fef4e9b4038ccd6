use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::ScribeError;

/// Write `contents` to `path` via a temp file, `fsync`, `rename`, fsync the
/// parent directory, so a reader never observes a partially-written page.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ScribeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ScribeError::Io { path: path.to_path_buf(), source })?;
    }

    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp).map_err(|source| ScribeError::Io { path: tmp.clone(), source })?;
        file.write_all(contents.as_bytes()).map_err(|source| ScribeError::Io { path: tmp.clone(), source })?;
        file.sync_all().ok();
    }

    fs::rename(&tmp, path).map_err(|source| ScribeError::Io { path: path.to_path_buf(), source })?;
    fsync_parent_dir(path);
    Ok(())
}

fn fsync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

/// Recursively copy every file under `assets_dir` into `output_dir/assets`,
/// skipping subdirectories that don't exist (a dev checkout may have no
/// assets yet). Not atomic: these are static resources, not consensus state,
/// so a half-copied directory only risks a missing stylesheet, not a
/// corrupt page.
pub fn copy_assets(assets_dir: &Path, output_dir: &Path) -> Result<(), ScribeError> {
    if !assets_dir.exists() {
        return Ok(());
    }
    let target = output_dir.join("assets");
    fs::create_dir_all(&target).map_err(|source| ScribeError::Io { path: target.clone(), source })?;
    copy_dir_recursive(assets_dir, &target)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), ScribeError> {
    for entry in fs::read_dir(src).map_err(|source| ScribeError::Io { path: src.to_path_buf(), source })? {
        let entry = entry.map_err(|source| ScribeError::Io { path: src.to_path_buf(), source })?;
        let path = entry.path();
        let dest = dst.join(entry.file_name());
        if path.is_dir() {
            fs::create_dir_all(&dest).map_err(|source| ScribeError::Io { path: dest.clone(), source })?;
            copy_dir_recursive(&path, &dest)?;
        } else {
            fs::copy(&path, &dest).map_err(|source| ScribeError::Io { path: dest.clone(), source })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_leaves_no_tmp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("index.html");
        write_atomic(&path, "<html></html>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html></html>");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn write_atomic_overwrites_existing_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.html");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn copy_assets_is_a_noop_when_source_is_missing() {
        let dir = tempdir().unwrap();
        copy_assets(&dir.path().join("nonexistent"), dir.path()).unwrap();
        assert!(!dir.path().join("assets").exists());
    }

    #[test]
    fn copy_assets_mirrors_the_source_tree() {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("css")).unwrap();
        fs::write(src.path().join("css").join("style.css"), "body {}").unwrap();

        let out = tempdir().unwrap();
        copy_assets(src.path(), out.path()).unwrap();

        assert_eq!(
            fs::read_to_string(out.path().join("assets").join("css").join("style.css")).unwrap(),
            "body {}"
        );
    }
}
