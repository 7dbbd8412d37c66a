use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("Create copy dest {:?}", dest))?;
    for entry in fs::read_dir(src).with_context(|| format!("Read dir {:?}", src))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &target_path)?;
        } else {
            fs::copy(entry.path(), &target_path)
                .with_context(|| format!("Copy file {:?} -> {:?}", entry.path(), target_path))?;
        }
    }
    Ok(())
}

/// Copy one file, creating parents and replacing a read-only destination
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Create directory {:?}", parent))?;
    }
    if let Ok(metadata) = fs::metadata(dest) {
        if metadata.permissions().readonly() {
            log::debug!("Removing read-only attribute before overwriting: {:?}", dest);
            let mut perms = metadata.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(dest, perms)
                .with_context(|| format!("Clear read-only flag on {:?}", dest))?;
        }
    }
    fs::copy(src, dest).with_context(|| format!("Copy file {:?} -> {:?}", src, dest))?;
    Ok(())
}

/// Extract a zip archive into `dest_dir`
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    log::debug!("Extracting {:?} to {:?}", archive_path, dest_dir);
    fs::create_dir_all(dest_dir).with_context(|| format!("Create directory {:?}", dest_dir))?;
    let file = fs::File::open(archive_path)
        .with_context(|| format!("Open archive {:?}", archive_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Read archive {:?}", archive_path))?;
    archive
        .extract(dest_dir)
        .with_context(|| format!("Extract archive {:?}", archive_path))?;
    Ok(())
}

/// Returns true when a file was actually removed
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            // read-only files cannot be removed on Windows
            let mut perms = fs::metadata(path)
                .with_context(|| format!("Stat {:?}", path))?
                .permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(path, perms).with_context(|| format!("Unlock {:?}", path))?;
            fs::remove_file(path).with_context(|| format!("Remove file {:?}", path))?;
            Ok(true)
        }
        Err(e) => Err(e).with_context(|| format!("Remove file {:?}", path)),
    }
}

/// Remove directories left empty above `path`, stopping at `stop_at`
pub fn prune_empty_parents(path: &Path, stop_at: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}
