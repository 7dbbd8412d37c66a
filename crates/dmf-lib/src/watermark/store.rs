use super::naming::ComponentKey;
use super::{Watermark, TAG_NAME, TAG_VERSION};
use crate::utils::hash::identity_hash;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-backed watermark cache for one root dependency definition.
///
/// Each component version owns one XML file in the working folder. Writes
/// replace whole files (temp file + rename), so a reader sees either the
/// previous document, the new one, or none.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    folder: PathBuf,
}

impl WatermarkStore {
    /// Open (creating if needed) the working folder for `root_definition`
    /// under `cache_root`
    pub fn open(cache_root: &Path, root_definition: &Path) -> Result<Self> {
        let folder = cache_root.join(Self::partition_name(root_definition));
        fs::create_dir_all(&folder)
            .with_context(|| format!("Create watermark folder {:?}", folder))?;
        log::debug!(
            "[watermark] Using cache folder {:?} for {:?}",
            folder,
            root_definition
        );
        Ok(Self { folder })
    }

    /// Folder name for a root definition. The same definition always maps
    /// to the same folder, whichever way its path was spelled. Paths that do
    /// not exist yet are made absolute against the current directory.
    pub fn partition_name(root_definition: &Path) -> String {
        let normalized = dunce::canonicalize(root_definition)
            .or_else(|_| std::path::absolute(root_definition))
            .unwrap_or_else(|_| root_definition.to_path_buf());
        identity_hash(&normalized.to_string_lossy())
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path_for(&self, name: &str, version: &str) -> PathBuf {
        self.folder.join(ComponentKey::new(name, version).file_name())
    }

    /// Stamp the logical identity into the tags and persist. An empty
    /// watermark removes the file instead.
    pub fn save(&self, watermark: &mut Watermark, name: &str, version: &str) -> Result<()> {
        watermark.tags.insert(TAG_NAME, name);
        watermark.tags.insert(TAG_VERSION, version);

        let path = self.path_for(name, version);
        if watermark.is_empty() {
            log::debug!(
                "[watermark] {} {} has nothing to track, dropping {:?}",
                name,
                version,
                path
            );
            return remove_if_exists(&path);
        }

        let xml = watermark.to_xml()?;
        let tmp_path = path.with_extension("xml.tmp");
        fs::write(&tmp_path, xml).with_context(|| format!("Write watermark {:?}", tmp_path))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Move watermark into place {:?} -> {:?}", tmp_path, path))?;
        log::debug!("[watermark] Saved {} {} to {:?}", name, version, path);
        Ok(())
    }

    /// Read the watermark for (name, version). `Ok(None)` when nothing is
    /// stored; a file that cannot be read or parsed is an error.
    pub fn read(&self, name: &str, version: &str) -> Result<Option<Watermark>> {
        let path = self.path_for(name, version);
        let xml = match fs::read_to_string(&path) {
            Ok(xml) => xml,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Read watermark {:?}", path)),
        };
        Watermark::from_xml(&xml)
            .map(Some)
            .with_context(|| format!("Parse watermark {:?}", path))
    }

    /// Load the watermark for (name, version). Missing or unreadable files
    /// are cache misses.
    pub fn load(&self, name: &str, version: &str) -> Option<Watermark> {
        self.read(name, version).unwrap_or_else(|e| {
            log::warn!("[watermark] Ignoring unusable watermark: {:#}", e);
            None
        })
    }

    /// Remove the file keyed by the watermark's own name/version tags
    pub fn delete(&self, watermark: &Watermark) -> Result<()> {
        match (watermark.name(), watermark.version()) {
            (Some(name), Some(version)) => self.delete_entry(name, version),
            _ => anyhow::bail!("Watermark carries no name/version tags, cannot locate its file"),
        }
    }

    pub fn delete_entry(&self, name: &str, version: &str) -> Result<()> {
        remove_if_exists(&self.path_for(name, version))
    }

    /// Lazily enumerate the (on-disk) keys of every stored watermark.
    /// Files not shaped like `<name>@<version>.xml` are skipped.
    pub fn stored_dependency_watermarks(&self) -> impl Iterator<Item = ComponentKey> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => Some(entries),
            Err(e) => {
                log::debug!("[watermark] Cannot list {:?}: {}", self.folder, e);
                None
            }
        };
        entries
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let file_name = entry.file_name();
                ComponentKey::from_file_name(file_name.to_str()?)
            })
    }

    /// Membership of an on-disk key in a list of logical identities.
    /// Path-like identities are compared through their hashed form.
    pub fn is_component_in_list(list: &[ComponentKey], candidate: &ComponentKey) -> bool {
        list.iter().any(|entry| entry.cache_key() == *candidate)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Remove watermark {:?}", path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(tmp: &TempDir) -> WatermarkStore {
        WatermarkStore::open(&tmp.path().join("cache"), &tmp.path().join("component.targets"))
            .unwrap()
    }

    fn populated(download_type: &str) -> Watermark {
        let mut wm = Watermark::new(download_type);
        wm.update_watermark("bin/a.dll", "10:20");
        wm.add_artifact("/out/bin/a.dll");
        wm
    }

    #[test]
    fn save_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let mut wm = populated("FileShareCopier");
        wm.tags.insert("name", "stale-name");
        wm.tags.insert("Origin", "nightly");

        store.save(&mut wm, "PackageA", "1.0").unwrap();
        assert!(store.folder().join("PackageA@1.0.xml").exists());

        let loaded = store.load("PackageA", "1.0").unwrap();
        assert_eq!(loaded.download_type, "FileShareCopier");
        assert_eq!(loaded.tags.get("name"), Some("PackageA"));
        assert_eq!(loaded.tags.get("version"), Some("1.0"));
        assert_eq!(loaded.tags.get("origin"), Some("nightly"));
        assert_eq!(loaded, wm);
    }

    #[test]
    fn empty_watermark_removes_file() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let mut wm = populated("FileShareCopier");
        store.save(&mut wm, "PackageA", "1.0").unwrap();
        assert!(store.path_for("PackageA", "1.0").exists());

        let mut empty = Watermark::new("FileShareCopier");
        store.save(&mut empty, "PackageA", "1.0").unwrap();
        assert!(!store.path_for("PackageA", "1.0").exists());
        assert!(store.load("PackageA", "1.0").is_none());

        // never written at all
        store.save(&mut empty, "PackageB", "1.0").unwrap();
        assert!(!store.path_for("PackageB", "1.0").exists());
    }

    #[test]
    fn corrupt_file_is_a_cache_miss() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        fs::write(store.path_for("PackageA", "1.0"), "<<not xml").unwrap();
        assert!(store.load("PackageA", "1.0").is_none());
        assert!(store.load("Missing", "1.0").is_none());

        assert!(store.read("PackageA", "1.0").is_err());
        assert!(store.read("Missing", "1.0").unwrap().is_none());
        assert!(store.path_for("PackageA", "1.0").exists());
    }

    #[test]
    fn padded_values_survive_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let mut wm = Watermark::new("FileShareCopier");
        wm.update_watermark("notes ", "  padded value  ");
        wm.add_artifact("/out/trailing ");
        store.save(&mut wm, "PackageA", "1.0").unwrap();

        let loaded = store.read("PackageA", "1.0").unwrap().unwrap();
        assert_eq!(loaded.watermarks.get("notes "), Some("  padded value  "));
        assert!(loaded.artifacts_to_clean.contains("/out/trailing "));
        assert!(!loaded.artifacts_to_clean.contains("/out/trailing"));
    }

    #[test]
    fn delete_uses_recorded_identity() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let mut wm = populated("FileShareCopier");
        store.save(&mut wm, "$/Proj/Lib", "C12").unwrap();
        assert!(store.path_for("$/Proj/Lib", "C12").exists());

        store.delete(&wm).unwrap();
        assert!(!store.path_for("$/Proj/Lib", "C12").exists());
        assert!(store.delete(&Watermark::new("x")).is_err());
    }

    #[test]
    fn enumerates_stored_keys() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        store.save(&mut populated("t"), "PackageA", "1.0").unwrap();
        store.save(&mut populated("t"), "$/Proj/Lib", "C12").unwrap();
        fs::write(store.folder().join("garbage.xml"), "x").unwrap();
        fs::write(store.folder().join("a@b@c.xml"), "x").unwrap();

        let mut stored: Vec<ComponentKey> = store.stored_dependency_watermarks().collect();
        stored.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(stored.len(), 2);
        assert!(stored.contains(&ComponentKey::new("PackageA", "1.0")));
        assert!(stored.contains(&ComponentKey::new("$/Proj/Lib", "C12").cache_key()));
    }

    #[test]
    fn separator_in_identity_stays_enumerable() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        store.save(&mut populated("t"), "PackageA", "1.0@beta").unwrap();
        assert!(store.load("PackageA", "1.0@beta").is_some());

        let stored: Vec<ComponentKey> = store.stored_dependency_watermarks().collect();
        assert_eq!(stored.len(), 1);
        let keep = vec![ComponentKey::new("PackageA", "1.0@beta")];
        assert!(WatermarkStore::is_component_in_list(&keep, &stored[0]));
        let other = vec![ComponentKey::new("PackageA", "1.0")];
        assert!(!WatermarkStore::is_component_in_list(&other, &stored[0]));
    }

    #[test]
    fn membership_handles_hashed_and_literal_keys() {
        let keep = vec![
            ComponentKey::new("PackageA", "1.0"),
            ComponentKey::new("$/Proj/Lib", "C12"),
        ];
        assert!(WatermarkStore::is_component_in_list(
            &keep,
            &ComponentKey::new("PackageA", "1.0")
        ));
        let hashed = ComponentKey::new(identity_hash("$/Proj/Lib"), identity_hash("C12"));
        assert!(WatermarkStore::is_component_in_list(&keep, &hashed));

        let other_version = ComponentKey::new(identity_hash("$/Proj/Lib"), identity_hash("C13"));
        assert!(!WatermarkStore::is_component_in_list(&keep, &other_version));
        assert!(!WatermarkStore::is_component_in_list(
            &keep,
            &ComponentKey::new("PackageA", "2.0")
        ));
    }

    #[test]
    fn partitions_are_stable_per_root_definition() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("a").join("component.targets");
        let second = tmp.path().join("b").join("component.targets");
        assert_eq!(
            WatermarkStore::partition_name(&first),
            WatermarkStore::partition_name(&first)
        );
        assert_ne!(
            WatermarkStore::partition_name(&first),
            WatermarkStore::partition_name(&second)
        );
    }

    #[test]
    fn relative_and_absolute_spellings_share_a_partition() {
        let relative = Path::new("not-created-yet").join("component.targets");
        let absolute = std::env::current_dir().unwrap().join(&relative);
        assert!(!absolute.exists());
        assert_eq!(
            WatermarkStore::partition_name(&relative),
            WatermarkStore::partition_name(&absolute)
        );
    }
}
