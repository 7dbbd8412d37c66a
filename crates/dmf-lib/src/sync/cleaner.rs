use super::core::registry::ProviderRegistry;
use super::types::{CleanReport, ProgressReporter};
use crate::watermark::naming::ComponentKey;
use crate::watermark::store::WatermarkStore;
use anyhow::{Context, Result};

/// Reverts downloaded components and retires their watermarks
pub struct Cleaner<'a> {
    registry: &'a ProviderRegistry,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> Cleaner<'a> {
    pub fn new(registry: &'a ProviderRegistry, reporter: &'a dyn ProgressReporter) -> Self {
        Self { registry, reporter }
    }

    /// Undo the download stored under (name, version).
    ///
    /// On success the watermark is deleted. On failure the original watermark
    /// is written back so the next run retries the revert. A watermark that
    /// cannot be read is left in place and reported as a failure.
    pub fn revert_component(
        &self,
        store: &WatermarkStore,
        name: &str,
        version: &str,
    ) -> Result<()> {
        let original = store
            .read(name, version)
            .with_context(|| format!("Revert {} {}", name, version))?;
        let Some(original) = original else {
            // the key came from the store itself, so the file was removed
            // behind our back
            log::error!(
                "[clean] Assertion failed: no watermark for {} {}; dropping the entry",
                name,
                version
            );
            return store.delete_entry(name, version);
        };

        let display_name = original.name().unwrap_or(name).to_string();
        let display_version = original.version().unwrap_or(version).to_string();
        self.reporter
            .set_message(&format!("Removing {} {}", display_name, display_version));

        let reverted = self
            .registry
            .for_download_type(&original.download_type)
            .map_err(anyhow::Error::from)
            .and_then(|provider| provider.revert(&original, self.reporter));

        match reverted {
            Ok(()) => {
                if original.name().is_some() && original.version().is_some() {
                    store.delete(&original)?;
                } else {
                    store.delete_entry(name, version)?;
                }
                log::info!("[clean] Reverted {} {}", display_name, display_version);
                Ok(())
            }
            Err(err) => {
                let mut restored = original.clone();
                if let Err(save_err) = store.save(&mut restored, &display_name, &display_version) {
                    log::error!(
                        "[clean] Could not restore watermark of {} {}: {:#}",
                        display_name,
                        display_version,
                        save_err
                    );
                }
                Err(err).with_context(|| format!("Revert {} {}", display_name, display_version))
            }
        }
    }

    /// Revert every component stored in `store`
    pub fn clean_all(&self, store: &WatermarkStore) -> CleanReport {
        let stored: Vec<ComponentKey> = store.stored_dependency_watermarks().collect();
        self.reporter
            .start_step("Cleaning dependencies", Some(stored.len() as u32));

        let mut report = CleanReport::default();
        for (index, key) in stored.iter().enumerate() {
            self.reporter
                .set_step_count(index as u32 + 1, Some(stored.len() as u32));
            match self.revert_component(store, &key.name, &key.version) {
                Ok(()) => report.reverted.push(key.to_string()),
                Err(err) => {
                    log::warn!("[clean] {:#}", err);
                    self.reporter.warn(&format!("{:#}", err));
                    report.failures.push(key.to_string());
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::core::traits::{
        DependencyProvider, DownloadOutcome, DownloadRequest, ProviderType,
    };
    use crate::sync::types::SilentProgressReporter;
    use crate::watermark::Watermark;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct FlakyReverter {
        fail: bool,
        reverted: Mutex<Vec<String>>,
    }

    impl DependencyProvider for FlakyReverter {
        fn download_type(&self) -> &str {
            "Flaky"
        }
        fn download(
            &self,
            _request: &DownloadRequest<'_>,
            _watermark: &mut Watermark,
        ) -> DownloadOutcome {
            DownloadOutcome::Skipped
        }
        fn revert(&self, watermark: &Watermark, _reporter: &dyn ProgressReporter) -> Result<()> {
            if self.fail {
                anyhow::bail!("file in use");
            }
            self.reverted
                .lock()
                .unwrap()
                .push(watermark.name().unwrap_or_default().to_string());
            Ok(())
        }
    }

    fn setup(fail: bool) -> (TempDir, WatermarkStore, ProviderRegistry, Arc<FlakyReverter>) {
        let tmp = TempDir::new().unwrap();
        let store =
            WatermarkStore::open(&tmp.path().join("cache"), &tmp.path().join("component.targets"))
                .unwrap();
        let provider = Arc::new(FlakyReverter {
            fail,
            reverted: Mutex::new(Vec::new()),
        });
        let mut registry = ProviderRegistry::new();
        registry.register(ProviderType::FileShare, provider.clone());
        (tmp, store, registry, provider)
    }

    fn stored(store: &WatermarkStore, name: &str, version: &str) -> Watermark {
        let mut wm = Watermark::new("Flaky");
        wm.add_artifact(format!("/out/{}.dll", name));
        store.save(&mut wm, name, version).unwrap();
        wm
    }

    #[test]
    fn successful_revert_deletes_watermark() {
        let (_tmp, store, registry, provider) = setup(false);
        stored(&store, "$/Proj/Lib", "C12");
        let key = ComponentKey::new("$/Proj/Lib", "C12").cache_key();

        let cleaner = Cleaner::new(&registry, &SilentProgressReporter);
        cleaner.revert_component(&store, &key.name, &key.version).unwrap();

        assert!(store.load("$/Proj/Lib", "C12").is_none());
        // display identity recovered from tags, not the hashed key
        assert_eq!(*provider.reverted.lock().unwrap(), vec!["$/Proj/Lib"]);
    }

    #[test]
    fn failed_revert_keeps_original_watermark() {
        let (_tmp, store, registry, _provider) = setup(true);
        let original = stored(&store, "PackageA", "1.0");

        let cleaner = Cleaner::new(&registry, &SilentProgressReporter);
        let err = cleaner.revert_component(&store, "PackageA", "1.0").unwrap_err();
        assert!(format!("{:#}", err).contains("file in use"));
        assert_eq!(store.load("PackageA", "1.0").unwrap(), original);
    }

    #[test]
    fn unknown_download_type_keeps_watermark() {
        let (_tmp, store, registry, _provider) = setup(false);
        let mut wm = Watermark::new("RetiredProvider");
        wm.add_artifact("/out/x");
        store.save(&mut wm, "PackageA", "1.0").unwrap();

        let cleaner = Cleaner::new(&registry, &SilentProgressReporter);
        assert!(cleaner.revert_component(&store, "PackageA", "1.0").is_err());
        assert!(store.load("PackageA", "1.0").is_some());
    }

    #[test]
    fn unreadable_entry_is_kept_and_reported() {
        let (_tmp, store, registry, provider) = setup(false);
        std::fs::write(store.path_for("PackageA", "1.0"), "garbage").unwrap();

        let cleaner = Cleaner::new(&registry, &SilentProgressReporter);
        let err = cleaner.revert_component(&store, "PackageA", "1.0").unwrap_err();
        assert!(format!("{:#}", err).contains("PackageA 1.0"));
        assert!(store.path_for("PackageA", "1.0").exists());
        assert!(provider.reverted.lock().unwrap().is_empty());

        let report = cleaner.clean_all(&store);
        assert_eq!(report.failures, vec!["PackageA 1.0"]);
        assert!(store.path_for("PackageA", "1.0").exists());
    }

    #[test]
    fn vanished_entry_is_dropped() {
        let (_tmp, store, registry, _provider) = setup(false);
        let cleaner = Cleaner::new(&registry, &SilentProgressReporter);
        cleaner.revert_component(&store, "PackageA", "1.0").unwrap();
        assert!(!store.path_for("PackageA", "1.0").exists());
    }

    #[test]
    fn separator_in_version_reverts_by_stored_key() {
        let (_tmp, store, registry, provider) = setup(false);
        stored(&store, "PackageA", "1.0@beta");

        let report = Cleaner::new(&registry, &SilentProgressReporter).clean_all(&store);
        assert_eq!(report.reverted.len(), 1);
        assert_eq!(*provider.reverted.lock().unwrap(), vec!["PackageA"]);
        assert!(store.load("PackageA", "1.0@beta").is_none());
    }

    #[test]
    fn clean_all_reports_each_component() {
        let (_tmp, store, registry, provider) = setup(false);
        stored(&store, "PackageA", "1.0");
        stored(&store, "PackageB", "2.0");

        let report = Cleaner::new(&registry, &SilentProgressReporter).clean_all(&store);
        assert_eq!(report.reverted.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(provider.reverted.lock().unwrap().len(), 2);
        assert_eq!(store.stored_dependency_watermarks().count(), 0);
    }
}
