use super::config::{CACHE_PRODUCT_DIR, CACHE_VENDOR_DIR, DEFAULT_RELATIVE_OUTPUT_PATH};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Progress reporter trait for synchronization runs
/// Implementations forward updates to a console, UI or log sink
pub trait ProgressReporter: Send + Sync {
    /// Start a new phase with optional total steps
    fn start_step(&self, name: &str, total_steps: Option<u32>);

    /// Set a short status message
    fn set_message(&self, message: &str);

    /// Set a numeric step count for the current phase (e.g. "3/12")
    fn set_step_count(&self, current: u32, total: Option<u32>);

    /// Surface a non-fatal problem to the user
    fn warn(&self, message: &str) {
        self.set_message(message);
    }

    /// Mark the run as complete
    fn done(&self, success: bool, message: Option<&str>);
}

/// A progress reporter that does nothing (silent).
/// Useful for headless callers or tests.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _name: &str, _total_steps: Option<u32>) {}
    fn set_message(&self, _message: &str) {}
    fn set_step_count(&self, _current: u32, _total: Option<u32>) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// Site-specific rewrite of a share prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMapping {
    pub site: String,
    pub base_path: String,
    pub site_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiSiteSettings {
    pub enabled: bool,
    /// Explicit site; detected from the environment when absent
    pub site: Option<String>,
    pub mappings: Vec<SiteMapping>,
}

/// Synchronization settings, passed explicitly to every run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSpec {
    /// Root of the local watermark cache
    pub cache_root: PathBuf,

    /// Output folder used when a component has no `RelativeOutputPath`
    pub default_relative_output_path: String,

    /// Ask providers to fetch again even when their watermark is current
    pub force_overwrite: bool,

    /// Include transitive dependencies, not just direct ones
    pub recursive: bool,

    pub multi_site: MultiSiteSettings,
}

impl SyncSpec {
    pub fn new(cache_root: PathBuf) -> Self {
        Self {
            cache_root,
            default_relative_output_path: DEFAULT_RELATIVE_OUTPUT_PATH.to_string(),
            force_overwrite: false,
            recursive: true,
            multi_site: MultiSiteSettings::default(),
        }
    }

    /// Load settings from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Read sync settings {:?}", path))?;
        serde_json::from_str(&contents).with_context(|| format!("Parse sync settings {:?}", path))
    }

    /// `<data_local_dir>/AIT/DMF`, or the temp dir when no home is known
    pub fn default_cache_root() -> PathBuf {
        let base = match directories::BaseDirs::new() {
            Some(dirs) => dirs.data_local_dir().to_path_buf(),
            None => {
                log::warn!("No local data directory available, caching under the temp dir");
                std::env::temp_dir()
            }
        };
        base.join(CACHE_VENDOR_DIR).join(CACHE_PRODUCT_DIR)
    }
}

impl Default for SyncSpec {
    fn default() -> Self {
        Self::new(Self::default_cache_root())
    }
}

/// What a synchronization run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub reverted: Vec<String>,
    pub revert_failures: Vec<String>,
    pub warnings: Vec<String>,
}

/// What a bulk clean did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub reverted: Vec<String>,
    pub failures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn spec_defaults() {
        let spec = SyncSpec::new(PathBuf::from("/tmp/cache"));
        assert_eq!(spec.default_relative_output_path, "Dependencies");
        assert!(spec.recursive);
        assert!(!spec.force_overwrite);
        assert!(!spec.multi_site.enabled);
        assert!(SyncSpec::default_cache_root().ends_with("AIT/DMF"));
    }

    #[test]
    fn spec_from_partial_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dmf.json");
        std::fs::write(
            &path,
            r#"{
                "cache_root": "/var/cache/dmf",
                "force_overwrite": true,
                "multi_site": {
                    "enabled": true,
                    "site": "Berlin",
                    "mappings": [
                        {
                            "site": "Berlin",
                            "base_path": "//main/drops",
                            "site_path": "//ber/drops"
                        }
                    ]
                }
            }"#,
        )
        .unwrap();

        let spec = SyncSpec::from_json_file(&path).unwrap();
        assert_eq!(spec.cache_root, PathBuf::from("/var/cache/dmf"));
        assert!(spec.force_overwrite);
        assert!(spec.recursive);
        assert_eq!(spec.default_relative_output_path, "Dependencies");
        assert_eq!(spec.multi_site.site.as_deref(), Some("Berlin"));
        assert_eq!(spec.multi_site.mappings.len(), 1);
    }

    #[test]
    fn spec_from_malformed_json_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dmf.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(SyncSpec::from_json_file(&path).is_err());
        assert!(SyncSpec::from_json_file(&tmp.path().join("missing.json")).is_err());
    }
}
