//! Provider for components published as plain directories on a file share.
//!
//! Every copied file is recorded twice in the watermark: its relative path
//! maps to a `<mtime>:<len>` stamp (so unchanged files are not copied again),
//! and its target path is added to the cleanup manifest (so revert knows what
//! to delete).

use crate::graph::Settings;
use crate::sync::config::{
    keys, DEFAULT_LOCAL_RETRIES, DEFAULT_OVERALL_RETRIES, DEFAULT_RETRY_DELAY,
};
use crate::sync::core::fs::{copy_file, prune_empty_parents, remove_file_if_exists};
use crate::sync::core::retry::RetryLogic;
use crate::sync::core::traits::{DependencyProvider, DownloadOutcome, DownloadRequest};
use crate::sync::location::SourceLocation;
use crate::sync::types::ProgressReporter;
use crate::watermark::Watermark;
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use walkdir::WalkDir;

pub const FILE_SHARE_DOWNLOAD_TYPE: &str = "FileShareCopier";

/// Tag recording the target folder, used to bound directory pruning on revert
const TARGET_TAG: &str = "target";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct FileShareProvider {
    overall_retries: u32,
    local_retries: u32,
    retry_delay: Duration,
}

impl FileShareProvider {
    pub fn new(overall_retries: u32, local_retries: u32, retry_delay: Duration) -> Self {
        Self {
            overall_retries,
            local_retries,
            retry_delay,
        }
    }

    fn sync_tree(&self, request: &DownloadRequest<'_>, watermark: &mut Watermark) -> Result<bool> {
        let SourceLocation::Path(source_root) = request.source else {
            anyhow::bail!("File share provider needs a directory source, got {}", request.source);
        };
        if !source_root.is_dir() {
            anyhow::bail!("Source folder {:?} does not exist", source_root);
        }

        let filter = FileFilter::from_settings(request.settings)?;
        let mut retry = RetryLogic::new(self.overall_retries);
        let mut seen: HashSet<String> = HashSet::new();
        let mut copied = 0u32;

        watermark
            .tags
            .insert(TARGET_TAG, request.target.to_string_lossy().to_string());

        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Walk source folder {:?}", source_root))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(source_root)
                .with_context(|| format!("Relativize {:?}", entry.path()))?;
            let key = relative_key(relative);
            let file_name = entry.file_name().to_string_lossy();
            if !filter.accepts(&key, &file_name) {
                continue;
            }
            seen.insert(key.to_ascii_lowercase());

            let metadata = entry
                .metadata()
                .with_context(|| format!("Stat {:?}", entry.path()))?;
            let stamp = file_stamp(&metadata);
            let dest = request.target.join(relative);

            let unchanged = watermark.watermarks.get(&key) == Some(stamp.as_str());
            if !request.force && unchanged && dest.exists() {
                continue;
            }

            request.reporter.set_message(&format!("Copying {}", key));
            let src = entry.path();
            retry
                .retry_action(|| copy_file(src, &dest), self.local_retries, self.retry_delay)
                .with_context(|| format!("Copy {:?} -> {:?}", src, dest))?;

            watermark.update_watermark(key, stamp);
            watermark.add_artifact(dest.to_string_lossy());
            copied += 1;
        }

        // files that vanished from the share (or were filtered out) since last time
        let stale: Vec<String> = watermark
            .watermarks
            .keys()
            .filter(|k| !seen.contains(&k.to_ascii_lowercase()))
            .map(str::to_string)
            .collect();
        for key in &stale {
            let dest = request.target.join(key);
            if remove_file_if_exists(&dest)? {
                prune_empty_parents(&dest, request.target);
            }
            watermark.remove_watermark(key);
            watermark.remove_artifact(&dest.to_string_lossy());
        }

        log::info!(
            "[file-share] {} {}: {} copied, {} removed, {} unchanged",
            request.name,
            request.version,
            copied,
            stale.len(),
            (seen.len() as u32).saturating_sub(copied)
        );
        Ok(copied > 0 || !stale.is_empty())
    }
}

impl Default for FileShareProvider {
    fn default() -> Self {
        Self::new(DEFAULT_OVERALL_RETRIES, DEFAULT_LOCAL_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl DependencyProvider for FileShareProvider {
    fn download_type(&self) -> &str {
        FILE_SHARE_DOWNLOAD_TYPE
    }

    fn download(
        &self,
        request: &DownloadRequest<'_>,
        watermark: &mut Watermark,
    ) -> DownloadOutcome {
        DownloadOutcome::from_changed(self.sync_tree(request, watermark))
    }

    fn revert(&self, watermark: &Watermark, reporter: &dyn ProgressReporter) -> Result<()> {
        let target = watermark.tags.get(TARGET_TAG).map(PathBuf::from);
        for artifact in watermark.artifacts_to_clean.iter() {
            let path = Path::new(artifact);
            reporter.set_message(&format!("Removing {}", artifact));
            if remove_file_if_exists(path)? {
                log::debug!("[file-share] Removed {:?}", path);
            }
            if let Some(target) = &target {
                prune_empty_parents(path, target);
            }
        }
        Ok(())
    }
}

/// Include/exclude wildcard filters (`*.dll;*.pdb`), matched against the file
/// name and the relative path
#[derive(Debug, Default)]
struct FileFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileFilter {
    fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            include: parse_patterns(settings.get(keys::INCLUDE_FILTER))?,
            exclude: parse_patterns(settings.get(keys::EXCLUDE_FILTER))?,
        })
    }

    fn accepts(&self, relative: &str, file_name: &str) -> bool {
        let hit = |p: &Pattern| {
            p.matches_with(file_name, MATCH_OPTIONS) || p.matches_with(relative, MATCH_OPTIONS)
        };
        let included = self.include.is_empty() || self.include.iter().any(hit);
        included && !self.exclude.iter().any(hit)
    }
}

fn parse_patterns(raw: Option<&str>) -> Result<Vec<Pattern>> {
    raw.unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid filter pattern '{}'", p)))
        .collect()
}

/// Relative path with forward slashes, stable across platforms
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_stamp(metadata: &fs::Metadata) -> String {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}:{}", modified, metadata.len())
}
