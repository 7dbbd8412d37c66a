use crate::graph::Settings;
use crate::sync::location::SourceLocation;
use crate::sync::types::ProgressReporter;
use crate::watermark::Watermark;
use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Declared provider type of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    FileShare,
    SourceControl,
    SourceControlCopy,
    BuildResult,
    BuildResultJson,
    BinaryRepository,
    Subversion,
}

impl ProviderType {
    pub const ALL: [ProviderType; 7] = [
        ProviderType::FileShare,
        ProviderType::SourceControl,
        ProviderType::SourceControlCopy,
        ProviderType::BuildResult,
        ProviderType::BuildResultJson,
        ProviderType::BinaryRepository,
        ProviderType::Subversion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::FileShare => "FileShare",
            ProviderType::SourceControl => "SourceControl",
            ProviderType::SourceControlCopy => "SourceControlCopy",
            ProviderType::BuildResult => "BuildResult",
            ProviderType::BuildResultJson => "BuildResultJSON",
            ProviderType::BinaryRepository => "BinaryRepository",
            ProviderType::Subversion => "Subversion",
        }
    }
}

impl FromStr for ProviderType {
    type Err = crate::error::ComponentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::ComponentError::UnknownProvider(s.to_string()))
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a provider needs to fetch one component
pub struct DownloadRequest<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub source: &'a SourceLocation,
    pub target: &'a Path,
    pub force: bool,
    pub settings: &'a Settings,
    pub reporter: &'a dyn ProgressReporter,
}

/// Result of a provider download
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Work was done and the watermark reflects it
    Completed,
    /// Already up to date; nothing fetched
    Skipped,
    Failed(anyhow::Error),
}

impl DownloadOutcome {
    /// Map an internal `Ok(changed)` / `Err` result onto an outcome
    pub fn from_changed(result: Result<bool>) -> Self {
        match result {
            Ok(true) => DownloadOutcome::Completed,
            Ok(false) => DownloadOutcome::Skipped,
            Err(e) => DownloadOutcome::Failed(e),
        }
    }
}

/// Download/revert worker for one kind of source.
/// The synchronizer never looks into how a provider talks to its backend.
pub trait DependencyProvider: Send + Sync {
    /// Tag written into watermarks; selects this provider again on revert
    fn download_type(&self) -> &str;

    /// Fetch `request.source` into `request.target`. The watermark may be
    /// mutated freely; it is persisted whatever the outcome.
    fn download(&self, request: &DownloadRequest<'_>, watermark: &mut Watermark) -> DownloadOutcome;

    /// Undo a previous download described by `watermark`
    fn revert(&self, watermark: &Watermark, reporter: &dyn ProgressReporter) -> Result<()>;
}
