use super::config::{keys, TEMP_DIR_PREFIX};
use super::core::fs::{copy_dir_recursive, extract_zip};
use super::core::traits::ProviderType;
use super::site::SiteMapper;
use super::types::SyncSpec;
use crate::error::ComponentError;
use crate::graph::{Component, ComponentName, Settings};
use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

/// Where a provider fetches a component from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A local or UNC directory
    Path(PathBuf),
    /// A path on a version-control or repository server
    Server { url: Url, path: String },
    /// Output of a build definition; `drop_root` is its share, when known
    Build {
        url: Url,
        team_project: String,
        definition: String,
        drop_root: Option<PathBuf>,
    },
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
            SourceLocation::Server { url, path } => write!(f, "{} ({})", path, url),
            SourceLocation::Build {
                url,
                team_project,
                definition,
                ..
            } => write!(f, "{}/{} ({})", team_project, definition, url),
        }
    }
}

/// Source and target of one component download. A scratch directory, when
/// present, is deleted on drop or `release`.
#[derive(Debug)]
pub struct ResolvedLocation {
    pub source: SourceLocation,
    pub target: PathBuf,
    scratch: Option<TempDir>,
}

impl ResolvedLocation {
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Delete the scratch directory now, logging failures
    pub fn release(self) {
        if let Some(scratch) = self.scratch {
            let path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                log::warn!("Failed to delete temporary directory {:?}: {}", path, e);
            }
        }
    }
}

/// Resolve source and target for `component` according to its provider type
pub fn resolve_location(
    component: &Component,
    provider_type: ProviderType,
    spec: &SyncSpec,
    workspace_root: &Path,
    site_mapper: &SiteMapper,
) -> Result<ResolvedLocation, ComponentError> {
    let settings = component.settings();
    let name = component.name().name();
    let target = target_path(settings, spec, workspace_root);

    let mut scratch = None;
    let source = match provider_type {
        ProviderType::FileShare => {
            let root = required_absolute_path(settings, keys::FILE_SHARE_ROOT_PATH)?;
            let path = root.join(&name).join(component.version().version());
            SourceLocation::Path(site_mapper.map_path(&path))
        }
        ProviderType::SourceControl | ProviderType::SourceControlCopy => {
            let url = required_url(settings, keys::TEAM_PROJECT_COLLECTION_URL)?;
            let server_root = required(settings, keys::SERVER_ROOT_PATH)?;
            if !server_root.starts_with("$/") {
                return Err(ComponentError::InvalidSetting {
                    key: keys::SERVER_ROOT_PATH,
                    reason: format!("'{}' is not a server path (expected '$/...')", server_root),
                });
            }
            SourceLocation::Server {
                url,
                path: name.clone(),
            }
        }
        ProviderType::BuildResult => {
            let url = required_url(settings, keys::TEAM_PROJECT_COLLECTION_URL)?;
            let (team_project, definition) = build_identity(component.name(), settings)?;
            let drop_root = optional(settings, keys::DROP_LOCATION)
                .map(|drop| site_mapper.map_path(Path::new(drop)));
            SourceLocation::Build {
                url,
                team_project,
                definition,
                drop_root,
            }
        }
        ProviderType::BuildResultJson => {
            required_url(settings, keys::TEAM_PROJECT_COLLECTION_URL)?;
            let artifacts = PathBuf::from(required(settings, keys::BUILD_ARTIFACTS_PATH)?);
            let temp = materialize_artifacts(&artifacts).map_err(ComponentError::Materialize)?;
            let path = temp.path().to_path_buf();
            scratch = Some(temp);
            SourceLocation::Path(path)
        }
        ProviderType::BinaryRepository => {
            let url = required_url(settings, keys::TEAM_PROJECT_COLLECTION_URL)?;
            let project = required(settings, keys::BINARY_REPOSITORY_TEAM_PROJECT)?;
            SourceLocation::Server {
                url,
                path: format!("{}/{}", project, name),
            }
        }
        ProviderType::Subversion => {
            let url = required_url(settings, keys::SUBVERSION_URL)?;
            SourceLocation::Server {
                url,
                path: name.clone(),
            }
        }
    };

    log::debug!(
        "Resolved {} {} ({}): {} -> {:?}",
        name,
        component.version(),
        provider_type,
        source,
        target
    );
    Ok(ResolvedLocation {
        source,
        target,
        scratch,
    })
}

/// `RelativeOutputPath` if set, else the configured default, below the
/// folder of the root definition
pub fn target_path(settings: &Settings, spec: &SyncSpec, workspace_root: &Path) -> PathBuf {
    let relative = optional(settings, keys::RELATIVE_OUTPUT_PATH)
        .unwrap_or(spec.default_relative_output_path.as_str());
    workspace_root.join(relative)
}

fn build_identity(
    name: &ComponentName,
    settings: &Settings,
) -> Result<(String, String), ComponentError> {
    match name {
        ComponentName::Build {
            team_project,
            definition,
        } => Ok((team_project.clone(), definition.clone())),
        ComponentName::Path(_) => Ok((
            required(settings, keys::TEAM_PROJECT_NAME)?.to_string(),
            required(settings, keys::BUILD_DEFINITION)?.to_string(),
        )),
    }
}

/// Copy or unzip build artifacts into a fresh temporary directory
fn materialize_artifacts(artifacts: &Path) -> anyhow::Result<TempDir> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir()
        .context("Create temporary artifact directory")?;
    let is_zip = artifacts
        .extension()
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    if artifacts.is_file() && is_zip {
        extract_zip(artifacts, temp.path())?;
    } else if artifacts.is_dir() {
        copy_dir_recursive(artifacts, temp.path())?;
    } else {
        anyhow::bail!("Build artifacts not found at {:?}", artifacts);
    }
    log::debug!("Materialized {:?} into {:?}", artifacts, temp.path());
    Ok(temp)
}

fn optional<'a>(settings: &'a Settings, key: &str) -> Option<&'a str> {
    settings.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(settings: &'a Settings, key: &'static str) -> Result<&'a str, ComponentError> {
    optional(settings, key).ok_or(ComponentError::MissingSetting(key))
}

fn required_url(settings: &Settings, key: &'static str) -> Result<Url, ComponentError> {
    let raw = required(settings, key)?;
    let url = Url::parse(raw).map_err(|e| ComponentError::InvalidSetting {
        key,
        reason: format!("'{}' is not an absolute URL: {}", raw, e),
    })?;
    if url.cannot_be_a_base() {
        return Err(ComponentError::InvalidSetting {
            key,
            reason: format!("'{}' is not a hierarchical URL", raw),
        });
    }
    Ok(url)
}

fn required_absolute_path(
    settings: &Settings,
    key: &'static str,
) -> Result<PathBuf, ComponentError> {
    let raw = required(settings, key)?;
    let is_unc = raw.starts_with(r"\\") || raw.starts_with("//");
    if !is_unc && !Path::new(raw).is_absolute() {
        return Err(ComponentError::InvalidSetting {
            key,
            reason: format!("'{}' is not an absolute path", raw),
        });
    }
    Ok(PathBuf::from(raw))
}
