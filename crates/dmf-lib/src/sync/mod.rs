pub mod cleaner;
pub mod config;
pub mod core;
pub mod location;
pub mod providers;
pub mod site;
pub mod types;


pub use types::{CleanReport, SyncReport, SyncSpec};

use self::cleaner::Cleaner;
use self::core::registry::ProviderRegistry;
use self::core::traits::{DependencyProvider, DownloadOutcome, DownloadRequest, ProviderType};
use self::location::resolve_location;
use self::site::SiteMapper;
use self::types::ProgressReporter;
use crate::error::{ComponentError, SyncError};
use crate::graph::{Component, ResolvedGraph};
use crate::watermark::naming::ComponentKey;
use crate::watermark::store::WatermarkStore;
use crate::watermark::Watermark;
use std::path::Path;
use std::sync::Arc;

/// Bring the output tree of `graph` in line with its current dependencies.
///
/// Components no longer required are reverted first, then every required
/// component is downloaded in flattening order. The first component that
/// fails aborts the run; components downloaded before it stay in place.
pub fn synchronize(
    graph: &dyn ResolvedGraph,
    spec: &SyncSpec,
    registry: &ProviderRegistry,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<SyncReport, SyncError> {
    let result = run_synchronize(graph, spec, registry, reporter.as_ref());
    match &result {
        Ok(report) => {
            log::info!(
                "[sync] Done: {} downloaded, {} up to date, {} reverted",
                report.downloaded.len(),
                report.skipped.len(),
                report.reverted.len()
            );
            reporter.done(true, Some("Dependencies synchronized"));
        }
        Err(e) => {
            log::error!("[sync] Synchronization failed: {}", e);
            reporter.done(false, Some(&e.to_string()));
        }
    }
    result
}

/// Revert every component previously downloaded for the root of `graph`
pub fn clean(
    graph: &dyn ResolvedGraph,
    spec: &SyncSpec,
    registry: &ProviderRegistry,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<CleanReport, SyncError> {
    let root_definition = graph.root_definition_path().ok_or(SyncError::MissingRoot)?;
    let store = WatermarkStore::open(&spec.cache_root, root_definition).map_err(SyncError::Cache)?;

    log::info!("[clean] Cleaning all dependencies of {:?}", root_definition);
    let report = Cleaner::new(registry, reporter.as_ref()).clean_all(&store);

    if report.failures.is_empty() {
        reporter.done(true, Some("Dependencies cleaned"));
    } else {
        reporter.done(
            false,
            Some(&format!("{} component(s) could not be reverted", report.failures.len())),
        );
    }
    Ok(report)
}

struct PlannedDownload<'g> {
    component: &'g Component,
    provider_type: ProviderType,
    provider: Arc<dyn DependencyProvider>,
}

fn run_synchronize(
    graph: &dyn ResolvedGraph,
    spec: &SyncSpec,
    registry: &ProviderRegistry,
    reporter: &dyn ProgressReporter,
) -> Result<SyncReport, SyncError> {
    let root = graph.root().ok_or(SyncError::MissingRoot)?;
    let root_definition = graph.root_definition_path().ok_or(SyncError::MissingRoot)?;
    let workspace_root = root_definition
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    log::info!(
        "[sync] Synchronizing {} ({:?}), recursive: {}, force: {}",
        root.name(),
        root_definition,
        spec.recursive,
        spec.force_overwrite
    );

    let store = WatermarkStore::open(&spec.cache_root, root_definition).map_err(SyncError::Cache)?;
    let previous: Vec<ComponentKey> = store.stored_dependency_watermarks().collect();
    let current = graph.flatten(false, spec.recursive);

    // Resolve every provider up front so a bad type fails before any cleanup
    let plan = current
        .iter()
        .copied()
        .map(|component| {
            registry
                .for_type_name(component.provider_type())
                .map(|(provider_type, provider)| PlannedDownload {
                    component,
                    provider_type,
                    provider,
                })
                .map_err(|e| {
                    SyncError::component(component.name().name(), component.version().version(), e)
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let keep: Vec<ComponentKey> = current.iter().map(|c| c.key()).collect();
    let mut report = SyncReport::default();

    let stale: Vec<&ComponentKey> = previous
        .iter()
        .filter(|p| !WatermarkStore::is_component_in_list(&keep, p))
        .collect();
    if !stale.is_empty() {
        reporter.start_step("Removing obsolete dependencies", Some(stale.len() as u32));
        let cleaner = Cleaner::new(registry, reporter);
        for (index, key) in stale.iter().enumerate() {
            reporter.set_step_count(index as u32 + 1, Some(stale.len() as u32));
            match cleaner.revert_component(&store, &key.name, &key.version) {
                Ok(()) => report.reverted.push(key.to_string()),
                Err(e) => {
                    log::warn!("[sync] Keeping stale entry {}: {:#}", key, e);
                    reporter.warn(&format!("Could not remove {}: {:#}", key, e));
                    report.revert_failures.push(key.to_string());
                }
            }
        }
    }

    let site_mapper = SiteMapper::from_settings(&spec.multi_site);
    let total = plan.len() as u32;
    reporter.start_step("Downloading dependencies", Some(total));
    for (index, planned) in plan.iter().enumerate() {
        reporter.set_step_count(index as u32 + 1, Some(total));
        let name = planned.component.name().name();
        let version = planned.component.version().version();

        let downloaded =
            download_component(planned, spec, workspace_root, &site_mapper, &store, reporter)
                .map_err(|cause| SyncError::component(name.as_str(), version.as_str(), cause))?;
        let entry = format!("{} {}", name, version);
        if downloaded {
            report.downloaded.push(entry);
        } else {
            report.skipped.push(entry);
        }
    }

    for conflict in graph.side_by_side_dependencies() {
        report.warnings.push(conflict.to_string());
    }
    for cycle in graph.circular_dependencies() {
        report.warnings.push(cycle.to_string());
    }
    for warning in &report.warnings {
        log::warn!("[sync] {}", warning);
        reporter.warn(warning);
    }

    Ok(report)
}

/// Download one component. Returns whether the provider did any work.
fn download_component(
    planned: &PlannedDownload<'_>,
    spec: &SyncSpec,
    workspace_root: &Path,
    site_mapper: &SiteMapper,
    store: &WatermarkStore,
    reporter: &dyn ProgressReporter,
) -> Result<bool, ComponentError> {
    let component = planned.component;
    let name = component.name().name();
    let version = component.version().version();
    reporter.set_message(&format!("Downloading {} {}", name, version));

    let location = resolve_location(
        component,
        planned.provider_type,
        spec,
        workspace_root,
        site_mapper,
    )?;

    let watermark = store.load(&name, &version).unwrap_or_else(|| {
        log::debug!("[sync] No watermark for {} {}, starting fresh", name, version);
        Watermark::new(planned.provider.download_type())
    });
    let mut guard = WatermarkGuard {
        store,
        name: &name,
        version: &version,
        watermark,
        saved: false,
    };

    let request = DownloadRequest {
        name: &name,
        version: &version,
        source: &location.source,
        target: &location.target,
        force: spec.force_overwrite,
        settings: component.settings(),
        reporter,
    };
    let outcome = planned.provider.download(&request, &mut guard.watermark);
    let saved = guard.commit();
    location.release();

    match outcome {
        DownloadOutcome::Completed => {
            saved.map_err(ComponentError::Watermark)?;
            log::info!("[sync] Downloaded {} {}", name, version);
            Ok(true)
        }
        DownloadOutcome::Skipped => {
            saved.map_err(ComponentError::Watermark)?;
            log::debug!("[sync] {} {} is up to date", name, version);
            Ok(false)
        }
        DownloadOutcome::Failed(cause) => {
            if let Err(e) = saved {
                log::error!("[sync] Could not save watermark of {} {}: {:#}", name, version, e);
            }
            Err(ComponentError::Download(cause))
        }
    }
}

/// Persists the watermark of the component being downloaded, also when the
/// provider unwinds.
struct WatermarkGuard<'a> {
    store: &'a WatermarkStore,
    name: &'a str,
    version: &'a str,
    watermark: Watermark,
    saved: bool,
}

impl WatermarkGuard<'_> {
    fn commit(mut self) -> anyhow::Result<()> {
        self.saved = true;
        self.store.save(&mut self.watermark, self.name, self.version)
    }
}

impl Drop for WatermarkGuard<'_> {
    fn drop(&mut self) {
        if self.saved {
            return;
        }
        if let Err(e) = self.store.save(&mut self.watermark, self.name, self.version) {
            log::error!(
                "[sync] Could not save watermark of {} {}: {:#}",
                self.name,
                self.version,
                e
            );
        }
    }
}
