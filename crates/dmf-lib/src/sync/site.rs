use super::config::SITE_ENV_VAR;
use super::types::{MultiSiteSettings, SiteMapping};
use std::path::{Path, PathBuf};

/// Rewrites share paths to the replica of the site this machine belongs to
#[derive(Debug, Clone)]
pub struct SiteMapper {
    enabled: bool,
    site: Option<String>,
    mappings: Vec<SiteMapping>,
}

impl SiteMapper {
    pub fn from_settings(settings: &MultiSiteSettings) -> Self {
        let site = settings
            .site
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                if settings.enabled {
                    Self::detect_site()
                } else {
                    None
                }
            });
        if settings.enabled {
            log::info!("Multi-site mapping enabled for site {:?}", site);
        }
        Self {
            enabled: settings.enabled,
            site,
            mappings: settings.mappings.clone(),
        }
    }

    pub fn detect_site() -> Option<String> {
        std::env::var(SITE_ENV_VAR)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    /// Apply the mapping of the current site. Unmatched paths come back unchanged.
    pub fn map_path(&self, path: &Path) -> PathBuf {
        if !self.enabled {
            return path.to_path_buf();
        }
        let Some(site) = self.site.as_deref() else {
            log::warn!(
                "Multi-site mapping is enabled but no site could be determined; using {:?}",
                path
            );
            return path.to_path_buf();
        };

        let original = path.to_string_lossy();
        let mapped = self
            .mappings
            .iter()
            .filter(|m| m.site.eq_ignore_ascii_case(site))
            .find_map(|m| {
                let prefix = original.get(..m.base_path.len())?;
                if prefix.eq_ignore_ascii_case(&m.base_path) {
                    Some(format!("{}{}", m.site_path, &original[m.base_path.len()..]))
                } else {
                    None
                }
            });

        match mapped {
            Some(mapped) => {
                log::debug!("Site {} maps {:?} -> {}", site, path, mapped);
                PathBuf::from(mapped)
            }
            None => {
                log::warn!("No mapping for site {} matches {:?}; using it unchanged", site, path);
                path.to_path_buf()
            }
        }
    }
}
