use super::traits::{DependencyProvider, ProviderType};
use crate::error::ComponentError;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps provider types (download) and download-type tags (revert) to workers.
/// Built once before a run; lookups of unregistered tags fail immediately.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    by_type: HashMap<ProviderType, Arc<dyn DependencyProvider>>,
    by_download_type: HashMap<String, Arc<dyn DependencyProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for `provider_type`. Its download type becomes
    /// resolvable for revert as well.
    pub fn register(
        &mut self,
        provider_type: ProviderType,
        provider: Arc<dyn DependencyProvider>,
    ) -> &mut Self {
        log::debug!(
            "Registering provider {} for {}",
            provider.download_type(),
            provider_type
        );
        self.by_download_type
            .insert(provider.download_type().to_ascii_lowercase(), provider.clone());
        self.by_type.insert(provider_type, provider);
        self
    }

    pub fn for_type(
        &self,
        provider_type: ProviderType,
    ) -> Result<Arc<dyn DependencyProvider>, ComponentError> {
        self.by_type
            .get(&provider_type)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownProvider(provider_type.to_string()))
    }

    /// Resolve the declared type string of a component
    pub fn for_type_name(
        &self,
        provider_type: &str,
    ) -> Result<(ProviderType, Arc<dyn DependencyProvider>), ComponentError> {
        let parsed: ProviderType = provider_type.parse()?;
        Ok((parsed, self.for_type(parsed)?))
    }

    pub fn for_download_type(
        &self,
        download_type: &str,
    ) -> Result<Arc<dyn DependencyProvider>, ComponentError> {
        self.by_download_type
            .get(&download_type.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ComponentError::UnknownProvider(download_type.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
