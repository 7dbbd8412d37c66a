/// Errors surfaced by a synchronization or clean run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Dependency graph has no resolvable root definition")]
    MissingRoot,

    #[error("Watermark cache is unavailable: {0:#}")]
    Cache(anyhow::Error),

    #[error("Component {name} {version}: {cause}")]
    Component {
        name: String,
        version: String,
        #[source]
        cause: ComponentError,
    },
}

impl SyncError {
    pub fn component(
        name: impl Into<String>,
        version: impl Into<String>,
        cause: ComponentError,
    ) -> Self {
        SyncError::Component {
            name: name.into(),
            version: version.into(),
            cause,
        }
    }

    /// Identity of the component that aborted the run, if any
    pub fn component_identity(&self) -> Option<(&str, &str)> {
        match self {
            SyncError::Component { name, version, .. } => Some((name.as_str(), version.as_str())),
            _ => None,
        }
    }
}

/// Per-component failure causes
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("Unknown provider type '{0}'")]
    UnknownProvider(String),

    #[error("Required setting '{0}' is missing")]
    MissingSetting(&'static str),

    #[error("Setting '{key}' is malformed: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("Failed to materialize build artifacts: {0:#}")]
    Materialize(anyhow::Error),

    #[error("Download failed: {0:#}")]
    Download(anyhow::Error),

    #[error("Failed to persist watermark: {0:#}")]
    Watermark(anyhow::Error),
}

impl ComponentError {
    /// Configuration errors are fatal and never worth retrying
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ComponentError::UnknownProvider(_)
                | ComponentError::MissingSetting(_)
                | ComponentError::InvalidSetting { .. }
        )
    }
}
