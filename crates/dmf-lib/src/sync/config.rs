//! Centralized synchronization settings.
//! Static constants used by the orchestrator, location resolution and the
//! bundled providers.

use std::time::Duration;

// Local cache layout: <data_local_dir>/AIT/DMF/<root partition>/<key>.xml
pub const CACHE_VENDOR_DIR: &str = "AIT";
pub const CACHE_PRODUCT_DIR: &str = "DMF";

pub const DEFAULT_RELATIVE_OUTPUT_PATH: &str = "Dependencies";

/// Environment variable consulted when no site is configured explicitly
pub const SITE_ENV_VAR: &str = "DMF_SITE";

pub const TEMP_DIR_PREFIX: &str = "dmf-";

// Retry defaults for bundled providers
pub const DEFAULT_OVERALL_RETRIES: u32 = 10;
pub const DEFAULT_LOCAL_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Component setting keys
pub mod keys {
    pub const RELATIVE_OUTPUT_PATH: &str = "RelativeOutputPath";
    pub const FILE_SHARE_ROOT_PATH: &str = "FileShareRootPath";
    pub const TEAM_PROJECT_COLLECTION_URL: &str = "TeamProjectCollectionUrl";
    pub const SERVER_ROOT_PATH: &str = "ServerRootPath";
    pub const TEAM_PROJECT_NAME: &str = "TeamProjectName";
    pub const BUILD_DEFINITION: &str = "BuildDefinition";
    pub const DROP_LOCATION: &str = "DropLocation";
    pub const BUILD_ARTIFACTS_PATH: &str = "BuildArtifactsPath";
    pub const BINARY_REPOSITORY_TEAM_PROJECT: &str = "BinaryRepositoryTeamProject";
    pub const SUBVERSION_URL: &str = "SubversionUrl";
    pub const INCLUDE_FILTER: &str = "IncludeFilter";
    pub const EXCLUDE_FILTER: &str = "ExcludeFilter";
}
