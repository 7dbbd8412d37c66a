pub mod dependency_graph;

pub use dependency_graph::{DependencyGraph, NodeId};

use crate::utils::nocase::NoCaseMap;
use crate::watermark::naming::ComponentKey;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Provider settings attached to a component (case-insensitive keys)
pub type Settings = NoCaseMap;

/// Identity of a component: a path/name, or a team project + build definition pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentName {
    Path(String),
    Build {
        team_project: String,
        definition: String,
    },
}

impl ComponentName {
    pub fn from_path(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.trim().is_empty() {
            anyhow::bail!("Component name must not be empty");
        }
        Ok(ComponentName::Path(path))
    }

    pub fn from_build(
        team_project: impl Into<String>,
        definition: impl Into<String>,
    ) -> Result<Self> {
        let team_project = team_project.into();
        let definition = definition.into();
        if team_project.trim().is_empty() || definition.trim().is_empty() {
            anyhow::bail!("Build component names need both a team project and a build definition");
        }
        Ok(ComponentName::Build {
            team_project,
            definition,
        })
    }

    /// Path form as-is, or `{project}_{definition}` for build names
    pub fn name(&self) -> String {
        match self {
            ComponentName::Path(path) => path.clone(),
            ComponentName::Build {
                team_project,
                definition,
            } => format!("{}_{}", team_project, definition),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Version of a component.
///
/// Built from exactly one of: a literal version, a source-control version
/// spec, or a build selector (number and/or accepted statuses, qualities, tags).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComponentVersion {
    version: Option<String>,
    version_spec: Option<String>,
    build_number: Option<String>,
    build_status: BTreeSet<String>,
    build_quality: BTreeSet<String>,
    build_tags: BTreeSet<String>,
}

impl ComponentVersion {
    pub fn literal(version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        if version.trim().is_empty() {
            anyhow::bail!("Version must not be empty");
        }
        Ok(Self {
            version: Some(version),
            ..Default::default()
        })
    }

    pub fn version_spec(spec: impl Into<String>) -> Result<Self> {
        let spec = spec.into();
        if spec.trim().is_empty() {
            anyhow::bail!("Version spec must not be empty");
        }
        Ok(Self {
            version_spec: Some(spec),
            ..Default::default()
        })
    }

    pub fn build<I, S>(build_number: Option<String>, status: I, quality: I, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collect = |items: I| -> BTreeSet<String> {
            items
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.trim().is_empty())
                .collect()
        };
        let version = Self {
            build_number: build_number.filter(|n| !n.trim().is_empty()),
            build_status: collect(status),
            build_quality: collect(quality),
            build_tags: collect(tags),
            ..Default::default()
        };
        if version.build_number.is_none()
            && version.build_status.is_empty()
            && version.build_quality.is_empty()
            && version.build_tags.is_empty()
        {
            anyhow::bail!(
                "Build versions need a build number or at least one status, quality or tag"
            );
        }
        Ok(version)
    }

    pub fn build_number(&self) -> Option<&str> {
        self.build_number.as_deref()
    }

    pub fn version_spec_value(&self) -> Option<&str> {
        self.version_spec.as_deref()
    }

    /// Display string: literal, then version spec, then build number, then a
    /// synthesized `Quality:..;Status:..` selector
    pub fn version(&self) -> String {
        if let Some(v) = &self.version {
            return v.clone();
        }
        if let Some(spec) = &self.version_spec {
            return spec.clone();
        }
        if let Some(number) = &self.build_number {
            return number.clone();
        }
        format!(
            "Quality:{};Status:{}",
            join(&self.build_quality),
            join(&self.build_status)
        )
    }

    /// Loose version identity: true as soon as any one populated criterion
    /// agrees (literal, spec, build number, status+quality sets, or
    /// status+tag sets). Not transitive; `==` stays structural.
    pub fn matches(&self, other: &ComponentVersion) -> bool {
        if both_eq(&self.version, &other.version)
            || both_eq(&self.version_spec, &other.version_spec)
            || both_eq(&self.build_number, &other.build_number)
        {
            return true;
        }
        if !self.build_status.is_empty() && self.build_status == other.build_status {
            return self.build_quality == other.build_quality || self.build_tags == other.build_tags;
        }
        false
    }
}

fn both_eq(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version())
    }
}

/// A resolved graph node. Read-only input to synchronization.
#[derive(Debug, Clone)]
pub struct Component {
    name: ComponentName,
    version: ComponentVersion,
    provider_type: String,
    settings: Settings,
}

impl Component {
    pub fn new(
        name: ComponentName,
        version: ComponentVersion,
        provider_type: impl Into<String>,
        settings: Settings,
    ) -> Self {
        Self {
            name,
            version,
            provider_type: provider_type.into(),
            settings,
        }
    }

    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    pub fn version(&self) -> &ComponentVersion {
        &self.version
    }

    /// Declared provider type tag, as written in the dependency definition
    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Logical (name, version) identity used as the watermark key
    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.name.name(), self.version.version())
    }

    /// Same logical component: equal names and loosely matching versions
    pub fn same_identity(&self, other: &Component) -> bool {
        self.name.name() == other.name.name() && self.version.matches(&other.version)
    }
}

/// Two different versions of the same component reachable from the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideBySideConflict {
    pub name: String,
    pub versions: Vec<String>,
}

impl fmt::Display for SideBySideConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Component {} is required in several versions: {}",
            self.name,
            self.versions.join(", ")
        )
    }
}

/// A dependency cycle, listed from the first repeated component back to itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularDependency {
    pub path: Vec<String>,
}

impl fmt::Display for CircularDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency: {}", self.path.join(" -> "))
    }
}

/// Boundary to the graph builder. Graphs arrive flattened-ready and validated.
pub trait ResolvedGraph {
    /// The component standing for the root definition itself
    fn root(&self) -> Option<&Component>;

    /// Path of the root dependency definition; partitions the watermark cache
    fn root_definition_path(&self) -> Option<&Path>;

    /// Ordered, de-duplicated components. Non-recursive means direct
    /// dependencies of the root only.
    fn flatten(&self, include_root: bool, recursive: bool) -> Vec<&Component>;

    fn side_by_side_dependencies(&self) -> Vec<SideBySideConflict>;

    fn circular_dependencies(&self) -> Vec<CircularDependency>;
}
