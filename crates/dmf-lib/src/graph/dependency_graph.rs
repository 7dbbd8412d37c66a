use super::{CircularDependency, Component, ResolvedGraph, SideBySideConflict};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

pub type NodeId = usize;

/// In-memory resolved graph. Node 0 is the root definition.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root_definition: PathBuf,
    nodes: Vec<Component>,
    edges: Vec<Vec<NodeId>>,
}

impl DependencyGraph {
    pub fn new(root_definition: impl Into<PathBuf>, root: Component) -> Self {
        Self {
            root_definition: root_definition.into(),
            nodes: vec![root],
            edges: vec![Vec::new()],
        }
    }

    pub fn root_id(&self) -> NodeId {
        0
    }

    /// Add `component` as a new node depending from `parent`
    pub fn add_dependency(&mut self, parent: NodeId, component: Component) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(component);
        self.edges.push(Vec::new());
        self.add_edge(parent, id);
        id
    }

    /// Link two existing nodes (may introduce a cycle)
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if from < self.nodes.len() && to < self.nodes.len() && !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    pub fn component(&self, id: NodeId) -> Option<&Component> {
        self.nodes.get(id)
    }

    fn dfs_cycles(
        &self,
        node: NodeId,
        state: &mut [u8],
        stack: &mut Vec<NodeId>,
        cycles: &mut Vec<CircularDependency>,
    ) {
        // 0 = unvisited, 1 = on stack, 2 = done
        state[node] = 1;
        stack.push(node);
        for &next in &self.edges[node] {
            match state[next] {
                0 => self.dfs_cycles(next, state, stack, cycles),
                1 => {
                    if let Some(start) = stack.iter().position(|&n| n == next) {
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|&n| self.nodes[n].name().name()).collect();
                        path.push(self.nodes[next].name().name());
                        cycles.push(CircularDependency { path });
                    }
                }
                _ => {}
            }
        }
        stack.pop();
        state[node] = 2;
    }
}

impl ResolvedGraph for DependencyGraph {
    fn root(&self) -> Option<&Component> {
        self.nodes.first()
    }

    fn root_definition_path(&self) -> Option<&Path> {
        if self.root_definition.as_os_str().is_empty() {
            None
        } else {
            Some(&self.root_definition)
        }
    }

    fn flatten(&self, include_root: bool, recursive: bool) -> Vec<&Component> {
        let mut ordered: Vec<&Component> = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
        queue.push_back((self.root_id(), 0));
        visited.insert(self.root_id());

        while let Some((id, depth)) = queue.pop_front() {
            if id != self.root_id() || include_root {
                let component = &self.nodes[id];
                if !ordered.iter().any(|c| c.same_identity(component)) {
                    ordered.push(component);
                }
            }
            if !recursive && depth >= 1 {
                continue;
            }
            for &child in &self.edges[id] {
                if visited.insert(child) {
                    queue.push_back((child, depth + 1));
                }
            }
        }
        ordered
    }

    fn side_by_side_dependencies(&self) -> Vec<SideBySideConflict> {
        let mut conflicts: Vec<SideBySideConflict> = Vec::new();
        for component in self.flatten(false, true) {
            let name = component.name().name();
            let version = component.version().version();
            match conflicts.iter_mut().find(|c| c.name == name) {
                Some(existing) => {
                    if !existing.versions.contains(&version) {
                        existing.versions.push(version);
                    }
                }
                None => conflicts.push(SideBySideConflict {
                    name,
                    versions: vec![version],
                }),
            }
        }
        conflicts.retain(|c| c.versions.len() > 1);
        conflicts
    }

    fn circular_dependencies(&self) -> Vec<CircularDependency> {
        let mut state = vec![0u8; self.nodes.len()];
        let mut stack = Vec::new();
        let mut cycles = Vec::new();
        self.dfs_cycles(self.root_id(), &mut state, &mut stack, &mut cycles);
        cycles
    }
}
