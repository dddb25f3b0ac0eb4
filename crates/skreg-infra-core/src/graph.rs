//! Declaration graph.
//!
//! Every component and resource declared through a [`crate::Context`] is
//! recorded here together with the edges the engine must respect: the
//! dependencies inferred from consumed outputs, plus explicit `depends_on`
//! hints where structural inference is not enough.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::{Error, Result, Urn};

/// What a node in the graph stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Logical grouping; never sent to the engine.
    Component,
    /// A provider resource registered with the engine.
    Resource,
}

/// A declared component or resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub urn: Urn,
    pub kind: NodeKind,
    pub type_token: String,
    pub name: String,
    pub parent: Option<Urn>,
    /// Inferred from the outputs consumed as inputs.
    pub dependencies: BTreeSet<Urn>,
    /// Explicit ordering hints.
    pub depends_on: BTreeSet<Urn>,
    pub ignore_changes: Vec<String>,
    pub protect: bool,
}

impl ResourceNode {
    /// Structural and explicit dependencies together.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &Urn> {
        self.dependencies.iter().chain(self.depends_on.iter())
    }
}

/// Directed acyclic graph of declarations, in declaration order.
#[derive(Debug, Default, Serialize)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    #[serde(skip)]
    index: HashMap<Urn, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node. URNs must be unique.
    pub fn add(&mut self, node: ResourceNode) -> Result<()> {
        if self.index.contains_key(&node.urn) {
            return Err(Error::DuplicateResource(node.urn.to_string()));
        }
        self.index.insert(node.urn.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn get(&self, urn: &Urn) -> Option<&ResourceNode> {
        self.index.get(urn).map(|&i| &self.nodes[i])
    }

    /// Look up a node by its logical name.
    pub fn find(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Direct children of a component.
    pub fn children<'a>(&'a self, parent: &'a Urn) -> impl Iterator<Item = &'a ResourceNode> {
        self.nodes
            .iter()
            .filter(move |n| n.parent.as_ref() == Some(parent))
    }

    /// Whether `from` transitively depends on `to`.
    pub fn depends_on(&self, from: &Urn, to: &Urn) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();

        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            for dep in node.all_dependencies() {
                if dep == to {
                    return true;
                }
                if seen.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        false
    }

    /// Check that every referenced URN was declared and that there are no cycles.
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            if let Some(parent) = &node.parent {
                if !self.index.contains_key(parent) {
                    return Err(Error::UnknownResource(format!(
                        "{} has unknown parent {}",
                        node.urn, parent
                    )));
                }
            }
            for dep in node.all_dependencies() {
                if !self.index.contains_key(dep) {
                    return Err(Error::UnknownResource(format!(
                        "{} depends on unknown resource {}",
                        node.urn, dep
                    )));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Dependencies-first ordering of every node, detecting cycles via DFS.
    pub fn topological_order(&self) -> Result<Vec<Urn>> {
        let mut result = Vec::with_capacity(self.nodes.len());
        let mut visited = HashMap::new();

        for node in &self.nodes {
            self.visit(&node.urn, &mut visited, &mut result)?;
        }
        Ok(result)
    }

    // visited: false while on the recursion stack, true once finished
    fn visit<'a>(
        &'a self,
        urn: &'a Urn,
        visited: &mut HashMap<&'a Urn, bool>,
        result: &mut Vec<Urn>,
    ) -> Result<()> {
        match visited.get(urn) {
            Some(true) => return Ok(()),
            Some(false) => return Err(Error::CycleDetected(urn.to_string())),
            None => {}
        }
        visited.insert(urn, false);

        if let Some(node) = self.get(urn) {
            for dep in node.all_dependencies() {
                if visited.get(dep) == Some(&false) {
                    return Err(Error::CycleDetected(format!("{} -> {}", urn, dep)));
                }
                self.visit(dep, visited, result)?;
            }
        }

        visited.insert(urn, true);
        result.push(urn.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, deps: &[&str]) -> ResourceNode {
        ResourceNode {
            urn: Urn::new("test", "test:index:Thing", name),
            kind: NodeKind::Resource,
            type_token: "test:index:Thing".to_string(),
            name: name.to_string(),
            parent: None,
            dependencies: deps
                .iter()
                .map(|d| Urn::new("test", "test:index:Thing", d))
                .collect(),
            depends_on: BTreeSet::new(),
            ignore_changes: vec![],
            protect: false,
        }
    }

    #[test]
    fn test_topological_order() {
        let mut graph = ResourceGraph::new();
        graph.add(node("service", &["listener"])).unwrap();
        graph.add(node("alb", &[])).unwrap();
        graph.add(node("listener", &["alb"])).unwrap();

        let order = graph.topological_order().unwrap();
        let position = |name: &str| order.iter().position(|u| u.name() == name).unwrap();

        assert!(position("alb") < position("listener"));
        assert!(position("listener") < position("service"));
    }

    #[test]
    fn test_duplicate_urn_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add(node("vpc", &[])).unwrap();
        assert!(matches!(
            graph.add(node("vpc", &[])),
            Err(Error::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_detect_cycle() {
        let mut graph = ResourceGraph::new();
        graph.add(node("a", &["b"])).unwrap();
        graph.add(node("b", &["a"])).unwrap();

        assert!(matches!(graph.validate(), Err(Error::CycleDetected(_))));
    }

    #[test]
    fn test_detect_unknown_dependency() {
        let mut graph = ResourceGraph::new();
        graph.add(node("subnet", &["nonexistent"])).unwrap();

        assert!(matches!(graph.validate(), Err(Error::UnknownResource(_))));
    }

    #[test]
    fn test_transitive_dependency() {
        let mut graph = ResourceGraph::new();
        graph.add(node("vpc", &[])).unwrap();
        graph.add(node("subnet", &["vpc"])).unwrap();
        graph.add(node("db", &["subnet"])).unwrap();

        let urn = |n: &str| Urn::new("test", "test:index:Thing", n);
        assert!(graph.depends_on(&urn("db"), &urn("vpc")));
        assert!(!graph.depends_on(&urn("vpc"), &urn("db")));
    }
}
