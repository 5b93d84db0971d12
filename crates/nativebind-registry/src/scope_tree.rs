//! Scope Tree - hierarchical storage of host scopes.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: `ScopeData` (classes declared directly in that scope)
//! - Edges: `Contains(name)` for hierarchy, `Imports` for import directives
//!
//! Packages and classes both open scopes: a nested class lives in the scope
//! its enclosing class opens.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::ClassId;

/// Result of name resolution that may be ambiguous.
///
/// When several import directives bring the same name into scope, the
/// reference is ambiguous and must be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult<T> {
    /// Found exactly one match.
    Found(T),
    /// Found multiple matches through different imports.
    Ambiguous(Vec<T>),
    /// Not found in any searched location.
    NotFound,
}

impl<T> ResolutionResult<T> {
    /// Check if resolution found exactly one match.
    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionResult::Found(_))
    }

    /// Convert to Option, returning Some for Found, None otherwise.
    pub fn ok(self) -> Option<T> {
        match self {
            ResolutionResult::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// Edge types in the scope graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEdge {
    /// Parent scope contains child scope; the String is the child's simple name.
    Contains(String),
    /// Import directive: names of the target scope are visible from the source.
    Imports,
}

/// Data stored in each scope node.
#[derive(Debug, Default)]
pub struct ScopeData {
    /// Classes declared directly in this scope, by simple host name.
    pub classes: FxHashMap<String, ClassId>,
}

/// The scope graph.
pub struct ScopeTree {
    graph: DiGraph<ScopeData, ScopeEdge>,
    root: NodeIndex,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create a new tree with an empty root scope.
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ScopeData::default());
        Self { graph, root }
    }

    /// The root scope.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Get a scope's data.
    pub fn get_scope(&self, node: NodeIndex) -> Option<&ScopeData> {
        self.graph.node_weight(node)
    }

    /// Find a child scope by name.
    pub fn find_child(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.graph.edges(parent).find_map(|edge| match edge.weight() {
            ScopeEdge::Contains(child) if child == name => Some(edge.target()),
            _ => None,
        })
    }

    /// Get or create a child scope.
    pub fn get_or_create_child(&mut self, parent: NodeIndex, name: &str) -> NodeIndex {
        if let Some(child) = self.find_child(parent, name) {
            return child;
        }
        let child = self.graph.add_node(ScopeData::default());
        self.graph
            .add_edge(parent, child, ScopeEdge::Contains(name.to_string()));
        child
    }

    /// Get or create a scope path from the root.
    pub fn get_or_create_path<S: AsRef<str>>(&mut self, path: &[S]) -> NodeIndex {
        let mut current = self.root;
        for segment in path {
            current = self.get_or_create_child(current, segment.as_ref());
        }
        current
    }

    /// Get an existing scope by path.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeIndex> {
        let mut current = self.root;
        for segment in path {
            current = self.find_child(current, segment.as_ref())?;
        }
        Some(current)
    }

    /// Find the parent scope of a node.
    pub fn find_parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|edge| matches!(edge.weight(), ScopeEdge::Contains(_)))
            .map(|edge| edge.source())
    }

    /// Record a class declared directly in `scope`.
    ///
    /// Returns the previously registered class if the name was taken.
    pub fn insert_class(&mut self, scope: NodeIndex, name: &str, id: ClassId) -> Option<ClassId> {
        let data = self.graph.node_weight_mut(scope)?;
        if let Some(existing) = data.classes.get(name) {
            return Some(*existing);
        }
        data.classes.insert(name.to_string(), id);
        None
    }

    /// Add an import directive from one scope to another.
    pub fn add_import(&mut self, from: NodeIndex, target: NodeIndex) {
        let exists = self
            .graph
            .edges(from)
            .any(|edge| matches!(edge.weight(), ScopeEdge::Imports) && edge.target() == target);
        if !exists {
            self.graph.add_edge(from, target, ScopeEdge::Imports);
        }
    }

    /// Scopes imported directly from `scope` (imports are not transitive).
    pub fn imports(&self, scope: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .edges(scope)
            .filter(|edge| matches!(edge.weight(), ScopeEdge::Imports))
            .map(|edge| edge.target())
            .collect()
    }

    /// Resolve a class reference from `scope`.
    ///
    /// A `.`-qualified name is resolved from the root. A simple name is
    /// searched in the current scope, then each enclosing scope up to the
    /// root, then in scopes imported by any of those (ambiguity reported).
    pub fn resolve_class(&self, name: &str, scope: NodeIndex) -> ResolutionResult<ClassId> {
        if name.contains('.') {
            let parts: Vec<&str> = name.split('.').filter(|p| !p.is_empty()).collect();
            let Some((simple, path)) = parts.split_last() else {
                return ResolutionResult::NotFound;
            };
            return match self
                .get_path(path)
                .and_then(|node| self.graph.node_weight(node))
                .and_then(|data| data.classes.get(*simple))
            {
                Some(id) => ResolutionResult::Found(*id),
                None => ResolutionResult::NotFound,
            };
        }

        let mut current = Some(scope);
        while let Some(node) = current {
            if let Some(id) = self.graph.node_weight(node).and_then(|d| d.classes.get(name)) {
                return ResolutionResult::Found(*id);
            }
            current = self.find_parent(node);
        }

        let mut matches: Vec<ClassId> = Vec::new();
        let mut current = Some(scope);
        while let Some(node) = current {
            for imported in self.imports(node) {
                if let Some(id) = self
                    .graph
                    .node_weight(imported)
                    .and_then(|d| d.classes.get(name))
                    && !matches.contains(id)
                {
                    matches.push(*id);
                }
            }
            current = self.find_parent(node);
        }

        match matches.len() {
            0 => ResolutionResult::NotFound,
            1 => ResolutionResult::Found(matches[0]),
            _ => ResolutionResult::Ambiguous(matches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_find_paths() {
        let mut tree = ScopeTree::new();
        let inner = tree.get_or_create_path(&["org", "bind"]);
        assert_eq!(tree.get_path(&["org", "bind"]), Some(inner));
        assert_eq!(tree.get_or_create_path(&["org", "bind"]), inner);
        assert!(tree.get_path(&["org", "missing"]).is_none());
    }

    #[test]
    fn parent_lookup() {
        let mut tree = ScopeTree::new();
        let org = tree.get_or_create_path(&["org"]);
        let bind = tree.get_or_create_path(&["org", "bind"]);
        assert_eq!(tree.find_parent(bind), Some(org));
        assert_eq!(tree.find_parent(tree.root()), None);
    }

    #[test]
    fn resolve_walks_enclosing_scopes() {
        let mut tree = ScopeTree::new();
        let org = tree.get_or_create_path(&["org"]);
        let deep = tree.get_or_create_path(&["org", "Outer"]);
        tree.insert_class(org, "Outer", ClassId(0));
        tree.insert_class(deep, "Inner", ClassId(1));

        assert_eq!(tree.resolve_class("Outer", deep), ResolutionResult::Found(ClassId(0)));
        assert_eq!(tree.resolve_class("Inner", deep), ResolutionResult::Found(ClassId(1)));
        assert_eq!(tree.resolve_class("Inner", org), ResolutionResult::NotFound);
    }

    #[test]
    fn resolve_dotted_from_root() {
        let mut tree = ScopeTree::new();
        let outer = tree.get_or_create_path(&["org", "Outer"]);
        tree.insert_class(outer, "Inner", ClassId(3));
        assert_eq!(
            tree.resolve_class("org.Outer.Inner", tree.root()),
            ResolutionResult::Found(ClassId(3))
        );
    }

    #[test]
    fn imports_are_searched_and_ambiguity_reported() {
        let mut tree = ScopeTree::new();
        let a = tree.get_or_create_path(&["a"]);
        let b = tree.get_or_create_path(&["b"]);
        let user = tree.get_or_create_path(&["user"]);
        tree.insert_class(a, "Shared", ClassId(1));
        tree.insert_class(b, "Shared", ClassId(2));

        tree.add_import(user, a);
        assert_eq!(tree.resolve_class("Shared", user), ResolutionResult::Found(ClassId(1)));

        tree.add_import(user, b);
        assert!(matches!(
            tree.resolve_class("Shared", user),
            ResolutionResult::Ambiguous(ref ids) if ids.len() == 2
        ));
    }

    #[test]
    fn duplicate_insert_returns_existing() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        assert_eq!(tree.insert_class(root, "X", ClassId(0)), None);
        assert_eq!(tree.insert_class(root, "X", ClassId(1)), Some(ClassId(0)));
    }
}
