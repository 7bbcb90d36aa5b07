use super::{Node, NodeKind};
use std::collections::{HashMap, HashSet};

/// Receiver for the emission protocol
///
/// The projector never holds graph state of its own; every node and edge goes
/// through this trait the moment it is decided. Parent id `0` in
/// [`attach_node`](GraphSink::attach_node) is a sentinel for "the most
/// recently created METHOD node" (sequence numbers start at 1).
pub trait GraphSink {
    /// Record a node without attaching it anywhere yet
    fn create_free_node(&mut self, node: Node);

    /// Record a node and an edge from `parent` to it (0 = current method root)
    fn attach_node(&mut self, parent: usize, node: Node);

    /// Record an edge between two already-known nodes
    fn join_nodes(&mut self, parent: usize, child: usize);

    /// Whether a node with this sequence number has been recorded
    fn is_known_node(&self, id: usize) -> bool;

    /// Patch a property of an already-recorded node
    ///
    /// The only property ever patched is `name`, when a tentative IF root
    /// turns out to close a loop.
    fn update_node_property(&mut self, id: usize, key: &str, value: &str);

    /// Next free sequence number (numbering resumes across classes)
    fn next_order(&self) -> usize;
}

/// In-memory graph, the reference sink
///
/// Keeps nodes by id and edges in insertion order, so children of a node come
/// back in the order they were attached. Doubles as the query surface for
/// tests and the CLI printer.
#[derive(Default)]
pub struct MemoryGraph {
    nodes: HashMap<usize, Node>,
    edges: Vec<(usize, usize)>,
    method_root: Option<usize>,
}

impl MemoryGraph {
    pub fn new() -> MemoryGraph {
        MemoryGraph::default()
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Direct children of a node, in attachment order
    pub fn children(&self, id: usize) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|(parent, _)| *parent == id)
            .filter_map(|(_, child)| self.nodes.get(child))
            .collect()
    }

    /// First direct child matching kind and name
    pub fn child_named(&self, parent: usize, kind: NodeKind, name: &str) -> Option<&Node> {
        self.children(parent)
            .into_iter()
            .find(|n| n.kind() == kind && n.name() == name)
    }

    /// All nodes (anywhere) matching kind and name
    pub fn find_all(&self, kind: NodeKind, name: &str) -> Vec<&Node> {
        let mut found: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.kind() == kind && n.name() == name)
            .collect();
        found.sort_by_key(|n| n.id());
        found
    }

    /// The subtree below a node (the node itself excluded), preorder
    pub fn descendants(&self, id: usize) -> Vec<&Node> {
        let mut found = vec![];
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            for (parent, child) in &self.edges {
                if *parent == next {
                    if let Some(node) = self.nodes.get(child) {
                        found.push(node);
                    }
                    pending.push(*child);
                }
            }
        }
        found.sort_by_key(|n| n.id());
        found
    }

    /// First descendant matching kind and name
    pub fn descendant_named(&self, root: usize, kind: NodeKind, name: &str) -> Option<&Node> {
        self.descendants(root)
            .into_iter()
            .find(|n| n.kind() == kind && n.name() == name)
    }

    /// Number of descendants matching kind and name
    pub fn count_descendants(&self, root: usize, kind: NodeKind, name: &str) -> usize {
        self.descendants(root)
            .iter()
            .filter(|n| n.kind() == kind && n.name() == name)
            .count()
    }

    /// METHOD node by full name
    pub fn method(&self, full_name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| match n {
            Node::Method { full_name: fname, .. } => fname == full_name,
            _ => false,
        })
    }

    /// Nodes with no incoming edge, in id order
    pub fn roots(&self) -> Vec<&Node> {
        let attached: HashSet<usize> = self.edges.iter().map(|(_, child)| *child).collect();
        let mut roots: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| !attached.contains(&n.id()))
            .collect();
        roots.sort_by_key(|n| n.id());
        roots
    }

    /// Indented textual rendering of the subtree below a node
    pub fn render_tree(&self, root: usize, out: &mut String) {
        self.render_indented(root, 0, out);
    }

    fn render_indented(&self, id: usize, depth: usize, out: &mut String) {
        if let Some(node) = self.nodes.get(&id) {
            for _ in 0..depth {
                out.push_str("  ");
            }
            out.push_str(&node.to_string());
            out.push('\n');
        }
        let children: Vec<usize> = self
            .edges
            .iter()
            .filter(|(parent, _)| *parent == id)
            .map(|(_, child)| *child)
            .collect();
        for child in children {
            self.render_indented(child, depth + 1, out);
        }
    }

    fn resolve_parent(&self, parent: usize) -> Option<usize> {
        if parent == 0 {
            self.method_root
        } else {
            Some(parent)
        }
    }
}

impl GraphSink for MemoryGraph {
    fn create_free_node(&mut self, node: Node) {
        if let Node::Method { .. } = node {
            self.method_root = Some(node.id());
        }
        log::debug!("Node: {}", node);
        self.nodes.insert(node.id(), node);
    }

    fn attach_node(&mut self, parent: usize, node: Node) {
        let id = node.id();
        self.create_free_node(node);
        match self.resolve_parent(parent) {
            Some(parent) => self.edges.push((parent, id)),
            None => log::warn!("No method root to attach node #{} to", id),
        }
    }

    fn join_nodes(&mut self, parent: usize, child: usize) {
        self.edges.push((parent, child));
    }

    fn is_known_node(&self, id: usize) -> bool {
        self.nodes.contains_key(&id)
    }

    fn update_node_property(&mut self, id: usize, key: &str, value: &str) {
        match self.nodes.get_mut(&id) {
            Some(Node::Block { name, .. }) if key == "name" => *name = value.to_owned(),
            Some(node) => log::warn!("Cannot update '{}' of {}", key, node),
            None => log::warn!("Cannot update '{}' of unknown node #{}", key, id),
        }
    }

    fn next_order(&self) -> usize {
        self.nodes.keys().max().map_or(1, |max| max + 1)
    }
}
