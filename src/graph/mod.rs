//! Semantic graph model: variables, typed edges, and constant attributes.
//!
//! A [`Graph`] is an arena of nodes plus an arena of [`Triple`]s addressed by
//! stable [`EdgeId`]s. Two orderings are maintained side by side:
//!
//! - the **global triple order**, i.e. the order triples were decoded in.
//!   Anonymization counters and tie-breaks depend on it, so every edit keeps it
//!   stable.
//! - a **branch index** per node: the edges serialized *under* that node
//!   (the source of a normal edge, the target of an inverted one). The
//!   linearizer walks this index.
//!
//! Edits go through [`Graph::insert_before`], [`Graph::remove`] and
//! [`Graph::replace`], which update both orderings together.

pub mod anonymize;
pub mod codec;
pub mod combine;
pub mod linearize;

use std::collections::HashMap;

use crate::error::{GraphError, GraphResult};

/// Relation carrying a node's semantic type.
pub const INSTANCE: &str = "instance";
/// Relation carrying the `<start:end>` character span of a node.
pub const SPAN: &str = "lnk";
/// Relation carrying the literal surface value of a named/constant node.
pub const CONSTANT: &str = "carg";
/// Relation of the special combined-attribute branch, emitted without a label.
pub const COMBINED_ATTRIBUTES: &str = "attributes";

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable identifier of a triple. Survives edits to other triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The far end of a triple: another node, or a constant kept verbatim
/// (quoted strings keep their quotes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    Constant(String),
}

/// A directed, labeled edge in canonical direction.
///
/// `inverted` records that the edge was serialized under its target
/// (`:rel-of`), which decides which node's branch list owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub source: NodeId,
    pub relation: String,
    pub target: Target,
    pub inverted: bool,
}

impl Triple {
    pub fn new(source: NodeId, relation: impl Into<String>, target: Target) -> Self {
        Self {
            source,
            relation: relation.into(),
            target,
            inverted: false,
        }
    }

    /// An attribute triple `source :relation value`.
    pub fn attribute(source: NodeId, relation: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(source, relation, Target::Constant(value.into()))
    }

    /// Mark the triple as serialized under its target.
    pub fn inverted(mut self) -> Self {
        self.inverted = matches!(self.target, Target::Node(_));
        self
    }

    /// The node this triple is serialized under.
    pub fn owner(&self) -> NodeId {
        match (self.inverted, &self.target) {
            (true, Target::Node(n)) => *n,
            _ => self.source,
        }
    }

    /// The constant value, if the target is not a node.
    pub fn constant(&self) -> Option<&str> {
        match &self.target {
            Target::Constant(v) => Some(v),
            Target::Node(_) => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.target, Target::Constant(_))
    }
}

/// Flip a relation label between its forward and `-of` form.
pub fn invert_relation(relation: &str) -> String {
    match relation.strip_suffix("-of") {
        Some(forward) if !forward.is_empty() => forward.to_string(),
        _ => format!("{relation}-of"),
    }
}

/// Strip surrounding double quotes from a constant.
pub fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

#[derive(Debug, Clone)]
struct Node {
    var: String,
    branches: Vec<EdgeId>,
}

/// A decoded semantic graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    vars: HashMap<String, NodeId>,
    edges: Vec<Option<Triple>>,
    order: Vec<EdgeId>,
    top: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `var`, or return the existing one.
    pub fn add_node(&mut self, var: impl Into<String>) -> NodeId {
        let var = var.into();
        if let Some(&id) = self.vars.get(&var) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            var: var.clone(),
            branches: Vec::new(),
        });
        self.vars.insert(var, id);
        if self.top.is_none() {
            self.top = Some(id);
        }
        id
    }

    pub fn node(&self, var: &str) -> Option<NodeId> {
        self.vars.get(var).copied()
    }

    pub fn var(&self, node: NodeId) -> &str {
        &self.nodes[node.0].var
    }

    pub fn top(&self) -> Option<NodeId> {
        self.top
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in arena (first-definition) order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Number of live triples.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, edge: EdgeId) -> Option<&Triple> {
        self.edges.get(edge.0).and_then(|t| t.as_ref())
    }

    fn expect_edge(&self, edge: EdgeId) -> GraphResult<&Triple> {
        self.get(edge)
            .ok_or(GraphError::UnknownEdge { edge: edge.0 })
    }

    /// Live triples in global order.
    pub fn triples(&self) -> impl Iterator<Item = (EdgeId, &Triple)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.get(id).map(|t| (id, t)))
    }

    /// Append a triple at the end of the global order.
    pub fn push(&mut self, triple: Triple) -> EdgeId {
        let id = EdgeId(self.edges.len());
        let owner = triple.owner();
        self.edges.push(Some(triple));
        self.order.push(id);
        self.nodes[owner.0].branches.push(id);
        id
    }

    /// Insert `triple` immediately before `anchor` in the global order.
    ///
    /// In the owner's branch list the new edge lands before the first branch
    /// that follows `anchor` globally, so both orderings stay consistent.
    pub fn insert_before(&mut self, anchor: EdgeId, triple: Triple) -> GraphResult<EdgeId> {
        self.expect_edge(anchor)?;
        let pos = self
            .order
            .iter()
            .position(|&e| e == anchor)
            .ok_or(GraphError::UnknownEdge { edge: anchor.0 })?;

        let id = EdgeId(self.edges.len());
        let owner = triple.owner();
        self.edges.push(Some(triple));
        self.order.insert(pos, id);

        let rank: HashMap<EdgeId, usize> =
            self.order.iter().enumerate().map(|(i, &e)| (e, i)).collect();
        let branches = &mut self.nodes[owner.0].branches;
        let at = branches
            .iter()
            .position(|e| rank.get(e).is_some_and(|&r| r > pos))
            .unwrap_or(branches.len());
        branches.insert(at, id);
        Ok(id)
    }

    /// Remove a triple, returning it. Its id becomes invalid.
    pub fn remove(&mut self, edge: EdgeId) -> GraphResult<Triple> {
        let triple = self
            .edges
            .get_mut(edge.0)
            .and_then(Option::take)
            .ok_or(GraphError::UnknownEdge { edge: edge.0 })?;
        self.order.retain(|&e| e != edge);
        self.nodes[triple.owner().0].branches.retain(|&e| e != edge);
        Ok(triple)
    }

    /// Swap a triple for a new one at the same position.
    pub fn replace(&mut self, edge: EdgeId, triple: Triple) -> GraphResult<EdgeId> {
        let id = self.insert_before(edge, triple)?;
        self.remove(edge)?;
        Ok(id)
    }

    /// Attribute triples (constant targets), optionally filtered by relation
    /// and source node, in global order.
    pub fn attributes(&self, relation: Option<&str>, source: Option<NodeId>) -> Vec<EdgeId> {
        self.triples()
            .filter(|(_, t)| t.is_attribute())
            .filter(|(_, t)| relation.is_none_or(|r| t.relation == r))
            .filter(|(_, t)| source.is_none_or(|s| t.source == s))
            .map(|(id, _)| id)
            .collect()
    }

    /// All triples whose canonical source is `node`, in global order.
    pub fn edges_from(&self, node: NodeId) -> Vec<EdgeId> {
        self.triples()
            .filter(|(_, t)| t.source == node)
            .map(|(id, _)| id)
            .collect()
    }

    /// Triples serialized under `node`, in branch order.
    pub fn branches(&self, node: NodeId) -> &[EdgeId] {
        &self.nodes[node.0].branches
    }

    /// The single `instance` edge of `node`.
    pub fn instance(&self, node: NodeId) -> GraphResult<EdgeId> {
        let found = self.attributes(Some(INSTANCE), Some(node));
        match found.as_slice() {
            [one] => Ok(*one),
            [] => Err(GraphError::MissingInstance {
                var: self.var(node).to_string(),
            }),
            many => Err(GraphError::MultipleInstances {
                var: self.var(node).to_string(),
                count: many.len(),
            }),
        }
    }

    /// The node's type token (the `instance` target), if it has exactly one.
    pub fn node_type(&self, node: NodeId) -> Option<&str> {
        self.instance(node)
            .ok()
            .and_then(|e| self.get(e))
            .and_then(Triple::constant)
    }

    /// Check that every node carries exactly one `instance` edge.
    pub fn validate(&self) -> GraphResult<()> {
        for node in self.nodes() {
            self.instance(node)?;
        }
        Ok(())
    }
}
