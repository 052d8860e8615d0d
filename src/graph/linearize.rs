//! Pre-order linearization of a (combined, anonymized) graph.
//!
//! ```text
//! ( _open_v_1￨tense=PAST ARG1-NEQ ( _window_n_1￨num=SG RSTR-H-of ( _the_q ) ) )
//! ```
//!
//! Each node opens with `(`, emits its type token, then its branches, then
//! `)`. The output is post-processed so that every whitespace-delimited
//! token has exactly one feature slot: tokens without features get `￨_`.

use super::combine::{EMPTY_FEATURE, FEATURE_SEP};
use super::{COMBINED_ATTRIBUTES, EdgeId, Graph, INSTANCE, NodeId, Target, invert_relation};

/// Traversal state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    /// On the current recursion path.
    InProgress,
    Done,
}

/// Pre-order encoder over one graph.
pub struct Linearizer<'g> {
    graph: &'g Graph,
    state: Vec<VisitState>,
}

impl<'g> Linearizer<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            state: vec![VisitState::Unvisited; graph.node_count()],
        }
    }

    pub fn state(&self, node: NodeId) -> VisitState {
        self.state[node.index()]
    }

    /// Linearize from the top, then from every node not reached yet.
    pub fn run(mut self) -> String {
        let starts: Vec<NodeId> = self.graph.top().into_iter().chain(self.graph.nodes()).collect();
        let mut exprs = Vec::new();
        for node in starts {
            if self.state(node) == VisitState::Unvisited {
                exprs.push(self.layout(node));
            }
        }
        featurize(&exprs.join(" "))
    }

    fn type_token(&self, node: NodeId) -> String {
        self.graph
            .node_type(node)
            .unwrap_or_else(|| self.graph.var(node))
            .to_string()
    }

    /// Branches of `node` with their emitted labels: instance first, the
    /// rest ordered by label (stable).
    fn ordered_branches(&self, node: NodeId) -> Vec<(EdgeId, String)> {
        let mut branches: Vec<(EdgeId, String)> = self
            .graph
            .branches(node)
            .iter()
            .filter_map(|&id| {
                let t = self.graph.get(id)?;
                let label = if t.inverted {
                    invert_relation(&t.relation)
                } else {
                    t.relation.clone()
                };
                Some((id, label))
            })
            .collect();
        branches.sort_by_key(|(_, label)| (label != INSTANCE, label.clone()));
        branches
    }

    fn layout(&mut self, node: NodeId) -> String {
        if self.state(node) != VisitState::Unvisited {
            return self.type_token(node);
        }
        self.state[node.index()] = VisitState::InProgress;

        let mut head = None;
        let mut parts = Vec::new();
        for (id, label) in self.ordered_branches(node) {
            let Some(triple) = self.graph.get(id) else {
                continue;
            };
            if triple.relation == INSTANCE && !triple.inverted {
                head = triple.constant().map(str::to_string);
                continue;
            }
            let target = if triple.inverted {
                Target::Node(triple.source)
            } else {
                triple.target.clone()
            };
            match target {
                Target::Node(next) => {
                    let branch = self.layout(next);
                    parts.push(format!("{label} {branch}"));
                }
                Target::Constant(value) if triple.relation == COMBINED_ATTRIBUTES => {
                    parts.push(value);
                }
                Target::Constant(value) => parts.push(format!("{label}={value}")),
            }
        }
        self.state[node.index()] = VisitState::Done;

        let head = head.unwrap_or_else(|| self.graph.var(node).to_string());
        let mut out = String::from("( ");
        out.push_str(&head);
        for part in parts {
            out.push(' ');
            out.push_str(&part);
        }
        out.push_str(" )");
        out
    }
}

/// Give every token exactly one feature slot.
pub fn featurize(linear: &str) -> String {
    linear
        .split_whitespace()
        .map(|token| {
            if token.contains(FEATURE_SEP) {
                token.to_string()
            } else {
                format!("{token}{FEATURE_SEP}{EMPTY_FEATURE}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Linearize a graph into a single line.
pub fn linearize(graph: &Graph) -> String {
    Linearizer::new(graph).run()
}
