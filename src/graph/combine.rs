//! Fold per-node property edges into a feature string on the type token.
//!
//! `(x / _window_n_1 :pers 3 :num sg :ind +)` becomes a single instance
//! target `_window_n_1￨ind=+|num=SG|pers=3`. The `￨` separator marks the
//! start of the node's word features and is distinct from the `|` that joins
//! the individual features.

use super::{Graph, INSTANCE, SPAN, Target, Triple};
use crate::error::{GraphError, GraphResult};

/// Separates a token from its feature slot.
pub const FEATURE_SEP: char = '\u{FFE8}';
/// Joins individual features inside one slot.
pub const FEATURE_JOIN: char = '|';
/// Feature slot value for tokens that carry no features.
pub const EMPTY_FEATURE: &str = "_";

/// Combine the attributes of every node in place.
///
/// Consumed attribute edges are removed. `lnk` spans and `tense=UNTENSED`
/// are dropped. Returns the number of nodes that received features; nodes
/// with nothing to combine keep their bare type.
pub fn combine_attributes(graph: &mut Graph) -> GraphResult<usize> {
    let nodes: Vec<_> = graph.nodes().collect();
    let mut featurized = 0;

    for node in nodes {
        let attrs: Vec<_> = graph
            .attributes(None, Some(node))
            .into_iter()
            .filter(|&e| graph.get(e).is_some_and(|t| t.relation != INSTANCE))
            .collect();

        let mut features = Vec::with_capacity(attrs.len());
        for edge in attrs {
            let triple = graph.remove(edge)?;
            let value = triple.constant().unwrap_or_default().to_uppercase();
            if triple.relation == SPAN || (triple.relation == "tense" && value == "UNTENSED") {
                continue;
            }
            features.push(format!("{}={}", triple.relation, value));
        }
        if features.is_empty() {
            continue;
        }
        features.sort();

        let instance = graph.instance(node)?;
        let old = graph
            .get(instance)
            .cloned()
            .ok_or(GraphError::UnknownEdge {
                edge: instance.index(),
            })?;
        let ty = old.constant().unwrap_or_default();
        let joined = features.join(&FEATURE_JOIN.to_string());
        let target = Target::Constant(format!("{ty}{FEATURE_SEP}{joined}"));
        let combined = Triple { target, ..old };
        graph.replace(instance, combined)?;
        featurized += 1;
    }
    Ok(featurized)
}
