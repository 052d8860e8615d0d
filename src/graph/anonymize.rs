//! Named-entity anonymization over the graph.
//!
//! Every node with a `carg` literal gets its type replaced by a placeholder
//! `<type><n>` (`named0`, `card1`, `UNKfoxes0`), and one
//! [`ReplacementRecord`] is emitted carrying the literal and its character
//! span in the original sentence.

use std::collections::HashMap;

use super::{CONSTANT, Graph, SPAN, Target, Triple, unquote};
use crate::error::{GraphError, GraphResult};
use crate::record::ReplacementRecord;

/// Per-graph placeholder counters.
///
/// Counters are zero-based per type and live only as long as the context, so
/// two graphs never share numbering unless the caller passes the same context.
#[derive(Debug, Clone, Default)]
pub struct AnonymizationContext {
    counters: HashMap<String, usize>,
}

impl AnonymizationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next placeholder for `named_type`.
    pub fn next_placeholder(&mut self, named_type: &str) -> String {
        let counter = self.counters.entry(named_type.to_string()).or_insert(0);
        let placeholder = format!("{named_type}{counter}");
        *counter += 1;
        placeholder
    }
}

/// Parse a `"<start:end>"` span constant. Reversed spans are rejected.
pub fn parse_span(raw: &str) -> Option<[usize; 2]> {
    let inner = unquote(raw).strip_prefix('<')?.strip_suffix('>')?;
    let (start, end) = inner.split_once(':')?;
    let (start, end): (usize, usize) = (start.trim().parse().ok()?, end.trim().parse().ok()?);
    (start <= end).then_some([start, end])
}

/// Anonymize a graph with a fresh context.
pub fn anonymize_graph(graph: &mut Graph) -> GraphResult<Vec<ReplacementRecord>> {
    anonymize_with(graph, &mut AnonymizationContext::new())
}

/// Anonymize every `carg` node, in global triple order.
pub fn anonymize_with(
    graph: &mut Graph,
    ctx: &mut AnonymizationContext,
) -> GraphResult<Vec<ReplacementRecord>> {
    let mut records = Vec::new();

    for carg in graph.attributes(Some(CONSTANT), None) {
        let Some(carg_triple) = graph.get(carg).cloned() else {
            continue;
        };
        let node = carg_triple.source;
        let instance = graph.instance(node)?;
        let named = graph
            .get(instance)
            .cloned()
            .ok_or(GraphError::UnknownEdge {
                edge: instance.index(),
            })?;
        let named_type = named.constant().unwrap_or_default().replace('_', "");
        let value = unquote(carg_triple.constant().unwrap_or_default()).to_string();

        let var = graph.var(node).to_string();
        let span_edge = graph
            .attributes(Some(SPAN), Some(node))
            .first()
            .copied()
            .ok_or_else(|| GraphError::MissingSpan { var: var.clone() })?;
        let raw_span = graph
            .get(span_edge)
            .and_then(Triple::constant)
            .unwrap_or_default();
        let span = parse_span(raw_span).ok_or_else(|| GraphError::InvalidSpan {
            var,
            raw: raw_span.to_string(),
        })?;

        let placeholder = ctx.next_placeholder(&named_type);
        records.push(ReplacementRecord::new(placeholder.clone(), span, value));

        let renamed = Triple {
            target: Target::Constant(placeholder),
            ..named
        };
        graph.replace(instance, renamed)?;
        graph.remove(carg)?;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::codec::decode;

    const KIM_AND_SANDY: &str = r#"(e / _meet_v_1 :lnk "<4:8>"
        :ARG1 (x1 / named :carg "Kim" :lnk "<0:3>")
        :ARG2 (x2 / named :carg "Sandy" :lnk "<9:14>")
        :ARG3 (x3 / card :carg "2" :lnk "<18:21>"))"#;

    #[test]
    fn placeholders_count_per_type() {
        let mut g = decode(KIM_AND_SANDY).unwrap();
        let records = anonymize_graph(&mut g).unwrap();
        let phs: Vec<&str> = records.iter().map(|r| r.placeholder.as_str()).collect();
        assert_eq!(phs, ["named0", "named1", "card0"]);
        assert_eq!(records[0].value, "Kim");
        assert_eq!(records[0].span, [0, 3]);
        assert_eq!(records[1].span, [9, 14]);
        assert!(records.iter().all(|r| r.realized.is_none()));
    }

    #[test]
    fn instance_is_replaced_and_carg_removed() {
        let mut g = decode(KIM_AND_SANDY).unwrap();
        anonymize_graph(&mut g).unwrap();
        let x2 = g.node("x2").unwrap();
        assert_eq!(g.node_type(x2), Some("named1"));
        assert!(g.attributes(Some(CONSTANT), None).is_empty());
        // lnk stays for the sentence side
        assert_eq!(g.attributes(Some(SPAN), Some(x2)).len(), 1);
    }

    #[test]
    fn underscores_are_stripped_from_type() {
        let mut g = decode(r#"(x / _unknown_ :carg "Zorp" :lnk "<0:4>")"#).unwrap();
        let records = anonymize_graph(&mut g).unwrap();
        assert_eq!(records[0].placeholder, "unknown0");
    }

    #[test]
    fn anonymization_is_deterministic() {
        let run = || {
            let mut g = decode(KIM_AND_SANDY).unwrap();
            anonymize_graph(&mut g).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn shared_context_continues_numbering() {
        let mut ctx = AnonymizationContext::new();
        let mut a = decode(KIM_AND_SANDY).unwrap();
        let mut b = decode(KIM_AND_SANDY).unwrap();
        anonymize_with(&mut a, &mut ctx).unwrap();
        let second = anonymize_with(&mut b, &mut ctx).unwrap();
        assert_eq!(second[0].placeholder, "named2");
    }

    #[test]
    fn inverted_structural_edge_survives() {
        let mut g = decode(
            r#"(e / _see_v_1 :ARG1-of (x / named :carg "Kim" :lnk "<0:3>"))"#,
        )
        .unwrap();
        anonymize_graph(&mut g).unwrap();
        let x = g.node("x").unwrap();
        let e = g.node("e").unwrap();
        // the structural edge stays under `e`
        assert!(g
            .branches(e)
            .iter()
            .filter_map(|&id| g.get(id))
            .any(|t| t.inverted && t.source == x));
        assert_eq!(g.node_type(x), Some("named0"));
    }

    #[test]
    fn missing_span_fails() {
        let mut g = decode(r#"(x / named :carg "Kim")"#).unwrap();
        assert!(matches!(
            anonymize_graph(&mut g),
            Err(GraphError::MissingSpan { .. })
        ));
    }

    #[test]
    fn invalid_span_fails() {
        let mut g = decode(r#"(x / named :carg "Kim" :lnk "0-3")"#).unwrap();
        assert!(matches!(
            anonymize_graph(&mut g),
            Err(GraphError::InvalidSpan { .. })
        ));
    }

    #[test]
    fn parse_span_accepts_quoted_and_bare() {
        assert_eq!(parse_span("\"<5:10>\""), Some([5, 10]));
        assert_eq!(parse_span("<0:3>"), Some([0, 3]));
        assert_eq!(parse_span("\"<a:3>\""), None);
    }

    #[test]
    fn reversed_span_fails() {
        assert_eq!(parse_span("<7:3>"), None);
        assert_eq!(parse_span("<4:4>"), Some([4, 4]));
        let mut g = decode(r#"(x / named :carg "Kim" :lnk "<7:3>")"#).unwrap();
        assert!(matches!(
            anonymize_graph(&mut g),
            Err(GraphError::InvalidSpan { .. })
        ));
    }
}
