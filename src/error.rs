//! Rich diagnostic error types for graphseq.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type for graphseq.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphSeqError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

/// Decode failures: the serialized graph is unparseable or structurally invalid.
///
/// These are per-sentence failures. The batch driver catches them, logs the
/// sentence id, and skips (or blanks) the sentence.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("unbalanced brackets: {open} opened, {closed} closed")]
    #[diagnostic(
        code(graphseq::graph::unbalanced),
        help(
            "Every node must be wrapped in a matching pair of parentheses. \
             Check that the serialization was not truncated."
        )
    )]
    UnbalancedBrackets { open: usize, closed: usize },

    #[error("unexpected token \"{token}\" at offset {offset}")]
    #[diagnostic(
        code(graphseq::graph::unexpected_token),
        help("Expected `(var / type :relation value ...)` notation.")
    )]
    UnexpectedToken { token: String, offset: usize },

    #[error("unexpected end of input while reading {expected}")]
    #[diagnostic(
        code(graphseq::graph::unexpected_end),
        help("The serialized graph ends in the middle of a node.")
    )]
    UnexpectedEnd { expected: String },

    #[error("node \"{var}\" has no instance edge")]
    #[diagnostic(
        code(graphseq::graph::missing_instance),
        help("Each node must declare its type: `({var} / some_type ...)`.")
    )]
    MissingInstance { var: String },

    #[error("node \"{var}\" has {count} instance edges")]
    #[diagnostic(
        code(graphseq::graph::multiple_instances),
        help("A variable may be defined only once. Use a bare reference for reentrancies.")
    )]
    MultipleInstances { var: String, count: usize },

    #[error("constant node \"{var}\" has no lnk span")]
    #[diagnostic(
        code(graphseq::graph::missing_span),
        help(
            "Anonymized nodes need a `:lnk \"<start:end>\"` attribute so the \
             placeholder can be located in the sentence."
        )
    )]
    MissingSpan { var: String },

    #[error("invalid lnk span \"{raw}\" on node \"{var}\"")]
    #[diagnostic(
        code(graphseq::graph::invalid_span),
        help("Spans are written as `\"<start:end>\"` with non-negative integers.")
    )]
    InvalidSpan { var: String, raw: String },

    #[error("edge {edge} does not exist or was removed")]
    #[diagnostic(
        code(graphseq::graph::unknown_edge),
        help("Edge ids are stable but become invalid once the edge is removed.")
    )]
    UnknownEdge { edge: usize },
}

// ---------------------------------------------------------------------------
// Alignment errors
// ---------------------------------------------------------------------------

/// Parallel files disagree. Fatal for the batch step.
#[derive(Debug, Error, Diagnostic)]
pub enum AlignmentError {
    #[error("parallel files have different line counts: {}", describe_counts(.files, .counts))]
    #[diagnostic(
        code(graphseq::alignment::line_count),
        help(
            "The i-th line of every parallel file must describe the same sentence. \
             Regenerate the files with `graphseq preprocess` instead of editing them by hand."
        )
    )]
    LineCountMismatch {
        files: Vec<String>,
        counts: Vec<usize>,
    },

    #[error("no replacement records for prediction line {line}")]
    #[diagnostic(
        code(graphseq::alignment::missing_records),
        help(
            "The prediction file has more lines than the -anon file. \
             Make sure both come from the same corpus split."
        )
    )]
    MissingRecords { line: usize },
}

fn describe_counts(files: &[String], counts: &[usize]) -> String {
    files
        .iter()
        .zip(counts)
        .map(|(f, c)| format!("{f}={c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Corpus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CorpusError {
    #[error("I/O error on {path}")]
    #[diagnostic(
        code(graphseq::corpus::io),
        help("Check that the file exists and that you have read/write permissions.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path} line {line}: {message}")]
    #[diagnostic(
        code(graphseq::corpus::json),
        help("Record files hold one JSON array per line, as written by `graphseq preprocess`.")
    )]
    Json {
        path: String,
        line: usize,
        message: String,
    },

    #[error("malformed vocabulary entry in {path} line {line}")]
    #[diagnostic(
        code(graphseq::corpus::vocab_format),
        help("Vocabulary lines are `token<TAB>frequency`.")
    )]
    VocabFormat { path: String, line: usize },

    #[error("required parallel file not found: {path}")]
    #[diagnostic(
        code(graphseq::corpus::missing_parallel_file),
        help(
            "Parallel files share one prefix: <prefix>-src.txt, <prefix>-tgt.txt, \
             <prefix>-anon.txt and <prefix>-orig.txt."
        )
    )]
    MissingParallelFile { path: String },
}

impl CorpusError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Convenience alias for functions returning graphseq results.
pub type GraphSeqResult<T> = std::result::Result<T, GraphSeqError>;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_top_level() {
        let err = GraphError::MissingInstance { var: "x1".into() };
        let top: GraphSeqError = err.into();
        assert!(matches!(
            top,
            GraphSeqError::Graph(GraphError::MissingInstance { .. })
        ));
    }

    #[test]
    fn line_count_mismatch_names_every_file() {
        let err = AlignmentError::LineCountMismatch {
            files: vec!["a-src.txt".into(), "a-tgt.txt".into()],
            counts: vec![3, 4],
        };
        let msg = format!("{err}");
        assert!(msg.contains("a-src.txt=3"));
        assert!(msg.contains("a-tgt.txt=4"));
    }
}
