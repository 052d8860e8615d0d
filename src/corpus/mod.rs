//! Corpus-level processing: the four parallel files of a split, the
//! serialized-graph loader, and the batch preprocessing driver.
//!
//! A split is four line-aligned files sharing one prefix:
//!
//! | suffix      | content                                   |
//! |-------------|-------------------------------------------|
//! | `-src.txt`  | linearized graph (model input)            |
//! | `-tgt.txt`  | anonymized, tokenized sentence (output)   |
//! | `-anon.txt` | replacement records, one JSON array/line  |
//! | `-orig.txt` | normalized original sentence              |
//!
//! Every batch step preserves the alignment: a sentence that fails is either
//! dropped from all four files or blanked in all four.

pub mod overlap;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::PreprocessConfig;
use crate::error::{AlignmentError, CorpusError, GraphResult, GraphSeqResult};
use crate::graph::anonymize::anonymize_graph;
use crate::graph::codec::{decode, normalize_unknowns};
use crate::graph::combine::combine_attributes;
use crate::graph::linearize::linearize;
use crate::record::{ReplacementRecord, encode_line};
use crate::sentence::{anonymize_sentence, normalize_sentence};
use crate::tokenize::Tokenizer;

pub const SOURCE_SUFFIX: &str = "-src.txt";
pub const TARGET_SUFFIX: &str = "-tgt.txt";
pub const RECORDS_SUFFIX: &str = "-anon.txt";
pub const ORIGINAL_SUFFIX: &str = "-orig.txt";

/// Record line written for a blanked sentence.
pub const BLANK_RECORDS: &str = "[]";

const SENTENCE_MARKER: &str = "# ::snt ";
const ID_MARKER: &str = "# ::id ";

// ---------------------------------------------------------------------------
// Parallel file convention
// ---------------------------------------------------------------------------

/// Paths of the four parallel files of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelPaths {
    pub source: PathBuf,
    pub target: PathBuf,
    pub records: PathBuf,
    pub original: PathBuf,
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl ParallelPaths {
    /// `data/train` → `data/train-src.txt`, `data/train-tgt.txt`, ...
    pub fn from_prefix(prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        Self {
            source: with_suffix(prefix, SOURCE_SUFFIX),
            target: with_suffix(prefix, TARGET_SUFFIX),
            records: with_suffix(prefix, RECORDS_SUFFIX),
            original: with_suffix(prefix, ORIGINAL_SUFFIX),
        }
    }

    /// Derive the split from any one of its files (`data/train-tgt.txt`).
    pub fn from_member(file: &Path) -> Self {
        let name = file.to_string_lossy();
        let prefix = name.rsplit_once('-').map_or(&*name, |(p, _)| p);
        Self::from_prefix(prefix)
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.source, &self.target, &self.records, &self.original]
    }

    /// Fail on the first file that does not exist.
    pub fn require_existing(&self) -> Result<(), CorpusError> {
        for path in self.all() {
            if !path.exists() {
                return Err(CorpusError::MissingParallelFile {
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

pub fn count_lines(path: &Path) -> Result<usize, CorpusError> {
    let file = File::open(path).map_err(|e| CorpusError::io(path, e))?;
    let mut n = 0;
    for line in BufReader::new(file).lines() {
        line.map_err(|e| CorpusError::io(path, e))?;
        n += 1;
    }
    Ok(n)
}

/// Check that all files have the same number of lines and return it.
pub fn check_aligned<P: AsRef<Path>>(paths: &[P]) -> GraphSeqResult<usize> {
    let mut counts = Vec::with_capacity(paths.len());
    for path in paths {
        counts.push(count_lines(path.as_ref())?);
    }
    let first = counts.first().copied().unwrap_or(0);
    if counts.iter().any(|&c| c != first) {
        return Err(AlignmentError::LineCountMismatch {
            files: paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect(),
            counts,
        }
        .into());
    }
    Ok(first)
}

// ---------------------------------------------------------------------------
// Serialized graph files
// ---------------------------------------------------------------------------

/// One graph as read from a serialized graph file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedGraph {
    /// Comment lines preceding the graph, joined with spaces.
    pub label: String,
    /// Graph lines joined with spaces.
    pub graph: String,
}

impl SerializedGraph {
    /// The sentence, taken from the last `# ::snt` comment. A label without
    /// one is used whole.
    pub fn sentence(&self) -> &str {
        self.label
            .rsplit_once(SENTENCE_MARKER)
            .map_or(self.label.as_str(), |(_, s)| s)
            .trim()
    }

    pub fn id(&self) -> Option<&str> {
        let (_, rest) = self.label.split_once(ID_MARKER)?;
        rest.split_whitespace().next()
    }

    fn describe(&self) -> &str {
        self.id().unwrap_or(&self.label)
    }
}

/// Split serialized text into (label, graph) pairs.
pub fn parse_serialized(text: &str) -> Vec<SerializedGraph> {
    let mut graphs = Vec::new();
    let mut heading = String::new();
    let mut partial: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            if partial.is_empty() {
                if !heading.is_empty() {
                    heading.push(' ');
                }
                heading.push_str(line);
            } else {
                graphs.push(SerializedGraph {
                    label: std::mem::take(&mut heading),
                    graph: partial.join(" "),
                });
                partial.clear();
                heading.push_str(line);
            }
        } else {
            partial.push(line);
        }
    }
    if !partial.is_empty() {
        graphs.push(SerializedGraph {
            label: heading,
            graph: partial.join(" "),
        });
    }
    graphs
}

pub fn load_serialized_from_file(path: &Path) -> Result<Vec<SerializedGraph>, CorpusError> {
    let text = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
    let graphs = parse_serialized(&text);
    tracing::info!(count = graphs.len(), path = %path.display(), "loaded serialized graphs");
    Ok(graphs)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// A graph reduced to model input plus its replacement records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedGraph {
    pub linear: String,
    pub records: Vec<ReplacementRecord>,
}

/// Normalize unknowns, decode, anonymize, combine, linearize.
pub fn preprocess_graph(serialized: &str) -> GraphResult<PreprocessedGraph> {
    let mut graph = decode(&normalize_unknowns(serialized))?;
    let records = anonymize_graph(&mut graph)?;
    combine_attributes(&mut graph)?;
    Ok(PreprocessedGraph {
        linear: linearize(&graph),
        records,
    })
}

/// One aligned output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedSentence {
    pub source: String,
    pub target: String,
    pub records: Vec<ReplacementRecord>,
    pub original: String,
    pub warnings: usize,
}

/// Full per-sentence pipeline: graph side, then sentence side.
pub fn process_sentence(
    item: &SerializedGraph,
    tokenizer: &dyn Tokenizer,
) -> GraphResult<ProcessedSentence> {
    let PreprocessedGraph {
        linear,
        mut records,
    } = preprocess_graph(&item.graph)?;
    let sentence = item.sentence();
    let anonymized = anonymize_sentence(sentence, &mut records, tokenizer);
    Ok(ProcessedSentence {
        source: linear,
        target: anonymized.line(),
        records,
        original: normalize_sentence(sentence),
        warnings: anonymized.warnings.len(),
    })
}

/// Summary of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub warnings: usize,
}

impl CorpusStats {
    /// Skipped / total; zero for an empty batch.
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.skipped as f64 / self.total as f64
        }
    }
}

struct ParallelWriter<'p> {
    paths: &'p ParallelPaths,
    source: BufWriter<File>,
    target: BufWriter<File>,
    records: BufWriter<File>,
    original: BufWriter<File>,
    lines: usize,
}

fn create(path: &Path) -> Result<BufWriter<File>, CorpusError> {
    let file = File::create(path).map_err(|e| CorpusError::io(path, e))?;
    Ok(BufWriter::new(file))
}

impl<'p> ParallelWriter<'p> {
    fn create(paths: &'p ParallelPaths) -> Result<Self, CorpusError> {
        Ok(Self {
            paths,
            source: create(&paths.source)?,
            target: create(&paths.target)?,
            records: create(&paths.records)?,
            original: create(&paths.original)?,
            lines: 0,
        })
    }

    fn write_row(
        &mut self,
        source: &str,
        target: &str,
        records: &str,
        original: &str,
    ) -> Result<(), CorpusError> {
        let p = self.paths;
        writeln!(self.source, "{source}").map_err(|e| CorpusError::io(&p.source, e))?;
        writeln!(self.target, "{target}").map_err(|e| CorpusError::io(&p.target, e))?;
        writeln!(self.records, "{records}").map_err(|e| CorpusError::io(&p.records, e))?;
        writeln!(self.original, "{original}").map_err(|e| CorpusError::io(&p.original, e))?;
        self.lines += 1;
        Ok(())
    }

    fn write(&mut self, row: &ProcessedSentence) -> Result<(), CorpusError> {
        let records = encode_line(&row.records).map_err(|e| CorpusError::Json {
            path: self.paths.records.display().to_string(),
            line: self.lines + 1,
            message: e.to_string(),
        })?;
        self.write_row(&row.source, &row.target, &records, &row.original)
    }

    fn write_blank(&mut self) -> Result<(), CorpusError> {
        self.write_row("", "", BLANK_RECORDS, "")
    }

    fn finish(mut self) -> Result<(), CorpusError> {
        let p = self.paths;
        self.source.flush().map_err(|e| CorpusError::io(&p.source, e))?;
        self.target.flush().map_err(|e| CorpusError::io(&p.target, e))?;
        self.records.flush().map_err(|e| CorpusError::io(&p.records, e))?;
        self.original.flush().map_err(|e| CorpusError::io(&p.original, e))
    }
}

/// Run the full pipeline over `graphs` and write the four parallel files.
///
/// Failed sentences are logged and skipped, or blanked in every file when
/// `output_blank_for_failure` is set. With `parallel`, sentences are
/// processed on the rayon pool and written back in input order.
pub fn create_parallel_files(
    graphs: &[SerializedGraph],
    paths: &ParallelPaths,
    tokenizer: &dyn Tokenizer,
    cfg: &PreprocessConfig,
) -> Result<CorpusStats, CorpusError> {
    tracing::info!(
        graphs = graphs.len(),
        source = %paths.source.display(),
        target = %paths.target.display(),
        records = %paths.records.display(),
        original = %paths.original.display(),
        "preprocessing"
    );

    let mut writer = ParallelWriter::create(paths)?;
    let mut stats = CorpusStats::default();
    let mut emit = |item: &SerializedGraph, result: GraphResult<ProcessedSentence>| {
        stats.total += 1;
        match result {
            Ok(row) => {
                writer.write(&row)?;
                stats.written += 1;
                stats.warnings += row.warnings;
            }
            Err(e) => {
                tracing::warn!(sentence = %item.describe(), error = %e, "deserialization failed, skipping");
                stats.skipped += 1;
                if cfg.output_blank_for_failure {
                    writer.write_blank()?;
                }
            }
        }
        if cfg.progress_interval > 0 && stats.total % cfg.progress_interval == 0 {
            tracing::info!(processed = stats.total, skipped = stats.skipped, "progress");
        }
        Ok::<(), CorpusError>(())
    };

    if cfg.parallel {
        let results: Vec<_> = graphs
            .par_iter()
            .map(|g| process_sentence(g, tokenizer))
            .collect();
        for (item, result) in graphs.iter().zip(results) {
            emit(item, result)?;
        }
    } else {
        for item in graphs {
            emit(item, process_sentence(item, tokenizer))?;
        }
    }
    writer.finish()?;

    tracing::info!(
        written = stats.written,
        skipped = stats.skipped,
        failure_ratio = stats.failure_ratio(),
        span_warnings = stats.warnings,
        "linearized graphs"
    );
    Ok(stats)
}

/// Load a serialized graph file and preprocess it into `prefix`.
pub fn preprocess_file(
    input: &Path,
    prefix: &Path,
    tokenizer: &dyn Tokenizer,
    cfg: &PreprocessConfig,
) -> Result<CorpusStats, CorpusError> {
    let graphs = load_serialized_from_file(input)?;
    create_parallel_files(&graphs, &ParallelPaths::from_prefix(prefix), tokenizer, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::MosesTokenizer;

    const CORPUS: &str = r#"
# ::id 1
# ::snt Kim barked.
(e / _bark_v_1 :lnk "<4:10>" :tense past
   :ARG1 (x / named :carg "Kim" :lnk "<0:3>"))

# ::id 2
# ::snt Broken.
(e / _break_v_1 :ARG1 (x

# ::id 3
# ::snt It rained.
(e / _rain_v_1 :lnk "<3:10>" :tense past)
"#;

    #[test]
    fn prefix_paths() {
        let p = ParallelPaths::from_prefix("data/train");
        assert_eq!(p.source, PathBuf::from("data/train-src.txt"));
        assert_eq!(p.records, PathBuf::from("data/train-anon.txt"));
        assert_eq!(ParallelPaths::from_member(Path::new("data/train-tgt.txt")), p);
    }

    #[test]
    fn loader_splits_labels_and_graphs() {
        let graphs = parse_serialized(CORPUS);
        assert_eq!(graphs.len(), 3);
        assert_eq!(graphs[0].label, "# ::id 1 # ::snt Kim barked.");
        assert_eq!(graphs[0].sentence(), "Kim barked.");
        assert_eq!(graphs[0].id(), Some("1"));
        assert!(graphs[0].graph.starts_with("(e / _bark_v_1"));
        assert!(!graphs[0].graph.contains('\n'));
        assert_eq!(graphs[2].sentence(), "It rained.");
    }

    #[test]
    fn preprocess_graph_produces_linear_form_and_records() {
        let graphs = parse_serialized(CORPUS);
        let out = preprocess_graph(&graphs[0].graph).unwrap();
        assert!(out.linear.contains("named0"));
        assert!(out.linear.contains("_bark_v_1\u{FFE8}tense=PAST"));
        assert_eq!(out.records, [ReplacementRecord::new("named0", [0, 3], "Kim")]);
    }

    #[test]
    fn process_sentence_fills_realized() {
        let graphs = parse_serialized(CORPUS);
        let row = process_sentence(&graphs[0], &MosesTokenizer::new()).unwrap();
        assert_eq!(row.target, "named0 barked .");
        assert_eq!(row.original, "Kim barked.");
        assert_eq!(row.records[0].realized.as_deref(), Some("Kim"));
    }

    #[test]
    fn failures_are_skipped_or_blanked() {
        let dir = tempfile::TempDir::new().unwrap();
        let graphs = parse_serialized(CORPUS);
        let tok = MosesTokenizer::new();

        let skip = ParallelPaths::from_prefix(dir.path().join("skip"));
        let stats =
            create_parallel_files(&graphs, &skip, &tok, &PreprocessConfig::default()).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.written, 2);
        assert_eq!(stats.skipped, 1);
        assert!((stats.failure_ratio() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(check_aligned(&skip.all()).unwrap(), 2);

        let blank = ParallelPaths::from_prefix(dir.path().join("blank"));
        let cfg = PreprocessConfig {
            output_blank_for_failure: true,
            ..Default::default()
        };
        create_parallel_files(&graphs, &blank, &tok, &cfg).unwrap();
        assert_eq!(check_aligned(&blank.all()).unwrap(), 3);
        let anon = std::fs::read_to_string(&blank.records).unwrap();
        assert_eq!(anon.lines().nth(1), Some("[]"));
        let tgt = std::fs::read_to_string(&blank.target).unwrap();
        assert_eq!(tgt.lines().nth(1), Some(""));
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let dir = tempfile::TempDir::new().unwrap();
        let graphs = parse_serialized(CORPUS);
        let tok = MosesTokenizer::new();
        let seq = ParallelPaths::from_prefix(dir.path().join("seq"));
        let par = ParallelPaths::from_prefix(dir.path().join("par"));
        create_parallel_files(&graphs, &seq, &tok, &PreprocessConfig::default()).unwrap();
        let cfg = PreprocessConfig {
            parallel: true,
            ..Default::default()
        };
        create_parallel_files(&graphs, &par, &tok, &cfg).unwrap();
        for (a, b) in seq.all().iter().zip(par.all()) {
            assert_eq!(std::fs::read_to_string(a).unwrap(), std::fs::read_to_string(b).unwrap());
        }
    }

    #[test]
    fn misaligned_files_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "x\ny\n").unwrap();
        std::fs::write(&b, "x\n").unwrap();
        assert!(check_aligned(&[&a, &b]).is_err());
    }

    #[test]
    fn missing_parallel_file_is_named() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = ParallelPaths::from_prefix(dir.path().join("none"));
        match paths.require_existing() {
            Err(CorpusError::MissingParallelFile { path }) => assert!(path.ends_with("none-src.txt")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
