//! Rare-placeholder compression.
//!
//! Out-of-vocabulary `UNK<word><n>` placeholders are renamed to a small
//! closed set (`_UNK0`, `_UNK1`, ... restarting on every line) in the target
//! line, the source line, and the records, in lockstep.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::CompressConfig;
use crate::corpus::{ParallelPaths, check_aligned};
use crate::error::{CorpusError, GraphSeqResult};
use crate::graph::combine::FEATURE_SEP;
use crate::record::{ReplacementRecord, decode_line, encode_line};
use crate::vocab::Vocabulary;

/// Outcome of compressing one file triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressStats {
    pub lines: usize,
    pub replaced: usize,
}

/// One aligned sentence after compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedLine {
    pub target: String,
    pub source: String,
    pub records: Vec<ReplacementRecord>,
    pub replaced: usize,
}

fn rename_source_token(token: &str, renames: &HashMap<String, String>) -> String {
    let (head, tail) = match token.find(FEATURE_SEP) {
        Some(i) => token.split_at(i),
        None => (token, ""),
    };
    match renames.get(head) {
        Some(new) => format!("{new}{tail}"),
        None => token.to_string(),
    }
}

/// Compress one sentence.
pub fn compress_line(
    target: &str,
    source: &str,
    mut records: Vec<ReplacementRecord>,
    vocab: &Vocabulary,
    cfg: &CompressConfig,
) -> CompressedLine {
    let mut renames: HashMap<String, String> = HashMap::new();
    for token in target.split_whitespace() {
        if vocab.contains(token) || !token.starts_with(&cfg.prefix) || renames.contains_key(token)
        {
            continue;
        }
        let new = format!("{}{}", cfg.replacement, renames.len());
        renames.insert(token.to_string(), new);
    }

    let target = target
        .split_whitespace()
        .map(|t| renames.get(t).map_or(t, String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    let source = source
        .split_whitespace()
        .map(|t| rename_source_token(t, &renames))
        .collect::<Vec<_>>()
        .join(" ");
    for record in &mut records {
        if let Some(new) = renames.get(&record.placeholder) {
            record.placeholder = new.clone();
        }
    }

    CompressedLine {
        target,
        source,
        records,
        replaced: renames.len(),
    }
}

fn backup(path: &Path) -> Result<PathBuf, CorpusError> {
    let mut name = path.as_os_str().to_owned();
    name.push(".full");
    let backup = PathBuf::from(name);
    std::fs::copy(path, &backup).map_err(|e| CorpusError::io(path, e))?;
    tracing::info!(from = %path.display(), to = %backup.display(), "backed up");
    Ok(backup)
}

fn open_lines(path: &Path) -> Result<std::io::Lines<BufReader<std::fs::File>>, CorpusError> {
    let file = std::fs::File::open(path).map_err(|e| CorpusError::io(path, e))?;
    Ok(BufReader::new(file).lines())
}

fn create(path: &Path) -> Result<BufWriter<std::fs::File>, CorpusError> {
    let file = std::fs::File::create(path).map_err(|e| CorpusError::io(path, e))?;
    Ok(BufWriter::new(file))
}

/// Compress the `-tgt`, `-src` and `-anon` files of one split in place.
///
/// Line counts are checked before anything is touched; originals are kept as
/// `<file>.full`.
pub fn replace_rare_tokens(
    paths: &ParallelPaths,
    vocab: &Vocabulary,
    cfg: &CompressConfig,
    progress_interval: usize,
) -> GraphSeqResult<CompressStats> {
    check_aligned(&[&paths.target, &paths.source, &paths.records])?;

    let tgt_backup = backup(&paths.target)?;
    let src_backup = backup(&paths.source)?;
    let anon_backup = backup(&paths.records)?;

    let mut tgt_out = create(&paths.target)?;
    let mut src_out = create(&paths.source)?;
    let mut anon_out = create(&paths.records)?;

    let mut stats = CompressStats::default();
    let lines = open_lines(&tgt_backup)?
        .zip(open_lines(&src_backup)?)
        .zip(open_lines(&anon_backup)?);
    for ((tgt, src), anon) in lines {
        let tgt = tgt.map_err(|e| CorpusError::io(&tgt_backup, e))?;
        let src = src.map_err(|e| CorpusError::io(&src_backup, e))?;
        let anon = anon.map_err(|e| CorpusError::io(&anon_backup, e))?;
        let json_err = |e: serde_json::Error| CorpusError::Json {
            path: anon_backup.display().to_string(),
            line: stats.lines + 1,
            message: e.to_string(),
        };
        let records = decode_line(&anon).map_err(json_err)?;

        let line = compress_line(tgt.trim(), src.trim(), records, vocab, cfg);
        let encoded = encode_line(&line.records).map_err(json_err)?;

        writeln!(tgt_out, "{}", line.target).map_err(|e| CorpusError::io(&paths.target, e))?;
        writeln!(src_out, "{}", line.source).map_err(|e| CorpusError::io(&paths.source, e))?;
        writeln!(anon_out, "{encoded}").map_err(|e| CorpusError::io(&paths.records, e))?;

        stats.lines += 1;
        stats.replaced += line.replaced;
        if progress_interval > 0 && stats.lines % progress_interval == 0 {
            tracing::info!(lines = stats.lines, "compressing");
        }
    }
    tgt_out.flush().map_err(|e| CorpusError::io(&paths.target, e))?;
    src_out.flush().map_err(|e| CorpusError::io(&paths.source, e))?;
    anon_out.flush().map_err(|e| CorpusError::io(&paths.records, e))?;

    tracing::info!(
        lines = stats.lines,
        replaced = stats.replaced,
        "replaced rare placeholder tokens"
    );
    Ok(stats)
}
