//! Restore surface text from model output.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{AlignmentError, CorpusError, GraphSeqResult};
use crate::record::{ReplacementRecord, load_record_file};
use crate::replacements::ReplacementMap;
use crate::tokenize::Tokenizer;

/// Placeholder → surface form for one line.
pub fn placeholder_table<'a>(
    records: &'a [ReplacementRecord],
    map: &'a ReplacementMap,
) -> HashMap<&'a str, &'a str> {
    records
        .iter()
        .map(|r| (r.placeholder.as_str(), map.surface_form(&r.value)))
        .collect()
}

/// Substitute placeholders; other tokens pass through.
pub fn deanonymize_tokens<'a>(
    tokens: impl IntoIterator<Item = &'a str>,
    table: &HashMap<&str, &str>,
) -> Vec<String> {
    tokens
        .into_iter()
        .map(|t| table.get(t).copied().unwrap_or(t).to_string())
        .collect()
}

/// De-anonymize and detokenize one prediction line.
pub fn deanonymize_line(
    line: &str,
    records: &[ReplacementRecord],
    map: &ReplacementMap,
    tokenizer: &dyn Tokenizer,
) -> String {
    let table = placeholder_table(records, map);
    let tokens = deanonymize_tokens(line.split_whitespace(), &table);
    tokenizer.detokenize(&tokens)
}

/// De-anonymize a whole prediction file. Returns the number of lines written.
pub fn postprocess_file(
    predictions: &Path,
    records: &Path,
    map: &ReplacementMap,
    tokenizer: &dyn Tokenizer,
    output: &Path,
) -> GraphSeqResult<usize> {
    let records = load_record_file(records)?;
    let input = std::fs::File::open(predictions).map_err(|e| CorpusError::io(predictions, e))?;
    let file = std::fs::File::create(output).map_err(|e| CorpusError::io(output, e))?;
    let mut out = BufWriter::new(file);

    let mut written = 0;
    for (i, line) in BufReader::new(input).lines().enumerate() {
        let line = line.map_err(|e| CorpusError::io(predictions, e))?;
        let recs = records
            .get(i)
            .ok_or(AlignmentError::MissingRecords { line: i + 1 })?;
        let text = deanonymize_line(&line, recs, map, tokenizer);
        writeln!(out, "{text}").map_err(|e| CorpusError::io(output, e))?;
        written += 1;
    }
    out.flush().map_err(|e| CorpusError::io(output, e))?;

    tracing::info!(
        lines = written,
        path = %output.display(),
        "wrote deanonymized, detokenized lines"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphSeqError;
    use crate::tokenize::MosesTokenizer;

    fn records() -> Vec<ReplacementRecord> {
        vec![
            ReplacementRecord::new("named0", [0, 3], "Kim"),
            ReplacementRecord::new("mofy0", [12, 20], "Nov"),
        ]
    }

    #[test]
    fn map_lookup_falls_back_to_value() {
        let mut map = ReplacementMap::new();
        map.insert("Nov", "November");
        let recs = records();
        let table = placeholder_table(&recs, &map);
        assert_eq!(table["named0"], "Kim");
        assert_eq!(table["mofy0"], "November");
    }

    #[test]
    fn line_is_restored_and_detokenized() {
        let mut map = ReplacementMap::new();
        map.insert("Nov", "November");
        let out = deanonymize_line(
            "named0 arrived in mofy0 .",
            &records(),
            &map,
            &MosesTokenizer::new(),
        );
        assert_eq!(out, "Kim arrived in November.");
    }

    #[test]
    fn unmatched_tokens_pass_through() {
        let out = deanonymize_line(
            "named1 left",
            &records(),
            &ReplacementMap::new(),
            &MosesTokenizer::new(),
        );
        assert_eq!(out, "named1 left");
    }

    #[test]
    fn file_level_postprocess() {
        let dir = tempfile::TempDir::new().unwrap();
        let pred = dir.path().join("pred.txt");
        let anon = dir.path().join("test-anon.txt");
        let out = dir.path().join("out.txt");
        std::fs::write(&pred, "named0 slept .\nit rained .\n").unwrap();
        std::fs::write(
            &anon,
            "[{\"ph\":\"named0\",\"span\":[0,3],\"value\":\"Kim\"}]\n[]\n",
        )
        .unwrap();
        let n = postprocess_file(&pred, &anon, &ReplacementMap::new(), &MosesTokenizer::new(), &out)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "Kim slept.\nit rained.\n");
    }

    #[test]
    fn extra_prediction_lines_are_an_alignment_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let pred = dir.path().join("pred.txt");
        let anon = dir.path().join("test-anon.txt");
        std::fs::write(&pred, "a\nb\n").unwrap();
        std::fs::write(&anon, "[]\n").unwrap();
        let err = postprocess_file(
            &pred,
            &anon,
            &ReplacementMap::new(),
            &MosesTokenizer::new(),
            &dir.path().join("out.txt"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GraphSeqError::Alignment(AlignmentError::MissingRecords { line: 2 })
        ));
    }
}
