//! Remove training sentences that also occur in test data.
//!
//! Run after preprocessing, so lines are compared in anonymized form.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{BLANK_RECORDS, ParallelPaths, check_aligned};
use crate::error::{CorpusError, GraphSeqResult};

fn read_set(path: &Path) -> Result<HashSet<String>, CorpusError> {
    let text = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Write every non-blank line of `train` that also occurs in `test` to
/// `blacklist`. Returns the number of overlapping lines.
pub fn find_overlapping_lines(
    test: &Path,
    train: &Path,
    blacklist: &Path,
    append: bool,
    progress_interval: usize,
) -> Result<usize, CorpusError> {
    let test_lines = read_set(test)?;

    let input = std::fs::File::open(train).map_err(|e| CorpusError::io(train, e))?;
    let output = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(blacklist)
        .map_err(|e| CorpusError::io(blacklist, e))?;
    let mut out = BufWriter::new(output);

    let mut overlapping = 0;
    let mut total = 0;
    for line in BufReader::new(input).lines() {
        let line = line.map_err(|e| CorpusError::io(train, e))?;
        let line = line.trim();
        if !line.is_empty() && test_lines.contains(line) {
            overlapping += 1;
            writeln!(out, "{line}").map_err(|e| CorpusError::io(blacklist, e))?;
        }
        total += 1;
        if progress_interval > 0 && total % progress_interval == 0 {
            tracing::info!(overlapping, total, "checking overlap");
        }
    }
    out.flush().map_err(|e| CorpusError::io(blacklist, e))?;

    tracing::info!(
        overlapping,
        total,
        test = %test.display(),
        train = %train.display(),
        "found overlapping lines"
    );
    Ok(overlapping)
}

/// Drop (or blank) every sentence whose target line is blacklisted, in all
/// four parallel files. Returns the number of affected lines.
pub fn apply_blacklist(
    paths: &ParallelPaths,
    blacklist: &Path,
    output_blank: bool,
) -> GraphSeqResult<usize> {
    paths.require_existing()?;
    check_aligned(&paths.all())?;
    let blacklist = read_set(blacklist)?;

    let target = std::fs::read_to_string(&paths.target).map_err(|e| CorpusError::io(&paths.target, e))?;
    let bad: HashSet<usize> = target
        .lines()
        .enumerate()
        .filter(|(_, l)| blacklist.contains(l.trim()))
        .map(|(i, _)| i)
        .collect();

    for path in paths.all() {
        let blank = if path == paths.records.as_path() {
            BLANK_RECORDS
        } else {
            ""
        };
        let text = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
        let file = std::fs::File::create(path).map_err(|e| CorpusError::io(path, e))?;
        let mut out = BufWriter::new(file);
        for (i, line) in text.lines().enumerate() {
            let line = if bad.contains(&i) {
                if !output_blank {
                    continue;
                }
                blank
            } else {
                line
            };
            writeln!(out, "{line}").map_err(|e| CorpusError::io(path, e))?;
        }
        out.flush().map_err(|e| CorpusError::io(path, e))?;
    }

    tracing::info!(
        removed = bad.len(),
        blanked = output_blank,
        prefix = %paths.target.display(),
        "applied blacklist"
    );
    Ok(bad.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_split(dir: &Path, name: &str) -> ParallelPaths {
        let paths = ParallelPaths::from_prefix(dir.join(name));
        std::fs::write(&paths.source, "s0\ns1\ns2\n").unwrap();
        std::fs::write(&paths.target, "the dog barked .\nnamed0 slept .\nit rained .\n").unwrap();
        std::fs::write(&paths.records, "[]\n[{\"ph\":\"named0\",\"span\":[0,3],\"value\":\"Kim\"}]\n[]\n").unwrap();
        std::fs::write(&paths.original, "o0\no1\no2\n").unwrap();
        paths
    }

    #[test]
    fn overlap_is_written_to_blacklist() {
        let dir = tempfile::TempDir::new().unwrap();
        let train = write_split(dir.path(), "train");
        let test = dir.path().join("test-tgt.txt");
        std::fs::write(&test, "it rained .\n\nsomething else\n").unwrap();
        let blacklist = dir.path().join("blacklist.txt");

        let n = find_overlapping_lines(&test, &train.target, &blacklist, false, 0).unwrap();
        assert_eq!(n, 1);
        assert_eq!(std::fs::read_to_string(&blacklist).unwrap(), "it rained .\n");

        find_overlapping_lines(&test, &train.target, &blacklist, true, 0).unwrap();
        assert_eq!(std::fs::read_to_string(&blacklist).unwrap().lines().count(), 2);
    }

    #[test]
    fn blacklisted_lines_are_dropped_everywhere() {
        let dir = tempfile::TempDir::new().unwrap();
        let train = write_split(dir.path(), "train");
        let blacklist = dir.path().join("blacklist.txt");
        std::fs::write(&blacklist, "named0 slept .\n").unwrap();

        assert_eq!(apply_blacklist(&train, &blacklist, false).unwrap(), 1);
        assert_eq!(check_aligned(&train.all()).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&train.source).unwrap(), "s0\ns2\n");
        assert_eq!(std::fs::read_to_string(&train.records).unwrap(), "[]\n[]\n");
    }

    #[test]
    fn blacklisted_lines_can_be_blanked() {
        let dir = tempfile::TempDir::new().unwrap();
        let train = write_split(dir.path(), "train");
        let blacklist = dir.path().join("blacklist.txt");
        std::fs::write(&blacklist, "named0 slept .\n").unwrap();

        apply_blacklist(&train, &blacklist, true).unwrap();
        assert_eq!(check_aligned(&train.all()).unwrap(), 3);
        assert_eq!(std::fs::read_to_string(&train.target).unwrap(), "the dog barked .\n\nit rained .\n");
        assert_eq!(std::fs::read_to_string(&train.records).unwrap(), "[]\n[]\n[]\n");
        assert_eq!(std::fs::read_to_string(&train.original).unwrap(), "o0\n\no2\n");
    }
}
