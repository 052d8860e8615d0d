//! Token frequency vocabulary (`token<TAB>frequency` files).

use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::CorpusError;

/// Tokens with their frequencies, most frequent first.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, token: &str, count: u64) {
        match self.index.get(token) {
            Some(&i) => self.entries[i].1 += count,
            None => {
                self.index.insert(token.to_string(), self.entries.len());
                self.entries.push((token.to_string(), count));
            }
        }
    }

    /// Count whitespace-separated tokens over `lines`.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut vocab = Self::new();
        for line in lines {
            for token in line.split_whitespace() {
                vocab.add(token, 1);
            }
        }
        vocab.sort();
        vocab
    }

    /// Count the tokens of a (target) file.
    pub fn build_from_file(path: &Path) -> Result<Self, CorpusError> {
        let file = std::fs::File::open(path).map_err(|e| CorpusError::io(path, e))?;
        let mut vocab = Self::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| CorpusError::io(path, e))?;
            for token in line.split_whitespace() {
                vocab.add(token, 1);
            }
        }
        vocab.sort();
        Ok(vocab)
    }

    /// Descending frequency; ties keep first-seen order.
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (t, _))| (t.clone(), i))
            .collect();
    }

    /// The `n` most frequent entries.
    pub fn most_common(&self, n: usize) -> &[(String, u64)] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn frequency(&self, token: &str) -> Option<u64> {
        self.index.get(token).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write at most `max_tokens` entries.
    pub fn save(&self, path: &Path, max_tokens: usize) -> Result<(), CorpusError> {
        let file = std::fs::File::create(path).map_err(|e| CorpusError::io(path, e))?;
        let mut out = BufWriter::new(file);
        for (token, freq) in self.most_common(max_tokens) {
            writeln!(out, "{token}\t{freq}").map_err(|e| CorpusError::io(path, e))?;
        }
        out.flush().map_err(|e| CorpusError::io(path, e))?;
        tracing::info!(
            distinct = self.len(),
            path = %path.display(),
            "wrote vocabulary"
        );
        Ok(())
    }

    /// Load a vocabulary file, keeping entries with frequency ≥ `min_freq`.
    pub fn load(path: &Path, min_freq: u64) -> Result<Self, CorpusError> {
        let file = std::fs::File::open(path).map_err(|e| CorpusError::io(path, e))?;
        let mut vocab = Self::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| CorpusError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(token), Some(freq), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(CorpusError::VocabFormat {
                    path: path.display().to_string(),
                    line: i + 1,
                });
            };
            let freq: u64 = freq.parse().map_err(|_| CorpusError::VocabFormat {
                path: path.display().to_string(),
                line: i + 1,
            })?;
            if freq >= min_freq {
                vocab.add(token, freq);
            }
        }
        Ok(vocab)
    }
}
