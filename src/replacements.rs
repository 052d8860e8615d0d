//! Graph literal → most common surface form.
//!
//! Built once from the training records. A literal such as `Nov` may be
//! realized as `November` in most sentences; the map stores that preference
//! and the de-anonymizer applies it.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CorpusError;
use crate::record::{ReplacementRecord, load_record_file};

/// Persistent literal → realization map. Literals whose best realization is
/// the literal itself are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplacementMap {
    entries: BTreeMap<String, String>,
}

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: impl Into<String>, realized: impl Into<String>) {
        self.entries.insert(value.into(), realized.into());
    }

    pub fn get(&self, value: &str) -> Option<&str> {
        self.entries.get(value).map(String::as_str)
    }

    /// The preferred surface form of `value`, or `value` itself.
    pub fn surface_form<'a>(&'a self, value: &'a str) -> &'a str {
        self.get(value).unwrap_or(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a JSON map file.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let content = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| CorpusError::Json {
            path: path.display().to_string(),
            line: e.line(),
            message: e.to_string(),
        })
    }

    /// Write as a JSON object with 4-space indentation.
    pub fn save(&self, path: &Path) -> Result<(), CorpusError> {
        let mut buf = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        self.serialize(&mut ser).map_err(|e| CorpusError::Json {
            path: path.display().to_string(),
            line: 0,
            message: e.to_string(),
        })?;
        buf.push(b'\n');
        let mut file = std::fs::File::create(path).map_err(|e| CorpusError::io(path, e))?;
        file.write_all(&buf).map_err(|e| CorpusError::io(path, e))
    }
}

/// Realization counts for one literal, in first-seen order.
#[derive(Debug, Default)]
struct Tally {
    counts: Vec<(String, usize)>,
}

impl Tally {
    fn observe(&mut self, realized: &str) {
        match self.counts.iter_mut().find(|(r, _)| r == realized) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((realized.to_string(), 1)),
        }
    }

    /// Highest count wins; ties go to the realization seen first.
    fn most_common(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.counts {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(r, _)| r.as_str())
    }
}

/// Accumulates realization counts across record files.
#[derive(Debug)]
pub struct ReplacementMapBuilder {
    skip_prefix: String,
    tallies: HashMap<String, Tally>,
    observed: usize,
}

impl ReplacementMapBuilder {
    /// Records whose placeholder starts with `skip_prefix` (the compressor's
    /// generic placeholders) are ignored.
    pub fn new(skip_prefix: impl Into<String>) -> Self {
        Self {
            skip_prefix: skip_prefix.into(),
            tallies: HashMap::new(),
            observed: 0,
        }
    }

    pub fn observe(&mut self, record: &ReplacementRecord) {
        if record.placeholder.starts_with(&self.skip_prefix) {
            return;
        }
        let Some(realized) = record.realized.as_deref() else {
            return;
        };
        self.tallies
            .entry(record.value.clone())
            .or_default()
            .observe(realized);
        self.observed += 1;
    }

    /// Observe every record in one `-anon.txt` file.
    pub fn add_file(&mut self, path: &Path) -> Result<(), CorpusError> {
        for line in load_record_file(path)? {
            for record in &line {
                self.observe(record);
            }
        }
        Ok(())
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn build(&self) -> ReplacementMap {
        let mut map = ReplacementMap::new();
        for (value, tally) in &self.tallies {
            if let Some(best) = tally.most_common() {
                if best != value {
                    map.insert(value.clone(), best);
                }
            }
        }
        map
    }
}

/// Build a map from several record files and log its size.
pub fn build_replacement_map(
    paths: &[impl AsRef<Path>],
    skip_prefix: &str,
) -> Result<ReplacementMap, CorpusError> {
    let mut builder = ReplacementMapBuilder::new(skip_prefix);
    for path in paths {
        builder.add_file(path.as_ref())?;
    }
    let map = builder.build();
    tracing::info!(
        observed = builder.observed(),
        entries = map.len(),
        "built replacement map"
    );
    Ok(map)
}
