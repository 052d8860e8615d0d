//! Replacement records: one per anonymized node, one JSON array per sentence.

use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

/// How to restore one placeholder.
///
/// `realized` is filled from the original sentence. It stays absent when the
/// span overlapped another entity, which tells the replacement-map builder
/// not to learn from this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRecord {
    #[serde(rename = "ph")]
    pub placeholder: String,
    pub span: [usize; 2],
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized: Option<String>,
}

impl ReplacementRecord {
    pub fn new(placeholder: impl Into<String>, span: [usize; 2], value: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            span,
            value: value.into(),
            realized: None,
        }
    }
}

/// Serialize one sentence's records as a single JSON line.
pub fn encode_line(records: &[ReplacementRecord]) -> serde_json::Result<String> {
    serde_json::to_string(records)
}

/// Parse one line of a record file. A blank line holds no records.
pub fn decode_line(line: &str) -> serde_json::Result<Vec<ReplacementRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(line)
}

/// Load a whole `-anon.txt` file, one entry per line.
pub fn load_record_file(path: &Path) -> Result<Vec<Vec<ReplacementRecord>>, CorpusError> {
    let file = std::fs::File::open(path).map_err(|e| CorpusError::io(path, e))?;
    let mut lines = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| CorpusError::io(path, e))?;
        let records = decode_line(&line).map_err(|e| CorpusError::Json {
            path: path.display().to_string(),
            line: i + 1,
            message: e.to_string(),
        })?;
        lines.push(records);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realized_is_omitted_when_absent() {
        let rec = ReplacementRecord::new("named0", [0, 3], "Kim");
        let line = encode_line(&[rec]).unwrap();
        assert_eq!(line, r#"[{"ph":"named0","span":[0,3],"value":"Kim"}]"#);
    }

    #[test]
    fn reads_original_key_layout() {
        let line = r#"[{"ph": "mofy0", "realized": "November", "value": "Nov", "span": [0, 8]}]"#;
        let recs = decode_line(line).unwrap();
        assert_eq!(recs[0].placeholder, "mofy0");
        assert_eq!(recs[0].realized.as_deref(), Some("November"));
        assert_eq!(recs[0].span, [0, 8]);
    }

    #[test]
    fn blank_line_is_empty() {
        assert!(decode_line("").unwrap().is_empty());
        assert!(decode_line("[]").unwrap().is_empty());
    }

    #[test]
    fn load_reports_bad_line_number() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x-anon.txt");
        std::fs::write(&path, "[]\n{oops\n").unwrap();
        match load_record_file(&path) {
            Err(CorpusError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
