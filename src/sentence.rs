//! Span-aware anonymization of the original sentence.
//!
//! The graph records carry character spans in *untokenized* coordinates, so
//! placeholders are substituted into the raw sentence first and the result is
//! tokenized afterwards. Records are processed right to left so a
//! substitution never shifts offsets that are still to be used.

use std::fmt;

use crate::record::ReplacementRecord;
use crate::tokenize::Tokenizer;

/// Non-fatal problems found while resolving spans. Processing continues with
/// degraded `realized` data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanWarning {
    /// The span intersects the previously replaced one; the placeholder was
    /// inserted without deleting text.
    OverlappingSpan { placeholder: String, span: [usize; 2] },
    /// A hyphen-final literal did not occur inside its span.
    HyphenSubstringNotFound { value: String, text: String },
    /// The span reached past the end of the sentence and was clamped.
    SpanOutOfBounds { placeholder: String, span: [usize; 2], len: usize },
    /// An overlap tried to invalidate a record that had no realized form.
    RealizedAlreadyCleared { placeholder: String },
}

impl fmt::Display for SpanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanWarning::OverlappingSpan { placeholder, span } => write!(
                f,
                "overlapping replacement {placeholder} at {}:{}",
                span[0], span[1]
            ),
            SpanWarning::HyphenSubstringNotFound { value, text } => {
                write!(f, "substring with hyphen ({value}) not found in span: {text}")
            }
            SpanWarning::SpanOutOfBounds {
                placeholder,
                span,
                len,
            } => write!(
                f,
                "span {}:{} of {placeholder} exceeds sentence length {len}",
                span[0], span[1]
            ),
            SpanWarning::RealizedAlreadyCleared { placeholder } => {
                write!(f, "nested overlap: {placeholder} had no realized form to clear")
            }
        }
    }
}

/// Result of anonymizing one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizedSentence {
    pub tokens: Vec<String>,
    pub warnings: Vec<SpanWarning>,
}

impl AnonymizedSentence {
    /// Tokens joined for the target file.
    pub fn line(&self) -> String {
        self.tokens.join(" ")
    }
}

const LEADING_PUNCT: &[char] = &['(', '[', '"', '`', '\''];
const TRAILING_PUNCT: &[char] = &[
    '.', ',', '!', '?', '"', '`', '\'', '(', ')', '[', ']', ';', ':',
];

/// Shrink a span inward so it excludes surrounding punctuation.
///
/// Keeps a period that follows a capital letter (`U.S.`) and a single
/// leading or trailing quote unless it is doubled (`''`). Spans reaching
/// past the end of `chars` are clamped first.
pub fn adjust_span_boundaries(chars: &[char], span: [usize; 2]) -> [usize; 2] {
    let mut end = span[1].min(chars.len());
    let mut start = span[0].min(end);
    while start < end && LEADING_PUNCT.contains(&chars[start]) {
        if chars[start] == '\'' {
            if end - start > 1 && chars[start + 1] == '\'' {
                start += 2;
                continue;
            }
            break;
        }
        start += 1;
    }
    while end > start && TRAILING_PUNCT.contains(&chars[end - 1]) {
        if chars[end - 1] == '\'' {
            if end - start > 1 && chars[end - 2] == '\'' {
                end -= 2;
                continue;
            }
            break;
        }
        if end - start > 1 && chars[end - 2].is_ascii_uppercase() && chars[end - 1] == '.' {
            break;
        }
        end -= 1;
    }
    [start, end]
}

/// Remove link brackets and unify doubled quotes.
pub fn normalize_sentence(sentence: &str) -> String {
    sentence
        .replace(['[', ']'], "")
        .replace("``", "\"")
        .replace("''", "\"")
}

fn splice(chars: &mut Vec<char>, start: usize, end: usize, with: &str) {
    chars.splice(start..end, with.chars());
}

/// Substitute every record's span with its placeholder in the raw sentence.
///
/// Updates `span` and `realized` on the records in place and returns the
/// substituted (not yet normalized) sentence.
pub fn substitute_spans(
    sentence: &str,
    records: &mut [ReplacementRecord],
) -> (String, Vec<SpanWarning>) {
    let mut chars: Vec<char> = sentence.chars().collect();
    let mut warnings = Vec::new();

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[b].span.cmp(&records[a].span));

    let (mut start, mut end) = (usize::MAX - 1, usize::MAX);
    let mut previous: Option<usize> = None;

    for idx in order {
        let (prev_start, prev_end) = (start, end);
        let len = chars.len();
        let [raw_start, raw_end] = records[idx].span;
        end = raw_end.min(len);
        start = raw_start.min(end);
        if raw_end > len {
            warnings.push(SpanWarning::SpanOutOfBounds {
                placeholder: records[idx].placeholder.clone(),
                span: records[idx].span,
                len,
            });
        }

        // Sub-entity of a span already replaced (compounds, number
        // sequences): insert only, and stop trusting the outer record.
        if !(prev_end >= prev_start && prev_start >= end && end >= start) {
            if let Some(prev) = previous {
                if records[prev].realized.take().is_none() {
                    warnings.push(SpanWarning::RealizedAlreadyCleared {
                        placeholder: records[prev].placeholder.clone(),
                    });
                }
            }
            warnings.push(SpanWarning::OverlappingSpan {
                placeholder: records[idx].placeholder.clone(),
                span: records[idx].span,
            });
            let placeholder = records[idx].placeholder.clone();
            splice(&mut chars, start, start, &placeholder);
            previous = Some(idx);
            continue;
        }

        if records[idx].value.ends_with('-') {
            let full: String = chars[start..end].iter().collect();
            let updated = full.replace(
                &records[idx].value,
                &format!("{} ", records[idx].placeholder),
            );
            if updated == full {
                warnings.push(SpanWarning::HyphenSubstringNotFound {
                    value: records[idx].value.clone(),
                    text: full.clone(),
                });
            }
            splice(&mut chars, start, end, &updated);
            previous = Some(idx);
            continue;
        }

        let [s, e] = adjust_span_boundaries(&chars, [start, end]);
        start = s;
        end = e;
        let record = &mut records[idx];
        record.span = [start, end];
        record.realized = Some(
            chars[start..end]
                .iter()
                .filter(|c| !matches!(c, '[' | ']'))
                .collect(),
        );
        let placeholder = record.placeholder.clone();
        splice(&mut chars, start, end, &placeholder);
        previous = Some(idx);
    }

    (chars.into_iter().collect(), warnings)
}

/// Anonymize and tokenize a sentence. Warnings are logged as well as returned.
pub fn anonymize_sentence(
    sentence: &str,
    records: &mut [ReplacementRecord],
    tokenizer: &dyn Tokenizer,
) -> AnonymizedSentence {
    let (substituted, warnings) = substitute_spans(sentence, records);
    for w in &warnings {
        tracing::warn!(warning = %w, "span resolution");
    }
    let tokens = tokenizer.tokenize(&normalize_sentence(&substituted));
    AnonymizedSentence { tokens, warnings }
}
