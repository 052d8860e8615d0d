// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # graphseq
//!
//! Turns semantic graphs (DMRS in PENMAN notation) paired with their
//! sentences into anonymized, line-aligned sequence-to-sequence training
//! data, and restores surface text from model output.
//!
//! ## Architecture
//!
//! - **Graph model** (`graph`): arena graph with stable edge ids, decoder,
//!   attribute combiner, anonymizer and pre-order linearizer
//! - **Sentence side** (`sentence`, `tokenize`): span-aware placeholder
//!   substitution followed by Moses-style tokenization
//! - **Restoration** (`replacements`, `deanonymize`): literal → surface form
//!   map and the de-anonymizer
//! - **Vocabulary** (`vocab`, `compress`): token counts and rare-placeholder
//!   compression
//! - **Corpus** (`corpus`): the four parallel files, batch driver, overlap
//!   removal
//!
//! ## Library usage
//!
//! ```
//! use graphseq::corpus::preprocess_graph;
//! use graphseq::sentence::anonymize_sentence;
//! use graphseq::tokenize::MosesTokenizer;
//!
//! let mut out = preprocess_graph(
//!     r#"(e / _bark_v_1 :lnk "<4:10>" :ARG1 (x / named :carg "Rex" :lnk "<0:3>"))"#,
//! )
//! .unwrap();
//! let target = anonymize_sentence("Rex barked.", &mut out.records, &MosesTokenizer::new());
//! assert_eq!(target.line(), "named0 barked .");
//! ```

pub mod compress;
pub mod config;
pub mod corpus;
pub mod deanonymize;
pub mod error;
pub mod graph;
pub mod record;
pub mod replacements;
pub mod sentence;
pub mod tokenize;
pub mod vocab;
