//! End-to-end tests over the parallel-file pipeline.
//!
//! These run preprocess → vocabulary → compression → replacement map →
//! postprocess on a small corpus and check that sentences survive the round
//! trip and that the four parallel files stay aligned after every step.

use std::path::Path;

use graphseq::compress::replace_rare_tokens;
use graphseq::config::{CompressConfig, PreprocessConfig};
use graphseq::corpus::overlap::{apply_blacklist, find_overlapping_lines};
use graphseq::corpus::{ParallelPaths, check_aligned, preprocess_file};
use graphseq::deanonymize::postprocess_file;
use graphseq::record::load_record_file;
use graphseq::replacements::{ReplacementMap, build_replacement_map};
use graphseq::tokenize::MosesTokenizer;
use graphseq::vocab::Vocabulary;

const GRAPHS: &str = r#"# ::id 1
# ::snt Kim barked.
(e / _bark_v_1 :lnk "<4:11>" :tense past
   :ARG1 (x / named :carg "Kim" :lnk "<0:3>"))

# ::id 2
# ::snt Sandy met Kim in November.
(e / _meet_v_1 :lnk "<6:9>" :tense past
   :ARG1 (x / named :carg "Sandy" :lnk "<0:5>")
   :ARG2 (y / named :carg "Kim" :lnk "<10:13>")
   :ARG3 (m / mofy :carg "Nov" :lnk "<17:26>"))

# ::id 3
# ::snt Kim saw foxes.
(e / _see_v_1 :lnk "<4:7>" :tense past
   :ARG1 (x / named :carg "Kim" :lnk "<0:3>")
   :ARG2 (y / _foxes/NNS_u_unknown :lnk "<8:14>"))

# ::id 4
# ::snt This one is broken.
(e / _break_v_1 :ARG1 (x / _one_n_1
"#;

const SENTENCES: [&str; 3] = [
    "Kim barked.",
    "Sandy met Kim in November.",
    "Kim saw foxes.",
];

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn preprocess(dir: &Path, name: &str, cfg: &PreprocessConfig) -> ParallelPaths {
    let input = dir.join(format!("{name}.penman"));
    std::fs::write(&input, GRAPHS).unwrap();
    let prefix = dir.join(name);
    preprocess_file(&input, &prefix, &MosesTokenizer::new(), cfg).unwrap();
    ParallelPaths::from_prefix(prefix)
}

#[test]
fn preprocess_writes_aligned_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = preprocess(dir.path(), "train", &PreprocessConfig::default());

    assert_eq!(check_aligned(&paths.all()).unwrap(), 3);
    assert_eq!(
        read(&paths.target),
        "named0 barked .\nnamed0 met named1 in mofy0 .\nnamed0 saw UNKfoxes0 .\n"
    );
    assert_eq!(read(&paths.original).lines().nth(1), Some("Sandy met Kim in November."));

    let records = load_record_file(&paths.records).unwrap();
    let mofy = &records[1][2];
    assert_eq!(mofy.placeholder, "mofy0");
    assert_eq!(mofy.span, [17, 25]);
    assert_eq!(mofy.realized.as_deref(), Some("November"));

    for line in read(&paths.source).lines() {
        for token in line.split_whitespace() {
            assert_eq!(token.matches('\u{FFE8}').count(), 1, "token {token}");
        }
    }
}

#[test]
fn blank_policy_keeps_failed_sentence_slot() {
    let dir = tempfile::TempDir::new().unwrap();
    let cfg = PreprocessConfig {
        output_blank_for_failure: true,
        ..Default::default()
    };
    let paths = preprocess(dir.path(), "train", &cfg);

    assert_eq!(check_aligned(&paths.all()).unwrap(), 4);
    assert_eq!(read(&paths.records).lines().last(), Some("[]"));
    assert_eq!(read(&paths.source).lines().last(), Some(""));
}

#[test]
fn full_round_trip_restores_sentences() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = preprocess(dir.path(), "train", &PreprocessConfig::default());

    let vocab_file = dir.path().join("vocab.txt");
    Vocabulary::build_from_file(&paths.target)
        .unwrap()
        .save(&vocab_file, 1_000_000)
        .unwrap();
    let vocab = Vocabulary::load(&vocab_file, 2).unwrap();

    let stats = replace_rare_tokens(&paths, &vocab, &CompressConfig::default(), 0).unwrap();
    assert_eq!(stats.replaced, 1);
    assert_eq!(check_aligned(&paths.all()).unwrap(), 3);
    assert_eq!(read(&paths.target).lines().nth(2), Some("named0 saw _UNK0 ."));
    assert!(read(&paths.source).lines().nth(2).unwrap().contains("_UNK0\u{FFE8}_"));

    let map_file = dir.path().join("map.json");
    let map = build_replacement_map(&[&paths.records], "_UNK").unwrap();
    assert_eq!(map.get("Nov"), Some("November"));
    assert_eq!(map.get("foxes"), None);
    map.save(&map_file).unwrap();

    // The target file stands in for perfect model predictions.
    let restored = dir.path().join("restored.txt");
    let n = postprocess_file(
        &paths.target,
        &paths.records,
        &ReplacementMap::load(&map_file).unwrap(),
        &MosesTokenizer::new(),
        &restored,
    )
    .unwrap();
    assert_eq!(n, 3);
    let lines: Vec<String> = read(&restored).lines().map(str::to_string).collect();
    assert_eq!(lines, SENTENCES);
}

#[test]
fn overlap_removal_keeps_alignment() {
    let dir = tempfile::TempDir::new().unwrap();
    let train = preprocess(dir.path(), "train", &PreprocessConfig::default());
    let test = dir.path().join("test-tgt.txt");
    std::fs::write(&test, "named0 barked .\n").unwrap();
    let blacklist = dir.path().join("blacklist.txt");

    assert_eq!(find_overlapping_lines(&test, &train.target, &blacklist, false, 0).unwrap(), 1);
    assert_eq!(apply_blacklist(&train, &blacklist, false).unwrap(), 1);
    assert_eq!(check_aligned(&train.all()).unwrap(), 2);
    assert!(!read(&train.target).contains("barked"));
    assert!(!read(&train.original).contains("barked"));
}
