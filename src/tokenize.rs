//! Tokenizer/detokenizer pair used on both sides of anonymization.
//!
//! The sentence anonymizer tokenizes training targets and the de-anonymizer
//! detokenizes model output; both must use the same [`Tokenizer`] or
//! round-tripping breaks. [`MosesTokenizer`] follows the English rules of the
//! Moses tokenizer without escaping special characters.

use std::collections::HashSet;

/// A pure tokenize/detokenize pair.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
    fn detokenize(&self, tokens: &[String]) -> String;
}

const NONBREAKING: &[&str] = &[
    "Adj", "Adm", "Adv", "Asst", "Bart", "Bldg", "Brig", "Bros", "Capt", "Cmdr", "Col", "Comdr",
    "Con", "Corp", "Cpl", "DR", "Dr", "Drs", "Ens", "Gen", "Gov", "Hon", "Hr", "Hosp", "Insp",
    "Lt", "MM", "MR", "MRS", "MS", "Maj", "Messrs", "Mlle", "Mme", "Mr", "Mrs", "Ms", "Msgr",
    "Op", "Ord", "Pfc", "Ph", "Prof", "Pvt", "Rep", "Reps", "Res", "Rev", "Rt", "Sen", "Sens",
    "Sfc", "Sgt", "Sr", "St", "Supt", "Surg", "v", "vs", "i.e", "rev", "e.g", "Jan", "Feb",
    "Mar", "Apr", "Jun", "Jul", "Aug", "Sep", "Sept", "Oct", "Nov", "Dec",
];

/// Prefixes that only keep their period before a number (`No. 5`).
const NUMERIC_ONLY: &[&str] = &["No", "Nos", "Art", "Nr", "pp"];

/// English Moses-style tokenizer.
#[derive(Debug, Clone)]
pub struct MosesTokenizer {
    nonbreaking: HashSet<String>,
    numeric_only: HashSet<String>,
}

impl Default for MosesTokenizer {
    fn default() -> Self {
        let mut nonbreaking: HashSet<String> = NONBREAKING.iter().map(|s| s.to_string()).collect();
        nonbreaking.extend(('A'..='Z').map(String::from));
        Self {
            nonbreaking,
            numeric_only: NUMERIC_ONLY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl MosesTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn keeps_period(&self, prefix: &str, next: Option<&str>) -> bool {
        let next_starts = |f: fn(&char) -> bool| {
            next.and_then(|n| n.chars().next())
                .is_some_and(|c| f(&c))
        };
        (prefix.contains('.') && prefix.chars().any(char::is_alphabetic))
            || self.nonbreaking.contains(prefix)
            || next_starts(|c| c.is_lowercase())
            || (self.numeric_only.contains(prefix) && next_starts(|c| c.is_ascii_digit()))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Isolate every character that can never be part of a word.
fn isolate_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            out.push(' ');
        } else if c == '.' && chars.get(i + 1) == Some(&'.') {
            // ellipsis
            out.push(' ');
            while chars.get(i) == Some(&'.') {
                out.push('.');
                i += 1;
            }
            out.push(' ');
            continue;
        } else if is_word_char(c) || matches!(c, '.' | '\'' | '`' | '-') {
            out.push(c);
        } else if c == ','
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
        {
            out.push(c);
        } else {
            out.push(' ');
            out.push(c);
            out.push(' ');
        }
        i += 1;
    }
    out
}

/// Split apostrophes: `Company's` → `Company 's`, stray quotes isolated.
fn split_apostrophes(word: &str) -> Vec<String> {
    if !word.contains('\'') {
        return vec![word.to_string()];
    }
    let chars: Vec<char> = word.chars().collect();
    let mut out = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let prev_alpha = prev.is_some_and(char::is_alphabetic);
        let next_alpha = next.is_some_and(char::is_alphabetic);
        let numeric_possessive = prev.is_some_and(|p| p.is_ascii_digit()) && next == Some('s');
        if (prev_alpha && next_alpha) || numeric_possessive {
            out.push(' ');
            out.push('\'');
        } else {
            out.push_str(" ' ");
        }
    }
    out.split_whitespace().map(str::to_string).collect()
}

fn is_clitic(token: &str) -> bool {
    token
        .strip_prefix('\'')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(char::is_alphabetic))
}

impl Tokenizer for MosesTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let words: Vec<String> = isolate_punctuation(text)
            .split_whitespace()
            .flat_map(split_apostrophes)
            .collect();

        let mut tokens = Vec::with_capacity(words.len() + 1);
        for (i, word) in words.iter().enumerate() {
            match word.strip_suffix('.') {
                Some(prefix) if !prefix.is_empty() && !prefix.ends_with('.') => {
                    let next = words.get(i + 1).map(String::as_str);
                    if self.keeps_period(prefix, next) {
                        tokens.push(word.clone());
                    } else {
                        tokens.push(prefix.to_string());
                        tokens.push(".".to_string());
                    }
                }
                _ => tokens.push(word.clone()),
            }
        }
        tokens
    }

    fn detokenize(&self, tokens: &[String]) -> String {
        let mut out = String::new();
        let mut glue = true;
        let mut double_open = false;
        let mut single_open = false;
        let mut prev: Option<&str> = None;

        for token in tokens {
            let t = token.as_str();
            let (space_before, glue_after) = match t {
                "\"" => {
                    double_open = !double_open;
                    if double_open { (true, true) } else { (false, false) }
                }
                "'" if single_open => {
                    single_open = false;
                    (false, false)
                }
                // plural possessive: `Smiths '` -> `Smiths'`
                "'" if prev.is_some_and(|p| p.ends_with('s')) => (false, false),
                "'" => {
                    single_open = true;
                    (true, true)
                }
                "," | "." | "?" | "!" | ":" | ";" | "%" | ")" | "]" | "}" | "..." => (false, false),
                "(" | "[" | "{" | "$" | "#" | "\u{a3}" | "\u{bf}" | "\u{a1}" => (true, true),
                _ if is_clitic(t) => (false, false),
                _ => (true, false),
            };
            if space_before && !glue {
                out.push(' ');
            }
            out.push_str(t);
            glue = glue_after;
            prev = Some(t);
        }
        out
    }
}
