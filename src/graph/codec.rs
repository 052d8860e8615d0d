//! Decoder for bracketed triple notation (PENMAN).
//!
//! ```text
//! (10002 / _open_v_1
//!   :lnk "<11:18>"
//!   :tense PAST
//!   :ARG1-NEQ (10001 / _window_n_1
//!     :RSTR-H-of (10000 / _the_q)))
//! ```
//!
//! Nested nodes and bare references to variables become node edges; quoted
//! strings and other symbols become constants. A relation ending in `-of` is
//! stored in canonical direction with the endpoints swapped and the triple
//! marked inverted.

use std::sync::LazyLock;

use regex::Regex;

use super::{Graph, INSTANCE, Target, Triple};
use crate::error::{GraphError, GraphResult};

static UNKNOWN_PREDICATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([^\s]+)/(.*?_unknown)").unwrap());

/// Rewrite unknown-word predicates (`_foxes/NNS_u_unknown`) into an explicit
/// `UNKfoxes` type with a `carg` literal, so they are anonymized like named
/// entities and copied verbatim at generation time.
pub fn normalize_unknowns(serialized: &str) -> String {
    UNKNOWN_PREDICATE
        .replace_all(serialized, r#"UNK${1} :carg "${1}""#)
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Open,
    Close,
    Slash,
    Role(String),
    Quoted(String),
    Symbol(String),
}

#[derive(Debug, Clone)]
struct Lexeme {
    tok: Tok,
    offset: usize,
}

fn check_balance(input: &str) -> GraphResult<()> {
    let (mut open, mut closed, mut depth) = (0usize, 0usize, 0isize);
    let mut in_quote = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quote = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' => {
                open += 1;
                depth += 1;
            }
            ')' => {
                closed += 1;
                depth -= 1;
                if depth < 0 {
                    return Err(GraphError::UnbalancedBrackets { open, closed });
                }
            }
            _ => {}
        }
    }
    if open != closed {
        return Err(GraphError::UnbalancedBrackets { open, closed });
    }
    Ok(())
}

/// Drop a trailing surface alignment such as `~e.3` or `~1,2`.
fn strip_alignment(symbol: &str) -> &str {
    match symbol.rfind('~') {
        Some(i) if i > 0 => {
            let marker = &symbol[i + 1..];
            let digits = marker.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            let digits = digits.strip_prefix('.').unwrap_or(digits);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == ',') {
                &symbol[..i]
            } else {
                symbol
            }
        }
        _ => symbol,
    }
}

fn lex(input: &str) -> GraphResult<Vec<Lexeme>> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push(Lexeme { tok: Tok::Open, offset });
            }
            ')' => {
                chars.next();
                out.push(Lexeme { tok: Tok::Close, offset });
            }
            '/' => {
                chars.next();
                out.push(Lexeme { tok: Tok::Slash, offset });
            }
            '"' => {
                chars.next();
                let mut text = String::from('"');
                let mut escaped = false;
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    text.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(GraphError::UnexpectedEnd {
                        expected: "closing quote".into(),
                    });
                }
                // alignment markers may follow a quoted string
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    chars.next();
                }
                out.push(Lexeme {
                    tok: Tok::Quoted(text),
                    offset,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                let tok = match text.strip_prefix(':') {
                    Some(role) => Tok::Role(role.to_string()),
                    None => Tok::Symbol(strip_alignment(&text).to_string()),
                };
                out.push(Lexeme { tok, offset });
            }
        }
    }
    Ok(out)
}

/// A value before variables are resolved.
#[derive(Debug, Clone)]
enum RawValue {
    /// Nested node definition; holds the variable.
    Node(String),
    Quoted(String),
    Symbol(String),
}

#[derive(Debug, Clone)]
struct RawTriple {
    source: String,
    relation: String,
    value: RawValue,
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
    triples: Vec<RawTriple>,
    defined: Vec<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.lexemes.get(self.pos).map(|l| &l.tok)
    }

    fn next(&mut self, expected: &str) -> GraphResult<Lexeme> {
        let lexeme = self
            .lexemes
            .get(self.pos)
            .cloned()
            .ok_or_else(|| GraphError::UnexpectedEnd {
                expected: expected.to_string(),
            })?;
        self.pos += 1;
        Ok(lexeme)
    }

    fn unexpected(lexeme: &Lexeme) -> GraphError {
        let token = match &lexeme.tok {
            Tok::Open => "(".to_string(),
            Tok::Close => ")".to_string(),
            Tok::Slash => "/".to_string(),
            Tok::Role(r) => format!(":{r}"),
            Tok::Quoted(s) | Tok::Symbol(s) => s.clone(),
        };
        GraphError::UnexpectedToken {
            token,
            offset: lexeme.offset,
        }
    }

    /// node := '(' var ['/' type] { ':role' value } ')'
    fn node(&mut self) -> GraphResult<String> {
        let open = self.next("node")?;
        if open.tok != Tok::Open {
            return Err(Self::unexpected(&open));
        }
        let head = self.next("variable")?;
        let var = match head.tok {
            Tok::Symbol(v) => v,
            _ => return Err(Self::unexpected(&head)),
        };
        self.defined.push(var.clone());

        if self.peek() == Some(&Tok::Slash) {
            self.pos += 1;
            let ty = self.next("node type")?;
            let value = match ty.tok {
                Tok::Symbol(s) => RawValue::Symbol(s),
                Tok::Quoted(s) => RawValue::Quoted(s),
                _ => return Err(Self::unexpected(&ty)),
            };
            self.triples.push(RawTriple {
                source: var.clone(),
                relation: INSTANCE.to_string(),
                value,
            });
        }

        loop {
            let lexeme = self.next("relation or `)`")?;
            match lexeme.tok {
                Tok::Close => return Ok(var),
                Tok::Role(relation) => {
                    let slot = self.triples.len();
                    self.triples.push(RawTriple {
                        source: var.clone(),
                        relation,
                        value: RawValue::Symbol(String::new()),
                    });
                    let value = match self.peek() {
                        Some(Tok::Open) => RawValue::Node(self.node()?),
                        _ => {
                            let v = self.next("relation value")?;
                            match v.tok {
                                Tok::Quoted(s) => RawValue::Quoted(s),
                                Tok::Symbol(s) => RawValue::Symbol(s),
                                _ => return Err(Self::unexpected(&v)),
                            }
                        }
                    };
                    self.triples[slot].value = value;
                }
                _ => return Err(Self::unexpected(&lexeme)),
            }
        }
    }
}

/// Decode a serialized graph.
///
/// Fails with a [`GraphError`] on unbalanced brackets, stray tokens, or a
/// node without exactly one `instance` edge.
pub fn decode(serialized: &str) -> GraphResult<Graph> {
    check_balance(serialized)?;
    let lexemes = lex(serialized)?;
    let mut parser = Parser {
        lexemes,
        pos: 0,
        triples: Vec::new(),
        defined: Vec::new(),
    };
    parser.node()?;
    if let Some(extra) = parser.lexemes.get(parser.pos) {
        return Err(Parser::unexpected(extra));
    }

    let mut graph = Graph::new();
    for var in &parser.defined {
        graph.add_node(var.as_str());
    }

    for raw in parser.triples {
        let source = graph.add_node(raw.source);
        let target_var = match &raw.value {
            RawValue::Node(v) => Some(v.as_str()),
            RawValue::Symbol(s) if raw.relation != INSTANCE => Some(s.as_str()),
            _ => None,
        };
        let target_node = target_var.and_then(|v| graph.node(v));

        let triple = match target_node {
            Some(target) => match raw.relation.strip_suffix("-of") {
                Some(forward) if !forward.is_empty() => {
                    Triple::new(target, forward, Target::Node(source)).inverted()
                }
                _ => Triple::new(source, raw.relation, Target::Node(target)),
            },
            None => {
                let value = match raw.value {
                    RawValue::Node(v) | RawValue::Quoted(v) | RawValue::Symbol(v) => v,
                };
                Triple::attribute(source, raw.relation, value)
            }
        };
        graph.push(triple);
    }

    graph.validate()?;
    Ok(graph)
}
