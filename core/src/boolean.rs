//! Boolean retrieval: an infix `AND`/`OR`/`NOT` query is compiled to postfix with a
//! shunting-yard pass and then evaluated over sets of document ids.
//!
//! Both halves fail soft. A query that cannot be compiled becomes an empty program,
//! operators lacking operands are skipped, and a program that does not reduce to a
//! single set yields no documents. Callers get "nothing found", never an error.

use crate::error::{Error, Result};
use crate::DocId;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref DOUBLE_AND: Regex = Regex::new(r"\bAND\s+AND\b").expect("valid regex");
    static ref MIXED_OR: Regex = Regex::new(r"\b(?:AND\s+OR|OR\s+AND|OR\s+OR)\b").expect("valid regex");
    static ref DOUBLE_NOT: Regex = Regex::new(r"\bNOT\s+NOT\b").expect("valid regex");
    static ref SPACES: Regex = Regex::new(r"\s{2,}").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolToken {
    Term(String),
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Infix {
    Operand(String),
    Op(BoolToken),
    Open,
    Close,
}

fn precedence(op: &BoolToken) -> u8 {
    match op {
        BoolToken::Not => 3,
        BoolToken::And => 2,
        BoolToken::Or => 1,
        BoolToken::Term(_) => 0,
    }
}

/// Collapses redundant operator runs until nothing changes.
pub fn normalize_operators(query: &str) -> String {
    let mut current = query.trim().to_string();
    loop {
        let next = DOUBLE_AND.replace_all(&current, "AND");
        let next = MIXED_OR.replace_all(&next, "OR");
        let next = DOUBLE_NOT.replace_all(&next, "");
        let next = SPACES.replace_all(&next, " ").trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn lex(query: &str) -> Vec<Infix> {
    let spaced = query.replace('(', " ( ").replace(')', " ) ");
    let mut tokens = Vec::new();
    for word in spaced.split_whitespace() {
        let token = match word {
            "AND" => Infix::Op(BoolToken::And),
            "OR" => Infix::Op(BoolToken::Or),
            "NOT" => Infix::Op(BoolToken::Not),
            "(" => Infix::Open,
            ")" => Infix::Close,
            operand => Infix::Operand(operand.to_string()),
        };
        let ends_operand = matches!(tokens.last(), Some(Infix::Operand(_)) | Some(Infix::Close));
        let starts_operand = matches!(token, Infix::Operand(_) | Infix::Open | Infix::Op(BoolToken::Not));
        if ends_operand && starts_operand {
            tokens.push(Infix::Op(BoolToken::Or));
        }
        tokens.push(token);
    }
    tokens
}

/// Compiles an infix query to postfix, reporting unbalanced parentheses.
pub fn compile(query: &str) -> Result<Vec<BoolToken>> {
    let normalized = normalize_operators(query);
    let mut output = Vec::new();
    let mut stack: Vec<Infix> = Vec::new();
    for token in lex(&normalized) {
        match token {
            Infix::Operand(word) => output.push(BoolToken::Term(word)),
            Infix::Op(op) => {
                while let Some(Infix::Op(top)) = stack.last() {
                    if precedence(top) < precedence(&op) {
                        break;
                    }
                    if let Some(Infix::Op(top)) = stack.pop() {
                        output.push(top);
                    }
                }
                stack.push(Infix::Op(op));
            }
            Infix::Open => stack.push(Infix::Open),
            Infix::Close => loop {
                match stack.pop() {
                    Some(Infix::Op(op)) => output.push(op),
                    Some(Infix::Open) => break,
                    _ => return Err(Error::MalformedQuery(format!("unmatched `)` in `{query}`"))),
                }
            },
        }
    }
    while let Some(top) = stack.pop() {
        match top {
            Infix::Op(op) => output.push(op),
            _ => return Err(Error::MalformedQuery(format!("unmatched `(` in `{query}`"))),
        }
    }
    Ok(output)
}

/// Fail-soft compile: a malformed query becomes the empty program.
pub fn infix_to_postfix(query: &str) -> Vec<BoolToken> {
    compile(query).unwrap_or_else(|err| {
        tracing::debug!(%err, "boolean query rejected");
        Vec::new()
    })
}

/// Runs a postfix program. `resolve` maps an operand word to its documents, or `None`
/// when the word carries no searchable term (it is then skipped). `universe` is the
/// set of live ids that `NOT` complements against.
pub fn evaluate<F>(program: &[BoolToken], mut resolve: F, universe: &BTreeSet<DocId>) -> BTreeSet<DocId>
where
    F: FnMut(&str) -> Option<BTreeSet<DocId>>,
{
    let mut stack: Vec<BTreeSet<DocId>> = Vec::new();
    for token in program {
        match token {
            BoolToken::Term(word) => {
                if let Some(ids) = resolve(word) {
                    stack.push(ids);
                }
            }
            BoolToken::And | BoolToken::Or if stack.len() >= 2 => {
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else { continue };
                let merged = if *token == BoolToken::And {
                    left.intersection(&right).copied().collect()
                } else {
                    left.union(&right).copied().collect()
                };
                stack.push(merged);
            }
            BoolToken::Not if !stack.is_empty() => {
                let Some(negated) = stack.pop() else { continue };
                stack.push(universe.difference(&negated).copied().collect());
            }
            _ => tracing::debug!(?token, depth = stack.len(), "skipping operator without operands"),
        }
    }
    if stack.len() == 1 {
        stack.pop().unwrap_or_default()
    } else {
        BTreeSet::new()
    }
}

/// Operand words of a program, in order of appearance.
pub fn operands(program: &[BoolToken]) -> impl Iterator<Item = &str> {
    program.iter().filter_map(|token| match token {
        BoolToken::Term(word) => Some(word.as_str()),
        _ => None,
    })
}
