//! Tokenizer for condition expressions

use crate::error::ExpressionError;
use serde_json::{Number, Value};

/// A single lexical token with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal
    Number(Number),
    /// Quoted string literal, escapes already resolved
    Str(String),
    /// Identifier (variables, `true`, `false`, `null`)
    Name(String),
    /// Symbolic or word operator, e.g. `>=`, `and`, `not in`
    Operator(&'static str),
    /// One of `( ) [ ] { } , : ? .`
    Punctuation(char),
    End,
}

/// Symbolic operators, longest first so that `===` wins over `==`
const SYMBOL_OPERATORS: &[&str] = &[
    "===", "!==", "**", "==", "!=", "<=", ">=", "&&", "||", "..", "??", "<", ">", "+", "-",
    "*", "/", "%", "~", "!",
];

const PUNCTUATION: &[char] = &['(', ')', '[', ']', '{', '}', ',', ':', '?', '.'];

pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (number, end) = read_number(source, pos)?;
            tokens.push(Token { kind: TokenKind::Number(number), position: pos });
            pos = end;
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (text, end) = read_string(source, pos)?;
            tokens.push(Token { kind: TokenKind::Str(text), position: pos });
            pos = end;
            continue;
        }

        if is_name_start(c) {
            let end = scan_name(bytes, pos);
            let word = &source[pos..end];
            let (kind, end) = word_token(source, word, end);
            tokens.push(Token { kind, position: pos });
            pos = end;
            continue;
        }

        if let Some(&op) = SYMBOL_OPERATORS.iter().find(|op| source[pos..].starts_with(**op)) {
            tokens.push(Token { kind: TokenKind::Operator(op), position: pos });
            pos += op.len();
            continue;
        }

        if PUNCTUATION.contains(&(c as char)) {
            tokens.push(Token { kind: TokenKind::Punctuation(c as char), position: pos });
            pos += 1;
            continue;
        }

        let unexpected = source[pos..].chars().next().unwrap_or('?');
        return Err(ExpressionError::syntax(pos, format!("Unexpected character \"{}\"", unexpected)));
    }

    tokens.push(Token { kind: TokenKind::End, position: source.len() });
    Ok(tokens)
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_name_char(c: u8) -> bool {
    is_name_start(c) || c.is_ascii_digit()
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_name_char(bytes[end]) {
        end += 1;
    }
    end
}

/// Classify an identifier, merging two-word operators (`not in`, `starts with`, `ends with`)
fn word_token(source: &str, word: &str, end: usize) -> (TokenKind, usize) {
    let follow = |second: &str| -> Option<usize> {
        let rest = &source[end..];
        let trimmed = rest.trim_start();
        if trimmed.len() == rest.len() || !trimmed.starts_with(second) {
            return None;
        }
        let after = end + (rest.len() - trimmed.len()) + second.len();
        match source.as_bytes().get(after) {
            Some(&b) if is_name_char(b) => None,
            _ => Some(after),
        }
    };

    match word {
        "not" => match follow("in") {
            Some(after) => (TokenKind::Operator("not in"), after),
            None => (TokenKind::Operator("not"), end),
        },
        "starts" => match follow("with") {
            Some(after) => (TokenKind::Operator("starts with"), after),
            None => (TokenKind::Name(word.to_string()), end),
        },
        "ends" => match follow("with") {
            Some(after) => (TokenKind::Operator("ends with"), after),
            None => (TokenKind::Name(word.to_string()), end),
        },
        "and" => (TokenKind::Operator("and"), end),
        "or" => (TokenKind::Operator("or"), end),
        "in" => (TokenKind::Operator("in"), end),
        "matches" => (TokenKind::Operator("matches"), end),
        "contains" => (TokenKind::Operator("contains"), end),
        _ => (TokenKind::Name(word.to_string()), end),
    }
}

fn read_number(source: &str, start: usize) -> Result<(Number, usize), ExpressionError> {
    let bytes = source.as_bytes();
    let mut end = start;
    let mut is_float = false;

    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'_') {
        end += 1;
    }
    // A dot only belongs to the number when a digit follows, so `1..3` stays a range
    if end < bytes.len() && bytes[end] == b'.' && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        is_float = true;
        end += 1;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'_') {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            is_float = true;
            end = exp_end;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }

    let text: String = source[start..end].chars().filter(|c| *c != '_').collect();
    let invalid = || ExpressionError::syntax(start, format!("Invalid number \"{}\"", text));

    let number = if is_float {
        text.parse::<f64>().ok().and_then(Number::from_f64).ok_or_else(invalid)?
    } else {
        match text.parse::<i64>() {
            Ok(n) => Number::from(n),
            // Integers too large for i64 degrade to floats
            Err(_) => text.parse::<f64>().ok().and_then(Number::from_f64).ok_or_else(invalid)?,
        }
    };

    Ok((number, end))
}

fn read_string(source: &str, start: usize) -> Result<(String, usize), ExpressionError> {
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars.next().ok_or_else(|| ExpressionError::syntax(start, "Empty string literal"))?;
    let mut text = String::new();

    while let Some((offset, c)) = chars.next() {
        if c == quote {
            return Ok((text, start + offset + c.len_utf8()));
        }
        if c == '\\' {
            match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, escaped)) => text.push(escaped),
                None => break,
            }
        } else {
            text.push(c);
        }
    }

    Err(ExpressionError::syntax(start, "Unclosed string literal"))
}

/// Literal value carried by a number or string token
pub fn literal(token: &TokenKind) -> Option<Value> {
    match token {
        TokenKind::Number(n) => Some(Value::Number(n.clone())),
        TokenKind::Str(s) => Some(Value::String(s.clone())),
        _ => None,
    }
}
