use super::FormulaError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        match self {
            Number(n) => write!(f, "{}", n),
            Ident(s) => write!(f, "{}", s),
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Star => write!(f, "*"),
            Slash => write!(f, "/"),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
        }
    }
}

/// Token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(ch) = source[pos..].chars().next() {
        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        if starts_number(source, pos) {
            let end = number_end(source, pos);
            let text = &source[pos..end];
            let value = text.parse().map_err(|_| FormulaError::InvalidNumber {
                text: text.to_string(),
                pos,
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                pos,
            });
            pos = end;
            continue;
        }

        if is_ident_start(ch) {
            let end = ident_end(source, pos);
            tokens.push(Token {
                kind: TokenKind::Ident(source[pos..end].to_string()),
                pos,
            });
            pos = end;
            continue;
        }

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            _ => return Err(FormulaError::UnexpectedChar { ch, pos }),
        };
        tokens.push(Token { kind, pos });
        pos += ch.len_utf8();
    }

    Ok(tokens)
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '.'
}

/// A digit, or a '.' directly followed by a digit
pub(crate) fn starts_number(source: &str, pos: usize) -> bool {
    let mut chars = source[pos..].chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// End offset of the identifier starting at `start`
pub(crate) fn ident_end(source: &str, start: usize) -> usize {
    source[start..]
        .char_indices()
        .find(|&(i, c)| i > 0 && !is_ident_continue(c))
        .map_or(source.len(), |(i, _)| start + i)
}

/// End offset of `digits [. digits] [e [+-] digits]` starting at `start`
pub(crate) fn number_end(source: &str, start: usize) -> usize {
    let bytes = source.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = digits_from(start);
    if end < bytes.len() && bytes[end] == b'.' {
        end = digits_from(end + 1);
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            end = digits_from(exp);
        }
    }
    end
}
