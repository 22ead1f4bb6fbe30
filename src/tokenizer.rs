//! Splits raw query output into typed tokens.

use crate::types::{Token, Values};

/// Parses a result into tokens for compound storage.
///
/// Tokens are separated exclusively by whitespace; punctuation stays inside its token. Each
/// token is tried as a base-10 integer, then as a float, and is otherwise kept as text, so any
/// input has a valid decomposition.
pub fn tokenize(raw: &str) -> Values {
    raw.split_whitespace().map(parse_token).collect()
}

/// Classifies a single whitespace-free token.
pub fn parse_token(token: &str) -> Token {
    if let Ok(i) = token.parse::<i64>() {
        return Token::Integer(i);
    }
    if let Ok(f) = token.parse::<f64>() {
        return Token::Float(f);
    }
    Token::Text(token.to_string())
}
