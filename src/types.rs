use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Timestamp type (nanoseconds since epoch). Zero is reserved for the empty result.
pub type Timestamp = u64;

/// A single typed token parsed out of a raw query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Token {
    /// Numeric view of the token, used by graphing and metric sinks.
    /// Text tokens have no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Token::Integer(i) => Some(*i as f64),
            Token::Float(f) => Some(*f),
            Token::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Token::Text(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(v) => write!(f, "{}", v),
            Token::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Token {
    fn from(v: i64) -> Self {
        Token::Integer(v)
    }
}

impl From<f64> for Token {
    fn from(v: f64) -> Self {
        Token::Float(v)
    }
}

impl From<&str> for Token {
    fn from(v: &str) -> Self {
        Token::Text(v.to_string())
    }
}

impl From<String> for Token {
    fn from(v: String) -> Self {
        Token::Text(v)
    }
}

/// Tokenized value of a result, in the order the tokens appeared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(Vec<Token>);

impl Values {
    pub fn new(tokens: Vec<Token>) -> Self {
        Values(tokens)
    }

    /// Retrieves an indexed token. Results stored without values (or with fewer values than
    /// labels) yield `None` instead of faulting.
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Token> {
        self.0
    }
}

impl From<Vec<Token>> for Values {
    fn from(tokens: Vec<Token>) -> Self {
        Values(tokens)
    }
}

impl FromIterator<Token> for Values {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Values(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One timestamped, tokenized observation for a query.
///
/// `QueryResult::default()` is the "no data" sentinel returned by non-blocking reads and by
/// lookups that match nothing; check it with [`QueryResult::is_empty`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Time the result was created.
    pub time: Timestamp,
    /// Raw value of the result.
    pub value: String,
    /// Tokenized value of the result.
    pub values: Values,
}

impl QueryResult {
    pub fn new(time: Timestamp, value: impl Into<String>, values: Values) -> Self {
        Self {
            time,
            value: value.into(),
            values,
        }
    }

    /// Determines whether this is the empty result: zero time and no raw text or tokens. A
    /// result with zero time that still carries text or tokens is not empty.
    pub fn is_empty(&self) -> bool {
        self.time == 0 && self.is_empty_values()
    }

    /// Determines whether this result carries no raw text and no tokens.
    pub fn is_empty_values(&self) -> bool {
        self.value.is_empty() && self.values.is_empty()
    }

    /// Returns the values keyed by their labels. Values without a label are keyed by their
    /// position; labels without a value are left out.
    pub fn map(&self, labels: &[String]) -> HashMap<String, Token> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let key = labels.get(i).cloned().unwrap_or_else(|| i.to_string());
                (key, token.clone())
            })
            .collect()
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.value)
    }
}
