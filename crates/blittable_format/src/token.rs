//! Pull-style token streams consumed by the writer.

use crate::error::{BlittableError, BlittableResult};
use serde_json::Value as JsonValue;
use std::fmt;

/// One event of a JSON token stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Token {
    /// Before the first `advance` or after the end of the stream.
    #[default]
    None,
    /// `{`
    StartObject,
    /// `}`
    EndObject,
    /// `[`
    StartArray,
    /// `]`
    EndArray,
    /// An object key.
    PropertyName(String),
    /// A string value.
    String(String),
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Boolean(bool),
    /// `null`
    Null,
    /// An undefined value, written as `null`.
    Undefined,
    /// A raw byte blob. The writer does not support these.
    Bytes(Vec<u8>),
}

impl Token {
    /// Returns the token kind without its payload.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::StartObject => "StartObject",
            Self::EndObject => "EndObject",
            Self::StartArray => "StartArray",
            Self::EndArray => "EndArray",
            Self::PropertyName(_) => "PropertyName",
            Self::String(_) => "String",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Boolean(_) => "Boolean",
            Self::Null => "Null",
            Self::Undefined => "Undefined",
            Self::Bytes(_) => "Bytes",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// A forward-only cursor over JSON tokens.
pub trait TokenSource {
    /// Moves to the next token. Returns `false` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying input cannot be tokenized.
    fn advance(&mut self) -> BlittableResult<bool>;

    /// Returns the token the cursor is on.
    fn current_token(&self) -> &Token;
}

impl<T: TokenSource + ?Sized> TokenSource for &mut T {
    fn advance(&mut self) -> BlittableResult<bool> {
        (**self).advance()
    }

    fn current_token(&self) -> &Token {
        (**self).current_token()
    }
}

/// A token source backed by a vector.
///
/// # Example
///
/// ```rust
/// use blittable_format::{Token, TokenBuffer, TokenSource};
///
/// let mut tokens = TokenBuffer::parse_json(r#"{"a": 1}"#).unwrap();
/// assert!(tokens.advance().unwrap());
/// assert_eq!(tokens.current_token(), &Token::StartObject);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
    position: Option<usize>,
    end: Token,
}

impl TokenBuffer {
    /// Creates a source over `tokens`.
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: None,
            end: Token::None,
        }
    }

    /// Flattens a JSON value into tokens, keeping object key order.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::Unsupported`] for an integer outside the
    /// `i64` range, which cannot be stored without losing precision.
    pub fn from_json(value: &JsonValue) -> BlittableResult<Self> {
        let mut tokens = Vec::new();
        push_json(value, &mut tokens)?;
        Ok(Self::new(tokens))
    }

    /// Parses JSON text into tokens.
    ///
    /// # Errors
    ///
    /// Returns [`BlittableError::InvalidFormat`] if `text` is not valid JSON,
    /// and the errors of [`TokenBuffer::from_json`].
    pub fn parse_json(text: &str) -> BlittableResult<Self> {
        let value: JsonValue = serde_json::from_str(text)
            .map_err(|e| BlittableError::invalid_format(format!("invalid JSON input: {e}")))?;
        Self::from_json(&value)
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if there are no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns all tokens.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl From<Vec<Token>> for TokenBuffer {
    fn from(tokens: Vec<Token>) -> Self {
        Self::new(tokens)
    }
}

impl TokenSource for TokenBuffer {
    fn advance(&mut self) -> BlittableResult<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.tokens.len() {
            self.position = Some(next);
            Ok(true)
        } else {
            self.position = Some(self.tokens.len());
            Ok(false)
        }
    }

    fn current_token(&self) -> &Token {
        self.position
            .and_then(|p| self.tokens.get(p))
            .unwrap_or(&self.end)
    }
}

fn push_json(value: &JsonValue, tokens: &mut Vec<Token>) -> BlittableResult<()> {
    match value {
        JsonValue::Null => tokens.push(Token::Null),
        JsonValue::Bool(b) => tokens.push(Token::Boolean(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                tokens.push(Token::Integer(i));
            } else if let Some(u) = n.as_u64() {
                return Err(BlittableError::unsupported(format!(
                    "integer {u} out of i64 range"
                )));
            } else {
                let f = n
                    .as_f64()
                    .ok_or_else(|| BlittableError::unsupported(format!("number {n}")))?;
                tokens.push(Token::Float(f));
            }
        }
        JsonValue::String(s) => tokens.push(Token::String(s.clone())),
        JsonValue::Array(items) => {
            tokens.push(Token::StartArray);
            for item in items {
                push_json(item, tokens)?;
            }
            tokens.push(Token::EndArray);
        }
        JsonValue::Object(map) => {
            tokens.push(Token::StartObject);
            for (key, item) in map {
                tokens.push(Token::PropertyName(key.clone()));
                push_json(item, tokens)?;
            }
            tokens.push(Token::EndObject);
        }
    }
    Ok(())
}
