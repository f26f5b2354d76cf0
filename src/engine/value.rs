//! Values exchanged with the engine's variable tree.

use std::fmt;

use serde::Serialize;

/// A scalar or array value read from, or written to, an engine variable.
///
/// The engine speaks a textual grammar: vectors as whitespace-separated
/// numbers in brackets (`[0.5 1 2.25]`), scalars as bare numbers, and
/// everything else as plain text. `Value` round-trips that grammar and
/// serializes transparently to JSON (array / number / string) for the
/// client side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// A single numeric value.
    Float(f64),
    /// A free-form text value (pooling types, selector tokens).
    Text(String),
    /// A numeric array, e.g. a per-angle pool.
    Vector(Vec<f64>),
}

impl Value {
    /// Parse the engine's text form of a value.
    ///
    /// Never fails: anything that is neither a bracketed numeric vector
    /// nor a bare number is text.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(inner) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let numbers: Result<Vec<f64>, _> =
                inner.split_whitespace().map(str::parse).collect();
            if let Ok(numbers) = numbers {
                return Value::Vector(numbers);
            }
        }
        match trimmed.parse::<f64>() {
            Ok(number) => Value::Float(number),
            Err(_) => Value::Text(trimmed.to_string()),
        }
    }

    /// The numeric array inside, if this is a vector.
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Value::Vector(numbers) => Some(numbers),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Float(number)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

// Integral floats print without a decimal point; several engine
// variables (window lengths, counts) are integers on the remote side
// and reject "25.0".
fn write_number(f: &mut fmt::Formatter<'_>, number: f64) -> fmt::Result {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        write!(f, "{}", number as i64)
    } else {
        write!(f, "{}", number)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(number) => write_number(f, *number),
            Value::Text(text) => f.write_str(text),
            Value::Vector(numbers) => {
                f.write_str("[")?;
                for (i, number) in numbers.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write_number(f, *number)?;
                }
                f.write_str("]")
            }
        }
    }
}
