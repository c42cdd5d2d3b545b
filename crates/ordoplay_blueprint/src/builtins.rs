// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builtin functions callable from expressions.

use crate::error::{BlueprintError, Result};
use crate::value::Value;
use indexmap::IndexMap;

/// Host function signature
pub type BuiltinFn = fn(&[Value]) -> Result<Value>;

/// A registered builtin
#[derive(Debug, Clone)]
pub struct Builtin {
    /// Number of arguments the function takes
    pub arity: usize,
    /// Implementation
    pub function: BuiltinFn,
}

/// Registry of builtin functions keyed by symbol
#[derive(Debug, Clone)]
pub struct Builtins {
    functions: IndexMap<String, Builtin>,
}

impl Builtins {
    /// Create a registry with the standard math and text functions
    pub fn new() -> Self {
        let mut builtins = Self::empty();
        builtins.register("PI", 0, |_| Ok(Value::Number(std::f64::consts::PI)));
        builtins.register("abs", 1, |args| Ok(Value::Number(number(args, 0)?.abs())));
        builtins.register("min", 2, |args| {
            Ok(Value::Number(number(args, 0)?.min(number(args, 1)?)))
        });
        builtins.register("max", 2, |args| {
            Ok(Value::Number(number(args, 0)?.max(number(args, 1)?)))
        });
        builtins.register("indexOf", 2, index_of);
        builtins.register("slice", 3, slice);
        builtins.register("split", 2, split);
        builtins.register("length", 1, length);
        builtins
    }

    /// Create a registry without any function
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// Register a function, replacing any previous one with the same symbol
    pub fn register(&mut self, symbol: impl Into<String>, arity: usize, function: BuiltinFn) {
        self.functions
            .insert(symbol.into(), Builtin { arity, function });
    }

    /// Get a function by symbol
    pub fn get(&self, symbol: &str) -> Option<&Builtin> {
        self.functions.get(symbol)
    }

    /// Registered symbols in registration order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Call a function after checking its arity
    pub fn call(&self, symbol: &str, args: &[Value]) -> Result<Value> {
        let builtin = self
            .get(symbol)
            .ok_or_else(|| BlueprintError::UnknownFunction(symbol.to_string()))?;
        if args.len() != builtin.arity {
            return Err(BlueprintError::Arity {
                symbol: symbol.to_string(),
                expected: builtin.arity,
                actual: args.len(),
            });
        }
        (builtin.function)(args)
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

fn number(args: &[Value], index: usize) -> Result<f64> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(BlueprintError::TypeMismatch {
            expected: "number",
            found: other.kind_name(),
        }),
        None => Err(BlueprintError::MissingInput(format!("argument {index}"))),
    }
}

fn text(args: &[Value], index: usize) -> Result<&str> {
    match args.get(index) {
        Some(Value::Text(s)) => Ok(s),
        Some(other) => Err(BlueprintError::TypeMismatch {
            expected: "text",
            found: other.kind_name(),
        }),
        None => Err(BlueprintError::MissingInput(format!("argument {index}"))),
    }
}

/// Character index of the first match, -1 when absent
fn index_of(args: &[Value]) -> Result<Value> {
    let haystack = text(args, 0)?;
    let needle = text(args, 1)?;
    let index = haystack
        .find(needle)
        .map_or(-1.0, |byte| haystack[..byte].chars().count() as f64);
    Ok(Value::Number(index))
}

/// Substring between two character indexes; negative indexes count from the end
fn slice(args: &[Value]) -> Result<Value> {
    let chars: Vec<char> = text(args, 0)?.chars().collect();
    let len = chars.len() as f64;
    let clamp = |n: f64| {
        let n = if n.is_nan() { 0.0 } else { n.trunc() };
        let n = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
        n as usize
    };
    let start = clamp(number(args, 1)?);
    let end = clamp(number(args, 2)?);
    let sliced = if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    };
    Ok(Value::Text(sliced))
}

/// Split text on a separator; an empty separator splits into characters
fn split(args: &[Value]) -> Result<Value> {
    let source = text(args, 0)?;
    let separator = text(args, 1)?;
    let parts = if separator.is_empty() {
        source.chars().map(|c| Value::Text(c.to_string())).collect()
    } else {
        source
            .split(separator)
            .map(|part| Value::Text(part.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

/// Length of a text or an array
fn length(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Text(s)) => Ok(Value::Number(s.chars().count() as f64)),
        Some(Value::Array(items)) => Ok(Value::Number(items.len() as f64)),
        Some(other) => Err(BlueprintError::TypeMismatch {
            expected: "text or array",
            found: other.kind_name(),
        }),
        None => Err(BlueprintError::MissingInput("argument 0".to_string())),
    }
}
