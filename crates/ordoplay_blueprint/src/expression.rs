// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression trees evaluated by expression nodes.
//!
//! Expressions are immutable and keep no state between evaluations. Binary
//! operators always evaluate both operands before applying the operator.

use crate::context::ExecutionContext;
use crate::error::{BlueprintError, Result};
use crate::nodes::ExpressionNode;
use crate::value::Value;

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// Value equality
    Equal,
    /// Value inequality
    NotEqual,
    /// Number addition
    Add,
    /// Number subtraction
    Subtract,
    /// Number multiplication
    Multiply,
    /// Number division
    Divide,
    /// Number division truncated toward zero
    IntDivide,
    /// Number remainder
    Modulus,
    /// Number power
    Power,
    /// Number `<`
    LessThan,
    /// Number `<=`
    LessEqual,
    /// Number `>`
    GreaterThan,
    /// Number `>=`
    GreaterEqual,
    /// Text concatenation of both operands' text forms
    Concat,
    /// Text `<`
    TextLessThan,
    /// Text `<=`
    TextLessEqual,
    /// Text `>`
    TextGreaterThan,
    /// Text `>=`
    TextGreaterEqual,
    /// Boolean and
    And,
    /// Boolean or
    Or,
    /// Bitwise and on 32-bit integers
    BitAnd,
    /// Bitwise or on 32-bit integers
    BitOr,
    /// Bitwise xor on 32-bit integers
    BitXor,
}

impl BinaryOperator {
    /// Operator name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::IntDivide => "//",
            Self::Modulus => "%",
            Self::Power => "**",
            Self::LessThan | Self::TextLessThan => "<",
            Self::LessEqual | Self::TextLessEqual => "<=",
            Self::GreaterThan | Self::TextGreaterThan => ">",
            Self::GreaterEqual | Self::TextGreaterEqual => ">=",
            Self::Concat => "..",
            Self::And => "and",
            Self::Or => "or",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
        }
    }

    /// Apply the operator to evaluated operands
    pub fn apply(self, left: &Value, right: &Value) -> Result<Value> {
        let value = match self {
            Self::Equal => Value::Bool(left == right),
            Self::NotEqual => Value::Bool(left != right),
            Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::IntDivide
            | Self::Modulus
            | Self::Power => {
                let (l, r) = self.numbers(left, right)?;
                Value::Number(match self {
                    Self::Add => l + r,
                    Self::Subtract => l - r,
                    Self::Multiply => l * r,
                    Self::Divide => l / r,
                    Self::IntDivide => (l / r).trunc(),
                    Self::Modulus => l % r,
                    _ => l.powf(r),
                })
            }
            Self::LessThan | Self::LessEqual | Self::GreaterThan | Self::GreaterEqual => {
                let (l, r) = self.numbers(left, right)?;
                Value::Bool(match self {
                    Self::LessThan => l < r,
                    Self::LessEqual => l <= r,
                    Self::GreaterThan => l > r,
                    _ => l >= r,
                })
            }
            Self::Concat => Value::Text(format!("{left}{right}")),
            Self::TextLessThan
            | Self::TextLessEqual
            | Self::TextGreaterThan
            | Self::TextGreaterEqual => {
                let (l, r) = self.texts(left, right)?;
                Value::Bool(match self {
                    Self::TextLessThan => l < r,
                    Self::TextLessEqual => l <= r,
                    Self::TextGreaterThan => l > r,
                    _ => l >= r,
                })
            }
            Self::And | Self::Or => {
                let (l, r) = self.booleans(left, right)?;
                Value::Bool(if self == Self::And { l && r } else { l || r })
            }
            Self::BitAnd | Self::BitOr | Self::BitXor => {
                let (l, r) = self.numbers(left, right)?;
                let (l, r) = (to_int32(l), to_int32(r));
                Value::Number(f64::from(match self {
                    Self::BitAnd => l & r,
                    Self::BitOr => l | r,
                    _ => l ^ r,
                }))
            }
        };
        Ok(value)
    }

    fn numbers(self, left: &Value, right: &Value) -> Result<(f64, f64)> {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
            (Value::Number(_), other) | (other, _) => Err(self.unsupported(other)),
        }
    }

    fn texts<'v>(self, left: &'v Value, right: &'v Value) -> Result<(&'v str, &'v str)> {
        match (left, right) {
            (Value::Text(l), Value::Text(r)) => Ok((l.as_str(), r.as_str())),
            (Value::Text(_), other) | (other, _) => Err(self.unsupported(other)),
        }
    }

    fn booleans(self, left: &Value, right: &Value) -> Result<(bool, bool)> {
        match (left, right) {
            (Value::Bool(l), Value::Bool(r)) => Ok((*l, *r)),
            (Value::Bool(_), other) | (other, _) => Err(self.unsupported(other)),
        }
    }

    fn unsupported(self, operand: &Value) -> BlueprintError {
        BlueprintError::UnsupportedOperand {
            operator: self.name(),
            found: operand.kind_name(),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Boolean not
    Not,
    /// Bitwise not on a 32-bit integer
    BitNot,
    /// Number negation
    Negate,
    /// Convert to text
    ToText,
    /// Convert to number
    ToNumber,
    /// Convert to number truncated toward zero
    ToInteger,
    /// Convert to boolean by truthiness
    ToBoolean,
}

impl UnaryOperator {
    /// Operator name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::BitNot => "~",
            Self::Negate => "neg",
            Self::ToText => "text",
            Self::ToNumber => "number",
            Self::ToInteger => "integer",
            Self::ToBoolean => "boolean",
        }
    }

    /// Apply the operator to an evaluated operand
    pub fn apply(self, operand: &Value) -> Result<Value> {
        let value = match (self, operand) {
            (Self::Not, Value::Bool(b)) => Value::Bool(!b),
            (Self::BitNot, Value::Number(n)) => Value::Number(f64::from(!to_int32(*n))),
            (Self::Negate, Value::Number(n)) => Value::Number(-n),
            (Self::ToText, value) => Value::Text(value.to_string()),
            (Self::ToNumber, value) => Value::Number(self.to_number(value)?),
            (Self::ToInteger, value) => Value::Number(self.to_number(value)?.trunc()),
            (Self::ToBoolean, value) => Value::Bool(value.is_truthy()),
            (_, other) => {
                return Err(BlueprintError::UnsupportedOperand {
                    operator: self.name(),
                    found: other.kind_name(),
                })
            }
        };
        Ok(value)
    }

    fn to_number(self, value: &Value) -> Result<f64> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => Ok(parse_number(s)),
            other => Err(BlueprintError::UnsupportedOperand {
                operator: self.name(),
                found: other.kind_name(),
            }),
        }
    }
}

/// Parse text like a script `Number()` conversion.
///
/// Blank text is zero, `0x`/`0o`/`0b` select a radix, `Infinity` may carry a
/// sign, and anything else must be a plain decimal literal.
fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    let radix = match text.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits
            .chars()
            .try_fold(0.0, |acc: f64, c| {
                c.to_digit(radix)
                    .map(|d| acc * f64::from(radix) + f64::from(d))
            })
            .unwrap_or(f64::NAN);
    }

    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned == "Infinity" {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    // Keeps out the `inf`/`nan` spellings the float parser would accept
    let decimal = unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !decimal {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

/// Wrap a number into a 32-bit integer the way bitwise operators see it
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc() % 4_294_967_296.0;
    wrapped as i64 as i32
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Fixed literal
    Constant(Value),
    /// Named input of the owning expression node
    Input(String),
    /// Unary operation
    Unary {
        /// Operator
        operator: UnaryOperator,
        /// Operand
        operand: Option<Box<Expression>>,
    },
    /// Binary operation
    Binary {
        /// Operator
        operator: BinaryOperator,
        /// Left operand
        left: Option<Box<Expression>>,
        /// Right operand
        right: Option<Box<Expression>>,
    },
    /// Builtin function call
    Call {
        /// Function symbol
        symbol: String,
        /// Argument expressions
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// Create a constant expression
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// Create an input expression
    pub fn input(symbol: impl Into<String>) -> Self {
        Self::Input(symbol.into())
    }

    /// Create a unary expression
    pub fn unary(operator: UnaryOperator, operand: Expression) -> Self {
        Self::Unary {
            operator,
            operand: Some(Box::new(operand)),
        }
    }

    /// Create a binary expression
    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::Binary {
            operator,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// Create a call expression
    pub fn call(symbol: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Self::Call {
            symbol: symbol.into(),
            arguments,
        }
    }

    /// Evaluate against the inputs of `node`
    pub fn evaluate(&self, ctx: &mut ExecutionContext<'_>, node: &ExpressionNode) -> Result<Value> {
        match self {
            Self::Constant(value) => Ok(value.clone()),
            Self::Input(symbol) => {
                let port = node
                    .input_port(symbol)
                    .ok_or_else(|| BlueprintError::UnknownInput(symbol.clone()))?;
                ctx.input(port)?
                    .ok_or_else(|| BlueprintError::MissingInput(symbol.clone()))
            }
            Self::Unary { operator, operand } => {
                let operand = operand
                    .as_deref()
                    .ok_or(BlueprintError::MissingOperand("unary"))?;
                let value = operand.evaluate(ctx, node)?;
                operator.apply(&value)
            }
            Self::Binary {
                operator,
                left,
                right,
            } => {
                let (Some(left), Some(right)) = (left.as_deref(), right.as_deref()) else {
                    return Err(BlueprintError::MissingOperand("binary"));
                };
                let left = left.evaluate(ctx, node)?;
                let right = right.evaluate(ctx, node)?;
                operator.apply(&left, &right)
            }
            Self::Call { symbol, arguments } => {
                let values = arguments
                    .iter()
                    .map(|argument| argument.evaluate(ctx, node))
                    .collect::<Result<Vec<_>>>()?;
                ctx.builtins().call(symbol, &values)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::error::ErrorCategory;
    use crate::graph::Graph;
    use crate::node::NodeKind;
    use indexmap::IndexMap;

    fn eval(expression: Expression) -> Result<Value> {
        let mut graph = Graph::new("test");
        let node_id = graph.add_expression();
        let x = graph.add_expression_input(node_id, "x").unwrap();
        graph.set_default(x, Value::from(5)).unwrap();
        let builtins = Builtins::new();
        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let NodeKind::Expression(node) = &graph.node(node_id).unwrap().kind else {
            panic!("expected an expression node");
        };
        expression.evaluate(&mut ctx, node)
    }

    fn binary(operator: BinaryOperator, left: impl Into<Value>, right: impl Into<Value>) -> Result<Value> {
        eval(Expression::binary(
            operator,
            Expression::constant(left),
            Expression::constant(right),
        ))
    }

    #[test]
    fn test_number_arithmetic() {
        assert_eq!(binary(BinaryOperator::Add, 2, 3).unwrap(), Value::from(5));
        assert_eq!(binary(BinaryOperator::Subtract, 2, 3).unwrap(), Value::from(-1));
        assert_eq!(binary(BinaryOperator::Multiply, 4, 2.5).unwrap(), Value::from(10));
        assert_eq!(binary(BinaryOperator::Divide, 7, 2).unwrap(), Value::from(3.5));
        assert_eq!(binary(BinaryOperator::IntDivide, -7, 2).unwrap(), Value::from(-3));
        assert_eq!(binary(BinaryOperator::Modulus, -7, 3).unwrap(), Value::from(-1));
        assert_eq!(binary(BinaryOperator::Power, 2, 10).unwrap(), Value::from(1024));
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        let value = binary(BinaryOperator::Divide, 1, 0).unwrap();
        assert_eq!(value, Value::Number(f64::INFINITY));
        let value = binary(BinaryOperator::Modulus, 1, 0).unwrap();
        assert!(value.as_number().unwrap().is_nan());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinaryOperator::LessThan, 1, 2).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::GreaterEqual, 1, 2).unwrap(), Value::Bool(false));
        assert_eq!(binary(BinaryOperator::TextLessThan, "abc", "abd").unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::TextGreaterThan, "b", "a").unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::Equal, 0, 0).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::Equal, 1, "1").unwrap(), Value::Bool(false));
        assert_eq!(binary(BinaryOperator::NotEqual, "a", "b").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_concat_coerces_to_text() {
        assert_eq!(binary(BinaryOperator::Concat, "hp: ", 12).unwrap(), Value::from("hp: 12"));
        assert_eq!(binary(BinaryOperator::Concat, true, 1.5).unwrap(), Value::from("true1.5"));
    }

    #[test]
    fn test_logical_and_bitwise() {
        assert_eq!(binary(BinaryOperator::And, true, false).unwrap(), Value::Bool(false));
        assert_eq!(binary(BinaryOperator::Or, true, false).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::BitAnd, 6, 3).unwrap(), Value::from(2));
        assert_eq!(binary(BinaryOperator::BitOr, 6, 3).unwrap(), Value::from(7));
        assert_eq!(binary(BinaryOperator::BitXor, 6, 3).unwrap(), Value::from(5));
        assert_eq!(binary(BinaryOperator::BitOr, 4_294_967_297.0, 0).unwrap(), Value::from(1));
    }

    #[test]
    fn test_unsupported_operand_is_evaluation_error() {
        let err = binary(BinaryOperator::Add, "a", 1).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Evaluation);
        assert!(matches!(err, BlueprintError::UnsupportedOperand { operator: "+", found: "text" }));

        let err = binary(BinaryOperator::And, true, 1).unwrap_err();
        assert!(matches!(err, BlueprintError::UnsupportedOperand { found: "number", .. }));
    }

    #[test]
    fn test_unary_operators() {
        let unary = |operator, value: Value| eval(Expression::unary(operator, Expression::Constant(value)));
        assert_eq!(unary(UnaryOperator::Not, Value::Bool(true)).unwrap(), Value::Bool(false));
        assert_eq!(unary(UnaryOperator::BitNot, Value::from(0)).unwrap(), Value::from(-1));
        assert_eq!(unary(UnaryOperator::Negate, Value::from(2)).unwrap(), Value::from(-2));
        assert_eq!(unary(UnaryOperator::ToText, Value::from(3)).unwrap(), Value::from("3"));
        assert_eq!(unary(UnaryOperator::ToNumber, Value::from(" 4.5 ")).unwrap(), Value::from(4.5));
        assert_eq!(unary(UnaryOperator::ToNumber, Value::Bool(true)).unwrap(), Value::from(1));
        assert!(unary(UnaryOperator::ToNumber, Value::from("x")).unwrap().as_number().unwrap().is_nan());
        assert_eq!(unary(UnaryOperator::ToInteger, Value::from(-4.7)).unwrap(), Value::from(-4));
        assert_eq!(unary(UnaryOperator::ToBoolean, Value::from("")).unwrap(), Value::Bool(false));
        assert!(unary(UnaryOperator::Negate, Value::from("x")).is_err());
    }

    #[test]
    fn test_text_to_number_parsing() {
        assert_eq!(parse_number("  "), 0.0);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert_eq!(parse_number("-.5"), -0.5);
        assert_eq!(parse_number("0x10"), 16.0);
        assert_eq!(parse_number("0B101"), 5.0);
        assert_eq!(parse_number("0o17"), 15.0);
        assert_eq!(parse_number("Infinity"), f64::INFINITY);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        for text in ["inf", "infinity", "NaN", "0x", "0xg", "-0x10", "1e", "1_000", "12px"] {
            assert!(parse_number(text).is_nan(), "{text:?} should not parse");
        }
    }

    #[test]
    fn test_input_expression_reads_port() {
        let value = eval(Expression::binary(
            BinaryOperator::Add,
            Expression::input("x"),
            Expression::constant(1),
        ))
        .unwrap();
        assert_eq!(value, Value::from(6));

        let err = eval(Expression::input("nope")).unwrap_err();
        assert!(matches!(err, BlueprintError::UnknownInput(ref s) if s == "nope"));
        assert_eq!(err.category(), ErrorCategory::Reference);
    }

    #[test]
    fn test_missing_operand_is_reference_error() {
        let err = eval(Expression::Binary {
            operator: BinaryOperator::Add,
            left: Some(Box::new(Expression::constant(1))),
            right: None,
        })
        .unwrap_err();
        assert!(matches!(err, BlueprintError::MissingOperand("binary")));
        assert_eq!(err.category(), ErrorCategory::Reference);

        let err = eval(Expression::Unary {
            operator: UnaryOperator::Not,
            operand: None,
        })
        .unwrap_err();
        assert!(matches!(err, BlueprintError::MissingOperand("unary")));
    }

    #[test]
    fn test_call_expression() {
        let value = eval(Expression::call(
            "max",
            vec![Expression::input("x"), Expression::constant(9)],
        ))
        .unwrap();
        assert_eq!(value, Value::from(9));

        let err = eval(Expression::call("teleport", vec![])).unwrap_err();
        assert!(matches!(err, BlueprintError::UnknownFunction(_)));
    }
}
