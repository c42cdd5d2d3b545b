// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concrete flow nodes.

mod basic;
mod branch;
mod expression;
mod loops;

pub use basic::{EndNode, EntryNode, VarNode};
pub use branch::IfNode;
pub use expression::ExpressionNode;
pub use loops::{ForNode, ForOfNode, WhileNode};

use crate::context::ExecutionContext;
use crate::error::{BlueprintError, Result};
use crate::port::InputPortId;
use crate::value::Value;

/// Read a boolean condition; an input with no value counts as false
fn read_condition(ctx: &mut ExecutionContext<'_>, port: InputPortId) -> Result<bool> {
    match ctx.input(port)? {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(BlueprintError::TypeMismatch {
            expected: "boolean",
            found: other.kind_name(),
        }),
    }
}

/// Read a required value from an input
fn read_required(ctx: &mut ExecutionContext<'_>, port: InputPortId) -> Result<Value> {
    ctx.input(port)?.ok_or_else(|| {
        let name = ctx
            .graph()
            .input_port(port)
            .map(|input| input.name.clone())
            .unwrap_or_default();
        BlueprintError::MissingInput(name)
    })
}

/// Read a required number from an input
fn read_number(ctx: &mut ExecutionContext<'_>, port: InputPortId) -> Result<f64> {
    let value = read_required(ctx, port)?;
    value.as_number().ok_or(BlueprintError::TypeMismatch {
        expected: "number",
        found: value.kind_name(),
    })
}
