// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression node.

use crate::context::ExecutionContext;
use crate::error::{BlueprintError, Result};
use crate::expression::Expression;
use crate::node::Continuation;
use crate::port::{EnterPortId, ExitPortId, InputPortId, OutputPortId};
use indexmap::IndexMap;

/// Evaluates an expression tree against its named inputs and emits the result
#[derive(Debug, Clone)]
pub struct ExpressionNode {
    /// Expression to evaluate
    pub expression: Option<Expression>,
    /// Named inputs in declaration order
    pub(crate) inputs: IndexMap<String, InputPortId>,
    /// Result output
    pub result: OutputPortId,
    /// Entry
    pub enter: EnterPortId,
    /// Exit
    pub exit: ExitPortId,
}

impl ExpressionNode {
    /// Get the input port declared under a symbol
    pub fn input_port(&self, symbol: &str) -> Option<InputPortId> {
        self.inputs.get(symbol).copied()
    }

    /// Symbols of the declared inputs
    pub fn input_symbols(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub(crate) fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Continuation> {
        // Expressions without inputs are constants and are rejected
        if self.inputs.is_empty() {
            return Err(BlueprintError::NoExpressionInputs);
        }

        let expression = self
            .expression
            .as_ref()
            .ok_or(BlueprintError::MissingExpression)?;

        let value = expression.evaluate(ctx, self)?;
        ctx.output(self.result, value)?;
        Ok(Continuation::Exit(self.exit))
    }
}
