// SPDX-License-Identifier: MIT OR Apache-2.0
//! Branch node.

use super::read_condition;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::node::Continuation;
use crate::port::{EnterPortId, ExitPortId, InputPortId};

/// If/else branch
#[derive(Debug, Clone)]
pub struct IfNode {
    /// Branch condition
    pub condition: InputPortId,
    /// Entry
    pub enter: EnterPortId,
    /// Taken when the condition is true
    pub when_true: ExitPortId,
    /// Taken otherwise
    pub when_false: ExitPortId,
}

impl IfNode {
    pub(crate) fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Continuation> {
        if read_condition(ctx, self.condition)? {
            Ok(Continuation::Exit(self.when_true))
        } else {
            Ok(Continuation::Exit(self.when_false))
        }
    }
}
