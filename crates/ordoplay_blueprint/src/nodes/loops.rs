// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loop nodes.
//!
//! Every loop has two entries (`enter`, `break`) and two exits (`body`, a
//! subline, and `exit`). Loops keep no state of their own: the iteration
//! position travels in the [`LoopState`](crate::context::LoopState) saved on
//! the flow stack while the body runs, and the break entry only takes effect
//! when the top frame belongs to the same loop.

use super::{read_condition, read_number, read_required};
use crate::context::{ExecutionContext, FlowState, LoopCursor};
use crate::error::{BlueprintError, Result};
use crate::node::{Continuation, NodeId};
use crate::port::{EnterPortId, ExitPortId, InputPortId, OutputPortId};

/// Flag the running loop as broken, if `node` owns the top frame
fn break_loop(ctx: &mut ExecutionContext<'_>, node: NodeId) -> Result<Continuation> {
    match ctx.try_peek_state_mut(node).and_then(FlowState::as_loop_mut) {
        Some(state) => {
            state.call_break = true;
            Ok(Continuation::Interrupt)
        }
        None => Err(BlueprintError::BreakOutsideLoop),
    }
}

/// Check that a resumed state was produced by `node` and was not broken
fn should_continue(state: &FlowState, node: NodeId) -> Result<bool> {
    if state.node() != node {
        return Err(BlueprintError::ForeignObject("flow state"));
    }
    let looping = state
        .as_loop()
        .ok_or(BlueprintError::ForeignObject("flow state"))?;
    Ok(!looping.call_break)
}

fn in_range(current: f64, end: f64, step: f64) -> bool {
    if step > 0.0 {
        current < end
    } else {
        current > end
    }
}

/// While loop
#[derive(Debug, Clone)]
pub struct WhileNode {
    /// Owning node, matched against the top frame on break
    pub id: NodeId,
    /// Loop condition
    pub condition: InputPortId,
    /// Main entry
    pub enter: EnterPortId,
    /// Break entry
    pub break_enter: EnterPortId,
    /// Loop body
    pub body: ExitPortId,
    /// After the loop
    pub exit: ExitPortId,
}

impl WhileNode {
    pub(crate) fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        enter: EnterPortId,
    ) -> Result<Continuation> {
        if enter == self.enter {
            if read_condition(ctx, self.condition)? {
                let state = FlowState::looping(self.id, LoopCursor::Condition);
                return Ok(Continuation::Subline(self.body, state));
            }
            Ok(Continuation::Exit(self.exit))
        } else if enter == self.break_enter {
            break_loop(ctx, self.id)
        } else {
            Err(BlueprintError::InvalidEnter("while".to_string()))
        }
    }

    pub(crate) fn resume(
        &self,
        ctx: &mut ExecutionContext<'_>,
        state: FlowState,
    ) -> Result<Continuation> {
        if should_continue(&state, self.id)? && read_condition(ctx, self.condition)? {
            return Ok(Continuation::Subline(self.body, state));
        }
        Ok(Continuation::Exit(self.exit))
    }
}

/// Counting loop over `start..end` by `step`
#[derive(Debug, Clone)]
pub struct ForNode {
    /// Owning node
    pub id: NodeId,
    /// First index
    pub start: InputPortId,
    /// Exclusive bound
    pub end: InputPortId,
    /// Increment
    pub step: InputPortId,
    /// Current index
    pub index: OutputPortId,
    /// Main entry
    pub enter: EnterPortId,
    /// Break entry
    pub break_enter: EnterPortId,
    /// Loop body
    pub body: ExitPortId,
    /// After the loop
    pub exit: ExitPortId,
}

impl ForNode {
    pub(crate) fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        enter: EnterPortId,
    ) -> Result<Continuation> {
        if enter == self.break_enter {
            return break_loop(ctx, self.id);
        }
        if enter != self.enter {
            return Err(BlueprintError::InvalidEnter("for".to_string()));
        }

        let start = read_number(ctx, self.start)?;
        let end = read_number(ctx, self.end)?;
        let step = read_number(ctx, self.step)?;
        if step == 0.0 {
            return Err(BlueprintError::ZeroStep);
        }

        if !in_range(start, end, step) {
            return Ok(Continuation::Exit(self.exit));
        }

        ctx.output(self.index, start.into())?;
        let cursor = LoopCursor::Counter {
            current: start,
            end,
            step,
        };
        Ok(Continuation::Subline(
            self.body,
            FlowState::looping(self.id, cursor),
        ))
    }

    pub(crate) fn resume(
        &self,
        ctx: &mut ExecutionContext<'_>,
        mut state: FlowState,
    ) -> Result<Continuation> {
        if !should_continue(&state, self.id)? {
            return Ok(Continuation::Exit(self.exit));
        }

        let next = match state.as_loop_mut().map(|looping| &mut looping.cursor) {
            Some(LoopCursor::Counter { current, end, step }) => {
                *current += *step;
                in_range(*current, *end, *step).then_some(*current)
            }
            _ => return Err(BlueprintError::ForeignObject("flow state")),
        };

        match next {
            Some(index) => {
                ctx.output(self.index, index.into())?;
                Ok(Continuation::Subline(self.body, state))
            }
            None => Ok(Continuation::Exit(self.exit)),
        }
    }
}

/// Loop over the elements of an array
#[derive(Debug, Clone)]
pub struct ForOfNode {
    /// Owning node
    pub id: NodeId,
    /// Array to iterate
    pub array: InputPortId,
    /// Current element
    pub item: OutputPortId,
    /// Main entry
    pub enter: EnterPortId,
    /// Break entry
    pub break_enter: EnterPortId,
    /// Loop body
    pub body: ExitPortId,
    /// After the loop
    pub exit: ExitPortId,
}

impl ForOfNode {
    pub(crate) fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        enter: EnterPortId,
    ) -> Result<Continuation> {
        if enter == self.break_enter {
            return break_loop(ctx, self.id);
        }
        if enter != self.enter {
            return Err(BlueprintError::InvalidEnter("for-of".to_string()));
        }

        let items = match read_required(ctx, self.array)? {
            crate::value::Value::Array(items) => items,
            other => {
                return Err(BlueprintError::TypeMismatch {
                    expected: "array",
                    found: other.kind_name(),
                })
            }
        };

        let Some(first) = items.first().cloned() else {
            return Ok(Continuation::Exit(self.exit));
        };

        ctx.output(self.item, first)?;
        let cursor = LoopCursor::Items { items, next: 1 };
        Ok(Continuation::Subline(
            self.body,
            FlowState::looping(self.id, cursor),
        ))
    }

    pub(crate) fn resume(
        &self,
        ctx: &mut ExecutionContext<'_>,
        mut state: FlowState,
    ) -> Result<Continuation> {
        if !should_continue(&state, self.id)? {
            return Ok(Continuation::Exit(self.exit));
        }

        let item = match state.as_loop_mut().map(|looping| &mut looping.cursor) {
            Some(LoopCursor::Items { items, next }) => {
                let item = items.get(*next).cloned();
                *next += 1;
                item
            }
            _ => return Err(BlueprintError::ForeignObject("flow state")),
        };

        match item {
            Some(item) => {
                ctx.output(self.item, item)?;
                Ok(Continuation::Subline(self.body, state))
            }
            None => Ok(Continuation::Exit(self.exit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builtins::Builtins;
    use crate::context::{ExecutionContext, FlowState, LoopCursor};
    use crate::error::BlueprintError;
    use crate::graph::Graph;
    use crate::node::{Continuation, FlowNode};
    use crate::value::Value;
    use indexmap::IndexMap;

    #[test]
    fn test_while_false_condition_exits() {
        let mut graph = Graph::new("test");
        let looping = graph.add_while();
        let condition = graph.node(looping).unwrap().ports.inputs[0];
        graph.set_default(condition, Value::Bool(false)).unwrap();
        let builtins = Builtins::new();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(looping).unwrap();
        let next = node.execute(&mut ctx, node.ports.enters[0]).unwrap();
        assert_eq!(next, Continuation::Exit(node.ports.exits[1]));
    }

    #[test]
    fn test_while_break_marks_top_frame() {
        let mut graph = Graph::new("test");
        let looping = graph.add_while();
        let condition = graph.node(looping).unwrap().ports.inputs[0];
        graph.set_default(condition, Value::Bool(true)).unwrap();
        let builtins = Builtins::new();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(looping).unwrap();
        let Continuation::Subline(body, state) =
            node.execute(&mut ctx, node.ports.enters[0]).unwrap()
        else {
            panic!("expected the loop body to open");
        };
        assert_eq!(body, node.ports.exits[0]);

        ctx.push(looping, state);
        let next = node.execute(&mut ctx, node.ports.enters[1]).unwrap();
        assert_eq!(next, Continuation::Interrupt);

        let state = ctx.pop().unwrap().into_state();
        assert!(state.as_loop().unwrap().call_break);
        let next = node.resume(&mut ctx, state).unwrap();
        assert_eq!(next, Continuation::Exit(node.ports.exits[1]));
    }

    #[test]
    fn test_break_outside_loop_fails() {
        let mut graph = Graph::new("test");
        let outer = graph.add_while();
        let inner = graph.add_while();
        let builtins = Builtins::new();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(outer).unwrap();
        let err = node.execute(&mut ctx, node.ports.enters[1]).unwrap_err();
        assert!(matches!(err, BlueprintError::BreakOutsideLoop));

        // The inner loop owns the top frame, so the outer break is rejected
        ctx.push(outer, FlowState::looping(outer, LoopCursor::Condition));
        ctx.push(inner, FlowState::looping(inner, LoopCursor::Condition));
        let err = node.execute(&mut ctx, node.ports.enters[1]).unwrap_err();
        assert!(matches!(err, BlueprintError::BreakOutsideLoop));
        assert!(!ctx.parent().unwrap().state().as_loop().unwrap().call_break);
    }

    #[test]
    fn test_for_counts_and_emits_index() {
        let mut graph = Graph::new("test");
        let counting = graph.add_for();
        let ports = graph.node(counting).unwrap().ports.clone();
        graph.set_default(ports.inputs[0], Value::from(0)).unwrap();
        graph.set_default(ports.inputs[1], Value::from(3)).unwrap();
        graph.set_default(ports.inputs[2], Value::from(1)).unwrap();
        let builtins = Builtins::new();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(counting).unwrap();
        let mut seen = Vec::new();
        let mut next = node.execute(&mut ctx, ports.enters[0]).unwrap();
        while let Continuation::Subline(_, state) = next {
            seen.push(ctx.cached(ports.outputs[0]).cloned().unwrap());
            next = node.resume(&mut ctx, state).unwrap();
        }
        assert_eq!(seen, vec![Value::from(0), Value::from(1), Value::from(2)]);
        assert_eq!(next, Continuation::Exit(ports.exits[1]));
    }

    #[test]
    fn test_for_counts_down_and_rejects_zero_step() {
        let mut graph = Graph::new("test");
        let counting = graph.add_for();
        let ports = graph.node(counting).unwrap().ports.clone();
        graph.set_default(ports.inputs[0], Value::from(3)).unwrap();
        graph.set_default(ports.inputs[1], Value::from(0)).unwrap();
        graph.set_default(ports.inputs[2], Value::from(-2)).unwrap();
        let builtins = Builtins::new();

        {
            let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
            let node = graph.node(counting).unwrap();
            let mut runs = 0;
            let mut next = node.execute(&mut ctx, ports.enters[0]).unwrap();
            while let Continuation::Subline(_, state) = next {
                runs += 1;
                next = node.resume(&mut ctx, state).unwrap();
            }
            // 3, 1
            assert_eq!(runs, 2);
        }

        graph.set_default(ports.inputs[2], Value::from(0)).unwrap();
        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(counting).unwrap();
        let err = node.execute(&mut ctx, ports.enters[0]).unwrap_err();
        assert!(matches!(err, BlueprintError::ZeroStep));
    }

    #[test]
    fn test_for_of_iterates_snapshot() {
        let mut graph = Graph::new("test");
        let iterating = graph.add_for_of();
        let ports = graph.node(iterating).unwrap().ports.clone();
        let items = vec![Value::from("a"), Value::from("b")];
        graph.set_default(ports.inputs[0], Value::from(items.clone())).unwrap();
        let builtins = Builtins::new();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(iterating).unwrap();
        let mut seen = Vec::new();
        let mut next = node.execute(&mut ctx, ports.enters[0]).unwrap();
        while let Continuation::Subline(_, state) = next {
            seen.push(ctx.cached(ports.outputs[0]).cloned().unwrap());
            next = node.resume(&mut ctx, state).unwrap();
        }
        assert_eq!(seen, items);
    }

    #[test]
    fn test_for_of_empty_and_non_array() {
        let mut graph = Graph::new("test");
        let iterating = graph.add_for_of();
        let ports = graph.node(iterating).unwrap().ports.clone();
        graph.set_default(ports.inputs[0], Value::Array(Vec::new())).unwrap();
        let builtins = Builtins::new();

        {
            let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
            let node = graph.node(iterating).unwrap();
            let next = node.execute(&mut ctx, ports.enters[0]).unwrap();
            assert_eq!(next, Continuation::Exit(ports.exits[1]));
        }

        graph.set_default(ports.inputs[0], Value::from("text")).unwrap();
        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(iterating).unwrap();
        let err = node.execute(&mut ctx, ports.enters[0]).unwrap_err();
        assert!(matches!(err, BlueprintError::TypeMismatch { expected: "array", .. }));
    }
}
