// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function entry/end and variable nodes.

use crate::context::ExecutionContext;
use crate::error::{BlueprintError, Result};
use crate::node::Continuation;
use crate::port::{EnterPortId, ExitPortId, InputPortId, OutputPortId};
use crate::value::{DataType, Value};

/// Function entry: one output per parameter, one exit
#[derive(Debug, Clone)]
pub struct EntryNode {
    /// Declared parameter types
    pub params: Vec<DataType>,
    /// Parameter outputs
    pub outputs: Vec<OutputPortId>,
    /// Start of the main flow
    pub exit: ExitPortId,
}

impl EntryNode {
    /// Number of declared parameters
    pub fn param_count(&self) -> usize {
        self.outputs.len()
    }
}

/// Function end: optional return input, one enter
#[derive(Debug, Clone)]
pub struct EndNode {
    /// Declared return type, `None` for void functions
    pub return_type: Option<DataType>,
    /// Return value input
    pub input: Option<InputPortId>,
    /// Entry
    pub enter: EnterPortId,
}

impl EndNode {
    /// Read the return value; void functions never touch their input
    pub fn return_value(&self, ctx: &mut ExecutionContext<'_>) -> Result<Option<Value>> {
        let Some(port) = self.input else {
            return Ok(None);
        };

        match ctx.input(port)? {
            Some(value) => Ok(Some(value)),
            None => Err(BlueprintError::MissingReturn),
        }
    }
}

/// Variable node.
///
/// Executing it writes the `write` input to the symbol when that input is
/// bound and has a value, otherwise it re-emits the stored value. Pushed
/// writes and pulled reads go straight through the symbol table, so data-only
/// access works without executing the node.
#[derive(Debug, Clone)]
pub struct VarNode {
    /// Variable symbol
    pub symbol: String,
    /// Value to store
    pub write: InputPortId,
    /// Stored value
    pub read: OutputPortId,
    /// Entry
    pub enter: EnterPortId,
    /// Exit
    pub exit: ExitPortId,
}

impl VarNode {
    pub(crate) fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Continuation> {
        let graph = ctx.graph();
        let bound = graph.resolve_input(self.write)?.target().is_some();
        let written = if bound { ctx.input(self.write)? } else { None };

        let emitted = match written {
            Some(value) => {
                ctx.write(self.symbol.as_str(), value.clone());
                Some(value)
            }
            None => ctx.read(&self.symbol).cloned(),
        };

        match emitted {
            Some(value) => ctx.output(self.read, value)?,
            None if !graph.resolve_output(self.read)?.targets().is_empty() => {
                return Err(BlueprintError::VariableEmpty(self.symbol.clone()));
            }
            None => {}
        }

        Ok(Continuation::Exit(self.exit))
    }

    pub(crate) fn on_input(&self, ctx: &mut ExecutionContext<'_>, value: &Value, port: InputPortId) {
        if port == self.write {
            ctx.write(self.symbol.as_str(), value.clone());
        }
    }

    pub(crate) fn on_output(&self, ctx: &ExecutionContext<'_>, port: OutputPortId) -> Option<Value> {
        if port == self.read {
            ctx.read(&self.symbol).cloned()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builtins::Builtins;
    use crate::context::ExecutionContext;
    use crate::error::{BlueprintError, ErrorCategory};
    use crate::graph::Graph;
    use crate::node::{Continuation, FlowNode};
    use crate::value::{DataType, Value};
    use indexmap::IndexMap;

    #[test]
    fn test_var_writes_bound_input_and_emits() {
        let mut graph = Graph::new("test");
        let entry = graph.add_entry(vec![DataType::Number]);
        let var = graph.add_var("i");
        let arg = graph.node(entry).unwrap().ports.outputs[0];
        let write = graph.node(var).unwrap().ports.inputs[0];
        let read = graph.node(var).unwrap().ports.outputs[0];
        graph.attach(write, arg).unwrap();
        let builtins = Builtins::new();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        ctx.output(arg, Value::from(10)).unwrap();
        // Pushed through the write hook before execution
        assert_eq!(ctx.read("i"), Some(&Value::from(10)));

        let node = graph.node(var).unwrap();
        let enter = node.ports.enters[0];
        let next = node.execute(&mut ctx, enter).unwrap();
        assert_eq!(next, Continuation::Exit(node.ports.exits[0]));
        assert_eq!(ctx.cached(read), Some(&Value::from(10)));
    }

    #[test]
    fn test_var_re_emits_stored_value_when_unbound() {
        let mut graph = Graph::new("test");
        let var = graph.add_var("x");
        let builtins = Builtins::new();
        let mut inits = IndexMap::new();
        inits.insert("x".to_string(), Value::from(3));

        let mut ctx = ExecutionContext::new(&graph, &builtins, &inits);
        let node = graph.node(var).unwrap();
        node.execute(&mut ctx, node.ports.enters[0]).unwrap();
        assert_eq!(ctx.cached(node.ports.outputs[0]), Some(&Value::from(3)));
    }

    #[test]
    fn test_var_without_value_fails_only_when_read() {
        let mut graph = Graph::new("test");
        let var = graph.add_var("missing");
        let cond = graph.add_if();
        let builtins = Builtins::new();

        {
            let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
            let node = graph.node(var).unwrap();
            assert!(node.execute(&mut ctx, node.ports.enters[0]).is_ok());
        }

        let read = graph.node(var).unwrap().ports.outputs[0];
        let input = graph.node(cond).unwrap().ports.inputs[0];
        graph.attach(input, read).unwrap();

        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());
        let node = graph.node(var).unwrap();
        let err = node.execute(&mut ctx, node.ports.enters[0]).unwrap_err();
        assert!(matches!(err, BlueprintError::VariableEmpty(ref s) if s == "missing"));
        assert_eq!(err.category(), ErrorCategory::Reference);
    }

    #[test]
    fn test_end_without_return_type_has_no_input() {
        let mut graph = Graph::new("test");
        let end = graph.add_end(None);
        let builtins = Builtins::new();
        let mut ctx = ExecutionContext::new(&graph, &builtins, &IndexMap::new());

        let node = graph.node(end).unwrap();
        assert!(node.ports.inputs.is_empty());
        let crate::node::NodeKind::End(end) = &node.kind else {
            panic!("expected an end node");
        };
        assert_eq!(end.return_value(&mut ctx).unwrap(), None);
    }
}
