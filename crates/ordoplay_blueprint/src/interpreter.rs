// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint function invocation and the core execution loop.
//!
//! Control moves from an exit port to the entry it is wired to. A node that
//! opens a sub-flow returns [`Continuation::Subline`]; its state is pushed on
//! the flow stack and resumed once the sub-flow runs out of exits. Reaching an
//! end node ends the whole invocation, however deep the stack is.

use crate::builtins::Builtins;
use crate::config::InterpreterConfig;
use crate::context::{ExecutionContext, FlowStackFrame};
use crate::error::{BlueprintError, FlowError, Result};
use crate::graph::Graph;
use crate::node::{Continuation, FlowNode, NodeId, NodeKind};
use crate::port::{EnterKind, EnterPortId};
use crate::value::Value;
use indexmap::IndexMap;

/// A callable blueprint: a graph and the entry node it starts from
#[derive(Debug, Clone)]
pub struct FlowFunction {
    /// Function symbol
    pub symbol: String,
    /// Function body
    pub graph: Graph,
    /// Entry node of the graph
    pub entry: NodeId,
    /// Symbol values seeded into every invocation
    pub local_inits: IndexMap<String, Value>,
}

impl FlowFunction {
    /// Create a function without local initial values
    pub fn new(symbol: impl Into<String>, graph: Graph, entry: NodeId) -> Self {
        Self {
            symbol: symbol.into(),
            graph,
            entry,
            local_inits: IndexMap::new(),
        }
    }

    /// Seed a local symbol
    pub fn with_local(mut self, symbol: impl Into<String>, value: impl Into<Value>) -> Self {
        self.local_inits.insert(symbol.into(), value.into());
        self
    }
}

/// Runs blueprint functions
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: InterpreterConfig,
    builtins: Builtins,
}

impl Interpreter {
    /// Create an interpreter with the standard builtins
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_builtins(config, Builtins::new())
    }

    /// Create an interpreter with a custom builtin registry
    pub fn with_builtins(config: InterpreterConfig, builtins: Builtins) -> Self {
        Self { config, builtins }
    }

    /// Current settings
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Builtins available to call expressions
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Mutable access to register host functions
    pub fn builtins_mut(&mut self) -> &mut Builtins {
        &mut self.builtins
    }

    /// Invoke a function.
    ///
    /// Returns `Ok(None)` for void functions. Any failure is returned once,
    /// wrapped with the execution state at the point of failure.
    pub fn execute(
        &self,
        function: &FlowFunction,
        args: Vec<Value>,
    ) -> std::result::Result<Option<Value>, FlowError> {
        tracing::debug!(
            function = %function.symbol,
            args = args.len(),
            "Executing blueprint function"
        );

        let mut ctx = ExecutionContext::new(&function.graph, &self.builtins, &function.local_inits);
        match self.invoke(&mut ctx, function, args) {
            Ok(value) => {
                let result = value.as_ref().map_or("void", |v| v.kind_name());
                tracing::debug!(
                    function = %function.symbol,
                    result,
                    "Blueprint function returned"
                );
                Ok(value)
            }
            Err(error) => {
                tracing::error!(
                    function = %function.symbol,
                    category = ?error.category(),
                    "Blueprint function failed: {error}"
                );
                Err(ctx.rethrow(error))
            }
        }
    }

    fn invoke(
        &self,
        ctx: &mut ExecutionContext<'_>,
        function: &FlowFunction,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let graph = ctx.graph();
        let NodeKind::Entry(entry) = &graph.resolve_node(function.entry)?.kind else {
            return Err(BlueprintError::ForeignObject("entry node"));
        };

        if args.len() != entry.param_count() {
            return Err(BlueprintError::ArgumentCount {
                expected: entry.param_count(),
                actual: args.len(),
            });
        }
        if self.config.validate_arguments {
            for (index, (param, arg)) in entry.params.iter().zip(&args).enumerate() {
                if !param.accepts(arg) {
                    return Err(BlueprintError::ArgumentType {
                        index,
                        expected: param.clone(),
                        found: arg.kind_name(),
                    });
                }
            }
        }

        for (&port, arg) in entry.outputs.iter().zip(args) {
            ctx.output(port, arg)?;
        }

        let first = graph
            .resolve_exit(entry.exit)?
            .target()
            .ok_or(BlueprintError::FlowInterrupted)?;
        self.run(ctx, first)
    }

    fn run(&self, ctx: &mut ExecutionContext<'_>, first: EnterPortId) -> Result<Option<Value>> {
        let graph = ctx.graph();
        let mut enter = first;

        'flow: loop {
            let mut node = graph.resolve_node(graph.resolve_enter(enter)?.node)?;

            if let NodeKind::End(end) = &node.kind {
                let value = end.return_value(ctx)?;
                self.finish(ctx)?;
                return Ok(value);
            }

            if self.config.log_steps {
                tracing::trace!(node = %node.name, depth = ctx.depth(), "Executing node");
            }
            let mut next = node.execute(ctx, enter)?;

            loop {
                let target = match next {
                    Continuation::Subline(port, state) => {
                        if let Some(target) = graph.resolve_exit(port)?.target() {
                            if self.config.log_steps {
                                tracing::trace!(node = %node.name, depth = ctx.depth(), "Opening sub-flow");
                            }
                            ctx.push(node.id, state);
                            enter = target;
                            continue 'flow;
                        }
                        // Empty body: resume right away
                        next = node.resume(ctx, state)?;
                        continue;
                    }
                    Continuation::Exit(port) => graph.resolve_exit(port)?.target(),
                    Continuation::Interrupt => None,
                };

                if let Some(target) = target {
                    if graph.resolve_enter(target)?.kind == EnterKind::Hole && !ctx.has_parent() {
                        return Err(BlueprintError::BreakOutsideLoop);
                    }
                    enter = target;
                    continue 'flow;
                }

                let frame = Self::unwind(ctx)?;
                node = graph.resolve_node(frame.node())?;
                if self.config.log_steps {
                    tracing::trace!(node = %node.name, depth = ctx.depth(), "Resuming node");
                }
                next = node.resume(ctx, frame.into_state())?;
            }
        }
    }

    /// Pop frames until one whose flow is still alive
    fn unwind(ctx: &mut ExecutionContext<'_>) -> Result<FlowStackFrame> {
        loop {
            if !ctx.has_parent() {
                return Err(BlueprintError::FlowInterrupted);
            }
            let frame = ctx.pop()?;
            if frame.state().alive {
                return Ok(frame);
            }
        }
    }

    /// Pre-empt every suspended flow and clear the stack
    fn finish(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.kill_frames();
        while ctx.has_parent() {
            let frame = ctx.pop()?;
            if self.config.log_steps {
                tracing::trace!(node = ?frame.node(), "Discarding suspended flow");
            }
        }
        Ok(())
    }
}

/// Invoke a function with the default settings and builtins
pub fn execute(
    function: &FlowFunction,
    args: Vec<Value>,
) -> std::result::Result<Option<Value>, FlowError> {
    Interpreter::default().execute(function, args)
}
