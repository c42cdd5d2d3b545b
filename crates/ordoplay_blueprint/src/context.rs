// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-invocation execution state.
//!
//! Nodes are stateless templates; everything an invocation mutates lives in
//! an [`ExecutionContext`]: the flow stack of suspended nodes, the last value
//! emitted by each output port, and the symbol table used by variables.

use crate::builtins::Builtins;
use crate::error::{BlueprintError, FlowError, FrameSnapshot, Result};
use crate::graph::Graph;
use crate::node::{FlowNode, NodeId};
use crate::port::{InputPortId, OutputPortId};
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// Position of a loop between two body runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LoopCursor {
    /// Condition-driven loop, re-checked on every resume
    Condition,
    /// Counting loop
    Counter {
        /// Value emitted for the running body
        current: f64,
        /// Exclusive bound
        end: f64,
        /// Increment per iteration
        step: f64,
    },
    /// Iteration over an array snapshot
    Items {
        /// Elements captured when the loop was entered
        items: Vec<Value>,
        /// Index of the next element to emit
        next: usize,
    },
}

/// Continuation data of a loop node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopState {
    /// Set when the loop's break entry fired during the running body
    pub call_break: bool,
    /// Iteration position
    pub cursor: LoopCursor,
}

/// Node-specific continuation data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StateData {
    /// No data beyond the owning node
    Plain,
    /// Loop continuation
    Loop(LoopState),
}

/// Continuation saved for a node that opened a sub-flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowState {
    node: NodeId,
    /// False once an enclosing return pre-empted the suspended flow
    pub alive: bool,
    /// Node-specific data
    pub data: StateData,
}

impl FlowState {
    /// Create a plain state for a node
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            alive: true,
            data: StateData::Plain,
        }
    }

    /// Create a loop state for a node
    pub fn looping(node: NodeId, cursor: LoopCursor) -> Self {
        Self {
            node,
            alive: true,
            data: StateData::Loop(LoopState {
                call_break: false,
                cursor,
            }),
        }
    }

    /// Node that owns this state
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Get the loop data
    pub fn as_loop(&self) -> Option<&LoopState> {
        match &self.data {
            StateData::Loop(state) => Some(state),
            StateData::Plain => None,
        }
    }

    /// Get the loop data mutably
    pub fn as_loop_mut(&mut self) -> Option<&mut LoopState> {
        match &mut self.data {
            StateData::Loop(state) => Some(state),
            StateData::Plain => None,
        }
    }
}

/// Suspended node and its saved state
#[derive(Debug, Clone)]
pub struct FlowStackFrame {
    node: NodeId,
    state: FlowState,
}

impl FlowStackFrame {
    /// Node where the parent flow is paused
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Saved state of the paused node
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Take the saved state
    pub fn into_state(self) -> FlowState {
        self.state
    }
}

/// Execution context of one function invocation
pub struct ExecutionContext<'g> {
    graph: &'g Graph,
    builtins: &'g Builtins,
    /// Pushed whenever a node opens a sub-flow
    stack: Vec<FlowStackFrame>,
    /// Last value emitted by each output port
    port_state: IndexMap<OutputPortId, Value>,
    /// Variables shared by all var nodes with the same symbol
    symbol_state: IndexMap<String, Value>,
}

impl<'g> ExecutionContext<'g> {
    /// Create a context seeded with the function's local initial values
    pub fn new(graph: &'g Graph, builtins: &'g Builtins, local_inits: &IndexMap<String, Value>) -> Self {
        Self {
            graph,
            builtins,
            stack: Vec::new(),
            port_state: IndexMap::new(),
            symbol_state: local_inits.clone(),
        }
    }

    /// The graph being executed
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Builtin functions available to call expressions
    pub fn builtins(&self) -> &'g Builtins {
        self.builtins
    }

    /// Whether the current flow has a parent flow
    pub fn has_parent(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Frame of the parent flow
    pub fn parent(&self) -> Option<&FlowStackFrame> {
        self.stack.last()
    }

    /// Current sub-flow nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Read the current value of an input port.
    ///
    /// An unbound input falls back to its default and fails without one.
    /// A bound input first asks the source node for a fresh value, then
    /// falls back to the last emitted value and finally to the default.
    pub fn input(&mut self, port: InputPortId) -> Result<Option<Value>> {
        let graph = self.graph;
        let input = graph.resolve_input(port)?;

        let Some(source) = input.target() else {
            return match &input.default_value {
                Some(value) => Ok(Some(value.clone())),
                None => Err(BlueprintError::UnboundInput(input.name.clone())),
            };
        };

        let owner = graph.resolve_output(source)?.node;
        if let Some(pulled) = graph.resolve_node(owner)?.on_output(self, source) {
            self.port_state.insert(source, pulled.clone());
            return Ok(Some(pulled));
        }

        Ok(self
            .port_state
            .get(&source)
            .or(input.default_value.as_ref())
            .cloned())
    }

    /// Emit a value on an output port.
    ///
    /// The port keeps the value until its next emission, and every wired
    /// input is notified in wiring order.
    pub fn output(&mut self, port: OutputPortId, value: Value) -> Result<()> {
        let graph = self.graph;
        let output = graph.resolve_output(port)?;

        self.port_state.insert(port, value.clone());

        for &target in output.targets() {
            let input = graph.resolve_input(target)?;
            graph.resolve_node(input.node)?.on_input(self, &value, target)?;
        }
        Ok(())
    }

    /// Last value emitted by an output port in this invocation
    pub fn cached(&self, port: OutputPortId) -> Option<&Value> {
        self.port_state.get(&port)
    }

    /// Read a symbol
    pub fn read(&self, symbol: &str) -> Option<&Value> {
        self.symbol_state.get(symbol)
    }

    /// Write a symbol
    pub fn write(&mut self, symbol: impl Into<String>, value: Value) {
        self.symbol_state.insert(symbol.into(), value);
    }

    /// Suspend a node and save its state
    pub fn push(&mut self, node: NodeId, state: FlowState) {
        self.stack.push(FlowStackFrame { node, state });
    }

    /// Get the top-of-stack state, only if it belongs to `node`
    pub fn try_peek_state(&self, node: NodeId) -> Option<&FlowState> {
        self.stack
            .last()
            .filter(|frame| frame.node == node)
            .map(FlowStackFrame::state)
    }

    /// Mutable variant of [`Self::try_peek_state`]
    pub fn try_peek_state_mut(&mut self, node: NodeId) -> Option<&mut FlowState> {
        self.stack
            .last_mut()
            .filter(|frame| frame.node == node)
            .map(|frame| &mut frame.state)
    }

    /// Pop the parent flow's frame
    pub fn pop(&mut self) -> Result<FlowStackFrame> {
        self.stack.pop().ok_or(BlueprintError::EmptyStack)
    }

    /// Mark every suspended flow as pre-empted by a return
    pub fn kill_frames(&mut self) {
        for frame in &mut self.stack {
            frame.state.alive = false;
        }
    }

    /// Wrap an error together with the current execution state
    pub fn rethrow(&self, error: BlueprintError) -> FlowError {
        let stack = self
            .stack
            .iter()
            .map(|frame| FrameSnapshot {
                node: frame.node,
                node_name: self
                    .graph
                    .node(frame.node)
                    .map(|node| node.name.clone())
                    .unwrap_or_default(),
                state: frame.state.clone(),
            })
            .collect();

        FlowError::new(stack, self.port_state.clone(), self.symbol_state.clone(), error)
    }
}
