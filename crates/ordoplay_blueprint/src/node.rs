// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the node execution protocol.

use crate::context::{ExecutionContext, FlowState};
use crate::error::{BlueprintError, Result};
use crate::nodes::{
    EndNode, EntryNode, ExpressionNode, ForNode, ForOfNode, IfNode, VarNode, WhileNode,
};
use crate::port::{EnterPortId, ExitPortId, InputPortId, NodePorts, OutputPortId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a node asks the interpreter to do next
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// Leave through an exit port
    Exit(ExitPortId),
    /// Open the sub-flow wired to a subline port, then resume with the state
    Subline(ExitPortId, FlowState),
    /// No local continuation (the enclosing sub-flow is interrupted)
    Interrupt,
}

/// Execution protocol shared by every node
pub trait FlowNode {
    /// Run the node after control arrives at one of its entries
    fn execute(&self, ctx: &mut ExecutionContext<'_>, enter: EnterPortId) -> Result<Continuation>;

    /// Continue after a sub-flow opened by this node completed or was interrupted
    fn resume(&self, ctx: &mut ExecutionContext<'_>, state: FlowState) -> Result<Continuation>;

    /// Called when a bound input receives a pushed value
    fn on_input(&self, ctx: &mut ExecutionContext<'_>, value: &Value, port: InputPortId) -> Result<()>;

    /// Called when a value is pulled from one of the node's outputs
    fn on_output(&self, ctx: &ExecutionContext<'_>, port: OutputPortId) -> Option<Value>;
}

/// Behavior of a node
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Function entry
    Entry(EntryNode),
    /// Function return
    End(EndNode),
    /// Variable read/write
    Var(VarNode),
    /// Two-way branch
    If(IfNode),
    /// Condition loop
    While(WhileNode),
    /// Counting loop
    For(ForNode),
    /// Array iteration loop
    ForOf(ForOfNode),
    /// Expression evaluation
    Expression(ExpressionNode),
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Node behavior
    pub kind: NodeKind,
    /// Ports in declaration order
    pub ports: NodePorts,
}

impl Node {
    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<InputPortId> {
        self.ports.inputs.get(index).copied()
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<OutputPortId> {
        self.ports.outputs.get(index).copied()
    }

    /// Get an enter port by index
    pub fn enter(&self, index: usize) -> Option<EnterPortId> {
        self.ports.enters.get(index).copied()
    }

    /// Get an exit port by index
    pub fn exit(&self, index: usize) -> Option<ExitPortId> {
        self.ports.exits.get(index).copied()
    }

    /// Whether this node terminates the function
    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End(_))
    }
}

impl FlowNode for Node {
    fn execute(&self, ctx: &mut ExecutionContext<'_>, enter: EnterPortId) -> Result<Continuation> {
        match &self.kind {
            NodeKind::Var(node) => node.execute(ctx),
            NodeKind::If(node) => node.execute(ctx),
            NodeKind::While(node) => node.execute(ctx, enter),
            NodeKind::For(node) => node.execute(ctx, enter),
            NodeKind::ForOf(node) => node.execute(ctx, enter),
            NodeKind::Expression(node) => node.execute(ctx),
            // Entries have no enter ports; ends are handled by the interpreter
            NodeKind::Entry(_) | NodeKind::End(_) => {
                Err(BlueprintError::InvalidEnter(self.name.clone()))
            }
        }
    }

    fn resume(&self, ctx: &mut ExecutionContext<'_>, state: FlowState) -> Result<Continuation> {
        match &self.kind {
            NodeKind::While(node) => node.resume(ctx, state),
            NodeKind::For(node) => node.resume(ctx, state),
            NodeKind::ForOf(node) => node.resume(ctx, state),
            _ => Err(BlueprintError::NotResumable(self.name.clone())),
        }
    }

    fn on_input(&self, ctx: &mut ExecutionContext<'_>, value: &Value, port: InputPortId) -> Result<()> {
        if let NodeKind::Var(node) = &self.kind {
            node.on_input(ctx, value, port);
        }
        Ok(())
    }

    fn on_output(&self, ctx: &ExecutionContext<'_>, port: OutputPortId) -> Option<Value> {
        match &self.kind {
            NodeKind::Var(node) => node.on_output(ctx, port),
            _ => None,
        }
    }
}
