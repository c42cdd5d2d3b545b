// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime errors and the diagnostic wrapper returned from an invocation.

use crate::context::FlowState;
use crate::node::NodeId;
use crate::port::OutputPortId;
use crate::value::{DataType, Value};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type for node and expression execution
pub type Result<T> = std::result::Result<T, BlueprintError>;

/// Broad class of a runtime failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// A value or binding that should exist does not
    Reference,
    /// A graph object or argument of the wrong kind
    Type,
    /// Control-flow integrity violation
    Syntax,
    /// Failure while evaluating an expression
    Evaluation,
}

/// Failure raised while executing a blueprint
#[derive(Debug, Clone, Error)]
pub enum BlueprintError {
    /// Input port is unbound and has no default
    #[error("input port '{0}' is not bound to any output and has no default value")]
    UnboundInput(String),

    /// Variable has nothing to emit to wired readers
    #[error("variable '{0}' has no value to emit")]
    VariableEmpty(String),

    /// End node reached before the return value was written
    #[error("function exited before giving its return value")]
    MissingReturn,

    /// A required input resolved to no value
    #[error("input '{0}' produced no value")]
    MissingInput(String),

    /// Expression references an input the node does not declare
    #[error("expression node has no input named '{0}'")]
    UnknownInput(String),

    /// Operator expression without one of its operands
    #[error("{0} expression is missing an operand")]
    MissingOperand(&'static str),

    /// Expression node executed without an expression attached
    #[error("expression node has no expression")]
    MissingExpression,

    /// Pop on an empty flow stack
    #[error("flow stack is empty")]
    EmptyStack,

    /// Handle that does not belong to the executing graph, or of the wrong kind
    #[error("blueprint contains a {0} not produced by this interpreter")]
    ForeignObject(&'static str),

    /// Argument count differs from the entry node's parameters
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Argument rejected by its declared parameter type
    #[error("argument {index} is not a valid {expected} (got {found})")]
    ArgumentType {
        /// Argument position
        index: usize,
        /// Declared parameter type
        expected: DataType,
        /// Kind of the supplied value
        found: &'static str,
    },

    /// Port value of the wrong kind
    #[error("expected a {expected} value, got {found}")]
    TypeMismatch {
        /// Expected kind
        expected: &'static str,
        /// Actual kind
        found: &'static str,
    },

    /// Main flow left the graph without reaching an end node
    #[error("the main flow of the function was interrupted")]
    FlowInterrupted,

    /// Break fired while the loop is not the active sub-flow
    #[error("break issued outside of its loop")]
    BreakOutsideLoop,

    /// Node entered through a port it does not own
    #[error("node '{0}' entered through an invalid port")]
    InvalidEnter(String),

    /// Resume requested on a node that never opens a sub-flow
    #[error("node '{0}' cannot resume a sub-flow")]
    NotResumable(String),

    /// Expression node declared without inputs
    #[error("expression node has no inputs")]
    NoExpressionInputs,

    /// Operator applied to operands it does not support
    #[error("operator '{operator}' does not support {found} operands")]
    UnsupportedOperand {
        /// Operator name
        operator: &'static str,
        /// Kind of the offending operand
        found: &'static str,
    },

    /// Call to an unregistered builtin
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Call with the wrong number of arguments
    #[error("function '{symbol}' expects {expected} arguments, got {actual}")]
    Arity {
        /// Function symbol
        symbol: String,
        /// Expected argument count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Counting loop with a zero step
    #[error("for loop step must not be zero")]
    ZeroStep,
}

impl BlueprintError {
    /// Get the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnboundInput(_)
            | Self::VariableEmpty(_)
            | Self::MissingReturn
            | Self::MissingInput(_)
            | Self::UnknownInput(_)
            | Self::MissingOperand(_)
            | Self::MissingExpression
            | Self::EmptyStack => ErrorCategory::Reference,
            Self::ForeignObject(_)
            | Self::ArgumentCount { .. }
            | Self::ArgumentType { .. }
            | Self::TypeMismatch { .. } => ErrorCategory::Type,
            Self::FlowInterrupted
            | Self::BreakOutsideLoop
            | Self::InvalidEnter(_)
            | Self::NotResumable(_)
            | Self::NoExpressionInputs => ErrorCategory::Syntax,
            Self::UnsupportedOperand { .. }
            | Self::UnknownFunction(_)
            | Self::Arity { .. }
            | Self::ZeroStep => ErrorCategory::Evaluation,
        }
    }
}

/// One frame of the flow stack captured at failure time
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    /// Suspended node
    pub node: NodeId,
    /// Display name of the node
    pub node_name: String,
    /// Continuation state saved for the node
    pub state: FlowState,
}

/// Failed invocation together with the execution state at failure time
#[derive(Debug, Error, Serialize)]
#[error("blueprint execution failed: {source}")]
pub struct FlowError {
    stack: Vec<FrameSnapshot>,
    port_state: IndexMap<OutputPortId, Value>,
    symbol_state: IndexMap<String, Value>,
    #[serde(serialize_with = "serialize_display")]
    source: BlueprintError,
}

impl FlowError {
    /// Wrap an error with a captured snapshot
    pub fn new(
        stack: Vec<FrameSnapshot>,
        port_state: IndexMap<OutputPortId, Value>,
        symbol_state: IndexMap<String, Value>,
        source: BlueprintError,
    ) -> Self {
        Self {
            stack,
            port_state,
            symbol_state,
            source,
        }
    }

    /// Flow stack at failure time, outermost frame first
    pub fn flow_stack(&self) -> &[FrameSnapshot] {
        &self.stack
    }

    /// Last value emitted by every output port
    pub fn port_state(&self) -> &IndexMap<OutputPortId, Value> {
        &self.port_state
    }

    /// Value of every symbol
    pub fn symbol_state(&self) -> &IndexMap<String, Value> {
        &self.symbol_state
    }

    /// The originating error
    pub fn error(&self) -> &BlueprintError {
        &self.source
    }

    /// Category of the originating error
    pub fn category(&self) -> ErrorCategory {
        self.source.category()
    }
}

fn serialize_display<S: Serializer>(
    error: &BlueprintError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
