// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs and control flow.
//!
//! Data ports ([`InputPort`], [`OutputPort`]) carry values. Control ports
//! ([`EnterPort`], [`ExitPort`]) carry the execution continuation.

use crate::node::NodeId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! port_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random port ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

port_id!(
    /// Unique identifier for a data input port
    InputPortId
);
port_id!(
    /// Unique identifier for a data output port
    OutputPortId
);
port_id!(
    /// Unique identifier for a control entry port
    EnterPortId
);
port_id!(
    /// Unique identifier for a control exit port
    ExitPortId
);

/// Data input port
#[derive(Debug, Clone)]
pub struct InputPort {
    /// Unique port ID
    pub id: InputPortId,
    /// Owning node
    pub node: NodeId,
    /// Port name
    pub name: String,
    /// Static value used when nothing has been emitted upstream
    pub default_value: Option<Value>,
    /// Bound output port (single writer)
    pub(crate) target: Option<OutputPortId>,
}

impl InputPort {
    pub(crate) fn new(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            id: InputPortId::new(),
            node,
            name: name.into(),
            default_value: None,
            target: None,
        }
    }

    /// Get the bound output port
    pub fn target(&self) -> Option<OutputPortId> {
        self.target
    }
}

/// Data output port
#[derive(Debug, Clone)]
pub struct OutputPort {
    /// Unique port ID
    pub id: OutputPortId,
    /// Owning node
    pub node: NodeId,
    /// Port name
    pub name: String,
    /// Fan-out targets in wiring order
    pub(crate) targets: Vec<InputPortId>,
}

impl OutputPort {
    pub(crate) fn new(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            id: OutputPortId::new(),
            node,
            name: name.into(),
            targets: Vec::new(),
        }
    }

    /// Get the wired input ports
    pub fn targets(&self) -> &[InputPortId] {
        &self.targets
    }
}

/// Kind of control entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnterKind {
    /// Normal entry
    Enter,
    /// Interrupting entry (loop break)
    Hole,
}

/// Control entry port
#[derive(Debug, Clone)]
pub struct EnterPort {
    /// Unique port ID
    pub id: EnterPortId,
    /// Owning node
    pub node: NodeId,
    /// Port name
    pub name: String,
    /// Entry kind
    pub kind: EnterKind,
}

impl EnterPort {
    pub(crate) fn new(node: NodeId, name: impl Into<String>, kind: EnterKind) -> Self {
        Self {
            id: EnterPortId::new(),
            node,
            name: name.into(),
            kind,
        }
    }
}

/// Kind of control exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    /// Continue the current flow
    Exit,
    /// Start a nested flow that returns to the owning node
    Subline,
}

/// Control exit port
#[derive(Debug, Clone)]
pub struct ExitPort {
    /// Unique port ID
    pub id: ExitPortId,
    /// Owning node
    pub node: NodeId,
    /// Port name
    pub name: String,
    /// Exit kind
    pub kind: ExitKind,
    /// Next entry, if wired
    pub(crate) target: Option<EnterPortId>,
}

impl ExitPort {
    pub(crate) fn new(node: NodeId, name: impl Into<String>, kind: ExitKind) -> Self {
        Self {
            id: ExitPortId::new(),
            node,
            name: name.into(),
            kind,
            target: None,
        }
    }

    /// Get the wired entry port
    pub fn target(&self) -> Option<EnterPortId> {
        self.target
    }
}

/// Port handles owned by one node, in declaration order
#[derive(Debug, Clone, Default)]
pub struct NodePorts {
    /// Data inputs
    pub inputs: Vec<InputPortId>,
    /// Data outputs
    pub outputs: Vec<OutputPortId>,
    /// Control entries
    pub enters: Vec<EnterPortId>,
    /// Control exits
    pub exits: Vec<ExitPortId>,
}
