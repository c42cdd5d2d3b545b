// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint skill-graph interpreter for `OrdoPlay`.
//!
//! A blueprint is a function drawn as a graph: data ports carry values
//! between nodes, control ports decide which node runs next.
//!
//! ## Architecture
//!
//! - A [`Graph`] arena owns nodes and ports, addressed by uuid handles
//! - Nodes are stateless; each invocation gets its own [`ExecutionContext`]
//! - Loops open sub-flows whose state waits on an explicit flow stack
//! - Failures come back as a [`FlowError`] holding the execution snapshot
//!
//! ```
//! use ordoplay_blueprint::{execute, DataType, FlowFunction, Graph, Value};
//!
//! let mut graph = Graph::new("identity");
//! let entry = graph.add_entry(vec![DataType::Number]);
//! let end = graph.add_end(Some(DataType::Number));
//! graph.connect_nodes(entry, 0, end, 0).unwrap();
//! graph.attach_nodes(entry, 0, end, 0).unwrap();
//!
//! let function = FlowFunction::new("identity", graph, entry);
//! assert_eq!(execute(&function, vec![Value::from(3)]).unwrap(), Some(Value::from(3)));
//! ```

pub mod builtins;
pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod graph;
pub mod interpreter;
pub mod node;
pub mod nodes;
pub mod port;
pub mod value;

pub use builtins::Builtins;
pub use config::InterpreterConfig;
pub use context::{ExecutionContext, FlowState};
pub use error::{BlueprintError, ErrorCategory, FlowError};
pub use expression::{BinaryOperator, Expression, UnaryOperator};
pub use graph::{Graph, GraphError};
pub use interpreter::{execute, FlowFunction, Interpreter};
pub use node::{Continuation, FlowNode, Node, NodeId, NodeKind};
pub use port::{EnterPortId, ExitPortId, InputPortId, OutputPortId};
pub use value::{DataType, EntityRef, Value};
