// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph arena holding nodes, their ports and the wiring between them.
//!
//! Nodes and ports are addressed by uuid handles. Links between ports are
//! handles too, so a port never owns its peer. The graph is built once and
//! only borrowed shared while executing.

use crate::error::BlueprintError;
use crate::expression::Expression;
use crate::node::{Node, NodeId, NodeKind};
use crate::nodes::{
    EndNode, EntryNode, ExpressionNode, ForNode, ForOfNode, IfNode, VarNode, WhileNode,
};
use crate::port::{
    EnterKind, EnterPort, EnterPortId, ExitKind, ExitPort, ExitPortId, InputPort, InputPortId,
    NodePorts, OutputPort, OutputPortId,
};
use crate::value::{DataType, Value};
use indexmap::IndexMap;

/// A blueprint graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    inputs: IndexMap<InputPortId, InputPort>,
    outputs: IndexMap<OutputPortId, OutputPort>,
    enters: IndexMap<EnterPortId, EnterPort>,
    exits: IndexMap<ExitPortId, ExitPort>,
}

/// Collects the ports of a node under construction
struct NodeBuilder<'a> {
    graph: &'a mut Graph,
    id: NodeId,
    ports: NodePorts,
}

impl NodeBuilder<'_> {
    fn input(&mut self, name: &str) -> InputPortId {
        let port = InputPort::new(self.id, name);
        let id = port.id;
        self.graph.inputs.insert(id, port);
        self.ports.inputs.push(id);
        id
    }

    fn output(&mut self, name: &str) -> OutputPortId {
        let port = OutputPort::new(self.id, name);
        let id = port.id;
        self.graph.outputs.insert(id, port);
        self.ports.outputs.push(id);
        id
    }

    fn enter(&mut self, name: &str, kind: EnterKind) -> EnterPortId {
        let port = EnterPort::new(self.id, name, kind);
        let id = port.id;
        self.graph.enters.insert(id, port);
        self.ports.enters.push(id);
        id
    }

    fn exit(&mut self, name: &str, kind: ExitKind) -> ExitPortId {
        let port = ExitPort::new(self.id, name, kind);
        let id = port.id;
        self.graph.exits.insert(id, port);
        self.ports.exits.push(id);
        id
    }

    fn finish(self, name: &str, kind: NodeKind) -> NodeId {
        let id = self.id;
        let node = Node {
            id,
            name: name.to_string(),
            kind,
            ports: self.ports,
        };
        self.graph.nodes.insert(id, node);
        id
    }
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            enters: IndexMap::new(),
            exits: IndexMap::new(),
        }
    }

    fn builder(&mut self) -> NodeBuilder<'_> {
        NodeBuilder {
            graph: self,
            id: NodeId::new(),
            ports: NodePorts::default(),
        }
    }

    /// Add a function entry with one output per parameter
    pub fn add_entry(&mut self, params: Vec<DataType>) -> NodeId {
        let mut b = self.builder();
        let outputs = (0..params.len())
            .map(|i| b.output(&format!("arg{i}")))
            .collect();
        let exit = b.exit("exit", ExitKind::Exit);
        b.finish(
            "entry",
            NodeKind::Entry(EntryNode {
                params,
                outputs,
                exit,
            }),
        )
    }

    /// Add a function end; void functions get no return input
    pub fn add_end(&mut self, return_type: Option<DataType>) -> NodeId {
        let return_type = return_type.filter(|ty| *ty != DataType::Void);
        let mut b = self.builder();
        let input = return_type.as_ref().map(|_| b.input("returnValue"));
        let enter = b.enter("enter", EnterKind::Enter);
        b.finish(
            "end",
            NodeKind::End(EndNode {
                return_type,
                input,
                enter,
            }),
        )
    }

    /// Add a variable node bound to `symbol`
    pub fn add_var(&mut self, symbol: impl Into<String>) -> NodeId {
        let mut b = self.builder();
        let write = b.input("write");
        let read = b.output("read");
        let enter = b.enter("enter", EnterKind::Enter);
        let exit = b.exit("exit", ExitKind::Exit);
        b.finish(
            "var",
            NodeKind::Var(VarNode {
                symbol: symbol.into(),
                write,
                read,
                enter,
                exit,
            }),
        )
    }

    /// Add an if/else branch
    pub fn add_if(&mut self) -> NodeId {
        let mut b = self.builder();
        let condition = b.input("condition");
        let enter = b.enter("enter", EnterKind::Enter);
        let when_true = b.exit("whenTrue", ExitKind::Exit);
        let when_false = b.exit("whenFalse", ExitKind::Exit);
        b.finish(
            "if",
            NodeKind::If(IfNode {
                condition,
                enter,
                when_true,
                when_false,
            }),
        )
    }

    /// Add a while loop
    pub fn add_while(&mut self) -> NodeId {
        let mut b = self.builder();
        let id = b.id;
        let condition = b.input("condition");
        let enter = b.enter("enter", EnterKind::Enter);
        let break_enter = b.enter("break", EnterKind::Hole);
        let body = b.exit("body", ExitKind::Subline);
        let exit = b.exit("exit", ExitKind::Exit);
        b.finish(
            "while",
            NodeKind::While(WhileNode {
                id,
                condition,
                enter,
                break_enter,
                body,
                exit,
            }),
        )
    }

    /// Add a counting loop with `start`, `end` and `step` inputs
    pub fn add_for(&mut self) -> NodeId {
        let mut b = self.builder();
        let id = b.id;
        let start = b.input("start");
        let end = b.input("end");
        let step = b.input("step");
        let index = b.output("index");
        let enter = b.enter("enter", EnterKind::Enter);
        let break_enter = b.enter("break", EnterKind::Hole);
        let body = b.exit("body", ExitKind::Subline);
        let exit = b.exit("exit", ExitKind::Exit);
        b.finish(
            "for",
            NodeKind::For(ForNode {
                id,
                start,
                end,
                step,
                index,
                enter,
                break_enter,
                body,
                exit,
            }),
        )
    }

    /// Add an array iteration loop
    pub fn add_for_of(&mut self) -> NodeId {
        let mut b = self.builder();
        let id = b.id;
        let array = b.input("array");
        let item = b.output("item");
        let enter = b.enter("enter", EnterKind::Enter);
        let break_enter = b.enter("break", EnterKind::Hole);
        let body = b.exit("body", ExitKind::Subline);
        let exit = b.exit("exit", ExitKind::Exit);
        b.finish(
            "forOf",
            NodeKind::ForOf(ForOfNode {
                id,
                array,
                item,
                enter,
                break_enter,
                body,
                exit,
            }),
        )
    }

    /// Add an expression node with no inputs and no expression yet
    pub fn add_expression(&mut self) -> NodeId {
        let mut b = self.builder();
        let result = b.output("result");
        let enter = b.enter("enter", EnterKind::Enter);
        let exit = b.exit("exit", ExitKind::Exit);
        b.finish(
            "expression",
            NodeKind::Expression(ExpressionNode {
                expression: None,
                inputs: IndexMap::new(),
                result,
                enter,
                exit,
            }),
        )
    }

    /// Declare a named input on an expression node
    pub fn add_expression_input(
        &mut self,
        node_id: NodeId,
        symbol: impl Into<String>,
    ) -> Result<InputPortId, GraphError> {
        let symbol = symbol.into();
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let NodeKind::Expression(expression) = &mut node.kind else {
            return Err(GraphError::WrongNodeKind {
                expected: "expression",
                found: node.name.clone(),
            });
        };
        if expression.inputs.contains_key(&symbol) {
            return Err(GraphError::DuplicateInput(symbol));
        }

        let port = InputPort::new(node_id, symbol.as_str());
        let id = port.id;
        expression.inputs.insert(symbol, id);
        node.ports.inputs.push(id);
        self.inputs.insert(id, port);
        Ok(id)
    }

    /// Attach an expression tree to an expression node
    pub fn set_expression(
        &mut self,
        node_id: NodeId,
        expression: Expression,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        match &mut node.kind {
            NodeKind::Expression(target) => {
                target.expression = Some(expression);
                Ok(())
            }
            _ => Err(GraphError::WrongNodeKind {
                expected: "expression",
                found: node.name.clone(),
            }),
        }
    }

    /// Bind an input to an output.
    ///
    /// An input has a single writer: rebinding it replaces the old binding
    /// and removes the input from the old output's fan-out.
    pub fn attach(&mut self, input: InputPortId, output: OutputPortId) -> Result<(), GraphError> {
        if !self.outputs.contains_key(&output) {
            return Err(GraphError::OutputNotFound(output));
        }
        let port = self
            .inputs
            .get_mut(&input)
            .ok_or(GraphError::InputNotFound(input))?;

        match port.target.replace(output) {
            Some(previous) if previous == output => return Ok(()),
            Some(previous) => {
                tracing::warn!(input = %port.name, "Rebinding an already bound input");
                if let Some(old) = self.outputs.get_mut(&previous) {
                    old.targets.retain(|target| *target != input);
                }
            }
            None => {}
        }

        if let Some(output) = self.outputs.get_mut(&output) {
            output.targets.push(input);
        }
        Ok(())
    }

    /// Bind input `input_index` of `to` to output `output_index` of `from`
    pub fn attach_nodes(
        &mut self,
        from: NodeId,
        output_index: usize,
        to: NodeId,
        input_index: usize,
    ) -> Result<(), GraphError> {
        let output = self.node_port(from, output_index, Node::output)?;
        let input = self.node_port(to, input_index, Node::input)?;
        self.attach(input, output)
    }

    /// Set the single target of an exit
    pub fn connect(&mut self, exit: ExitPortId, enter: EnterPortId) -> Result<(), GraphError> {
        if !self.enters.contains_key(&enter) {
            return Err(GraphError::EnterNotFound(enter));
        }
        let port = self
            .exits
            .get_mut(&exit)
            .ok_or(GraphError::ExitNotFound(exit))?;
        port.target = Some(enter);
        Ok(())
    }

    /// Set the target of a subline, the first entry of the nested flow
    pub fn connect_subline(
        &mut self,
        subline: ExitPortId,
        enter: EnterPortId,
    ) -> Result<(), GraphError> {
        let port = self
            .exits
            .get(&subline)
            .ok_or(GraphError::ExitNotFound(subline))?;
        if port.kind != ExitKind::Subline {
            return Err(GraphError::NotSubline(port.name.clone()));
        }
        self.connect(subline, enter)
    }

    /// Connect exit `exit_index` of `from` to entry `enter_index` of `to`
    pub fn connect_nodes(
        &mut self,
        from: NodeId,
        exit_index: usize,
        to: NodeId,
        enter_index: usize,
    ) -> Result<(), GraphError> {
        let exit = self.node_port(from, exit_index, Node::exit)?;
        let enter = self.node_port(to, enter_index, Node::enter)?;
        self.connect(exit, enter)
    }

    /// Set the static default of an input
    pub fn set_default(&mut self, input: InputPortId, value: Value) -> Result<(), GraphError> {
        let port = self
            .inputs
            .get_mut(&input)
            .ok_or(GraphError::InputNotFound(input))?;
        port.default_value = Some(value);
        Ok(())
    }

    fn node_port<T>(
        &self,
        node_id: NodeId,
        index: usize,
        port: fn(&Node, usize) -> Option<T>,
    ) -> Result<T, GraphError> {
        let node = self.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        port(node, index).ok_or(GraphError::PortIndex {
            node: node.name.clone(),
            index,
        })
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get an input port
    pub fn input_port(&self, id: InputPortId) -> Option<&InputPort> {
        self.inputs.get(&id)
    }

    /// Get an output port
    pub fn output_port(&self, id: OutputPortId) -> Option<&OutputPort> {
        self.outputs.get(&id)
    }

    /// Get an enter port
    pub fn enter_port(&self, id: EnterPortId) -> Option<&EnterPort> {
        self.enters.get(&id)
    }

    /// Get an exit port
    pub fn exit_port(&self, id: ExitPortId) -> Option<&ExitPort> {
        self.exits.get(&id)
    }

    pub(crate) fn resolve_node(&self, id: NodeId) -> Result<&Node, BlueprintError> {
        self.node(id).ok_or(BlueprintError::ForeignObject("node"))
    }

    pub(crate) fn resolve_input(&self, id: InputPortId) -> Result<&InputPort, BlueprintError> {
        self.input_port(id)
            .ok_or(BlueprintError::ForeignObject("input port"))
    }

    pub(crate) fn resolve_output(&self, id: OutputPortId) -> Result<&OutputPort, BlueprintError> {
        self.output_port(id)
            .ok_or(BlueprintError::ForeignObject("output port"))
    }

    pub(crate) fn resolve_enter(&self, id: EnterPortId) -> Result<&EnterPort, BlueprintError> {
        self.enter_port(id)
            .ok_or(BlueprintError::ForeignObject("enter port"))
    }

    pub(crate) fn resolve_exit(&self, id: ExitPortId) -> Result<&ExitPort, BlueprintError> {
        self.exit_port(id)
            .ok_or(BlueprintError::ForeignObject("exit port"))
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error while building a graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Input port not found
    #[error("Input port not found: {0:?}")]
    InputNotFound(InputPortId),

    /// Output port not found
    #[error("Output port not found: {0:?}")]
    OutputNotFound(OutputPortId),

    /// Enter port not found
    #[error("Enter port not found: {0:?}")]
    EnterNotFound(EnterPortId),

    /// Exit port not found
    #[error("Exit port not found: {0:?}")]
    ExitNotFound(ExitPortId),

    /// Node index past the node's ports
    #[error("Node '{node}' has no port at index {index}")]
    PortIndex {
        /// Node name
        node: String,
        /// Requested index
        index: usize,
    },

    /// Operation not supported by this node kind
    #[error("Expected a {expected} node, found '{found}'")]
    WrongNodeKind {
        /// Required kind
        expected: &'static str,
        /// Name of the node found
        found: String,
    },

    /// Expression input declared twice
    #[error("Expression input already declared: {0}")]
    DuplicateInput(String),

    /// Exit used as a subline is a plain exit
    #[error("Exit '{0}' is not a subline")]
    NotSubline(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_registers_fan_out_in_order() {
        let mut graph = Graph::new("test");
        let entry = graph.add_entry(vec![DataType::Number]);
        let a = graph.add_var("a");
        let b = graph.add_var("b");
        graph.attach_nodes(entry, 0, b, 0).unwrap();
        graph.attach_nodes(entry, 0, a, 0).unwrap();

        let output = graph.node(entry).unwrap().output(0).unwrap();
        let expected = vec![
            graph.node(b).unwrap().ports.inputs[0],
            graph.node(a).unwrap().ports.inputs[0],
        ];
        assert_eq!(graph.output_port(output).unwrap().targets(), expected.as_slice());
    }

    #[test]
    fn test_rebind_removes_old_fan_out() {
        let mut graph = Graph::new("test");
        let first = graph.add_var("first");
        let second = graph.add_var("second");
        let reader = graph.add_if();
        let old = graph.node(first).unwrap().ports.outputs[0];
        let new = graph.node(second).unwrap().ports.outputs[0];
        let input = graph.node(reader).unwrap().ports.inputs[0];

        graph.attach(input, old).unwrap();
        graph.attach(input, new).unwrap();

        assert_eq!(graph.input_port(input).unwrap().target(), Some(new));
        assert!(graph.output_port(old).unwrap().targets().is_empty());
        assert_eq!(graph.output_port(new).unwrap().targets(), &[input]);

        // Rebinding to the same output keeps a single registration
        graph.attach(input, new).unwrap();
        assert_eq!(graph.output_port(new).unwrap().targets().len(), 1);
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let mut graph = Graph::new("test");
        let var = graph.add_var("x");
        let input = graph.node(var).unwrap().ports.inputs[0];

        let mut other = Graph::new("other");
        let foreign = other.add_var("y");
        let foreign_output = other.node(foreign).unwrap().ports.outputs[0];
        let foreign_enter = other.node(foreign).unwrap().ports.enters[0];
        let exit = graph.node(var).unwrap().ports.exits[0];

        assert!(matches!(
            graph.attach(input, foreign_output),
            Err(GraphError::OutputNotFound(_))
        ));
        assert!(matches!(
            graph.connect(exit, foreign_enter),
            Err(GraphError::EnterNotFound(_))
        ));
        assert!(matches!(
            graph.connect_nodes(var, 0, foreign, 0),
            Err(GraphError::NodeNotFound(_))
        ));
        assert!(matches!(
            graph.connect_nodes(var, 3, var, 0),
            Err(GraphError::PortIndex { index: 3, .. })
        ));
    }

    #[test]
    fn test_connect_subline_requires_subline_exit() {
        let mut graph = Graph::new("test");
        let looping = graph.add_while();
        let body = graph.add_var("x");
        let ports = graph.node(looping).unwrap().ports.clone();
        let enter = graph.node(body).unwrap().ports.enters[0];

        graph.connect_subline(ports.exits[0], enter).unwrap();
        assert_eq!(graph.exit_port(ports.exits[0]).unwrap().target(), Some(enter));
        assert!(matches!(
            graph.connect_subline(ports.exits[1], enter),
            Err(GraphError::NotSubline(ref name)) if name == "exit"
        ));
    }

    #[test]
    fn test_expression_inputs() {
        let mut graph = Graph::new("test");
        let expr = graph.add_expression();
        let a = graph.add_expression_input(expr, "a").unwrap();
        graph.add_expression_input(expr, "b").unwrap();

        assert!(matches!(
            graph.add_expression_input(expr, "a"),
            Err(GraphError::DuplicateInput(_))
        ));
        let node = graph.node(expr).unwrap();
        assert_eq!(node.ports.inputs.len(), 2);
        let NodeKind::Expression(expression) = &node.kind else {
            panic!("expected an expression node");
        };
        assert_eq!(expression.input_port("a"), Some(a));
        assert_eq!(expression.input_symbols().collect::<Vec<_>>(), vec!["a", "b"]);

        let var = graph.add_var("x");
        assert!(matches!(
            graph.add_expression_input(var, "a"),
            Err(GraphError::WrongNodeKind { expected: "expression", .. })
        ));
        assert!(graph.set_expression(var, Expression::constant(1)).is_err());
    }

    #[test]
    fn test_void_end_has_no_input() {
        let mut graph = Graph::new("test");
        let void = graph.add_end(Some(DataType::Void));
        let typed = graph.add_end(Some(DataType::Number));
        assert!(graph.node(void).unwrap().ports.inputs.is_empty());
        assert_eq!(graph.node(typed).unwrap().ports.inputs.len(), 1);
        assert_eq!(graph.node_count(), 2);
        assert!(graph.nodes().all(Node::is_end));

        let var = graph.add_var("x");
        assert!(!graph.node(var).unwrap().is_end());
    }
}
