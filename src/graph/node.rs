use crate::jvm::{EvaluationStrategy, Modifier};
use std::fmt;

/// Kind discriminant for emitted nodes
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    File,
    NamespaceBlock,
    Method,
    MethodParameterIn,
    MethodReturn,
    Modifier,
    Block,
    Local,
    Literal,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "FILE",
            NodeKind::NamespaceBlock => "NAMESPACE_BLOCK",
            NodeKind::Method => "METHOD",
            NodeKind::MethodParameterIn => "METHOD_PARAMETER_IN",
            NodeKind::MethodReturn => "METHOD_RETURN",
            NodeKind::Modifier => "MODIFIER",
            NodeKind::Block => "BLOCK",
            NodeKind::Local => "LOCAL",
            NodeKind::Literal => "LITERAL",
        }
    }
}

/// A node of the projected program graph
///
/// Every node carries its globally unique sequence number `id`; ids are
/// handed out in emission order and double as the parent references of the
/// emission protocol.
#[derive(Clone, PartialEq, Debug)]
pub enum Node {
    File {
        id: usize,
        name: String,
    },
    NamespaceBlock {
        id: usize,
        name: String,
        full_name: String,
    },
    Method {
        id: usize,
        name: String,
        full_name: String,
        signature: String,
        line: i32,
    },
    MethodParameterIn {
        id: usize,
        code: String,
        name: String,
        evaluation_strategy: EvaluationStrategy,
        type_full_name: String,
        line: i32,
    },
    MethodReturn {
        id: usize,
        name: String,
        evaluation_strategy: EvaluationStrategy,
        type_full_name: String,
        line: i32,
    },
    Modifier {
        id: usize,
        modifier: Modifier,
    },
    Block {
        id: usize,
        name: String,
        type_full_name: String,
        line: i32,
    },
    Local {
        id: usize,
        name: String,
        type_full_name: String,
        line: i32,
    },
    Literal {
        id: usize,
        name: String,
        type_full_name: String,
        line: i32,
    },
}

impl Node {
    pub fn id(&self) -> usize {
        match self {
            Node::File { id, .. }
            | Node::NamespaceBlock { id, .. }
            | Node::Method { id, .. }
            | Node::MethodParameterIn { id, .. }
            | Node::MethodReturn { id, .. }
            | Node::Modifier { id, .. }
            | Node::Block { id, .. }
            | Node::Local { id, .. }
            | Node::Literal { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File { .. } => NodeKind::File,
            Node::NamespaceBlock { .. } => NodeKind::NamespaceBlock,
            Node::Method { .. } => NodeKind::Method,
            Node::MethodParameterIn { .. } => NodeKind::MethodParameterIn,
            Node::MethodReturn { .. } => NodeKind::MethodReturn,
            Node::Modifier { .. } => NodeKind::Modifier,
            Node::Block { .. } => NodeKind::Block,
            Node::Local { .. } => NodeKind::Local,
            Node::Literal { .. } => NodeKind::Literal,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File { name, .. }
            | Node::NamespaceBlock { name, .. }
            | Node::Method { name, .. }
            | Node::MethodParameterIn { name, .. }
            | Node::MethodReturn { name, .. }
            | Node::Block { name, .. }
            | Node::Local { name, .. }
            | Node::Literal { name, .. } => name,
            Node::Modifier { modifier, .. } => modifier.as_str(),
        }
    }

    pub fn line(&self) -> Option<i32> {
        match self {
            Node::Method { line, .. }
            | Node::MethodParameterIn { line, .. }
            | Node::MethodReturn { line, .. }
            | Node::Block { line, .. }
            | Node::Local { line, .. }
            | Node::Literal { line, .. } => Some(*line),
            Node::File { .. } | Node::NamespaceBlock { .. } | Node::Modifier { .. } => None,
        }
    }

    pub fn type_full_name(&self) -> Option<&str> {
        match self {
            Node::MethodParameterIn { type_full_name, .. }
            | Node::MethodReturn { type_full_name, .. }
            | Node::Block { type_full_name, .. }
            | Node::Local { type_full_name, .. }
            | Node::Literal { type_full_name, .. } => Some(type_full_name),
            _ => None,
        }
    }

    pub fn evaluation_strategy(&self) -> Option<EvaluationStrategy> {
        match self {
            Node::MethodParameterIn {
                evaluation_strategy,
                ..
            }
            | Node::MethodReturn {
                evaluation_strategy,
                ..
            } => Some(*evaluation_strategy),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind().as_str(), self.name())?;
        if let Some(typ) = self.type_full_name() {
            write!(f, " : {}", typ)?;
        }
        if let Some(strategy) = self.evaluation_strategy() {
            write!(f, " {}", strategy.as_str())?;
        }
        if let Some(line) = self.line() {
            write!(f, " @{}", line)?;
        }
        write!(f, " #{}", self.id())
    }
}
