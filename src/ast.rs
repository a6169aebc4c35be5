// Abstract Syntax Tree definitions

use serde::{Deserialize, Serialize};

/// Stage types that can be attached to path steps
///
/// Predicates following a path segment become "stages" applied during that
/// step's extraction, not separate steps of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// Filter/index predicate stage [expr]
    Filter(Box<AstNode>),
}

/// A step in a path expression with optional stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    /// The main step node (field name, wildcard, descendant, or an
    /// arbitrary head expression for the first step)
    pub node: AstNode,
    /// Stages to apply during this step (e.g., predicates)
    pub stages: Vec<Stage>,
}

/// AST node types
///
/// A call site (`Function`) exposes a name and an ordered list of argument
/// sub-trees. Nodes are constructed once per parse and never mutated by
/// evaluation, so one tree can be evaluated any number of times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    /// String literal (e.g., "hello", 'world')
    Str(String),

    /// Integer literal — kept separate from Float so the numeric sub-kind
    /// survives into evaluation
    Int(i64),

    /// Floating-point literal
    Float(f64),

    /// Boolean literal
    Bool(bool),

    /// Null literal
    Null,

    /// Field/property name in path expressions (e.g., foo in foo.bar).
    /// Distinct from Str: Name is a field access, Str is a literal value.
    Name(String),

    /// The implicit context value ($)
    Context,

    /// Wildcard operator (*) in path expressions
    Wildcard,

    /// Descendant operator (**) in path expressions
    Descendant,

    /// Path expression (e.g., foo.bar[0].*)
    Path { steps: Vec<PathStep> },

    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    /// Unary operation
    Unary { op: UnaryOp, operand: Box<AstNode> },

    /// Conditional expression (? :)
    Conditional {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Option<Box<AstNode>>,
    },

    /// Array constructor
    Array(Vec<AstNode>),

    /// Object constructor
    Object(Vec<(AstNode, AstNode)>),

    /// Built-in function call (e.g., $lowercase(name))
    Function { name: String, args: Vec<AstNode> },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,

    // String
    Concatenate,

    // Membership
    In,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation (-)
    Negate,
}

impl PathStep {
    /// Create a path step from a node without stages
    pub fn new(node: AstNode) -> Self {
        PathStep {
            node,
            stages: Vec::new(),
        }
    }

    /// Create a path step with stages
    pub fn with_stages(node: AstNode, stages: Vec<Stage>) -> Self {
        PathStep { node, stages }
    }
}

impl AstNode {
    /// Create a string literal node
    pub fn string(s: impl Into<String>) -> Self {
        AstNode::Str(s.into())
    }

    /// Create a field name node
    pub fn name(s: impl Into<String>) -> Self {
        AstNode::Name(s.into())
    }

    /// Create a function call node
    pub fn function(name: impl Into<String>, args: Vec<AstNode>) -> Self {
        AstNode::Function {
            name: name.into(),
            args,
        }
    }
}
