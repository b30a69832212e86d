//! XMD abstract syntax tree.
//!
//! Every node is an [`AstNode`]: a [`Node`] payload plus the
//! [`SourceLocation`] it was parsed from.  Parents own their children; a tree
//! is dropped as a whole once the program has been evaluated.

use std::fmt;

/// Where a node came from, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub filename: Option<String>,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        SourceLocation {
            line,
            column,
            filename: None,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(name) => write!(f, "{name}:{}:{}", self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

/// Binding pattern for `destructure`.
#[derive(Debug, Clone, PartialEq)]
pub enum DestructurePattern {
    /// `destructure src a b ...rest`
    Array {
        names: Vec<String>,
        rest: Option<String>,
    },
    /// `destructure src key1 target1 key2 target2`
    Object(Vec<(String, String)>),
}

/// Node payloads.  A payload is only ever read through its own variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Program(Vec<AstNode>),
    /// `<!-- xmd: ... -->` block inside a document.
    Directive(Vec<AstNode>),
    Block(Vec<AstNode>),
    /// Literal document text, written out after `{{name}}` interpolation.
    Text(String),

    Assignment {
        name: String,
        op: AssignOp,
        value: Box<AstNode>,
    },
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<AstNode>,
    },
    FunctionCall {
        name: String,
        args: Vec<AstNode>,
    },
    /// `${name}` / `{{name}}`
    VariableRef(String),
    Identifier(String),
    Literal(Literal),
    ArrayLiteral(Vec<AstNode>),
    ObjectLiteral(Vec<(String, AstNode)>),
    ArrayAccess {
        array: Box<AstNode>,
        index: Box<AstNode>,
    },
    ObjectAccess {
        object: Box<AstNode>,
        property: String,
    },

    Conditional {
        condition: Box<AstNode>,
        then_block: Box<AstNode>,
        else_block: Option<Box<AstNode>>,
    },
    /// `for x in collection`
    Loop {
        variable: String,
        iterable: Box<AstNode>,
        body: Box<AstNode>,
    },
    WhileLoop {
        condition: Box<AstNode>,
        body: Box<AstNode>,
    },
    /// `loop N times`
    LoopTimes {
        count: Box<AstNode>,
        body: Box<AstNode>,
    },
    /// `for i in a..b`, inclusive.
    ForRange {
        variable: String,
        start: Box<AstNode>,
        end: Box<AstNode>,
        body: Box<AstNode>,
    },
    /// `for i, item in collection`
    ForIndexed {
        index_var: String,
        item_var: String,
        iterable: Box<AstNode>,
        body: Box<AstNode>,
    },
    Break,
    Continue,

    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Box<AstNode>,
    },
    Return(Option<Box<AstNode>>),
    ClassDef {
        name: String,
        parent: Option<String>,
        methods: Vec<AstNode>,
    },
    MethodDef {
        name: String,
        params: Vec<String>,
        body: Box<AstNode>,
        is_private: bool,
        is_constructor: bool,
    },
    Lambda {
        params: Vec<String>,
        body: Box<AstNode>,
    },
    StringMethod {
        receiver: Box<AstNode>,
        method: String,
        args: Vec<AstNode>,
    },

    FileRead(Box<AstNode>),
    FileWrite {
        path: Box<AstNode>,
        content: Box<AstNode>,
    },
    FileExists(Box<AstNode>),
    FileDelete(Box<AstNode>),
    FileList(Box<AstNode>),

    TryCatch {
        try_block: Box<AstNode>,
        catch_var: Option<String>,
        catch_block: Box<AstNode>,
    },
    Throw(Box<AstNode>),
    Ternary {
        condition: Box<AstNode>,
        then_expr: Box<AstNode>,
        else_expr: Box<AstNode>,
    },

    Await(Box<AstNode>),
    Import(String),
    Destructure {
        source: Box<AstNode>,
        pattern: DestructurePattern,
    },
    Spread(Box<AstNode>),
    /// `function* name` — registered, but its body never runs.
    GeneratorDef {
        name: String,
        params: Vec<String>,
    },
    Yield(Option<Box<AstNode>>),
}

/// A node plus its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub node: Node,
    pub location: SourceLocation,
}

impl AstNode {
    pub fn new(node: Node, location: SourceLocation) -> Self {
        AstNode { node, location }
    }

    pub fn string(s: impl Into<String>, location: SourceLocation) -> Self {
        AstNode::new(Node::Literal(Literal::String(s.into())), location)
    }

    pub fn block(stmts: Vec<AstNode>, location: SourceLocation) -> Self {
        AstNode::new(Node::Block(stmts), location)
    }

    pub fn boxed(self) -> Box<AstNode> {
        Box::new(self)
    }

    /// Statements of a `Program`, `Directive` or `Block`; a lone statement
    /// otherwise.
    pub fn statements(&self) -> &[AstNode] {
        match &self.node {
            Node::Program(s) | Node::Directive(s) | Node::Block(s) => s,
            _ => std::slice::from_ref(self),
        }
    }

    /// Short name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.node {
            Node::Program(_) => "program",
            Node::Directive(_) => "directive",
            Node::Block(_) => "block",
            Node::Text(_) => "text",
            Node::Assignment { .. } => "assignment",
            Node::BinaryOp { .. } => "binary op",
            Node::UnaryOp { .. } => "unary op",
            Node::FunctionCall { .. } => "function call",
            Node::VariableRef(_) => "variable ref",
            Node::Identifier(_) => "identifier",
            Node::Literal(_) => "literal",
            Node::ArrayLiteral(_) => "array literal",
            Node::ObjectLiteral(_) => "object literal",
            Node::ArrayAccess { .. } => "array access",
            Node::ObjectAccess { .. } => "object access",
            Node::Conditional { .. } => "conditional",
            Node::Loop { .. } => "loop",
            Node::WhileLoop { .. } => "while loop",
            Node::LoopTimes { .. } => "loop times",
            Node::ForRange { .. } => "for range",
            Node::ForIndexed { .. } => "for indexed",
            Node::Break => "break",
            Node::Continue => "continue",
            Node::FunctionDef { .. } => "function def",
            Node::Return(_) => "return",
            Node::ClassDef { .. } => "class def",
            Node::MethodDef { .. } => "method def",
            Node::Lambda { .. } => "lambda",
            Node::StringMethod { .. } => "method call",
            Node::FileRead(_) => "File.read",
            Node::FileWrite { .. } => "File.write",
            Node::FileExists(_) => "File.exists",
            Node::FileDelete(_) => "File.delete",
            Node::FileList(_) => "File.list",
            Node::TryCatch { .. } => "try/catch",
            Node::Throw(_) => "throw",
            Node::Ternary { .. } => "ternary",
            Node::Await(_) => "await",
            Node::Import(_) => "import",
            Node::Destructure { .. } => "destructure",
            Node::Spread(_) => "spread",
            Node::GeneratorDef { .. } => "generator def",
            Node::Yield(_) => "yield",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_of_block_and_leaf() {
        let loc = SourceLocation::new(1, 1);
        let leaf = AstNode::string("x", loc.clone());
        let block = AstNode::block(vec![leaf.clone(), leaf.clone()], loc);
        assert_eq!(block.statements().len(), 2);
        assert_eq!(leaf.statements().len(), 1);
    }

    #[test]
    fn location_display() {
        let mut loc = SourceLocation::new(4, 2);
        assert_eq!(loc.to_string(), "4:2");
        loc.filename = Some("doc.md".into());
        assert_eq!(loc.to_string(), "doc.md:4:2");
    }
}
