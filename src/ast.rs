/// An expression tree node.
///
/// Message sends are fully disambiguated by the parser: unary, binary
/// operator, and keyword/mixfix forms all become `Message` nodes whose
/// selector is the assembled text ("length", "+", "foo bar ").
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Name(String),
    SelfRef,

    /// Two or more statements; the value is the last one's.
    Sequence(Vec<Expr>),

    /// `var name = value`
    Var { name: String, value: Box<Expr> },

    /// `var name = undefined`: removes the binding from the current scope.
    Undefine(String),

    /// `name = value`
    Set { name: String, value: Box<Expr> },

    Message {
        receiver: Box<Expr>,
        selector: String,
        args: Vec<Expr>,
    },

    /// A block literal with its parameter names.
    Block { params: Vec<String>, body: Box<Expr> },

    /// An object literal: `obj -> parent { defines }`.
    Object {
        parent: Box<Expr>,
        defines: Vec<Define>,
    },

    /// `def receiver { defines }`: attaches definitions to a named object.
    Def {
        receiver: String,
        defines: Vec<Define>,
    },

    Array(Vec<Expr>),

    Return(Box<Expr>),
}

/// One entry of a `def` or object-literal body.
///
/// Method entries carry a `Block` body; field entries (names starting with
/// `_`) carry an arbitrary initial-value expression. The parser desugars a
/// plain `name = value` entry into a `_name` field plus a zero-argument
/// accessor method, so by the time the compiler sees a `Define`, `is_method`
/// and the name prefix agree.
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub is_method: bool,
    pub name: String,
    pub body: Expr,
}

impl Expr {
    /// Field names address the object scope of the current self.
    pub fn is_field(name: &str) -> bool {
        name.starts_with('_')
    }

    /// Global names start with an uppercase letter.
    pub fn is_global(name: &str) -> bool {
        name.chars().next().map(|c| c.is_ascii_uppercase()) == Some(true)
    }
}
