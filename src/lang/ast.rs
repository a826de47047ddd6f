use std::fmt;
use std::rc::Rc;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PrefixOperator {
    /// `!`
    Not,
    /// `-`
    Minus,
}

impl PrefixOperator {
    pub fn op_str(&self) -> &str {
        match self {
            PrefixOperator::Not => "!",
            PrefixOperator::Minus => "-",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum InfixOperator {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
}

impl InfixOperator {
    pub fn op_str(&self) -> &str {
        match self {
            InfixOperator::Plus => "+",
            InfixOperator::Minus => "-",
            InfixOperator::Multiply => "*",
            InfixOperator::Divide => "/",
            InfixOperator::Equals => "==",
            InfixOperator::NotEquals => "!=",
            InfixOperator::LessThan => "<",
            InfixOperator::GreaterThan => ">",
        }
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op_str())
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op_str())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Constant {
    Integer(i64),
    Boolean(bool),
}

#[derive(Debug, PartialEq, Hash, PartialOrd, Ord, Eq, Clone)]
pub struct Identifier(pub String);

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A function definition as written in source
///
/// Shared by reference between the syntax tree and every function value created from it. The
/// body is never copied or mutated after parsing.
#[derive(Debug, PartialEq)]
pub struct FunctionLiteral {
    pub name: Option<Identifier>,
    pub parameters: Vec<Identifier>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Identifier(Identifier),
    Constant(Constant),
    Str(String),
    List(Vec<Expression>),
    /// (source, index)
    Index(Box<Expression>, Box<Expression>),
    Prefix(PrefixOperator, Box<Expression>),
    Infix(InfixOperator, Box<Expression>, Box<Expression>),
    /// (condition, consequence, alternative)
    IfElse(Box<Expression>, Vec<Statement>, Vec<Statement>),
    Function(Rc<FunctionLiteral>),
    /// (function, arguments)
    Call(Box<Expression>, Vec<Expression>),
    /// (source, member)
    ///
    /// `member` is either an identifier (global access) or a call whose callee is an identifier
    /// (package function call)
    DotAccess(Box<Expression>, Box<Expression>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Let(Identifier, Expression),
    Assign(Identifier, Expression),
    /// (condition, body)
    While(Expression, Vec<Statement>),
    Return(Expression),
    /// Package paths, eg. `math` or `std/math`
    Import(Vec<String>),
    Expression(Expression),
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}
