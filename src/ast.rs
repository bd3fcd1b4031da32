use std::fmt;

use crate::token::{Span, Token};
use crate::types::Type;

/// Diagnostic categories recorded on nodes during parsing and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedToken,
    UnterminatedArgList,
    UnterminatedList,
    UnknownName,
    UnknownType,
    IncompatibleTypes,
    ArgumentCountMismatch,
    ReturnOutsideFunction,
    NotAFunction,
    DuplicateFunction,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            ErrorKind::UnexpectedToken => "Unexpected token",
            ErrorKind::UnterminatedArgList => "Unterminated argument list",
            ErrorKind::UnterminatedList => "Unterminated list literal",
            ErrorKind::UnknownName => "Unknown name",
            ErrorKind::UnknownType => "Unknown type",
            ErrorKind::IncompatibleTypes => "Incompatible types",
            ErrorKind::ArgumentCountMismatch => "Wrong number of arguments",
            ErrorKind::ReturnOutsideFunction => "Return outside of function",
            ErrorKind::NotAFunction => "Not a function",
            ErrorKind::DuplicateFunction => "Duplicate function definition",
        };
        write!(f, "{description}")
    }
}

/// A recoverable error attached to the node where recovery happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Text of the offending token.
    pub token: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, token: &Token) -> Self {
        Self {
            kind,
            token: token.text.clone(),
            span: token.span,
        }
    }

    /// Semantic-pass constructor: no single offending token, just the name
    /// or rendering that triggered the error plus the node's span.
    pub fn at_span(kind: ErrorKind, token: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            token: token.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' at line {}, column {}",
            self.kind, self.token, self.span.line, self.span.column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityOperator {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditiveOperator {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorOperator {
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    IntegerLiteral(i64),
    StringLiteral(String),
    BooleanLiteral(bool),
    NullLiteral,
    Identifier(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Equality {
        op: EqualityOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Comparison {
        op: ComparisonOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Additive {
        op: AdditiveOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Factor {
        op: FactorOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Parenthesized(Box<Expression>),
    ListLiteral(Vec<Expression>),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    /// Placeholder wrapping one offending token; keeps the tree structurally
    /// complete while guaranteeing parser forward progress.
    SyntaxError,
}

/// Expression node: variant payload plus span, diagnostics, and the static
/// type cached by validation. Nodes are built once by the parser; after that
/// only `errors` grows and `ty` is set exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
    pub errors: Vec<Diagnostic>,
    pub ty: Option<Type>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self {
            kind,
            span,
            errors: Vec::new(),
            ty: None,
        }
    }

    pub fn add_error(&mut self, kind: ErrorKind, token: &Token) {
        self.errors.push(Diagnostic::new(kind, token));
    }

    /// Static type assigned by validation. Validation guarantees every
    /// expression gets a type, so this is total on validated trees.
    pub fn ty(&self) -> &Type {
        self.ty.as_ref().unwrap_or(&Type::Object)
    }

    /// True if this node or any descendant carries a diagnostic.
    pub fn has_errors(&self) -> bool {
        if !self.errors.is_empty() {
            return true;
        }
        match &self.kind {
            ExpressionKind::IntegerLiteral(_)
            | ExpressionKind::StringLiteral(_)
            | ExpressionKind::BooleanLiteral(_)
            | ExpressionKind::NullLiteral
            | ExpressionKind::Identifier(_)
            | ExpressionKind::SyntaxError => false,
            ExpressionKind::Unary { operand, .. } => operand.has_errors(),
            ExpressionKind::Equality { left, right, .. }
            | ExpressionKind::Comparison { left, right, .. }
            | ExpressionKind::Additive { left, right, .. }
            | ExpressionKind::Factor { left, right, .. } => {
                left.has_errors() || right.has_errors()
            }
            ExpressionKind::Parenthesized(inner) => inner.has_errors(),
            ExpressionKind::ListLiteral(elements) => {
                elements.iter().any(Expression::has_errors)
            }
            ExpressionKind::FunctionCall { args, .. } => {
                args.iter().any(Expression::has_errors)
            }
        }
    }

    pub fn collect_diagnostics<'a>(&'a self, out: &mut Vec<&'a Diagnostic>) {
        out.extend(self.errors.iter());
        match &self.kind {
            ExpressionKind::Unary { operand, .. } => operand.collect_diagnostics(out),
            ExpressionKind::Equality { left, right, .. }
            | ExpressionKind::Comparison { left, right, .. }
            | ExpressionKind::Additive { left, right, .. }
            | ExpressionKind::Factor { left, right, .. } => {
                left.collect_diagnostics(out);
                right.collect_diagnostics(out);
            }
            ExpressionKind::Parenthesized(inner) => inner.collect_diagnostics(out),
            ExpressionKind::ListLiteral(elements) => {
                for element in elements {
                    element.collect_diagnostics(out);
                }
            }
            ExpressionKind::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_diagnostics(out);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub declared_type: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Print {
        value: Expression,
    },
    VariableDeclaration {
        name: String,
        declared_type: Option<Type>,
        initializer: Expression,
    },
    Assignment {
        name: String,
        value: Expression,
    },
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    ForEach {
        variable: String,
        iterable: Expression,
        body: Vec<Statement>,
    },
    FunctionDefinition {
        name: String,
        parameters: Vec<Parameter>,
        return_type: Option<Type>,
        body: Vec<Statement>,
    },
    Return {
        value: Option<Expression>,
    },
    /// A function call in statement position.
    Call(Expression),
    SyntaxError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
    pub errors: Vec<Diagnostic>,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self {
            kind,
            span,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, kind: ErrorKind, token: &Token) {
        self.errors.push(Diagnostic::new(kind, token));
    }

    pub fn has_errors(&self) -> bool {
        if !self.errors.is_empty() {
            return true;
        }
        match &self.kind {
            StatementKind::Print { value } => value.has_errors(),
            StatementKind::VariableDeclaration { initializer, .. } => initializer.has_errors(),
            StatementKind::Assignment { value, .. } => value.has_errors(),
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                condition.has_errors()
                    || then_body.iter().any(Statement::has_errors)
                    || else_body.iter().any(Statement::has_errors)
            }
            StatementKind::ForEach { iterable, body, .. } => {
                iterable.has_errors() || body.iter().any(Statement::has_errors)
            }
            StatementKind::FunctionDefinition { body, .. } => {
                body.iter().any(Statement::has_errors)
            }
            StatementKind::Return { value } => {
                value.as_ref().is_some_and(Expression::has_errors)
            }
            StatementKind::Call(call) => call.has_errors(),
            StatementKind::SyntaxError => false,
        }
    }

    pub fn collect_diagnostics<'a>(&'a self, out: &mut Vec<&'a Diagnostic>) {
        out.extend(self.errors.iter());
        match &self.kind {
            StatementKind::Print { value } => value.collect_diagnostics(out),
            StatementKind::VariableDeclaration { initializer, .. } => {
                initializer.collect_diagnostics(out)
            }
            StatementKind::Assignment { value, .. } => value.collect_diagnostics(out),
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                condition.collect_diagnostics(out);
                for statement in then_body.iter().chain(else_body) {
                    statement.collect_diagnostics(out);
                }
            }
            StatementKind::ForEach { iterable, body, .. } => {
                iterable.collect_diagnostics(out);
                for statement in body {
                    statement.collect_diagnostics(out);
                }
            }
            StatementKind::FunctionDefinition { body, .. } => {
                for statement in body {
                    statement.collect_diagnostics(out);
                }
            }
            StatementKind::Return { value } => {
                if let Some(value) = value {
                    value.collect_diagnostics(out);
                }
            }
            StatementKind::Call(call) => call.collect_diagnostics(out),
            StatementKind::SyntaxError => {}
        }
    }
}

/// Root of a parse: either one top-level expression or a statement list,
/// never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramBody {
    Expression(Expression),
    Statements(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: ProgramBody,
    pub span: Span,
}

impl Program {
    pub fn expression(&self) -> Option<&Expression> {
        match &self.body {
            ProgramBody::Expression(expression) => Some(expression),
            ProgramBody::Statements(_) => None,
        }
    }

    pub fn statements(&self) -> &[Statement] {
        match &self.body {
            ProgramBody::Expression(_) => &[],
            ProgramBody::Statements(statements) => statements,
        }
    }

    /// Recursive contains-error query over the whole tree.
    pub fn has_errors(&self) -> bool {
        match &self.body {
            ProgramBody::Expression(expression) => expression.has_errors(),
            ProgramBody::Statements(statements) => {
                statements.iter().any(Statement::has_errors)
            }
        }
    }

    /// All diagnostics in the tree, in source order.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        let mut out = Vec::new();
        match &self.body {
            ProgramBody::Expression(expression) => expression.collect_diagnostics(&mut out),
            ProgramBody::Statements(statements) => {
                for statement in statements {
                    statement.collect_diagnostics(&mut out);
                }
            }
        }
        out
    }
}
