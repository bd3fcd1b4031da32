use anyhow::Result;

use crate::ast::{
    AdditiveOperator, ComparisonOperator, Diagnostic, EqualityOperator, ErrorKind, Expression,
    ExpressionKind, FactorOperator, Parameter, Program, ProgramBody, Statement, StatementKind,
    UnaryOperator,
};
use crate::lexer;
use crate::token::{Token, TokenKind, TokenList};
use crate::types::Type;

/// Recursive-descent parser with local error recovery.
///
/// Parsing never fails: structural mismatches record an `UnexpectedToken`
/// diagnostic on the construct being parsed and continue, and a token that
/// starts no construct becomes a one-token syntax-error node, so every step
/// makes forward progress.
pub struct Parser {
    tokens: TokenList,
}

/// Dual-mode entry point: first speculatively parse the whole stream as a
/// single expression; if that attempt misparses or leaves tokens behind,
/// rewind and parse a statement list instead.
pub fn parse_tokens(tokens: Vec<Token>) -> Program {
    let mut parser = Parser::new(tokens);
    let expression = parser.parse_expression();
    // A root-level syntax-error placeholder is the "structural failure"
    // signal of the speculative attempt; recoverable diagnostics deeper in
    // the tree do not abandon expression mode.
    let failed = matches!(expression.kind, ExpressionKind::SyntaxError);
    if !failed && !parser.tokens.has_more() {
        let span = expression.span;
        return Program {
            body: ProgramBody::Expression(expression),
            span,
        };
    }

    parser.tokens.reset();
    let start = parser.tokens.current().span();
    let mut statements = Vec::new();
    while parser.tokens.has_more() {
        statements.push(parser.parse_program_statement());
    }
    let span = start.merge(parser.tokens.last_consumed().span());
    Program {
        body: ProgramBody::Statements(statements),
        span,
    }
}

/// Commit to expression parsing unconditionally (no statement fallback).
pub fn parse_expression_tokens(tokens: Vec<Token>) -> Program {
    let mut parser = Parser::new(tokens);
    let expression = parser.parse_expression();
    let span = expression.span;
    Program {
        body: ProgramBody::Expression(expression),
        span,
    }
}

/// Tokenize and parse in one step. Only lexing can fail.
pub fn parse(source: &str) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse_tokens(tokens))
}

/// Tokenize and parse as a single expression.
pub fn parse_as_expression(source: &str) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse_expression_tokens(tokens))
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: TokenList::new(tokens),
        }
    }

    /// Expect `kind` at the cursor. On a match the token is consumed and
    /// returned; on a mismatch a diagnostic lands in `errors`, the offending
    /// token is left unconsumed, and a clone of it is returned so span
    /// bookkeeping can proceed as if the expected token had been present.
    fn require(
        &mut self,
        kind: TokenKind,
        errors: &mut Vec<Diagnostic>,
        error: ErrorKind,
    ) -> Token {
        if self.tokens.matches(kind) {
            self.tokens.consume()
        } else {
            let current = self.tokens.current().clone();
            errors.push(Diagnostic::new(error, &current));
            current
        }
    }

    fn expect(&mut self, kind: TokenKind, errors: &mut Vec<Diagnostic>) -> Token {
        self.require(kind, errors, ErrorKind::UnexpectedToken)
    }

    //============================================================
    //  Statements
    //============================================================

    /// Top-level statements admit function definitions; nested statement
    /// lists do not (the grammar has no nested function literals).
    fn parse_program_statement(&mut self) -> Statement {
        if let Some(statement) = self.parse_function_definition() {
            return statement;
        }
        self.parse_statement()
    }

    fn parse_statement(&mut self) -> Statement {
        if let Some(statement) = self.parse_print_statement() {
            return statement;
        }
        if let Some(statement) = self.parse_for_statement() {
            return statement;
        }
        if let Some(statement) = self.parse_return_statement() {
            return statement;
        }
        if let Some(statement) = self.parse_if_statement() {
            return statement;
        }
        if let Some(statement) = self.parse_var_statement() {
            return statement;
        }
        if let Some(statement) = self.parse_assignment_or_call_statement() {
            return statement;
        }

        // No production matched: consume exactly one token so malformed
        // input still terminates in O(token count).
        let offending = self.tokens.consume();
        let mut statement = Statement::new(StatementKind::SyntaxError, offending.span());
        statement.add_error(ErrorKind::UnexpectedToken, &offending);
        statement
    }

    fn parse_function_definition(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::Function) {
            return None;
        }
        let start = self.tokens.consume();
        let mut errors = Vec::new();

        let name = self.expect(TokenKind::Identifier, &mut errors);
        self.expect(TokenKind::LeftParen, &mut errors);
        let mut parameters = Vec::new();
        if !self.tokens.matches(TokenKind::RightParen) {
            loop {
                let parameter_name = self.expect(TokenKind::Identifier, &mut errors);
                let declared_type = if self.tokens.match_and_consume(TokenKind::Colon) {
                    Some(self.parse_type_annotation(&mut errors))
                } else {
                    None
                };
                parameters.push(Parameter {
                    name: parameter_name.text,
                    declared_type,
                });
                if !(self.tokens.match_and_consume(TokenKind::Comma) && self.tokens.has_more()) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, &mut errors);

        let return_type = if self.tokens.match_and_consume(TokenKind::Colon) {
            Some(self.parse_type_annotation(&mut errors))
        } else {
            None
        };

        self.expect(TokenKind::LeftBrace, &mut errors);
        let body = self.parse_block_body();
        let end = self.expect(TokenKind::RightBrace, &mut errors);

        let mut statement = Statement::new(
            StatementKind::FunctionDefinition {
                name: name.text,
                parameters,
                return_type,
                body,
            },
            start.span().merge(end.span()),
        );
        statement.errors = errors;
        Some(statement)
    }

    fn parse_print_statement(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::Print) {
            return None;
        }
        let start = self.tokens.consume();
        let mut errors = Vec::new();
        self.expect(TokenKind::LeftParen, &mut errors);
        let value = self.parse_expression();
        let end = self.expect(TokenKind::RightParen, &mut errors);

        let mut statement = Statement::new(
            StatementKind::Print { value },
            start.span().merge(end.span()),
        );
        statement.errors = errors;
        Some(statement)
    }

    fn parse_for_statement(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::For) {
            return None;
        }
        let start = self.tokens.consume();
        let mut errors = Vec::new();
        self.expect(TokenKind::LeftParen, &mut errors);
        let variable = self.expect(TokenKind::Identifier, &mut errors);
        self.expect(TokenKind::In, &mut errors);
        let iterable = self.parse_expression();
        self.expect(TokenKind::RightParen, &mut errors);

        self.expect(TokenKind::LeftBrace, &mut errors);
        let body = self.parse_block_body();
        let end = self.expect(TokenKind::RightBrace, &mut errors);

        let mut statement = Statement::new(
            StatementKind::ForEach {
                variable: variable.text,
                iterable,
                body,
            },
            start.span().merge(end.span()),
        );
        statement.errors = errors;
        Some(statement)
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::Return) {
            return None;
        }
        let start = self.tokens.consume();
        // Bare `return` is only distinguishable by what follows: a closing
        // brace or end of input means no return value.
        let value = if self.tokens.matches_any(&[TokenKind::RightBrace, TokenKind::Eof]) {
            None
        } else {
            Some(self.parse_expression())
        };
        let span = start.span().merge(self.tokens.last_consumed().span());
        Some(Statement::new(StatementKind::Return { value }, span))
    }

    fn parse_if_statement(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::If) {
            return None;
        }
        let start = self.tokens.consume();
        let mut errors = Vec::new();
        self.expect(TokenKind::LeftParen, &mut errors);
        let condition = self.parse_expression();
        self.expect(TokenKind::RightParen, &mut errors);

        self.expect(TokenKind::LeftBrace, &mut errors);
        let then_body = self.parse_block_body();
        self.expect(TokenKind::RightBrace, &mut errors);

        let mut else_body = Vec::new();
        if self.tokens.match_and_consume(TokenKind::Else) {
            if self.tokens.matches(TokenKind::If) {
                // `else if` chains nest as a single-statement else branch.
                if let Some(nested) = self.parse_if_statement() {
                    else_body.push(nested);
                }
            } else {
                self.expect(TokenKind::LeftBrace, &mut errors);
                else_body = self.parse_block_body();
                self.expect(TokenKind::RightBrace, &mut errors);
            }
        }

        let span = start.span().merge(self.tokens.last_consumed().span());
        let mut statement = Statement::new(
            StatementKind::If {
                condition,
                then_body,
                else_body,
            },
            span,
        );
        statement.errors = errors;
        Some(statement)
    }

    fn parse_var_statement(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::Var) {
            return None;
        }
        let start = self.tokens.consume();
        let mut errors = Vec::new();
        let name = self.expect(TokenKind::Identifier, &mut errors);
        let declared_type = if self.tokens.match_and_consume(TokenKind::Colon) {
            Some(self.parse_type_annotation(&mut errors))
        } else {
            None
        };
        self.expect(TokenKind::Equal, &mut errors);
        let initializer = self.parse_expression();

        let span = start.span().merge(self.tokens.last_consumed().span());
        let mut statement = Statement::new(
            StatementKind::VariableDeclaration {
                name: name.text,
                declared_type,
                initializer,
            },
            span,
        );
        statement.errors = errors;
        Some(statement)
    }

    fn parse_assignment_or_call_statement(&mut self) -> Option<Statement> {
        if !self.tokens.matches(TokenKind::Identifier) {
            return None;
        }
        let name = self.tokens.consume();

        if self.tokens.match_and_consume(TokenKind::Equal) {
            let value = self.parse_expression();
            let span = name.span().merge(self.tokens.last_consumed().span());
            return Some(Statement::new(
                StatementKind::Assignment {
                    name: name.text,
                    value,
                },
                span,
            ));
        }

        if self.tokens.matches(TokenKind::LeftParen) {
            let call = self.parse_function_call(name);
            let span = call.span;
            return Some(Statement::new(StatementKind::Call(call), span));
        }

        // A lone identifier heads no statement; treat it as the one offending
        // token of a syntax-error statement.
        let mut statement = Statement::new(StatementKind::SyntaxError, name.span());
        statement.add_error(ErrorKind::UnexpectedToken, &name);
        Some(statement)
    }

    fn parse_block_body(&mut self) -> Vec<Statement> {
        let mut body = Vec::new();
        while !self.tokens.matches(TokenKind::RightBrace) && self.tokens.has_more() {
            body.push(self.parse_statement());
        }
        body
    }

    fn parse_type_annotation(&mut self, errors: &mut Vec<Diagnostic>) -> Type {
        if !self.tokens.matches(TokenKind::Identifier) {
            let current = self.tokens.current().clone();
            errors.push(Diagnostic::new(ErrorKind::UnknownType, &current));
            return Type::Object;
        }
        let name = self.tokens.consume();
        match name.text.as_str() {
            "int" => Type::Int,
            "string" => Type::String,
            "bool" => Type::Boolean,
            "object" => Type::Object,
            "list" => {
                if self.tokens.match_and_consume(TokenKind::Less) {
                    let component = self.parse_type_annotation(errors);
                    self.require(TokenKind::Greater, errors, ErrorKind::UnexpectedToken);
                    Type::list_of(component)
                } else {
                    Type::list_of(Type::Object)
                }
            }
            _ => {
                errors.push(Diagnostic::new(ErrorKind::UnknownType, &name));
                Type::Object
            }
        }
    }

    //============================================================
    //  Expressions
    //============================================================

    fn parse_expression(&mut self) -> Expression {
        self.parse_equality_expression()
    }

    fn parse_equality_expression(&mut self) -> Expression {
        let mut expression = self.parse_comparison_expression();
        while self
            .tokens
            .matches_any(&[TokenKind::EqualEqual, TokenKind::BangEqual])
        {
            let operator = self.tokens.consume();
            let op = match operator.kind() {
                TokenKind::EqualEqual => EqualityOperator::Equal,
                _ => EqualityOperator::NotEqual,
            };
            let right = self.parse_comparison_expression();
            let span = expression.span.merge(right.span);
            expression = Expression::new(
                ExpressionKind::Equality {
                    op,
                    left: Box::new(expression),
                    right: Box::new(right),
                },
                span,
            );
        }
        expression
    }

    fn parse_comparison_expression(&mut self) -> Expression {
        let mut expression = self.parse_additive_expression();
        while self.tokens.matches_any(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.tokens.consume();
            let op = match operator.kind() {
                TokenKind::Greater => ComparisonOperator::Greater,
                TokenKind::GreaterEqual => ComparisonOperator::GreaterEqual,
                TokenKind::Less => ComparisonOperator::Less,
                _ => ComparisonOperator::LessEqual,
            };
            let right = self.parse_additive_expression();
            let span = expression.span.merge(right.span);
            expression = Expression::new(
                ExpressionKind::Comparison {
                    op,
                    left: Box::new(expression),
                    right: Box::new(right),
                },
                span,
            );
        }
        expression
    }

    fn parse_additive_expression(&mut self) -> Expression {
        let mut expression = self.parse_factor_expression();
        while self
            .tokens
            .matches_any(&[TokenKind::Plus, TokenKind::Minus])
        {
            let operator = self.tokens.consume();
            let op = match operator.kind() {
                TokenKind::Plus => AdditiveOperator::Add,
                _ => AdditiveOperator::Subtract,
            };
            let right = self.parse_factor_expression();
            let span = expression.span.merge(right.span);
            expression = Expression::new(
                ExpressionKind::Additive {
                    op,
                    left: Box::new(expression),
                    right: Box::new(right),
                },
                span,
            );
        }
        expression
    }

    fn parse_factor_expression(&mut self) -> Expression {
        let mut expression = self.parse_unary_expression();
        while self
            .tokens
            .matches_any(&[TokenKind::Star, TokenKind::Slash])
        {
            let operator = self.tokens.consume();
            let op = match operator.kind() {
                TokenKind::Star => FactorOperator::Multiply,
                _ => FactorOperator::Divide,
            };
            let right = self.parse_unary_expression();
            let span = expression.span.merge(right.span);
            expression = Expression::new(
                ExpressionKind::Factor {
                    op,
                    left: Box::new(expression),
                    right: Box::new(right),
                },
                span,
            );
        }
        expression
    }

    fn parse_unary_expression(&mut self) -> Expression {
        if self.tokens.matches_any(&[TokenKind::Minus, TokenKind::Not]) {
            let operator = self.tokens.consume();
            let op = match operator.kind() {
                TokenKind::Minus => UnaryOperator::Negate,
                _ => UnaryOperator::Not,
            };
            let operand = self.parse_unary_expression();
            let span = operator.span().merge(operand.span);
            return Expression::new(
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            );
        }
        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> Expression {
        match self.tokens.current().kind() {
            TokenKind::Integer => {
                let token = self.tokens.consume();
                // The lexer already vetted the literal.
                let value = token.text.parse().unwrap_or_default();
                Expression::new(ExpressionKind::IntegerLiteral(value), token.span())
            }
            TokenKind::String => {
                let token = self.tokens.consume();
                Expression::new(ExpressionKind::StringLiteral(token.text), token.span)
            }
            TokenKind::True => {
                let token = self.tokens.consume();
                Expression::new(ExpressionKind::BooleanLiteral(true), token.span())
            }
            TokenKind::False => {
                let token = self.tokens.consume();
                Expression::new(ExpressionKind::BooleanLiteral(false), token.span())
            }
            TokenKind::Null => {
                let token = self.tokens.consume();
                Expression::new(ExpressionKind::NullLiteral, token.span())
            }
            TokenKind::LeftParen => {
                let open = self.tokens.consume();
                let inner = self.parse_expression();
                let mut errors = Vec::new();
                let close = self.expect(TokenKind::RightParen, &mut errors);
                let mut expression = Expression::new(
                    ExpressionKind::Parenthesized(Box::new(inner)),
                    open.span().merge(close.span()),
                );
                expression.errors = errors;
                expression
            }
            TokenKind::LeftBracket => self.parse_list_literal(),
            TokenKind::Identifier => {
                let token = self.tokens.consume();
                if self.tokens.matches(TokenKind::LeftParen) {
                    self.parse_function_call(token)
                } else {
                    Expression::new(ExpressionKind::Identifier(token.text), token.span)
                }
            }
            _ => {
                let offending = self.tokens.consume();
                let mut expression =
                    Expression::new(ExpressionKind::SyntaxError, offending.span());
                expression.add_error(ErrorKind::UnexpectedToken, &offending);
                expression
            }
        }
    }

    fn parse_list_literal(&mut self) -> Expression {
        let open = self.tokens.consume();
        let mut elements = Vec::new();
        let mut errors = Vec::new();

        if !self.tokens.matches(TokenKind::RightBracket) {
            loop {
                elements.push(self.parse_expression());
                if !(self.tokens.match_and_consume(TokenKind::Comma) && self.tokens.has_more()) {
                    break;
                }
            }
        }

        let end = if self.tokens.matches(TokenKind::RightBracket) {
            self.tokens.consume()
        } else {
            let current = self.tokens.current().clone();
            errors.push(Diagnostic::new(ErrorKind::UnterminatedList, &current));
            current
        };

        let mut expression = Expression::new(
            ExpressionKind::ListLiteral(elements),
            open.span().merge(end.span()),
        );
        expression.errors = errors;
        expression
    }

    /// `name` has been consumed and the cursor sits on `(`.
    fn parse_function_call(&mut self, name: Token) -> Expression {
        self.tokens.consume();
        let mut args = Vec::new();
        let mut errors = Vec::new();

        if !self.tokens.matches(TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression());
                if !(self.tokens.match_and_consume(TokenKind::Comma) && self.tokens.has_more()) {
                    break;
                }
            }
        }

        let end = if self.tokens.matches(TokenKind::RightParen) {
            self.tokens.consume()
        } else {
            let current = self.tokens.current().clone();
            errors.push(Diagnostic::new(ErrorKind::UnterminatedArgList, &current));
            current
        };

        let mut expression = Expression::new(
            ExpressionKind::FunctionCall {
                name: name.text,
                args,
            },
            name.span.merge(end.span()),
        );
        expression.errors = errors;
        expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_ok(source: &str) -> Program {
        let program = parse(source).expect("lex failed");
        assert!(!program.has_errors(), "unexpected diagnostics: {:?}", program.diagnostics());
        program
    }

    fn single_expression(source: &str) -> Expression {
        let program = parse_as_expression(source).expect("lex failed");
        program.expression().expect("not an expression program").clone()
    }

    #[test]
    fn expression_mode_covers_whole_input() {
        let source = "1 + 2 * 3";
        let expression = single_expression(source);
        assert!(!expression.has_errors());
        assert_eq!(expression.span.start, 0);
        assert_eq!(expression.span.end, source.len());
    }

    #[test]
    fn precedence_binds_factor_tighter_than_additive() {
        let expression = single_expression("1 + 2 * 3");
        let ExpressionKind::Additive { op, left, right } = &expression.kind else {
            panic!("expected additive at the root, got {:?}", expression.kind);
        };
        assert_eq!(*op, AdditiveOperator::Add);
        assert!(matches!(left.kind, ExpressionKind::IntegerLiteral(1)));
        assert!(matches!(right.kind, ExpressionKind::Factor { .. }));
    }

    #[test]
    fn additive_is_left_associative() {
        let expression = single_expression("1 - 2 - 3");
        let ExpressionKind::Additive { left, right, .. } = &expression.kind else {
            panic!("expected additive at the root");
        };
        assert!(matches!(right.kind, ExpressionKind::IntegerLiteral(3)));
        assert!(matches!(left.kind, ExpressionKind::Additive { .. }));
    }

    #[test]
    fn unary_chains_nest_right() {
        let expression = single_expression("--1");
        let ExpressionKind::Unary { op, operand } = &expression.kind else {
            panic!("expected unary at the root");
        };
        assert_eq!(*op, UnaryOperator::Negate);
        assert!(matches!(operand.kind, ExpressionKind::Unary { .. }));
    }

    #[test]
    fn dual_mode_falls_back_to_statements() {
        let program = parse_ok("print(1) print(2)");
        assert!(program.expression().is_none());
        assert_eq!(program.statements().len(), 2);
    }

    #[test]
    fn dual_mode_keeps_single_expression() {
        let program = parse_ok("[1, 2, 3]");
        assert!(program.expression().is_some());
    }

    #[test]
    fn unterminated_list_records_error_and_elements() {
        let program = parse_as_expression("[1, 2").expect("lex failed");
        let expression = program.expression().expect("not an expression");
        let ExpressionKind::ListLiteral(elements) = &expression.kind else {
            panic!("expected a list literal");
        };
        assert_eq!(elements.len(), 2);
        assert_eq!(expression.errors.len(), 1);
        assert_eq!(expression.errors[0].kind, ErrorKind::UnterminatedList);
    }

    #[test]
    fn recoverable_errors_do_not_abandon_expression_mode() {
        let program = parse("[1, 2").expect("lex failed");
        let expression = program.expression().expect("fell back to statements");
        assert!(matches!(expression.kind, ExpressionKind::ListLiteral(_)));
        assert!(program.has_errors());
    }

    #[test]
    fn unterminated_call_records_error() {
        let program = parse("foo(1, 2").expect("lex failed");
        let diagnostics = program.diagnostics();
        assert!(
            diagnostics
                .iter()
                .any(|diagnostic| diagnostic.kind == ErrorKind::UnterminatedArgList)
        );
    }

    #[test]
    fn malformed_input_always_yields_a_program() {
        let program = parse(") } ] , :").expect("lex failed");
        assert!(program.has_errors());
        assert_eq!(program.statements().len(), 5);
        for statement in program.statements() {
            assert!(matches!(statement.kind, StatementKind::SyntaxError));
        }
    }

    #[test]
    fn missing_token_is_recorded_on_the_construct() {
        let program = parse("if (true { print(1) }").expect("lex failed");
        let statement = &program.statements()[0];
        assert!(matches!(statement.kind, StatementKind::If { .. }));
        assert!(
            statement
                .errors
                .iter()
                .any(|diagnostic| diagnostic.kind == ErrorKind::UnexpectedToken)
        );
    }

    #[test]
    fn parses_function_definition_shape() {
        let source = indoc! {"
            function add(a : int, b : int) : int {
                return a + b
            }
            print(add(1, 2))
        "};
        let program = parse_ok(source);
        let StatementKind::FunctionDefinition {
            name,
            parameters,
            return_type,
            body,
        } = &program.statements()[0].kind
        else {
            panic!("expected a function definition");
        };
        assert_eq!(name, "add");
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[0].declared_type, Some(Type::Int));
        assert_eq!(*return_type, Some(Type::Int));
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0].kind, StatementKind::Return { value: Some(_) }));
    }

    #[test]
    fn parses_list_type_annotations() {
        let program = parse_ok("var x : list<list<int>> = []");
        let StatementKind::VariableDeclaration { declared_type, .. } =
            &program.statements()[0].kind
        else {
            panic!("expected a variable declaration");
        };
        assert_eq!(
            *declared_type,
            Some(Type::list_of(Type::list_of(Type::Int)))
        );
    }

    #[test]
    fn else_if_chains_nest() {
        let source = indoc! {"
            if (a == 1) {
                print(1)
            } else if (a == 2) {
                print(2)
            } else {
                print(3)
            }
        "};
        let program = parse(source).expect("lex failed");
        let StatementKind::If { else_body, .. } = &program.statements()[0].kind else {
            panic!("expected an if statement");
        };
        assert_eq!(else_body.len(), 1);
        assert!(matches!(else_body[0].kind, StatementKind::If { .. }));
    }

    #[test]
    fn statement_spans_cover_children() {
        let source = "var total = 1 + 2";
        let program = parse_ok(source);
        let statement = &program.statements()[0];
        assert_eq!(statement.span.start, 0);
        assert_eq!(statement.span.end, source.len());
    }
}
