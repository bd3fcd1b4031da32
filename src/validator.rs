use std::collections::HashMap;

use crate::ast::{
    AdditiveOperator, Diagnostic, ErrorKind, Expression, ExpressionKind, Program, ProgramBody,
    Statement, StatementKind, UnaryOperator,
};
use crate::types::Type;

/// Declared shape of a function, registered during validation and consulted
/// at call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub parameters: Vec<(String, Type)>,
    pub return_type: Type,
}

/// Chained scopes mapping names to declared types, plus a flat function
/// registry. Lookup walks innermost to global; redeclaration in the same
/// scope overwrites.
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Type>>,
    functions: HashMap<String, FunctionSignature>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            functions: HashMap::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    pub fn declare(&mut self, name: &str, ty: Type) {
        self.scopes
            .last_mut()
            .expect("symbol table always has a global scope")
            .insert(name.to_string(), ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    pub fn register_function(&mut self, name: &str, signature: FunctionSignature) -> bool {
        self.functions.insert(name.to_string(), signature).is_none()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Static validation pass: assigns a type to every expression, resolves
/// names, and records semantic errors on the offending nodes. Never fails;
/// running it twice on the same tree adds nothing new (diagnostics are
/// deduplicated and types recompute to the same values).
pub fn validate(program: &mut Program) {
    let mut table = SymbolTable::new();
    match &mut program.body {
        ProgramBody::Expression(expression) => validate_expression(expression, &mut table),
        ProgramBody::Statements(statements) => {
            for statement in statements {
                validate_statement(statement, &mut table, None);
            }
        }
    }
}

fn add_error(errors: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    if !errors.contains(&diagnostic) {
        errors.push(diagnostic);
    }
}

fn validate_statement(
    statement: &mut Statement,
    table: &mut SymbolTable,
    current_function: Option<&FunctionSignature>,
) {
    let span = statement.span;
    match &mut statement.kind {
        StatementKind::Print { value } => {
            // print accepts any type.
            validate_expression(value, table);
        }
        StatementKind::VariableDeclaration {
            name,
            declared_type,
            initializer,
        } => {
            validate_expression(initializer, table);
            let declared = match declared_type {
                Some(declared) => {
                    if !declared.assignable_from(initializer.ty()) {
                        add_error(
                            &mut statement.errors,
                            Diagnostic::at_span(
                                ErrorKind::IncompatibleTypes,
                                initializer.ty().to_string(),
                                span,
                            ),
                        );
                    }
                    declared.clone()
                }
                None => initializer.ty().clone(),
            };
            table.declare(name, declared);
        }
        StatementKind::Assignment { name, value } => {
            validate_expression(value, table);
            match table.lookup(name) {
                Some(declared) => {
                    if !declared.assignable_from(value.ty()) {
                        add_error(
                            &mut statement.errors,
                            Diagnostic::at_span(
                                ErrorKind::IncompatibleTypes,
                                value.ty().to_string(),
                                span,
                            ),
                        );
                    }
                }
                None => {
                    add_error(
                        &mut statement.errors,
                        Diagnostic::at_span(ErrorKind::UnknownName, name.clone(), span),
                    );
                }
            }
        }
        StatementKind::If {
            condition,
            then_body,
            else_body,
        } => {
            validate_expression(condition, table);
            if !Type::Boolean.assignable_from(condition.ty()) {
                add_error(
                    &mut statement.errors,
                    Diagnostic::at_span(
                        ErrorKind::IncompatibleTypes,
                        condition.ty().to_string(),
                        condition.span,
                    ),
                );
            }
            table.push_scope();
            for nested in then_body {
                validate_statement(nested, table, current_function);
            }
            table.pop_scope();
            table.push_scope();
            for nested in else_body {
                validate_statement(nested, table, current_function);
            }
            table.pop_scope();
        }
        StatementKind::ForEach {
            variable,
            iterable,
            body,
        } => {
            validate_expression(iterable, table);
            let component = match iterable.ty().component() {
                Some(component) => component.clone(),
                None => {
                    add_error(
                        &mut statement.errors,
                        Diagnostic::at_span(
                            ErrorKind::IncompatibleTypes,
                            iterable.ty().to_string(),
                            iterable.span,
                        ),
                    );
                    Type::Object
                }
            };
            table.push_scope();
            table.declare(variable, component);
            for nested in body {
                validate_statement(nested, table, current_function);
            }
            table.pop_scope();
        }
        StatementKind::FunctionDefinition {
            name,
            parameters,
            return_type,
            body,
        } => {
            let signature = FunctionSignature {
                parameters: parameters
                    .iter()
                    .map(|parameter| {
                        let ty = parameter.declared_type.clone().unwrap_or(Type::Object);
                        (parameter.name.clone(), ty)
                    })
                    .collect(),
                return_type: return_type.clone().unwrap_or(Type::Void),
            };
            if !table.register_function(name, signature.clone()) {
                add_error(
                    &mut statement.errors,
                    Diagnostic::at_span(ErrorKind::DuplicateFunction, name.clone(), span),
                );
            }
            table.push_scope();
            for (parameter_name, parameter_type) in &signature.parameters {
                table.declare(parameter_name, parameter_type.clone());
            }
            for nested in body {
                validate_statement(nested, table, Some(&signature));
            }
            table.pop_scope();
        }
        StatementKind::Return { value } => {
            if let Some(value) = value {
                validate_expression(value, table);
            }
            match current_function {
                None => {
                    add_error(
                        &mut statement.errors,
                        Diagnostic::at_span(ErrorKind::ReturnOutsideFunction, "return", span),
                    );
                }
                Some(signature) => {
                    let actual = match value {
                        Some(value) => value.ty().clone(),
                        None => Type::Void,
                    };
                    let compatible = match (&signature.return_type, &actual) {
                        (Type::Void, Type::Void) => true,
                        (Type::Void, _) | (_, Type::Void) => false,
                        (expected, actual) => expected.assignable_from(actual),
                    };
                    if !compatible {
                        add_error(
                            &mut statement.errors,
                            Diagnostic::at_span(
                                ErrorKind::IncompatibleTypes,
                                actual.to_string(),
                                span,
                            ),
                        );
                    }
                }
            }
        }
        StatementKind::Call(call) => {
            validate_expression(call, table);
        }
        StatementKind::SyntaxError => {}
    }
}

fn validate_expression(expression: &mut Expression, table: &mut SymbolTable) {
    let span = expression.span;
    let ty = match &mut expression.kind {
        ExpressionKind::IntegerLiteral(_) => Type::Int,
        ExpressionKind::StringLiteral(_) => Type::String,
        ExpressionKind::BooleanLiteral(_) => Type::Boolean,
        ExpressionKind::NullLiteral => Type::Null,
        ExpressionKind::Identifier(name) => match table.lookup(name) {
            Some(ty) => ty.clone(),
            None => {
                // Unresolved names still get a placeholder type so downstream
                // consumers never observe an absent type.
                add_error(
                    &mut expression.errors,
                    Diagnostic::at_span(ErrorKind::UnknownName, name.clone(), span),
                );
                Type::Object
            }
        },
        ExpressionKind::Unary { op, operand } => {
            validate_expression(operand, table);
            let (required, result) = match op {
                UnaryOperator::Negate => (Type::Int, Type::Int),
                UnaryOperator::Not => (Type::Boolean, Type::Boolean),
            };
            if *operand.ty() != required {
                add_error(
                    &mut expression.errors,
                    Diagnostic::at_span(
                        ErrorKind::IncompatibleTypes,
                        operand.ty().to_string(),
                        operand.span,
                    ),
                );
            }
            result
        }
        ExpressionKind::Equality { left, right, .. } => {
            validate_expression(left, table);
            validate_expression(right, table);
            // The compared types must unify under assignability in at least
            // one direction; the result is boolean regardless.
            let compatible = left.ty().assignable_from(right.ty())
                || right.ty().assignable_from(left.ty());
            if !compatible {
                add_error(
                    &mut expression.errors,
                    Diagnostic::at_span(
                        ErrorKind::IncompatibleTypes,
                        format!("{} / {}", left.ty(), right.ty()),
                        span,
                    ),
                );
            }
            Type::Boolean
        }
        ExpressionKind::Comparison { left, right, .. } => {
            validate_expression(left, table);
            validate_expression(right, table);
            for side in [&**left, &**right] {
                if *side.ty() != Type::Int {
                    add_error(
                        &mut expression.errors,
                        Diagnostic::at_span(
                            ErrorKind::IncompatibleTypes,
                            side.ty().to_string(),
                            side.span,
                        ),
                    );
                }
            }
            Type::Boolean
        }
        ExpressionKind::Additive { op, left, right } => {
            validate_expression(left, table);
            validate_expression(right, table);
            let string_concat = *op == AdditiveOperator::Add
                && (*left.ty() == Type::String || *right.ty() == Type::String);
            if string_concat {
                Type::String
            } else {
                for side in [&**left, &**right] {
                    if *side.ty() != Type::Int {
                        add_error(
                            &mut expression.errors,
                            Diagnostic::at_span(
                                ErrorKind::IncompatibleTypes,
                                side.ty().to_string(),
                                side.span,
                            ),
                        );
                    }
                }
                Type::Int
            }
        }
        ExpressionKind::Factor { left, right, .. } => {
            validate_expression(left, table);
            validate_expression(right, table);
            for side in [&**left, &**right] {
                if *side.ty() != Type::Int {
                    add_error(
                        &mut expression.errors,
                        Diagnostic::at_span(
                            ErrorKind::IncompatibleTypes,
                            side.ty().to_string(),
                            side.span,
                        ),
                    );
                }
            }
            Type::Int
        }
        ExpressionKind::Parenthesized(inner) => {
            validate_expression(inner, table);
            inner.ty().clone()
        }
        ExpressionKind::ListLiteral(elements) => {
            for element in elements.iter_mut() {
                validate_expression(element, table);
            }
            let component = infer_component_type(elements);
            Type::list_of(component)
        }
        ExpressionKind::FunctionCall { name, args } => {
            for arg in args.iter_mut() {
                validate_expression(arg, table);
            }
            match table.function(name).cloned() {
                Some(signature) => {
                    if args.len() != signature.parameters.len() {
                        add_error(
                            &mut expression.errors,
                            Diagnostic::at_span(
                                ErrorKind::ArgumentCountMismatch,
                                name.clone(),
                                span,
                            ),
                        );
                    }
                    for (arg, (_, parameter_type)) in args.iter().zip(&signature.parameters) {
                        if !parameter_type.assignable_from(arg.ty()) {
                            add_error(
                                &mut expression.errors,
                                Diagnostic::at_span(
                                    ErrorKind::IncompatibleTypes,
                                    arg.ty().to_string(),
                                    arg.span,
                                ),
                            );
                        }
                    }
                    signature.return_type
                }
                None => {
                    let kind = if table.lookup(name).is_some() {
                        ErrorKind::NotAFunction
                    } else {
                        ErrorKind::UnknownName
                    };
                    add_error(
                        &mut expression.errors,
                        Diagnostic::at_span(kind, name.clone(), span),
                    );
                    Type::Object
                }
            }
        }
        ExpressionKind::SyntaxError => Type::Object,
    };
    expression.ty = Some(ty);
}

/// Most general type covering all element types; `null` for the empty list,
/// `object` when elements do not unify.
fn infer_component_type(elements: &[Expression]) -> Type {
    let mut component: Option<Type> = None;
    for element in elements {
        let ty = element.ty().clone();
        component = Some(match component {
            None => ty,
            Some(current) if current.assignable_from(&ty) => current,
            Some(current) if ty.assignable_from(&current) => ty,
            Some(_) => Type::Object,
        });
    }
    component.unwrap_or(Type::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    fn validated(source: &str) -> Program {
        let mut program = parse(source).expect("lex failed");
        assert!(!program.has_errors(), "parse errors: {:?}", program.diagnostics());
        validate(&mut program);
        program
    }

    fn diagnostics(program: &Program) -> Vec<ErrorKind> {
        program
            .diagnostics()
            .iter()
            .map(|diagnostic| diagnostic.kind)
            .collect()
    }

    #[test]
    fn literals_get_fixed_types() {
        let program = validated("[1, 2, 3]");
        let expression = program.expression().expect("expression program");
        assert_eq!(*expression.ty(), Type::list_of(Type::Int));
        assert!(!program.has_errors());
    }

    #[test]
    fn concat_types_as_string() {
        let program = validated("\"total: \" + 42");
        assert_eq!(*program.expression().unwrap().ty(), Type::String);
        assert!(!program.has_errors());
    }

    #[test]
    fn mixed_list_widens_to_object() {
        let program = validated("[1, \"two\"]");
        assert_eq!(
            *program.expression().unwrap().ty(),
            Type::list_of(Type::Object)
        );
    }

    #[test]
    fn unresolved_identifier_gets_placeholder_type() {
        let mut program = parse("print(nope)").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::UnknownName]);
        let StatementKind::Print { value } = &program.statements()[0].kind else {
            panic!("expected print");
        };
        assert_eq!(*value.ty(), Type::Object);
    }

    #[test]
    fn declaration_checks_annotation() {
        let mut program = parse("var x : int = \"nope\"").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::IncompatibleTypes]);
    }

    #[test]
    fn declaration_infers_from_initializer() {
        let mut program = parse("var x = [1, 2] var y : list<int> = x").expect("lex failed");
        validate(&mut program);
        assert!(!program.has_errors());
    }

    #[test]
    fn loop_variable_scope_ends_with_the_loop() {
        let source = indoc! {"
            for (x in [1, 2, 3]) {
                print(x)
            }
            var x = \"fresh\"
            print(x)
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert!(!program.has_errors(), "{:?}", program.diagnostics());
    }

    #[test]
    fn loop_variable_not_visible_after_loop() {
        let source = indoc! {"
            for (x in [1, 2, 3]) {
                print(x)
            }
            print(x)
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::UnknownName]);
    }

    #[test]
    fn return_outside_function_is_flagged() {
        let mut program = parse("return 1").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::ReturnOutsideFunction]);
    }

    #[test]
    fn call_arity_mismatch_is_one_error_with_declared_result_type() {
        let source = indoc! {"
            function zero() : int {
                return 0
            }
            var x : int = zero(1)
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::ArgumentCountMismatch]);
        let StatementKind::VariableDeclaration { initializer, .. } =
            &program.statements()[1].kind
        else {
            panic!("expected declaration");
        };
        assert_eq!(*initializer.ty(), Type::Int);
    }

    #[test]
    fn call_argument_type_mismatch_is_one_error() {
        let source = indoc! {"
            function inc(n : int) : int {
                return n + 1
            }
            print(inc(\"one\"))
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::IncompatibleTypes]);
    }

    #[test]
    fn functions_must_be_defined_before_use() {
        let source = indoc! {"
            print(later())
            function later() : int {
                return 1
            }
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::UnknownName]);
    }

    #[test]
    fn validation_is_idempotent() {
        let source = indoc! {"
            function inc(n : int) : int {
                return n + 1
            }
            var total = inc(\"oops\")
            print(missing)
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        let first = program.clone();
        validate(&mut program);
        assert_eq!(program, first);
    }

    #[test]
    fn if_condition_must_be_boolean() {
        let mut program = parse("if (1) { print(1) }").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::IncompatibleTypes]);
    }

    #[test]
    fn for_over_non_list_is_flagged() {
        let mut program = parse("for (x in 5) { print(x) }").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::IncompatibleTypes]);
    }

    #[test]
    fn duplicate_function_definition_is_flagged() {
        let source = indoc! {"
            function f() {
                print(1)
            }
            function f() {
                print(2)
            }
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::DuplicateFunction]);
    }

    #[test]
    fn void_function_cannot_return_value() {
        let source = indoc! {"
            function f() {
                return 1
            }
        "};
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::IncompatibleTypes]);
    }

    #[test]
    fn null_assigns_to_string_but_not_int() {
        let mut program = parse("var s : string = null var n : int = null").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::IncompatibleTypes]);
    }

    #[test]
    fn empty_list_fits_typed_list_declaration() {
        let mut program = parse("var xs : list<int> = []").expect("lex failed");
        validate(&mut program);
        assert!(!program.has_errors(), "{:?}", program.diagnostics());
    }

    #[test]
    fn calling_a_variable_is_not_a_function() {
        let mut program = parse("var f = 1 f()").expect("lex failed");
        validate(&mut program);
        assert_eq!(diagnostics(&program), vec![ErrorKind::NotAFunction]);
    }
}
