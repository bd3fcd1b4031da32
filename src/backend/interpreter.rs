use anyhow::{Result, bail};
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    AdditiveOperator, ComparisonOperator, EqualityOperator, Expression, ExpressionKind,
    FactorOperator, Parameter, Program, ProgramBody, Statement, StatementKind, UnaryOperator,
};
use crate::backend::Backend;

/// Runtime value model of the tree-walking evaluator.
///
/// Strings and lists are reference values: equality on them is pointer
/// identity, so cloning a `Value` shares the underlying allocation.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Null,
}

impl Value {
    fn as_int(&self) -> Result<i64> {
        match self {
            Value::Integer(value) => Ok(*value),
            other => bail!("Expected integer, got {}", other.type_name()),
        }
    }

    fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(value) => Ok(*value),
            other => bail!("Expected bool, got {}", other.type_name()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Boolean(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Null => "null",
        }
    }

    pub fn to_output(&self) -> String {
        match self {
            Value::Integer(value) => value.to_string(),
            Value::Boolean(true) => "true".to_string(),
            Value::Boolean(false) => "false".to_string(),
            Value::Str(value) => value.to_string(),
            Value::List(elements) => {
                let rendered: Vec<String> = elements.iter().map(Value::to_output).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Null => "null".to_string(),
        }
    }

    /// Identity comparison: integers, booleans, and null by value (they are
    /// interned in the target value model), strings and lists by pointer.
    pub fn identity_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(left), Value::Integer(right)) => left == right,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            (Value::Null, Value::Null) => true,
            (Value::Str(left), Value::Str(right)) => Rc::ptr_eq(left, right),
            (Value::List(left), Value::List(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Function {
    parameters: Vec<String>,
    body: Vec<Statement>,
}

/// Control-transfer result of executing a statement: either fall through to
/// the next statement or unwind one function-call frame with a value.
enum ExecResult {
    Continue,
    Return(Value),
}

/// Block scopes of one function invocation (or of the top level, where the
/// outermost "scope" is the global map instead).
struct Frame {
    scopes: Vec<HashMap<String, Value>>,
}

impl Frame {
    fn top_level() -> Self {
        Self { scopes: Vec::new() }
    }

    fn for_call(arguments: HashMap<String, Value>) -> Self {
        Self {
            scopes: vec![arguments],
        }
    }
}

/// AST-walking backend that executes validated programs directly.
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, program: &Program) -> Result<String> {
        let mut runtime = Runtime::new();
        match &program.body {
            ProgramBody::Expression(expression) => {
                let value = runtime.eval_expression(expression, &mut Frame::top_level())?;
                Ok(value.to_output())
            }
            ProgramBody::Statements(statements) => {
                let mut frame = Frame::top_level();
                match runtime.exec_block(statements, &mut frame)? {
                    ExecResult::Continue => {}
                    ExecResult::Return(_) => bail!("Return outside of function"),
                }
                Ok(runtime.output.join("\n"))
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn run(&mut self, program: &Program) -> Result<String> {
        Interpreter::run(self, program)
    }
}

struct Runtime {
    globals: HashMap<String, Value>,
    functions: HashMap<String, Function>,
    /// Intern table for string literals; repeated literals share one
    /// allocation so identity equality holds between them.
    literals: HashMap<String, Rc<str>>,
    output: Vec<String>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            globals: HashMap::new(),
            functions: HashMap::new(),
            literals: HashMap::new(),
            output: Vec::new(),
        }
    }

    fn exec_block(&mut self, statements: &[Statement], frame: &mut Frame) -> Result<ExecResult> {
        for statement in statements {
            match self.exec_statement(statement, frame)? {
                ExecResult::Continue => {}
                result @ ExecResult::Return(_) => return Ok(result),
            }
        }
        Ok(ExecResult::Continue)
    }

    fn exec_statement(&mut self, statement: &Statement, frame: &mut Frame) -> Result<ExecResult> {
        match &statement.kind {
            StatementKind::Print { value } => {
                let value = self.eval_expression(value, frame)?;
                self.output.push(value.to_output());
            }
            StatementKind::VariableDeclaration {
                name, initializer, ..
            } => {
                let value = self.eval_expression(initializer, frame)?;
                self.declare(frame, name, value);
            }
            StatementKind::Assignment { name, value } => {
                let value = self.eval_expression(value, frame)?;
                self.assign(frame, name, value)?;
            }
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.eval_expression(condition, frame)?.as_bool()?;
                let branch = if condition { then_body } else { else_body };
                frame.scopes.push(HashMap::new());
                let result = self.exec_block(branch, frame);
                frame.scopes.pop();
                match result? {
                    ExecResult::Continue => {}
                    result @ ExecResult::Return(_) => return Ok(result),
                }
            }
            StatementKind::ForEach {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.eval_expression(iterable, frame)?;
                let Value::List(elements) = iterable else {
                    bail!("Expected list, got {}", iterable.type_name());
                };
                for element in elements.iter() {
                    // Fresh binding per iteration: body mutations of the loop
                    // variable do not leak into the next pass.
                    frame.scopes.push(HashMap::new());
                    self.declare(frame, variable, element.clone());
                    let result = self.exec_block(body, frame);
                    frame.scopes.pop();
                    match result? {
                        ExecResult::Continue => {}
                        result @ ExecResult::Return(_) => return Ok(result),
                    }
                }
            }
            StatementKind::FunctionDefinition {
                name,
                parameters,
                body,
                ..
            } => {
                self.functions.insert(
                    name.clone(),
                    Function {
                        parameters: parameters.iter().map(|Parameter { name, .. }| name.clone()).collect(),
                        body: body.clone(),
                    },
                );
            }
            StatementKind::Return { value } => {
                let value = match value {
                    Some(value) => self.eval_expression(value, frame)?,
                    None => Value::Null,
                };
                return Ok(ExecResult::Return(value));
            }
            StatementKind::Call(call) => {
                self.eval_expression(call, frame)?;
            }
            StatementKind::SyntaxError => bail!("Cannot execute a program with syntax errors"),
        }
        Ok(ExecResult::Continue)
    }

    fn eval_expression(&mut self, expression: &Expression, frame: &mut Frame) -> Result<Value> {
        match &expression.kind {
            ExpressionKind::IntegerLiteral(value) => Ok(Value::Integer(*value)),
            ExpressionKind::BooleanLiteral(value) => Ok(Value::Boolean(*value)),
            ExpressionKind::NullLiteral => Ok(Value::Null),
            ExpressionKind::StringLiteral(text) => Ok(Value::Str(self.intern(text))),
            ExpressionKind::Identifier(name) => self.lookup(frame, name),
            ExpressionKind::Unary { op, operand } => {
                let operand = self.eval_expression(operand, frame)?;
                match op {
                    UnaryOperator::Negate => {
                        Ok(Value::Integer(operand.as_int()?.wrapping_neg()))
                    }
                    UnaryOperator::Not => Ok(Value::Boolean(!operand.as_bool()?)),
                }
            }
            ExpressionKind::Equality { op, left, right } => {
                let left = self.eval_expression(left, frame)?;
                let right = self.eval_expression(right, frame)?;
                let equal = left.identity_equals(&right);
                Ok(Value::Boolean(match op {
                    EqualityOperator::Equal => equal,
                    EqualityOperator::NotEqual => !equal,
                }))
            }
            ExpressionKind::Comparison { op, left, right } => {
                let left = self.eval_expression(left, frame)?.as_int()?;
                let right = self.eval_expression(right, frame)?.as_int()?;
                Ok(Value::Boolean(match op {
                    ComparisonOperator::Greater => left > right,
                    ComparisonOperator::GreaterEqual => left >= right,
                    ComparisonOperator::Less => left < right,
                    ComparisonOperator::LessEqual => left <= right,
                }))
            }
            ExpressionKind::Additive { op, left, right } => {
                let left = self.eval_expression(left, frame)?;
                let right = self.eval_expression(right, frame)?;
                match op {
                    AdditiveOperator::Add
                        if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) =>
                    {
                        // String concatenation builds a fresh allocation;
                        // the result is never identical to a literal.
                        let text = format!("{}{}", left.to_output(), right.to_output());
                        Ok(Value::Str(Rc::from(text)))
                    }
                    AdditiveOperator::Add => {
                        // Integer arithmetic wraps instead of panicking.
                        Ok(Value::Integer(left.as_int()?.wrapping_add(right.as_int()?)))
                    }
                    AdditiveOperator::Subtract => {
                        Ok(Value::Integer(left.as_int()?.wrapping_sub(right.as_int()?)))
                    }
                }
            }
            ExpressionKind::Factor { op, left, right } => {
                let left = self.eval_expression(left, frame)?.as_int()?;
                let right = self.eval_expression(right, frame)?.as_int()?;
                match op {
                    FactorOperator::Multiply => Ok(Value::Integer(left.wrapping_mul(right))),
                    FactorOperator::Divide => {
                        if right == 0 {
                            bail!("Division by zero");
                        }
                        Ok(Value::Integer(left.wrapping_div(right)))
                    }
                }
            }
            ExpressionKind::Parenthesized(inner) => self.eval_expression(inner, frame),
            ExpressionKind::ListLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expression(element, frame)?);
                }
                Ok(Value::List(Rc::new(values)))
            }
            ExpressionKind::FunctionCall { name, args } => self.eval_call(name, args, frame),
            ExpressionKind::SyntaxError => {
                bail!("Cannot evaluate an expression with syntax errors")
            }
        }
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[Expression],
        frame: &mut Frame,
    ) -> Result<Value> {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval_expression(arg, frame)?);
        }

        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Undefined function '{name}'"))?;
        if evaluated.len() != function.parameters.len() {
            bail!(
                "Function '{name}' expected {} arguments, got {}",
                function.parameters.len(),
                evaluated.len()
            );
        }

        // Callee frames chain to the globals only, never to the caller's
        // locals; the grammar has no nested function literals to close over.
        let mut arguments = HashMap::new();
        for (parameter, value) in function.parameters.iter().zip(evaluated) {
            arguments.insert(parameter.clone(), value);
        }
        let mut callee_frame = Frame::for_call(arguments);
        match self.exec_block(&function.body, &mut callee_frame)? {
            ExecResult::Continue => Ok(Value::Null),
            ExecResult::Return(value) => Ok(value),
        }
    }

    fn intern(&mut self, text: &str) -> Rc<str> {
        if let Some(interned) = self.literals.get(text) {
            return interned.clone();
        }
        let interned: Rc<str> = Rc::from(text);
        self.literals.insert(text.to_string(), interned.clone());
        interned
    }

    fn declare(&mut self, frame: &mut Frame, name: &str, value: Value) {
        match frame.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn assign(&mut self, frame: &mut Frame, name: &str, value: Value) -> Result<()> {
        for scope in frame.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        if let Some(slot) = self.globals.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        bail!("Undefined variable '{name}'")
    }

    fn lookup(&self, frame: &Frame, name: &str) -> Result<Value> {
        for scope in frame.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Undefined variable '{name}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::validator::validate;
    use indoc::indoc;

    fn run(source: &str) -> String {
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert!(!program.has_errors(), "diagnostics: {:?}", program.diagnostics());
        Interpreter::new().run(&program).expect("run failed")
    }

    #[test]
    fn evaluates_left_associative_subtraction() {
        assert_eq!(run("1 - 2 - 3"), "-4");
    }

    #[test]
    fn evaluates_precedence() {
        assert_eq!(run("1 + 2 * 3"), "7");
    }

    #[test]
    fn integer_arithmetic_wraps_at_the_boundaries() {
        assert_eq!(run("9223372036854775807 + 1"), "-9223372036854775808");
        assert_eq!(run("-(9223372036854775807 + 1)"), "-9223372036854775808");
        assert_eq!(run("(0 - 9223372036854775807 - 1) / (0 - 1)"), "-9223372036854775808");
    }

    #[test]
    fn concatenates_strings_with_rendered_values() {
        assert_eq!(run(r#"print("n = " + 42)"#), "n = 42");
        assert_eq!(run(r#"print("xs = " + [1, 2])"#), "xs = [1, 2]");
    }

    #[test]
    fn branch_declarations_do_not_leak() {
        let source = indoc! {r#"
            var x = 1
            if (x == 1) {
                var y = 2
                print(y)
            }
            var y = 3
            print(y)
        "#};
        assert_eq!(run(source), "2\n3");
    }

    #[test]
    fn loop_variable_rebinds_each_iteration() {
        let source = indoc! {r#"
            for (n in [1, 2, 3]) {
                n = n + 10
                print(n)
            }
        "#};
        assert_eq!(run(source), "11\n12\n13");
    }

    #[test]
    fn functions_return_through_control_flow() {
        let source = indoc! {r#"
            function classify(n : int) : string {
                if (n < 0) {
                    return "negative"
                }
                if (n == 0) {
                    return "zero"
                }
                return "positive"
            }
            print(classify(0 - 5))
            print(classify(0))
            print(classify(5))
        "#};
        assert_eq!(run(source), "negative\nzero\npositive");
    }

    #[test]
    fn recursion_reaches_globals_not_caller_locals() {
        let source = indoc! {r#"
            var depth = 0
            function count(n : int) : int {
                depth = depth + 1
                if (n <= 1) {
                    return 1
                }
                return n * count(n - 1)
            }
            print(count(5))
            print(depth)
        "#};
        assert_eq!(run(source), "120\n5");
    }

    #[test]
    fn string_literals_are_identical_but_concatenations_are_not() {
        assert_eq!(run(r#"print("a" == "a")"#), "true");
        assert_eq!(run(r#"print("a" + "" == "a")"#), "false");
    }

    #[test]
    fn list_equality_is_identity() {
        assert_eq!(run("print([1] == [1])"), "false");
        let source = indoc! {r#"
            var xs = [1, 2]
            var ys = xs
            print(xs == ys)
        "#};
        assert_eq!(run(source), "true");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let mut program = parse("print(1 / 0)").expect("lex failed");
        validate(&mut program);
        let err = Interpreter::new().run(&program).unwrap_err();
        assert!(err.to_string().contains("Division by zero"));
    }

    #[test]
    fn expression_programs_render_their_value() {
        assert_eq!(run("[1, 2, 3]"), "[1, 2, 3]");
        assert_eq!(run("1 < 2"), "true");
    }

    #[test]
    fn void_function_call_statement_runs_for_effect() {
        let source = indoc! {r#"
            function shout(word : string) {
                print(word + "!")
            }
            shout("hey")
        "#};
        assert_eq!(run(source), "hey!");
    }
}
