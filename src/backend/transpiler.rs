use anyhow::{Result, bail};
use std::collections::HashSet;
use std::fs;

use self::js_runtime::{
    JS_CONCAT, JS_FORMAT, JS_INT_DIV, JS_PRINT, escape_js_string, run_node, write_temp_script,
};
pub use self::js_runtime::node_available;
use crate::ast::{
    AdditiveOperator, ComparisonOperator, EqualityOperator, Expression, ExpressionKind, Program,
    ProgramBody, Statement, StatementKind, UnaryOperator,
};
use crate::backend::Backend;
use crate::types::Type;

mod js_runtime;

/// Backend that rewrites the program as JavaScript and executes it with node.
pub struct Transpiler;

impl Transpiler {
    pub fn new() -> Self {
        Self
    }

    pub fn transpile(&self, program: &Program) -> Result<String> {
        let mut output = String::new();
        output.push_str(JS_FORMAT);
        output.push_str(JS_PRINT);
        output.push_str(JS_CONCAT);
        output.push_str(JS_INT_DIV);

        match &program.body {
            ProgramBody::Expression(expression) => {
                let expr = self.emit_expression(expression)?;
                output.push_str(&format!("__print({expr});\n"));
            }
            ProgramBody::Statements(statements) => {
                let mut scopes = vec![HashSet::new()];
                for statement in statements {
                    self.emit_statement(statement, 0, &mut output, &mut scopes, false)?;
                }
            }
        }
        Ok(output)
    }

    fn emit_statement(
        &self,
        statement: &Statement,
        indent: usize,
        output: &mut String,
        scopes: &mut Vec<HashSet<String>>,
        in_function: bool,
    ) -> Result<()> {
        match &statement.kind {
            StatementKind::Print { value } => {
                let expr = self.emit_expression(value)?;
                self.push_line(output, indent, &format!("__print({expr});"));
            }
            StatementKind::VariableDeclaration {
                name, initializer, ..
            } => {
                let expr = self.emit_expression(initializer)?;
                // `let` cannot rebind a name twice in one block, but the
                // source language allows redeclaration; demote the second
                // one to a plain assignment.
                let scope = scopes.last_mut().expect("emitter always has a scope");
                if scope.insert(name.clone()) {
                    self.push_line(output, indent, &format!("let {name} = {expr};"));
                } else {
                    self.push_line(output, indent, &format!("{name} = {expr};"));
                }
            }
            StatementKind::Assignment { name, value } => {
                let expr = self.emit_expression(value)?;
                self.push_line(output, indent, &format!("{name} = {expr};"));
            }
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.emit_expression(condition)?;
                self.push_line(output, indent, &format!("if ({condition}) {{"));
                scopes.push(HashSet::new());
                for nested in then_body {
                    self.emit_statement(nested, indent + 1, output, scopes, in_function)?;
                }
                scopes.pop();
                if else_body.is_empty() {
                    self.push_line(output, indent, "}");
                } else {
                    self.push_line(output, indent, "} else {");
                    scopes.push(HashSet::new());
                    for nested in else_body {
                        self.emit_statement(nested, indent + 1, output, scopes, in_function)?;
                    }
                    scopes.pop();
                    self.push_line(output, indent, "}");
                }
            }
            StatementKind::ForEach {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.emit_expression(iterable)?;
                // `let` gives the loop variable a fresh binding per iteration,
                // so body assignments cannot leak into the next element.
                self.push_line(
                    output,
                    indent,
                    &format!("for (let {variable} of {iterable}) {{"),
                );
                scopes.push(HashSet::from([variable.clone()]));
                for nested in body {
                    self.emit_statement(nested, indent + 1, output, scopes, in_function)?;
                }
                scopes.pop();
                self.push_line(output, indent, "}");
            }
            StatementKind::FunctionDefinition {
                name,
                parameters,
                body,
                ..
            } => {
                if in_function {
                    bail!("Nested function definitions are not supported");
                }
                let params: Vec<&str> = parameters
                    .iter()
                    .map(|parameter| parameter.name.as_str())
                    .collect();
                self.push_line(
                    output,
                    indent,
                    &format!("function {name}({}) {{", params.join(", ")),
                );
                let mut function_scopes =
                    vec![params.iter().map(|param| param.to_string()).collect()];
                for nested in body {
                    self.emit_statement(nested, indent + 1, output, &mut function_scopes, true)?;
                }
                self.push_line(output, indent, "}");
            }
            StatementKind::Return { value } => {
                if !in_function {
                    bail!("Return outside of function");
                }
                match value {
                    Some(value) => {
                        let expr = self.emit_expression(value)?;
                        self.push_line(output, indent, &format!("return {expr};"));
                    }
                    None => self.push_line(output, indent, "return null;"),
                }
            }
            StatementKind::Call(call) => {
                let expr = self.emit_expression(call)?;
                self.push_line(output, indent, &format!("{expr};"));
            }
            StatementKind::SyntaxError => bail!("Cannot transpile a program with syntax errors"),
        }
        Ok(())
    }

    fn emit_expression(&self, expression: &Expression) -> Result<String> {
        match &expression.kind {
            ExpressionKind::IntegerLiteral(value) => Ok(value.to_string()),
            ExpressionKind::BooleanLiteral(value) => Ok(value.to_string()),
            ExpressionKind::StringLiteral(text) => {
                Ok(format!("\"{}\"", escape_js_string(text)))
            }
            ExpressionKind::NullLiteral => Ok("null".to_string()),
            ExpressionKind::Identifier(name) => Ok(name.clone()),
            ExpressionKind::Unary { op, operand } => {
                let operand = self.emit_expression(operand)?;
                Ok(match op {
                    UnaryOperator::Negate => format!("(-{operand})"),
                    UnaryOperator::Not => format!("(!{operand})"),
                })
            }
            ExpressionKind::Equality { op, left, right } => {
                let left_expr = self.emit_expression(left)?;
                let right_expr = self.emit_expression(right)?;
                Ok(match op {
                    EqualityOperator::Equal => format!("({left_expr} === {right_expr})"),
                    EqualityOperator::NotEqual => format!("({left_expr} !== {right_expr})"),
                })
            }
            ExpressionKind::Comparison { op, left, right } => {
                let left = self.emit_expression(left)?;
                let right = self.emit_expression(right)?;
                Ok(match op {
                    ComparisonOperator::Less => format!("({left} < {right})"),
                    ComparisonOperator::LessEqual => format!("({left} <= {right})"),
                    ComparisonOperator::Greater => format!("({left} > {right})"),
                    ComparisonOperator::GreaterEqual => format!("({left} >= {right})"),
                })
            }
            ExpressionKind::Additive { op, left, right } => {
                let string_concat = *op == AdditiveOperator::Add
                    && (*left.ty() == Type::String || *right.ty() == Type::String);
                let left = self.emit_expression(left)?;
                let right = self.emit_expression(right)?;
                Ok(if string_concat {
                    format!("__concat({left}, {right})")
                } else {
                    match op {
                        AdditiveOperator::Add => format!("({left} + {right})"),
                        AdditiveOperator::Subtract => format!("({left} - {right})"),
                    }
                })
            }
            ExpressionKind::Factor { op, left, right } => {
                let left = self.emit_expression(left)?;
                let right = self.emit_expression(right)?;
                Ok(match op {
                    crate::ast::FactorOperator::Multiply => format!("({left} * {right})"),
                    crate::ast::FactorOperator::Divide => format!("__idiv({left}, {right})"),
                })
            }
            ExpressionKind::Parenthesized(inner) => self.emit_expression(inner),
            ExpressionKind::ListLiteral(elements) => {
                let mut rendered = Vec::with_capacity(elements.len());
                for element in elements {
                    rendered.push(self.emit_expression(element)?);
                }
                Ok(format!("[{}]", rendered.join(", ")))
            }
            ExpressionKind::FunctionCall { name, args } => {
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    rendered.push(self.emit_expression(arg)?);
                }
                Ok(format!("{name}({})", rendered.join(", ")))
            }
            ExpressionKind::SyntaxError => {
                bail!("Cannot transpile an expression with syntax errors")
            }
        }
    }

    fn push_line(&self, output: &mut String, indent: usize, line: &str) {
        for _ in 0..indent {
            output.push_str("    ");
        }
        output.push_str(line);
        output.push('\n');
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Transpiler {
    fn name(&self) -> &'static str {
        "transpiler"
    }

    fn run(&mut self, program: &Program) -> Result<String> {
        let source = self.transpile(program)?;
        let script_path = write_temp_script(&source)?;
        let result = run_node(&script_path, "Transpiled program failed");
        let _ = fs::remove_file(&script_path);
        result
    }
}
