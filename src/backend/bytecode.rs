use anyhow::{Result, bail};
use std::collections::HashMap;

use crate::ast::{
    AdditiveOperator, ComparisonOperator, EqualityOperator, Expression, ExpressionKind,
    FactorOperator, Program, ProgramBody, Statement, StatementKind, UnaryOperator,
};
use crate::types::Type;

/// Pooled literal. The pool is deduplicated, so two occurrences of the same
/// string literal load the same runtime object and literal identity equality
/// holds on the VM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Push a pooled constant.
    Const(u16),
    PushBool(bool),
    PushNull,
    LoadLocal(u16),
    StoreLocal(u16),
    LoadGlobal(u16),
    StoreGlobal(u16),
    Add,
    Sub,
    Mul,
    Div,
    /// String-context `+`: pops two values, pushes their joined rendering.
    Concat,
    Negate,
    Not,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// Reference-identity equality (value identity for unboxed primitives).
    RefEqual,
    RefNotEqual,
    /// Representation change: primitive -> reference slot class.
    Box,
    /// Representation change: reference -> primitive, checked at runtime.
    UnboxInt,
    UnboxBool,
    /// Pop N values, push a list of them (in push order).
    NewList(u16),
    ListLen,
    /// Pops index, then list; pushes the element.
    ListGet,
    Print,
    Jump(usize),
    JumpIfFalse(usize),
    /// Call function by table index; arity comes from the function record.
    Call(u16),
    Pop,
    /// Return null to the caller.
    Return,
    /// Return the top of stack to the caller.
    ReturnValue,
}

#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub arity: u16,
    /// Total local slot count including parameters (slots 0..arity).
    pub local_count: u16,
    pub code: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub constants: Vec<Constant>,
    /// Global slot names, in declaration order (for diagnostics).
    pub globals: Vec<String>,
    pub functions: Vec<CompiledFunction>,
    pub main: CompiledFunction,
}

#[derive(Clone)]
struct Signature {
    index: u16,
    parameter_types: Vec<Type>,
    return_type: Type,
}

/// Compile a validated program to stack-machine code.
pub fn compile(program: &Program) -> Result<CompiledProgram> {
    let mut compiler = Compiler::new();

    match &program.body {
        ProgramBody::Expression(expression) => {
            let mut builder = CodeBuilder::main();
            compiler.compile_expression(expression, &mut builder)?;
            compiler.coerce(expression.ty(), &Type::Object, &mut builder);
            builder.emit(Instruction::Print);
            builder.emit(Instruction::Return);
            let main = builder.finish("main")?;
            Ok(CompiledProgram {
                constants: compiler.constants,
                globals: compiler.globals,
                functions: Vec::new(),
                main,
            })
        }
        ProgramBody::Statements(statements) => {
            // Function signatures first, so calls compile to stable indices;
            // then main, so every global slot exists before function bodies
            // that touch it are compiled.
            for statement in statements {
                if let StatementKind::FunctionDefinition {
                    name,
                    parameters,
                    return_type,
                    ..
                } = &statement.kind
                {
                    compiler.declare_signature(name, parameters, return_type)?;
                }
            }

            let mut builder = CodeBuilder::main();
            for statement in statements {
                compiler.compile_statement(statement, &mut builder)?;
            }
            builder.emit(Instruction::Return);
            let main = builder.finish("main")?;

            let mut functions = Vec::new();
            for statement in statements {
                if let StatementKind::FunctionDefinition {
                    name,
                    parameters,
                    return_type,
                    body,
                } = &statement.kind
                {
                    let return_type = return_type.clone().unwrap_or(Type::Void);
                    functions.push(compiler.compile_function(
                        name,
                        parameters,
                        &return_type,
                        body,
                    )?);
                }
            }

            Ok(CompiledProgram {
                constants: compiler.constants,
                globals: compiler.globals,
                functions,
                main,
            })
        }
    }
}

struct Compiler {
    constants: Vec<Constant>,
    constant_index: HashMap<Constant, u16>,
    globals: Vec<String>,
    global_index: HashMap<String, u16>,
    signatures: HashMap<String, Signature>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            constants: Vec::new(),
            constant_index: HashMap::new(),
            globals: Vec::new(),
            global_index: HashMap::new(),
            signatures: HashMap::new(),
        }
    }

    fn constant(&mut self, constant: Constant) -> u16 {
        if let Some(&index) = self.constant_index.get(&constant) {
            return index;
        }
        let index = self.constants.len() as u16;
        self.constants.push(constant.clone());
        self.constant_index.insert(constant, index);
        index
    }

    fn global_slot(&mut self, name: &str, ty: Type) -> (u16, Type) {
        if let Some(&index) = self.global_index.get(name) {
            return (index, ty);
        }
        let index = self.globals.len() as u16;
        self.globals.push(name.to_string());
        self.global_index.insert(name.to_string(), index);
        (index, ty)
    }

    fn declare_signature(
        &mut self,
        name: &str,
        parameters: &[crate::ast::Parameter],
        return_type: &Option<Type>,
    ) -> Result<()> {
        if self.signatures.contains_key(name) {
            bail!("Duplicate function definition '{name}'");
        }
        let index = self.signatures.len() as u16;
        self.signatures.insert(
            name.to_string(),
            Signature {
                index,
                parameter_types: parameters
                    .iter()
                    .map(|parameter| parameter.declared_type.clone().unwrap_or(Type::Object))
                    .collect(),
                return_type: return_type.clone().unwrap_or(Type::Void),
            },
        );
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: &str,
        parameters: &[crate::ast::Parameter],
        return_type: &Type,
        body: &[Statement],
    ) -> Result<CompiledFunction> {
        let mut builder = CodeBuilder::function();
        for parameter in parameters {
            let ty = parameter.declared_type.clone().unwrap_or(Type::Object);
            builder.declare_local(&parameter.name, ty);
        }
        builder.return_type = return_type.clone();
        for statement in body {
            self.compile_statement(statement, &mut builder)?;
        }
        builder.emit(Instruction::Return);
        let mut function = builder.finish(name)?;
        function.arity = parameters.len() as u16;
        Ok(function)
    }

    fn compile_statement(&mut self, statement: &Statement, builder: &mut CodeBuilder) -> Result<()> {
        match &statement.kind {
            StatementKind::FunctionDefinition { .. } => {
                // Compiled separately into its own callable unit.
                if !builder.is_main {
                    bail!("Nested function definitions are not supported");
                }
            }
            StatementKind::Print { value } => {
                self.compile_expression(value, builder)?;
                self.coerce(value.ty(), &Type::Object, builder);
                builder.emit(Instruction::Print);
            }
            StatementKind::VariableDeclaration {
                name,
                declared_type,
                initializer,
            } => {
                let ty = declared_type
                    .clone()
                    .unwrap_or_else(|| initializer.ty().clone());
                self.compile_expression(initializer, builder)?;
                self.coerce(initializer.ty(), &ty, builder);
                if builder.is_global_scope() {
                    let (slot, ty) = self.global_slot(name, ty);
                    builder.bind_global(name, slot, ty);
                    builder.emit(Instruction::StoreGlobal(slot));
                } else {
                    let slot = builder.declare_local(name, ty);
                    builder.emit(Instruction::StoreLocal(slot));
                }
            }
            StatementKind::Assignment { name, value } => {
                self.compile_expression(value, builder)?;
                let (slot, ty) = self.resolve(name, builder)?;
                self.coerce(value.ty(), &ty, builder);
                match slot {
                    Slot::Local(index) => builder.emit(Instruction::StoreLocal(index)),
                    Slot::Global(index) => builder.emit(Instruction::StoreGlobal(index)),
                }
            }
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.compile_expression(condition, builder)?;
                self.coerce(condition.ty(), &Type::Boolean, builder);
                let else_label = builder.create_label();
                let end_label = builder.create_label();
                builder.emit_jump_if_false(else_label);
                builder.push_scope();
                for nested in then_body {
                    self.compile_statement(nested, builder)?;
                }
                builder.pop_scope();
                builder.emit_jump(end_label);
                builder.bind_label(else_label);
                builder.push_scope();
                for nested in else_body {
                    self.compile_statement(nested, builder)?;
                }
                builder.pop_scope();
                builder.bind_label(end_label);
            }
            StatementKind::ForEach {
                variable,
                iterable,
                body,
            } => {
                let component = iterable
                    .ty()
                    .component()
                    .cloned()
                    .unwrap_or(Type::Object);

                self.compile_expression(iterable, builder)?;
                let list_slot = builder.temp_local();
                builder.emit(Instruction::StoreLocal(list_slot));
                let zero = self.constant(Constant::Int(0));
                builder.emit(Instruction::Const(zero));
                let index_slot = builder.temp_local();
                builder.emit(Instruction::StoreLocal(index_slot));

                let loop_start = builder.create_label();
                let loop_end = builder.create_label();
                builder.bind_label(loop_start);
                builder.emit(Instruction::LoadLocal(index_slot));
                builder.emit(Instruction::LoadLocal(list_slot));
                builder.emit(Instruction::ListLen);
                builder.emit(Instruction::Less);
                builder.emit_jump_if_false(loop_end);

                builder.push_scope();
                let variable_slot = builder.declare_local(variable, component.clone());
                builder.emit(Instruction::LoadLocal(list_slot));
                builder.emit(Instruction::LoadLocal(index_slot));
                builder.emit(Instruction::ListGet);
                // List elements live in reference slots; narrow back to the
                // component representation before binding the loop variable.
                self.coerce(&Type::Object, &component, builder);
                builder.emit(Instruction::StoreLocal(variable_slot));
                for nested in body {
                    self.compile_statement(nested, builder)?;
                }
                builder.pop_scope();

                builder.emit(Instruction::LoadLocal(index_slot));
                let one = self.constant(Constant::Int(1));
                builder.emit(Instruction::Const(one));
                builder.emit(Instruction::Add);
                builder.emit(Instruction::StoreLocal(index_slot));
                builder.emit_jump(loop_start);
                builder.bind_label(loop_end);
            }
            StatementKind::Return { value } => {
                if builder.is_main {
                    bail!("Return outside of function");
                }
                match value {
                    Some(value) => {
                        self.compile_expression(value, builder)?;
                        let return_type = builder.return_type.clone();
                        self.coerce(value.ty(), &return_type, builder);
                        builder.emit(Instruction::ReturnValue);
                    }
                    None => builder.emit(Instruction::Return),
                }
            }
            StatementKind::Call(call) => {
                self.compile_expression(call, builder)?;
                builder.emit(Instruction::Pop);
            }
            StatementKind::SyntaxError => bail!("Cannot compile a program with syntax errors"),
        }
        Ok(())
    }

    fn compile_expression(
        &mut self,
        expression: &Expression,
        builder: &mut CodeBuilder,
    ) -> Result<()> {
        match &expression.kind {
            ExpressionKind::IntegerLiteral(value) => {
                let index = self.constant(Constant::Int(*value));
                builder.emit(Instruction::Const(index));
            }
            ExpressionKind::StringLiteral(text) => {
                let index = self.constant(Constant::Str(text.clone()));
                builder.emit(Instruction::Const(index));
            }
            ExpressionKind::BooleanLiteral(value) => {
                builder.emit(Instruction::PushBool(*value));
            }
            ExpressionKind::NullLiteral => builder.emit(Instruction::PushNull),
            ExpressionKind::Identifier(name) => {
                let (slot, _) = self.resolve(name, builder)?;
                match slot {
                    Slot::Local(index) => builder.emit(Instruction::LoadLocal(index)),
                    Slot::Global(index) => builder.emit(Instruction::LoadGlobal(index)),
                }
            }
            ExpressionKind::Unary { op, operand } => {
                self.compile_expression(operand, builder)?;
                match op {
                    UnaryOperator::Negate => builder.emit(Instruction::Negate),
                    UnaryOperator::Not => builder.emit(Instruction::Not),
                }
            }
            ExpressionKind::Equality { op, left, right } => {
                // Identity comparison operates on the reference slot class,
                // so both operands are boxed first.
                self.compile_expression(left, builder)?;
                self.coerce(left.ty(), &Type::Object, builder);
                self.compile_expression(right, builder)?;
                self.coerce(right.ty(), &Type::Object, builder);
                match op {
                    EqualityOperator::Equal => builder.emit(Instruction::RefEqual),
                    EqualityOperator::NotEqual => builder.emit(Instruction::RefNotEqual),
                }
            }
            ExpressionKind::Comparison { op, left, right } => {
                self.compile_expression(left, builder)?;
                self.compile_expression(right, builder)?;
                builder.emit(match op {
                    ComparisonOperator::Less => Instruction::Less,
                    ComparisonOperator::LessEqual => Instruction::LessEqual,
                    ComparisonOperator::Greater => Instruction::Greater,
                    ComparisonOperator::GreaterEqual => Instruction::GreaterEqual,
                });
            }
            ExpressionKind::Additive { op, left, right } => {
                let string_concat = *op == AdditiveOperator::Add
                    && (*left.ty() == Type::String || *right.ty() == Type::String);
                if string_concat {
                    self.compile_expression(left, builder)?;
                    self.coerce(left.ty(), &Type::Object, builder);
                    self.compile_expression(right, builder)?;
                    self.coerce(right.ty(), &Type::Object, builder);
                    builder.emit(Instruction::Concat);
                } else {
                    self.compile_expression(left, builder)?;
                    self.compile_expression(right, builder)?;
                    builder.emit(match op {
                        AdditiveOperator::Add => Instruction::Add,
                        AdditiveOperator::Subtract => Instruction::Sub,
                    });
                }
            }
            ExpressionKind::Factor { op, left, right } => {
                self.compile_expression(left, builder)?;
                self.compile_expression(right, builder)?;
                builder.emit(match op {
                    FactorOperator::Multiply => Instruction::Mul,
                    FactorOperator::Divide => Instruction::Div,
                });
            }
            ExpressionKind::Parenthesized(inner) => {
                self.compile_expression(inner, builder)?;
            }
            ExpressionKind::ListLiteral(elements) => {
                for element in elements {
                    self.compile_expression(element, builder)?;
                    self.coerce(element.ty(), &Type::Object, builder);
                }
                builder.emit(Instruction::NewList(elements.len() as u16));
            }
            ExpressionKind::FunctionCall { name, args } => {
                let signature = self
                    .signatures
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Undefined function '{name}'"))?;
                if args.len() != signature.parameter_types.len() {
                    bail!(
                        "Function '{name}' expected {} arguments, got {}",
                        signature.parameter_types.len(),
                        args.len()
                    );
                }
                for (arg, parameter_type) in args.iter().zip(&signature.parameter_types) {
                    self.compile_expression(arg, builder)?;
                    self.coerce(arg.ty(), parameter_type, builder);
                }
                builder.emit(Instruction::Call(signature.index));
            }
            ExpressionKind::SyntaxError => {
                bail!("Cannot compile an expression with syntax errors")
            }
        }
        Ok(())
    }

    /// Insert exactly one representation change when crossing between the
    /// primitive and reference slot classes; identical classes emit nothing.
    fn coerce(&mut self, from: &Type, to: &Type, builder: &mut CodeBuilder) {
        match (from.is_primitive(), to.is_primitive()) {
            (true, false) => builder.emit(Instruction::Box),
            (false, true) => builder.emit(match to {
                Type::Boolean => Instruction::UnboxBool,
                _ => Instruction::UnboxInt,
            }),
            _ => {}
        }
    }

    fn resolve(&self, name: &str, builder: &CodeBuilder) -> Result<(Slot, Type)> {
        if let Some((slot, ty)) = builder.resolve(name) {
            return Ok((slot, ty));
        }
        if let Some(&index) = self.global_index.get(name) {
            // Function bodies see globals with object typing; main rebinds
            // them with their declared types via bind_global.
            return Ok((Slot::Global(index), Type::Object));
        }
        bail!("Undefined variable '{name}'")
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Local(u16),
    Global(u16),
}

struct CodeBuilder {
    code: Vec<Instruction>,
    scopes: Vec<HashMap<String, (Slot, Type)>>,
    next_local: u16,
    labels: Vec<Option<usize>>,
    is_main: bool,
    return_type: Type,
}

impl CodeBuilder {
    fn main() -> Self {
        Self {
            code: Vec::new(),
            scopes: vec![HashMap::new()],
            next_local: 0,
            labels: Vec::new(),
            is_main: true,
            return_type: Type::Void,
        }
    }

    fn function() -> Self {
        Self {
            code: Vec::new(),
            scopes: vec![HashMap::new()],
            next_local: 0,
            labels: Vec::new(),
            is_main: false,
            return_type: Type::Void,
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    /// Main's outermost scope binds globals, not locals.
    fn is_global_scope(&self) -> bool {
        self.is_main && self.scopes.len() == 1
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, name: &str, ty: Type) -> u16 {
        let slot = self.next_local;
        self.next_local += 1;
        self.scopes
            .last_mut()
            .expect("builder always has a scope")
            .insert(name.to_string(), (Slot::Local(slot), ty));
        slot
    }

    /// Anonymous slot for loop bookkeeping.
    fn temp_local(&mut self) -> u16 {
        let slot = self.next_local;
        self.next_local += 1;
        slot
    }

    fn bind_global(&mut self, name: &str, slot: u16, ty: Type) {
        self.scopes
            .last_mut()
            .expect("builder always has a scope")
            .insert(name.to_string(), (Slot::Global(slot), ty));
    }

    fn resolve(&self, name: &str) -> Option<(Slot, Type)> {
        for scope in self.scopes.iter().rev() {
            if let Some((slot, ty)) = scope.get(name) {
                return Some((*slot, ty.clone()));
            }
        }
        None
    }

    fn create_label(&mut self) -> usize {
        self.labels.push(None);
        self.labels.len() - 1
    }

    fn bind_label(&mut self, label: usize) {
        self.labels[label] = Some(self.code.len());
    }

    fn emit_jump(&mut self, label: usize) {
        // Encoded as the label id; rewritten to a code offset in finish().
        self.code.push(Instruction::Jump(label));
    }

    fn emit_jump_if_false(&mut self, label: usize) {
        self.code.push(Instruction::JumpIfFalse(label));
    }

    fn finish(mut self, name: &str) -> Result<CompiledFunction> {
        for instruction in &mut self.code {
            match instruction {
                Instruction::Jump(target) | Instruction::JumpIfFalse(target) => {
                    *target = self.labels[*target]
                        .ok_or_else(|| anyhow::anyhow!("Unbound label in '{name}'"))?;
                }
                _ => {}
            }
        }
        Ok(CompiledFunction {
            name: name.to_string(),
            arity: 0,
            local_count: self.next_local,
            code: self.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::validator::validate;
    use indoc::indoc;

    fn compiled(source: &str) -> CompiledProgram {
        let mut program = parse(source).expect("lex failed");
        validate(&mut program);
        assert!(!program.has_errors(), "diagnostics: {:?}", program.diagnostics());
        compile(&program).expect("compile failed")
    }

    #[test]
    fn string_constants_are_interned() {
        let program = compiled(r#"print("a" == "a")"#);
        let strings: Vec<_> = program
            .constants
            .iter()
            .filter(|constant| matches!(constant, Constant::Str(_)))
            .collect();
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn function_locals_start_after_parameters() {
        let source = indoc! {"
            function f(a : int, b : int) : int {
                var c = a + b
                return c
            }
            print(f(1, 2))
        "};
        let program = compiled(source);
        let function = &program.functions[0];
        assert_eq!(function.arity, 2);
        assert_eq!(function.local_count, 3);
        // `var c` stores into the first post-parameter slot.
        assert!(function.code.contains(&Instruction::StoreLocal(2)));
    }

    #[test]
    fn equality_boxes_primitive_operands() {
        let program = compiled("var b : bool = 1 == 2");
        let boxes = program
            .main
            .code
            .iter()
            .filter(|instruction| matches!(instruction, Instruction::Box))
            .count();
        assert_eq!(boxes, 2);
        assert!(program.main.code.contains(&Instruction::RefEqual));
    }

    #[test]
    fn object_typed_variable_boxes_its_initializer() {
        let source = indoc! {"
            var o : object = 5
            print(o)
        "};
        let program = compiled(source);
        // Storing int 5 into an object slot crosses into the reference
        // class once; printing the already-boxed value adds nothing.
        let boxes = program
            .main
            .code
            .iter()
            .filter(|instruction| matches!(instruction, Instruction::Box))
            .count();
        assert_eq!(boxes, 1);
    }

    #[test]
    fn top_level_vars_are_globals_and_branch_vars_are_locals() {
        let source = indoc! {"
            var g = 1
            if (g == 1) {
                var local = 2
                print(local)
            }
        "};
        let program = compiled(source);
        assert_eq!(program.globals, vec!["g".to_string()]);
        assert!(program.main.code.contains(&Instruction::StoreGlobal(0)));
        assert!(program.main.code.contains(&Instruction::StoreLocal(0)));
    }

    #[test]
    fn jumps_are_patched_to_real_offsets() {
        let program = compiled("if (true) { print(1) } else { print(2) }");
        for instruction in &program.main.code {
            if let Instruction::Jump(target) | Instruction::JumpIfFalse(target) = instruction {
                assert!(*target <= program.main.code.len());
            }
        }
    }

    #[test]
    fn for_each_uses_hidden_list_and_index_slots() {
        let program = compiled("for (x in [1, 2]) { print(x) }");
        // list slot, index slot, loop variable.
        assert_eq!(program.main.local_count, 3);
        assert!(program.main.code.contains(&Instruction::ListLen));
        assert!(program.main.code.contains(&Instruction::ListGet));
        // Reading an int element out of the reference-class list narrows it.
        assert!(program.main.code.contains(&Instruction::UnboxInt));
    }

    #[test]
    fn list_elements_are_boxed_into_the_pool_list() {
        let program = compiled("[1, 2]");
        let boxes = program
            .main
            .code
            .iter()
            .filter(|instruction| matches!(instruction, Instruction::Box))
            .count();
        assert_eq!(boxes, 2);
        assert!(program.main.code.contains(&Instruction::NewList(2)));
    }

    #[test]
    fn return_coerces_to_declared_type() {
        let source = indoc! {"
            function pick(xs : list<object>) : object {
                for (x in xs) {
                    return x
                }
                return null
            }
            print(pick([1]))
        "};
        let program = compiled(source);
        let function = &program.functions[0];
        assert!(function.code.contains(&Instruction::ReturnValue));
    }
}
