use anyhow::{Result, bail};
use std::rc::Rc;

use crate::ast::Program;
use crate::backend::Backend;
use crate::backend::bytecode::{self, CompiledFunction, CompiledProgram, Constant, Instruction};

/// Runtime value. Strings and lists are reference-counted so equality can
/// compare object identity the way the compiled code expects.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Null,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Boolean(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Null => "null",
        }
    }

    fn to_output(&self) -> String {
        match self {
            Value::Integer(value) => value.to_string(),
            Value::Boolean(value) => value.to_string(),
            Value::Str(text) => text.to_string(),
            Value::List(elements) => {
                let rendered: Vec<String> =
                    elements.iter().map(Value::to_output).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Null => "null".to_string(),
        }
    }

    fn identity_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Bytecode backend: compiles the program and executes it on a stack machine.
pub struct VM;

impl VM {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for VM {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn run(&mut self, program: &Program) -> Result<String> {
        let compiled = bytecode::compile(program)?;
        let mut machine = Machine::new(&compiled);
        let locals = vec![Value::Null; compiled.main.local_count as usize];
        machine.execute(&compiled.main, locals)?;
        Ok(machine.output.join("\n"))
    }
}

struct Machine<'a> {
    program: &'a CompiledProgram,
    /// Pool constants materialized once per run, so every load of the same
    /// string constant yields the same object.
    constants: Vec<Value>,
    globals: Vec<Value>,
    output: Vec<String>,
}

impl<'a> Machine<'a> {
    fn new(program: &'a CompiledProgram) -> Self {
        let constants = program
            .constants
            .iter()
            .map(|constant| match constant {
                Constant::Int(value) => Value::Integer(*value),
                Constant::Str(text) => Value::Str(Rc::from(text.as_str())),
            })
            .collect();
        Self {
            program,
            constants,
            globals: vec![Value::Null; program.globals.len()],
            output: Vec::new(),
        }
    }

    fn execute(&mut self, function: &CompiledFunction, mut locals: Vec<Value>) -> Result<Value> {
        let mut stack: Vec<Value> = Vec::new();
        let mut ip = 0;
        while ip < function.code.len() {
            match &function.code[ip] {
                Instruction::Const(index) => {
                    stack.push(self.constants[*index as usize].clone());
                }
                Instruction::PushBool(value) => stack.push(Value::Boolean(*value)),
                Instruction::PushNull => stack.push(Value::Null),
                Instruction::LoadLocal(slot) => stack.push(locals[*slot as usize].clone()),
                Instruction::StoreLocal(slot) => {
                    locals[*slot as usize] = pop(&mut stack)?;
                }
                Instruction::LoadGlobal(slot) => {
                    stack.push(self.globals[*slot as usize].clone());
                }
                Instruction::StoreGlobal(slot) => {
                    self.globals[*slot as usize] = pop(&mut stack)?;
                }
                Instruction::Add => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    // Integer arithmetic wraps instead of panicking.
                    stack.push(Value::Integer(left.wrapping_add(right)));
                }
                Instruction::Sub => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    stack.push(Value::Integer(left.wrapping_sub(right)));
                }
                Instruction::Mul => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    stack.push(Value::Integer(left.wrapping_mul(right)));
                }
                Instruction::Div => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    if right == 0 {
                        bail!("Division by zero");
                    }
                    stack.push(Value::Integer(left.wrapping_div(right)));
                }
                Instruction::Concat => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    let joined = format!("{}{}", left.to_output(), right.to_output());
                    stack.push(Value::Str(Rc::from(joined.as_str())));
                }
                Instruction::Negate => {
                    let value = pop_int(&mut stack)?;
                    stack.push(Value::Integer(value.wrapping_neg()));
                }
                Instruction::Not => {
                    let value = pop_bool(&mut stack)?;
                    stack.push(Value::Boolean(!value));
                }
                Instruction::Less => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    stack.push(Value::Boolean(left < right));
                }
                Instruction::LessEqual => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    stack.push(Value::Boolean(left <= right));
                }
                Instruction::Greater => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    stack.push(Value::Boolean(left > right));
                }
                Instruction::GreaterEqual => {
                    let (left, right) = pop_int_pair(&mut stack)?;
                    stack.push(Value::Boolean(left >= right));
                }
                Instruction::RefEqual => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(Value::Boolean(left.identity_equals(&right)));
                }
                Instruction::RefNotEqual => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(Value::Boolean(!left.identity_equals(&right)));
                }
                Instruction::Box => {
                    let value = pop(&mut stack)?;
                    match value {
                        Value::Integer(_) | Value::Boolean(_) => stack.push(value),
                        other => bail!("Cannot box a value of type {}", other.type_name()),
                    }
                }
                Instruction::UnboxInt => {
                    let value = pop(&mut stack)?;
                    match value {
                        Value::Integer(_) => stack.push(value),
                        other => bail!("Expected int, found {}", other.type_name()),
                    }
                }
                Instruction::UnboxBool => {
                    let value = pop(&mut stack)?;
                    match value {
                        Value::Boolean(_) => stack.push(value),
                        other => bail!("Expected bool, found {}", other.type_name()),
                    }
                }
                Instruction::NewList(count) => {
                    let start = stack
                        .len()
                        .checked_sub(*count as usize)
                        .ok_or_else(|| anyhow::anyhow!("Stack underflow"))?;
                    let elements: Vec<Value> = stack.split_off(start);
                    stack.push(Value::List(Rc::new(elements)));
                }
                Instruction::ListLen => {
                    let value = pop(&mut stack)?;
                    match value {
                        Value::List(elements) => {
                            stack.push(Value::Integer(elements.len() as i64));
                        }
                        other => bail!("Expected list, found {}", other.type_name()),
                    }
                }
                Instruction::ListGet => {
                    let index = pop_int(&mut stack)?;
                    let value = pop(&mut stack)?;
                    match value {
                        Value::List(elements) => {
                            let element = elements
                                .get(index as usize)
                                .ok_or_else(|| anyhow::anyhow!("List index out of bounds"))?;
                            stack.push(element.clone());
                        }
                        other => bail!("Expected list, found {}", other.type_name()),
                    }
                }
                Instruction::Print => {
                    let value = pop(&mut stack)?;
                    self.output.push(value.to_output());
                }
                Instruction::Jump(target) => {
                    ip = *target;
                    continue;
                }
                Instruction::JumpIfFalse(target) => {
                    let target = *target;
                    if !pop_bool(&mut stack)? {
                        ip = target;
                        continue;
                    }
                }
                Instruction::Call(index) => {
                    let program = self.program;
                    let callee = &program.functions[*index as usize];
                    let mut callee_locals = vec![Value::Null; callee.local_count as usize];
                    for slot in (0..callee.arity as usize).rev() {
                        callee_locals[slot] = pop(&mut stack)?;
                    }
                    let result = self.execute(callee, callee_locals)?;
                    stack.push(result);
                }
                Instruction::Pop => {
                    pop(&mut stack)?;
                }
                Instruction::Return => return Ok(Value::Null),
                Instruction::ReturnValue => return pop(&mut stack),
            }
            ip += 1;
        }
        Ok(Value::Null)
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value> {
    stack.pop().ok_or_else(|| anyhow::anyhow!("Stack underflow"))
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i64> {
    match pop(stack)? {
        Value::Integer(value) => Ok(value),
        other => bail!("Expected int, found {}", other.type_name()),
    }
}

fn pop_bool(stack: &mut Vec<Value>) -> Result<bool> {
    match pop(stack)? {
        Value::Boolean(value) => Ok(value),
        other => bail!("Expected bool, found {}", other.type_name()),
    }
}

fn pop_int_pair(stack: &mut Vec<Value>) -> Result<(i64, i64)> {
    let right = pop_int(stack)?;
    let left = pop_int(stack)?;
    Ok((left, right))
}
