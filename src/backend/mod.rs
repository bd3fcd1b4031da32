use anyhow::Result;

use crate::ast::Program;

pub mod bytecode;
pub mod interpreter;
pub mod transpiler;
pub mod vm;

/// Common interface implemented by each execution backend.
///
/// Backends are specified for validated, error-free trees only; callers are
/// expected to check `Program::has_errors` first.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn run(&mut self, program: &Program) -> Result<String>;
}

pub fn backends() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(interpreter::Interpreter::new()),
        Box::new(vm::VM::new()),
        Box::new(transpiler::Transpiler::new()),
    ]
}
