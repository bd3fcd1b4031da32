use std::fs;
use std::path::Path;

use anyhow::{Result, bail, ensure};

use crate::ast::Program;
use crate::backend::Backend;
use crate::backend::interpreter::Interpreter;
use crate::backend::transpiler::{Transpiler, node_available};
use crate::backend::vm::VM;
use crate::fixtures::{
    CaseClass, is_backend_unsupported, load_cases, normalize_output, validate_unsupported_backends,
};
use crate::{lexer, parser, validator};

const KNOWN_BACKENDS: [&str; 3] = ["interpreter", "vm", "transpiler"];

fn parity_required(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|value| value == "1")
        .unwrap_or(false)
}

fn detect_node() -> Result<bool> {
    if node_available() {
        return Ok(true);
    }
    if parity_required("NODE_PARITY_REQUIRED") {
        bail!("Node parity required but no node binary found on PATH.");
    }
    eprintln!("Skipping transpiler parity test: no node binary found on PATH.");
    Ok(false)
}

enum Compiled {
    Program(Program),
    FrontendError(String),
}

fn compile(source: &str) -> Compiled {
    match lexer::tokenize(source) {
        Err(error) => Compiled::FrontendError(error.to_string()),
        Ok(tokens) => {
            let mut program = parser::parse_tokens(tokens);
            validator::validate(&mut program);
            if program.has_errors() {
                let rendered: Vec<String> = program
                    .diagnostics()
                    .iter()
                    .map(|diagnostic| diagnostic.to_string())
                    .collect();
                Compiled::FrontendError(rendered.join("\n"))
            } else {
                Compiled::Program(program)
            }
        }
    }
}

fn run_programs_for_backend(backend: &mut dyn Backend) -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        validate_unsupported_backends(&case, &KNOWN_BACKENDS)?;
        if is_backend_unsupported(&case, backend.name()) {
            continue;
        }
        if case.spec.bench.enabled {
            ensure!(
                !case.spec.bench.tags.is_empty(),
                "Case {} has bench enabled but no tags",
                case.name
            );
        }
        let source = fs::read_to_string(&case.program_path)
            .map_err(|error| anyhow::anyhow!("Reading {}: {error}", case.name))?;
        let compiled = compile(&source);
        match case.spec.class {
            CaseClass::RuntimeSuccess => {
                ensure!(
                    case.spec.expected.exit_code == 0,
                    "Case {} expected exit code must be 0 for runtime_success",
                    case.name
                );
                let stdout_file = case
                    .spec
                    .expected
                    .stdout_file
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("Missing stdout_file in {}", case.name))?;
                let expected = case.read_text(stdout_file)?;
                let program = match compiled {
                    Compiled::Program(program) => program,
                    Compiled::FrontendError(rendered) => {
                        bail!("Unexpected frontend errors in {}: {rendered}", case.name)
                    }
                };
                let output = backend.run(&program).map_err(|error| {
                    anyhow::anyhow!(
                        "Backend {} failed for {}: {error}",
                        backend.name(),
                        case.name
                    )
                })?;
                assert_eq!(
                    normalize_output(&output),
                    normalize_output(&expected),
                    "Backend {} mismatch for {}",
                    backend.name(),
                    case.name
                );
            }
            CaseClass::FrontendError => {
                ensure!(
                    case.spec.expected.exit_code == 1,
                    "Case {} expected exit code must be 1 for frontend_error",
                    case.name
                );
                let expected_file = case
                    .spec
                    .expected
                    .stderr_contains_file
                    .as_deref()
                    .ok_or_else(|| {
                        anyhow::anyhow!("Missing stderr expectation file in {}", case.name)
                    })?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                match compiled {
                    Compiled::FrontendError(actual) => ensure!(
                        actual.contains(expected_error),
                        "Expected frontend error containing '{expected_error}' in {}, got '{actual}'",
                        case.name
                    ),
                    Compiled::Program(_) => {
                        bail!("Expected frontend error in {}, but none was reported", case.name)
                    }
                }
            }
            CaseClass::BackendRuntimeError => {
                ensure!(
                    case.spec.expected.exit_code == 1,
                    "Case {} expected exit code must be 1 for backend_runtime_error",
                    case.name
                );
                let expected_file = case
                    .spec
                    .expected
                    .stderr_contains_file
                    .as_deref()
                    .ok_or_else(|| {
                        anyhow::anyhow!("Missing stderr expectation file in {}", case.name)
                    })?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                let program = match compiled {
                    Compiled::Program(program) => program,
                    Compiled::FrontendError(rendered) => {
                        bail!("Unexpected frontend errors in {}: {rendered}", case.name)
                    }
                };
                let result = backend.run(&program);
                ensure!(
                    result.is_err(),
                    "Expected runtime error for backend {} in {}",
                    backend.name(),
                    case.name
                );
                let actual = result.expect_err("result checked as err").to_string();
                ensure!(
                    actual.contains(expected_error),
                    "Expected runtime error containing '{expected_error}' in {}, got '{actual}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}

#[test]
fn runs_programs_interpreter_backend() -> Result<()> {
    run_programs_for_backend(&mut Interpreter::new())
}

#[test]
fn runs_programs_vm_backend() -> Result<()> {
    run_programs_for_backend(&mut VM::new())
}

#[test]
fn runs_programs_transpiler_backend() -> Result<()> {
    if !detect_node()? {
        return Ok(());
    }
    run_programs_for_backend(&mut Transpiler::new())
}
