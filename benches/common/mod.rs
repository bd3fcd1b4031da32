#![allow(dead_code)]
use std::fs;
use std::path::Path;

use catscript::ast::Program;
use catscript::fixtures::load_cases;
use catscript::{lexer, parser, validator};

/// Bench-enabled fixture cases, as (label, program path) pairs.
pub fn workloads() -> Vec<(String, String)> {
    load_cases(Path::new("tests/programs"))
        .expect("load cases")
        .into_iter()
        .filter(|case| case.spec.bench.enabled)
        .map(|case| {
            (
                case.name.clone(),
                case.program_path.display().to_string(),
            )
        })
        .collect()
}

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn load_program(path: &str) -> Program {
    let source = load_source(path);
    let tokens = lexer::tokenize(&source).unwrap_or_else(|err| panic!("tokenize {path}: {err}"));
    let mut program = parser::parse_tokens(tokens);
    validator::validate(&mut program);
    assert!(
        !program.has_errors(),
        "unexpected diagnostics in {path}: {:?}",
        program.diagnostics()
    );
    program
}
