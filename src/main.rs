use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};

use catscript::backend::{self, transpiler::Transpiler};
use catscript::{lexer, parser, validator};

fn main() -> Result<ExitCode> {
    let mut args = std::env::args().skip(1);
    let mut backend_name = "interpreter".to_string();
    let mut emit_js = false;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backend" | "-b" => {
                backend_name = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing backend name after {arg}"))?;
            }
            "--emit-js" => emit_js = true,
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let tokens = lexer::tokenize(&source)?;
    let mut program = parser::parse_tokens(tokens);
    validator::validate(&mut program);
    if program.has_errors() {
        for diagnostic in program.diagnostics() {
            eprintln!("{diagnostic}");
        }
        return Ok(ExitCode::FAILURE);
    }

    if emit_js {
        let source = Transpiler::new().transpile(&program)?;
        print!("{source}");
        return Ok(ExitCode::SUCCESS);
    }

    for mut backend in backend::backends() {
        if backend.name() == backend_name {
            let output = backend.run(&program)?;
            if !output.is_empty() {
                println!("{output}");
            }
            return Ok(ExitCode::SUCCESS);
        }
    }

    bail!("Unknown backend '{backend_name}'")
}
