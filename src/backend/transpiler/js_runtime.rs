use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

pub const JS_FORMAT: &str = r#"function __fmt(value) {
    if (value === null || value === undefined) {
        return "null";
    }
    if (Array.isArray(value)) {
        return "[" + value.map(__fmt).join(", ") + "]";
    }
    return String(value);
}

"#;

pub const JS_PRINT: &str = r#"function __print(value) {
    console.log(__fmt(value));
}

"#;

pub const JS_CONCAT: &str = r#"function __concat(left, right) {
    return __fmt(left) + __fmt(right);
}

"#;

pub const JS_INT_DIV: &str = r#"function __idiv(left, right) {
    if (right === 0) {
        throw new Error("Division by zero");
    }
    return Math.trunc(left / right);
}

"#;

pub fn escape_js_string(value: &str) -> String {
    let mut escaped = String::new();
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn write_temp_script(contents: &str) -> Result<PathBuf> {
    let mut dir = std::env::temp_dir();
    dir.push("catscript");
    fs::create_dir_all(&dir).context("Creating temp directory")?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let script_path = dir.join(format!("transpile_{nanos}.js"));
    fs::write(&script_path, contents).context("Writing generated script")?;
    Ok(script_path)
}

/// True if a `node` binary answers on PATH.
pub fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn run_node(script_path: &Path, run_error: &str) -> Result<String> {
    let output = Command::new("node")
        .arg(script_path)
        .output()
        .context("Running node")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{run_error}: {}", extract_thrown_message(&stderr));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.strip_suffix('\n').unwrap_or(&stdout).to_string())
}

/// Node prints uncaught errors as a stack trace; keep just the message so
/// failures read like the other backends' errors.
fn extract_thrown_message(stderr: &str) -> String {
    for line in stderr.lines() {
        if let Some(message) = line.split_once("Error: ").map(|(_, rest)| rest) {
            return message.to_string();
        }
    }
    stderr.trim().to_string()
}
