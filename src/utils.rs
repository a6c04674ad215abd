use anyhow::Context;
use std::io::{IsTerminal, Read};

pub type Result<T> = anyhow::Result<T>;

/// Reads the whole of `path`, or stdin when no path is given.
pub fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(p) if p != "-" => {
            let expanded = shellexpand::tilde(p).to_string();
            std::fs::read_to_string(&expanded)
                .with_context(|| format!("Failed to read {}", expanded))
        }
        _ => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                anyhow::bail!("No input file given and stdin is a terminal");
            }
            let mut buffer = String::new();
            stdin.read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

/// Splits `name=value` on the first `=`. The name is trimmed, the value is
/// kept as typed.
pub fn split_assignment(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => anyhow::bail!("Invalid assignment '{}', expected name=value", s),
    }
}
