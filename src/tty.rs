//! Terminal I/O utilities for CLI.
//!
//! Provides user prompting and the interactive confirmation provider.

use std::io::{self, BufRead, Write};

use pifab::confirm::{is_affirmative, ConfirmationProvider};

pub fn prompt(message: &str) -> pifab::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        pifab::Error::new(
            pifab::ErrorCode::InternalIoError,
            format!("Failed to read input: {}", e),
            serde_json::Value::Null,
        )
    })?;

    Ok(line.trim().to_string())
}

/// Asks on stderr and reads one line from stdin. End of input declines.
pub struct StdinConfirmation;

impl ConfirmationProvider for StdinConfirmation {
    fn confirm(&self, prompt_text: &str) -> pifab::Result<bool> {
        Ok(is_affirmative(&prompt(prompt_text)?))
    }
}
