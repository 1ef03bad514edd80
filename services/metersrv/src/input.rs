//! Operator input bindings.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

use ce102m::OperatorInput;

/// Line-oriented operator input from the terminal.
///
/// End-of-input (ctrl-d) maps to `None`, which the session turns into a
/// clean disconnect.
pub struct StdinInput {
    reader: BufReader<Stdin>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorInput for StdinInput {
    async fn prompt(&mut self, prompt: &str) -> Option<String> {
        if !prompt.is_empty() {
            print!("{prompt}");
            let _ = std::io::stdout().flush();
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// Input source for unattended polling: always end-of-input.
///
/// The daemon never negotiates programming mode, so a password prompt
/// can only mean a misconfigured meter; answering `None` makes the
/// session disconnect cleanly instead of hanging.
#[derive(Debug, Default)]
pub struct NoInput;

#[async_trait]
impl OperatorInput for NoInput {
    async fn prompt(&mut self, _prompt: &str) -> Option<String> {
        None
    }
}
