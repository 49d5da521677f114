use std::env;
use std::io::{self, IsTerminal, Write};
use std::process::{Command, Stdio};

use tracing::debug;

const DEFAULT_PAGER: &str = "less -FRX";

/// Write `text` to stdout, through `$PAGER` when stdout is a terminal.
///
/// Falls back to plain stdout if the pager cannot be started.
pub fn page(text: &[u8], no_pager: bool) -> io::Result<()> {
    if no_pager || !io::stdout().is_terminal() {
        return write_stdout(text);
    }

    let pager = env::var("PAGER").unwrap_or_else(|_| DEFAULT_PAGER.to_string());
    let mut words = pager.split_whitespace();
    let Some(program) = words.next() else {
        return write_stdout(text);
    };

    let child = Command::new(program)
        .args(words)
        .stdin(Stdio::piped())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(err) => {
            debug!(%pager, %err, "pager unavailable");
            return write_stdout(text);
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        // The pager may quit before reading everything.
        match stdin.write_all(text) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
            other => other?,
        }
    }
    child.wait()?;
    Ok(())
}

fn write_stdout(text: &[u8]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(text)?;
    out.flush()
}
