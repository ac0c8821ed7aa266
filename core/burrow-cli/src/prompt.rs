//! Interactive prompts.

use std::io::{self, BufRead, Write};

use burrow_core::{BurrowError, Result};

/// Asks a yes/no question on stderr and reads the answer from stdin.
/// Anything other than `y`/`yes` (case-insensitive) is "no".
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr()
        .flush()
        .map_err(|err| BurrowError::io("flushing prompt", err))?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|err| BurrowError::io("reading confirmation", err))?;

    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Asks the user to pick one of `count` numbered options (1-based prompt).
/// Returns the zero-based index, or None on empty input or out-of-range.
pub fn select(count: usize) -> Result<Option<usize>> {
    eprint!("select [1-{count}]: ");
    io::stderr()
        .flush()
        .map_err(|err| BurrowError::io("flushing prompt", err))?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|err| BurrowError::io("reading selection", err))?;

    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(Some(n - 1)),
        _ => Ok(None),
    }
}
