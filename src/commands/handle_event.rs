use anyhow::{Context, Result};
use std::io::{Read, Write};

use branch_archiver::{backend::Backend, EventRouter, RouterSettings};

/// Handle the handle-event command
/// Routes one event and prints a line per reference. Routed failures are
/// already logged and do not fail the command.
pub fn handle<B: Backend + ?Sized, R: Read, W: Write>(
    backend: &B,
    settings: RouterSettings,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let mut json = String::new();
    input
        .read_to_string(&mut json)
        .context("Failed to read event")?;

    let router = EventRouter::new(backend, settings);
    for outcome in router.handle_event(&json) {
        writeln!(output, "{}", outcome)?;
    }

    Ok(())
}
