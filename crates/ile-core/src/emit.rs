//! Rendering of collected entries to the output sink

use std::io::Write;

use crate::types::LogEntry;

/// Write every entry as `[<ts>] <message>\n`, in order, then flush.
///
/// Returns the number of lines written. A write error stops emission and is
/// returned as-is.
pub fn emit<W: Write>(entries: &[LogEntry], mut sink: W) -> std::io::Result<usize> {
    for entry in entries {
        writeln!(sink, "{}", entry)?;
    }
    sink.flush()?;
    Ok(entries.len())
}
