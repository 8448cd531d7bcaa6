//! Diagnostic message routing.
//!
//! Every diagnostic line goes through [`Messenger`]: either to the sink
//! registered by the host runtime or, without one, to standard output.
//! Lines longer than the configured limit are truncated.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Callback receiving one formatted line.
pub type MessageSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Default line length limit, terminator included.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

pub struct Messenger {
    sink: Option<MessageSink>,
    max_line_len: usize,
}

impl Messenger {
    /// Messenger printing to standard output with the default line limit.
    pub const fn new() -> Self {
        Self {
            sink: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Route lines to `sink`, or back to standard output with `None`.
    pub fn set_sink(&mut self, sink: Option<MessageSink>) {
        self.sink = sink;
    }

    /// Line limit, clamped to leave room for at least one byte.
    pub fn set_max_line_len(&mut self, len: usize) {
        self.max_line_len = len.max(2);
    }

    /// Line limit in bytes, terminator included.
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Emit one line, truncated to `max_line_len - 1` bytes.
    pub fn emit(&self, line: &str) {
        let line = truncate(line, self.max_line_len - 1);
        match &self.sink {
            Some(sink) => sink(line),
            None => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(line.as_bytes());
                let _ = out.flush();
            }
        }
    }

    pub fn emit_fmt(&self, args: fmt::Arguments<'_>) {
        self.emit(&args.to_string());
    }

    /// Diagnostic line tagged with the reporting function.
    pub fn diag(&self, func: &str, msg: &str) {
        tracing::warn!(func, "{msg}");
        self.emit_fmt(format_args!("{func}  : {msg}\n"));
    }

    /// Emit a multi-line banner, one sink call per line.
    pub fn banner(&self, lines: &[&str]) {
        for line in lines {
            self.emit(line);
        }
    }
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("sink", &self.sink.is_some())
            .field("max_line_len", &self.max_line_len)
            .finish()
    }
}

fn truncate(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
