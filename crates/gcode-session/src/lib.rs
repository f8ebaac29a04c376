//! Incremental session (§4.8): owns a line buffer and the latest lowered
//! result, re-lowering the whole buffer after each edit. Modal G-groups
//! persist across lines, so a correct incremental re-lowering would still
//! need to recompute from the start of the affected modal scope; this
//! session instead always relowers from the top, which is simpler and
//! always correct.

use gcode_diagnostic::Diagnostic;
use gcode_messages::{LowerOptions, MessageResult};

fn normalize_line(line: &str) -> String {
    line.strip_suffix('\r').unwrap_or(line).to_string()
}

fn parse_and_lower(source: &str, options: &LowerOptions) -> MessageResult {
    let (program, mut diagnostics) = gcode_parser::parse(source);
    diagnostics.extend(gcode_semantic::apply_semantic_rules(&program));
    gcode_lower::lower_to_messages(&program, &diagnostics, options)
}

/// The result of applying one line edit: the edited line, and the full
/// result of re-lowering the whole buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEditResult {
    pub from_line: u32,
    pub result: MessageResult,
}

/// A session over an LF-normalized source buffer, updated one line at a
/// time via [`Session::apply_line_edit`].
pub struct Session {
    lines: Vec<String>,
    options: LowerOptions,
    latest: MessageResult,
}

impl Session {
    /// Starts a session from an initial source buffer, normalizing CRLF to
    /// LF and running the full pipeline once.
    pub fn from_source(source: &str, filename: Option<String>) -> Self {
        let lines: Vec<String> = source.split('\n').map(normalize_line).collect();
        let options = LowerOptions { filename };
        let latest = parse_and_lower(&lines.join("\n"), &options);
        tracing::debug!(lines = lines.len(), "session started");
        Self { lines, options, latest }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn latest(&self) -> &MessageResult {
        &self.latest
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.latest.diagnostics
    }

    /// Replaces line `line_1based` (1-based), padding the buffer with empty
    /// lines if the edit is past the current end, then re-runs the full
    /// pipeline over the joined buffer.
    pub fn apply_line_edit(&mut self, line_1based: u32, new_line: &str) -> SessionEditResult {
        let index = (line_1based - 1) as usize;
        if index >= self.lines.len() {
            self.lines.resize(index + 1, String::new());
        }
        self.lines[index] = normalize_line(new_line);

        let joined = self.lines.join("\n");
        self.latest = parse_and_lower(&joined, &self.options);
        tracing::debug!(line = line_1based, "session applied line edit");
        SessionEditResult { from_line: line_1based, result: self.latest.clone() }
    }
}
