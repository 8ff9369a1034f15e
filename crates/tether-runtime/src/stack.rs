//! Call-stack snapshots for crash reports.
//!
//! A snapshot keeps only frames from this crate that resolve to a source line.
//! Frames from the FFI boundary, the standard library and the native core carry no
//! useful diagnostics and are dropped.

use std::fmt;
use std::path::PathBuf;

/// Crate whose frames a snapshot retains
pub const OWN_UNIT: &str = env!("CARGO_CRATE_NAME");

/// Marker of the capturing function; frames up to it are capture internals
const CAPTURE_MARKER: &str = "StackSnapshot::capture";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub method: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl StackFrame {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Whether the frame's symbol lives in `unit` (a crate name)
    pub fn belongs_to(&self, unit: &str) -> bool {
        // Trait impls render as `<crate::Type as Trait>::method`
        self.method
            .trim_start_matches('<')
            .strip_prefix(unit)
            .is_some_and(|rest| rest.starts_with("::"))
    }

    fn has_line(&self) -> bool {
        self.line.is_some_and(|line| line > 0)
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        write!(
            f,
            "at {}, {}:{}:{}",
            self.method,
            file,
            self.line.unwrap_or(0),
            self.column.unwrap_or(0)
        )
    }
}

/// Ordered, filtered frames, innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSnapshot {
    frames: Vec<StackFrame>,
}

impl StackSnapshot {
    /// Capture the current thread's stack, starting at the caller of this function.
    pub fn capture(skip: usize) -> Self {
        let backtrace = backtrace::Backtrace::new();
        let mut frames = Vec::new();

        for frame in backtrace.frames() {
            // Inlined calls resolve to several symbols for one frame
            for symbol in frame.symbols() {
                let method = symbol
                    .name()
                    .map(|name| format!("{:#}", name))
                    .unwrap_or_default();
                frames.push(StackFrame {
                    method,
                    file: symbol.filename().map(|p| p.to_path_buf()),
                    line: symbol.lineno(),
                    column: symbol.colno(),
                });
            }
        }

        let start = frames
            .iter()
            .rposition(|f| f.method.contains(CAPTURE_MARKER))
            .map(|idx| idx + 1)
            .unwrap_or(0);

        Self::from_frames(frames.into_iter().skip(start), skip, OWN_UNIT)
    }

    /// Build a snapshot from raw frames: drop `skip` leading frames, then keep only
    /// frames from `unit` that resolve to a line.
    pub fn from_frames(
        frames: impl IntoIterator<Item = StackFrame>,
        skip: usize,
        unit: &str,
    ) -> Self {
        let frames = frames
            .into_iter()
            .skip(skip)
            .filter(|f| f.has_line() && f.belongs_to(unit))
            .collect();
        Self { frames }
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// One tab-indented line per frame
    pub fn render(&self) -> String {
        self.frames
            .iter()
            .map(|f| format!("\t{}", f))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
