// Stack trace capture
// Thin layer over std::backtrace with an ordered frame view

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::TraceCapture;

/// One call frame of a captured trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Position in the trace, innermost first
    pub index: usize,
    /// Demangled symbol name
    pub symbol: String,
    /// `file:line:col`, when debug info is available
    pub location: Option<String>,
}

/// Call stack captured at a raise site.
#[derive(Clone, Default)]
pub struct StackTrace {
    backtrace: Option<Arc<Backtrace>>,
}

impl StackTrace {
    /// Capture the current stack according to `mode`.
    pub fn capture(mode: TraceCapture) -> Self {
        let backtrace = match mode {
            TraceCapture::Off => return Self::empty(),
            TraceCapture::Auto => Backtrace::capture(),
            TraceCapture::Force => Backtrace::force_capture(),
        };
        match backtrace.status() {
            BacktraceStatus::Captured => StackTrace {
                backtrace: Some(Arc::new(backtrace)),
            },
            _ => Self::empty(),
        }
    }

    /// A trace with no frames.
    pub fn empty() -> Self {
        StackTrace { backtrace: None }
    }

    pub fn is_captured(&self) -> bool {
        self.backtrace.is_some()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    /// Ordered frames, innermost first.
    pub fn frames(&self) -> Vec<Frame> {
        match &self.backtrace {
            Some(backtrace) => parse_frames(&backtrace.to_string()),
            None => Vec::new(),
        }
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backtrace {
            Some(backtrace) => write!(f, "StackTrace({} frames)", parse_frames(&backtrace.to_string()).len()),
            None => write!(f, "StackTrace(<none>)"),
        }
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backtrace {
            Some(backtrace) => fmt::Display::fmt(backtrace, f),
            None => Ok(()),
        }
    }
}

// Rendered backtraces look like
//    0: crate::module::function
//              at ./src/module.rs:10:5
fn parse_frames(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();
    for line in rendered.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                frame.location.get_or_insert_with(|| location.to_string());
            }
            continue;
        }
        let Some((index, symbol)) = line.split_once(": ") else {
            continue;
        };
        if let Ok(index) = index.parse::<usize>() {
            frames.push(Frame {
                index,
                symbol: symbol.to_string(),
                location: None,
            });
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "   0: sling::stack::StackTrace::capture
             at ./src/stack.rs:33:36
   1: sling::raise::Raise::context
             at ./src/raise.rs:80:27
   2: std::rt::lang_start_internal
   3: main";

    #[test]
    fn test_parse_frames() {
        let frames = parse_frames(RENDERED);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].symbol, "sling::stack::StackTrace::capture");
        assert_eq!(frames[0].location.as_deref(), Some("./src/stack.rs:33:36"));
        assert_eq!(frames[1].index, 1);
        assert_eq!(frames[2].location, None);
        assert_eq!(frames[3].symbol, "main");
    }

    #[test]
    fn test_off_captures_nothing() {
        let trace = StackTrace::capture(TraceCapture::Off);
        assert!(!trace.is_captured());
        assert!(trace.frames().is_empty());
        assert_eq!(trace.to_string(), "");
    }

    #[test]
    fn test_force_captures_frames() {
        let trace = StackTrace::capture(TraceCapture::Force);
        assert!(trace.is_captured());
        assert!(!trace.frames().is_empty());
    }
}
