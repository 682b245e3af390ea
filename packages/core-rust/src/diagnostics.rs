//! Best-effort call-site extraction from error stack traces.
//!
//! Stacks are read one frame per line, in either of the shapes
//! `at <fn> (<file>:<line>:<col>)` or `at <file>:<line>:<col>`. The first
//! [`SKIPPED_FRAMES`] lines belong to the error header and the error's own
//! construction; the line after them is the call site of interest.
//! [`collapse_backtrace`] rewrites a `std::backtrace::Backtrace` rendering
//! into that shape.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Lines skipped before the call-site frame.
pub const SKIPPED_FRAMES: usize = 3;

/// A parsed call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Function name; empty for anonymous frames.
    pub method: String,
    /// Full path of the source file.
    pub path: String,
    pub line: String,
    pub pos: String,
    /// Base name of `path`.
    pub file: String,
    /// The stack from the call site down.
    pub stack: String,
}

/// Outcome of a diagnostics pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackDiagnostics {
    CallSite(CallSite),
    /// The frame did not match a known shape; the whole stack is kept.
    Raw(String),
}

/// Failure while extracting diagnostics. Always logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticFailure {
    #[error("error carries no stack trace")]
    MissingStack,
    #[error("stack frame pattern failed to compile")]
    Pattern,
}

fn frame_patterns() -> Option<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let with_fn = Regex::new(r"at\s+(.*)\s+\((.*):(\d*):(\d*)\)").ok()?;
            let bare = Regex::new(r"at\s+()(.*):(\d*):(\d*)").ok()?;
            Some((with_fn, bare))
        })
        .as_ref()
}

/// Extracts the call site from `stack`.
///
/// # Errors
///
/// Returns [`DiagnosticFailure::MissingStack`] when there is no stack and
/// [`DiagnosticFailure::Pattern`] when the frame patterns are unusable.
pub fn extract_call_site(stack: Option<&str>) -> Result<StackDiagnostics, DiagnosticFailure> {
    let stack = stack.ok_or(DiagnosticFailure::MissingStack)?;
    let (with_fn, bare) = frame_patterns().ok_or(DiagnosticFailure::Pattern)?;

    let frames: Vec<&str> = stack.lines().skip(SKIPPED_FRAMES).collect();
    let Some(frame) = frames.first() else {
        return Ok(StackDiagnostics::Raw(stack.to_string()));
    };

    let Some(caps) = with_fn.captures(frame).or_else(|| bare.captures(frame)) else {
        return Ok(StackDiagnostics::Raw(stack.to_string()));
    };

    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();
    let path = group(2);
    let file = Path::new(&path)
        .file_name()
        .map_or_else(|| path.clone(), |name| name.to_string_lossy().into_owned());

    Ok(StackDiagnostics::CallSite(CallSite {
        method: group(1),
        line: group(3),
        pos: group(4),
        file,
        path,
        stack: frames.join("\n"),
    }))
}

/// Rewrites a rendered `std::backtrace::Backtrace` into one line per frame,
/// preceded by an `Error: <message>` header. Frames of the capture
/// machinery itself are dropped.
#[must_use]
pub fn collapse_backtrace(message: &str, rendered: &str) -> String {
    fn flush(frame: Option<(String, Option<String>)>, out: &mut Vec<String>) {
        let Some((func, location)) = frame else {
            return;
        };
        if func.starts_with("std::backtrace") {
            return;
        }
        out.push(match location {
            Some(location) => format!("    at {func} ({location})"),
            None => format!("    at {func}"),
        });
    }

    let mut out = vec![format!("Error: {message}")];
    let mut current: Option<(String, Option<String>)> = None;

    for line in rendered.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some((_, loc)) = current.as_mut() {
                loc.get_or_insert_with(|| location.to_string());
            }
        } else if let Some((index, func)) = line.split_once(": ") {
            if index.chars().all(|c| c.is_ascii_digit()) && !index.is_empty() {
                flush(current.take(), &mut out);
                current = Some((func.to_string(), None));
            }
        }
    }
    flush(current.take(), &mut out);

    out.join("\n")
}
