//! Parsing of individual stack-trace lines.
//!
//! Three conventions are understood, tried in order:
//!
//! * V8: `    at Foo.bar (src/app.ts:12:4)` or `    at src/app.ts:12:4`
//! * SpiderMonkey/JavaScriptCore: `bar@src/app.ts:12:4`
//! * a bare `src/app.ts:12:4` location
//!
//! Rust backtraces are folded into the V8 shape before they get here, see
//! [`crate::resolver::fold_rust_backtrace`].

use std::sync::OnceLock;

use regex::Regex;

/// One parsed frame. Every field is optional; a line that yields none of them
/// is not a frame at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackFrame {
    pub function_name: Option<String>,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
}

fn re_v8() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*at\s+(?:async\s+)?(?:(.+?)\s+\((.+)\)|(.+?))\s*$").unwrap())
}

fn re_gecko() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([^@\s]*)@(.+?)\s*$").unwrap())
}

fn re_bare() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Path-like: no whitespace and at least one `/`, `\` or `.`.
    RE.get_or_init(|| Regex::new(r"^\s*(\S*[/\\.]\S*?:\d+(?::\d+)?)\s*$").unwrap())
}

/// Locations engines print when there is no file behind a frame.
const PATHLESS_LOCATIONS: &[&str] = &["native", "<anonymous>", "unknown location", "[native code]"];

/// Split `path:line:col` into its parts.
///
/// Peels at most two trailing `:`-segments that contain no `/`, so
/// `http://host:3000/a.js:1:2` keeps its port and `node:internal/x` its scheme.
fn split_location(location: &str) -> (Option<String>, Option<u32>, Option<u32>) {
    let mut rest = location.trim();
    let mut tail = Vec::with_capacity(2);
    for _ in 0..2 {
        match rest.rfind(':') {
            Some(i) if !rest[i + 1..].contains('/') => {
                tail.push(&rest[i + 1..]);
                rest = &rest[..i];
            }
            _ => break,
        }
    }
    tail.reverse();

    let number = |s: Option<&&str>| s.and_then(|v| v.trim().parse::<u32>().ok());
    let line = number(tail.first());
    let column = number(tail.get(1));

    let path = rest.trim();
    let path = (!path.is_empty() && !PATHLESS_LOCATIONS.contains(&path)).then(|| path.to_string());
    (path, line, column)
}

fn frame_from(function: Option<&str>, location: &str) -> StackFrame {
    let (file_path, line_number, column_number) = split_location(location);
    StackFrame {
        function_name: function.map(str::trim).filter(|f| !f.is_empty()).map(str::to_string),
        file_path,
        line_number,
        column_number,
    }
}

/// Parse one line of a stack trace. Header lines such as `Error: boom`
/// and blank lines yield `None`.
pub fn parse_frame(line: &str) -> Option<StackFrame> {
    if let Some(caps) = re_v8().captures(line) {
        return Some(match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(name), Some(loc), _) => frame_from(Some(name.as_str()), loc.as_str()),
            (_, _, Some(loc)) => frame_from(None, loc.as_str()),
            _ => return None,
        });
    }
    if let Some(caps) = re_gecko().captures(line) {
        let name = caps.get(1).map(|m| m.as_str());
        return caps.get(2).map(|loc| frame_from(name, loc.as_str()));
    }
    re_bare().captures(line).and_then(|caps| caps.get(1)).map(|loc| frame_from(None, loc.as_str()))
}
