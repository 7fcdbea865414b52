//! Runtime fallback: find the user's call site on the current stack.
//!
//! Only used when a log call carries no injected `__source`. The stack text
//! comes from a [`StackCapture`]; everything after that is the pure
//! [`resolve_from_stack`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::frame::{parse_frame, StackFrame};
use crate::internal::InternalPatterns;
use crate::path::{clean_path, display_path};

// -----------------------------------------------------------------------------
// Records
// -----------------------------------------------------------------------------

/// Where a location came from. An injected location always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    Injected,
    Resolved,
}

/// The attribution attached to one log call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocationRecord {
    /// Cleaned project-relative path, extension kept.
    pub file_path: Option<String>,
    /// Display path without the source extension.
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub function_name: Option<String>,
    pub component_name: Option<String>,
    pub provenance: Provenance,
}

impl SourceLocationRecord {
    /// The record for "no attribution".
    pub fn unresolved() -> Self {
        Self {
            file_path: None,
            file_name: None,
            line_number: None,
            column_number: None,
            function_name: None,
            component_name: None,
            provenance: Provenance::Resolved,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.file_path.is_none() && self.file_name.is_none() && self.line_number.is_none()
    }
}

/// How many user frames to skip above the first non-internal one.
///
/// Library frames are filtered out before skipping, so the count only covers
/// wrapper layers that live in application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SkipFrames(pub usize);

impl SkipFrames {
    /// The logging call is made directly from the code being attributed.
    pub const DIRECT: SkipFrames = SkipFrames(0);
    /// The logging call is made from a one-level application helper.
    pub const ONE_WRAPPER: SkipFrames = SkipFrames(1);

    pub fn plus(self, extra: usize) -> SkipFrames {
        SkipFrames(self.0.saturating_add(extra))
    }
}

// -----------------------------------------------------------------------------
// Stack capture
// -----------------------------------------------------------------------------

/// Source of raw stack text for the calling thread.
pub trait StackCapture: Send + Sync {
    /// `None` when the platform has no stack to offer.
    fn capture(&self) -> Option<String>;
}

/// `std::backtrace` on native targets, folded into V8-shaped lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBacktrace;

impl StackCapture for NativeBacktrace {
    fn capture(&self) -> Option<String> {
        let backtrace = std::backtrace::Backtrace::force_capture();
        if backtrace.status() != std::backtrace::BacktraceStatus::Captured {
            return None;
        }
        Some(fold_rust_backtrace(&backtrace.to_string()))
    }
}

/// `new Error().stack` read through `js_sys` on wasm targets.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsErrorStack;

#[cfg(target_arch = "wasm32")]
impl StackCapture for JsErrorStack {
    fn capture(&self) -> Option<String> {
        let error = js_sys::Error::new("");
        js_sys::Reflect::get(&error, &wasm_bindgen::JsValue::from_str("stack"))
            .ok()
            .and_then(|stack| stack.as_string())
    }
}

fn re_rust_symbol() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").unwrap())
}

fn re_rust_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*at\s+(.+?)\s*$").unwrap())
}

fn re_symbol_hash() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"::h[0-9a-f]{16}$").unwrap())
}

/// Turn `std::backtrace` output into one `    at symbol (location)` line per
/// frame. Frames without a location are dropped.
pub fn fold_rust_backtrace(text: &str) -> String {
    let mut out = String::new();
    let mut symbol: Option<String> = None;
    for line in text.lines() {
        if let Some(caps) = re_rust_symbol().captures(line) {
            symbol = caps.get(1).map(|m| re_symbol_hash().replace(m.as_str(), "").into_owned());
        } else if let Some(caps) = re_rust_location().captures(line) {
            if let (Some(sym), Some(loc)) = (symbol.take(), caps.get(1)) {
                out.push_str(&format!("    at {sym} ({})\n", loc.as_str()));
            }
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------------

fn re_component_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z][A-Za-z0-9_$]*)(?:\.|::)").unwrap())
}

/// Receivers JS engines print for built-ins and DOM dispatch; never components.
const ENGINE_RECEIVERS: &[&str] = &[
    "Object",
    "Array",
    "Promise",
    "Function",
    "Generator",
    "AsyncGenerator",
    "Module",
    "JSON",
    "Reflect",
    "Proxy",
    "Map",
    "Set",
    "EventTarget",
    "Window",
    "Document",
    "Node",
    "Element",
    "XMLHttpRequest",
    "MessagePort",
    "Timeout",
    "Immediate",
    "EventEmitter",
];

fn is_engine_receiver(name: &str) -> bool {
    ENGINE_RECEIVERS.contains(&name) || (name.starts_with("HTML") && name.ends_with("Element"))
}

/// Capitalised owner of a method: `Header.render` or `app::Header::render`.
fn component_name(function: &str) -> Option<String> {
    let owner = match re_component_prefix().captures(function) {
        Some(caps) => caps.get(1).map(|m| m.as_str()),
        None => {
            let mut segments = function.rsplit("::");
            segments.next()?;
            segments
                .next()
                .filter(|owner| owner.starts_with(|c: char| c.is_ascii_uppercase()))
                .filter(|owner| owner.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
        }
    }?;
    (!is_engine_receiver(owner)).then(|| owner.to_string())
}

fn record_from(frame: StackFrame, patterns: &InternalPatterns) -> SourceLocationRecord {
    let file_path = frame.file_path.as_deref().map(clean_path).filter(|p| !p.is_empty());
    let file_name = file_path.as_deref().map(display_path);
    let component_name = frame
        .function_name
        .as_deref()
        .filter(|f| !patterns.is_internal_function(f))
        .and_then(component_name);
    SourceLocationRecord {
        file_path,
        file_name,
        line_number: frame.line_number,
        column_number: frame.column_number,
        function_name: frame.function_name,
        component_name,
        provenance: Provenance::Resolved,
    }
}

/// Resolve the first user frame of `stack`, skipping `skip` more user frames.
pub fn resolve_from_stack(stack: &str, skip: SkipFrames, patterns: &InternalPatterns) -> SourceLocationRecord {
    stack
        .lines()
        .filter_map(parse_frame)
        .filter(|frame| !patterns.is_internal_frame(frame))
        .nth(skip.0)
        .map(|frame| record_from(frame, patterns))
        .unwrap_or_else(SourceLocationRecord::unresolved)
}

/// Captures the current stack and resolves it against an internal-frame table.
pub struct SourceResolver {
    patterns: InternalPatterns,
    capture: Box<dyn StackCapture>,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("rules", &self.patterns.rules().len())
            .finish_non_exhaustive()
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(InternalPatterns::default())
    }
}

impl SourceResolver {
    /// Resolver using the platform's native stack capture.
    pub fn new(patterns: InternalPatterns) -> Self {
        #[cfg(target_arch = "wasm32")]
        let capture: Box<dyn StackCapture> = Box::new(JsErrorStack);
        #[cfg(not(target_arch = "wasm32"))]
        let capture: Box<dyn StackCapture> = Box::new(NativeBacktrace);
        Self::with_capture(patterns, capture)
    }

    pub fn with_capture(patterns: InternalPatterns, capture: Box<dyn StackCapture>) -> Self {
        Self { patterns, capture }
    }

    pub fn patterns(&self) -> &InternalPatterns {
        &self.patterns
    }

    pub fn resolve(&self, skip: SkipFrames) -> SourceLocationRecord {
        match self.capture.capture() {
            Some(stack) => resolve_from_stack(&stack, skip, &self.patterns),
            None => {
                log::debug!("no stack available, location left unresolved");
                SourceLocationRecord::unresolved()
            }
        }
    }
}
