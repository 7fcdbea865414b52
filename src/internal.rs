//! What counts as "not the user's code".
//!
//! One ordered rule table serves both the runtime resolver (frames) and the
//! build-time adapter (paths). A second, file-scope table lists paths whose
//! whole file is never offered to the rewriter.

use std::sync::OnceLock;

use regex::Regex;

use crate::frame::StackFrame;

/// Module names of the logging library itself.
const LIBRARY_MARKERS: &[&str] = &[
    "node_modules/@codepress/logger",
    "node_modules/codepress-logger",
    "codepress_logsite",
];

/// Framework call-stack markers.
const FRAMEWORK_MARKERS: &[&str] = &[
    "node_modules/react-dom",
    "node_modules/react/",
    "react-dom.development",
    "react-dom.production",
    "react-reconciler",
    "node_modules/scheduler",
    "next/dist/",
    "node:internal",
];

/// Bundler runtime shapes.
const BUNDLER_MARKERS: &[&str] = &[
    "webpack/bootstrap",
    "webpack/runtime",
    "__webpack_require__",
    "@vite/client",
    "vite/dist/client",
    "[turbopack]",
    "turbopack-runtime",
    "wasm://",
];

/// Native Rust runtime locations.
const NATIVE_MARKERS: &[&str] = &["/rustc/", "/library/std/", "/library/core/", "/library/alloc/"];

/// Whole files the rewriter never sees.
pub const FILE_SKIP_PATTERNS: &[&str] = &[
    "node_modules/",
    "/.next/",
    "/.vite/",
    ".d.ts",
    ".min.js",
    "\0",
];

fn re_minified_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_$]$").unwrap())
}

/// Bundler runtime chunks. Outside a chunk directory the name alone is not
/// enough; a content hash is required.
fn re_bundler_runtime_chunk() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:/static/chunks/|/static/js/)(?:webpack|webpack-runtime|framework|polyfills)(?:[-.][0-9a-f]{6,})?\.js$|/(?:webpack|webpack-runtime|framework|polyfills)[-.][0-9a-f]{8,}\.js$",
        )
        .unwrap()
    })
}

/// Node core modules as older runtimes print them, without the `node:` scheme.
fn re_node_core_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^internal/(?:process|modules|timers|main)/").unwrap())
}

fn re_library_fn() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<?codepress_logsite::").unwrap())
}

fn re_native_runtime_fn() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:<?(?:std|core|alloc|test|backtrace)::|__rust|rust_begin_unwind)").unwrap())
}

/// What a rule inspects.
#[derive(Debug, Clone)]
pub enum InternalRule {
    PathContains(String),
    PathMatches(Regex),
    FunctionMatches(Regex),
}

impl InternalRule {
    fn matches_path(&self, path: &str) -> bool {
        match self {
            InternalRule::PathContains(needle) => path.contains(needle.as_str()),
            InternalRule::PathMatches(re) => re.is_match(path),
            InternalRule::FunctionMatches(_) => false,
        }
    }

    fn matches_function(&self, name: &str) -> bool {
        match self {
            InternalRule::FunctionMatches(re) => re.is_match(name),
            _ => false,
        }
    }
}

/// Ordered internal-frame rule table. First match wins.
#[derive(Debug, Clone)]
pub struct InternalPatterns {
    rules: Vec<InternalRule>,
}

impl Default for InternalPatterns {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl InternalPatterns {
    /// Built-in rules followed by `extra_markers` as path substrings.
    pub fn new(extra_markers: &[String]) -> Self {
        let mut rules: Vec<InternalRule> = LIBRARY_MARKERS
            .iter()
            .chain(FRAMEWORK_MARKERS)
            .chain(BUNDLER_MARKERS)
            .chain(NATIVE_MARKERS)
            .map(|m| InternalRule::PathContains(m.to_string()))
            .collect();
        rules.push(InternalRule::PathMatches(re_bundler_runtime_chunk().clone()));
        rules.push(InternalRule::PathMatches(re_node_core_path().clone()));
        rules.extend(extra_markers.iter().cloned().map(InternalRule::PathContains));
        rules.push(InternalRule::FunctionMatches(re_library_fn().clone()));
        rules.push(InternalRule::FunctionMatches(re_native_runtime_fn().clone()));
        rules.push(InternalRule::FunctionMatches(re_minified_name().clone()));
        Self { rules }
    }

    pub fn rules(&self) -> &[InternalRule] {
        &self.rules
    }

    pub fn is_internal_path(&self, path: &str) -> bool {
        self.rules.iter().any(|r| r.matches_path(path))
    }

    pub fn is_internal_function(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.matches_function(name))
    }

    /// A frame without a path is always internal.
    pub fn is_internal_frame(&self, frame: &StackFrame) -> bool {
        let Some(path) = frame.file_path.as_deref() else {
            return true;
        };
        let function = frame.function_name.as_deref();
        self.rules.iter().any(|r| {
            r.matches_path(path) || function.is_some_and(|name| r.matches_function(name))
        })
    }

    /// Whole-file skip for the rewriter: file-scope table plus the path rules.
    pub fn is_skipped_file(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        FILE_SKIP_PATTERNS.iter().any(|p| normalized.contains(p)) || self.is_internal_path(&normalized)
    }
}
