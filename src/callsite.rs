//! Discovery of monitored calls in source text.

use std::collections::HashSet;

use regex::{CaptureMatches, Regex};

use crate::config::MonitoredNames;
use crate::error::ConfigError;
use crate::lexer::LexScanner;

// Optional `<…>` type arguments, one level of nesting.
const GENERIC_SUFFIX: &str = r"(?:<(?:[^<>]|<[^<>]*>)*>)?";

/// Which monitored group a call belongs to. Each group has its own injection
/// policy in [`crate::rewrite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Hook-like calls that produce a value, e.g. `useLogger(…)`.
    Hook,
    /// Wrapping calls such as `withLogger(Component)`.
    Wrapper,
    /// `receiver.method(…)` on one of the logger receiver names.
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Monitored name as written; method calls are normalised to `receiver.method`.
    pub name: String,
    pub kind: CallKind,
    pub match_start: usize,
    /// One past the opening parenthesis.
    pub match_end: usize,
    pub open_paren: usize,
}

/// Compiled form of a [`MonitoredNames`] set.
#[derive(Debug, Clone)]
pub struct CallMatcher {
    pattern: Option<Regex>,
    hooks: HashSet<String>,
    wrappers: HashSet<String>,
}

fn alternation(names: &[String]) -> String {
    let mut sorted: Vec<&String> = names.iter().collect();
    // Longest first so a prefix never shadows a longer name.
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    sorted
        .into_iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|")
}

impl CallMatcher {
    pub fn new(names: &MonitoredNames) -> Result<Self, ConfigError> {
        names.validate()?;

        let simple: Vec<String> = names.hooks.iter().chain(&names.wrappers).cloned().collect();
        let mut branches = Vec::new();
        if !simple.is_empty() {
            branches.push(format!("(?P<simple>{})", alternation(&simple)));
        }
        if !names.receivers.is_empty() && !names.methods.is_empty() {
            branches.push(format!(
                r"(?P<recv>{})\s*\??\.\s*(?P<method>{})",
                alternation(&names.receivers),
                alternation(&names.methods)
            ));
        }

        let pattern = if branches.is_empty() {
            None
        } else {
            let src = format!(r"(?:{})\s*{GENERIC_SUFFIX}\s*\(", branches.join("|"));
            Some(Regex::new(&src)?)
        };

        Ok(Self {
            pattern,
            hooks: names.hooks.iter().cloned().collect(),
            wrappers: names.wrappers.iter().cloned().collect(),
        })
    }

    fn kind_of(&self, simple: &str) -> CallKind {
        if self.hooks.contains(simple) {
            CallKind::Hook
        } else if self.wrappers.contains(simple) {
            CallKind::Wrapper
        } else {
            CallKind::Method
        }
    }
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// True when `prefix` ends in `function` (or `function*`) followed by whitespace.
fn follows_function_keyword(prefix: &str) -> bool {
    let trimmed = prefix.trim_end();
    if trimmed.len() == prefix.len() {
        return false;
    }
    let trimmed = trimmed.strip_suffix('*').map(str::trim_end).unwrap_or(trimmed);
    match trimmed.strip_suffix("function") {
        Some(head) => !head.bytes().last().is_some_and(is_ident_byte),
        None => false,
    }
}

/// Lazy iterator over the call sites of one buffer.
pub struct CallSites<'m, 's> {
    matcher: &'m CallMatcher,
    src: &'s str,
    matches: Option<CaptureMatches<'m, 's>>,
    scanner: LexScanner<'s>,
}

impl Iterator for CallSites<'_, '_> {
    type Item = CallSite;

    fn next(&mut self) -> Option<CallSite> {
        let matches = self.matches.as_mut()?;
        loop {
            let caps = matches.next()?;
            let Some(whole) = caps.get(0) else { continue };
            let start = whole.start();
            let bytes = self.src.as_bytes();

            if start > 0 && is_ident_byte(bytes[start - 1]) {
                continue;
            }
            if follows_function_keyword(&self.src[..start]) {
                continue;
            }
            if !self.scanner.state_at(start).is_code() {
                continue;
            }

            let (name, kind) = if let Some(simple) = caps.name("simple") {
                (simple.as_str().to_string(), self.matcher.kind_of(simple.as_str()))
            } else {
                let (Some(recv), Some(method)) = (caps.name("recv"), caps.name("method")) else {
                    continue;
                };
                (format!("{}.{}", recv.as_str(), method.as_str()), CallKind::Method)
            };

            return Some(CallSite {
                name,
                kind,
                match_start: start,
                match_end: whole.end(),
                open_paren: whole.end() - 1,
            });
        }
    }
}

/// Find monitored calls in `src`. Every call starts a fresh scan.
pub fn find_calls<'m, 's>(src: &'s str, matcher: &'m CallMatcher) -> CallSites<'m, 's> {
    CallSites {
        matcher,
        src,
        matches: matcher.pattern.as_ref().map(|re| re.captures_iter(src)),
        scanner: LexScanner::new(src),
    }
}
