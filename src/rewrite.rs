//! Compile-time injection of `__source` into monitored calls.
//!
//! For every call the locator reports, the planner picks an [`Edit`] from the
//! call's group and argument shape. All edits are expressed against the
//! original text and applied in one pass from the end of the buffer towards
//! the start, so earlier offsets never shift.

use regex::Regex;

use crate::args::{find_argument_span, ArgShape, ArgumentSpan};
use crate::callsite::{find_calls, CallKind, CallMatcher, CallSite};
use crate::config::TransformConfig;
use crate::error::ConfigError;
use crate::path::{clean_path, display_path};

/// One textual replacement against the original buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub position: usize,
    pub delete_len: usize,
    pub insert: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub text: String,
    pub changed: bool,
}

impl TransformOutput {
    fn unchanged(source: &str) -> Self {
        Self {
            text: source.to_string(),
            changed: false,
        }
    }
}

/// 1-based line lookup by byte offset.
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(src: &str) -> Self {
        Self {
            newlines: src.bytes().enumerate().filter(|(_, b)| *b == b'\n').map(|(i, _)| i).collect(),
        }
    }

    /// One plus the number of newlines strictly before `offset`.
    fn line_of(&self, offset: usize) -> usize {
        1 + self.newlines.partition_point(|&n| n < offset)
    }
}

fn is_blank(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_whitespace())
}

/// Apply `edits` to `source`. Edits must not overlap.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.position.cmp(&a.position));
    let mut text = source.to_string();
    for edit in edits {
        text.replace_range(edit.position..edit.position + edit.delete_len, &edit.insert);
    }
    text
}

/// Rewrites monitored calls in JS/TS/JSX source.
///
/// Immutable once built; one instance serves every file of a build.
#[derive(Debug, Clone)]
pub struct Rewriter {
    config: TransformConfig,
    matcher: CallMatcher,
    self_declaration: Option<Regex>,
}

impl Rewriter {
    pub fn new(config: TransformConfig) -> Result<Self, ConfigError> {
        let matcher = CallMatcher::new(&config.monitored)?;
        let self_declaration = if config.monitored.hooks.is_empty() {
            None
        } else {
            let hooks = config
                .monitored
                .hooks
                .iter()
                .map(|h| regex::escape(h))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(
                r"\bfunction\s*\*?\s+(?:{hooks})\s*[<(]|\b(?:const|let|var)\s+(?:{hooks})\s*(?::[^=]*)?=\s*(?:async\s+)?(?:function\b|\(|[A-Za-z_$][\w$]*\s*=>)"
            ))?)
        };
        Ok(Self {
            config,
            matcher,
            self_declaration,
        })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// True when the file defines one of the monitored hooks itself.
    fn declares_monitored_hook(&self, source: &str) -> bool {
        self.self_declaration.as_ref().is_some_and(|re| re.is_match(source))
    }

    /// Plan the edits for `source` without applying them.
    pub fn plan(&self, source: &str, path: &str) -> Vec<Edit> {
        if !self.config.monitored.needles().any(|needle| source.contains(needle)) {
            return Vec::new();
        }
        if self.declares_monitored_hook(source) {
            log::debug!("{path}: declares a monitored hook, skipping");
            return Vec::new();
        }

        let file_name = display_path(&clean_path(path));
        let file_name_json = serde_json::to_string(&file_name).unwrap_or("\"unknown\"".into());
        let lines = LineIndex::new(source);

        find_calls(source, &self.matcher)
            .filter_map(|call| {
                let Some(span) = find_argument_span(source, call.open_paren) else {
                    log::debug!("{path}: unbalanced call to {} at byte {}, left as is", call.name, call.match_start);
                    return None;
                };
                let property = format!(
                    "__source: {{ fileName: {file_name_json}, lineNumber: {} }}",
                    lines.line_of(call.match_start)
                );
                self.plan_call(&call, &span, &property)
            })
            .collect()
    }

    /// Rewrite every monitored call in `source`. `path` is the module id or
    /// file path the build tool reported.
    pub fn transform(&self, source: &str, path: &str) -> TransformOutput {
        let edits = self.plan(source, path);
        if edits.is_empty() {
            return TransformOutput::unchanged(source);
        }
        log::debug!("{path}: {} call(s) annotated", edits.len());
        TransformOutput {
            text: apply_edits(source, edits),
            changed: true,
        }
    }

    fn plan_call(&self, call: &CallSite, span: &ArgumentSpan<'_>, property: &str) -> Option<Edit> {
        let object = format!("{{ {property} }}");
        match (call.kind, span.shape()) {
            (CallKind::Hook, ArgShape::Empty) => Some(Edit {
                position: span.open_paren + 1,
                delete_len: span.text.len(),
                insert: object,
            }),
            (CallKind::Hook, ArgShape::ObjectFirst | ArgShape::ContainsObject) => {
                splice_into_object(span, property).or_else(|| append_argument(span, &object))
            }
            (CallKind::Hook, ArgShape::Other) => append_argument(span, &object),

            (CallKind::Wrapper, ArgShape::Empty | ArgShape::ObjectFirst) => None,
            (CallKind::Wrapper, _) if span.argument_count() == 1 => append_argument(span, &object),
            (CallKind::Wrapper, _) => None,

            (CallKind::Method, ArgShape::Empty) => None,
            (CallKind::Method, _) => {
                let mut parts: Vec<&str> = Vec::new();
                for _ in span.argument_count()..2 {
                    parts.push(&self.config.pad_argument);
                }
                parts.push(&object);
                append_argument(span, &parts.join(", "))
            }
        }
    }
}

/// Add `property` as the last member of the last top-level object literal.
fn splice_into_object(span: &ArgumentSpan<'_>, property: &str) -> Option<Edit> {
    let close = span.last_top_level_object()?;
    let (at, byte) = span.significant_before(close)?;
    let lead = if matches!(byte, b'{' | b',') { " " } else { ", " };
    let position = at + 1;
    let gap = close - position;
    let gap_is_blank = is_blank(&span.text[position - span.open_paren - 1..close - span.open_paren - 1]);
    Some(if gap_is_blank {
        Edit {
            position,
            delete_len: gap,
            insert: format!("{lead}{property} "),
        }
    } else {
        Edit {
            position,
            delete_len: 0,
            insert: format!("{lead}{property}"),
        }
    })
}

/// Append `text` as new trailing argument(s).
fn append_argument(span: &ArgumentSpan<'_>, text: &str) -> Option<Edit> {
    let last = span.last_significant()?;
    let lead = if span.has_trailing_comma() { " " } else { ", " };
    Some(Edit {
        position: last + 1,
        delete_len: 0,
        insert: format!("{lead}{text}"),
    })
}
