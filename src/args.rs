//! Argument-list boundaries and shape sniffing.
//!
//! Everything here is a heuristic over raw text plus the lexical state of each
//! byte: parentheses, braces and commas only count when they are code.

use crate::lexer::{LexScanner, LexState};

/// Text between a call's parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpan<'s> {
    pub open_paren: usize,
    pub close_paren: usize,
    pub text: &'s str,
    // Lexical state of each byte of `text`.
    states: Vec<LexState>,
    // Set for bytes inside a `${ … }` interpolation opened within the arguments.
    nested: Vec<bool>,
}

/// How the argument text starts, which decides the injection branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Nothing but whitespace and comments.
    Empty,
    ObjectFirst,
    ContainsObject,
    Other,
}

/// Walk forward from `open_paren` to its matching `)`.
///
/// `open_paren` must be a code byte outside any template interpolation, which
/// holds for every call the locator reports. Returns `None` when the text ends
/// before the parentheses balance.
pub fn find_argument_span(src: &str, open_paren: usize) -> Option<ArgumentSpan<'_>> {
    let bytes = src.as_bytes();
    if bytes.get(open_paren) != Some(&b'(') {
        return None;
    }

    let mut scanner = LexScanner::checkpoint(src, open_paren);
    let mut depth = 0usize;
    let mut states = Vec::new();
    let mut nested = Vec::new();
    let mut pos = open_paren;

    while let Some(state) = scanner.step() {
        if state.is_code() {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(ArgumentSpan {
                            open_paren,
                            close_paren: pos,
                            text: &src[open_paren + 1..pos],
                            states,
                            nested,
                        });
                    }
                }
                _ => {}
            }
        }
        if pos > open_paren {
            states.push(state);
            nested.push(scanner.interpolation_depth() > 0);
        }
        pos += 1;
    }
    None
}

fn opens(b: u8) -> bool {
    matches!(b, b'(' | b'[' | b'{')
}

fn closes(b: u8) -> bool {
    matches!(b, b')' | b']' | b'}')
}

impl<'s> ArgumentSpan<'s> {
    /// Absolute offset of the first argument byte.
    fn base(&self) -> usize {
        self.open_paren + 1
    }

    /// Code at the argument list's own level, outside template interpolations.
    fn is_code(&self, rel: usize) -> bool {
        self.states[rel].is_code() && !self.nested[rel]
    }

    fn is_insignificant(&self, rel: usize) -> bool {
        let state = self.states[rel];
        state.is_comment() || (state.is_code() && self.text.as_bytes()[rel].is_ascii_whitespace())
    }

    /// Relative index of the last byte before `end` that is not whitespace or comment.
    fn last_significant_before(&self, end: usize) -> Option<usize> {
        (0..end).rev().find(|&rel| !self.is_insignificant(rel))
    }

    pub fn shape(&self) -> ArgShape {
        if (0..self.text.len()).all(|rel| self.is_insignificant(rel)) {
            return ArgShape::Empty;
        }
        let trimmed = self.text.trim_start();
        if trimmed.starts_with('{') {
            ArgShape::ObjectFirst
        } else if trimmed.contains('{') {
            ArgShape::ContainsObject
        } else {
            ArgShape::Other
        }
    }

    /// Commas at bracket depth zero.
    pub fn top_level_commas(&self) -> usize {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        let mut commas = 0;
        for (rel, &b) in bytes.iter().enumerate() {
            if !self.is_code(rel) {
                continue;
            }
            if opens(b) {
                depth += 1;
            } else if closes(b) {
                depth = depth.saturating_sub(1);
            } else if b == b',' && depth == 0 {
                commas += 1;
            }
        }
        commas
    }

    /// True when the last significant byte is a comma, as in `f(a, b,)`.
    pub fn has_trailing_comma(&self) -> bool {
        self.last_significant_before(self.text.len())
            .is_some_and(|rel| self.text.as_bytes()[rel] == b',')
    }

    /// Number of arguments, not counting a trailing comma.
    pub fn argument_count(&self) -> usize {
        if self.shape() == ArgShape::Empty {
            return 0;
        }
        self.top_level_commas() + 1 - usize::from(self.has_trailing_comma())
    }

    /// Absolute offset of the last significant argument byte.
    pub fn last_significant(&self) -> Option<usize> {
        self.last_significant_before(self.text.len()).map(|rel| rel + self.base())
    }

    /// Last significant byte before absolute offset `end`, and that byte.
    pub fn significant_before(&self, end: usize) -> Option<(usize, u8)> {
        let rel_end = end.checked_sub(self.base())?.min(self.text.len());
        self.last_significant_before(rel_end)
            .map(|rel| (rel + self.base(), self.text.as_bytes()[rel]))
    }

    /// Closing brace of the last top-level object literal, as an absolute offset.
    ///
    /// Scans backwards from the closing parenthesis for a `}` at depth zero.
    /// A brace whose opener follows `)` or `=>` closes a function body rather
    /// than an object, so it is rejected.
    pub fn last_top_level_object(&self) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        let mut close = None;
        for rel in (0..bytes.len()).rev() {
            if !self.is_code(rel) {
                continue;
            }
            let b = bytes[rel];
            if b == b'}' && depth == 0 {
                close = Some(rel);
                break;
            }
            if closes(b) {
                depth += 1;
            } else if opens(b) {
                depth = depth.saturating_sub(1);
            }
        }
        let close = close?;

        let open = self.matching_open_brace(close)?;
        match self.last_significant_before(open) {
            Some(rel) if bytes[rel] == b')' => None,
            Some(rel) if bytes[rel] == b'>' && rel > 0 && bytes[rel - 1] == b'=' => None,
            _ => Some(close + self.base()),
        }
    }

    fn matching_open_brace(&self, close: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        for rel in (0..=close).rev() {
            if !self.is_code(rel) {
                continue;
            }
            match bytes[rel] {
                b'}' => depth += 1,
                b'{' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(rel);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
