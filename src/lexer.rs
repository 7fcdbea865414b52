//! Lexical state tracking for JS/TS source text.
//!
//! This is not a tokenizer. It answers one question for a byte offset: is this
//! byte ordinary code, or does it sit inside a string, a template literal, or a
//! comment? Offsets are byte offsets; every delimiter we care about is ASCII so
//! multi-byte UTF-8 sequences never trigger a transition.
//!
//! Known limitations, kept on purpose:
//! - a closing quote is recognised by looking one byte back for `\`, so `"a\\"`
//!   is treated as still open;
//! - inside a `${ … }` interpolation only one level of inner braces is tracked,
//!   so `${ {a: {b: 1}} }` closes the interpolation too early;
//! - regex literals are not recognised.

/// Lexical region containing a byte.
///
/// Opening and closing delimiters belong to the region they delimit, so the
/// quotes of `"abc"` are `InString`, and `//` is `InLineComment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexState {
    Normal,
    InString(char),
    /// Template literal text. `depth` is 1 for a top-level template and grows by
    /// one for each template nested inside an interpolation.
    InTemplate(u32),
    InLineComment,
    InBlockComment,
}

impl LexState {
    pub fn is_code(self) -> bool {
        self == LexState::Normal
    }

    pub fn is_comment(self) -> bool {
        matches!(self, LexState::InLineComment | LexState::InBlockComment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Str(u8),
    Template,
    LineComment,
    BlockComment,
}

/// Second byte of a two-byte delimiter that was already decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    BlockOpener,
    BlockCloser,
    InterpolationOpener,
}

/// Resumable forward scanner.
///
/// Each call to [`LexScanner::step`] classifies the byte at the current position
/// and advances by one. Callers that query increasing offsets reuse one scanner
/// instead of rescanning from the start.
#[derive(Debug, Clone)]
pub struct LexScanner<'a> {
    src: &'a [u8],
    pos: usize,
    mode: Mode,
    pending: Pending,
    // One entry per open `${`; the flag is set while a single inner `{` is open.
    interpolations: Vec<bool>,
}

impl<'a> LexScanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::checkpoint(src, 0)
    }

    /// Start scanning at `offset`, which the caller guarantees is plain code
    /// outside any template interpolation.
    pub fn checkpoint(src: &'a str, offset: usize) -> Self {
        Self {
            src: src.as_bytes(),
            pos: offset.min(src.len()),
            mode: Mode::Code,
            pending: Pending::None,
            interpolations: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of `${ … }` interpolations open at the current position.
    pub fn interpolation_depth(&self) -> usize {
        self.interpolations.len()
    }

    fn template_depth(&self) -> u32 {
        self.interpolations.len() as u32 + 1
    }

    fn escaped(&self) -> bool {
        self.pos > 0 && self.src[self.pos - 1] == b'\\'
    }

    /// State a zero-width position past the last consumed byte would have.
    fn resting_state(&self) -> LexState {
        match self.mode {
            Mode::Code => LexState::Normal,
            Mode::Str(q) => LexState::InString(q as char),
            Mode::Template => LexState::InTemplate(self.template_depth()),
            Mode::LineComment => LexState::InLineComment,
            Mode::BlockComment => LexState::InBlockComment,
        }
    }

    /// Classify the byte at the current position and move past it.
    pub fn step(&mut self) -> Option<LexState> {
        let b = *self.src.get(self.pos)?;
        let next = self.src.get(self.pos + 1).copied();
        let state = self.transition(b, next);
        self.pos += 1;
        Some(state)
    }

    fn transition(&mut self, b: u8, next: Option<u8>) -> LexState {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::BlockOpener => return LexState::InBlockComment,
            Pending::BlockCloser => {
                self.mode = Mode::Code;
                return LexState::InBlockComment;
            }
            Pending::InterpolationOpener => {
                let depth = self.template_depth();
                self.interpolations.push(false);
                self.mode = Mode::Code;
                return LexState::InTemplate(depth);
            }
            Pending::None => {}
        }

        match self.mode {
            Mode::Code => match (b, next) {
                (b'"' | b'\'', _) => {
                    self.mode = Mode::Str(b);
                    LexState::InString(b as char)
                }
                (b'`', _) => {
                    self.mode = Mode::Template;
                    LexState::InTemplate(self.template_depth())
                }
                (b'/', Some(b'/')) => {
                    self.mode = Mode::LineComment;
                    LexState::InLineComment
                }
                (b'/', Some(b'*')) => {
                    self.mode = Mode::BlockComment;
                    self.pending = Pending::BlockOpener;
                    LexState::InBlockComment
                }
                (b'{', _) => {
                    if let Some(inner) = self.interpolations.last_mut() {
                        *inner = true;
                    }
                    LexState::Normal
                }
                (b'}', _) => match self.interpolations.last_mut() {
                    Some(inner) if *inner => {
                        *inner = false;
                        LexState::Normal
                    }
                    Some(_) => {
                        self.interpolations.pop();
                        self.mode = Mode::Template;
                        LexState::InTemplate(self.template_depth())
                    }
                    None => LexState::Normal,
                },
                _ => LexState::Normal,
            },
            Mode::Str(q) => {
                if b == q && !self.escaped() {
                    self.mode = Mode::Code;
                    LexState::InString(q as char)
                } else if b == b'\n' && !self.escaped() {
                    // Unterminated: quoted strings cannot span lines.
                    self.mode = Mode::Code;
                    LexState::Normal
                } else {
                    LexState::InString(q as char)
                }
            }
            Mode::Template => {
                let depth = self.template_depth();
                if b == b'`' && !self.escaped() {
                    self.mode = Mode::Code;
                } else if b == b'$' && next == Some(b'{') && !self.escaped() {
                    self.pending = Pending::InterpolationOpener;
                }
                LexState::InTemplate(depth)
            }
            Mode::LineComment => {
                if b == b'\n' {
                    self.mode = Mode::Code;
                    LexState::Normal
                } else {
                    LexState::InLineComment
                }
            }
            Mode::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    self.pending = Pending::BlockCloser;
                }
                LexState::InBlockComment
            }
        }
    }

    /// Consume bytes up to (not including) `offset`.
    pub fn advance_to(&mut self, offset: usize) {
        while self.pos < offset {
            if self.step().is_none() {
                break;
            }
        }
    }

    /// State of the byte at the current position without consuming it.
    pub fn peek(&self) -> LexState {
        let mut probe = self.clone();
        probe.step().unwrap_or_else(|| self.resting_state())
    }

    /// State of the byte at `offset`. Offsets must not go backwards.
    pub fn state_at(&mut self, offset: usize) -> LexState {
        debug_assert!(offset >= self.pos, "LexScanner cannot move backwards");
        self.advance_to(offset);
        self.peek()
    }
}

impl Iterator for LexScanner<'_> {
    type Item = LexState;

    fn next(&mut self) -> Option<LexState> {
        self.step()
    }
}

/// Classify the byte at `offset` with a fresh scan from the start of `src`.
///
/// Offsets at or past the end report the state the text ends in.
pub fn classify(src: &str, offset: usize) -> LexState {
    LexScanner::new(src).state_at(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(src: &str) -> Vec<LexState> {
        LexScanner::new(src).collect()
    }

    #[test]
    fn plain_code_is_normal() {
        assert!(states("let a = b(c);").iter().all(|s| *s == LexState::Normal));
    }

    #[test]
    fn string_delimiters_belong_to_the_string() {
        let src = r#"a("x(y)")"#;
        let s = states(src);
        assert_eq!(s[1], LexState::Normal);
        for i in 2..=7 {
            assert_eq!(s[i], LexState::InString('"'), "offset {i}");
        }
        assert_eq!(s[8], LexState::Normal);
    }

    #[test]
    fn single_quotes_and_escapes() {
        let src = r"'it\'s' x";
        assert_eq!(classify(src, 5), LexState::InString('\''));
        assert_eq!(classify(src, 6), LexState::InString('\''));
        assert_eq!(classify(src, 8), LexState::Normal);
    }

    #[test]
    fn escaped_backslash_before_quote_is_a_known_misclassification() {
        // "a\\" really closes at offset 4, but the one-byte look-back keeps it open.
        let src = r#""a\\" x"#;
        assert_eq!(classify(src, 6), LexState::InString('"'));
    }

    #[test]
    fn unterminated_quote_stops_at_newline() {
        let src = "<p>Don't</p>\nlogger.info(1)";
        let line2 = src.find("logger").unwrap();
        assert_eq!(classify(src, line2), LexState::Normal);
    }

    #[test]
    fn line_comment_runs_to_newline() {
        let src = "a // b(c)\nd";
        assert_eq!(classify(src, 1), LexState::Normal);
        assert_eq!(classify(src, 2), LexState::InLineComment);
        assert_eq!(classify(src, 3), LexState::InLineComment);
        assert_eq!(classify(src, 7), LexState::InLineComment);
        assert_eq!(classify(src, 9), LexState::Normal);
        assert_eq!(classify(src, 10), LexState::Normal);
    }

    #[test]
    fn block_comment_includes_delimiters() {
        let src = "a /* b */ c";
        assert_eq!(classify(src, 2), LexState::InBlockComment);
        assert_eq!(classify(src, 3), LexState::InBlockComment);
        assert_eq!(classify(src, 7), LexState::InBlockComment);
        assert_eq!(classify(src, 8), LexState::InBlockComment);
        assert_eq!(classify(src, 9), LexState::Normal);
    }

    #[test]
    fn block_opener_star_does_not_close() {
        let src = "/*/ x */y";
        assert_eq!(classify(src, 4), LexState::InBlockComment);
        assert_eq!(classify(src, 8), LexState::Normal);
    }

    #[test]
    fn template_interpolation_is_code() {
        let src = "`a ${b(1)} c`";
        assert_eq!(classify(src, 0), LexState::InTemplate(1));
        assert_eq!(classify(src, 1), LexState::InTemplate(1));
        assert_eq!(classify(src, 3), LexState::InTemplate(1));
        assert_eq!(classify(src, 4), LexState::InTemplate(1));
        assert_eq!(classify(src, 5), LexState::Normal);
        assert_eq!(classify(src, 6), LexState::Normal);
        assert_eq!(classify(src, 9), LexState::InTemplate(1));
        assert_eq!(classify(src, 11), LexState::InTemplate(1));
        assert_eq!(classify(src, 12), LexState::InTemplate(1));
        assert_eq!(classify(src, 13), LexState::Normal);
    }

    #[test]
    fn nested_template_depth() {
        let src = "`x ${ `y` } z`";
        let inner = src.find('y').unwrap();
        assert_eq!(classify(src, inner), LexState::InTemplate(2));
        let z = src.find('z').unwrap();
        assert_eq!(classify(src, z), LexState::InTemplate(1));
    }

    #[test]
    fn one_level_of_inner_braces_is_tracked() {
        let src = "`${ {a: 1}.a } t`";
        let t = src.rfind('t').unwrap();
        assert_eq!(classify(src, t), LexState::InTemplate(1));
    }

    #[test]
    fn two_levels_of_inner_braces_close_early() {
        let src = "`${ {a: {b: 1}} } t`";
        // The second `}` is taken as the interpolation's end.
        let second_close = src.find("}}").unwrap() + 1;
        assert_eq!(classify(src, second_close), LexState::InTemplate(1));
    }

    #[test]
    fn escaped_interpolation_opener_stays_text() {
        let src = r"`\${a}` b";
        assert_eq!(classify(src, 4), LexState::InTemplate(1));
        assert_eq!(classify(src, 8), LexState::Normal);
    }

    #[test]
    fn resumable_scanner_matches_fresh_classification() {
        let src = "x('a') /* c */ `t ${y}` // z\nw";
        let mut scanner = LexScanner::new(src);
        for offset in 0..src.len() {
            assert_eq!(scanner.state_at(offset), classify(src, offset), "offset {offset}");
        }
    }

    #[test]
    fn offset_past_end_reports_final_state() {
        assert_eq!(classify("a /* open", 100), LexState::InBlockComment);
        assert_eq!(classify("a", 5), LexState::Normal);
    }
}
