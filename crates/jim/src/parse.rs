//! Single-pass byte tokenizer for scripts, lists, expressions, and
//! substitution templates.
//!
//! All four dialects share one cursor context; the caller picks the dialect
//! by which `next_*_token` method it drives. Tokens borrow the source and
//! carry the 1-based line they start on. The tokenizer never fails: an
//! unterminated construct runs to end of input and is noted in `missing` so
//! interactive hosts can prompt for more input.

use strum::Display;

/// Token types across all dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum TokenKind {
    /// Whitespace between words of one command.
    Sep,
    /// Command terminator: newline or `;` (plus adjacent whitespace).
    Eol,
    /// Braced literal; no escape processing applies.
    Str,
    /// Literal run; backslash escapes apply at materialization.
    Esc,
    /// `$name` or `${name}`.
    Var,
    /// `$name(key)`; the key part is itself substitutable.
    DictSugar,
    /// `[...]` command substitution body.
    Cmd,
    ExprNumber,
    ExprOperator,
    SubexprStart,
    SubexprEnd,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s [u8],
    pub line: u32,
}

/// Which substitutions a `subst` template performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubstFlags {
    pub backslashes: bool,
    pub commands: bool,
    pub variables: bool,
}

impl Default for SubstFlags {
    fn default() -> Self {
        Self { backslashes: true, commands: true, variables: true }
    }
}

#[derive(Debug)]
pub(crate) struct Tokenizer<'s> {
    src: &'s [u8],
    pos: usize,
    line: u32,
    /// Kind of the previously produced token; a brace or quote only opens a
    /// group at the start of a word.
    last: Option<TokenKind>,
    /// `#` starts a comment only at the start of a line's first word.
    comment_allowed: bool,
    in_quote: bool,
    /// Unterminated construct: the missing close character and the line the
    /// construct opened on.
    pub missing: Option<(u8, u32)>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(src: &'s [u8], first_line: u32) -> Self {
        Self {
            src,
            pos: 0,
            line: first_line,
            last: None,
            comment_allowed: true,
            in_quote: false,
            missing: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if self.peek() == Some(b'\n') {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn note_missing(&mut self, close: u8, open_line: u32) {
        if self.missing.is_none() {
            self.missing = Some((close, open_line));
        }
    }

    fn word_start(&self) -> bool {
        matches!(self.last, None | Some(TokenKind::Sep | TokenKind::Eol))
    }

    fn finish(&mut self, token: Token<'s>) -> Token<'s> {
        self.comment_allowed = match token.kind {
            TokenKind::Eol => true,
            TokenKind::Sep => self.comment_allowed,
            _ => false,
        };
        self.last = Some(token.kind);
        token
    }

    /// Script dialect: words, separators, substitutions, comments.
    pub fn next_script_token(&mut self) -> Option<Token<'s>> {
        loop {
            let Some(c) = self.peek() else {
                if self.in_quote {
                    self.in_quote = false;
                    self.note_missing(b'"', self.line);
                }
                return None;
            };
            if self.in_quote {
                let token = self.quote_chunk();
                return Some(self.finish(token));
            }
            let token = match c {
                b' ' | b'\t' | b'\r' => self.lex_separator(),
                b'\\' if self.at(1) == Some(b'\n') => self.lex_separator(),
                b'\n' | b';' => self.lex_eol(),
                b'[' => self.lex_bracket(),
                b'$' => self.lex_variable(),
                b'#' if self.comment_allowed => {
                    self.skip_comment();
                    continue;
                }
                b'{' if self.word_start() => self.lex_brace(),
                b'"' if self.word_start() => {
                    self.in_quote = true;
                    self.bump();
                    continue;
                }
                _ => self.lex_escaped_run(),
            };
            return Some(self.finish(token));
        }
    }

    /// One chunk of a quoted word: a literal run, a substitution, or the
    /// closing quote (which yields an empty literal the script builder
    /// drops when the word already has content).
    fn quote_chunk(&mut self) -> Token<'s> {
        let src = self.src;
        match self.peek() {
            Some(b'"') => {
                let line = self.line;
                let at = self.pos;
                self.bump();
                self.in_quote = false;
                Token { kind: TokenKind::Esc, text: &src[at..at], line }
            }
            Some(b'[') => self.lex_bracket(),
            Some(b'$') => self.lex_variable(),
            _ => {
                let start = self.pos;
                let line = self.line;
                while let Some(c) = self.peek() {
                    match c {
                        b'"' | b'$' | b'[' => break,
                        b'\\' if self.at(1).is_some() => {
                            self.bump();
                            self.bump();
                        }
                        _ => self.bump(),
                    }
                }
                Token { kind: TokenKind::Esc, text: &src[start..self.pos], line }
            }
        }
    }

    fn lex_separator(&mut self) -> Token<'s> {
        let src = self.src;
        let start = self.pos;
        let line = self.line;
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => self.bump(),
                Some(b'\\') if self.at(1) == Some(b'\n') => {
                    self.bump();
                    self.bump();
                }
                _ => break,
            }
        }
        Token { kind: TokenKind::Sep, text: &src[start..self.pos], line }
    }

    fn lex_eol(&mut self) -> Token<'s> {
        let src = self.src;
        let start = self.pos;
        let line = self.line;
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\r' | b'\n' | b';' => self.bump(),
                _ => break,
            }
        }
        Token { kind: TokenKind::Eol, text: &src[start..self.pos], line }
    }

    fn lex_bracket(&mut self) -> Token<'s> {
        let src = self.src;
        let open_line = self.line;
        self.bump();
        let start = self.pos;
        let mut level = 1u32;
        while let Some(c) = self.peek() {
            match c {
                b'[' => {
                    level += 1;
                    self.bump();
                }
                b']' => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                    self.bump();
                }
                b'\\' if self.at(1).is_some() => {
                    self.bump();
                    self.bump();
                }
                _ => self.bump(),
            }
        }
        let text = &src[start..self.pos];
        if self.peek() == Some(b']') {
            self.bump();
        } else {
            self.note_missing(b']', open_line);
        }
        Token { kind: TokenKind::Cmd, text, line: open_line }
    }

    fn lex_brace(&mut self) -> Token<'s> {
        let src = self.src;
        let open_line = self.line;
        self.bump();
        let start = self.pos;
        let mut level = 1u32;
        while let Some(c) = self.peek() {
            match c {
                b'{' => {
                    level += 1;
                    self.bump();
                }
                b'}' => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                    self.bump();
                }
                b'\\' if self.at(1).is_some() => {
                    self.bump();
                    self.bump();
                }
                _ => self.bump(),
            }
        }
        let text = &src[start..self.pos];
        if self.peek() == Some(b'}') {
            self.bump();
        } else {
            self.note_missing(b'}', open_line);
        }
        Token { kind: TokenKind::Str, text, line: open_line }
    }

    fn lex_variable(&mut self) -> Token<'s> {
        let src = self.src;
        let line = self.line;
        let dollar = self.pos;
        self.bump();
        if self.peek() == Some(b'{') {
            self.bump();
            let start = self.pos;
            while let Some(c) = self.peek() {
                if c == b'}' {
                    break;
                }
                self.bump();
            }
            let text = &src[start..self.pos];
            if self.peek() == Some(b'}') {
                self.bump();
            } else {
                self.note_missing(b'}', line);
            }
            return Token { kind: TokenKind::Var, text, line };
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b':' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            // A lone `$` is ordinary text.
            return Token { kind: TokenKind::Esc, text: &src[dollar..self.pos], line };
        }
        if self.peek() == Some(b'(') {
            let save_pos = self.pos;
            let save_line = self.line;
            let mut level = 1u32;
            self.bump();
            while let Some(c) = self.peek() {
                match c {
                    b'(' => {
                        level += 1;
                        self.bump();
                    }
                    b')' => {
                        level -= 1;
                        self.bump();
                        if level == 0 {
                            break;
                        }
                    }
                    b'\\' if self.at(1).is_some() => {
                        self.bump();
                        self.bump();
                    }
                    _ => self.bump(),
                }
            }
            if level == 0 {
                return Token { kind: TokenKind::DictSugar, text: &src[start..self.pos], line };
            }
            // Unmatched paren: back out to a plain variable.
            self.pos = save_pos;
            self.line = save_line;
        }
        Token { kind: TokenKind::Var, text: &src[start..self.pos], line }
    }

    fn lex_escaped_run(&mut self) -> Token<'s> {
        let src = self.src;
        let start = self.pos;
        let line = self.line;
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' | b'\n' | b'\r' | b';' | b'$' | b'[' => break,
                b'\\' if self.at(1).is_some() => {
                    self.bump();
                    self.bump();
                }
                _ => self.bump(),
            }
        }
        Token { kind: TokenKind::Esc, text: &src[start..self.pos], line }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            if c == b'\\' && self.at(1).is_some() {
                self.bump();
            }
            self.bump();
        }
    }

    /// List dialect: only whitespace, braces, and quotes are significant.
    pub fn next_list_token(&mut self) -> Option<Token<'s>> {
        let src = self.src;
        let c = self.peek()?;
        let token = match c {
            b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => {
                let start = self.pos;
                let line = self.line;
                while let Some(c) = self.peek() {
                    if c.is_ascii_whitespace() || c == 0x0b {
                        self.bump();
                    } else {
                        break;
                    }
                }
                Token { kind: TokenKind::Sep, text: &src[start..self.pos], line }
            }
            b'{' if self.word_start() => self.lex_brace(),
            b'"' if self.word_start() => {
                let open_line = self.line;
                self.bump();
                let start = self.pos;
                while let Some(c) = self.peek() {
                    match c {
                        b'"' => break,
                        b'\\' if self.at(1).is_some() => {
                            self.bump();
                            self.bump();
                        }
                        _ => self.bump(),
                    }
                }
                let text = &src[start..self.pos];
                if self.peek() == Some(b'"') {
                    self.bump();
                } else {
                    self.note_missing(b'"', open_line);
                }
                Token { kind: TokenKind::Esc, text, line: open_line }
            }
            _ => {
                let start = self.pos;
                let line = self.line;
                while let Some(c) = self.peek() {
                    if c.is_ascii_whitespace() || c == 0x0b {
                        break;
                    }
                    if c == b'\\' && self.at(1).is_some() {
                        self.bump();
                    }
                    self.bump();
                }
                Token { kind: TokenKind::Esc, text: &src[start..self.pos], line }
            }
        };
        Some(self.finish(token))
    }

    /// Expression dialect: script substitutions plus numbers, operators, and
    /// sub-expression parentheses. Whitespace produces no tokens.
    pub fn next_expr_token(&mut self) -> Option<Token<'s>> {
        let src = self.src;
        loop {
            let c = self.peek()?;
            let token = match c {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.bump();
                    continue;
                }
                b'(' => {
                    let line = self.line;
                    let start = self.pos;
                    self.bump();
                    Token { kind: TokenKind::SubexprStart, text: &src[start..self.pos], line }
                }
                b')' => {
                    let line = self.line;
                    let start = self.pos;
                    self.bump();
                    Token { kind: TokenKind::SubexprEnd, text: &src[start..self.pos], line }
                }
                b'[' => self.lex_bracket(),
                b'$' => self.lex_variable(),
                b'{' => self.lex_brace(),
                b'"' => {
                    let open_line = self.line;
                    self.bump();
                    let start = self.pos;
                    while let Some(c) = self.peek() {
                        match c {
                            b'"' => break,
                            b'\\' if self.at(1).is_some() => {
                                self.bump();
                                self.bump();
                            }
                            _ => self.bump(),
                        }
                    }
                    let text = &src[start..self.pos];
                    if self.peek() == Some(b'"') {
                        self.bump();
                    } else {
                        self.note_missing(b'"', open_line);
                    }
                    Token { kind: TokenKind::Esc, text, line: open_line }
                }
                b'0'..=b'9' => self.lex_number(),
                b'.' if self.at(1).is_some_and(|d| d.is_ascii_digit()) => self.lex_number(),
                _ => self.lex_expr_operator(),
            };
            return Some(self.finish(token));
        }
    }

    fn lex_number(&mut self) -> Token<'s> {
        let src = self.src;
        let start = self.pos;
        let line = self.line;
        if self.peek() == Some(b'0')
            && matches!(self.at(1), Some(b'x' | b'X'))
            && self.at(2).is_some_and(|d| d.is_ascii_hexdigit())
        {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                self.bump();
            }
            return Token { kind: TokenKind::ExprNumber, text: &src[start..self.pos], line };
        }
        while self.peek().is_some_and(|d| d.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some(b'.') && self.at(1).is_none_or(|d| d.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|d| d.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let after_sign = matches!(self.at(1), Some(b'+' | b'-'));
            let exp_digit = if after_sign { self.at(2) } else { self.at(1) };
            if exp_digit.is_some_and(|d| d.is_ascii_digit()) {
                self.bump();
                if after_sign {
                    self.bump();
                }
                while self.peek().is_some_and(|d| d.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        Token { kind: TokenKind::ExprNumber, text: &src[start..self.pos], line }
    }

    fn lex_expr_operator(&mut self) -> Token<'s> {
        const MULTI: &[&[u8]] = &[
            b"<<<", b">>>", b"<<", b">>", b"<=", b">=", b"==", b"!=", b"&&", b"||", b"eq", b"ne",
        ];
        let src = self.src;
        let start = self.pos;
        let line = self.line;
        for &op in MULTI {
            if src[self.pos..].starts_with(op) {
                // `eq`/`ne` must not swallow the head of a longer word.
                if op[0].is_ascii_alphabetic()
                    && src.get(self.pos + op.len()).is_some_and(|c| c.is_ascii_alphanumeric())
                {
                    continue;
                }
                for _ in 0..op.len() {
                    self.bump();
                }
                return Token { kind: TokenKind::ExprOperator, text: &src[start..self.pos], line };
            }
        }
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
                self.bump();
            }
        } else {
            self.bump();
        }
        Token { kind: TokenKind::ExprOperator, text: &src[start..self.pos], line }
    }

    /// Substitution dialect: the whole input is one word; separators are
    /// literal text and each substitution class can be disabled.
    pub fn next_subst_token(&mut self, flags: SubstFlags) -> Option<Token<'s>> {
        let src = self.src;
        let c = self.peek()?;
        let token = match c {
            b'[' if flags.commands => self.lex_bracket(),
            b'$' if flags.variables => self.lex_variable(),
            _ => {
                let start = self.pos;
                let line = self.line;
                while let Some(c) = self.peek() {
                    if (c == b'[' && flags.commands) || (c == b'$' && flags.variables) {
                        break;
                    }
                    if c == b'\\' && flags.backslashes && self.at(1).is_some() {
                        self.bump();
                    }
                    self.bump();
                }
                let kind = if flags.backslashes { TokenKind::Esc } else { TokenKind::Str };
                Token { kind, text: &src[start..self.pos], line }
            }
        };
        Some(self.finish(token))
    }
}

/// Applies backslash escapes; the result is never longer than the input.
pub(crate) fn unescape(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let c = src[i];
        if c != b'\\' || i + 1 >= src.len() {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        match src[i] {
            b'a' => {
                out.push(0x07);
                i += 1;
            }
            b'b' => {
                out.push(0x08);
                i += 1;
            }
            b'f' => {
                out.push(0x0c);
                i += 1;
            }
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'v' => {
                out.push(0x0b);
                i += 1;
            }
            b'\n' => {
                // Line continuation collapses to a single space.
                out.push(b' ');
                i += 1;
            }
            b'x' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match src.get(i + 1 + digits) {
                        Some(d) if d.is_ascii_hexdigit() => {
                            value = value * 16 + u32::from((*d as char).to_digit(16).expect("hex digit"));
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                if digits > 0 {
                    out.push(value as u8);
                    i += 1 + digits;
                } else {
                    out.push(b'x');
                    i += 1;
                }
            }
            d @ b'0'..=b'7' => {
                let mut value = u32::from(d - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match src.get(i + digits) {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(value as u8);
                i += digits;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

/// Splits list source text into element byte strings.
pub(crate) fn parse_list_elements(src: &[u8]) -> Vec<Vec<u8>> {
    let mut tokenizer = Tokenizer::new(src, 1);
    let mut elements = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    while let Some(token) = tokenizer.next_list_token() {
        match token.kind {
            TokenKind::Sep => {
                if let Some(element) = current.take() {
                    elements.push(element);
                }
            }
            TokenKind::Str => current.get_or_insert_with(Vec::new).extend_from_slice(token.text),
            TokenKind::Esc => {
                let unescaped = unescape(token.text);
                current.get_or_insert_with(Vec::new).extend_from_slice(&unescaped);
            }
            _ => unreachable!("list dialect produces only SEP/STR/ESC"),
        }
    }
    if let Some(element) = current {
        elements.push(element);
    }
    elements
}

/// Dialect selector for [`tokenize_dump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDialect {
    Script,
    Expression,
    Subst,
}

/// Renders the token stream of `src` one token per line: kind, line number,
/// and text. Used by the CLI's `--parse*` modes.
#[must_use]
pub fn tokenize_dump(src: &str, dialect: TokenDialect) -> String {
    use std::fmt::Write as _;

    let mut tokenizer = Tokenizer::new(src.as_bytes(), 1);
    let mut out = String::new();
    loop {
        let token = match dialect {
            TokenDialect::Script => tokenizer.next_script_token(),
            TokenDialect::Expression => tokenizer.next_expr_token(),
            TokenDialect::Subst => tokenizer.next_subst_token(SubstFlags::default()),
        };
        let Some(token) = token else { break };
        let _ = writeln!(
            out,
            "{:<14} {:>4}  {:?}",
            token.kind.to_string(),
            token.line,
            String::from_utf8_lossy(token.text)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn script_tokens(src: &str) -> Vec<(TokenKind, String)> {
        let mut tokenizer = Tokenizer::new(src.as_bytes(), 1);
        let mut out = Vec::new();
        while let Some(t) = tokenizer.next_script_token() {
            out.push((t.kind, String::from_utf8_lossy(t.text).into_owned()));
        }
        out
    }

    #[test]
    fn words_and_separators() {
        assert_eq!(
            script_tokens("set x 1"),
            vec![
                (TokenKind::Esc, "set".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::Esc, "x".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::Esc, "1".into()),
            ]
        );
    }

    #[test]
    fn braces_are_raw() {
        assert_eq!(
            script_tokens("set x {a $b [c]}"),
            vec![
                (TokenKind::Esc, "set".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::Esc, "x".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::Str, "a $b [c]".into()),
            ]
        );
    }

    #[test]
    fn nested_braces() {
        assert_eq!(script_tokens("{a {b} c}"), vec![(TokenKind::Str, "a {b} c".into())]);
    }

    #[test]
    fn quotes_substitute() {
        assert_eq!(
            script_tokens("\"a $b c\""),
            vec![
                (TokenKind::Esc, "a ".into()),
                (TokenKind::Var, "b".into()),
                (TokenKind::Esc, " c".into()),
                (TokenKind::Esc, String::new()),
            ]
        );
    }

    #[test]
    fn variables_and_sugar() {
        assert_eq!(
            script_tokens("$a $a(k) ${odd name}"),
            vec![
                (TokenKind::Var, "a".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::DictSugar, "a(k)".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::Var, "odd name".into()),
            ]
        );
    }

    #[test]
    fn bare_dollar_is_literal() {
        assert_eq!(script_tokens("$"), vec![(TokenKind::Esc, "$".into())]);
    }

    #[test]
    fn command_substitution_nests() {
        assert_eq!(script_tokens("[a [b] c]"), vec![(TokenKind::Cmd, "a [b] c".into())]);
    }

    #[test]
    fn comments_only_after_eol() {
        assert_eq!(
            script_tokens("# full line\nputs x"),
            vec![
                (TokenKind::Eol, "\n".into()),
                (TokenKind::Esc, "puts".into()),
                (TokenKind::Sep, " ".into()),
                (TokenKind::Esc, "x".into()),
            ]
        );
        // Mid-word `#` is ordinary text.
        assert_eq!(script_tokens("puts a#b").last().unwrap().1, "a#b");
    }

    #[test]
    fn eol_collapses_runs() {
        assert_eq!(
            script_tokens("a\n\n;\nb"),
            vec![
                (TokenKind::Esc, "a".into()),
                (TokenKind::Eol, "\n\n;\n".into()),
                (TokenKind::Esc, "b".into()),
            ]
        );
    }

    #[test]
    fn line_numbers_track_newlines() {
        let mut tokenizer = Tokenizer::new(b"a\nb\nc", 1);
        let lines: Vec<u32> = std::iter::from_fn(|| tokenizer.next_script_token())
            .filter(|t| t.kind != TokenKind::Eol)
            .map(|t| t.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn missing_brace_is_noted() {
        let mut tokenizer = Tokenizer::new(b"{open", 1);
        while tokenizer.next_script_token().is_some() {}
        assert_eq!(tokenizer.missing, Some((b'}', 1)));
    }

    #[test]
    fn unescape_standard_escapes() {
        assert_eq!(unescape(b"a\\tb"), b"a\tb");
        assert_eq!(unescape(b"\\x41\\x4 \\xg"), b"A\x04 xg");
        assert_eq!(unescape(b"\\101\\7"), b"A\x07");
        assert_eq!(unescape(b"\\q"), b"q");
        assert_eq!(unescape(b"tail\\"), b"tail\\");
    }

    #[test]
    fn list_elements_split() {
        assert_eq!(
            parse_list_elements(b"a {b c} \"d e\" f\\ g"),
            vec![b"a".to_vec(), b"b c".to_vec(), b"d e".to_vec(), b"f g".to_vec()]
        );
        assert_eq!(parse_list_elements(b"  "), Vec::<Vec<u8>>::new());
        assert_eq!(parse_list_elements(b"{}"), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn expr_tokens() {
        let mut tokenizer = Tokenizer::new(b"1 + $a*(2.5>>3) eq \"x\"", 1);
        let kinds: Vec<TokenKind> = std::iter::from_fn(|| tokenizer.next_expr_token()).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::ExprNumber,
                TokenKind::ExprOperator,
                TokenKind::Var,
                TokenKind::ExprOperator,
                TokenKind::SubexprStart,
                TokenKind::ExprNumber,
                TokenKind::ExprOperator,
                TokenKind::ExprNumber,
                TokenKind::SubexprEnd,
                TokenKind::ExprOperator,
                TokenKind::Esc,
            ]
        );
    }

    #[test]
    fn subst_disables_classes() {
        let flags = SubstFlags { backslashes: true, commands: false, variables: true };
        let mut tokenizer = Tokenizer::new(b"a[b]$c", 1);
        let mut kinds = Vec::new();
        while let Some(t) = tokenizer.next_subst_token(flags) {
            kinds.push((t.kind, String::from_utf8_lossy(t.text).into_owned()));
        }
        assert_eq!(kinds, vec![(TokenKind::Esc, "a[b]".into()), (TokenKind::Var, "c".into())]);
    }
}
