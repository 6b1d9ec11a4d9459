//! Compiled scripts: the parse-once cache behind every evaluated value.
//!
//! A script value's internal rep is a command list whose words are token
//! sequences; the same structure with `subst` flags set serves the `subst`
//! command (one word spanning the whole input, separators kept literal).
//! Token values are owned by the rep and shared between identical literals,
//! so a procedure body parsed once costs one value per distinct word.
//!
//! The rep is handed out behind `Rc`: an evaluation borrows it by cloning
//! the handle, which keeps the program alive even if the owning value
//! shimmers to another rep mid-walk. Whoever drops the last handle releases
//! the token values (see `Heap::release_script_rep`).

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    heap::{Heap, ObjId},
    parse::{SubstFlags, Token, TokenKind, Tokenizer, unescape},
    value::{Repr, SourceInfo},
};

/// How a token contributes to its word at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WordPart {
    /// Literal text; escapes already applied.
    Lit,
    /// Variable read.
    Var,
    /// Dict-sugar read (`name(key)` with a substitutable key).
    DictSugar,
    /// Nested command evaluation.
    Cmd,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScriptToken {
    pub kind: WordPart,
    pub line: u32,
    pub obj: ObjId,
}

#[derive(Debug)]
pub(crate) struct ScriptWord {
    pub tokens: Vec<ScriptToken>,
    /// The word was prefixed with the braced literal `expand`: its value is
    /// spliced into the argument vector as list elements.
    pub expand: bool,
}

#[derive(Debug)]
pub(crate) struct ScriptCommand {
    pub line: u32,
    pub words: Vec<ScriptWord>,
}

#[derive(Debug)]
pub(crate) struct ScriptRep {
    pub file: Option<Rc<str>>,
    pub commands: Vec<ScriptCommand>,
    /// `Some` when this rep is a substitution template rather than a script.
    pub subst: Option<SubstFlags>,
}

struct ScriptBuilder<'h> {
    heap: &'h mut Heap,
    file: Option<Rc<str>>,
    /// Literal sharing: identical token bytes within one script map to one
    /// value.
    literals: AHashMap<Vec<u8>, ObjId>,
    commands: Vec<ScriptCommand>,
    words: Vec<ScriptWord>,
    current: Vec<(ScriptToken, bool)>,
    cmd_line: u32,
}

impl<'h> ScriptBuilder<'h> {
    fn new(heap: &'h mut Heap, file: Option<Rc<str>>) -> Self {
        Self {
            heap,
            file,
            literals: AHashMap::new(),
            commands: Vec::new(),
            words: Vec::new(),
            current: Vec::new(),
            cmd_line: 1,
        }
    }

    fn make_obj(&mut self, text: Vec<u8>, line: u32) -> ObjId {
        if let Some(&existing) = self.literals.get(&text) {
            self.heap.inc_ref(existing);
            return existing;
        }
        let repr = match &self.file {
            Some(file) => Repr::Source(SourceInfo { file: Rc::clone(file), line }),
            None => Repr::Plain,
        };
        let id = self.heap.alloc(Some(text.clone()), repr);
        self.literals.insert(text, id);
        id
    }

    fn push_part(&mut self, kind: WordPart, text: Vec<u8>, line: u32, braced: bool) {
        // An empty literal continuing a word carries nothing (e.g. the close
        // of a quoted section); a standalone empty word stays.
        if text.is_empty() && kind == WordPart::Lit && !braced && !self.current.is_empty() {
            return;
        }
        if self.words.is_empty() && self.current.is_empty() {
            self.cmd_line = line;
        }
        let obj = self.make_obj(text, line);
        self.current.push((ScriptToken { kind, line, obj }, braced));
    }

    fn flush_word(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut tokens = std::mem::take(&mut self.current);
        let mut expand = false;
        if tokens.len() >= 2 {
            let (first, braced) = tokens[0];
            if braced && first.kind == WordPart::Lit && self.heap.get_string(first.obj) == b"expand" {
                expand = true;
                let (sentinel, _) = tokens.remove(0);
                self.heap.dec_ref(sentinel.obj);
            }
        }
        self.words.push(ScriptWord { tokens: tokens.into_iter().map(|(t, _)| t).collect(), expand });
    }

    fn flush_command(&mut self) {
        self.flush_word();
        if !self.words.is_empty() {
            self.commands.push(ScriptCommand { line: self.cmd_line, words: std::mem::take(&mut self.words) });
        }
    }

    fn token(&mut self, token: &Token<'_>) {
        match token.kind {
            TokenKind::Sep => self.flush_word(),
            TokenKind::Eol => self.flush_command(),
            TokenKind::Str => self.push_part(WordPart::Lit, token.text.to_vec(), token.line, true),
            TokenKind::Esc => self.push_part(WordPart::Lit, unescape(token.text), token.line, false),
            TokenKind::Var => self.push_part(WordPart::Var, token.text.to_vec(), token.line, false),
            TokenKind::DictSugar => self.push_part(WordPart::DictSugar, token.text.to_vec(), token.line, false),
            TokenKind::Cmd => self.push_part(WordPart::Cmd, token.text.to_vec(), token.line, false),
            _ => unreachable!("script dialect does not produce expression tokens"),
        }
    }
}

/// Parses script source into its compiled rep. Script parsing never fails:
/// malformed constructs run to end of input.
pub(crate) fn compile_script(heap: &mut Heap, src: &[u8], file: Option<Rc<str>>, first_line: u32) -> ScriptRep {
    let mut tokenizer = Tokenizer::new(src, first_line);
    let mut builder = ScriptBuilder::new(heap, file);
    while let Some(token) = tokenizer.next_script_token() {
        builder.token(&token);
    }
    builder.flush_command();
    log::trace!("compiled script: {} commands, {} shared literals", builder.commands.len(), builder.literals.len());
    ScriptRep { file: builder.file, commands: builder.commands, subst: None }
}

/// Parses a substitution template: one word spanning the whole input.
pub(crate) fn compile_subst(heap: &mut Heap, src: &[u8], flags: SubstFlags) -> ScriptRep {
    let mut tokenizer = Tokenizer::new(src, 1);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_subst_token(flags) {
        let (kind, text) = match token.kind {
            TokenKind::Str => (WordPart::Lit, token.text.to_vec()),
            TokenKind::Esc => (WordPart::Lit, unescape(token.text)),
            TokenKind::Var => (WordPart::Var, token.text.to_vec()),
            TokenKind::DictSugar => (WordPart::DictSugar, token.text.to_vec()),
            TokenKind::Cmd => (WordPart::Cmd, token.text.to_vec()),
            _ => unreachable!("subst dialect does not produce separators"),
        };
        let obj = heap.alloc(Some(text), Repr::Plain);
        tokens.push(ScriptToken { kind, line: token.line, obj });
    }
    ScriptRep {
        file: None,
        commands: vec![ScriptCommand { line: 1, words: vec![ScriptWord { tokens, expand: false }] }],
        subst: Some(flags),
    }
}

impl Heap {
    /// Borrows the compiled script rep of a value, compiling (and caching it
    /// as the internal rep) on first use. Source-attributed values carry
    /// their file and starting line into the compile.
    pub(crate) fn get_script_rep(&mut self, id: ObjId) -> Rc<ScriptRep> {
        if let Repr::Script(rep) = &self.get(id).repr
            && rep.subst.is_none()
        {
            return Rc::clone(rep);
        }
        let (file, line) = match &self.get(id).repr {
            Repr::Source(info) => (Some(Rc::clone(&info.file)), info.line),
            _ => (None, 1),
        };
        let src = self.get_string(id).to_vec();
        let rep = Rc::new(compile_script(self, &src, file, line));
        self.set_repr(id, Repr::Script(Rc::clone(&rep)));
        rep
    }

    /// Borrows the substitution template rep for the given flags, re-parsing
    /// when the cached rep was built with different flags.
    pub(crate) fn get_subst_rep(&mut self, id: ObjId, flags: SubstFlags) -> Rc<ScriptRep> {
        if let Repr::Script(rep) = &self.get(id).repr
            && rep.subst == Some(flags)
        {
            return Rc::clone(rep);
        }
        let src = self.get_string(id).to_vec();
        let rep = Rc::new(compile_subst(self, &src, flags));
        self.set_repr(id, Repr::Script(Rc::clone(&rep)));
        rep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> (Heap, ScriptRep) {
        let mut heap = Heap::new();
        let rep = compile_script(&mut heap, src.as_bytes(), None, 1);
        (heap, rep)
    }

    fn shape(rep: &ScriptRep) -> Vec<usize> {
        rep.commands.iter().map(|c| c.words.len()).collect()
    }

    #[test]
    fn commands_and_words() {
        let (_, rep) = compile("set x 1\nputs $x; incr x");
        assert_eq!(shape(&rep), vec![3, 2, 2]);
    }

    #[test]
    fn empty_lines_and_comments_produce_nothing() {
        let (_, rep) = compile("\n\n# comment\n\nset a b\n");
        assert_eq!(shape(&rep), vec![3]);
    }

    #[test]
    fn interpolated_word_keeps_token_sequence() {
        let (_, rep) = compile("set x a$b[c]d");
        let word = &rep.commands[0].words[2];
        let kinds: Vec<WordPart> = word.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![WordPart::Lit, WordPart::Var, WordPart::Cmd, WordPart::Lit]);
    }

    #[test]
    fn quoted_word_drops_empty_tail() {
        let (_, rep) = compile("set x \"a $b\"");
        let word = &rep.commands[0].words[2];
        assert_eq!(word.tokens.len(), 2);
    }

    #[test]
    fn empty_quoted_word_survives() {
        let (_, rep) = compile("set x \"\"");
        assert_eq!(rep.commands[0].words.len(), 3);
        assert_eq!(rep.commands[0].words[2].tokens.len(), 1);
    }

    #[test]
    fn expand_prefix_is_detected() {
        let (mut heap, rep) = compile("cmd {expand}$list tail");
        let word = &rep.commands[0].words[1];
        assert!(word.expand);
        assert_eq!(word.tokens.len(), 1);
        assert_eq!(word.tokens[0].kind, WordPart::Var);
        // A lone braced `expand` word is an ordinary argument.
        let rep2 = compile_script(&mut heap, b"cmd {expand}", None, 1);
        assert!(!rep2.commands[0].words[1].expand);
    }

    #[test]
    fn literal_sharing_unifies_identical_tokens() {
        let (_, rep) = compile("set a b; set a c");
        let first = rep.commands[0].words[1].tokens[0].obj;
        let second = rep.commands[1].words[1].tokens[0].obj;
        assert_eq!(first, second);
    }

    #[test]
    fn line_numbers_attach_to_commands() {
        let (_, rep) = compile("a\nb\n\nc");
        let lines: Vec<u32> = rep.commands.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }
}
