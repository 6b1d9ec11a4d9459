//! The interpreter: evaluation driver, procedure calls, error state, and the
//! embedding API.
//!
//! Everything-is-a-string evaluation: each command's words resolve to values
//! (literal reuse, variable read, dict-sugar read, nested evaluation) and
//! multi-token words interpolate left-to-right into one fresh value. Command
//! dispatch goes through the epoch-checked name cache, falling back to the
//! configured `unknown` handler when resolution fails.

use std::{rc::Rc, time::Instant};

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    commands,
    flow::{EvalResult, FlowResult, Interrupt, JimError, ReturnCode, StackFrame},
    frame::CallFrame,
    heap::{Heap, ObjId},
    intern::StrPool,
    io::{OutputWriter, StdOutput},
    parse::SubstFlags,
    reference::RefRecord,
    registry::{Cmd, ProcDef, Registry},
    script::{ScriptCommand, ScriptRep, ScriptToken, ScriptWord, WordPart},
    value::{CmdNameRep, Repr, SourceInfo, lossy},
};

pub use crate::registry::HostFn;

/// Procedure-call nesting limit; deep recursion fails with a script error
/// rather than exhausting the native stack.
#[cfg(not(debug_assertions))]
pub(crate) const MAX_NESTING_DEPTH: u32 = 10_000;
/// Debug stack frames are much larger, so the limit is lower.
#[cfg(debug_assertions)]
pub(crate) const MAX_NESTING_DEPTH: u32 = 200;

/// One interpreter instance: value arena, callframes, command registry,
/// reference table, and error state. Single-threaded; independent instances
/// share nothing.
pub struct Interp {
    pub(crate) heap: Heap,
    pub(crate) pool: StrPool,
    pub(crate) frames: Vec<CallFrame>,
    /// Index of the active frame; `uplevel` moves it without popping.
    pub(crate) current: usize,
    pub(crate) registry: Registry,
    pub(crate) references: AHashMap<u64, RefRecord>,
    pub(crate) ref_next_id: u64,
    pub(crate) last_collect_id: u64,
    pub(crate) last_collect_time: Instant,
    /// Re-entry guard: a finalizer that allocates references must not start
    /// a nested collection.
    pub(crate) collecting: bool,
    frame_uid_counter: u64,
    nesting: u32,
    pub(crate) out: Box<dyn OutputWriter>,
    /// The most recent command result, for embedders.
    pub(crate) result: ObjId,
    /// Latches on the first failure of an evaluation so nested unwinding
    /// does not re-reset the trace.
    pub(crate) error_flag: bool,
    /// Source position of the most recent failing command at the level the
    /// error is currently unwinding through.
    pub(crate) error_loc: (Option<Rc<str>>, u32),
    pub(crate) trace: Vec<StackFrame>,
    /// Command invoked when dispatch fails to resolve a name.
    pub(crate) unknown_name: Vec<u8>,
}

impl Interp {
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let result = heap.new_empty();
        let mut interp = Self {
            heap,
            pool: StrPool::default(),
            frames: vec![CallFrame::new(0, 0, 0, Vec::new())],
            current: 0,
            registry: Registry::default(),
            references: AHashMap::new(),
            ref_next_id: 0,
            last_collect_id: 0,
            last_collect_time: Instant::now(),
            collecting: false,
            frame_uid_counter: 0,
            nesting: 0,
            out: Box::new(StdOutput),
            result,
            error_flag: false,
            error_loc: (None, 0),
            trace: Vec::new(),
            unknown_name: b"unknown".to_vec(),
        };
        commands::register_core_commands(&mut interp);
        let libpath = interp.heap.new_str(".");
        interp
            .set_var_raw(b"jim::libpath", libpath)
            .expect("setting a plain global cannot fail");
        interp
    }

    pub(crate) fn next_frame_uid(&mut self) -> u64 {
        self.frame_uid_counter += 1;
        self.frame_uid_counter
    }

    // ---- public embedding API ----------------------------------------

    /// Evaluates a script, returning its result string.
    pub fn eval(&mut self, src: &str) -> Result<String, JimError> {
        self.eval_source(src, None)
    }

    /// Evaluates a script with file attribution for error positions.
    pub fn eval_named(&mut self, src: &str, file: &str) -> Result<String, JimError> {
        self.eval_source(src, Some(file))
    }

    fn eval_source(&mut self, src: &str, file: Option<&str>) -> Result<String, JimError> {
        self.error_flag = false;
        let script = match file {
            Some(name) => self.heap.alloc(
                Some(src.as_bytes().to_vec()),
                Repr::Source(SourceInfo { file: Rc::from(name), line: 1 }),
            ),
            None => self.heap.new_str(src),
        };
        let outcome = self.eval_obj(script);
        self.heap.dec_ref(script);
        match outcome {
            Ok(value) | Err(Interrupt::Return { value, .. }) => {
                self.store_result(value);
                Ok(self.result())
            }
            Err(Interrupt::Break) => Err(self.plain_error("invoked \"break\" outside of a loop")),
            Err(Interrupt::Continue) => Err(self.plain_error("invoked \"continue\" outside of a loop")),
            Err(Interrupt::Error(msg)) => {
                let message = lossy(&msg).into_owned();
                let value = self.heap.new_string(msg.into_vec());
                self.store_result(value);
                Err(JimError {
                    message,
                    stack_trace: self.trace.clone(),
                    exit_code: None,
                })
            }
            Err(Interrupt::Exit(code)) => Err(JimError::exit(code)),
        }
    }

    fn plain_error(&self, message: &str) -> JimError {
        JimError { message: message.to_owned(), stack_trace: Vec::new(), exit_code: None }
    }

    /// The interpreter result as a string.
    pub fn result(&mut self) -> String {
        let id = self.result;
        lossy(self.heap.get_string(id)).into_owned()
    }

    /// Replaces the interpreter result.
    pub fn set_result(&mut self, value: &str) {
        let obj = self.heap.new_str(value);
        self.store_result(obj);
    }

    /// Stack trace of the most recent error, innermost frame first.
    #[must_use]
    pub fn stack_trace(&self) -> &[StackFrame] {
        &self.trace
    }

    /// Sets a variable in the current scope.
    pub fn set_var(&mut self, name: &str, value: &str) -> Result<(), JimError> {
        let obj = self.heap.new_str(value);
        match self.set_var_raw(name.as_bytes(), obj) {
            Ok(()) => Ok(()),
            Err(Interrupt::Error(msg)) => Err(self.plain_error(&lossy(&msg))),
            Err(_) => unreachable!("variable writes raise only errors"),
        }
    }

    /// Reads a variable from the current scope.
    pub fn get_var(&mut self, name: &str) -> Option<String> {
        match self.get_var_borrowed(name.as_bytes()) {
            Ok(Some(id)) => Some(lossy(self.heap.get_string(id)).into_owned()),
            _ => None,
        }
    }

    /// Registers (or replaces) a host command.
    pub fn register_command(&mut self, name: &str, handler: HostFn) {
        if let Some(old) = self.registry.insert(name.as_bytes(), Cmd::Host(handler)) {
            self.heap.release_cmd(old);
        }
    }

    /// Redirects `puts` output.
    pub fn set_output(&mut self, out: Box<dyn OutputWriter>) {
        self.out = out;
    }

    /// Runs a reference collection; returns the number of references
    /// reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        self.collect_references()
    }

    pub(crate) fn store_result(&mut self, value: ObjId) {
        let old = std::mem::replace(&mut self.result, value);
        self.heap.dec_ref(old);
    }

    // ---- evaluation --------------------------------------------------

    /// Evaluates a script value. A pure list (no string rep) dispatches its
    /// elements directly, skipping the parser.
    pub(crate) fn eval_obj(&mut self, script: ObjId) -> EvalResult {
        if self.heap.get(script).bytes.is_none() && matches!(self.heap.get(script).repr, Repr::List(_)) {
            let elements = self.heap.list_elements(script);
            if elements.is_empty() {
                return Ok(self.heap.new_empty());
            }
            self.heap.inc_ref(script);
            for &element in &elements {
                self.heap.inc_ref(element);
            }
            let result = self.eval_vector(&elements);
            for &element in &elements {
                self.heap.dec_ref(element);
            }
            self.heap.dec_ref(script);
            return result;
        }
        self.heap.inc_ref(script);
        let rep = self.heap.get_script_rep(script);
        let result = self.eval_script_rep(&rep);
        self.heap.release_script_rep(rep);
        self.heap.dec_ref(script);
        result
    }

    fn eval_script_rep(&mut self, rep: &ScriptRep) -> EvalResult {
        let mut result = self.heap.new_empty();
        for command in &rep.commands {
            let argv = match self.build_argv(command) {
                Ok(argv) => argv,
                Err(e) => {
                    self.heap.dec_ref(result);
                    self.note_interrupt(&e, rep.file.clone(), command.line);
                    return Err(e);
                }
            };
            if argv.is_empty() {
                continue;
            }
            let outcome = self.eval_vector(&argv);
            for &arg in &argv {
                self.heap.dec_ref(arg);
            }
            match outcome {
                Ok(value) => {
                    self.heap.dec_ref(result);
                    result = value;
                }
                Err(e) => {
                    self.heap.dec_ref(result);
                    self.note_interrupt(&e, rep.file.clone(), command.line);
                    return Err(e);
                }
            }
        }
        Ok(result)
    }

    /// Records where an error passed through this evaluation level; the
    /// trace resets once per latched error and each procedure boundary reads
    /// the innermost location recorded below it.
    fn note_interrupt(&mut self, interrupt: &Interrupt, file: Option<Rc<str>>, line: u32) {
        if matches!(interrupt, Interrupt::Error(_)) {
            if !self.error_flag {
                self.error_flag = true;
                self.trace.clear();
            }
            self.error_loc = (file, line);
        }
    }

    fn build_argv(&mut self, command: &ScriptCommand) -> FlowResult<SmallVec<[ObjId; 8]>> {
        let mut argv: SmallVec<[ObjId; 8]> = SmallVec::new();
        for word in &command.words {
            let value = match self.eval_word(word) {
                Ok(value) => value,
                Err(e) => {
                    for &arg in &argv {
                        self.heap.dec_ref(arg);
                    }
                    return Err(e);
                }
            };
            if word.expand {
                // Splice the word's list elements into the argument vector.
                let elements = self.heap.list_elements(value);
                for &element in &elements {
                    self.heap.inc_ref(element);
                    argv.push(element);
                }
                self.heap.dec_ref(value);
            } else {
                argv.push(value);
            }
        }
        Ok(argv)
    }

    /// Resolves one word to a value: single tokens take the shortcut path,
    /// multi-token words interpolate canonical strings in token order.
    pub(crate) fn eval_word(&mut self, word: &ScriptWord) -> EvalResult {
        match word.tokens.len() {
            0 => Ok(self.heap.new_empty()),
            1 => self.substitute_token(&word.tokens[0]),
            _ => {
                let mut buffer = Vec::new();
                for token in &word.tokens {
                    let value = self.substitute_token(token)?;
                    buffer.extend_from_slice(self.heap.get_string(value));
                    self.heap.dec_ref(value);
                }
                Ok(self.heap.new_string(buffer))
            }
        }
    }

    fn substitute_token(&mut self, token: &ScriptToken) -> EvalResult {
        match token.kind {
            WordPart::Lit => {
                self.heap.inc_ref(token.obj);
                Ok(token.obj)
            }
            WordPart::Var => self.get_var_value_obj(token.obj),
            WordPart::DictSugar => self.dict_sugar_value(token.obj),
            WordPart::Cmd => self.eval_obj(token.obj),
        }
    }

    /// Performs the substitutions of a template value (the `subst` command
    /// and dict-sugar keys).
    pub(crate) fn subst_obj(&mut self, id: ObjId, flags: SubstFlags) -> EvalResult {
        self.heap.inc_ref(id);
        let rep = self.heap.get_subst_rep(id, flags);
        let result = self.eval_word(&rep.commands[0].words[0]);
        self.heap.release_script_rep(rep);
        self.heap.dec_ref(id);
        result
    }

    /// Dispatches a resolved argument vector: `argv[0]` names the command.
    pub(crate) fn eval_vector(&mut self, argv: &[ObjId]) -> EvalResult {
        debug_assert!(!argv.is_empty());
        let Some(cmd) = self.lookup_command(argv[0]) else {
            return self.dispatch_unknown(argv);
        };
        let result = match &cmd {
            Cmd::Native(core) => {
                let core = *core;
                core.call(self, argv)
            }
            Cmd::Host(handler) => {
                let handler = *handler;
                self.call_host(handler, argv)
            }
            Cmd::Proc(def) => {
                let def = Rc::clone(def);
                let result = self.call_proc(&def, argv);
                self.heap.release_cmd(Cmd::Proc(def));
                result
            }
        };
        self.heap.release_cmd(cmd);
        result
    }

    /// Epoch-checked command resolution with caching on the name value.
    fn lookup_command(&mut self, name_id: ObjId) -> Option<Cmd> {
        if let Repr::CmdName(cache) = &self.heap.get(name_id).repr
            && cache.epoch == self.registry.epoch
        {
            return Some(cache.cmd.clone());
        }
        let name = self.heap.get_string(name_id).to_vec();
        let cmd = self.registry.get(&name)?.clone();
        let cache = Repr::CmdName(CmdNameRep { epoch: self.registry.epoch, cmd: cmd.clone() });
        self.heap.set_repr(name_id, cache);
        Some(cmd)
    }

    /// Unknown-command fallback: re-dispatch with the configured handler
    /// name prepended to the original words.
    fn dispatch_unknown(&mut self, argv: &[ObjId]) -> EvalResult {
        let name = self.heap.get_string(argv[0]).to_vec();
        if name != self.unknown_name && self.registry.contains(&self.unknown_name) {
            let prefix = self.heap.new_string(self.unknown_name.clone());
            let mut extended = Vec::with_capacity(argv.len() + 1);
            extended.push(prefix);
            for &arg in argv {
                self.heap.inc_ref(arg);
                extended.push(arg);
            }
            let result = self.eval_vector(&extended);
            for arg in extended {
                self.heap.dec_ref(arg);
            }
            return result;
        }
        Err(Interrupt::error(format!("invalid command name \"{}\"", lossy(&name))))
    }

    fn call_host(&mut self, handler: HostFn, argv: &[ObjId]) -> EvalResult {
        let mut args = Vec::with_capacity(argv.len());
        for &arg in argv {
            args.push(lossy(self.heap.get_string(arg)).into_owned());
        }
        match handler(self, &args) {
            Ok(result) => Ok(self.heap.new_string(result.into_bytes())),
            Err(message) => Err(Interrupt::error(message)),
        }
    }

    /// The procedure call path: arity check, fresh frame, positional
    /// binding plus `args` collection, body evaluation, and return-code
    /// mapping at the boundary.
    pub(crate) fn call_proc(&mut self, def: &Rc<ProcDef>, argv: &[ObjId]) -> EvalResult {
        let supplied = argv.len() - 1;
        let fits = if def.catch_all { supplied >= def.formals.len() } else { supplied == def.formals.len() };
        if !fits {
            let name = lossy(self.heap.get_string(argv[0])).into_owned();
            let usage = lossy(self.heap.get_string(def.arglist)).into_owned();
            let sep = if usage.is_empty() { "" } else { " " };
            return Err(Interrupt::error(format!("wrong # args: should be \"{name}{sep}{usage}\"")));
        }
        if self.nesting >= MAX_NESTING_DEPTH {
            return Err(Interrupt::error("too many nested calls. Infinite recursion?"));
        }
        self.nesting += 1;
        self.push_frame(argv);
        for (i, formal) in def.formals.iter().enumerate() {
            let value = argv[1 + i];
            self.heap.inc_ref(value);
            self.set_var_in_frame(self.current, formal, value);
        }
        if def.catch_all {
            let rest: Vec<ObjId> = argv[1 + def.formals.len()..].to_vec();
            for &value in &rest {
                self.heap.inc_ref(value);
            }
            let list = self.heap.new_list(rest);
            self.set_var_in_frame(self.current, b"args", list);
        }
        let outcome = self.eval_obj(def.body);
        self.pop_frame();
        self.nesting -= 1;
        match outcome {
            Ok(value) => Ok(value),
            // `return` unwinds exactly one level; its `-code` decides what
            // the call site sees.
            Err(Interrupt::Return { code, value }) => match code {
                ReturnCode::Ok => Ok(value),
                ReturnCode::Error => {
                    let msg = self.heap.get_string(value).to_vec();
                    self.heap.dec_ref(value);
                    Err(Interrupt::Error(msg.into_boxed_slice()))
                }
                ReturnCode::Break => {
                    self.heap.dec_ref(value);
                    Err(Interrupt::Break)
                }
                ReturnCode::Continue => {
                    self.heap.dec_ref(value);
                    Err(Interrupt::Continue)
                }
                ReturnCode::Return => Err(Interrupt::Return { code: ReturnCode::Ok, value }),
                ReturnCode::Signal => Err(Interrupt::Return { code: ReturnCode::Signal, value }),
            },
            Err(Interrupt::Error(msg)) => {
                let name = self.heap.get_string(argv[0]).to_vec();
                self.add_stack_frame(&name);
                Err(Interrupt::Error(msg))
            }
            // break/continue pass through a procedure boundary untouched, so
            // loop commands written as procedures cooperate with the
            // caller's loop.
            Err(other) => Err(other),
        }
    }

    fn add_stack_frame(&mut self, proc_name: &[u8]) {
        let (file, line) = (&self.error_loc.0, self.error_loc.1);
        self.trace.push(StackFrame {
            proc_name: lossy(proc_name).into_owned(),
            file: file.as_deref().unwrap_or("").to_owned(),
            line,
        });
    }

    pub(crate) fn push_frame(&mut self, argv: &[ObjId]) {
        for &arg in argv {
            self.heap.inc_ref(arg);
        }
        let uid = self.next_frame_uid();
        let level = self.frames[self.current].level + 1;
        let frame = CallFrame::new(uid, level, self.current, argv.to_vec());
        self.frames.push(frame);
        self.current = self.frames.len() - 1;
    }

    pub(crate) fn pop_frame(&mut self) {
        let frame = self.frames.pop().expect("frame stack underflow");
        self.current = frame.parent;
        for arg in frame.argv {
            self.heap.dec_ref(arg);
        }
        for record in frame.records {
            if let crate::frame::VarRecord::Owned(id) = record {
                self.heap.dec_ref(id);
            }
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
