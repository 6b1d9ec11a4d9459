//! The built-in command set.
//!
//! Every core command is a variant of [`CoreCommand`]; the registry maps its
//! script name to the variant and dispatch is one match. Grouped submodules
//! hold the implementations.

mod arith;
mod binding;
mod control;
mod dict;
mod list;
mod meta;
mod output;
mod refs;
mod string;

use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    registry::Cmd,
    value::lossy,
};

pub(crate) use string::glob_match;

/// Interpreter-native commands, named by their lowercase serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum CoreCommand {
    // binding
    Set,
    Unset,
    Incr,
    Upvar,
    Global,
    Proc,
    Rename,
    // control flow
    If,
    While,
    For,
    Foreach,
    Break,
    Continue,
    Return,
    Catch,
    Error,
    // lists
    List,
    Lindex,
    Llength,
    Lappend,
    Lset,
    Lrange,
    // strings
    Append,
    #[strum(serialize = "string")]
    StringCmd,
    // dicts
    Dict,
    Array,
    // computation
    Expr,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Times,
    #[strum(serialize = "/")]
    Divide,
    // meta
    Eval,
    Uplevel,
    Subst,
    Info,
    Debug,
    // references
    Ref,
    Getref,
    Setref,
    Collect,
    // io / process
    Puts,
    Exit,
}

impl CoreCommand {
    pub(crate) fn call(self, interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
        match self {
            Self::Set => binding::cmd_set(interp, argv),
            Self::Unset => binding::cmd_unset(interp, argv),
            Self::Incr => binding::cmd_incr(interp, argv),
            Self::Upvar => binding::cmd_upvar(interp, argv),
            Self::Global => binding::cmd_global(interp, argv),
            Self::Proc => binding::cmd_proc(interp, argv),
            Self::Rename => binding::cmd_rename(interp, argv),
            Self::If => control::cmd_if(interp, argv),
            Self::While => control::cmd_while(interp, argv),
            Self::For => control::cmd_for(interp, argv),
            Self::Foreach => control::cmd_foreach(interp, argv),
            Self::Break => control::cmd_break(interp, argv),
            Self::Continue => control::cmd_continue(interp, argv),
            Self::Return => control::cmd_return(interp, argv),
            Self::Catch => control::cmd_catch(interp, argv),
            Self::Error => control::cmd_error(interp, argv),
            Self::List => list::cmd_list(interp, argv),
            Self::Lindex => list::cmd_lindex(interp, argv),
            Self::Llength => list::cmd_llength(interp, argv),
            Self::Lappend => list::cmd_lappend(interp, argv),
            Self::Lset => list::cmd_lset(interp, argv),
            Self::Lrange => list::cmd_lrange(interp, argv),
            Self::Append => string::cmd_append(interp, argv),
            Self::StringCmd => string::cmd_string(interp, argv),
            Self::Dict => dict::cmd_dict(interp, argv),
            Self::Array => dict::cmd_array(interp, argv),
            Self::Expr => arith::cmd_expr(interp, argv),
            Self::Plus => arith::cmd_plus(interp, argv),
            Self::Minus => arith::cmd_minus(interp, argv),
            Self::Times => arith::cmd_times(interp, argv),
            Self::Divide => arith::cmd_divide(interp, argv),
            Self::Eval => meta::cmd_eval(interp, argv),
            Self::Uplevel => meta::cmd_uplevel(interp, argv),
            Self::Subst => meta::cmd_subst(interp, argv),
            Self::Info => meta::cmd_info(interp, argv),
            Self::Debug => meta::cmd_debug(interp, argv),
            Self::Ref => refs::cmd_ref(interp, argv),
            Self::Getref => refs::cmd_getref(interp, argv),
            Self::Setref => refs::cmd_setref(interp, argv),
            Self::Collect => refs::cmd_collect(interp, argv),
            Self::Puts => output::cmd_puts(interp, argv),
            Self::Exit => output::cmd_exit(interp, argv),
        }
    }
}

/// Installs every core command into the registry.
pub(crate) fn register_core_commands(interp: &mut Interp) {
    for cmd in CoreCommand::iter() {
        let name: &'static str = cmd.into();
        if let Some(old) = interp.registry.insert(name.as_bytes(), Cmd::Native(cmd)) {
            interp.heap.release_cmd(old);
        }
    }
}

/// The standard arity-violation error.
pub(crate) fn wrong_num_args(interp: &mut Interp, argv0: ObjId, usage: &str) -> Interrupt {
    let name = lossy(interp.heap.get_string(argv0)).into_owned();
    if usage.is_empty() {
        Interrupt::error(format!("wrong # args: should be \"{name}\""))
    } else {
        Interrupt::error(format!("wrong # args: should be \"{name} {usage}\""))
    }
}
