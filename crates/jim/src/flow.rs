//! Completion codes and the control-flow channel of the evaluator.
//!
//! Every command evaluation completes with a value or an [`Interrupt`]. The
//! interrupt carries non-local control flow (errors, `return`, `break`,
//! `continue`, `exit`) up through the evaluator until some construct absorbs
//! it: `catch` absorbs everything, loops absorb break/continue, and a
//! procedure boundary unwinds exactly one `return`.

use std::{error::Error, fmt};

use strum::{Display, EnumString, IntoStaticStr};

use crate::heap::ObjId;

/// Script-visible completion codes.
///
/// The numeric values are the ones `catch` reports and `return -code`
/// accepts. `Signal` is reserved for hosts that deliver asynchronous
/// interruptions through the return-code channel; the core never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ReturnCode {
    Ok,
    Error,
    Return,
    Break,
    Continue,
    Signal,
}

impl ReturnCode {
    /// The numeric form reported by `catch`.
    #[must_use]
    pub fn as_int(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::Return => 2,
            Self::Break => 3,
            Self::Continue => 4,
            Self::Signal => 5,
        }
    }

    /// Inverse of [`ReturnCode::as_int`].
    #[must_use]
    pub fn from_int(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::Return),
            3 => Some(Self::Break),
            4 => Some(Self::Continue),
            5 => Some(Self::Signal),
            _ => None,
        }
    }
}

/// Non-local control flow raised by a command.
///
/// `Error` carries the message bytes; the stack trace accumulates on the
/// interpreter as the interrupt unwinds. `Return` carries the code that takes
/// effect once a procedure boundary absorbs it (`return -code break` makes
/// the *caller* break).
#[derive(Debug)]
pub(crate) enum Interrupt {
    Error(Box<[u8]>),
    Return { code: ReturnCode, value: ObjId },
    Break,
    Continue,
    Exit(i64),
}

impl Interrupt {
    pub(crate) fn error(msg: impl Into<Vec<u8>>) -> Self {
        Self::Error(msg.into().into_boxed_slice())
    }
}

/// Result of evaluating a script, command, or expression.
///
/// The `Ok` value is a fresh reference: ownership of one refcount transfers
/// to the caller, which must release it.
pub(crate) type EvalResult = Result<ObjId, Interrupt>;

/// Result of an internal operation that can interrupt evaluation.
pub(crate) type FlowResult<T> = Result<T, Interrupt>;

/// One level of the error stack trace: the procedure that was executing and
/// the source position of the failing command inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Procedure name, or an empty string for top-level code.
    pub proc_name: String,
    /// Source file, or an empty string when the script had no file.
    pub file: String,
    /// 1-based source line.
    pub line: u32,
}

/// Error returned by the public evaluation entry points.
///
/// Also doubles as the `exit` channel: a script calling `exit N` surfaces as
/// a `JimError` with `exit_code` set and an empty message.
#[derive(Debug, Clone)]
pub struct JimError {
    pub message: String,
    pub stack_trace: Vec<StackFrame>,
    /// Set when the script terminated via `exit`; the message is empty.
    pub exit_code: Option<i32>,
}

impl JimError {
    pub(crate) fn exit(code: i64) -> Self {
        Self {
            message: String::new(),
            stack_trace: Vec::new(),
            exit_code: Some(code as i32),
        }
    }
}

impl fmt::Display for JimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.exit_code {
            return write!(f, "exit {code}");
        }
        write!(f, "{}", self.message)?;
        for frame in &self.stack_trace {
            let name = if frame.proc_name.is_empty() { "<script>" } else { &frame.proc_name };
            let file = if frame.file.is_empty() { "?" } else { &frame.file };
            write!(f, "\n    at {name} ({file}:{})", frame.line)?;
        }
        Ok(())
    }
}

impl Error for JimError {}
