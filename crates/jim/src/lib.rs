#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors the wire format of 32-bit rotates")]

mod commands;
mod expr;
mod flow;
mod frame;
mod heap;
mod intern;
mod interp;
mod io;
mod parse;
mod reference;
mod registry;
mod script;
mod value;

pub use crate::{
    flow::{JimError, ReturnCode, StackFrame},
    intern::pool_smoke_test,
    interp::{HostFn, Interp},
    io::{CollectOutput, NoOutput, OutputWriter, StdOutput},
    parse::{TokenDialect, tokenize_dump},
};
