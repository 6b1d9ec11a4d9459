//! Host-facing commands: `puts` and `exit`.

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
};

pub(super) fn cmd_puts(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let text_index = match argv.len() {
        2 => 1,
        3 if interp.heap.compare_string_immediate(argv[1], "-nonewline") => 2,
        _ => return Err(wrong_num_args(interp, argv[0], "?-nonewline? string")),
    };
    let text = interp.heap.get_string(argv[text_index]).to_vec();
    interp.out.write_bytes(&text);
    if text_index == 1 {
        interp.out.write_bytes(b"\n");
    }
    interp.out.flush();
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_exit(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let code = match argv.len() {
        1 => 0,
        2 => interp.heap.get_int(argv[1])?,
        _ => return Err(wrong_num_args(interp, argv[0], "?exitCode?")),
    };
    Err(Interrupt::Exit(code))
}
