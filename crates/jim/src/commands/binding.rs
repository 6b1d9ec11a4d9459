//! Variable and command binding: `set`, `unset`, `incr`, `upvar`, `global`,
//! `proc`, `rename`.

use std::rc::Rc;

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    registry::{Cmd, ProcDef},
    value::lossy,
};

pub(super) fn cmd_set(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    match argv.len() {
        2 => interp.get_var_value_obj(argv[1]),
        3 => {
            let name = interp.heap.get_string(argv[1]).to_vec();
            interp.heap.inc_ref(argv[2]);
            interp.set_var_raw(&name, argv[2])?;
            interp.heap.inc_ref(argv[2]);
            Ok(argv[2])
        }
        _ => Err(wrong_num_args(interp, argv[0], "varName ?newValue?")),
    }
}

pub(super) fn cmd_unset(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "varName ?varName ...?"));
    }
    for &name_obj in &argv[1..] {
        let name = interp.heap.get_string(name_obj).to_vec();
        interp.unset_var_raw(&name)?;
    }
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_incr(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if !matches!(argv.len(), 2 | 3) {
        return Err(wrong_num_args(interp, argv[0], "varName ?increment?"));
    }
    let delta = if argv.len() == 3 { interp.heap.get_int(argv[2])? } else { 1 };
    let name = interp.heap.get_string(argv[1]).to_vec();
    let current = interp.get_var_raw(&name)?;
    let value = interp.heap.get_int(current);
    interp.heap.dec_ref(current);
    let value = value?;
    let result = interp.heap.new_int(value.wrapping_add(delta));
    interp.heap.inc_ref(result);
    interp.set_var_raw(&name, result)?;
    Ok(result)
}

fn looks_like_level(spec: &[u8]) -> bool {
    spec.first().is_some_and(|&c| c == b'#' || c.is_ascii_digit())
}

pub(super) fn cmd_upvar(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let usage = "?level? otherVar localVar ?otherVar localVar ...?";
    if argv.len() < 3 {
        return Err(wrong_num_args(interp, argv[0], usage));
    }
    let first = interp.heap.get_string(argv[1]).to_vec();
    let (target, mut i) = if looks_like_level(&first) {
        (interp.resolve_level(&first)?, 2)
    } else {
        (interp.resolve_level(b"1")?, 1)
    };
    if argv.len() == i || (argv.len() - i) % 2 != 0 {
        return Err(wrong_num_args(interp, argv[0], usage));
    }
    while i < argv.len() {
        let other = interp.heap.get_string(argv[i]).to_vec();
        let local = interp.heap.get_string(argv[i + 1]).to_vec();
        interp.make_link(&local, target, &other)?;
        i += 2;
    }
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_global(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "varName ?varName ...?"));
    }
    if interp.current != 0 {
        for &name_obj in &argv[1..] {
            let name = interp.heap.get_string(name_obj).to_vec();
            interp.make_link(&name, 0, &name)?;
        }
    }
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_proc(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 4 {
        return Err(wrong_num_args(interp, argv[0], "name arglist body"));
    }
    let elements = interp.heap.list_elements(argv[2]);
    let mut formals: Vec<Box<[u8]>> = Vec::with_capacity(elements.len());
    let mut catch_all = false;
    for (i, &element) in elements.iter().enumerate() {
        let formal = interp.heap.get_string(element).to_vec();
        if formal == b"args" && i == elements.len() - 1 {
            catch_all = true;
        } else {
            formals.push(formal.into_boxed_slice());
        }
    }
    interp.heap.inc_ref(argv[2]);
    interp.heap.inc_ref(argv[3]);
    let def = ProcDef { arglist: argv[2], body: argv[3], formals, catch_all };
    let name = interp.heap.get_string(argv[1]).to_vec();
    if let Some(old) = interp.registry.insert(&name, Cmd::Proc(Rc::new(def))) {
        interp.heap.release_cmd(old);
    }
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_rename(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 3 {
        return Err(wrong_num_args(interp, argv[0], "oldName newName"));
    }
    let old_name = interp.heap.get_string(argv[1]).to_vec();
    let new_name = interp.heap.get_string(argv[2]).to_vec();
    let Some(cmd) = interp.registry.remove(&old_name) else {
        return Err(Interrupt::error(format!("invalid command name \"{}\"", lossy(&old_name))));
    };
    if new_name.is_empty() {
        // Renaming to the empty string deletes.
        interp.heap.release_cmd(cmd);
    } else if let Some(previous) = interp.registry.insert(&new_name, cmd) {
        interp.heap.release_cmd(previous);
    }
    Ok(interp.heap.new_empty())
}
