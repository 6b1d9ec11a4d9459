//! List commands: `list`, `lindex`, `llength`, `lappend`, `lset`, `lrange`.

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, FlowResult, Interrupt},
    heap::ObjId,
    interp::Interp,
};

pub(super) fn cmd_list(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let elements: Vec<ObjId> = argv[1..].to_vec();
    for &element in &elements {
        interp.heap.inc_ref(element);
    }
    Ok(interp.heap.new_list(elements))
}

pub(super) fn cmd_lindex(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 3 {
        return Err(wrong_num_args(interp, argv[0], "list index"));
    }
    let len = interp.heap.list_len(argv[1]);
    let index = interp.heap.get_index(argv[2])?;
    match index.resolve(len) {
        Some(i) => {
            let element = interp.heap.list_get(argv[1], i).expect("index resolved in range");
            interp.heap.inc_ref(element);
            Ok(element)
        }
        // Out-of-range reads yield the empty string.
        None => Ok(interp.heap.new_empty()),
    }
}

pub(super) fn cmd_llength(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 2 {
        return Err(wrong_num_args(interp, argv[0], "list"));
    }
    let len = interp.heap.list_len(argv[1]);
    Ok(interp.heap.new_int(len as i64))
}

pub(super) fn cmd_lappend(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 3 {
        return Err(wrong_num_args(interp, argv[0], "varName value ?value ...?"));
    }
    let name = interp.heap.get_string(argv[1]).to_vec();
    let target = interp.var_for_update(&name)?;
    for &value in &argv[2..] {
        interp.heap.inc_ref(value);
        interp.heap.list_push(target, value);
    }
    interp.heap.inc_ref(target);
    Ok(target)
}

fn lset_path(interp: &mut Interp, container: ObjId, path: &[ObjId], value: ObjId) -> FlowResult<()> {
    let len = interp.heap.list_len(container);
    let index = interp.heap.get_index(path[0])?;
    let Some(i) = index.resolve(len) else {
        return Err(Interrupt::error("list index out of range"));
    };
    if path.len() == 1 {
        interp.heap.inc_ref(value);
        interp.heap.list_replace(container, i, value);
        return Ok(());
    }
    let child = interp.heap.list_get(container, i).expect("index resolved in range");
    let child = if interp.heap.is_shared(child) {
        let copy = interp.heap.dup_obj(child);
        interp.heap.list_replace(container, i, copy);
        copy
    } else {
        // Mutating the nested list changes this one's string form too.
        interp.heap.invalidate_string(container);
        child
    };
    lset_path(interp, child, &path[1..], value)
}

pub(super) fn cmd_lset(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 4 {
        return Err(wrong_num_args(interp, argv[0], "varName index ?index ...? value"));
    }
    let name = interp.heap.get_string(argv[1]).to_vec();
    let target = interp.var_for_update(&name)?;
    lset_path(interp, target, &argv[2..argv.len() - 1], argv[argv.len() - 1])?;
    interp.heap.inc_ref(target);
    Ok(target)
}

pub(super) fn cmd_lrange(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 4 {
        return Err(wrong_num_args(interp, argv[0], "list first last"));
    }
    let len = interp.heap.list_len(argv[1]);
    let first = interp.heap.get_index(argv[2])?.effective(len).max(0);
    let last = interp.heap.get_index(argv[3])?.effective(len).min(len as i64 - 1);
    if first > last || len == 0 {
        return Ok(interp.heap.new_list(Vec::new()));
    }
    let mut elements = Vec::with_capacity((last - first + 1) as usize);
    for i in first..=last {
        let element = interp.heap.list_get(argv[1], i as usize).expect("clamped index in range");
        interp.heap.inc_ref(element);
        elements.push(element);
    }
    Ok(interp.heap.new_list(elements))
}
