//! Reference commands: `ref`, `getref`, `setref`, `collect`.

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
};

pub(super) fn cmd_ref(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if !matches!(argv.len(), 2 | 3) {
        return Err(wrong_num_args(interp, argv[0], "value ?finalizerCommand?"));
    }
    interp.heap.inc_ref(argv[1]);
    let finalizer = argv.get(2).map(|&f| {
        interp.heap.inc_ref(f);
        f
    });
    let token = interp.new_reference(argv[1], finalizer);
    interp.maybe_collect();
    Ok(token)
}

pub(super) fn cmd_getref(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 2 {
        return Err(wrong_num_args(interp, argv[0], "reference"));
    }
    let ref_id = interp.reference_id(argv[1])?;
    match interp.references.get(&ref_id) {
        Some(record) => {
            let value = record.value;
            interp.heap.inc_ref(value);
            Ok(value)
        }
        None => Err(Interrupt::error(format!("invalid reference id {ref_id}"))),
    }
}

pub(super) fn cmd_setref(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 3 {
        return Err(wrong_num_args(interp, argv[0], "reference newValue"));
    }
    let ref_id = interp.reference_id(argv[1])?;
    if !interp.references.contains_key(&ref_id) {
        return Err(Interrupt::error(format!("invalid reference id {ref_id}")));
    }
    interp.heap.inc_ref(argv[2]);
    let record = interp.references.get_mut(&ref_id).expect("presence checked above");
    let old = std::mem::replace(&mut record.value, argv[2]);
    interp.heap.dec_ref(old);
    interp.heap.inc_ref(argv[2]);
    Ok(argv[2])
}

pub(super) fn cmd_collect(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 1 {
        return Err(wrong_num_args(interp, argv[0], ""));
    }
    let collected = interp.collect_references();
    Ok(interp.heap.new_int(collected as i64))
}
