//! Control flow: `if`, `while`, `for`, `foreach`, `break`, `continue`,
//! `return`, `catch`, `error`.

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, FlowResult, Interrupt, ReturnCode},
    heap::ObjId,
    interp::Interp,
};

fn condition(interp: &mut Interp, cond: ObjId) -> FlowResult<bool> {
    let value = interp.eval_expr_obj(cond)?;
    let truth = interp.heap.get_boolean(value);
    interp.heap.dec_ref(value);
    truth
}

pub(super) fn cmd_if(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let usage = "condition ?then? trueBody ?elseif ...? ?else? falseBody";
    let mut i = 1;
    loop {
        if i >= argv.len() {
            return Err(wrong_num_args(interp, argv[0], usage));
        }
        let truth = condition(interp, argv[i])?;
        let mut body = i + 1;
        if body < argv.len() && interp.heap.compare_string_immediate(argv[body], "then") {
            body += 1;
        }
        if body >= argv.len() {
            return Err(wrong_num_args(interp, argv[0], usage));
        }
        if truth {
            return interp.eval_obj(argv[body]);
        }
        let mut next = body + 1;
        if next >= argv.len() {
            return Ok(interp.heap.new_empty());
        }
        if interp.heap.compare_string_immediate(argv[next], "elseif") {
            i = next + 1;
            continue;
        }
        if interp.heap.compare_string_immediate(argv[next], "else") {
            next += 1;
        }
        if next != argv.len() - 1 {
            return Err(wrong_num_args(interp, argv[0], usage));
        }
        return interp.eval_obj(argv[next]);
    }
}

pub(super) fn cmd_while(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 3 {
        return Err(wrong_num_args(interp, argv[0], "condition body"));
    }
    while condition(interp, argv[1])? {
        match interp.eval_obj(argv[2]) {
            Ok(value) => interp.heap.dec_ref(value),
            Err(Interrupt::Break) => break,
            Err(Interrupt::Continue) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_for(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 5 {
        return Err(wrong_num_args(interp, argv[0], "start test next body"));
    }
    let started = interp.eval_obj(argv[1])?;
    interp.heap.dec_ref(started);
    while condition(interp, argv[2])? {
        match interp.eval_obj(argv[4]) {
            Ok(value) => interp.heap.dec_ref(value),
            Err(Interrupt::Break) => break,
            // `continue` still runs the `next` script.
            Err(Interrupt::Continue) => {}
            Err(e) => return Err(e),
        }
        let stepped = interp.eval_obj(argv[3])?;
        interp.heap.dec_ref(stepped);
    }
    Ok(interp.heap.new_empty())
}

struct ForeachPair {
    names: Vec<Vec<u8>>,
    list: ObjId,
    len: usize,
}

fn foreach_run(interp: &mut Interp, pairs: &[ForeachPair], body: ObjId, iterations: usize) -> FlowResult<()> {
    for iteration in 0..iterations {
        for pair in pairs {
            for (k, name) in pair.names.iter().enumerate() {
                let index = iteration * pair.names.len() + k;
                let value = match interp.heap.list_get(pair.list, index) {
                    Some(element) if index < pair.len => {
                        interp.heap.inc_ref(element);
                        element
                    }
                    _ => interp.heap.new_empty(),
                };
                interp.set_var_raw(name, value)?;
            }
        }
        match interp.eval_obj(body) {
            Ok(value) => interp.heap.dec_ref(value),
            Err(Interrupt::Break) => return Ok(()),
            Err(Interrupt::Continue) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub(super) fn cmd_foreach(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 4 || argv.len() % 2 != 0 {
        return Err(wrong_num_args(interp, argv[0], "varList list ?varList list ...? body"));
    }
    let body = argv[argv.len() - 1];
    let mut pairs: Vec<ForeachPair> = Vec::new();
    for p in (1..argv.len() - 1).step_by(2) {
        let var_elements = interp.heap.list_elements(argv[p]);
        if var_elements.is_empty() {
            return Err(Interrupt::error("foreach: no variable names"));
        }
        let names: Vec<Vec<u8>> = var_elements
            .iter()
            .map(|&element| interp.heap.get_string(element).to_vec())
            .collect();
        let list = argv[p + 1];
        interp.heap.inc_ref(list);
        let len = interp.heap.list_len(list);
        pairs.push(ForeachPair { names, list, len });
    }
    let iterations = pairs
        .iter()
        .map(|pair| pair.len.div_ceil(pair.names.len()))
        .max()
        .unwrap_or(0);
    let outcome = foreach_run(interp, &pairs, body, iterations);
    for pair in pairs {
        interp.heap.dec_ref(pair.list);
    }
    outcome?;
    Ok(interp.heap.new_empty())
}

pub(super) fn cmd_break(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 1 {
        return Err(wrong_num_args(interp, argv[0], ""));
    }
    Err(Interrupt::Break)
}

pub(super) fn cmd_continue(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 1 {
        return Err(wrong_num_args(interp, argv[0], ""));
    }
    Err(Interrupt::Continue)
}

pub(super) fn cmd_return(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let mut i = 1;
    let mut code = ReturnCode::Ok;
    if i + 1 < argv.len() && interp.heap.compare_string_immediate(argv[i], "-code") {
        code = interp.heap.get_return_code(argv[i + 1])?;
        i += 2;
    }
    let value = match argv.len() - i {
        0 => interp.heap.new_empty(),
        1 => {
            interp.heap.inc_ref(argv[i]);
            argv[i]
        }
        _ => return Err(wrong_num_args(interp, argv[0], "?-code code? ?result?")),
    };
    Err(Interrupt::Return { code, value })
}

pub(super) fn cmd_catch(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if !matches!(argv.len(), 2 | 3) {
        return Err(wrong_num_args(interp, argv[0], "script ?resultVarName?"));
    }
    let (code, message) = match interp.eval_obj(argv[1]) {
        Ok(value) => (ReturnCode::Ok, value),
        Err(Interrupt::Error(msg)) => {
            // The error is handled; let the next failure re-latch the trace.
            interp.error_flag = false;
            let value = interp.heap.new_string(msg.into_vec());
            (ReturnCode::Error, value)
        }
        Err(Interrupt::Return { value, .. }) => (ReturnCode::Return, value),
        Err(Interrupt::Break) => (ReturnCode::Break, interp.heap.new_empty()),
        Err(Interrupt::Continue) => (ReturnCode::Continue, interp.heap.new_empty()),
        Err(exit @ Interrupt::Exit(_)) => return Err(exit),
    };
    if argv.len() == 3 {
        let name = interp.heap.get_string(argv[2]).to_vec();
        interp.heap.inc_ref(message);
        if let Err(e) = interp.set_var_raw(&name, message) {
            interp.heap.dec_ref(message);
            return Err(e);
        }
    }
    interp.heap.dec_ref(message);
    Ok(interp.heap.new_int(code.as_int()))
}

pub(super) fn cmd_error(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() != 2 {
        return Err(wrong_num_args(interp, argv[0], "message"));
    }
    let message = interp.heap.get_string(argv[1]).to_vec();
    Err(Interrupt::Error(message.into_boxed_slice()))
}
