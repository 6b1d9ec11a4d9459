//! Computation commands: `expr` and the arithmetic command forms `+`, `-`,
//! `*`, `/` (integer-first with double promotion, like the expression VM).

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, FlowResult, Interrupt},
    heap::ObjId,
    interp::Interp,
};

pub(super) fn cmd_expr(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    match argv.len() {
        0 | 1 => Err(wrong_num_args(interp, argv[0], "expression ?...?")),
        2 => interp.eval_expr_obj(argv[1]),
        _ => {
            // Multiple words concatenate into one uncached expression.
            let mut buffer = Vec::new();
            for (i, &arg) in argv[1..].iter().enumerate() {
                if i > 0 {
                    buffer.push(b' ');
                }
                buffer.extend_from_slice(interp.heap.get_string(arg));
            }
            let expression = interp.heap.new_string(buffer);
            let result = interp.eval_expr_obj(expression);
            interp.heap.dec_ref(expression);
            result
        }
    }
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Double(f64),
}

fn numeric(interp: &mut Interp, id: ObjId) -> FlowResult<Num> {
    if !interp.heap.is_double_repr(id)
        && let Some(value) = interp.heap.probe_int(id)
    {
        return Ok(Num::Int(value));
    }
    Ok(Num::Double(interp.heap.get_double(id)?))
}

fn store(interp: &mut Interp, value: Num) -> ObjId {
    match value {
        Num::Int(v) => interp.heap.new_int(v),
        Num::Double(v) => interp.heap.new_double(v),
    }
}

fn combine(acc: Num, next: Num, int_op: fn(i64, i64) -> i64, double_op: fn(f64, f64) -> f64) -> Num {
    match (acc, next) {
        (Num::Int(a), Num::Int(b)) => Num::Int(int_op(a, b)),
        (a, b) => Num::Double(double_op(as_double(a), as_double(b))),
    }
}

fn as_double(value: Num) -> f64 {
    match value {
        Num::Int(v) => v as f64,
        Num::Double(v) => v,
    }
}

pub(super) fn cmd_plus(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let mut acc = Num::Int(0);
    for &arg in &argv[1..] {
        let next = numeric(interp, arg)?;
        acc = combine(acc, next, i64::wrapping_add, |a, b| a + b);
    }
    Ok(store(interp, acc))
}

pub(super) fn cmd_times(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    let mut acc = Num::Int(1);
    for &arg in &argv[1..] {
        let next = numeric(interp, arg)?;
        acc = combine(acc, next, i64::wrapping_mul, |a, b| a * b);
    }
    Ok(store(interp, acc))
}

pub(super) fn cmd_minus(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    match argv.len() {
        0 | 1 => Err(wrong_num_args(interp, argv[0], "value ?value ...?")),
        2 => match numeric(interp, argv[1])? {
            Num::Int(v) => Ok(interp.heap.new_int(v.wrapping_neg())),
            Num::Double(v) => Ok(interp.heap.new_double(-v)),
        },
        _ => {
            let mut acc = numeric(interp, argv[1])?;
            for &arg in &argv[2..] {
                let next = numeric(interp, arg)?;
                acc = combine(acc, next, i64::wrapping_sub, |a, b| a - b);
            }
            Ok(store(interp, acc))
        }
    }
}

pub(super) fn cmd_divide(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 3 {
        return Err(wrong_num_args(interp, argv[0], "value value ?value ...?"));
    }
    let mut acc = numeric(interp, argv[1])?;
    for &arg in &argv[2..] {
        let next = numeric(interp, arg)?;
        acc = match (acc, next) {
            (Num::Int(a), Num::Int(b)) => {
                if b == 0 {
                    return Err(Interrupt::error("Division by zero"));
                }
                Num::Int(a.wrapping_div(b))
            }
            (a, b) => Num::Double(as_double(a) / as_double(b)),
        };
    }
    Ok(store(interp, acc))
}
