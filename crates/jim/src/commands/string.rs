//! String commands: `append` and the `string` subcommand family, plus the
//! glob matcher shared with the introspection commands.

use std::cmp::Ordering;

use super::wrong_num_args;
use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    value::lossy,
};

/// Glob matching over bytes: `*`, `?`, `[a-z]` sets (with `^` negation),
/// and backslash escapes.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => {
            for start in 0..=text.len() {
                if glob_match(rest, &text[start..]) {
                    return true;
                }
            }
            false
        }
        Some((b'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((b'[', rest)) => {
            let Some((&c, text_rest)) = text.split_first() else {
                return false;
            };
            let mut i = 0;
            let mut negate = false;
            if rest.first() == Some(&b'^') {
                negate = true;
                i = 1;
            }
            let mut matched = false;
            while i < rest.len() && rest[i] != b']' {
                if i + 2 < rest.len() && rest[i + 1] == b'-' && rest[i + 2] != b']' {
                    if rest[i] <= c && c <= rest[i + 2] {
                        matched = true;
                    }
                    i += 3;
                } else {
                    if rest[i] == c {
                        matched = true;
                    }
                    i += 1;
                }
            }
            if i >= rest.len() {
                // Unterminated set never matches.
                return false;
            }
            if matched == negate {
                return false;
            }
            glob_match(&rest[i + 1..], text_rest)
        }
        Some((b'\\', rest)) if !rest.is_empty() => {
            text.first() == Some(&rest[0]) && glob_match(&rest[1..], &text[1..])
        }
        Some((&c, rest)) => text.first() == Some(&c) && glob_match(rest, &text[1..]),
    }
}

pub(super) fn cmd_append(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 3 {
        return Err(wrong_num_args(interp, argv[0], "varName value ?value ...?"));
    }
    let name = interp.heap.get_string(argv[1]).to_vec();
    let target = interp.var_for_update(&name)?;
    for &value in &argv[2..] {
        let text = interp.heap.get_string(value).to_vec();
        interp.heap.append_obj_bytes(target, &text);
    }
    interp.heap.inc_ref(target);
    Ok(target)
}

pub(super) fn cmd_string(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 3 {
        return Err(wrong_num_args(interp, argv[0], "option arg ?arg ...?"));
    }
    let option = interp.heap.get_string(argv[1]).to_vec();
    match option.as_slice() {
        b"length" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "length string"));
            }
            let len = interp.heap.get_string(argv[2]).len();
            Ok(interp.heap.new_int(len as i64))
        }
        b"index" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "index string index"));
            }
            let len = interp.heap.get_string(argv[2]).len();
            let index = interp.heap.get_index(argv[3])?;
            match index.resolve(len) {
                Some(i) => {
                    let byte = interp.heap.get_string(argv[2])[i];
                    Ok(interp.heap.new_string(vec![byte]))
                }
                None => Ok(interp.heap.new_empty()),
            }
        }
        b"range" => {
            if argv.len() != 5 {
                return Err(wrong_num_args(interp, argv[0], "range string first last"));
            }
            let len = interp.heap.get_string(argv[2]).len();
            let first = interp.heap.get_index(argv[3])?.effective(len).max(0);
            let last = interp.heap.get_index(argv[4])?.effective(len).min(len as i64 - 1);
            if first > last || len == 0 {
                return Ok(interp.heap.new_empty());
            }
            let slice = interp.heap.get_string(argv[2])[first as usize..=last as usize].to_vec();
            Ok(interp.heap.new_string(slice))
        }
        b"compare" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "compare string1 string2"));
            }
            let left = interp.heap.get_string(argv[2]).to_vec();
            let order = match left.as_slice().cmp(interp.heap.get_string(argv[3])) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            Ok(interp.heap.new_int(order))
        }
        b"equal" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "equal string1 string2"));
            }
            let equal = interp.heap.string_eq(argv[2], argv[3]);
            Ok(interp.heap.new_bool(equal))
        }
        b"match" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "match pattern string"));
            }
            let pattern = interp.heap.get_string(argv[2]).to_vec();
            let text = interp.heap.get_string(argv[3]).to_vec();
            Ok(interp.heap.new_bool(glob_match(&pattern, &text)))
        }
        b"repeat" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "repeat string count"));
            }
            let count = interp.heap.get_int(argv[3])?.max(0) as usize;
            let unit = interp.heap.get_string(argv[2]).to_vec();
            let mut out = Vec::with_capacity(unit.len() * count);
            for _ in 0..count {
                out.extend_from_slice(&unit);
            }
            Ok(interp.heap.new_string(out))
        }
        b"tolower" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "tolower string"));
            }
            let out = interp.heap.get_string(argv[2]).to_ascii_lowercase();
            Ok(interp.heap.new_string(out))
        }
        b"toupper" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "toupper string"));
            }
            let out = interp.heap.get_string(argv[2]).to_ascii_uppercase();
            Ok(interp.heap.new_string(out))
        }
        b"trim" => {
            if !matches!(argv.len(), 3 | 4) {
                return Err(wrong_num_args(interp, argv[0], "trim string ?chars?"));
            }
            let chars: Vec<u8> = if argv.len() == 4 {
                interp.heap.get_string(argv[3]).to_vec()
            } else {
                b" \t\n\r\x0b\x0c".to_vec()
            };
            let text = interp.heap.get_string(argv[2]).to_vec();
            let start = text.iter().position(|c| !chars.contains(c)).unwrap_or(text.len());
            let end = text.iter().rposition(|c| !chars.contains(c)).map_or(start, |e| e + 1);
            Ok(interp.heap.new_string(text[start..end].to_vec()))
        }
        other => Err(Interrupt::error(format!(
            "bad option \"{}\": must be compare, equal, index, length, match, range, repeat, tolower, toupper, or trim",
            lossy(other)
        ))),
    }
}
