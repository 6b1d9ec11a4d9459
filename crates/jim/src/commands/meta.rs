//! Meta commands: `eval`, `uplevel`, `subst`, `info`, `debug`.

use super::{glob_match, wrong_num_args};
use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    parse::SubstFlags,
    registry::Cmd,
    value::lossy,
};

fn concat_words(interp: &mut Interp, words: &[ObjId]) -> ObjId {
    let mut buffer = Vec::new();
    for (i, &word) in words.iter().enumerate() {
        if i > 0 {
            buffer.push(b' ');
        }
        buffer.extend_from_slice(interp.heap.get_string(word));
    }
    interp.heap.new_string(buffer)
}

pub(super) fn cmd_eval(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    match argv.len() {
        0 | 1 => Err(wrong_num_args(interp, argv[0], "script ?script ...?")),
        2 => interp.eval_obj(argv[1]),
        _ => {
            let script = concat_words(interp, &argv[1..]);
            let result = interp.eval_obj(script);
            interp.heap.dec_ref(script);
            result
        }
    }
}

pub(super) fn cmd_uplevel(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "?level? script ?script ...?"));
    }
    let first = interp.heap.get_string(argv[1]).to_vec();
    let explicit_level = first.first().is_some_and(|&c| c == b'#' || c.is_ascii_digit());
    let (target, rest) = if explicit_level {
        if argv.len() < 3 {
            return Err(wrong_num_args(interp, argv[0], "?level? script ?script ...?"));
        }
        (interp.resolve_level(&first)?, &argv[2..])
    } else {
        (interp.resolve_level(b"1")?, &argv[1..])
    };
    let saved = interp.current;
    interp.current = target;
    let result = if rest.len() == 1 {
        interp.eval_obj(rest[0])
    } else {
        let script = concat_words(interp, rest);
        let result = interp.eval_obj(script);
        interp.heap.dec_ref(script);
        result
    };
    interp.current = saved;
    result
}

pub(super) fn cmd_subst(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "?options? string"));
    }
    let mut flags = SubstFlags::default();
    for &option_obj in &argv[1..argv.len() - 1] {
        let option = interp.heap.get_string(option_obj).to_vec();
        match option.as_slice() {
            b"-nobackslashes" => flags.backslashes = false,
            b"-nocommands" => flags.commands = false,
            b"-novariables" => flags.variables = false,
            other => {
                return Err(Interrupt::error(format!(
                    "bad option \"{}\": must be -nobackslashes, -nocommands, or -novariables",
                    lossy(other)
                )));
            }
        }
    }
    interp.subst_obj(argv[argv.len() - 1], flags)
}

fn filtered_name_list(interp: &mut Interp, names: Vec<Vec<u8>>, pattern: Option<Vec<u8>>) -> ObjId {
    let mut elements = Vec::new();
    for name in names {
        if let Some(p) = &pattern
            && !glob_match(p, &name)
        {
            continue;
        }
        elements.push(interp.heap.new_string(name));
    }
    interp.heap.new_list(elements)
}

pub(super) fn cmd_info(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "subcommand ?arg ...?"));
    }
    let option = interp.heap.get_string(argv[1]).to_vec();
    let pattern = if argv.len() == 3 {
        Some(interp.heap.get_string(argv[2]).to_vec())
    } else {
        None
    };
    match option.as_slice() {
        b"commands" => {
            let names = interp.registry.names();
            Ok(filtered_name_list(interp, names, pattern))
        }
        b"procs" => {
            let names = interp.registry.proc_names();
            Ok(filtered_name_list(interp, names, pattern))
        }
        b"vars" => {
            let names = interp.frames[interp.current].var_names();
            Ok(filtered_name_list(interp, names, pattern))
        }
        b"globals" => {
            let names = interp.frames[0].var_names();
            Ok(filtered_name_list(interp, names, pattern))
        }
        b"exists" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "exists varName"));
            }
            let name = interp.heap.get_string(argv[2]).to_vec();
            let exists = matches!(interp.get_var_borrowed(&name), Ok(Some(_)));
            Ok(interp.heap.new_bool(exists))
        }
        b"level" => match argv.len() {
            2 => Ok(interp.heap.new_int(i64::from(interp.frames[interp.current].level))),
            3 => {
                let level = interp.heap.get_int(argv[2])?;
                let mut frame = interp.current;
                loop {
                    if i64::from(interp.frames[frame].level) == level && level > 0 {
                        let words = interp.frames[frame].argv.clone();
                        for &word in &words {
                            interp.heap.inc_ref(word);
                        }
                        return Ok(interp.heap.new_list(words));
                    }
                    if frame == 0 {
                        return Err(Interrupt::error(format!("bad level \"{level}\"")));
                    }
                    frame = interp.frames[frame].parent;
                }
            }
            _ => Err(wrong_num_args(interp, argv[0], "level ?levelNum?")),
        },
        b"body" | b"args" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "body procName"));
            }
            let name = interp.heap.get_string(argv[2]).to_vec();
            match interp.registry.get(&name) {
                Some(Cmd::Proc(def)) => {
                    let value = if option == b"body" { def.body } else { def.arglist };
                    interp.heap.inc_ref(value);
                    Ok(value)
                }
                _ => Err(Interrupt::error(format!("command \"{}\" is not a procedure", lossy(&name)))),
            }
        }
        b"version" => Ok(interp.heap.new_str(env!("CARGO_PKG_VERSION"))),
        other => Err(Interrupt::error(format!(
            "bad option \"{}\": must be args, body, commands, exists, globals, level, procs, vars, or version",
            lossy(other)
        ))),
    }
}

pub(super) fn cmd_debug(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "subcommand ?arg ...?"));
    }
    let option = interp.heap.get_string(argv[1]).to_vec();
    match option.as_slice() {
        b"objcount" => {
            let free = interp.heap.free_count();
            let used = interp.heap.live_count();
            let mut elements = Vec::with_capacity(4);
            elements.push(interp.heap.new_str("free"));
            elements.push(interp.heap.new_int(free as i64));
            elements.push(interp.heap.new_str("used"));
            elements.push(interp.heap.new_int(used as i64));
            Ok(interp.heap.new_list(elements))
        }
        b"refcount" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "refcount varName"));
            }
            let name = interp.heap.get_string(argv[2]).to_vec();
            let value = interp.get_var_raw(&name)?;
            // Subtract the handle this command itself holds.
            let count = i64::from(interp.heap.refcount(value)) - 1;
            interp.heap.dec_ref(value);
            Ok(interp.heap.new_int(count))
        }
        b"invstr" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "invstr varName"));
            }
            let name = interp.heap.get_string(argv[2]).to_vec();
            let value = interp.get_var_raw(&name)?;
            interp.heap.invalidate_string(value);
            interp.heap.dec_ref(value);
            Ok(interp.heap.new_empty())
        }
        other => Err(Interrupt::error(format!(
            "bad option \"{}\": must be invstr, objcount, or refcount",
            lossy(other)
        ))),
    }
}
