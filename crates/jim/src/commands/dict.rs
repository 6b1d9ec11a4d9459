//! Dictionary commands: the `dict` subcommand family and the `array`
//! convenience view over dict-valued variables.

use super::{glob_match, wrong_num_args};
use crate::{
    flow::{EvalResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    value::lossy,
};

pub(super) fn cmd_dict(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 2 {
        return Err(wrong_num_args(interp, argv[0], "subcommand ?arg ...?"));
    }
    let option = interp.heap.get_string(argv[1]).to_vec();
    match option.as_slice() {
        b"create" => {
            if argv.len() % 2 != 0 {
                return Err(wrong_num_args(interp, argv[0], "create ?key value ...?"));
            }
            let dict = interp.heap.new_string(Vec::new());
            for pair in argv[2..].chunks(2) {
                let key = interp.heap.get_string(pair[0]).to_vec();
                interp.heap.inc_ref(pair[1]);
                interp.heap.dict_set(dict, &key, pair[1]).expect("empty string converts to dict");
            }
            Ok(dict)
        }
        b"get" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "get dictionary key"));
            }
            let key = interp.heap.get_string(argv[3]).to_vec();
            match interp.heap.dict_get(argv[2], &key)? {
                Some(value) => {
                    interp.heap.inc_ref(value);
                    Ok(value)
                }
                None => Err(Interrupt::error(format!("key \"{}\" not found in dictionary", lossy(&key)))),
            }
        }
        b"set" => {
            if argv.len() != 5 {
                return Err(wrong_num_args(interp, argv[0], "set varName key value"));
            }
            let name = interp.heap.get_string(argv[2]).to_vec();
            let key = interp.heap.get_string(argv[3]).to_vec();
            let target = interp.dict_var_for_update(&name)?;
            interp.heap.inc_ref(argv[4]);
            interp.heap.dict_set(target, &key, argv[4])?;
            interp.heap.inc_ref(target);
            Ok(target)
        }
        b"exists" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "exists dictionary key"));
            }
            let key = interp.heap.get_string(argv[3]).to_vec();
            let exists = interp.heap.dict_get(argv[2], &key)?.is_some();
            Ok(interp.heap.new_bool(exists))
        }
        b"unset" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "unset varName key"));
            }
            let name = interp.heap.get_string(argv[2]).to_vec();
            let key = interp.heap.get_string(argv[3]).to_vec();
            let target = interp.dict_var_for_update(&name)?;
            if !interp.heap.dict_remove(target, &key)? {
                return Err(Interrupt::error(format!("key \"{}\" not found in dictionary", lossy(&key))));
            }
            interp.heap.inc_ref(target);
            Ok(target)
        }
        b"keys" | b"values" => {
            if !matches!(argv.len(), 3 | 4) {
                return Err(wrong_num_args(interp, argv[0], "keys dictionary ?pattern?"));
            }
            let pattern = if argv.len() == 4 {
                Some(interp.heap.get_string(argv[3]).to_vec())
            } else {
                None
            };
            let pairs = interp.heap.dict_pairs(argv[2])?;
            let mut elements = Vec::new();
            for (key, value) in pairs {
                if let Some(p) = &pattern
                    && !glob_match(p, &key)
                {
                    continue;
                }
                if option == b"keys" {
                    elements.push(interp.heap.new_string(key.into_vec()));
                } else {
                    interp.heap.inc_ref(value);
                    elements.push(value);
                }
            }
            Ok(interp.heap.new_list(elements))
        }
        b"size" => {
            if argv.len() != 3 {
                return Err(wrong_num_args(interp, argv[0], "size dictionary"));
            }
            let size = interp.heap.dict_len(argv[2])?;
            Ok(interp.heap.new_int(size as i64))
        }
        other => Err(Interrupt::error(format!(
            "bad option \"{}\": must be create, exists, get, keys, set, size, unset, or values",
            lossy(other)
        ))),
    }
}

pub(super) fn cmd_array(interp: &mut Interp, argv: &[ObjId]) -> EvalResult {
    if argv.len() < 3 {
        return Err(wrong_num_args(interp, argv[0], "subcommand arrayName ?arg ...?"));
    }
    let option = interp.heap.get_string(argv[1]).to_vec();
    let name = interp.heap.get_string(argv[2]).to_vec();
    match option.as_slice() {
        b"get" | b"names" => {
            if !matches!(argv.len(), 3 | 4) {
                return Err(wrong_num_args(interp, argv[0], "get arrayName ?pattern?"));
            }
            let pattern = if argv.len() == 4 {
                Some(interp.heap.get_string(argv[3]).to_vec())
            } else {
                None
            };
            let Some(dict) = interp.get_var_borrowed(&name)? else {
                return Ok(interp.heap.new_list(Vec::new()));
            };
            let pairs = interp.heap.dict_pairs(dict)?;
            let mut elements = Vec::new();
            for (key, value) in pairs {
                if let Some(p) = &pattern
                    && !glob_match(p, &key)
                {
                    continue;
                }
                elements.push(interp.heap.new_string(key.into_vec()));
                if option == b"get" {
                    interp.heap.inc_ref(value);
                    elements.push(value);
                }
            }
            Ok(interp.heap.new_list(elements))
        }
        b"set" => {
            if argv.len() != 4 {
                return Err(wrong_num_args(interp, argv[0], "set arrayName list"));
            }
            let elements = interp.heap.list_elements(argv[3]);
            if elements.len() % 2 != 0 {
                return Err(Interrupt::error("missing value to go with key"));
            }
            let target = interp.dict_var_for_update(&name)?;
            for pair in elements.chunks(2) {
                let key = interp.heap.get_string(pair[0]).to_vec();
                interp.heap.inc_ref(pair[1]);
                interp.heap.dict_set(target, &key, pair[1])?;
            }
            Ok(interp.heap.new_empty())
        }
        b"exists" => {
            let valid = match interp.get_var_borrowed(&name)? {
                Some(dict) => interp.heap.dict_pairs(dict).is_ok(),
                None => false,
            };
            Ok(interp.heap.new_bool(valid))
        }
        b"size" => {
            let size = match interp.get_var_borrowed(&name)? {
                Some(dict) => interp.heap.dict_len(dict)?,
                None => 0,
            };
            Ok(interp.heap.new_int(size as i64))
        }
        b"unset" => {
            interp.unset_var_raw(&name)?;
            Ok(interp.heap.new_empty())
        }
        other => Err(Interrupt::error(format!(
            "bad option \"{}\": must be exists, get, names, set, size, or unset",
            lossy(other)
        ))),
    }
}
