//! Callframes and variable storage.
//!
//! Frames form a stack; the active frame is tracked separately so `uplevel`
//! can evaluate in an ancestor without popping. A variable record either
//! owns a value or links to a `(name, frame)` pair (`upvar`/`global`); link
//! chains always terminate at an owner and cycles are rejected when the link
//! is created.
//!
//! Each frame carries a monotonically increasing `uid` which is bumped when
//! cached lookups into the frame must be re-resolved (after `unset`). The
//! `VarName` rep on a name value caches `(uid, frame, slot)` of a successful
//! resolution; a mismatch against the current frame's uid falls back to the
//! map lookup.

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    flow::{FlowResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    value::{Repr, VarNameRep, lossy},
};

#[derive(Debug)]
pub(crate) enum VarRecord {
    Owned(ObjId),
    Link { name: Rc<[u8]>, frame: usize },
    /// Unset; the slot index stays valid so stale caches miss harmlessly.
    Dead,
}

#[derive(Debug)]
pub(crate) struct CallFrame {
    pub uid: u64,
    pub level: u32,
    pub parent: usize,
    names: AHashMap<Rc<[u8]>, usize>,
    pub records: Vec<VarRecord>,
    /// The words that invoked this frame, for `info level`.
    pub argv: Vec<ObjId>,
}

impl CallFrame {
    pub fn new(uid: u64, level: u32, parent: usize, argv: Vec<ObjId>) -> Self {
        Self {
            uid,
            level,
            parent,
            names: AHashMap::new(),
            records: Vec::new(),
            argv,
        }
    }

    pub fn slot_of(&self, name: &[u8]) -> Option<usize> {
        self.names.get(name).copied()
    }

    fn define(&mut self, name: Rc<[u8]>, record: VarRecord) -> usize {
        let slot = self.records.len();
        self.records.push(record);
        self.names.insert(name, slot);
        slot
    }

    fn remove(&mut self, name: &[u8]) -> Option<usize> {
        self.names.remove(name)
    }

    pub fn var_names(&self) -> Vec<Vec<u8>> {
        let mut names: Vec<Vec<u8>> = self.names.keys().map(|n| n.to_vec()).collect();
        names.sort_unstable();
        names
    }
}

/// Splits `name(key)` dict sugar; `None` for plain names.
pub(crate) fn split_dict_sugar(name: &[u8]) -> Option<(&[u8], &[u8])> {
    if name.len() < 3 || *name.last()? != b')' {
        return None;
    }
    let open = name.iter().position(|&c| c == b'(')?;
    if open == 0 {
        return None;
    }
    Some((&name[..open], &name[open + 1..name.len() - 1]))
}

impl Interp {
    /// Resolves a name to its owning `(frame, slot)`, following links.
    fn resolve_owner(&self, start_frame: usize, name: &[u8]) -> Option<(usize, usize)> {
        let mut frame = start_frame;
        let mut slot = self.frames[frame].slot_of(name)?;
        for _ in 0..MAX_LINK_DEPTH {
            match &self.frames[frame].records[slot] {
                VarRecord::Owned(_) => return Some((frame, slot)),
                VarRecord::Dead => return None,
                VarRecord::Link { name, frame: target } => {
                    let target = *target;
                    let name = Rc::clone(name);
                    frame = target;
                    slot = self.frames[frame].slot_of(&name)?;
                }
            }
        }
        None
    }

    /// The value bound to a plain name in the current frame, without a
    /// reference transfer. Only valid until the next binding change.
    pub(crate) fn get_var_borrowed(&mut self, name: &[u8]) -> FlowResult<Option<ObjId>> {
        if let Some((base, key)) = split_dict_sugar(name) {
            let base = base.to_vec();
            let key = key.to_vec();
            return Ok(Some(self.dict_sugar_read(&base, &key)?));
        }
        match self.resolve_owner(self.current, name) {
            Some((frame, slot)) => match &self.frames[frame].records[slot] {
                VarRecord::Owned(id) => Ok(Some(*id)),
                _ => unreachable!("resolve_owner returns owned slots"),
            },
            None => Ok(None),
        }
    }

    /// Reads a variable, failing with the standard message when unknown.
    /// The returned reference is owned by the caller.
    pub(crate) fn get_var_raw(&mut self, name: &[u8]) -> FlowResult<ObjId> {
        match self.get_var_borrowed(name)? {
            Some(id) => {
                self.heap.inc_ref(id);
                Ok(id)
            }
            None => Err(Interrupt::error(format!("can't read \"{}\": no such variable", lossy(name)))),
        }
    }

    /// Sets a variable (dict sugar included), creating it as needed.
    /// Ownership of `value` transfers to the binding.
    pub(crate) fn set_var_raw(&mut self, name: &[u8], value: ObjId) -> FlowResult<()> {
        if let Some((base, key)) = split_dict_sugar(name) {
            let base = base.to_vec();
            let key = key.to_vec();
            return self.set_dict_sugar(&base, &key, value);
        }
        self.set_var_in_frame(self.current, name, value);
        Ok(())
    }

    /// Sets a plain name in the given frame, following links to the owner.
    /// A link whose target does not exist yet creates the target lazily.
    pub(crate) fn set_var_in_frame(&mut self, start_frame: usize, name: &[u8], value: ObjId) {
        let mut frame = start_frame;
        let mut name: Rc<[u8]> = self.pool.acquire(name);
        loop {
            match self.frames[frame].slot_of(&name) {
                None => {
                    self.frames[frame].define(name, VarRecord::Owned(value));
                    return;
                }
                Some(slot) => match &self.frames[frame].records[slot] {
                    VarRecord::Owned(old) => {
                        let old = *old;
                        self.frames[frame].records[slot] = VarRecord::Owned(value);
                        self.heap.dec_ref(old);
                        return;
                    }
                    VarRecord::Dead => {
                        self.frames[frame].records[slot] = VarRecord::Owned(value);
                        self.frames[frame].names.insert(name, slot);
                        return;
                    }
                    VarRecord::Link { name: target_name, frame: target } => {
                        let next = *target;
                        name = Rc::clone(target_name);
                        frame = next;
                    }
                },
            }
        }
    }

    /// Removes a variable; following a link removes at the owner. Bumps the
    /// frame uids involved so cached resolutions re-run.
    pub(crate) fn unset_var_raw(&mut self, name: &[u8]) -> FlowResult<()> {
        if let Some((base, key)) = split_dict_sugar(name) {
            let base = base.to_vec();
            let key = key.to_vec();
            let target = self.dict_var_for_update(&base)?;
            let removed = self
                .heap
                .dict_remove(target, &key)
                .map_err(|_| self.bad_dict_variable(&base))?;
            if !removed {
                return Err(Interrupt::error(format!("key \"{}\" not found in dictionary", lossy(&key))));
            }
            return Ok(());
        }
        let Some((frame, slot)) = self.resolve_owner(self.current, name) else {
            return Err(Interrupt::error(format!("can't unset \"{}\": no such variable", lossy(name))));
        };
        let owner_names: Vec<Rc<[u8]>> = self.frames[frame]
            .names
            .iter()
            .filter(|&(_, &s)| s == slot)
            .map(|(n, _)| Rc::clone(n))
            .collect();
        for owner_name in owner_names {
            self.frames[frame].remove(&owner_name);
        }
        let record = std::mem::replace(&mut self.frames[frame].records[slot], VarRecord::Dead);
        if let VarRecord::Owned(id) = record {
            self.heap.dec_ref(id);
        }
        self.bump_frame_uid(frame);
        self.bump_frame_uid(self.current);
        // The local link record (if any) stays; a later set re-creates the
        // target through it.
        Ok(())
    }

    fn bump_frame_uid(&mut self, frame: usize) {
        self.frames[frame].uid = self.next_frame_uid();
    }

    /// Creates a link record `local -> (target_frame, target_name)`.
    pub(crate) fn make_link(&mut self, local: &[u8], target_frame: usize, target_name: &[u8]) -> FlowResult<()> {
        if split_dict_sugar(local).is_some() || split_dict_sugar(target_name).is_some() {
            return Err(Interrupt::error("dict key syntax invalid as link source"));
        }
        if target_frame == self.current && target_name == local {
            return Err(Interrupt::error("can't upvar from variable to itself"));
        }
        // Walk the target's existing link chain; reaching the local name in
        // the current frame would close a cycle.
        let mut frame = target_frame;
        let mut name: Rc<[u8]> = self.pool.acquire(target_name);
        for _ in 0..MAX_LINK_DEPTH {
            if frame == self.current && *name == *local {
                return Err(Interrupt::error("can't upvar from variable to itself"));
            }
            let Some(slot) = self.frames[frame].slot_of(&name) else { break };
            match &self.frames[frame].records[slot] {
                VarRecord::Link { name: next_name, frame: next_frame } => {
                    let next = *next_frame;
                    name = Rc::clone(next_name);
                    frame = next;
                }
                _ => break,
            }
        }

        let local_name = self.pool.acquire(local);
        let link = VarRecord::Link { name: self.pool.acquire(target_name), frame: target_frame };
        match self.frames[self.current].slot_of(&local_name) {
            Some(slot) => {
                let old = std::mem::replace(&mut self.frames[self.current].records[slot], link);
                if let VarRecord::Owned(id) = old {
                    self.heap.dec_ref(id);
                }
            }
            None => {
                self.frames[self.current].define(local_name, link);
            }
        }
        Ok(())
    }

    /// Resolves a level spec (`N` relative hops up, `#N` absolute) to a
    /// frame index.
    pub(crate) fn resolve_level(&mut self, spec: &[u8]) -> FlowResult<usize> {
        let bad = || Interrupt::error(format!("bad level \"{}\"", lossy(spec)));
        if let Some(rest) = spec.strip_prefix(b"#") {
            let text = std::str::from_utf8(rest).map_err(|_| bad())?;
            let level: u32 = text.parse().map_err(|_| bad())?;
            let mut frame = self.current;
            loop {
                if self.frames[frame].level == level {
                    return Ok(frame);
                }
                if frame == 0 {
                    return Err(bad());
                }
                frame = self.frames[frame].parent;
            }
        }
        let text = std::str::from_utf8(spec).map_err(|_| bad())?;
        let hops: u32 = text.parse().map_err(|_| bad())?;
        if hops > self.frames[self.current].level {
            return Err(bad());
        }
        let mut frame = self.current;
        for _ in 0..hops {
            frame = self.frames[frame].parent;
        }
        Ok(frame)
    }

    /// Cached variable read for a name value (the `$name` fast path).
    pub(crate) fn get_var_value_obj(&mut self, name_id: ObjId) -> FlowResult<ObjId> {
        if let Repr::VarName(rep) = &self.heap.get(name_id).repr {
            if let Some((base, key)) = &rep.sugar {
                let base = base.to_vec();
                let key = key.to_vec();
                return self.dict_sugar_value_split(&base, &key);
            }
            if let Some((uid, frame, slot)) = rep.cache
                && self.frames[self.current].uid == uid
                && let VarRecord::Owned(value) = &self.frames[frame].records[slot]
            {
                let value = *value;
                self.heap.inc_ref(value);
                return Ok(value);
            }
        } else {
            let name = self.heap.get_string(name_id).to_vec();
            let sugar = split_dict_sugar(&name)
                .map(|(b, k)| (b.to_vec().into_boxed_slice(), k.to_vec().into_boxed_slice()));
            self.heap.set_repr(name_id, Repr::VarName(VarNameRep { sugar: sugar.clone(), cache: None }));
            if let Some((base, key)) = sugar {
                return self.dict_sugar_value_split(&base, &key);
            }
        }
        // Plain name, cache miss: resolve and refresh the cache.
        let name = self.heap.get_string(name_id).to_vec();
        match self.resolve_owner(self.current, &name) {
            Some((frame, slot)) => {
                let VarRecord::Owned(value) = &self.frames[frame].records[slot] else {
                    unreachable!("resolve_owner returns owned slots");
                };
                let value = *value;
                let uid = self.frames[self.current].uid;
                if let Repr::VarName(rep) = &mut self.heap.get_mut(name_id).repr {
                    rep.cache = Some((uid, frame, slot));
                }
                self.heap.inc_ref(value);
                Ok(value)
            }
            None => Err(Interrupt::error(format!("can't read \"{}\": no such variable", lossy(&name)))),
        }
    }

    /// Dict-sugar read for a `$name(key)` token value; splits once and
    /// caches the split on the value.
    pub(crate) fn dict_sugar_value(&mut self, token_id: ObjId) -> FlowResult<ObjId> {
        if let Repr::VarName(rep) = &self.heap.get(token_id).repr
            && let Some((base, key)) = &rep.sugar
        {
            let base = base.to_vec();
            let key = key.to_vec();
            return self.dict_sugar_value_split(&base, &key);
        }
        let text = self.heap.get_string(token_id).to_vec();
        let Some((base, key)) = split_dict_sugar(&text) else {
            // Not sugar after all; read it as a plain name.
            return self.get_var_raw(&text);
        };
        let sugar = Some((base.to_vec().into_boxed_slice(), key.to_vec().into_boxed_slice()));
        let (base, key) = (base.to_vec(), key.to_vec());
        self.heap.set_repr(token_id, Repr::VarName(VarNameRep { sugar, cache: None }));
        self.dict_sugar_value_split(&base, &key)
    }

    /// Reads `base(key_source)` after substituting the key source.
    fn dict_sugar_value_split(&mut self, base: &[u8], key_source: &[u8]) -> FlowResult<ObjId> {
        let key = self.substitute_key(key_source)?;
        let value = self.dict_sugar_read(base, &key)?;
        self.heap.inc_ref(value);
        Ok(value)
    }

    /// The key part of dict sugar is itself substitutable (`$a($i)`).
    fn substitute_key(&mut self, key_source: &[u8]) -> FlowResult<Vec<u8>> {
        if !key_source.iter().any(|&c| matches!(c, b'$' | b'[' | b'\\')) {
            return Ok(key_source.to_vec());
        }
        let template = self.heap.new_string(key_source.to_vec());
        let result = self.subst_obj(template, crate::parse::SubstFlags::default());
        self.heap.dec_ref(template);
        let value = result?;
        let key = self.heap.get_string(value).to_vec();
        self.heap.dec_ref(value);
        Ok(key)
    }

    /// Borrowed dict-sugar element read; the value stays owned by the dict.
    fn dict_sugar_read(&mut self, base: &[u8], key: &[u8]) -> FlowResult<ObjId> {
        let Some(dict) = self.get_var_borrowed_plain(base) else {
            return Err(Interrupt::error(format!(
                "can't read \"{}({})\": no such variable",
                lossy(base),
                lossy(key)
            )));
        };
        let entry = self.heap.dict_get(dict, key).map_err(|_| self.bad_dict_variable(base))?;
        match entry {
            Some(value) => Ok(value),
            None => Err(Interrupt::error(format!("key \"{}\" not found in dictionary", lossy(key)))),
        }
    }

    fn get_var_borrowed_plain(&mut self, name: &[u8]) -> Option<ObjId> {
        match self.resolve_owner(self.current, name) {
            Some((frame, slot)) => match &self.frames[frame].records[slot] {
                VarRecord::Owned(id) => Some(*id),
                _ => unreachable!("resolve_owner returns owned slots"),
            },
            None => None,
        }
    }

    fn bad_dict_variable(&self, base: &[u8]) -> Interrupt {
        Interrupt::error(format!("variable '{}' does not contain a valid dictionary", lossy(base)))
    }

    /// Sets `base(key) = value`, creating the dict variable or copying a
    /// shared one first. Ownership of `value` transfers.
    pub(crate) fn set_dict_sugar(&mut self, base: &[u8], key: &[u8], value: ObjId) -> FlowResult<()> {
        let target = match self.dict_var_for_update(base) {
            Ok(target) => target,
            Err(e) => {
                self.heap.dec_ref(value);
                return Err(e);
            }
        };
        match self.heap.dict_set(target, key, value) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.heap.dec_ref(value);
                Err(self.bad_dict_variable(base))
            }
        }
    }

    /// The unshared dict value bound to `base`, created empty when missing.
    pub(crate) fn dict_var_for_update(&mut self, base: &[u8]) -> FlowResult<ObjId> {
        match self.get_var_borrowed_plain(base) {
            Some(id) if self.heap.is_shared(id) => {
                let copy = self.heap.dup_obj(id);
                self.set_var_in_frame(self.current, base, copy);
                Ok(copy)
            }
            Some(id) => Ok(id),
            None => {
                let fresh = self.heap.new_string(Vec::new());
                self.set_var_in_frame(self.current, base, fresh);
                Ok(fresh)
            }
        }
    }

    /// The unshared value bound to `name`, created as an empty string when
    /// missing; used by in-place mutators (`append`, `lappend`, `lset`).
    pub(crate) fn var_for_update(&mut self, name: &[u8]) -> FlowResult<ObjId> {
        if split_dict_sugar(name).is_some() {
            // Element mutation: copy the element out, mutate, store back.
            let current = match self.get_var_borrowed(name) {
                Ok(Some(id)) => Some(id),
                Ok(None) | Err(_) => None,
            };
            let work = match current {
                Some(id) => self.heap.dup_obj(id),
                None => self.heap.new_string(Vec::new()),
            };
            self.set_var_raw(name, work)?;
            return Ok(work);
        }
        match self.get_var_borrowed_plain(name) {
            Some(id) if self.heap.is_shared(id) => {
                let copy = self.heap.dup_obj(id);
                self.set_var_in_frame(self.current, name, copy);
                Ok(copy)
            }
            Some(id) => Ok(id),
            None => {
                let fresh = self.heap.new_string(Vec::new());
                self.set_var_in_frame(self.current, name, fresh);
                Ok(fresh)
            }
        }
    }
}

const MAX_LINK_DEPTH: usize = 100;
