//! The value arena: every script-visible value lives in one slab per
//! interpreter, addressed by [`ObjId`] and reclaimed by reference counting.
//!
//! Freed slots go on a free list and are reused by later allocations, so an
//! `ObjId` is only meaningful while the caller holds a reference. Values are
//! never moved; identity is stable until the refcount reaches zero.
//!
//! NOTE: `ObjId` is `Copy` and `Obj` is not `Clone`. Duplication must go
//! through `dup_obj` and every stored id must be paired with `inc_ref` /
//! `dec_ref` calls; copying ids around without adjusting counts is a
//! refcounting bug.

use std::rc::Rc;

use crate::{expr::ExprRep, registry::Cmd, script::ScriptRep, value::Repr};

/// Index of a value slot in the interpreter's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObjId(u32);

impl ObjId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single value: an optional byte-string rep plus a typed internal rep.
///
/// At least one of the two is always valid. When `bytes` is `None` the
/// internal rep can regenerate it; converting to a different internal rep
/// materializes the string first, so the string form survives shimmering.
#[derive(Debug)]
pub(crate) struct Obj {
    refcount: u32,
    pub bytes: Option<Vec<u8>>,
    pub repr: Repr,
}

/// The per-interpreter value store.
///
/// `slots` holds live values (`Some`) and recycled holes (`None`); `free`
/// lists the holes for reuse. A dedicated empty-string singleton is created
/// up front and handed out by `new_empty`, which keeps the hottest value in
/// the system from being reallocated constantly.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    slots: Vec<Option<Obj>>,
    free: Vec<u32>,
    empty: Option<ObjId>,
}

impl Heap {
    pub fn new() -> Self {
        let mut heap = Self::default();
        let empty = heap.alloc(Some(Vec::new()), Repr::Plain);
        heap.empty = Some(empty);
        heap
    }

    /// Allocates a new value with refcount 1 owned by the caller.
    pub fn alloc(&mut self, bytes: Option<Vec<u8>>, repr: Repr) -> ObjId {
        debug_assert!(bytes.is_some() || repr.can_regenerate_string());
        let obj = Obj { refcount: 1, bytes, repr };
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(obj);
            ObjId(index)
        } else {
            let index = u32::try_from(self.slots.len()).expect("value arena exhausted");
            self.slots.push(Some(obj));
            ObjId(index)
        }
    }

    /// Returns the shared empty-string value with an incremented refcount.
    pub fn new_empty(&mut self) -> ObjId {
        let id = self.empty.expect("empty singleton missing");
        self.inc_ref(id);
        id
    }

    #[must_use]
    pub fn get(&self, id: ObjId) -> &Obj {
        self.slots
            .get(id.index())
            .expect("Heap::get: slot missing")
            .as_ref()
            .expect("Heap::get: value already freed")
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut Obj {
        self.slots
            .get_mut(id.index())
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: value already freed")
    }

    pub fn inc_ref(&mut self, id: ObjId) {
        self.get_mut(id).refcount += 1;
    }

    /// Decrements the refcount and frees the value once it hits zero,
    /// recursively releasing children held by the internal rep.
    pub fn dec_ref(&mut self, id: ObjId) {
        let obj = {
            let slot = self.slots.get_mut(id.index()).expect("Heap::dec_ref: slot missing");
            let obj = slot.as_mut().expect("Heap::dec_ref: value already freed");
            if obj.refcount > 1 {
                obj.refcount -= 1;
                return;
            }
            slot.take().expect("Heap::dec_ref: value already freed")
        };
        self.free.push(id.0);
        self.release_repr(obj.repr);
    }

    pub fn refcount(&self, id: ObjId) -> u32 {
        self.get(id).refcount
    }

    /// A value is shared when more than one owner holds it; shared values
    /// must not be mutated in place.
    pub fn is_shared(&self, id: ObjId) -> bool {
        self.get(id).refcount > 1
    }

    pub fn is_live(&self, id: ObjId) -> bool {
        self.slots.get(id.index()).is_some_and(Option::is_some)
    }

    /// Ids of all live values; the garbage collector walks this snapshot.
    pub fn live_ids(&self) -> Vec<ObjId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| ObjId(i as u32)))
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Releases everything an internal rep owns. Every rep that leaves an
    /// `Obj` (by free or by shimmering) must pass through here.
    pub fn release_repr(&mut self, repr: Repr) {
        match repr {
            Repr::List(elements) => {
                for element in elements {
                    self.dec_ref(element);
                }
            }
            Repr::Dict(map) => {
                for (_, value) in map {
                    self.dec_ref(value);
                }
            }
            Repr::Script(rep) => self.release_script_rep(rep),
            Repr::Expr(rep) => self.release_expr_rep(rep),
            Repr::CmdName(cache) => self.release_cmd(cache.cmd),
            _ => {}
        }
    }

    /// Drops a borrow of a compiled script. The token values are released
    /// only by the last holder, so an evaluation that outlives the owning
    /// value (the value shimmered mid-walk) still sees valid tokens.
    pub fn release_script_rep(&mut self, rep: Rc<ScriptRep>) {
        if let Some(rep) = Rc::into_inner(rep) {
            for command in rep.commands {
                for word in command.words {
                    for token in word.tokens {
                        self.dec_ref(token.obj);
                    }
                }
            }
        }
    }

    /// Same contract as [`Heap::release_script_rep`] for expression programs.
    pub fn release_expr_rep(&mut self, rep: Rc<ExprRep>) {
        if let Some(rep) = Rc::into_inner(rep) {
            for instr in rep.program {
                if let Some(obj) = instr.obj {
                    self.dec_ref(obj);
                }
            }
        }
    }

    /// Drops a command handle. Procedure bodies are shared between the
    /// registry and live callers; the last holder releases the body and
    /// argument-list values.
    pub fn release_cmd(&mut self, cmd: Cmd) {
        if let Cmd::Proc(def) = cmd
            && let Some(def) = Rc::into_inner(def)
        {
            self.dec_ref(def.arglist);
            self.dec_ref(def.body);
        }
    }

    /// Replaces the internal rep, materializing the string form first: the
    /// previous rep is irrecoverable after shimmering.
    pub fn set_repr(&mut self, id: ObjId, repr: Repr) {
        self.ensure_string(id);
        let old = std::mem::replace(&mut self.get_mut(id).repr, repr);
        self.release_repr(old);
    }

    /// Drops the cached string form; only valid for reps that can rebuild it.
    pub fn invalidate_string(&mut self, id: ObjId) {
        let obj = self.get_mut(id);
        if obj.repr.can_regenerate_string() {
            obj.bytes = None;
        }
    }
}
