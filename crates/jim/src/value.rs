//! Internal representations and conversions for values.
//!
//! Every value is a byte string first; the internal rep is a cache of the
//! last structured interpretation. Conversions ("shimmering") materialize the
//! string form, drop the old rep, and install the new one, so the string form
//! is the only thing guaranteed to survive a value's lifetime.

use std::{borrow::Cow, num::IntErrorKind, rc::Rc, str::FromStr};

use indexmap::IndexMap;

use crate::{
    expr::ExprRep,
    flow::{FlowResult, Interrupt, ReturnCode},
    heap::{Heap, ObjId},
    parse::parse_list_elements,
    reference::reference_token,
    registry::Cmd,
    script::ScriptRep,
};

/// Dictionary rep: canonical key bytes to value, insertion-ordered.
pub(crate) type DictRep = IndexMap<Box<[u8]>, ObjId, ahash::RandomState>;

/// A resolved list index. `EndOffset(k)` means `end-k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListIndex {
    Abs(i64),
    EndOffset(i64),
}

impl ListIndex {
    /// The in-range position, if any.
    pub fn resolve(self, len: usize) -> Option<usize> {
        let idx = self.effective(len);
        if idx >= 0 && (idx as usize) < len { Some(idx as usize) } else { None }
    }

    /// The signed position without range checking; used by range commands
    /// that clamp instead of failing.
    pub fn effective(self, len: usize) -> i64 {
        match self {
            Self::Abs(v) => v,
            Self::EndOffset(k) => len as i64 - 1 - k,
        }
    }
}

/// File/line provenance of a string sourced from a script file.
#[derive(Debug, Clone)]
pub(crate) struct SourceInfo {
    pub file: Rc<str>,
    pub line: u32,
}

/// Cached resolution of a variable name.
#[derive(Debug, Clone)]
pub(crate) struct VarNameRep {
    /// `Some((name, key))` when the name uses dict sugar `name(key)`.
    pub sugar: Option<(Box<[u8]>, Box<[u8]>)>,
    /// `(frame uid the lookup ran in, owning frame index, slot)`; stale when
    /// the current frame's uid differs.
    pub cache: Option<(u64, usize, usize)>,
}

/// Cached resolution of a command name, validated against the registry epoch.
#[derive(Debug, Clone)]
pub(crate) struct CmdNameRep {
    pub epoch: u64,
    pub cmd: Cmd,
}

/// The typed internal representation of a value.
#[derive(Debug)]
pub(crate) enum Repr {
    /// No structured interpretation; the byte string is the value.
    Plain,
    Int(i64),
    Double(f64),
    /// Owned element references.
    List(Vec<ObjId>),
    /// Canonical key bytes to owned value references.
    Dict(DictRep),
    /// Compiled script (or substitution template, see `ScriptRep::subst`).
    Script(Rc<ScriptRep>),
    /// Compiled expression program.
    Expr(Rc<ExprRep>),
    Index(ListIndex),
    Return(ReturnCode),
    /// Affirmative comparison cache: the keyword this string last equaled.
    MatchedLiteral(&'static str),
    Source(SourceInfo),
    VarName(VarNameRep),
    CmdName(CmdNameRep),
    /// A garbage-collected reference token; the id indexes the interpreter's
    /// reference table.
    Reference(u64),
}

impl Repr {
    /// Whether the byte string can be rebuilt from this rep alone. Reps that
    /// cannot are only ever installed on values that already carry a string.
    pub fn can_regenerate_string(&self) -> bool {
        matches!(
            self,
            Self::Int(_)
                | Self::Double(_)
                | Self::List(_)
                | Self::Dict(_)
                | Self::Index(_)
                | Self::Return(_)
                | Self::Reference(_)
        )
    }

    /// Whether this rep's canonical string could embed reference tokens.
    /// Numeric and positional reps cannot; anything string-shaped can.
    pub fn may_contain_references(&self) -> bool {
        matches!(
            self,
            Self::Plain
                | Self::List(_)
                | Self::Dict(_)
                | Self::Script(_)
                | Self::Expr(_)
                | Self::MatchedLiteral(_)
                | Self::Source(_)
                | Self::VarName(_)
                | Self::CmdName(_)
        )
    }
}

/// Lossy display form for error messages.
pub(crate) fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

pub(crate) enum IntParseError {
    Invalid,
    TooBig,
}

/// Parses a 64-bit integer from trimmed bytes; decimal or `0x` hex.
pub(crate) fn parse_int_bytes(bytes: &[u8]) -> Result<i64, IntParseError> {
    let trimmed = bytes.trim_ascii();
    let Ok(text) = std::str::from_utf8(trimmed) else {
        return Err(IntParseError::Invalid);
    };
    if text.is_empty() {
        return Err(IntParseError::Invalid);
    }
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let negative = text.starts_with('-');
    let parsed = if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map(|v| if negative { v.wrapping_neg() } else { v })
    } else {
        text.parse::<i64>()
    };
    parsed.map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => IntParseError::TooBig,
        _ => IntParseError::Invalid,
    })
}

/// Parses a double from trimmed bytes.
pub(crate) fn parse_double_bytes(bytes: &[u8]) -> Option<f64> {
    let trimmed = bytes.trim_ascii();
    let text = std::str::from_utf8(trimmed).ok()?;
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok()
}

fn parse_index_bytes(bytes: &[u8]) -> Option<ListIndex> {
    let trimmed = bytes.trim_ascii();
    if trimmed == b"end" {
        return Some(ListIndex::EndOffset(0));
    }
    if let Some(rest) = trimmed.strip_prefix(b"end-") {
        let offset = std::str::from_utf8(rest).ok()?.parse::<i64>().ok()?;
        if offset < 0 {
            return None;
        }
        return Some(ListIndex::EndOffset(offset));
    }
    match parse_int_bytes(trimmed) {
        Ok(v) => Some(ListIndex::Abs(v)),
        Err(_) => None,
    }
}

/// Canonical string form of a double: shortest representation that parses
/// back to the same value and always re-reads as a double.
pub(crate) fn format_double(value: f64) -> Vec<u8> {
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).as_bytes().to_vec()
}

fn format_index(index: ListIndex) -> Vec<u8> {
    match index {
        ListIndex::Abs(v) => v.to_string().into_bytes(),
        ListIndex::EndOffset(0) => b"end".to_vec(),
        ListIndex::EndOffset(k) => format!("end-{k}").into_bytes(),
    }
}

enum QuoteMode {
    Bare,
    Brace,
    Escape,
}

fn list_quote_mode(element: &[u8]) -> QuoteMode {
    if element.is_empty() {
        return QuoteMode::Brace;
    }
    let mut level = 0i32;
    let mut special = element[0] == b'#';
    let mut brace_ok = true;
    let mut i = 0;
    while i < element.len() {
        match element[i] {
            b'{' => {
                level += 1;
                special = true;
            }
            b'}' => {
                level -= 1;
                special = true;
                if level < 0 {
                    brace_ok = false;
                }
            }
            b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r' | b';' | b'"' | b'$' | b'[' | b']' => special = true,
            b'\\' => {
                special = true;
                if i + 1 == element.len() {
                    brace_ok = false;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    if level != 0 {
        brace_ok = false;
    }
    if !special {
        QuoteMode::Bare
    } else if brace_ok {
        QuoteMode::Brace
    } else {
        QuoteMode::Escape
    }
}

/// Appends `element` to `out` quoted so that re-parsing the result as a list
/// yields the element bytes back.
pub(crate) fn quote_list_element(out: &mut Vec<u8>, element: &[u8]) {
    match list_quote_mode(element) {
        QuoteMode::Bare => out.extend_from_slice(element),
        QuoteMode::Brace => {
            out.push(b'{');
            out.extend_from_slice(element);
            out.push(b'}');
        }
        QuoteMode::Escape => {
            for &c in element {
                match c {
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\t' => out.extend_from_slice(b"\\t"),
                    b'\r' => out.extend_from_slice(b"\\r"),
                    0x0b => out.extend_from_slice(b"\\v"),
                    0x0c => out.extend_from_slice(b"\\f"),
                    b' ' | b';' | b'"' | b'$' | b'[' | b']' | b'{' | b'}' | b'\\' | b'#' => {
                        out.push(b'\\');
                        out.push(c);
                    }
                    _ => out.push(c),
                }
            }
        }
    }
}

enum RegenPlan {
    List(Vec<ObjId>),
    Dict(Vec<(Box<[u8]>, ObjId)>),
}

impl Heap {
    pub(crate) fn new_string(&mut self, bytes: Vec<u8>) -> ObjId {
        self.alloc(Some(bytes), Repr::Plain)
    }

    pub(crate) fn new_str(&mut self, s: &str) -> ObjId {
        self.new_string(s.as_bytes().to_vec())
    }

    pub(crate) fn new_int(&mut self, value: i64) -> ObjId {
        self.alloc(None, Repr::Int(value))
    }

    pub(crate) fn new_bool(&mut self, value: bool) -> ObjId {
        self.new_int(i64::from(value))
    }

    pub(crate) fn new_double(&mut self, value: f64) -> ObjId {
        self.alloc(None, Repr::Double(value))
    }

    /// Builds a list value; ownership of the element references transfers to
    /// the list.
    pub(crate) fn new_list(&mut self, elements: Vec<ObjId>) -> ObjId {
        self.alloc(None, Repr::List(elements))
    }

    /// Materializes the byte-string rep if absent.
    pub(crate) fn ensure_string(&mut self, id: ObjId) {
        if self.get(id).bytes.is_some() {
            return;
        }
        let bytes = self.regen_string(id);
        self.get_mut(id).bytes = Some(bytes);
    }

    /// The canonical byte string, regenerating it if necessary.
    pub(crate) fn get_string(&mut self, id: ObjId) -> &[u8] {
        self.ensure_string(id);
        self.get(id).bytes.as_deref().expect("string rep just materialized")
    }

    fn regen_string(&mut self, id: ObjId) -> Vec<u8> {
        let plan = match &self.get(id).repr {
            Repr::Int(v) => return v.to_string().into_bytes(),
            Repr::Double(v) => return format_double(*v),
            Repr::Index(ix) => return format_index(*ix),
            Repr::Return(code) => return code.to_string().into_bytes(),
            Repr::Reference(ref_id) => return reference_token(*ref_id),
            Repr::List(elements) => RegenPlan::List(elements.clone()),
            Repr::Dict(map) => RegenPlan::Dict(map.iter().map(|(k, &v)| (k.clone(), v)).collect()),
            other => unreachable!("string rep absent for non-regenerable rep {other:?}"),
        };
        let mut out = Vec::new();
        match plan {
            RegenPlan::List(elements) => {
                for (i, &element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    let text = self.get_string(element).to_vec();
                    quote_list_element(&mut out, &text);
                }
            }
            RegenPlan::Dict(pairs) => {
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    quote_list_element(&mut out, key);
                    out.push(b' ');
                    let text = self.get_string(*value).to_vec();
                    quote_list_element(&mut out, &text);
                }
            }
        }
        out
    }

    /// Deep-copies a value: the string rep is cloned and container reps share
    /// their children by reference count.
    pub(crate) fn dup_obj(&mut self, id: ObjId) -> ObjId {
        let bytes = self.get(id).bytes.clone();
        let repr = match &self.get(id).repr {
            Repr::Plain => Repr::Plain,
            &Repr::Int(v) => Repr::Int(v),
            &Repr::Double(v) => Repr::Double(v),
            Repr::List(elements) => Repr::List(elements.clone()),
            Repr::Dict(map) => Repr::Dict(map.clone()),
            Repr::Script(rep) => Repr::Script(Rc::clone(rep)),
            Repr::Expr(rep) => Repr::Expr(Rc::clone(rep)),
            &Repr::Index(ix) => Repr::Index(ix),
            &Repr::Return(code) => Repr::Return(code),
            &Repr::MatchedLiteral(lit) => Repr::MatchedLiteral(lit),
            Repr::Source(info) => Repr::Source(info.clone()),
            Repr::VarName(rep) => Repr::VarName(rep.clone()),
            Repr::CmdName(rep) => Repr::CmdName(rep.clone()),
            &Repr::Reference(ref_id) => Repr::Reference(ref_id),
        };
        let children: Vec<ObjId> = match &repr {
            Repr::List(elements) => elements.clone(),
            Repr::Dict(map) => map.values().copied().collect(),
            _ => Vec::new(),
        };
        for child in children {
            self.inc_ref(child);
        }
        self.alloc(bytes, repr)
    }

    /// Appends bytes to a value, coercing it to a plain string. Must only be
    /// called on unshared values (callers copy-on-write first).
    pub(crate) fn append_obj_bytes(&mut self, id: ObjId, more: &[u8]) {
        debug_assert!(!self.is_shared(id), "append to a shared value");
        self.ensure_string(id);
        let old = {
            let obj = self.get_mut(id);
            obj.bytes.as_mut().expect("string rep just materialized").extend_from_slice(more);
            std::mem::replace(&mut obj.repr, Repr::Plain)
        };
        self.release_repr(old);
    }

    /// Byte equality of canonical strings.
    pub(crate) fn string_eq(&mut self, a: ObjId, b: ObjId) -> bool {
        if a == b {
            return true;
        }
        let left = self.get_string(a).to_vec();
        left.as_slice() == self.get_string(b)
    }

    /// Fast equality against a static keyword, caching an affirmative result
    /// so repeated dispatch on the same word skips the byte compare.
    pub(crate) fn compare_string_immediate(&mut self, id: ObjId, lit: &'static str) -> bool {
        if let Repr::MatchedLiteral(cached) = self.get(id).repr
            && cached == lit
        {
            return true;
        }
        let equal = self.get_string(id) == lit.as_bytes();
        if equal && matches!(self.get(id).repr, Repr::Plain | Repr::MatchedLiteral(_) | Repr::Source(_)) {
            self.set_repr(id, Repr::MatchedLiteral(lit));
        }
        equal
    }

    pub(crate) fn get_int(&mut self, id: ObjId) -> FlowResult<i64> {
        if let Repr::Int(v) = self.get(id).repr {
            return Ok(v);
        }
        let text = self.get_string(id).to_vec();
        match parse_int_bytes(&text) {
            Ok(v) => {
                self.set_repr(id, Repr::Int(v));
                Ok(v)
            }
            Err(IntParseError::TooBig) => Err(Interrupt::error("integer value too big to be represented")),
            Err(IntParseError::Invalid) => {
                Err(Interrupt::error(format!("expected integer but got '{}'", lossy(&text))))
            }
        }
    }

    /// Integer interpretation without raising; `None` for doubles and
    /// non-numeric strings. Used by the expression VM's integer-first rule:
    /// a value whose rep is a double never takes the integer path.
    pub(crate) fn probe_int(&mut self, id: ObjId) -> Option<i64> {
        match self.get(id).repr {
            Repr::Int(v) => return Some(v),
            Repr::Double(_) => return None,
            _ => {}
        }
        let text = self.get_string(id).to_vec();
        match parse_int_bytes(&text) {
            Ok(v) => {
                self.set_repr(id, Repr::Int(v));
                Some(v)
            }
            Err(_) => None,
        }
    }

    pub(crate) fn is_double_repr(&self, id: ObjId) -> bool {
        matches!(self.get(id).repr, Repr::Double(_))
    }

    pub(crate) fn get_double(&mut self, id: ObjId) -> FlowResult<f64> {
        match self.get(id).repr {
            Repr::Int(v) => return Ok(v as f64),
            Repr::Double(v) => return Ok(v),
            _ => {}
        }
        let text = self.get_string(id).to_vec();
        if let Ok(v) = parse_int_bytes(&text) {
            self.set_repr(id, Repr::Int(v));
            return Ok(v as f64);
        }
        match parse_double_bytes(&text) {
            Some(v) => {
                self.set_repr(id, Repr::Double(v));
                Ok(v)
            }
            None => Err(Interrupt::error(format!("expected number but got '{}'", lossy(&text)))),
        }
    }

    pub(crate) fn get_boolean(&mut self, id: ObjId) -> FlowResult<bool> {
        match self.get(id).repr {
            Repr::Int(v) => return Ok(v != 0),
            Repr::Double(v) => return Ok(v != 0.0),
            _ => {}
        }
        let value = self.get_double(id)?;
        Ok(value != 0.0)
    }

    pub(crate) fn get_index(&mut self, id: ObjId) -> FlowResult<ListIndex> {
        if let Repr::Index(ix) = self.get(id).repr {
            return Ok(ix);
        }
        let text = self.get_string(id).to_vec();
        match parse_index_bytes(&text) {
            Some(ix) => {
                self.set_repr(id, Repr::Index(ix));
                Ok(ix)
            }
            None => Err(Interrupt::error(format!("bad index \"{}\"", lossy(&text)))),
        }
    }

    pub(crate) fn get_return_code(&mut self, id: ObjId) -> FlowResult<ReturnCode> {
        if let Repr::Return(code) = self.get(id).repr {
            return Ok(code);
        }
        let text = self.get_string(id).to_vec();
        let code = std::str::from_utf8(&text)
            .ok()
            .and_then(|t| ReturnCode::from_str(t.trim()).ok())
            .or_else(|| parse_int_bytes(&text).ok().and_then(ReturnCode::from_int));
        match code {
            Some(code) => {
                self.set_repr(id, Repr::Return(code));
                Ok(code)
            }
            None => Err(Interrupt::error(format!("expected return code but got '{}'", lossy(&text)))),
        }
    }

    /// Converts to a list rep in place. Any string is a valid list, so this
    /// cannot fail; dictionaries convert pairwise without a string round
    /// trip.
    pub(crate) fn ensure_list(&mut self, id: ObjId) {
        match &self.get(id).repr {
            Repr::List(_) => return,
            Repr::Dict(map) => {
                let pairs: Vec<(Box<[u8]>, ObjId)> = map.iter().map(|(k, &v)| (k.clone(), v)).collect();
                let mut elements = Vec::with_capacity(pairs.len() * 2);
                for (key, value) in pairs {
                    let key_obj = self.new_string(key.into_vec());
                    self.inc_ref(value);
                    elements.push(key_obj);
                    elements.push(value);
                }
                self.set_repr(id, Repr::List(elements));
                return;
            }
            _ => {}
        }
        let source = self.get_string(id).to_vec();
        let mut elements = Vec::new();
        for piece in parse_list_elements(&source) {
            elements.push(self.new_string(piece));
        }
        self.set_repr(id, Repr::List(elements));
    }

    pub(crate) fn list_len(&mut self, id: ObjId) -> usize {
        self.ensure_list(id);
        match &self.get(id).repr {
            Repr::List(elements) => elements.len(),
            _ => unreachable!("just converted to list"),
        }
    }

    /// Element ids without reference transfer; callers needing to hold one
    /// past the next heap mutation must `inc_ref` it.
    pub(crate) fn list_elements(&mut self, id: ObjId) -> Vec<ObjId> {
        self.ensure_list(id);
        match &self.get(id).repr {
            Repr::List(elements) => elements.clone(),
            _ => unreachable!("just converted to list"),
        }
    }

    pub(crate) fn list_get(&mut self, id: ObjId, index: usize) -> Option<ObjId> {
        self.ensure_list(id);
        match &self.get(id).repr {
            Repr::List(elements) => elements.get(index).copied(),
            _ => unreachable!("just converted to list"),
        }
    }

    /// Appends an element; ownership of the element reference transfers.
    pub(crate) fn list_push(&mut self, id: ObjId, element: ObjId) {
        debug_assert!(!self.is_shared(id), "mutation of a shared list");
        self.ensure_list(id);
        self.invalidate_string(id);
        match &mut self.get_mut(id).repr {
            Repr::List(elements) => elements.push(element),
            _ => unreachable!("just converted to list"),
        }
    }

    /// Replaces the element at `index`; ownership of the new element
    /// reference transfers and the old element is released.
    pub(crate) fn list_replace(&mut self, id: ObjId, index: usize, element: ObjId) {
        debug_assert!(!self.is_shared(id), "mutation of a shared list");
        self.ensure_list(id);
        self.invalidate_string(id);
        let old = match &mut self.get_mut(id).repr {
            Repr::List(elements) => std::mem::replace(&mut elements[index], element),
            _ => unreachable!("just converted to list"),
        };
        self.dec_ref(old);
    }

    /// Converts to a dict rep in place; fails on an odd element count.
    pub(crate) fn ensure_dict(&mut self, id: ObjId) -> FlowResult<()> {
        if matches!(&self.get(id).repr, Repr::Dict(_)) {
            return Ok(());
        }
        let elements = self.list_elements(id);
        if elements.len() % 2 != 0 {
            return Err(Interrupt::error("missing value to go with key"));
        }
        let mut map = DictRep::default();
        for pair in elements.chunks(2) {
            let key = self.get_string(pair[0]).to_vec().into_boxed_slice();
            self.inc_ref(pair[1]);
            if let Some(old) = map.insert(key, pair[1]) {
                self.dec_ref(old);
            }
        }
        self.set_repr(id, Repr::Dict(map));
        Ok(())
    }

    pub(crate) fn dict_len(&mut self, id: ObjId) -> FlowResult<usize> {
        self.ensure_dict(id)?;
        match &self.get(id).repr {
            Repr::Dict(map) => Ok(map.len()),
            _ => unreachable!("just converted to dict"),
        }
    }

    pub(crate) fn dict_get(&mut self, id: ObjId, key: &[u8]) -> FlowResult<Option<ObjId>> {
        self.ensure_dict(id)?;
        match &self.get(id).repr {
            Repr::Dict(map) => Ok(map.get(key).copied()),
            _ => unreachable!("just converted to dict"),
        }
    }

    /// Inserts or replaces a key; ownership of the value reference transfers.
    pub(crate) fn dict_set(&mut self, id: ObjId, key: &[u8], value: ObjId) -> FlowResult<()> {
        debug_assert!(!self.is_shared(id), "mutation of a shared dict");
        self.ensure_dict(id)?;
        self.invalidate_string(id);
        let old = match &mut self.get_mut(id).repr {
            Repr::Dict(map) => map.insert(key.to_vec().into_boxed_slice(), value),
            _ => unreachable!("just converted to dict"),
        };
        if let Some(old) = old {
            self.dec_ref(old);
        }
        Ok(())
    }

    pub(crate) fn dict_remove(&mut self, id: ObjId, key: &[u8]) -> FlowResult<bool> {
        debug_assert!(!self.is_shared(id), "mutation of a shared dict");
        self.ensure_dict(id)?;
        self.invalidate_string(id);
        let old = match &mut self.get_mut(id).repr {
            Repr::Dict(map) => map.shift_remove(key),
            _ => unreachable!("just converted to dict"),
        };
        match old {
            Some(old) => {
                self.dec_ref(old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn dict_pairs(&mut self, id: ObjId) -> FlowResult<Vec<(Box<[u8]>, ObjId)>> {
        self.ensure_dict(id)?;
        match &self.get(id).repr {
            Repr::Dict(map) => Ok(map.iter().map(|(k, &v)| (k.clone(), v)).collect()),
            _ => unreachable!("just converted to dict"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn quoted(element: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        quote_list_element(&mut out, element);
        out
    }

    #[test]
    fn bare_elements_stay_bare() {
        assert_eq!(quoted(b"abc"), b"abc");
        assert_eq!(quoted(b"12.5"), b"12.5");
    }

    #[test]
    fn spaces_get_braced() {
        assert_eq!(quoted(b"a b"), b"{a b}");
        assert_eq!(quoted(b""), b"{}");
    }

    #[test]
    fn unbalanced_braces_get_escaped() {
        assert_eq!(quoted(b"}"), b"\\}");
        assert_eq!(quoted(b"a{"), b"a\\{");
    }

    #[test]
    fn quoting_round_trips() {
        let cases: &[&[u8]] = &[b"plain", b"two words", b"{inner}", b"}", b"end\\", b"new\nline", b"$var", b"[cmd]"];
        for &case in cases {
            let mut out = Vec::new();
            quote_list_element(&mut out, case);
            let parsed = parse_list_elements(&out);
            assert_eq!(parsed, vec![case.to_vec()], "round trip of {:?}", lossy(case));
        }
    }

    #[test]
    fn int_parsing() {
        assert!(matches!(parse_int_bytes(b" 42 "), Ok(42)));
        assert!(matches!(parse_int_bytes(b"-7"), Ok(-7)));
        assert!(matches!(parse_int_bytes(b"0x10"), Ok(16)));
        assert!(matches!(parse_int_bytes(b"99999999999999999999"), Err(IntParseError::TooBig)));
        assert!(matches!(parse_int_bytes(b"1.5"), Err(IntParseError::Invalid)));
        assert!(matches!(parse_int_bytes(b""), Err(IntParseError::Invalid)));
    }

    #[test]
    fn index_parsing() {
        assert_eq!(parse_index_bytes(b"3"), Some(ListIndex::Abs(3)));
        assert_eq!(parse_index_bytes(b"end"), Some(ListIndex::EndOffset(0)));
        assert_eq!(parse_index_bytes(b"end-2"), Some(ListIndex::EndOffset(2)));
        assert_eq!(parse_index_bytes(b"bogus"), None);
    }

    #[test]
    fn index_resolution() {
        assert_eq!(ListIndex::Abs(0).resolve(3), Some(0));
        assert_eq!(ListIndex::Abs(3).resolve(3), None);
        assert_eq!(ListIndex::EndOffset(0).resolve(3), Some(2));
        assert_eq!(ListIndex::EndOffset(2).resolve(3), Some(0));
        assert_eq!(ListIndex::EndOffset(3).resolve(3), None);
    }
}
