//! Script-visible references and their garbage collector.
//!
//! A reference is a table entry whose only script-level handle is a
//! fixed-width token string. References can form arbitrary cycles that
//! refcounting never reclaims, so collection is a conservative sweep: scan
//! the canonical string of every live value that could embed a token, mark
//! the ids found, and drop table entries nobody mentions. Finalizers run as
//! ordinary commands with the interpreter result saved and restored; their
//! failures are swallowed.

use std::time::{Duration, Instant};

use ahash::AHashSet;

use crate::{
    flow::{FlowResult, Interrupt},
    heap::ObjId,
    interp::Interp,
    value::{Repr, lossy},
};

/// One reference-table entry; both values are owned.
#[derive(Debug)]
pub(crate) struct RefRecord {
    pub value: ObjId,
    /// Command name invoked as `finalizer token value` at collection.
    pub finalizer: Option<ObjId>,
}

/// Token prefix; a full token is `~reference:<20 digits>:` — 32 bytes.
const TOKEN_PREFIX: &[u8] = b"~reference:";
const TOKEN_DIGITS: usize = 20;

/// Collect when this many ids were handed out since the last sweep.
const COLLECT_ID_THRESHOLD: u64 = 5000;
/// Or when this much time has passed.
const COLLECT_PERIOD: Duration = Duration::from_secs(300);

/// The canonical 32-byte token for a reference id.
pub(crate) fn reference_token(id: u64) -> Vec<u8> {
    format!("~reference:{id:020}:").into_bytes()
}

fn parse_reference_token(text: &[u8]) -> Option<u64> {
    if text.len() != TOKEN_PREFIX.len() + TOKEN_DIGITS + 1 {
        return None;
    }
    scan_token_at(text, 0)
}

/// Decodes a token starting at `pos`, returning its id.
fn scan_token_at(text: &[u8], pos: usize) -> Option<u64> {
    let digits = text.get(pos + TOKEN_PREFIX.len()..pos + TOKEN_PREFIX.len() + TOKEN_DIGITS)?;
    if *text.get(pos + TOKEN_PREFIX.len() + TOKEN_DIGITS)? != b':' {
        return None;
    }
    if !text[pos..].starts_with(TOKEN_PREFIX) {
        return None;
    }
    let mut id: u64 = 0;
    for &d in digits {
        if !d.is_ascii_digit() {
            return None;
        }
        id = id.wrapping_mul(10).wrapping_add(u64::from(d - b'0'));
    }
    Some(id)
}

/// Scans arbitrary text for embedded reference tokens.
pub(crate) fn scan_reference_ids(text: &[u8], marked: &mut AHashSet<u64>) {
    if text.len() < TOKEN_PREFIX.len() + TOKEN_DIGITS + 1 {
        return;
    }
    let mut pos = 0;
    while pos + TOKEN_PREFIX.len() + TOKEN_DIGITS + 1 <= text.len() {
        if text[pos] == b'~' && let Some(id) = scan_token_at(text, pos) {
            marked.insert(id);
            pos += TOKEN_PREFIX.len() + TOKEN_DIGITS + 1;
        } else {
            pos += 1;
        }
    }
}

impl Interp {
    /// Creates a reference; ownership of `value` and `finalizer` transfers
    /// to the table. Returns the token value.
    pub(crate) fn new_reference(&mut self, value: ObjId, finalizer: Option<ObjId>) -> ObjId {
        let ref_id = self.ref_next_id;
        self.ref_next_id += 1;
        self.references.insert(ref_id, RefRecord { value, finalizer });
        self.heap.alloc(Some(reference_token(ref_id)), Repr::Reference(ref_id))
    }

    /// Decodes a token value to its reference id, caching the decode.
    pub(crate) fn reference_id(&mut self, token: ObjId) -> FlowResult<u64> {
        if let Repr::Reference(ref_id) = self.heap.get(token).repr {
            return Ok(ref_id);
        }
        let text = self.heap.get_string(token).to_vec();
        match parse_reference_token(&text) {
            Some(ref_id) => {
                self.heap.set_repr(token, Repr::Reference(ref_id));
                Ok(ref_id)
            }
            None => Err(Interrupt::error(format!("expected reference but got '{}'", lossy(&text)))),
        }
    }

    /// Runs a collection after reference creation when enough ids or time
    /// have passed since the last one.
    pub(crate) fn maybe_collect(&mut self) {
        if self.ref_next_id - self.last_collect_id >= COLLECT_ID_THRESHOLD
            || self.last_collect_time.elapsed() >= COLLECT_PERIOD
        {
            self.collect_references();
        }
    }

    /// Mark by string scan, then sweep the reference table.
    pub(crate) fn collect_references(&mut self) -> usize {
        if self.collecting {
            return 0;
        }
        self.collecting = true;

        let mut marked: AHashSet<u64> = AHashSet::new();
        for id in self.heap.live_ids() {
            if !self.heap.is_live(id) {
                continue;
            }
            match &self.heap.get(id).repr {
                Repr::Reference(ref_id) => {
                    marked.insert(*ref_id);
                    continue;
                }
                repr if repr.may_contain_references() => {}
                _ => continue,
            }
            let text = self.heap.get_string(id).to_vec();
            scan_reference_ids(&text, &mut marked);
        }

        let dead: Vec<u64> = self.references.keys().filter(|id| !marked.contains(id)).copied().collect();
        let collected = dead.len();
        for ref_id in dead {
            let Some(record) = self.references.remove(&ref_id) else { continue };
            match record.finalizer {
                Some(finalizer) => {
                    let token = self.heap.alloc(Some(reference_token(ref_id)), Repr::Reference(ref_id));
                    let saved = self.result;
                    self.heap.inc_ref(saved);
                    let argv = [finalizer, token, record.value];
                    match self.eval_vector(&argv) {
                        Ok(value) => self.heap.dec_ref(value),
                        Err(Interrupt::Return { value, .. }) => self.heap.dec_ref(value),
                        Err(_) => {
                            self.error_flag = false;
                        }
                    }
                    self.store_result(saved);
                    self.heap.dec_ref(token);
                    self.heap.dec_ref(finalizer);
                    self.heap.dec_ref(record.value);
                }
                None => self.heap.dec_ref(record.value),
            }
        }

        log::debug!("reference collection: {collected} reclaimed, {} live", self.references.len());
        self.pool.purge();
        self.last_collect_id = self.ref_next_id;
        self.last_collect_time = Instant::now();
        self.collecting = false;
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn token_format_is_32_bytes() {
        let token = reference_token(7);
        assert_eq!(token.len(), 32);
        assert_eq!(token, b"~reference:00000000000000000007:");
    }

    #[test]
    fn token_round_trips() {
        for id in [0, 1, 99_999, u64::from(u32::MAX)] {
            assert_eq!(parse_reference_token(&reference_token(id)), Some(id));
        }
        assert_eq!(parse_reference_token(b"~reference:123:"), None);
        assert_eq!(parse_reference_token(b"~reference:0000000000000000000x:"), None);
    }

    #[test]
    fn scan_finds_embedded_tokens() {
        let mut text = b"prefix ".to_vec();
        text.extend_from_slice(&reference_token(5));
        text.extend_from_slice(b" middle ");
        text.extend_from_slice(&reference_token(9));
        let mut marked = AHashSet::new();
        scan_reference_ids(&text, &mut marked);
        assert!(marked.contains(&5));
        assert!(marked.contains(&9));
        assert_eq!(marked.len(), 2);
    }

    #[test]
    fn scan_ignores_malformed_tokens() {
        let mut marked = AHashSet::new();
        scan_reference_ids(b"~reference:123: ~reference:aaaaaaaaaaaaaaaaaaaa:", &mut marked);
        assert!(marked.is_empty());
    }
}
