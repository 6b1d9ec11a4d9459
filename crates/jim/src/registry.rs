//! The command registry: one byte-name to command-record map per
//! interpreter.
//!
//! Cached command resolutions (the `CmdName` rep on name values) carry the
//! registry epoch; any delete or rename (and any create that replaces an
//! existing entry) bumps the epoch, so stale caches re-resolve instead of
//! dispatching to a dead record.
//!
//! Procedure records are `Rc`-shared between the registry and live callers:
//! deleting a procedure that is currently executing leaves its body alive
//! until the call returns (the last holder releases the body and argument
//! list through `Heap::release_cmd`).

use std::rc::Rc;

use ahash::AHashMap;

use crate::{commands::CoreCommand, heap::ObjId, interp::Interp};

/// Signature for host-registered commands: arguments (command name first) in,
/// result string or error message out.
pub type HostFn = fn(&mut Interp, &[String]) -> Result<String, String>;

/// A user procedure: argument names and a body script value.
#[derive(Debug)]
pub(crate) struct ProcDef {
    pub arglist: ObjId,
    pub body: ObjId,
    /// Positional parameter names, excluding the trailing `args` catch-all.
    pub formals: Vec<Box<[u8]>>,
    /// The last formal was the literal `args`: excess arguments collect into
    /// a list bound to it.
    pub catch_all: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Cmd {
    /// Built-in command, dispatched through the `CoreCommand` table.
    Native(CoreCommand),
    /// Host-registered native command.
    Host(HostFn),
    /// User procedure.
    Proc(Rc<ProcDef>),
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    map: AHashMap<Box<[u8]>, Cmd>,
    pub epoch: u64,
}

impl Registry {
    pub fn get(&self, name: &[u8]) -> Option<&Cmd> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.map.contains_key(name)
    }

    /// Creates or replaces a command. Replacing invalidates caches; the
    /// previous record is returned for the caller to release.
    pub fn insert(&mut self, name: &[u8], cmd: Cmd) -> Option<Cmd> {
        let old = self.map.insert(name.to_vec().into_boxed_slice(), cmd);
        if old.is_some() {
            self.epoch += 1;
            log::debug!("command {:?} replaced, epoch now {}", String::from_utf8_lossy(name), self.epoch);
        }
        old
    }

    /// Deletes a command, invalidating caches. The record is returned for
    /// the caller to release.
    pub fn remove(&mut self, name: &[u8]) -> Option<Cmd> {
        let old = self.map.remove(name);
        if old.is_some() {
            self.epoch += 1;
            log::debug!("command {:?} deleted, epoch now {}", String::from_utf8_lossy(name), self.epoch);
        }
        old
    }

    /// All command names, sorted for stable introspection output.
    pub fn names(&self) -> Vec<Vec<u8>> {
        let mut names: Vec<Vec<u8>> = self.map.keys().map(|n| n.to_vec()).collect();
        names.sort_unstable();
        names
    }

    /// Names of user procedures only, sorted.
    pub fn proc_names(&self) -> Vec<Vec<u8>> {
        let mut names: Vec<Vec<u8>> = self
            .map
            .iter()
            .filter(|(_, cmd)| matches!(cmd, Cmd::Proc(_)))
            .map(|(n, _)| n.to_vec())
            .collect();
        names.sort_unstable();
        names
    }
}
