//! Alias registries mapping atoms to foreign handles.

use crate::atom_table::*;
use crate::machine::foreign::*;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use std::sync::Arc;

type AliasTable = IndexMap<Atom, ForeignHandle, FxBuildHasher>;

/// A named mapping from alias atoms to foreign handles.
///
/// Entries change only through [`register`](Self::register) and the
/// `unregister` family; nothing is evicted implicitly. Clones share the same
/// table, so a registry can be handed to several engines on several threads.
#[derive(Clone)]
pub struct AliasRegistry {
    kind: Atom,
    entries: Arc<Mutex<AliasTable>>,
}

impl AliasRegistry {
    /// An empty registry. `kind` names the resource in existence errors,
    /// e.g. `stream` in `existence_error(stream, Alias)`.
    pub fn new(kind: Atom) -> Self {
        AliasRegistry {
            kind,
            entries: Arc::new(Mutex::new(AliasTable::default())),
        }
    }

    /// The resource kind named in existence errors.
    #[inline]
    pub fn kind(&self) -> Atom {
        self.kind
    }

    /// Binds `alias` to `handle`. Returns false, leaving the registry
    /// unchanged, if the alias is already taken.
    pub fn register(&self, alias: Atom, handle: ForeignHandle) -> bool {
        let mut entries = self.entries.lock();

        if entries.contains_key(&alias) {
            return false;
        }

        debug!(kind = %self.kind, alias = %alias, handle = %handle, "registered alias");
        entries.insert(alias, handle);

        true
    }

    /// Removes `alias`, returning the handle it was bound to.
    pub fn unregister(&self, alias: Atom) -> Option<ForeignHandle> {
        let handle = self.entries.lock().shift_remove(&alias);

        if let Some(handle) = &handle {
            debug!(kind = %self.kind, alias = %alias, handle = %handle, "unregistered alias");
        }

        handle
    }

    /// Removes `alias` only while it is still bound to `handle`.
    pub fn unregister_if(&self, alias: Atom, handle: &ForeignHandle) -> bool {
        let mut entries = self.entries.lock();

        if entries.get(&alias) != Some(handle) {
            return false;
        }

        entries.shift_remove(&alias);
        debug!(kind = %self.kind, alias = %alias, handle = %handle, "unregistered alias");

        true
    }

    /// Removes every alias bound to `handle`, returning them.
    pub fn unregister_handle(&self, handle: &ForeignHandle) -> Vec<Atom> {
        let mut entries = self.entries.lock();
        let mut removed = vec![];

        entries.retain(|alias, h| {
            if h == handle {
                removed.push(*alias);
                false
            } else {
                true
            }
        });

        for alias in &removed {
            debug!(kind = %self.kind, alias = %alias, handle = %handle, "unregistered alias");
        }

        removed
    }

    /// The handle registered under `alias`.
    #[inline]
    pub fn lookup(&self, alias: Atom) -> Option<ForeignHandle> {
        self.entries.lock().get(&alias).cloned()
    }

    /// True if `alias` is registered.
    #[inline]
    pub fn contains(&self, alias: Atom) -> bool {
        self.entries.lock().contains_key(&alias)
    }

    /// Every alias bound to `handle`, in registration order.
    pub fn aliases_of(&self, handle: &ForeignHandle) -> Vec<Atom> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, h)| *h == handle)
            .map(|(alias, _)| *alias)
            .collect()
    }

    /// The number of registered aliases.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no alias is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// The alias registries builtins resolve resources through.
#[derive(Clone)]
pub struct Registries {
    /// Open streams, including `user_input`, `user_output` and `user_error`.
    pub streams: AliasRegistry,
    /// Named hash tables.
    pub hashes: AliasRegistry,
    /// Host objects reachable by `get_field/3` and `set_field/3`.
    pub objects: AliasRegistry,
}

assert_impl_all!(Registries: Send, Sync);

impl Default for Registries {
    fn default() -> Self {
        Registries {
            streams: AliasRegistry::new(atom!("stream")),
            hashes: AliasRegistry::new(atom!("hash")),
            objects: AliasRegistry::new(atom!("object")),
        }
    }
}
