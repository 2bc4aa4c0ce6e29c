//! Interface remap table
//!
//! Maps an ingress interface to the interface whose FIB view should be used
//! for lookups, e.g. a VXLAN device to its bridge master. Populated from
//! configuration, read on every packet.

use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Maximum number of remap entries.
pub const REMAP_CAPACITY: usize = 256;

#[derive(Debug, Default)]
pub struct InterfaceRemap {
    entries: RwLock<HashMap<u32, u32>>,
}

impl InterfaceRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `ingress -> lookup`.
    ///
    /// Replacing an existing key always succeeds; a new key fails once the
    /// table holds [`REMAP_CAPACITY`] entries.
    pub fn insert(&self, ingress: u32, lookup: u32) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= REMAP_CAPACITY && !entries.contains_key(&ingress) {
            return Err(Error::RemapTableFull {
                capacity: REMAP_CAPACITY,
            });
        }
        entries.insert(ingress, lookup);
        Ok(())
    }

    pub fn remove(&self, ingress: u32) -> Option<u32> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&ingress)
    }

    /// Drops every entry whose key or value fails `keep`.
    pub fn retain(&self, mut keep: impl FnMut(u32) -> bool) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|ingress, lookup| keep(*ingress) && keep(*lookup));
    }

    /// Interface to use for the FIB query. Unmapped interfaces map to
    /// themselves.
    #[inline]
    pub fn resolve(&self, ingress: u32) -> u32 {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&ingress)
            .copied()
            .unwrap_or(ingress)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
