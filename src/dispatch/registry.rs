//! dispatch::registry
//!
//! Process-wide arena from integer payload ids to live payload state.
//!
//! Native callbacks carry only an opaque integer. Each installed shim
//! captures a [`PayloadId`] and resolves it here on every invocation, so
//! no pointer to host state ever crosses the boundary.
//!
//! # Invariants
//!
//! - A [`PayloadId`] packs a slot index and a generation.
//! - Removing an entry bumps the slot's generation before reuse, so a stale
//!   id never resolves to a newer payload.
//! - Resolution is type-checked: asking for the wrong state type yields
//!   `None` rather than a bogus cast.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::Error;

/// Opaque handle to a registered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadId(u64);

impl PayloadId {
    fn new(index: u32, generation: u32) -> Self {
        PayloadId((u64::from(generation) << 32) | u64::from(index))
    }

    /// Slot index within the arena.
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation of the slot when this id was issued.
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The packed integer handed to native code.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Rebuild an id from its packed integer.
    pub fn from_raw(raw: u64) -> Self {
        PayloadId(raw)
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index(), self.generation())
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Generational arena of type-erased entries.
#[derive(Default)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Registry {
    pub(crate) const fn new() -> Self {
        Registry {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, entry: Entry) -> Result<PayloadId, Error> {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.entry = Some(entry);
                return Ok(PayloadId::new(index, slot.generation));
            }
        }
        let index = next_index(self.slots.len())?;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        Ok(PayloadId::new(index, 0))
    }

    pub(crate) fn get(&self, id: PayloadId) -> Option<Entry> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.clone()
    }

    pub(crate) fn remove(&mut self, id: PayloadId) -> Option<Entry> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        Some(entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }
}

/// Index of a new slot appended after `len` existing ones.
fn next_index(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::RegistryFull)
}

static PAYLOADS: Mutex<Registry> = Mutex::new(Registry::new());

fn payloads() -> MutexGuard<'static, Registry> {
    // Every mutation leaves the arena consistent, so a poisoned lock is safe to reuse.
    PAYLOADS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register shared payload state and return its handle.
pub(crate) fn register<T: Any + Send + Sync>(state: Arc<T>) -> Result<PayloadId, Error> {
    payloads().insert(state)
}

/// Resolve a handle to its state, checking the state type.
pub(crate) fn resolve<T: Any + Send + Sync>(id: PayloadId) -> Option<Arc<T>> {
    let entry = payloads().get(id)?;
    entry.downcast::<T>().ok()
}

/// Drop the registry's reference to a payload.
pub(crate) fn unregister(id: PayloadId) -> bool {
    payloads().remove(id).is_some()
}

/// Number of payloads currently registered.
pub fn live_payloads() -> usize {
    payloads().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut registry = Registry::new();
        let id = registry.insert(Arc::new(41_u32)).unwrap();
        let entry = registry.get(id).expect("entry");
        assert_eq!(*entry.downcast::<u32>().expect("u32"), 41);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removed_ids_do_not_resolve() {
        let mut registry = Registry::new();
        let id = registry.insert(Arc::new("a")).unwrap();
        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.remove(id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut registry = Registry::new();
        let first = registry.insert(Arc::new(1_u8)).unwrap();
        registry.remove(first);
        let second = registry.insert(Arc::new(2_u8)).unwrap();

        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
    }

    #[test]
    fn resolve_checks_type() {
        let id = register(Arc::new(String::from("state"))).unwrap();
        assert!(resolve::<u64>(id).is_none());
        assert_eq!(resolve::<String>(id).as_deref().map(String::as_str), Some("state"));
        assert!(unregister(id));
        assert!(resolve::<String>(id).is_none());
    }

    #[test]
    fn slot_index_fits_in_u32() {
        assert_eq!(next_index(0).unwrap(), 0);
        assert_eq!(next_index(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn slot_index_past_u32_is_registry_full() {
        let err = next_index(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, Error::RegistryFull), "got {err:?}");
    }

    #[test]
    fn raw_round_trip() {
        let id = PayloadId::new(7, 3);
        assert_eq!(PayloadId::from_raw(id.as_raw()), id);
        assert_eq!(id.to_string(), "7#3");
    }
}
