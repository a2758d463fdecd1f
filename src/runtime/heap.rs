//! Peer heap - per-thread object store with reference counts
//!
//! Design: slot vector + free list, generation-tagged handles.
//! - Refcount hits zero: slot is vacated and its generation bumped
//! - Payloads are dropped after the heap borrow ends, so destructors
//!   (child releases, native `dealloc` slots) may re-enter the heap
//! - Every count unit created or destroyed is tallied in `HeapStats`

use std::any::Any;
use std::cell::RefCell;

use super::object::{Payload, PyObject, PyOwned};
use super::types::TypeDescriptor;
use crate::config;
use crate::logging::{log_acquire, log_alloc, log_dealloc, log_release};

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(Heap::default());
}

/// Reference accounting for the current thread's heap
///
/// `acquires` counts every count unit created (allocation included),
/// `releases` every unit destroyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_objects: usize,
    pub allocations: usize,
    pub deallocations: usize,
    pub acquires: usize,
    pub releases: usize,
}

impl HeapStats {
    /// Difference against an earlier snapshot
    pub fn since(&self, earlier: &HeapStats) -> HeapStats {
        HeapStats {
            live_objects: self.live_objects.saturating_sub(earlier.live_objects),
            allocations: self.allocations - earlier.allocations,
            deallocations: self.deallocations - earlier.deallocations,
            acquires: self.acquires - earlier.acquires,
            releases: self.releases - earlier.releases,
        }
    }

    /// Every unit created in this window was destroyed in it
    pub fn is_balanced(&self) -> bool {
        self.acquires == self.releases && self.allocations == self.deallocations
    }
}

#[derive(Default)]
struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    stats: HeapStats,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

struct Entry {
    refcount: usize,
    payload: Payload,
}

enum Released {
    Alive(usize),
    Dead(Payload),
}

/// Result of borrowing the state out of a native object
pub(crate) enum NativeAccess {
    Taken(&'static TypeDescriptor, Box<dyn Any>),
    /// A slot of this object is already running
    Busy(&'static str),
    NotNative(&'static str),
    Released,
}

impl Heap {
    fn entry(&self, obj: PyObject) -> Option<&Entry> {
        self.slots
            .get(obj.index())
            .filter(|slot| slot.generation == obj.generation())
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, obj: PyObject) -> Option<&mut Entry> {
        self.slots
            .get_mut(obj.index())
            .filter(|slot| slot.generation == obj.generation())
            .and_then(|slot| slot.entry.as_mut())
    }

    fn insert(&mut self, payload: Payload) -> PyObject {
        self.stats.allocations += 1;
        self.stats.acquires += 1;
        self.stats.live_objects += 1;

        let entry = Entry { refcount: 1, payload };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                PyObject::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len();
                debug_assert!(index < u32::MAX as usize, "peer heap exhausted");
                self.slots.push(Slot { generation: 0, entry: Some(entry) });
                PyObject::new(index as u32, 0)
            }
        }
    }

    fn decrement(&mut self, obj: PyObject) -> Option<Released> {
        let slot = self
            .slots
            .get_mut(obj.index())
            .filter(|slot| slot.generation == obj.generation())?;
        let entry = slot.entry.as_mut()?;

        entry.refcount -= 1;
        self.stats.releases += 1;
        if entry.refcount > 0 {
            return Some(Released::Alive(entry.refcount));
        }

        let payload = slot.entry.take()?.payload;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(obj.index() as u32);
        self.stats.deallocations += 1;
        self.stats.live_objects -= 1;
        Some(Released::Dead(payload))
    }
}

/// Allocate a new object; the returned owner holds its first count unit
pub(crate) fn alloc(payload: Payload) -> PyOwned {
    let type_name = payload.type_name();
    let obj = HEAP.with(|heap| heap.borrow_mut().insert(payload));

    if config::settings().trace_refcounts {
        log_alloc(obj, type_name);
    }
    PyOwned::from_raw(obj)
}

/// Increment the count of a live object
///
/// Panics on a released handle: acquiring a dead reference is a use-after-release.
pub fn acquire(obj: PyObject) {
    let count = HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        let count = {
            let entry = heap.entry_mut(obj)?;
            entry.refcount += 1;
            entry.refcount
        };
        heap.stats.acquires += 1;
        Some(count)
    });

    match count {
        Some(count) => {
            if config::settings().trace_refcounts {
                log_acquire(obj, count);
            }
        }
        None => panic!("acquire of released reference {obj:?}"),
    }
}

/// Decrement the count, deallocating at zero
///
/// Panics on a released handle: that is a double release.
pub fn release(obj: PyObject) {
    let outcome = HEAP.with(|heap| heap.borrow_mut().decrement(obj));

    match outcome {
        Some(Released::Alive(count)) => {
            if config::settings().trace_refcounts {
                log_release(obj, count);
            }
        }
        Some(Released::Dead(payload)) => {
            if config::settings().trace_refcounts {
                log_dealloc(obj, payload.type_name());
            }
            dispose(payload);
        }
        None => panic!("double release of {obj:?}"),
    }
}

/// Release from a destructor; skipped once the thread's heap is torn down
pub(crate) fn release_on_drop(obj: PyObject) {
    if HEAP.try_with(|_| ()).is_ok() {
        release(obj);
    }
}

fn dispose(payload: Payload) {
    match payload {
        Payload::Native { descriptor, state: Some(state) } => (descriptor.dealloc)(state),
        other => drop(other),
    }
}

/// Current count; 0 for a released handle
pub fn refcount(obj: PyObject) -> usize {
    HEAP.with(|heap| heap.borrow().entry(obj).map_or(0, |entry| entry.refcount))
}

pub fn is_alive(obj: PyObject) -> bool {
    HEAP.with(|heap| heap.borrow().entry(obj).is_some())
}

/// Accounting snapshot for this thread
pub fn stats() -> HeapStats {
    HEAP.with(|heap| heap.borrow().stats)
}

/// Read a payload. `f` must not touch the heap (no allocation, no release).
pub(crate) fn with_payload<R>(obj: PyObject, f: impl FnOnce(&Payload) -> R) -> Option<R> {
    HEAP.with(|heap| heap.borrow().entry(obj).map(|entry| f(&entry.payload)))
}

/// Mutate a payload. `f` must not touch the heap and must not drop owners.
pub(crate) fn with_payload_mut<R>(obj: PyObject, f: impl FnOnce(&mut Payload) -> R) -> Option<R> {
    HEAP.with(|heap| heap.borrow_mut().entry_mut(obj).map(|entry| f(&mut entry.payload)))
}

/// Move a native object's state out so a slot can run without a heap borrow
pub(crate) fn take_native_state(obj: PyObject) -> NativeAccess {
    HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        let Some(entry) = heap.entry_mut(obj) else {
            return NativeAccess::Released;
        };
        match &mut entry.payload {
            Payload::Native { descriptor, state } => match state.take() {
                Some(state) => NativeAccess::Taken(*descriptor, state),
                None => NativeAccess::Busy(descriptor.name),
            },
            other => NativeAccess::NotNative(other.type_name()),
        }
    })
}

/// Put state back after a slot ran; hands it back if the object died meanwhile
pub(crate) fn restore_native_state(obj: PyObject, state: Box<dyn Any>) -> Result<(), Box<dyn Any>> {
    HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        match heap.entry_mut(obj).map(|entry| &mut entry.payload) {
            Some(Payload::Native { state: slot @ None, .. }) => {
                *slot = Some(state);
                Ok(())
            }
            _ => Err(state),
        }
    })
}
