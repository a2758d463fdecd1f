//! Type descriptors - slot tables for natively implemented peer objects
//!
//! Design: one immutable `TypeDescriptor` per concrete state type, built on
//! first use and leaked, so every instance of that type shares one table.
//! Slots receive the object as a borrowed handle; the typed state is lent to
//! them through `with_native_state` without holding any heap borrow.

use std::any::{type_name, Any, TypeId};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::error::{self, ExceptionKind};
use super::heap::{self, NativeAccess};
use super::object::{Payload, PyObject, PyOwned};
use crate::logging::{log_type_registered, trace};

/// Destroy the boxed state of an instance
pub type DeallocSlot = fn(Box<dyn Any>);
/// `iter(obj)`: new reference to an iterator, or `None` with an error set
pub type IterSlot = fn(PyObject) -> Option<PyOwned>;
/// `next(it)`: new reference, or `None` (error set = failure, clear = end)
pub type IterNextSlot = fn(PyObject) -> Option<PyOwned>;
/// Remaining-length estimate
pub type LengthHintSlot = fn(PyObject) -> Option<usize>;

/// Slot table shared by all instances of one native type
#[derive(Debug)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub doc: &'static str,
    pub dealloc: DeallocSlot,
    pub iter: Option<IterSlot>,
    pub iternext: Option<IterNextSlot>,
    pub length_hint: Option<LengthHintSlot>,
}

static REGISTRY: Lazy<DashMap<TypeId, &'static TypeDescriptor>> = Lazy::new(DashMap::new);

/// Descriptor for state type `S`, built by `build` the first time only
pub fn descriptor_for<S: Any>(build: impl FnOnce() -> TypeDescriptor) -> &'static TypeDescriptor {
    let id = TypeId::of::<S>();
    if let Some(found) = REGISTRY.get(&id) {
        return *found;
    }

    let entry = REGISTRY.entry(id).or_insert_with(|| {
        let descriptor: &'static TypeDescriptor = Box::leak(Box::new(build()));
        log_type_registered(descriptor.name, type_name::<S>());
        descriptor
    });
    *entry
}

/// Number of distinct native types registered so far
pub fn registered_count() -> usize {
    REGISTRY.len()
}

/// Generic `dealloc` slot: drops the state as `S`
pub fn dealloc_state<S: Any>(state: Box<dyn Any>) {
    trace!(target: "types", state = type_name::<S>(), "dropping native state");
    drop(state);
}

/// Create an instance of a native type
pub fn instantiate<S: Any>(descriptor: &'static TypeDescriptor, state: S) -> PyOwned {
    heap::alloc(Payload::Native {
        descriptor,
        state: Some(Box::new(state)),
    })
}

/// Lend the typed state of `obj` to `f`
///
/// Returns `None` with an error raised when `obj` is not an `S` instance,
/// was released, or is already inside one of its slots.
pub fn with_native_state<S: Any, R>(obj: PyObject, f: impl FnOnce(&mut S) -> R) -> Option<R> {
    let (descriptor, mut state) = match heap::take_native_state(obj) {
        NativeAccess::Taken(descriptor, state) => (descriptor, state),
        NativeAccess::Busy(name) => {
            error::raise(ExceptionKind::RuntimeError, format!("{name} already executing"));
            return None;
        }
        NativeAccess::NotNative(found) => {
            error::raise_type_error(format!("expected a native object, not {found}"));
            return None;
        }
        NativeAccess::Released => {
            error::raise(ExceptionKind::RuntimeError, "access to a released object");
            return None;
        }
    };

    let result = match state.downcast_mut::<S>() {
        Some(typed) => Some(f(typed)),
        None => {
            error::raise_type_error(format!(
                "descriptor '{}' does not hold {}",
                descriptor.name,
                type_name::<S>()
            ));
            None
        }
    };

    // the object may have been released while its slot ran
    if let Err(orphan) = heap::restore_native_state(obj, state) {
        (descriptor.dealloc)(orphan);
    }
    result
}
