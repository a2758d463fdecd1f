//! Peer runtime - dynamically typed, reference-counted object model
//!
//! Design: the adapters talk to this runtime only through `protocol`; the
//! rest is the in-process peer they run against.
//!
//! Architecture:
//! - `object.rs` - handles (`PyObject` borrowed, `PyOwned` owning) and payloads
//! - `heap.rs` - per-thread object store, refcounts, leak accounting
//! - `error.rs` - sticky error indicator
//! - `types.rs` - slot tables for natively implemented objects
//! - `protocol.rs` - reference, iterator and call protocols
//! - `builtins.rs` - builtin value constructors and extractors
//!
//! Everything is thread-local: each thread owns one logical interpreter, so
//! no locking happens on the hot path.

mod object;
pub mod heap;
pub mod error;
pub mod types;
pub mod protocol;
pub mod builtins;

#[cfg(test)]
mod tests;

pub use object::{NativeFn, PyObject, PyOwned};
pub use heap::HeapStats;
pub use error::{ExceptionKind, PyErrState};
pub use types::TypeDescriptor;

use crate::logging::{debug, warn};

/// Report what the current thread's heap still holds
///
/// Returns the number of live objects; a non-zero count after all owners are
/// gone indicates a leaked count unit.
pub fn audit() -> usize {
    let stats = heap::stats();
    if stats.live_objects > 0 {
        warn!(
            target: "heap",
            live_objects = stats.live_objects,
            acquires = stats.acquires,
            releases = stats.releases,
            "peer heap still holds objects"
        );
    } else {
        debug!(target: "heap", allocations = stats.allocations, "peer heap empty");
    }
    stats.live_objects
}
