//! Native ranges exposed to the peer through the iterator protocol
//!
//! Every `(T, I)` instantiation of `NativeIterableAdapter` gets its own
//! `TypeDescriptor`, built on first use, whose slots are monomorphized for
//! that pair. The adapter is its own iterator: `iter` returns self.

use std::iter::{Fuse, Peekable};

use crate::convert::ToPeer;
use crate::logging::{log_conversion_failed, trace};
use crate::runtime::error;
use crate::runtime::protocol;
use crate::runtime::types::{self, TypeDescriptor};
use crate::runtime::{PyObject, PyOwned};

/// Peer iterator object draining a native iterator
///
/// A conversion failure leaves the position on the failing element: the
/// next `next` retries it.
pub struct NativeIterableAdapter<T, I: Iterator<Item = T>> {
    convert: ToPeer<T>,
    range: Peekable<Fuse<I>>,
    produced: usize,
}

impl<T, I> NativeIterableAdapter<T, I>
where
    T: 'static,
    I: Iterator<Item = T> + 'static,
{
    /// Slot table shared by every adapter over this `(T, I)`
    pub fn descriptor() -> &'static TypeDescriptor {
        types::descriptor_for::<Self>(|| TypeDescriptor {
            name: "native_iterator",
            doc: "Iterator over a native range",
            dealloc: types::dealloc_state::<Self>,
            iter: Some(Self::iter_slot),
            iternext: Some(Self::next_slot),
            length_hint: Some(Self::length_hint_slot),
        })
    }

    /// Wrap `range` as a new peer iterator object
    pub fn into_peer(range: impl IntoIterator<IntoIter = I>, convert: ToPeer<T>) -> PyOwned {
        let adapter = Self {
            convert,
            range: range.into_iter().fuse().peekable(),
            produced: 0,
        };
        types::instantiate(Self::descriptor(), adapter)
    }

    fn iter_slot(obj: PyObject) -> Option<PyOwned> {
        Some(protocol::get_self(obj))
    }

    fn next_slot(obj: PyObject) -> Option<PyOwned> {
        types::with_native_state::<Self, _>(obj, Self::step).flatten()
    }

    fn length_hint_slot(obj: PyObject) -> Option<usize> {
        types::with_native_state::<Self, _>(obj, |adapter| adapter.range.size_hint().0)
    }

    fn step(&mut self) -> Option<PyOwned> {
        // a pending error belongs to someone else: fail without consuming
        if error::is_set() {
            return None;
        }
        let Some(item) = self.range.peek() else {
            trace!(target: "iter", produced = self.produced, "native range exhausted");
            return None;
        };

        match self.convert.convert(item) {
            Ok(obj) if !error::is_set() => {
                self.range.next();
                self.produced += 1;
                Some(obj)
            }
            outcome => {
                drop(outcome);
                error::clear();
                log_conversion_failed("element", self.produced);
                error::raise_type_error("bad element in iterable");
                None
            }
        }
    }
}

/// `makeNativeIterableAdapter`: a peer iterator over `range`
pub fn make_native_iterable_adapter<T, R>(range: R, convert: ToPeer<T>) -> PyOwned
where
    T: 'static,
    R: IntoIterator<Item = T>,
    R::IntoIter: 'static,
{
    NativeIterableAdapter::<T, R::IntoIter>::into_peer(range, convert)
}

/// Re-iterable peer object over a cloneable native collection
///
/// Each `iter()` from the peer side starts a new `NativeIterableAdapter`
/// over a fresh clone of the collection.
pub struct NativeIterable<T, C> {
    collection: C,
    convert: ToPeer<T>,
}

impl<T, C> NativeIterable<T, C>
where
    T: 'static,
    C: Clone + IntoIterator<Item = T> + 'static,
    C::IntoIter: 'static,
{
    pub fn descriptor() -> &'static TypeDescriptor {
        types::descriptor_for::<Self>(|| TypeDescriptor {
            name: "native_iterable",
            doc: "Re-iterable native collection",
            dealloc: types::dealloc_state::<Self>,
            iter: Some(Self::iter_slot),
            iternext: None,
            length_hint: None,
        })
    }

    pub fn into_peer(collection: C, convert: ToPeer<T>) -> PyOwned {
        types::instantiate(Self::descriptor(), Self { collection, convert })
    }

    fn iter_slot(obj: PyObject) -> Option<PyOwned> {
        let (collection, convert) =
            types::with_native_state::<Self, _>(obj, |this| (this.collection.clone(), this.convert.clone()))?;
        Some(make_native_iterable_adapter(collection, convert))
    }
}

pub fn make_native_iterable<T, C>(collection: C, convert: ToPeer<T>) -> PyOwned
where
    T: 'static,
    C: Clone + IntoIterator<Item = T> + 'static,
    C::IntoIter: 'static,
{
    NativeIterable::into_peer(collection, convert)
}
