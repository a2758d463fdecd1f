//! Foreign iterables seen from native code
//!
//! `ForeignIterableView` holds the iterable, never a position: each `begin`
//! asks the peer for a fresh iterator, so the same view can be walked any
//! number of times. Whether a second walk yields anything is up to the
//! wrapped object (an iterator returns itself from `iter()` and stays spent).
//!
//! `ForeignIterator` keeps one element of lookahead: the peer element it
//! last fetched plus that element converted. Advancing releases both before
//! the next fetch, so at most one cached element is ever alive.

use crate::config;
use crate::convert::{ConversionOutcome, ConversionFailed, Deleter, FromPeer, ToNative};
use crate::errors::{BridgeError, BridgeResult};
use crate::logging::{log_conversion_failed, log_iteration_end, log_iteration_start};
use crate::runtime::error;
use crate::runtime::protocol;
use crate::runtime::{PyObject, PyOwned};

/// Past-the-end marker returned by `ForeignIterableView::end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Exhausted;

/// Read-only native view over a peer iterable
pub struct ForeignIterableView<T> {
    iterable: PyOwned,
    convert: ToNative<T>,
    deleter: Option<Deleter<T>>,
}

impl<T> ForeignIterableView<T> {
    /// Fails with `NotIterable` unless `iter(iterable)` would succeed
    pub fn new(iterable: PyObject, convert: ToNative<T>) -> BridgeResult<Self> {
        if !protocol::is_iterable(iterable) {
            return Err(BridgeError::not_iterable(iterable.type_name()));
        }
        Ok(Self {
            iterable: PyOwned::acquire(iterable),
            convert,
            deleter: None,
        })
    }

    /// Dispose of converted values the iterator discards
    pub fn with_deleter(mut self, deleter: Deleter<T>) -> Self {
        self.deleter = Some(deleter);
        self
    }

    /// Start a fresh pass, fetching the first element
    pub fn begin(&self) -> BridgeResult<ForeignIterator<T>> {
        let Some(iterator) = protocol::get_iter(self.iterable.as_ptr()) else {
            if error::is_set() {
                return Err(BridgeError::already_raised());
            }
            return Err(BridgeError::protocol("iter", "no iterator returned and no error set"));
        };
        log_iteration_start(self.iterable.type_name());

        let mut it = ForeignIterator {
            iterator,
            current: None,
            convert: self.convert.clone(),
            deleter: self.deleter.clone(),
            position: 0,
            fused: false,
            pending: None,
        };
        it.fetch()?;
        Ok(it)
    }

    #[inline]
    pub fn end(&self) -> Exhausted {
        Exhausted
    }

    /// Same as `begin`, for `for` loops over `BridgeResult<T>`
    #[inline]
    pub fn iter(&self) -> BridgeResult<ForeignIterator<T>> {
        self.begin()
    }

    /// Visit every element by reference; values are then discarded
    pub fn try_for_each(&self, mut f: impl FnMut(&T)) -> BridgeResult<()> {
        let mut it = self.begin()?;
        while let Some(value) = it.get() {
            f(value);
            it.advance()?;
        }
        Ok(())
    }

    /// Drain one pass into any extendable collection
    pub fn collect_into<C: Default + Extend<T>>(&self) -> BridgeResult<C> {
        let mut out = C::default();
        for value in self.begin()? {
            out.extend(Some(value?));
        }
        Ok(out)
    }

    /// Drain one pass into a `Vec`, pre-sized from the peer length hint
    pub fn collect_vec(&self) -> BridgeResult<Vec<T>> {
        let mut out = Vec::new();
        if config::settings().reserve_from_length_hint {
            if let Some(hint) = protocol::length_hint(self.iterable.as_ptr()) {
                out.reserve(hint);
            }
        }
        for value in self.begin()? {
            out.push(value?);
        }
        Ok(out)
    }

    #[inline]
    pub fn as_ptr(&self) -> PyObject {
        self.iterable.as_ptr()
    }
}

impl<T> Clone for ForeignIterableView<T> {
    fn clone(&self) -> Self {
        Self {
            iterable: self.iterable.clone(),
            convert: self.convert.clone(),
            deleter: self.deleter.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ForeignIterableView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignIterableView")
            .field("iterable", &self.iterable)
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}

/// Nested views: an element that is itself iterable
impl<T: FromPeer + 'static> FromPeer for ForeignIterableView<T> {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        ForeignIterableView::new(obj, ToNative::builtin()).map_err(|err| {
            err.restore();
            ConversionFailed
        })
    }
}

struct Cached<T> {
    element: PyOwned,
    value: T,
}

/// One pass over a foreign iterable
///
/// Errors fuse the iterator: after a failure it reports exhaustion.
pub struct ForeignIterator<T> {
    iterator: PyOwned,
    current: Option<Cached<T>>,
    convert: ToNative<T>,
    deleter: Option<Deleter<T>>,
    /// Index of the cached element
    position: usize,
    fused: bool,
    /// Failure of the lookahead fetched by `Iterator::next`, reported on the following call
    pending: Option<BridgeError>,
}

impl<T> std::fmt::Debug for ForeignIterator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignIterator")
            .field("iterator", &self.iterator)
            .field("position", &self.position)
            .field("fused", &self.fused)
            .field("pending", &self.pending)
            .finish()
    }
}

impl<T> ForeignIterator<T> {
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.current.is_none() && self.pending.is_none()
    }

    /// The cached converted value
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.current.as_ref().map(|cached| &cached.value)
    }

    /// Borrowed handle of the cached peer element
    #[inline]
    pub fn element(&self) -> Option<PyObject> {
        self.current.as_ref().map(|cached| cached.element.as_ptr())
    }

    /// Zero-based index of the cached element
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Drop the cached element and fetch the next one
    pub fn advance(&mut self) -> BridgeResult<()> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        if self.current.is_none() {
            return Ok(());
        }
        self.discard_current();
        self.position += 1;
        self.fetch()
    }

    fn discard_current(&mut self) {
        if let Some(Cached { element, value }) = self.current.take() {
            drop(element);
            if let Some(deleter) = &self.deleter {
                deleter.call(value);
            }
        }
    }

    /// Pull and convert the next element
    ///
    /// End of sequence leaves the iterator exhausted. A peer failure in
    /// `next` propagates as `AlreadyRaised` with the indicator untouched; a
    /// failed conversion clears the indicator and reports the element index.
    /// An error pending before the fetch is not ours to clear: it fuses the
    /// iterator and propagates as `AlreadyRaised`.
    fn fetch(&mut self) -> BridgeResult<()> {
        debug_assert!(self.current.is_none(), "lookahead slot still occupied");
        if self.fused {
            return Ok(());
        }
        if error::is_set() {
            self.fused = true;
            return Err(BridgeError::already_raised());
        }

        let Some(element) = protocol::iter_next(self.iterator.as_ptr()) else {
            self.fused = true;
            if error::is_set() {
                return Err(BridgeError::already_raised());
            }
            log_iteration_end(self.position);
            return Ok(());
        };

        match self.convert.convert(element.as_ptr()) {
            Ok(value) if !error::is_set() => {
                self.current = Some(Cached { element, value });
                Ok(())
            }
            outcome => {
                if let (Ok(value), Some(deleter)) = (outcome, &self.deleter) {
                    deleter.call(value);
                }
                drop(element);
                error::clear();
                self.fused = true;
                log_conversion_failed("element", self.position);
                Err(BridgeError::element_conversion(self.position))
            }
        }
    }
}

impl<T> PartialEq<Exhausted> for ForeignIterator<T> {
    fn eq(&self, _: &Exhausted) -> bool {
        self.is_exhausted()
    }
}

/// Yields owned values; a yielded value is the caller's and never reaches the deleter
///
/// The lookahead is refilled before the value is handed out, so comparing
/// with `Exhausted` stays accurate between calls.
impl<T> Iterator for ForeignIterator<T> {
    type Item = BridgeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }

        let Cached { element, value } = self.current.take()?;
        drop(element);
        self.position += 1;
        if let Err(err) = self.fetch() {
            self.pending = Some(err);
        }
        Some(Ok(value))
    }
}

impl<T> Drop for ForeignIterator<T> {
    fn drop(&mut self) {
        self.discard_current();
    }
}
