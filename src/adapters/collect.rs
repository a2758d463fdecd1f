//! Eager materialisation in both directions
//!
//! Native collections leave either lazily (a `NativeIterableAdapter`) or as a
//! fully built list, tuple or set. Peer iterables come in through
//! `ForeignIterableView::collect_vec`.

use std::borrow::Borrow;

use super::iterable::ForeignIterableView;
use super::native::make_native_iterable_adapter;
use crate::convert::{ConversionFailed, ConversionOutcome, FromPeer, IntoPeer, ToNative, ToPeer};
use crate::errors::{BridgeError, BridgeResult};
use crate::logging::log_conversion_failed;
use crate::runtime::builtins;
use crate::runtime::error;
use crate::runtime::{PyObject, PyOwned};

/// Shape of a native collection handed to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Peer iterator converting on demand
    #[default]
    Lazy,
    List,
    Tuple,
    Set,
    /// Immutable set; the runtime has no mutation surface, so it shares the set payload
    FrozenSet,
}

/// Convert every item, or none
///
/// On failure the references built so far are released and the indicator is clear.
/// An error pending beforehand is left alone and reported as `AlreadyRaised`.
pub fn convert_all<T, I>(items: I, convert: impl Fn(&T) -> ConversionOutcome<PyOwned>) -> BridgeResult<Vec<PyOwned>>
where
    I: IntoIterator,
    I::Item: Borrow<T>,
{
    if error::is_set() {
        return Err(BridgeError::already_raised());
    }
    let items = items.into_iter();
    let mut converted = Vec::with_capacity(items.size_hint().0);

    for (index, item) in items.enumerate() {
        match convert(item.borrow()) {
            Ok(obj) if !error::is_set() => converted.push(obj),
            _ => {
                drop(converted);
                error::clear();
                log_conversion_failed("element", index);
                return Err(BridgeError::element_conversion(index));
            }
        }
    }
    Ok(converted)
}

/// Hand a native collection to the peer in the requested shape
pub fn export<T, C>(collection: C, convert: ToPeer<T>, mode: OutputMode) -> BridgeResult<PyOwned>
where
    T: 'static,
    C: IntoIterator<Item = T>,
    C::IntoIter: 'static,
{
    if mode == OutputMode::Lazy {
        return Ok(make_native_iterable_adapter(collection, convert));
    }

    let items = convert_all(collection, |value: &T| convert.convert(value))?;
    match mode {
        OutputMode::Tuple => Ok(builtins::py_tuple(items)),
        OutputMode::Set | OutputMode::FrozenSet => {
            builtins::py_set(items).ok_or_else(BridgeError::already_raised)
        }
        _ => Ok(builtins::py_list(items)),
    }
}

/// A peer iterable drained into a `Vec`
impl<T: FromPeer + 'static> FromPeer for Vec<T> {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        ForeignIterableView::new(obj, ToNative::builtin())
            .and_then(|view| view.collect_vec())
            .map_err(|err| {
                err.restore();
                ConversionFailed
            })
    }
}

/// A `Vec` becomes a peer list
impl<T: IntoPeer> IntoPeer for Vec<T> {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        match convert_all(self.iter(), T::to_peer) {
            Ok(items) => Ok(builtins::py_list(items)),
            Err(err) => {
                err.restore();
                Err(ConversionFailed)
            }
        }
    }
}
