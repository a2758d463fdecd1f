//! Conversion functions - pairwise native/peer value converters
//!
//! Design: converters are shared closures (`Rc<dyn Fn>`) so an adapter can
//! be built once and cloned cheaply, and so callers can supply any mapping,
//! not just the builtin one.
//! - `ToNative<T>`: peer reference -> `T`
//! - `ToPeer<T>`: `&T` -> new peer reference
//! - `Deleter<T>`: disposes a converted value when an adapter discards it
//!
//! A failing converter returns `Err(ConversionFailed)` and may leave the
//! error indicator set; the adapter that called it decides what to do.

use std::fmt;
use std::rc::Rc;

use crate::runtime::{PyObject, PyOwned};

mod builtin;

pub use builtin::expect_tuple;

/// Conversion did not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionFailed;

impl fmt::Display for ConversionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("conversion failed")
    }
}

impl std::error::Error for ConversionFailed {}

/// Converted value or failure flag
pub type ConversionOutcome<T> = Result<T, ConversionFailed>;

/// Types with a builtin peer -> native conversion
pub trait FromPeer: Sized {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self>;
}

/// Types with a builtin native -> peer conversion
pub trait IntoPeer {
    fn to_peer(&self) -> ConversionOutcome<PyOwned>;
}

/// Inward conversion function
pub struct ToNative<T>(Rc<dyn Fn(PyObject) -> ConversionOutcome<T>>);

impl<T> ToNative<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(PyObject) -> ConversionOutcome<T> + 'static,
    {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn convert(&self, obj: PyObject) -> ConversionOutcome<T> {
        (self.0)(obj)
    }
}

impl<T: FromPeer + 'static> ToNative<T> {
    /// The `FromPeer` conversion of `T`
    pub fn builtin() -> Self {
        Self::new(T::from_peer)
    }
}

impl<T: FromPeer + 'static> Default for ToNative<T> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<T> Clone for ToNative<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for ToNative<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToNative<{}>", std::any::type_name::<T>())
    }
}

/// Outward conversion function
pub struct ToPeer<T>(Rc<dyn Fn(&T) -> ConversionOutcome<PyOwned>>);

impl<T> ToPeer<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&T) -> ConversionOutcome<PyOwned> + 'static,
    {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn convert(&self, value: &T) -> ConversionOutcome<PyOwned> {
        (self.0)(value)
    }
}

impl<T: IntoPeer + 'static> ToPeer<T> {
    /// The `IntoPeer` conversion of `T`
    pub fn builtin() -> Self {
        Self::new(T::to_peer)
    }
}

impl<T: IntoPeer + 'static> Default for ToPeer<T> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<T> Clone for ToPeer<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for ToPeer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToPeer<{}>", std::any::type_name::<T>())
    }
}

/// Disposal hook for converted values an adapter drops
pub struct Deleter<T>(Rc<dyn Fn(T)>);

impl<T> Deleter<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T) + 'static,
    {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, value: T) {
        (self.0)(value)
    }
}

impl<T> Clone for Deleter<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Deleter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deleter<{}>", std::any::type_name::<T>())
    }
}

#[cfg(test)]
mod tests;
