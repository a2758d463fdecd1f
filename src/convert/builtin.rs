//! Builtin conversions for primitive and composite native types

use super::{ConversionFailed, ConversionOutcome, FromPeer, IntoPeer};
use crate::runtime::builtins;
use crate::runtime::error::{self, ExceptionKind};
use crate::runtime::{PyObject, PyOwned};

fn type_error<T>(message: String) -> ConversionOutcome<T> {
    error::raise_type_error(message);
    Err(ConversionFailed)
}

fn overflow<T>(target: &str) -> ConversionOutcome<T> {
    error::raise(ExceptionKind::OverflowError, format!("int too large to convert to {target}"));
    Err(ConversionFailed)
}

impl FromPeer for i64 {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        match builtins::as_i64(obj) {
            Some(value) => Ok(value),
            None => type_error(format!("an integer is required (got type {})", obj.type_name())),
        }
    }
}

impl FromPeer for i32 {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        let wide = i64::from_peer(obj)?;
        i32::try_from(wide).or_else(|_| overflow("i32"))
    }
}

impl FromPeer for usize {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        let wide = i64::from_peer(obj)?;
        if wide < 0 {
            error::raise(ExceptionKind::OverflowError, "can't convert negative int to unsigned");
            return Err(ConversionFailed);
        }
        usize::try_from(wide).or_else(|_| overflow("usize"))
    }
}

impl FromPeer for f64 {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        match builtins::as_f64(obj) {
            Some(value) => Ok(value),
            None => type_error(format!("must be real number, not {}", obj.type_name())),
        }
    }
}

/// Truth value; never fails
impl FromPeer for bool {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        Ok(builtins::is_truthy(obj))
    }
}

impl FromPeer for String {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        match builtins::as_string(obj) {
            Some(value) => Ok(value),
            None => type_error(format!("expected str, not {}", obj.type_name())),
        }
    }
}

/// Discards the value
impl FromPeer for () {
    fn from_peer(_obj: PyObject) -> ConversionOutcome<Self> {
        Ok(())
    }
}

impl FromPeer for PyOwned {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        Ok(PyOwned::acquire(obj))
    }
}

impl<T: FromPeer> FromPeer for Option<T> {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        if builtins::is_none(obj) {
            Ok(None)
        } else {
            T::from_peer(obj).map(Some)
        }
    }
}

/// Items of a tuple of exactly `arity` elements
pub fn expect_tuple(obj: PyObject, arity: usize) -> ConversionOutcome<Vec<PyOwned>> {
    match builtins::tuple_items(obj) {
        Some(items) if items.len() == arity => Ok(items),
        Some(items) => type_error(format!("expected a tuple of length {arity}, got {}", items.len())),
        None => type_error(format!("expected tuple, not {}", obj.type_name())),
    }
}

impl<A: FromPeer, B: FromPeer> FromPeer for (A, B) {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        let items = expect_tuple(obj, 2)?;
        Ok((A::from_peer(items[0].as_ptr())?, B::from_peer(items[1].as_ptr())?))
    }
}

impl<A: FromPeer, B: FromPeer, C: FromPeer> FromPeer for (A, B, C) {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        let items = expect_tuple(obj, 3)?;
        Ok((
            A::from_peer(items[0].as_ptr())?,
            B::from_peer(items[1].as_ptr())?,
            C::from_peer(items[2].as_ptr())?,
        ))
    }
}

impl IntoPeer for i64 {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_int(*self))
    }
}

impl IntoPeer for i32 {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_int(i64::from(*self)))
    }
}

impl IntoPeer for usize {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        match i64::try_from(*self) {
            Ok(value) => Ok(builtins::py_int(value)),
            Err(_) => {
                error::raise(ExceptionKind::OverflowError, "usize value does not fit a peer int");
                Err(ConversionFailed)
            }
        }
    }
}

impl IntoPeer for f64 {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_float(*self))
    }
}

impl IntoPeer for bool {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_bool(*self))
    }
}

impl IntoPeer for String {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_str(self))
    }
}

impl IntoPeer for &str {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_str(self))
    }
}

impl IntoPeer for () {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_none())
    }
}

impl IntoPeer for PyOwned {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(self.clone())
    }
}

impl<T: IntoPeer> IntoPeer for Option<T> {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        match self {
            Some(value) => value.to_peer(),
            None => Ok(builtins::py_none()),
        }
    }
}

impl<A: IntoPeer, B: IntoPeer> IntoPeer for (A, B) {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_tuple(vec![self.0.to_peer()?, self.1.to_peer()?]))
    }
}

impl<A: IntoPeer, B: IntoPeer, C: IntoPeer> IntoPeer for (A, B, C) {
    fn to_peer(&self) -> ConversionOutcome<PyOwned> {
        Ok(builtins::py_tuple(vec![self.0.to_peer()?, self.1.to_peer()?, self.2.to_peer()?]))
    }
}
