//! Reflecting native failures back into the peer's error indicator
//!
//! Native code that the peer calls must answer in the peer's terms: a new
//! reference, or nothing with the indicator set. `guard` does that
//! translation for a body written with `BridgeResult`.

use crate::errors::{BridgeError, BridgeResult};
use crate::runtime::builtins;
use crate::runtime::error::{self, ExceptionKind};
use crate::runtime::{PyObject, PyOwned};

impl BridgeError {
    /// Raise this error into the indicator
    ///
    /// `AlreadyRaised` leaves the pending error alone.
    pub fn restore(self) {
        match self.exception_kind() {
            Some(kind) => {
                error::clear();
                error::raise(kind, self.to_string());
            }
            None if error::is_set() => {}
            None => error::raise(
                ExceptionKind::RuntimeError,
                "error reported as raised but no peer error is pending",
            ),
        }
    }
}

/// Run a native body on behalf of the peer
pub fn guard(body: impl FnOnce() -> BridgeResult<PyOwned>) -> Option<PyOwned> {
    match body() {
        Ok(obj) => Some(obj),
        Err(err) => {
            err.restore();
            None
        }
    }
}

/// Peer callable whose body reports failures as `BridgeError`
pub fn native_function<F>(name: &str, body: F) -> PyOwned
where
    F: Fn(&[PyObject]) -> BridgeResult<PyOwned> + 'static,
{
    builtins::py_function(name, move |args| guard(|| body(args)))
}

/// Exactly `N` positional arguments
pub fn expect_args<const N: usize>(function: &str, args: &[PyObject]) -> BridgeResult<[PyObject; N]> {
    <[PyObject; N]>::try_from(args).map_err(|_| BridgeError::argument_count(function, N, args.len()))
}
