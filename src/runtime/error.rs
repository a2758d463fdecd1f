//! Error indicator - sticky per-thread failure state of the peer runtime
//!
//! At most one error is pending at a time. Whoever raises expects the nearest
//! boundary that understands peer errors to either report or clear it.

use std::cell::RefCell;
use std::fmt;

use crate::config;
use crate::logging::{log_clear, log_raise, warn};

thread_local! {
    static INDICATOR: RefCell<Option<PyErrState>> = const { RefCell::new(None) };
}

/// Peer exception classes the runtime and adapters raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    TypeError,
    ValueError,
    RuntimeError,
    StopIteration,
    OverflowError,
    ZeroDivisionError,
}

impl ExceptionKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::RuntimeError => "RuntimeError",
            Self::StopIteration => "StopIteration",
            Self::OverflowError => "OverflowError",
            Self::ZeroDivisionError => "ZeroDivisionError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pending peer error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyErrState {
    pub kind: ExceptionKind,
    pub message: String,
}

impl PyErrState {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for PyErrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Set the indicator
///
/// Raising over a pending error replaces it and logs a warning; with
/// `runtime.strict_indicator` in debug builds it panics instead.
pub fn raise(kind: ExceptionKind, message: impl Into<String>) {
    restore(PyErrState::new(kind, message));
}

#[inline]
pub fn raise_type_error(message: impl Into<String>) {
    raise(ExceptionKind::TypeError, message);
}

/// Re-install a previously fetched error
pub fn restore(state: PyErrState) {
    log_raise(state.kind.name(), &state.message);

    let replaced = INDICATOR.with(|slot| slot.borrow_mut().replace(state));
    if let Some(previous) = replaced {
        if cfg!(debug_assertions) && config::settings().strict_indicator {
            panic!("error raised while another was pending: {previous}");
        }
        warn!(target: "error", pending = %previous, "error indicator overwritten");
    }
}

/// Whether an error is pending
#[inline]
pub fn is_set() -> bool {
    INDICATOR.with(|slot| slot.borrow().is_some())
}

/// Whether the pending error is of `kind`
pub fn matches(kind: ExceptionKind) -> bool {
    INDICATOR.with(|slot| slot.borrow().as_ref().is_some_and(|state| state.kind == kind))
}

/// Drop the pending error, if any
pub fn clear() {
    if let Some(state) = fetch() {
        log_clear(state.kind.name());
    }
}

/// Take the pending error, leaving the indicator clear
pub fn fetch() -> Option<PyErrState> {
    INDICATOR.with(|slot| slot.borrow_mut().take())
}

/// Copy of the pending error, leaving it in place
pub fn peek() -> Option<PyErrState> {
    INDICATOR.with(|slot| slot.borrow().clone())
}
