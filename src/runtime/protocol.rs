//! Peer protocols - the only surface the adapters use
//!
//! Conventions follow the peer runtime's C-level API:
//! - Functions returning `Option<PyOwned>` report failure as `None` with the
//!   error indicator set
//! - `iter_next` additionally reports end-of-sequence as `None` with the
//!   indicator clear
//! - Argument containers are tuples whose slots start empty

use smallvec::SmallVec;

use super::error::{self, ExceptionKind};
use super::heap;
use super::object::{Payload, PyObject, PyOwned};
use super::builtins;
use crate::logging::{log_call, log_call_failed};

/// New owning reference to `obj`
#[inline]
pub fn acquire(obj: PyObject) -> PyOwned {
    PyOwned::acquire(obj)
}

/// Give back an owning reference
#[inline]
pub fn release(obj: PyOwned) {
    drop(obj);
}

/// Peer type name of `obj`
#[inline]
pub fn type_name(obj: PyObject) -> &'static str {
    obj.type_name()
}

enum IterKind {
    Sequence,
    SelfIterator,
    Slot(super::types::IterSlot),
    Unsupported(&'static str),
}

/// `iter(obj)`
pub fn get_iter(obj: PyObject) -> Option<PyOwned> {
    let kind = heap::with_payload(obj, |payload| match payload {
        Payload::List(_) | Payload::Tuple(_) | Payload::Set(_) | Payload::Str(_) => IterKind::Sequence,
        Payload::SeqIter { .. } => IterKind::SelfIterator,
        Payload::Native { descriptor, .. } => match descriptor.iter {
            Some(slot) => IterKind::Slot(slot),
            None => IterKind::Unsupported(descriptor.name),
        },
        other => IterKind::Unsupported(other.type_name()),
    });

    match kind {
        Some(IterKind::Sequence) => Some(heap::alloc(Payload::SeqIter {
            seq: PyOwned::acquire(obj),
            position: 0,
        })),
        Some(IterKind::SelfIterator) => Some(get_self(obj)),
        Some(IterKind::Slot(slot)) => slot(obj),
        Some(IterKind::Unsupported(name)) => {
            error::raise_type_error(format!("'{name}' object is not iterable"));
            None
        }
        None => {
            error::raise(ExceptionKind::RuntimeError, "iter() on a released object");
            None
        }
    }
}

/// Identity with acquire: an iterator is its own iterator
#[inline]
pub fn get_self(it: PyObject) -> PyOwned {
    PyOwned::acquire(it)
}

enum NextKind {
    Sequence { seq: PyObject, position: usize },
    Slot(super::types::IterNextSlot),
    Unsupported(&'static str),
}

/// `next(it)`
///
/// A `StopIteration` raised by a slot is normalised to a plain end.
pub fn iter_next(it: PyObject) -> Option<PyOwned> {
    let kind = heap::with_payload(it, |payload| match payload {
        Payload::SeqIter { seq, position } => NextKind::Sequence {
            seq: seq.as_ptr(),
            position: *position,
        },
        Payload::Native { descriptor, .. } => match descriptor.iternext {
            Some(slot) => NextKind::Slot(slot),
            None => NextKind::Unsupported(descriptor.name),
        },
        other => NextKind::Unsupported(other.type_name()),
    });

    match kind {
        Some(NextKind::Sequence { seq, position }) => sequence_next(it, seq, position),
        Some(NextKind::Slot(slot)) => {
            let next = slot(it);
            if next.is_none() && error::matches(ExceptionKind::StopIteration) {
                error::clear();
            }
            next
        }
        Some(NextKind::Unsupported(name)) => {
            error::raise_type_error(format!("'{name}' object is not an iterator"));
            None
        }
        None => {
            error::raise(ExceptionKind::RuntimeError, "next() on a released object");
            None
        }
    }
}

enum Step {
    Item(PyObject, usize),
    Char(char, usize),
    End,
}

fn sequence_next(it: PyObject, seq: PyObject, position: usize) -> Option<PyOwned> {
    let step = heap::with_payload(seq, |payload| match payload {
        Payload::List(items) | Payload::Set(items) => items
            .get(position)
            .map_or(Step::End, |item| Step::Item(item.as_ptr(), position + 1)),
        Payload::Tuple(items) => items
            .get(position)
            .and_then(Option::as_ref)
            .map_or(Step::End, |item| Step::Item(item.as_ptr(), position + 1)),
        Payload::Str(text) => text
            .get(position..)
            .and_then(|rest| rest.chars().next())
            .map_or(Step::End, |c| Step::Char(c, position + c.len_utf8())),
        _ => Step::End,
    })
    .unwrap_or(Step::End);

    let (item, advanced) = match step {
        Step::Item(item, advanced) => (PyOwned::acquire(item), advanced),
        Step::Char(c, advanced) => (builtins::py_str(c.encode_utf8(&mut [0; 4])), advanced),
        Step::End => return None,
    };

    heap::with_payload_mut(it, |payload| {
        if let Payload::SeqIter { position, .. } = payload {
            *position = advanced;
        }
    });
    Some(item)
}

/// Whether `iter(obj)` would succeed; never leaves an error set
pub fn is_iterable(obj: PyObject) -> bool {
    let pending = error::fetch();
    let iterable = get_iter(obj).is_some();
    error::clear();
    if let Some(state) = pending {
        error::restore(state);
    }
    iterable
}

/// Whether `obj` supports the call protocol
pub fn is_callable(obj: PyObject) -> bool {
    heap::with_payload(obj, |payload| matches!(payload, Payload::Function { .. })).unwrap_or(false)
}

/// Length estimate for pre-sizing; `None` when unknown
///
/// Never leaves an error set, and an error pending beforehand survives.
pub fn length_hint(obj: PyObject) -> Option<usize> {
    enum Hint {
        Known(usize),
        Slot(super::types::LengthHintSlot),
        Unknown,
    }

    let hint = heap::with_payload(obj, |payload| match payload {
        Payload::List(items) | Payload::Set(items) => Hint::Known(items.len()),
        Payload::Tuple(items) => Hint::Known(items.len()),
        Payload::Str(text) => Hint::Known(text.chars().count()),
        Payload::Native { descriptor, .. } => descriptor.length_hint.map_or(Hint::Unknown, Hint::Slot),
        _ => Hint::Unknown,
    })?;

    match hint {
        Hint::Known(len) => Some(len),
        Hint::Slot(slot) => {
            let pending = error::fetch();
            let len = slot(obj);
            // a failing hint is not an error for the caller
            error::clear();
            if let Some(state) = pending {
                error::restore(state);
            }
            len
        }
        Hint::Unknown => None,
    }
}

/// Positional argument container with `n` empty slots
pub fn new_args(n: usize) -> PyOwned {
    heap::alloc(Payload::Tuple(SmallVec::from_iter((0..n).map(|_| None))))
}

/// Place `value` at `index`, taking over its count unit
///
/// Panics if `container` is not a tuple or `index` is out of range.
pub fn set_arg(container: PyObject, index: usize, value: PyOwned) {
    let mut value = Some(value);
    let placed = heap::with_payload_mut(container, |payload| match payload {
        Payload::Tuple(slots) => slots
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value.take())),
        _ => None,
    })
    .flatten();

    // owners are dropped only after the heap borrow ends
    match placed {
        Some(previous) => drop(previous),
        None => {
            drop(value);
            panic!("set_arg: {container:?} has no argument slot {index}");
        }
    }
}

/// Call `callable` with the arguments in `args`
///
/// Guarantees `None` implies the indicator is set and `Some` implies it is clear.
pub fn invoke(callable: PyObject, args: PyObject) -> Option<PyOwned> {
    let target = heap::with_payload(callable, |payload| match payload {
        Payload::Function { name, func } => Ok((name.clone(), func.clone())),
        other => Err(other.type_name()),
    });
    let (name, func) = match target {
        Some(Ok(found)) => found,
        Some(Err(type_name)) => {
            error::raise_type_error(format!("'{type_name}' object is not callable"));
            return None;
        }
        None => {
            error::raise(ExceptionKind::RuntimeError, "call of a released object");
            return None;
        }
    };

    let argv = heap::with_payload(args, |payload| match payload {
        Payload::Tuple(slots) => slots
            .iter()
            .enumerate()
            .map(|(i, slot)| slot.as_ref().map(PyOwned::as_ptr).ok_or(i))
            .collect::<Result<Vec<_>, usize>>(),
        _ => Err(usize::MAX),
    });
    let argv = match argv {
        Some(Ok(argv)) => argv,
        Some(Err(usize::MAX)) | None => {
            error::raise_type_error(format!("{name}() argument container must be a tuple"));
            return None;
        }
        Some(Err(slot)) => {
            error::raise(ExceptionKind::RuntimeError, format!("{name}() argument {slot} was never set"));
            return None;
        }
    };

    log_call(&name, argv.len());
    let result = func(&argv);

    match (result, error::is_set()) {
        (Some(result), false) => Some(result),
        (None, true) => {
            log_call_failed(&name);
            None
        }
        (None, false) => {
            error::raise(
                ExceptionKind::RuntimeError,
                format!("{name}() returned no result without setting an error"),
            );
            log_call_failed(&name);
            None
        }
        (Some(stray), true) => {
            drop(stray);
            let pending = error::fetch();
            error::raise(
                ExceptionKind::RuntimeError,
                format!(
                    "{name}() returned a result with an error set ({})",
                    pending.map(|state| state.to_string()).unwrap_or_default()
                ),
            );
            log_call_failed(&name);
            None
        }
    }
}
