use super::builtins::*;
use super::error::{self, ExceptionKind};
use super::heap;
use super::protocol;
use super::types::{self, TypeDescriptor};
use super::*;

use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_alloc_and_release_balance() {
    let before = heap::stats();
    {
        let a = py_int(1);
        let b = a.clone();
        assert_eq!(a.refcount(), 2);
        drop(b);
        assert_eq!(a.refcount(), 1);
    }
    let delta = heap::stats().since(&before);
    assert!(delta.is_balanced());
    assert_eq!(delta.allocations, 1);
    assert_eq!(delta.acquires, 2);
}

#[test]
fn test_stale_handle_detected() {
    let obj = py_str("gone");
    let handle = obj.as_ptr();
    drop(obj);

    assert!(!handle.is_alive());
    assert_eq!(handle.refcount(), 0);
    assert_eq!(handle.type_name(), "<released>");

    // slot reuse bumps the generation
    let fresh = py_int(7);
    assert!(fresh.as_ptr().is_alive());
    assert!(!handle.is_alive());
}

#[test]
#[should_panic(expected = "double release")]
fn test_double_release_panics() {
    let raw = py_int(1).into_raw();
    heap::release(raw);
    heap::release(raw);
}

#[test]
#[should_panic(expected = "acquire of released reference")]
fn test_acquire_released_panics() {
    let raw = py_int(1).into_raw();
    heap::release(raw);
    heap::acquire(raw);
}

#[test]
fn test_container_releases_children() {
    let child = py_int(3);
    let list = py_list(vec![child.clone(), child.clone()]);
    assert_eq!(child.refcount(), 3);
    drop(list);
    assert_eq!(child.refcount(), 1);
}

#[test]
fn test_error_indicator() {
    assert!(!error::is_set());
    error::raise(ExceptionKind::ValueError, "bad value");
    assert!(error::is_set());
    assert!(error::matches(ExceptionKind::ValueError));
    assert!(!error::matches(ExceptionKind::TypeError));
    assert_eq!(error::peek().map(|state| state.to_string()).as_deref(), Some("ValueError: bad value"));

    let state = error::fetch().unwrap();
    assert!(!error::is_set());
    error::restore(state.clone());
    assert_eq!(error::peek(), Some(state));
    error::clear();
    assert!(!error::is_set());
}

#[test]
fn test_raise_over_pending_replaces() {
    error::raise_type_error("first");
    error::raise(ExceptionKind::RuntimeError, "second");
    assert_eq!(error::fetch().map(|state| state.message), Some("second".to_string()));
}

#[test]
fn test_iterate_list() {
    let list = py_list(vec![py_int(1), py_int(2)]);
    let it = protocol::get_iter(list.as_ptr()).unwrap();
    assert_eq!(it.type_name(), "iterator");

    let first = protocol::iter_next(it.as_ptr()).unwrap();
    let second = protocol::iter_next(it.as_ptr()).unwrap();
    assert_eq!(as_i64(first.as_ptr()), Some(1));
    assert_eq!(as_i64(second.as_ptr()), Some(2));
    assert!(protocol::iter_next(it.as_ptr()).is_none());
    assert!(!error::is_set());
    assert!(protocol::iter_next(it.as_ptr()).is_none());
}

#[test]
fn test_iterate_str_by_char() {
    let text = py_str("héj");
    let it = protocol::get_iter(text.as_ptr()).unwrap();
    let mut chars = Vec::new();
    while let Some(c) = protocol::iter_next(it.as_ptr()) {
        chars.push(as_string(c.as_ptr()).unwrap());
    }
    assert_eq!(chars, vec!["h", "é", "j"]);
}

#[test]
fn test_iterator_is_its_own_iterator() {
    let list = py_list(vec![py_int(1)]);
    let it = protocol::get_iter(list.as_ptr()).unwrap();
    let again = protocol::get_iter(it.as_ptr()).unwrap();
    assert_eq!(it.as_ptr(), again.as_ptr());
    assert_eq!(it.refcount(), 2);
}

#[test]
fn test_not_iterable() {
    let five = py_int(5);
    assert!(protocol::get_iter(five.as_ptr()).is_none());
    assert_eq!(
        error::fetch(),
        Some(PyErrState::new(ExceptionKind::TypeError, "'int' object is not iterable"))
    );

    assert!(protocol::iter_next(five.as_ptr()).is_none());
    assert!(error::matches(ExceptionKind::TypeError));
    error::clear();
}

#[test]
fn test_is_iterable_preserves_pending_error() {
    error::raise(ExceptionKind::ValueError, "pending");
    let five = py_int(5);
    assert!(!protocol::is_iterable(five.as_ptr()));
    assert!(protocol::is_iterable(py_tuple(vec![]).as_ptr()));
    assert_eq!(error::fetch().map(|state| state.message), Some("pending".to_string()));
}

#[test]
fn test_length_hint() {
    let list = py_list(vec![py_int(1), py_int(2), py_int(3)]);
    assert_eq!(protocol::length_hint(list.as_ptr()), Some(3));
    assert_eq!(protocol::length_hint(py_str("abc").as_ptr()), Some(3));
    assert_eq!(protocol::length_hint(py_int(1).as_ptr()), None);
}

#[test]
fn test_invoke_function() {
    let add = py_function("add", |args| {
        let total = args.iter().filter_map(|arg| as_i64(*arg)).sum();
        Some(py_int(total))
    });
    assert!(protocol::is_callable(add.as_ptr()));

    let before = heap::stats();
    {
        let args = protocol::new_args(2);
        protocol::set_arg(args.as_ptr(), 0, py_int(40));
        protocol::set_arg(args.as_ptr(), 1, py_int(2));
        let result = protocol::invoke(add.as_ptr(), args.as_ptr()).unwrap();
        assert_eq!(as_i64(result.as_ptr()), Some(42));
    }
    assert!(heap::stats().since(&before).is_balanced());
}

#[test]
fn test_invoke_not_callable() {
    let list = py_list(vec![]);
    let args = protocol::new_args(0);
    assert!(!protocol::is_callable(list.as_ptr()));
    assert!(protocol::invoke(list.as_ptr(), args.as_ptr()).is_none());
    assert_eq!(
        error::fetch(),
        Some(PyErrState::new(ExceptionKind::TypeError, "'list' object is not callable"))
    );
}

#[test]
fn test_invoke_unset_argument() {
    let f = py_function("f", |_| Some(py_none()));
    let args = protocol::new_args(1);
    assert!(protocol::invoke(f.as_ptr(), args.as_ptr()).is_none());
    assert!(error::matches(ExceptionKind::RuntimeError));
    error::clear();
}

#[test]
fn test_invoke_enforces_indicator_contract() {
    let silent = py_function("silent", |_| None);
    let args = protocol::new_args(0);
    assert!(protocol::invoke(silent.as_ptr(), args.as_ptr()).is_none());
    assert!(error::matches(ExceptionKind::RuntimeError));
    error::clear();

    let sloppy = py_function("sloppy", |_| {
        error::raise(ExceptionKind::ValueError, "oops");
        Some(py_none())
    });
    let before = heap::stats();
    assert!(protocol::invoke(sloppy.as_ptr(), args.as_ptr()).is_none());
    let pending = error::fetch().unwrap();
    assert_eq!(pending.kind, ExceptionKind::RuntimeError);
    assert!(pending.message.contains("ValueError: oops"));
    assert!(heap::stats().since(&before).is_balanced());
}

#[test]
fn test_set_arg_replaces_previous() {
    let args = protocol::new_args(1);
    let first = py_int(1);
    protocol::set_arg(args.as_ptr(), 0, first.clone());
    assert_eq!(first.refcount(), 2);
    protocol::set_arg(args.as_ptr(), 0, py_int(2));
    assert_eq!(first.refcount(), 1);
}

#[test]
fn test_set_dedups_by_value() {
    let set = py_set(vec![py_int(1), py_float(1.0), py_int(2), py_str("a"), py_str("a")]).unwrap();
    assert_eq!(len(set.as_ptr()), Some(3));

    assert!(py_set(vec![py_list(vec![])]).is_none());
    assert_eq!(
        error::fetch().map(|state| state.message),
        Some("unhashable type: 'list'".to_string())
    );
}

#[test]
fn test_truthiness() {
    assert!(!is_truthy(py_none().as_ptr()));
    assert!(!is_truthy(py_list(vec![]).as_ptr()));
    assert!(is_truthy(py_tuple(vec![py_none()]).as_ptr()));
    assert!(is_truthy(py_float(0.1).as_ptr()));
}

#[test]
fn test_repr() {
    let value = py_list(vec![
        py_int(1),
        py_str("a"),
        py_tuple(vec![py_bool(true)]),
        py_float(2.0),
        py_none(),
    ]);
    assert_eq!(repr(value.as_ptr()), "[1, 'a', (True,), 2.0, None]");
}

#[test]
fn test_list_append() {
    let list = py_list(vec![]);
    assert!(list_append(list.as_ptr(), py_int(1)));
    assert!(!list_append(py_int(0).as_ptr(), py_int(1)));
    assert_eq!(list_items(list.as_ptr()).map(|items| items.len()), Some(1));
}

// Native type fixtures

struct Countdown {
    remaining: i64,
    dropped: Rc<Cell<usize>>,
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.dropped.set(self.dropped.get() + 1);
    }
}

fn countdown_descriptor() -> &'static TypeDescriptor {
    types::descriptor_for::<Countdown>(|| TypeDescriptor {
        name: "countdown",
        doc: "test iterator",
        dealloc: types::dealloc_state::<Countdown>,
        iter: Some(|obj: PyObject| Some(protocol::get_self(obj))),
        iternext: Some(countdown_next),
        length_hint: Some(|obj: PyObject| {
            types::with_native_state::<Countdown, _>(obj, |state| state.remaining.max(0) as usize)
        }),
    })
}

fn countdown_next(obj: PyObject) -> Option<PyOwned> {
    let value = types::with_native_state::<Countdown, _>(obj, |state| {
        state.remaining -= 1;
        state.remaining
    })?;
    if value < 0 {
        error::raise(ExceptionKind::StopIteration, "");
        return None;
    }
    Some(py_int(value))
}

#[test]
fn test_descriptor_built_once() {
    let first = countdown_descriptor();
    let second = countdown_descriptor();
    assert!(std::ptr::eq(first, second));
    assert!(types::registered_count() >= 1);
}

#[test]
fn test_native_iterator_slots() {
    let dropped = Rc::new(Cell::new(0));
    let obj = types::instantiate(
        countdown_descriptor(),
        Countdown { remaining: 2, dropped: dropped.clone() },
    );
    assert_eq!(obj.type_name(), "countdown");
    assert_eq!(protocol::length_hint(obj.as_ptr()), Some(2));

    let it = protocol::get_iter(obj.as_ptr()).unwrap();
    let mut seen = Vec::new();
    while let Some(value) = protocol::iter_next(it.as_ptr()) {
        seen.push(as_i64(value.as_ptr()).unwrap());
    }
    // StopIteration is normalised to a clean end
    assert!(!error::is_set());
    assert_eq!(seen, vec![1, 0]);

    drop(it);
    assert_eq!(dropped.get(), 0);
    drop(obj);
    assert_eq!(dropped.get(), 1);
}

#[test]
fn test_reentrant_slot_reports_busy() {
    let obj = types::instantiate(
        countdown_descriptor(),
        Countdown { remaining: 5, dropped: Rc::new(Cell::new(0)) },
    );
    let handle = obj.as_ptr();

    let inner = types::with_native_state::<Countdown, _>(handle, |_| protocol::iter_next(handle)).unwrap();
    assert!(inner.is_none());
    assert_eq!(
        error::fetch().map(|state| state.message),
        Some("countdown already executing".to_string())
    );

    // state is back in place afterwards
    assert!(protocol::iter_next(handle).is_some());
}

#[test]
fn test_length_hint_keeps_pending_error() {
    let obj = types::instantiate(
        countdown_descriptor(),
        Countdown { remaining: 3, dropped: Rc::new(Cell::new(0)) },
    );
    let handle = obj.as_ptr();

    error::raise(ExceptionKind::ValueError, "raised elsewhere");
    assert_eq!(protocol::length_hint(handle), Some(3));
    assert_eq!(
        error::fetch(),
        Some(PyErrState::new(ExceptionKind::ValueError, "raised elsewhere"))
    );

    // a failing slot clears only its own error
    let hint = types::with_native_state::<Countdown, _>(handle, |_| {
        error::raise(ExceptionKind::ValueError, "raised elsewhere");
        protocol::length_hint(handle)
    })
    .unwrap();
    assert_eq!(hint, None);
    assert_eq!(
        error::fetch().map(|state| state.message),
        Some("raised elsewhere".to_string())
    );
}

#[test]
fn test_state_of_object_released_mid_slot() {
    let dropped = Rc::new(Cell::new(0));
    let mut owner = Some(types::instantiate(
        countdown_descriptor(),
        Countdown { remaining: 1, dropped: dropped.clone() },
    ));
    let handle = owner.as_ref().unwrap().as_ptr();

    types::with_native_state::<Countdown, _>(handle, |_| drop(owner.take())).unwrap();
    assert!(!handle.is_alive());
    assert_eq!(dropped.get(), 1);
}

#[test]
fn test_wrong_state_type() {
    let obj = types::instantiate(
        countdown_descriptor(),
        Countdown { remaining: 1, dropped: Rc::new(Cell::new(0)) },
    );
    assert!(types::with_native_state::<String, _>(obj.as_ptr(), |_| ()).is_none());
    assert!(error::matches(ExceptionKind::TypeError));
    error::clear();

    let plain = py_int(1);
    assert!(types::with_native_state::<Countdown, _>(plain.as_ptr(), |_| ()).is_none());
    assert!(error::matches(ExceptionKind::TypeError));
    error::clear();
}

#[test]
fn test_audit_reports_live_objects() {
    let keep = py_int(1);
    assert!(audit() >= 1);
    assert_eq!(audit(), heap::stats().live_objects);
    drop(keep);
}
