//! Peer-side helpers shared by the integration tests

#![allow(dead_code)]

use pybridge::runtime::builtins::{py_int, py_list};
use pybridge::runtime::error::{self, ExceptionKind};
use pybridge::runtime::{heap, protocol, HeapStats, PyOwned};

/// Call a peer callable the way peer code would
pub fn call(callable: &PyOwned, args: Vec<PyOwned>) -> Option<PyOwned> {
    let container = protocol::new_args(args.len());
    for (index, arg) in args.into_iter().enumerate() {
        protocol::set_arg(container.as_ptr(), index, arg);
    }
    protocol::invoke(callable.as_ptr(), container.as_ptr())
}

/// Call and expect a peer exception of `kind`, clearing it
pub fn call_raises(callable: &PyOwned, args: Vec<PyOwned>, kind: ExceptionKind) -> String {
    assert!(call(callable, args).is_none(), "call unexpectedly succeeded");
    let pending = error::fetch().expect("no error pending after failed call");
    assert_eq!(pending.kind, kind, "unexpected exception: {pending}");
    pending.message
}

pub fn int_list(values: impl IntoIterator<Item = i64>) -> PyOwned {
    py_list(values.into_iter().map(py_int).collect())
}

/// One-shot peer iterator over `values` (a generator expression, say)
pub fn generator(values: impl IntoIterator<Item = i64>) -> PyOwned {
    let list = int_list(values);
    protocol::get_iter(list.as_ptr()).expect("lists are iterable")
}

/// Run `f` and check every reference it created was released
pub fn assert_balanced<R>(f: impl FnOnce() -> R) -> R {
    let before: HeapStats = heap::stats();
    let result = f();
    let delta = heap::stats().since(&before);
    assert!(delta.is_balanced(), "unbalanced references: {delta:?}");
    result
}
