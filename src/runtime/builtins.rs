//! Builtin peer values - constructors and extractors
//!
//! Constructors return a new reference. Extractors never raise: they return
//! `None` when the object is of another type, leaving error reporting to the
//! conversion layer.

use std::rc::Rc;

use smallvec::SmallVec;

use super::error;
use super::heap;
use super::object::{NativeFn, Payload, PyObject, PyOwned};

pub fn py_none() -> PyOwned {
    heap::alloc(Payload::None)
}

pub fn py_bool(value: bool) -> PyOwned {
    heap::alloc(Payload::Bool(value))
}

pub fn py_int(value: i64) -> PyOwned {
    heap::alloc(Payload::Int(value))
}

pub fn py_float(value: f64) -> PyOwned {
    heap::alloc(Payload::Float(value))
}

pub fn py_str(value: &str) -> PyOwned {
    heap::alloc(Payload::Str(value.to_owned()))
}

pub fn py_list(items: Vec<PyOwned>) -> PyOwned {
    heap::alloc(Payload::List(items))
}

pub fn py_tuple(items: Vec<PyOwned>) -> PyOwned {
    heap::alloc(Payload::Tuple(items.into_iter().map(Some).collect::<SmallVec<_>>()))
}

/// Build a set, dropping duplicates by value
///
/// Fails with `TypeError` on an unhashable element.
pub fn py_set(items: Vec<PyOwned>) -> Option<PyOwned> {
    let mut keys = Vec::with_capacity(items.len());
    let mut unique = Vec::with_capacity(items.len());

    for item in items {
        let Some(key) = hash_key(item.as_ptr()) else {
            error::raise_type_error(format!("unhashable type: '{}'", item.type_name()));
            return None;
        };
        if !keys.contains(&key) {
            keys.push(key);
            unique.push(item);
        }
    }
    Some(heap::alloc(Payload::Set(unique)))
}

/// Peer callable backed by a closure
pub fn py_function<F>(name: &str, func: F) -> PyOwned
where
    F: Fn(&[PyObject]) -> Option<PyOwned> + 'static,
{
    let func: NativeFn = Rc::new(func);
    heap::alloc(Payload::Function {
        name: name.to_owned(),
        func,
    })
}

/// Append to a list; `false` if `list` is not a list
pub fn list_append(list: PyObject, item: PyOwned) -> bool {
    let mut item = Some(item);
    let appended = heap::with_payload_mut(list, |payload| match payload {
        Payload::List(items) => {
            items.extend(item.take());
            true
        }
        _ => false,
    })
    .unwrap_or(false);
    drop(item);
    appended
}

pub fn is_none(obj: PyObject) -> bool {
    heap::with_payload(obj, |payload| matches!(payload, Payload::None)).unwrap_or(false)
}

pub fn as_i64(obj: PyObject) -> Option<i64> {
    heap::with_payload(obj, |payload| match payload {
        Payload::Int(value) => Some(*value),
        Payload::Bool(value) => Some(i64::from(*value)),
        _ => None,
    })
    .flatten()
}

/// Float value; ints are widened
pub fn as_f64(obj: PyObject) -> Option<f64> {
    heap::with_payload(obj, |payload| match payload {
        Payload::Float(value) => Some(*value),
        Payload::Int(value) => Some(*value as f64),
        _ => None,
    })
    .flatten()
}

pub fn as_string(obj: PyObject) -> Option<String> {
    heap::with_payload(obj, |payload| match payload {
        Payload::Str(text) => Some(text.clone()),
        _ => None,
    })
    .flatten()
}

/// Truth value with the peer's rules (empty containers and zero are false)
pub fn is_truthy(obj: PyObject) -> bool {
    heap::with_payload(obj, |payload| match payload {
        Payload::None => false,
        Payload::Bool(value) => *value,
        Payload::Int(value) => *value != 0,
        Payload::Float(value) => *value != 0.0,
        Payload::Str(text) => !text.is_empty(),
        Payload::List(items) | Payload::Set(items) => !items.is_empty(),
        Payload::Tuple(items) => !items.is_empty(),
        _ => true,
    })
    .unwrap_or(false)
}

/// `len(obj)` for sized builtins
pub fn len(obj: PyObject) -> Option<usize> {
    heap::with_payload(obj, |payload| match payload {
        Payload::Str(text) => Some(text.chars().count()),
        Payload::List(items) | Payload::Set(items) => Some(items.len()),
        Payload::Tuple(items) => Some(items.len()),
        _ => None,
    })
    .flatten()
}

/// New references to the items of a tuple; `None` for other types
pub fn tuple_items(obj: PyObject) -> Option<Vec<PyOwned>> {
    let handles = heap::with_payload(obj, |payload| match payload {
        Payload::Tuple(items) => Some(items.iter().flatten().map(PyOwned::as_ptr).collect::<Vec<_>>()),
        _ => None,
    })
    .flatten()?;
    Some(handles.into_iter().map(PyOwned::acquire).collect())
}

/// New references to the items of a list; `None` for other types
pub fn list_items(obj: PyObject) -> Option<Vec<PyOwned>> {
    let handles = heap::with_payload(obj, |payload| match payload {
        Payload::List(items) => Some(items.iter().map(PyOwned::as_ptr).collect::<Vec<_>>()),
        _ => None,
    })
    .flatten()?;
    Some(handles.into_iter().map(PyOwned::acquire).collect())
}

/// Value identity used for set membership
#[derive(Debug, Clone, PartialEq)]
enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(String),
    Tuple(Vec<HashKey>),
}

fn hash_key(obj: PyObject) -> Option<HashKey> {
    enum Shape {
        Leaf(HashKey),
        Tuple(Vec<PyObject>),
    }

    let shape = heap::with_payload(obj, |payload| match payload {
        Payload::None => Some(Shape::Leaf(HashKey::None)),
        Payload::Bool(value) => Some(Shape::Leaf(HashKey::Int(i64::from(*value)))),
        Payload::Int(value) => Some(Shape::Leaf(HashKey::Int(*value))),
        // integral floats hash like the matching int
        Payload::Float(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Some(Shape::Leaf(HashKey::Int(*value as i64)))
        }
        Payload::Float(value) => Some(Shape::Leaf(HashKey::Float(value.to_bits()))),
        Payload::Str(text) => Some(Shape::Leaf(HashKey::Str(text.clone()))),
        Payload::Tuple(items) => Some(Shape::Tuple(items.iter().flatten().map(PyOwned::as_ptr).collect())),
        _ => None,
    })
    .flatten()?;

    match shape {
        Shape::Leaf(key) => Some(key),
        Shape::Tuple(items) => items.into_iter().map(hash_key).collect::<Option<Vec<_>>>().map(HashKey::Tuple),
    }
}

/// Debug rendering in the peer's `repr` style
pub fn repr(obj: PyObject) -> String {
    enum Shape {
        Text(String),
        Items(&'static str, &'static str, Vec<PyObject>),
    }

    let shape = heap::with_payload(obj, |payload| match payload {
        Payload::None => Shape::Text("None".to_owned()),
        Payload::Bool(true) => Shape::Text("True".to_owned()),
        Payload::Bool(false) => Shape::Text("False".to_owned()),
        Payload::Int(value) => Shape::Text(value.to_string()),
        Payload::Float(value) => Shape::Text(format!("{value:?}")),
        Payload::Str(text) => Shape::Text(format!("'{text}'")),
        Payload::List(items) => Shape::Items("[", "]", items.iter().map(PyOwned::as_ptr).collect()),
        Payload::Tuple(items) => Shape::Items("(", ")", items.iter().flatten().map(PyOwned::as_ptr).collect()),
        Payload::Set(items) => Shape::Items("{", "}", items.iter().map(PyOwned::as_ptr).collect()),
        other => Shape::Text(format!("<{} object>", other.type_name())),
    });

    match shape {
        Some(Shape::Text(text)) => text,
        Some(Shape::Items(open, close, items)) => {
            let single = open == "(" && items.len() == 1;
            let inner = items.into_iter().map(repr).collect::<Vec<_>>().join(", ");
            if single {
                format!("({inner},)")
            } else {
                format!("{open}{inner}{close}")
            }
        }
        None => "<released>".to_owned(),
    }
}
