use super::*;

use std::cell::RefCell;

use crate::runtime::builtins::{self, py_float, py_int, py_none, py_str, py_tuple};
use crate::runtime::error::{self, ExceptionKind};
use crate::runtime::heap;

#[test]
fn test_int_conversions() {
    let five = py_int(5);
    assert_eq!(i64::from_peer(five.as_ptr()), Ok(5));
    assert_eq!(i32::from_peer(five.as_ptr()), Ok(5));
    assert_eq!(usize::from_peer(five.as_ptr()), Ok(5));
    assert!(!error::is_set());
}

#[test]
fn test_int_rejects_str() {
    let text = py_str("five");
    assert_eq!(i64::from_peer(text.as_ptr()), Err(ConversionFailed));
    assert!(error::matches(ExceptionKind::TypeError));
    error::clear();
}

#[test]
fn test_overflow() {
    let big = py_int(i64::MAX);
    assert_eq!(i32::from_peer(big.as_ptr()), Err(ConversionFailed));
    assert!(error::matches(ExceptionKind::OverflowError));
    error::clear();

    let negative = py_int(-1);
    assert_eq!(usize::from_peer(negative.as_ptr()), Err(ConversionFailed));
    assert!(error::matches(ExceptionKind::OverflowError));
    error::clear();
}

#[test]
fn test_float_accepts_int() {
    let two = py_int(2);
    assert_eq!(f64::from_peer(two.as_ptr()), Ok(2.0));

    let half = py_float(0.5);
    assert_eq!(f64::from_peer(half.as_ptr()), Ok(0.5));
    assert_eq!(i64::from_peer(half.as_ptr()), Err(ConversionFailed));
    error::clear();
}

#[test]
fn test_bool_is_truthiness() {
    assert_eq!(bool::from_peer(py_int(0).as_ptr()), Ok(false));
    assert_eq!(bool::from_peer(py_str("x").as_ptr()), Ok(true));
    assert_eq!(bool::from_peer(py_none().as_ptr()), Ok(false));
}

#[test]
fn test_option() {
    assert_eq!(Option::<i64>::from_peer(py_none().as_ptr()), Ok(None));
    assert_eq!(Option::<i64>::from_peer(py_int(3).as_ptr()), Ok(Some(3)));

    let none = None::<i64>.to_peer().unwrap();
    assert!(builtins::is_none(none.as_ptr()));
}

#[test]
fn test_tuples() {
    let pair = py_tuple(vec![py_str("vi"), py_int(6)]);
    assert_eq!(<(String, i64)>::from_peer(pair.as_ptr()), Ok(("vi".to_string(), 6)));

    assert_eq!(<(i64, i64, i64)>::from_peer(pair.as_ptr()), Err(ConversionFailed));
    assert!(error::matches(ExceptionKind::TypeError));
    error::clear();

    let out = (1i64, 2.5f64, "x").to_peer().unwrap();
    assert_eq!(builtins::repr(out.as_ptr()), "(1, 2.5, 'x')");
}

#[test]
fn test_into_peer_builtins() {
    assert_eq!(builtins::as_i64(7i32.to_peer().unwrap().as_ptr()), Some(7));
    assert_eq!(builtins::as_f64(1.5f64.to_peer().unwrap().as_ptr()), Some(1.5));
    assert_eq!(builtins::as_string("victor".to_string().to_peer().unwrap().as_ptr()).as_deref(), Some("victor"));
    assert!(builtins::is_none(().to_peer().unwrap().as_ptr()));
}

#[test]
fn test_usize_too_large() {
    if usize::BITS > 63 {
        assert_eq!(usize::MAX.to_peer().map(|_| ()), Err(ConversionFailed));
        assert!(error::matches(ExceptionKind::OverflowError));
        error::clear();
    }
}

#[test]
fn test_identity_conversion_acquires() {
    let obj = py_int(1);
    let copy = PyOwned::from_peer(obj.as_ptr()).unwrap();
    assert_eq!(obj.refcount(), 2);
    drop(copy);
    assert_eq!(obj.refcount(), 1);
}

#[test]
fn test_conversions_balance_references() {
    let before = heap::stats();
    {
        let pair = (String::from("a"), Some(4i64)).to_peer().unwrap();
        let back = <(String, Option<i64>)>::from_peer(pair.as_ptr()).unwrap();
        assert_eq!(back, ("a".to_string(), Some(4)));
    }
    assert!(heap::stats().since(&before).is_balanced());
}

#[test]
fn test_custom_converters() {
    let doubled = ToNative::new(|obj| i64::from_peer(obj).map(|v| v * 2));
    assert_eq!(doubled.clone().convert(py_int(21).as_ptr()), Ok(42));

    let text = ToPeer::new(|value: &i64| Ok(py_str(&value.to_string())));
    let out = text.convert(&12).unwrap();
    assert_eq!(builtins::as_string(out.as_ptr()).as_deref(), Some("12"));

    let seen = std::rc::Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let deleter = Deleter::new(move |value: i64| sink.borrow_mut().push(value));
    deleter.call(1);
    deleter.clone().call(2);
    assert_eq!(*seen.borrow(), vec![1, 2]);
}
