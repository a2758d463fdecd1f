use super::*;

#[test]
fn test_messages() {
    assert_eq!(BridgeError::element_conversion(3).to_string(), "bad element in iterable (index 3)");
    assert_eq!(
        BridgeError::argument_conversion(1, 2).to_string(),
        "could not convert argument 1 of 2"
    );
    assert_eq!(BridgeError::not_iterable("int").to_string(), "expected an iterable, not int");
    assert_eq!(
        BridgeError::not_callable("list").to_string(),
        "expected a callable object, not list"
    );
    assert_eq!(
        BridgeError::argument_count("knock", 1, 3).to_string(),
        "knock() takes 1 arguments (3 given)"
    );
}

#[test]
fn test_context() {
    let err = BridgeError::result_conversion().with_context("search");
    assert_eq!(err.to_string(), "could not convert call result (search)");
    assert_eq!(err.context.as_deref(), Some("search"));
}

#[test]
fn test_classification() {
    assert!(BridgeError::already_raised().is_already_raised());
    assert!(!BridgeError::already_raised().is_conversion());
    assert!(BridgeError::element_conversion(0).is_conversion());
    assert!(BridgeError::argument_conversion(0, 1).is_conversion());
    assert!(BridgeError::result_conversion().is_conversion());
    assert!(!BridgeError::not_iterable("int").is_conversion());
}

#[test]
fn test_exception_kind() {
    assert_eq!(BridgeError::already_raised().exception_kind(), None);
    assert_eq!(
        BridgeError::element_conversion(0).exception_kind(),
        Some(ExceptionKind::TypeError)
    );
    assert_eq!(
        BridgeError::protocol("next", "boom").exception_kind(),
        Some(ExceptionKind::RuntimeError)
    );
}

#[test]
fn test_from_kind() {
    let err: BridgeError = ErrorKind::ResultConversion.into();
    assert_eq!(err, BridgeError::result_conversion());
}
