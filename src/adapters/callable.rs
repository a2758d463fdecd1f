//! Foreign callables invoked from native code
//!
//! Arguments are passed as a tuple whose arity is fixed by the type: the
//! per-position converters are built once, at construction, and reused for
//! every call. Each call allocates its own argument container and releases
//! it, every argument and the result before returning, on every path.

use crate::convert::{ConversionFailed, ConversionOutcome, FromPeer, IntoPeer, ToNative, ToPeer};
use crate::errors::{BridgeError, BridgeResult};
use crate::logging::log_conversion_failed;
use crate::runtime::error;
use crate::runtime::protocol;
use crate::runtime::{PyObject, PyOwned};

/// Native argument tuple of a fixed arity
pub trait ArgPack: Sized {
    const ARITY: usize;

    /// One `ToPeer` per position
    type Converters: Clone;

    /// Convert every argument into its slot of `container`
    ///
    /// Stops at the first failure and returns its position; arguments
    /// placed so far are owned by the container.
    fn marshal(&self, converters: &Self::Converters, container: PyObject) -> Result<(), usize>;
}

/// Argument tuples whose every element has a builtin conversion
pub trait BuiltinArgs: ArgPack {
    fn builtin_converters() -> Self::Converters;
}

macro_rules! impl_arg_pack {
    ($arity:expr; $($name:ident : $index:tt),*) => {
        impl<$($name),*> ArgPack for ($($name,)*) {
            const ARITY: usize = $arity;
            type Converters = ($(ToPeer<$name>,)*);

            #[allow(unused_variables)]
            fn marshal(&self, converters: &Self::Converters, container: PyObject) -> Result<(), usize> {
                $(
                    match converters.$index.convert(&self.$index) {
                        Ok(obj) if !error::is_set() => protocol::set_arg(container, $index, obj),
                        _ => return Err($index),
                    }
                )*
                Ok(())
            }
        }

        impl<$($name: IntoPeer + 'static),*> BuiltinArgs for ($($name,)*) {
            #[allow(clippy::unused_unit)]
            fn builtin_converters() -> Self::Converters {
                ($(ToPeer::<$name>::builtin(),)*)
            }
        }
    };
}

impl_arg_pack!(0;);
impl_arg_pack!(1; A: 0);
impl_arg_pack!(2; A: 0, B: 1);
impl_arg_pack!(3; A: 0, B: 1, C: 2);
impl_arg_pack!(4; A: 0, B: 1, C: 2, D: 3);
impl_arg_pack!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_arg_pack!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

enum Returns<R> {
    Convert(ToNative<R>),
    /// Void return: the result is released unconverted
    Discard(fn() -> R),
}

impl<R> Clone for Returns<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Convert(convert) => Self::Convert(convert.clone()),
            Self::Discard(unit) => Self::Discard(*unit),
        }
    }
}

/// Native invocable over a peer callable
pub struct ForeignCallable<R, A: ArgPack> {
    callable: PyOwned,
    arguments: A::Converters,
    returns: Returns<R>,
}

impl<R, A: ArgPack> ForeignCallable<R, A> {
    /// Fails with `NotCallable` unless the peer can call `callable`
    pub fn new(callable: PyObject, returns: ToNative<R>, arguments: A::Converters) -> BridgeResult<Self> {
        Self::with_returns(callable, Returns::Convert(returns), arguments)
    }

    fn with_returns(callable: PyObject, returns: Returns<R>, arguments: A::Converters) -> BridgeResult<Self> {
        if !protocol::is_callable(callable) {
            return Err(BridgeError::not_callable(callable.type_name()));
        }
        Ok(Self {
            callable: PyOwned::acquire(callable),
            arguments,
            returns,
        })
    }

    #[inline]
    pub fn arity() -> usize {
        A::ARITY
    }

    /// Marshal `args`, invoke, convert the result back
    ///
    /// - argument conversion failure: indicator cleared, `ArgumentConversion`
    /// - peer call failure: indicator left set, `AlreadyRaised`
    /// - result conversion failure: indicator cleared, `ResultConversion`
    ///
    /// With an error already pending nothing is converted or invoked: the
    /// call fails with `AlreadyRaised` and the pending error stays set.
    pub fn call(&self, args: A) -> BridgeResult<R> {
        if error::is_set() {
            return Err(BridgeError::already_raised());
        }
        let container = protocol::new_args(A::ARITY);
        if let Err(position) = args.marshal(&self.arguments, container.as_ptr()) {
            drop(container);
            error::clear();
            log_conversion_failed("argument", position);
            return Err(BridgeError::argument_conversion(position, A::ARITY));
        }
        drop(args);

        let result = protocol::invoke(self.callable.as_ptr(), container.as_ptr());
        drop(container);
        let result = result.ok_or_else(BridgeError::already_raised)?;

        match &self.returns {
            Returns::Discard(unit) => {
                drop(result);
                Ok(unit())
            }
            Returns::Convert(convert) => {
                let outcome = convert.convert(result.as_ptr());
                drop(result);
                match outcome {
                    Ok(value) if !error::is_set() => Ok(value),
                    _ => {
                        error::clear();
                        log_conversion_failed("result", 0);
                        Err(BridgeError::result_conversion())
                    }
                }
            }
        }
    }

    /// Borrow as a plain closure
    pub fn as_fn(&self) -> impl Fn(A) -> BridgeResult<R> + '_ {
        move |args| self.call(args)
    }

    #[inline]
    pub fn as_ptr(&self) -> PyObject {
        self.callable.as_ptr()
    }
}

impl<A: ArgPack> ForeignCallable<(), A> {
    /// Void return: the peer result is released without conversion
    pub fn void(callable: PyObject, arguments: A::Converters) -> BridgeResult<Self> {
        Self::with_returns(callable, Returns::Discard(|| ()), arguments)
    }
}

impl<R: FromPeer + 'static, A: BuiltinArgs> ForeignCallable<R, A> {
    /// Builtin conversions for the result and every argument
    pub fn builtin(callable: PyObject) -> BridgeResult<Self> {
        Self::new(callable, ToNative::builtin(), A::builtin_converters())
    }
}

impl<R, A: ArgPack> Clone for ForeignCallable<R, A> {
    fn clone(&self) -> Self {
        Self {
            callable: self.callable.clone(),
            arguments: self.arguments.clone(),
            returns: self.returns.clone(),
        }
    }
}

impl<R, A: ArgPack> std::fmt::Debug for ForeignCallable<R, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignCallable")
            .field("callable", &self.callable)
            .field("arity", &A::ARITY)
            .finish()
    }
}

/// Callables passed in as arguments or elements
impl<R: FromPeer + 'static, A: BuiltinArgs> FromPeer for ForeignCallable<R, A> {
    fn from_peer(obj: PyObject) -> ConversionOutcome<Self> {
        Self::builtin(obj).map_err(|err| {
            err.restore();
            ConversionFailed
        })
    }
}

/// `makeForeignCallable`
pub fn make_foreign_callable<R, A: ArgPack>(
    callable: PyObject,
    returns: ToNative<R>,
    arguments: A::Converters,
) -> BridgeResult<ForeignCallable<R, A>> {
    ForeignCallable::new(callable, returns, arguments)
}
