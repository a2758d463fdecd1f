//! Object handles - borrowed and owning references into the peer heap
//!
//! Design: a `PyObject` is a plain `Copy` handle (slot index + generation)
//! that never touches the count. A `PyOwned` owns exactly one count unit:
//! cloning acquires, dropping releases. Adapters only ever store `PyOwned`,
//! so every exit path releases what it acquired.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

use super::heap;
use super::types::TypeDescriptor;

/// Borrowed reference to a peer object
///
/// Stale handles (their object has been released) are detected by the
/// generation check on every heap access.
///
/// Handles index the heap of the thread that created them, so neither
/// handle type may leave that thread:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<pybridge::PyObject>();
/// ```
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<pybridge::PyOwned>();
/// ```
///
/// ```compile_fail
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<pybridge::PyOwned>();
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PyObject {
    index: u32,
    generation: u32,
    _thread_bound: PhantomData<*const ()>,
}

impl PyObject {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _thread_bound: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) fn generation(self) -> u32 {
        self.generation
    }

    /// Check whether the referenced object is still allocated
    #[inline]
    pub fn is_alive(self) -> bool {
        heap::is_alive(self)
    }

    /// Current reference count (0 once released)
    #[inline]
    pub fn refcount(self) -> usize {
        heap::refcount(self)
    }

    /// Peer type name, e.g. `int` or `native_iterator`
    pub fn type_name(self) -> &'static str {
        heap::with_payload(self, Payload::type_name).unwrap_or("<released>")
    }
}

impl fmt::Debug for PyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PyObject(#{}@{})", self.index, self.generation)
    }
}

/// Owning reference: holds one count unit for its whole lifetime
pub struct PyOwned {
    obj: PyObject,
}

impl PyOwned {
    /// Take a new count unit on a borrowed object
    #[inline]
    pub fn acquire(obj: PyObject) -> Self {
        heap::acquire(obj);
        Self { obj }
    }

    /// Adopt a count unit the caller already owns (no increment)
    #[inline]
    pub fn from_raw(obj: PyObject) -> Self {
        Self { obj }
    }

    /// Give up ownership without releasing; the caller now owns the unit
    #[inline]
    pub fn into_raw(self) -> PyObject {
        let obj = self.obj;
        std::mem::forget(self);
        obj
    }

    /// Borrow the underlying handle
    #[inline]
    pub fn as_ptr(&self) -> PyObject {
        self.obj
    }

    #[inline]
    pub fn refcount(&self) -> usize {
        heap::refcount(self.obj)
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.obj.type_name()
    }
}

impl Clone for PyOwned {
    #[inline]
    fn clone(&self) -> Self {
        Self::acquire(self.obj)
    }
}

impl Drop for PyOwned {
    #[inline]
    fn drop(&mut self) {
        heap::release_on_drop(self.obj);
    }
}

impl fmt::Debug for PyOwned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PyOwned").field(&self.obj).finish()
    }
}

/// Peer callable implemented by a closure
///
/// Receives borrowed arguments, returns a new reference or `None` with the
/// error indicator set.
pub type NativeFn = Rc<dyn Fn(&[PyObject]) -> Option<PyOwned>>;

/// Object representation per peer type
pub(crate) enum Payload {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PyOwned>),
    /// Slots start empty when built by `new_args`
    Tuple(SmallVec<[Option<PyOwned>; 4]>),
    Set(Vec<PyOwned>),
    /// Builtin iterator over list/tuple/set (item index) or str (byte offset)
    SeqIter { seq: PyOwned, position: usize },
    Function { name: String, func: NativeFn },
    /// State is `None` while one of its slots is running
    Native {
        descriptor: &'static TypeDescriptor,
        state: Option<Box<dyn Any>>,
    },
}

impl Payload {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::SeqIter { .. } => "iterator",
            Self::Function { .. } => "function",
            Self::Native { descriptor, .. } => descriptor.name,
        }
    }
}
