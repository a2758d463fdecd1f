//! Adapters - native/peer bridging on top of the runtime protocol
//!
//! Architecture:
//! - `iterable.rs` - native iteration over peer iterables
//! - `native.rs` - peer iteration over native ranges
//! - `callable.rs` - native calls of peer callables
//! - `collect.rs` - eager list/tuple/set export, `Vec` conversions
//! - `boundary.rs` - turning `BridgeError` back into a peer error
//!
//! Adapters only hold `PyOwned`, so every exit path releases what it took.

pub mod iterable;
pub mod native;
pub mod callable;
pub mod collect;
pub mod boundary;


pub use iterable::{Exhausted, ForeignIterableView, ForeignIterator};
pub use native::{make_native_iterable, make_native_iterable_adapter, NativeIterable, NativeIterableAdapter};
pub use callable::{make_foreign_callable, ArgPack, BuiltinArgs, ForeignCallable};
pub use collect::{convert_all, export, OutputMode};
pub use boundary::{expect_args, guard, native_function};

use crate::convert::{Deleter, ToNative};
use crate::errors::BridgeResult;
use crate::runtime::PyObject;

/// `makeForeignIterableView`
pub fn make_foreign_iterable_view<T>(
    iterable: PyObject,
    convert: ToNative<T>,
    deleter: Option<Deleter<T>>,
) -> BridgeResult<ForeignIterableView<T>> {
    let view = ForeignIterableView::new(iterable, convert)?;
    Ok(match deleter {
        Some(deleter) => view.with_deleter(deleter),
        None => view,
    })
}
