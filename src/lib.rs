//! pybridge - bidirectional adapters between native Rust and a
//! reference-counted dynamic peer runtime
//!
//! Native code iterates peer iterables (`ForeignIterableView`) and calls peer
//! callables (`ForeignCallable`); the peer iterates native ranges
//! (`NativeIterableAdapter`). Values cross through caller-supplied
//! conversion functions (`convert`).

// Core modules
pub mod runtime;
pub mod convert;
pub mod adapters;
pub mod errors;
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use runtime::{ExceptionKind, HeapStats, PyErrState, PyObject, PyOwned, TypeDescriptor};
pub use convert::{ConversionFailed, ConversionOutcome, Deleter, FromPeer, IntoPeer, ToNative, ToPeer};
pub use adapters::{
    export, make_foreign_callable, make_foreign_iterable_view, make_native_iterable,
    make_native_iterable_adapter, ArgPack, BuiltinArgs, Exhausted, ForeignCallable,
    ForeignIterableView, ForeignIterator, NativeIterable, NativeIterableAdapter, OutputMode,
};
pub use errors::{BridgeError, BridgeResult, ErrorKind};
pub use config::{BridgeConfig, ConfigError};

use tracing_appender::non_blocking::WorkerGuard;

/// Initialize from the environment
///
/// Reads `PYBRIDGE_CONFIG` (falling back to defaults when it cannot be
/// loaded), publishes the runtime settings and installs the subscriber.
pub fn init() -> Option<WorkerGuard> {
    init_or_fallback(BridgeConfig::from_env(), BridgeConfig::default())
}

/// Initialize with `loaded`, or with `fallback` when loading failed
///
/// The subscriber is installed before the load failure is reported, so the
/// warning reaches the configured output.
pub fn init_or_fallback(
    loaded: Result<BridgeConfig, ConfigError>,
    fallback: BridgeConfig,
) -> Option<WorkerGuard> {
    match loaded {
        Ok(config) => init_with_config(&config),
        Err(err) => {
            let guard = init_with_config(&fallback);
            logging::warn!("ignoring configuration: {}", err);
            guard
        }
    }
}

/// Initialize with an explicit configuration
pub fn init_with_config(config: &BridgeConfig) -> Option<WorkerGuard> {
    config::apply(config);
    let guard = logging::init_with_config(config.log_config());
    logging::log_runtime_init();
    guard
}

/// Report objects still alive on this thread's heap
pub fn cleanup() -> usize {
    let live = runtime::audit();
    logging::log_runtime_shutdown(live);
    live
}
