//! Wasmtime-backed runtime glue for snowport-core.
//!
//! Responsibilities:
//! - Create a Wasmtime `Engine`/`Store` with feature flags enabled.
//! - Wire WASI preview 1 with the snapshot staging directory preopened.
//! - Define every `js_*` host import under module `"env"`.
//! - Instantiate a compiled `wasmtime::Module` and run its entrypoint.

pub mod guest;
pub mod imports;
pub mod runtime;

pub use guest::GuestMemoryError;
pub use runtime::{BridgeRuntime, RunOutcome};
