//! snowport-core: host bindings for an emulator core compiled to WebAssembly.
//!
//! The core runs inside Wasmtime and reaches the outside world only through `js_*`
//! native calls imported from module `"env"`:
//! - video: framebuffer setup and frame blits
//! - audio: format setup, buffer level, sample enqueue
//! - disks: open/close/size/read/write plus CD-ROM insertion
//! - input: a locked snapshot of mouse, keyboard and speed events
//! - runtime: sleep, periodic checks, console logging
//! - snapshots: a mailbox the core polls for save/load requests, and completion calls
//!
//! Every import is a thin shim over the capability traits in [`host`] or the snapshot
//! machinery in [`snapshot`]. The ABI surface lives in `crate::abi` and is mirrored by
//! `snowport-sdk` on the guest side.
//!
//! Typical embedding:
//!
//! ```no_run
//! use std::sync::mpsc;
//! use snowport_core::{
//!     BridgeConfig, BridgeRuntime, HostServices, SnapshotBridge, SnapshotStaging,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = BridgeConfig::from_env();
//! let (events, _rx) = mpsc::channel::<snowport_core::SnapshotEvent>();
//! let snapshots = SnapshotBridge::new(SnapshotStaging::new(&config.staging_dir), events);
//! let mut runtime = BridgeRuntime::new(&config, HostServices::detached(), snapshots)?;
//!
//! let module = runtime.compile(&std::fs::read("core.wasm")?)?;
//! let instance = runtime.instantiate(&module)?;
//! runtime.requester().request_save(1)?;
//! let outcome = runtime.run(&instance)?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod config;
pub mod host;
pub mod loader;
pub mod mailbox;
pub mod runtime;
pub mod snapshot;
pub mod state;

pub use config::BridgeConfig;
pub use host::{HostServices, Shutdown};
pub use mailbox::{SnapshotCommand, SnapshotKind, SnapshotMailbox};
pub use runtime::{BridgeRuntime, RunOutcome};
pub use snapshot::{
    SnapshotBridge, SnapshotError, SnapshotEvent, SnapshotRequester, SnapshotStaging,
};
