//! Per-instance host state.
//!
//! Everything a `js_*` import touches lives in [`BridgeState`], which is the data of
//! the Wasmtime `Store`. Imports run on the thread driving the core and get exclusive
//! access through `Caller::data_mut`, so no global state or locking is involved here.
//! The only shared piece is the snapshot mailbox, which producers reach through their
//! own `Arc`.

use wasmtime_wasi::p1::WasiP1Ctx;

use crate::host::HostServices;
use crate::snapshot::SnapshotBridge;

pub struct BridgeState {
    /// Injected host capabilities.
    pub host: HostServices,

    /// Snapshot polling and completion.
    pub snapshots: SnapshotBridge,

    /// WASI preview 1 context (stdio, args, staging preopen).
    pub wasi: WasiP1Ctx,

    /// Upper bound when scanning guest memory for a NUL terminator.
    pub max_guest_string_len: usize,
}

impl BridgeState {
    pub fn new(
        host: HostServices,
        snapshots: SnapshotBridge,
        wasi: WasiP1Ctx,
        max_guest_string_len: usize,
    ) -> Self {
        Self {
            host,
            snapshots,
            wasi,
            max_guest_string_len,
        }
    }
}
