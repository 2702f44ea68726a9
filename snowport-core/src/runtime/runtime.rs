//! Wasmtime-backed runtime glue for snowport-core.
//!
//! Responsibilities:
//! - Create a Wasmtime `Engine`/`Store` with feature flags enabled.
//! - Build the WASI context: guest args, stdio, staging directory preopen.
//! - Link WASI preview 1 plus every `js_*` import.
//! - Instantiate a compiled `wasmtime::Module` and drive its entrypoint to completion.

use anyhow::{Context, anyhow};
use wasmtime::{Engine, Instance, Linker, Module, Store};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder, p1};

use crate::abi::guest_exports;
use crate::config::BridgeConfig;
use crate::host::{HostServices, Shutdown};
use crate::loader::{self, LoadError};
use crate::snapshot::{SnapshotBridge, SnapshotRequester};
use crate::state::BridgeState;

/// How a run of the core ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// The entrypoint returned normally.
    Returned,
    /// The core called WASI `proc_exit`, or `main` returned a status.
    Exited(i32),
    /// A host capability asked the core to stop.
    Shutdown(String),
}

/// Host-side runtime container.
pub struct BridgeRuntime {
    engine: Engine,
    store: Store<BridgeState>,
    linker: Linker<BridgeState>,
}

impl BridgeRuntime {
    /// Create a runtime around the given host services and snapshot bridge.
    ///
    /// Notes:
    /// - A wide range of Wasm proposal features is enabled to maximize core compatibility.
    /// - The snapshot staging directory is created if needed and preopened for the core at
    ///   `config.guest_staging_dir`, so staging file paths match on both sides.
    pub fn new(
        config: &BridgeConfig,
        host: HostServices,
        snapshots: SnapshotBridge,
    ) -> Result<Self, anyhow::Error> {
        let mut cfg = wasmtime::Config::new();

        cfg.wasm_multi_value(true);
        cfg.wasm_bulk_memory(true);
        cfg.wasm_reference_types(true);
        cfg.wasm_simd(true);

        cfg.wasm_multi_memory(true);
        cfg.wasm_memory64(true);
        cfg.wasm_relaxed_simd(true);
        cfg.wasm_tail_call(true);

        // Emscripten-style builds may declare shared memories even when single threaded.
        cfg.wasm_threads(true);

        let engine = Engine::new(&cfg)?;

        snapshots.staging().ensure_ready()?;
        let mut wasi = WasiCtxBuilder::new();
        wasi.args(config.args.as_slice());
        if config.inherit_stdio {
            wasi.inherit_stdio();
        }
        wasi.preopened_dir(
            snapshots.staging().dir(),
            &config.guest_staging_dir,
            DirPerms::all(),
            FilePerms::all(),
        )
        .with_context(|| {
            format!(
                "preopening {} at {}",
                snapshots.staging().dir().display(),
                config.guest_staging_dir
            )
        })?;

        let state = BridgeState::new(
            host,
            snapshots,
            wasi.build_p1(),
            config.max_guest_string_len,
        );
        let store = Store::new(&engine, state);

        let mut linker = Linker::new(&engine);
        p1::add_to_linker_sync(&mut linker, |state: &mut BridgeState| &mut state.wasi)?;
        super::imports::define_imports(&mut linker)?;

        log::debug!(
            "runtime ready; staging {} mounted at {}",
            store.data().snapshots.staging().dir().display(),
            config.guest_staging_dir
        );

        Ok(Self {
            engine,
            store,
            linker,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile `.wasm` or `.wat` bytes for this runtime's engine.
    pub fn compile(&self, bytes: &[u8]) -> Result<Module, LoadError> {
        loader::compile_module(&self.engine, bytes)
    }

    pub fn instantiate(&mut self, module: &Module) -> Result<Instance, anyhow::Error> {
        self.linker.instantiate(&mut self.store, module)
    }

    /// Run the core's entrypoint (`_start`, else `main`) until it returns or is stopped.
    pub fn run(&mut self, instance: &Instance) -> Result<RunOutcome, anyhow::Error> {
        let result = if let Ok(start) =
            instance.get_typed_func::<(), ()>(&mut self.store, guest_exports::START)
        {
            start.call(&mut self.store, ()).map(|()| RunOutcome::Returned)
        } else if let Ok(main) =
            instance.get_typed_func::<(), ()>(&mut self.store, guest_exports::MAIN)
        {
            main.call(&mut self.store, ()).map(|()| RunOutcome::Returned)
        } else if let Ok(main) =
            instance.get_typed_func::<(), i32>(&mut self.store, guest_exports::MAIN)
        {
            main.call(&mut self.store, ()).map(RunOutcome::Exited)
        } else {
            return Err(anyhow!(
                "core exports neither `{}` nor `{}`",
                guest_exports::START,
                guest_exports::MAIN
            ));
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if let Some(exit) = err.downcast_ref::<I32Exit>() {
                    return Ok(RunOutcome::Exited(exit.0));
                }
                if let Some(shutdown) = err.downcast_ref::<Shutdown>() {
                    log::info!("core stopped: {}", shutdown.reason);
                    return Ok(RunOutcome::Shutdown(shutdown.reason.clone()));
                }
                Err(err)
            }
        }
    }

    /// Another producer handle for this runtime's snapshot mailbox.
    pub fn requester(&self) -> SnapshotRequester {
        self.store.data().snapshots.requester()
    }

    pub fn state(&self) -> &BridgeState {
        self.store.data()
    }

    pub fn state_mut(&mut self) -> &mut BridgeState {
        self.store.data_mut()
    }

    /// Tear down the store and hand back the host state (e.g. to flush captures).
    pub fn into_state(self) -> BridgeState {
        self.store.into_data()
    }
}
