//! snowport-core ABI module
//!
//! This module defines the native-call contract between:
//! - **Host**: `snowport-core` (this crate, embedding the core with Wasmtime)
//! - **Guest**: the emulator core compiled to WebAssembly
//!
//! ## Imports (guest -> host)
//! Imported from module `"env"`. Pointers are offsets into guest linear memory.
//!
//! ### Runtime
//! - `js_sleep(seconds: f64)`
//! - `js_check_for_periodic_tasks()`
//! - `js_console_log(msg: *const c_char)`
//!
//! ### Snapshots
//! - `js_snapshot_take_kind() -> i32` (0 none, 1 save, 2 load)
//! - `js_snapshot_take_request_id() -> u32` (0 none)
//! - `js_snapshot_complete_save(request_id: u32)`
//! - `js_snapshot_complete_loaded(request_id: u32)`
//! - `js_snapshot_complete_error(request_id: u32, error: *const c_char)`
//!
//! ### Video
//! - `js_did_open_video(width: u32, height: u32)`
//! - `js_blit(buf: *const u8, len: u32)`
//!
//! ### Audio
//! - `js_did_open_audio(sample_rate: u32, sample_size: u32, channels: u32)`
//! - `js_audio_buffer_size() -> i32` (-1 when unknown)
//! - `js_enqueue_audio(buf: *const u8, len: u32)`
//!
//! ### Disks
//! - `js_disk_open(name: *const c_char) -> i32` (-1 when not found)
//! - `js_disk_close(disk_id: i32)`
//! - `js_disk_size(disk_id: i32) -> f64`
//! - `js_disk_read(disk_id: i32, buf: *mut u8, offset: f64, length: f64) -> f64`
//! - `js_disk_write(disk_id: i32, buf: *const u8, offset: f64, length: f64) -> f64`
//! - `js_consume_cdrom_name() -> *mut c_char` (0 when nothing is pending; freed with `js_free`)
//! - `js_free(ptr: *mut c_void)`
//!
//! ### Input
//! - `js_acquire_input_lock() -> i32`, `js_release_input_lock()`
//! - one `() -> i32` getter per [`InputField`]
//!
//! Numbers crossing the boundary are kept exactly as the core declares them; the typed
//! host traits in `crate::host` never see the sentinel values used at this boundary.

/// Import module name used by the guest.
pub const IMPORT_MODULE: &str = "env";

/// Guest export names.
pub mod guest_exports {
    /// WASI command entrypoint.
    pub const START: &str = "_start";
    /// Fallback entrypoint for cores built without a WASI command wrapper.
    pub const MAIN: &str = "main";
    /// Linear memory.
    pub const MEMORY: &str = "memory";
    /// Guest allocator used to hand strings to the core.
    pub const MALLOC: &str = "malloc";
    pub const FREE: &str = "free";
}

/// Host import names provided to the guest.
///
/// These are the string names under module [`IMPORT_MODULE`].
pub mod host_imports {
    // Runtime
    pub const SLEEP: &str = "js_sleep";
    pub const CHECK_FOR_PERIODIC_TASKS: &str = "js_check_for_periodic_tasks";
    pub const CONSOLE_LOG: &str = "js_console_log";

    // Snapshots
    pub const SNAPSHOT_TAKE_KIND: &str = "js_snapshot_take_kind";
    pub const SNAPSHOT_TAKE_REQUEST_ID: &str = "js_snapshot_take_request_id";
    pub const SNAPSHOT_COMPLETE_SAVE: &str = "js_snapshot_complete_save";
    pub const SNAPSHOT_COMPLETE_LOADED: &str = "js_snapshot_complete_loaded";
    pub const SNAPSHOT_COMPLETE_ERROR: &str = "js_snapshot_complete_error";

    // Video
    pub const DID_OPEN_VIDEO: &str = "js_did_open_video";
    pub const BLIT: &str = "js_blit";

    // Audio
    pub const DID_OPEN_AUDIO: &str = "js_did_open_audio";
    pub const AUDIO_BUFFER_SIZE: &str = "js_audio_buffer_size";
    pub const ENQUEUE_AUDIO: &str = "js_enqueue_audio";

    // Disks
    pub const DISK_OPEN: &str = "js_disk_open";
    pub const DISK_CLOSE: &str = "js_disk_close";
    pub const DISK_SIZE: &str = "js_disk_size";
    pub const DISK_READ: &str = "js_disk_read";
    pub const DISK_WRITE: &str = "js_disk_write";
    pub const CONSUME_CDROM_NAME: &str = "js_consume_cdrom_name";
    pub const FREE: &str = "js_free";

    // Input
    pub const ACQUIRE_INPUT_LOCK: &str = "js_acquire_input_lock";
    pub const RELEASE_INPUT_LOCK: &str = "js_release_input_lock";
}

/// Snapshot kind codes returned by `js_snapshot_take_kind`.
pub mod snapshot_codes {
    pub const NONE: i32 = 0;
    pub const SAVE: i32 = 1;
    pub const LOAD: i32 = 2;

    /// Request id meaning "no pending request".
    pub const NO_REQUEST: u32 = 0;
}

/// Staging file names shared with the core. The host directory is preopened at
/// `BridgeConfig::guest_staging_dir`, so the core sees them under `/tmp` by default.
pub mod staging {
    pub const SAVE_PREFIX: &str = "outgoing-vm-snapshot-";
    pub const LOAD_PREFIX: &str = "incoming-vm-snapshot-";
    pub const EXTENSION: &str = "snows";

    pub fn save_file_name(request_id: u32) -> String {
        format!("{SAVE_PREFIX}{request_id}.{EXTENSION}")
    }

    pub fn load_file_name(request_id: u32) -> String {
        format!("{LOAD_PREFIX}{request_id}.{EXTENSION}")
    }
}

/// Slots of the shared input buffer, one `js_*` getter each.
///
/// The discriminant is the slot index inside `crate::host::input::SharedInput`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InputField {
    MousePositionFlag = 0,
    MousePositionX = 1,
    MousePositionY = 2,
    MouseDeltaX = 3,
    MouseDeltaY = 4,
    /// `-1` when no button change is pending, else 0 (up) / 1 (down).
    MouseButtonState = 5,
    KeyEventFlag = 6,
    KeyCode = 7,
    KeyState = 8,
    SpeedFlag = 9,
    Speed = 10,
}

impl InputField {
    pub const COUNT: usize = 11;

    pub const ALL: [InputField; Self::COUNT] = [
        InputField::MousePositionFlag,
        InputField::MousePositionX,
        InputField::MousePositionY,
        InputField::MouseDeltaX,
        InputField::MouseDeltaY,
        InputField::MouseButtonState,
        InputField::KeyEventFlag,
        InputField::KeyCode,
        InputField::KeyState,
        InputField::SpeedFlag,
        InputField::Speed,
    ];

    /// Name of the `js_*` getter serving this field.
    pub const fn import_name(self) -> &'static str {
        match self {
            InputField::MousePositionFlag => "js_has_mouse_position",
            InputField::MousePositionX => "js_get_mouse_x_position",
            InputField::MousePositionY => "js_get_mouse_y_position",
            InputField::MouseDeltaX => "js_get_mouse_delta_x",
            InputField::MouseDeltaY => "js_get_mouse_delta_y",
            InputField::MouseButtonState => "js_get_mouse_button_state",
            InputField::KeyEventFlag => "js_has_key_event",
            InputField::KeyCode => "js_get_key_code",
            InputField::KeyState => "js_get_key_state",
            InputField::SpeedFlag => "js_has_speed_event",
            InputField::Speed => "js_get_speed",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Convert an `f64` offset/length from the core into a byte count.
///
/// The core passes 64-bit sizes as doubles; anything negative, NaN or
/// beyond 2^53 is rejected.
pub fn f64_to_len(value: f64) -> Option<u64> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if !value.is_finite() || value < 0.0 || value > MAX_EXACT {
        return None;
    }
    Some(value as u64)
}

/// Saturating conversion used for lengths reported back as `i32`.
pub fn saturate_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
