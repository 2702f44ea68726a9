//! snowport-sdk (handwritten)
//!
//! This crate is used by the **guest**: an emulator core compiled to WebAssembly and run
//! by `snowport-core`. It wraps the `js_*` imports (module `"env"`) in safe functions.
//!
//! ABI model:
//! - The core owns its memory; every pointer passed to the host is an offset into it.
//! - Video and audio are pushed as byte slices; the host copies what it keeps.
//! - Snapshot requests are polled: `snapshot::take_command()` once per tick, then the
//!   core reads or writes the staging file and reports completion.
//! - Input is read under a lock so one tick sees a consistent snapshot.
//!
//! The import wrappers only exist on `wasm32`; [`codes`] and [`pacing`] are plain Rust
//! and build everywhere.

pub mod codes;
pub mod pacing;

pub use codes::{EmulatorSpeed, KeyEvent, SnapshotCommand, SnapshotKind};

/// Low-level raw ABI imports.
#[cfg(target_arch = "wasm32")]
#[allow(non_camel_case_types)]
pub mod sys {
    #[link(wasm_import_module = "env")]
    unsafe extern "C" {
        // Runtime
        pub fn js_sleep(seconds: f64);
        pub fn js_check_for_periodic_tasks();
        pub fn js_console_log(message: u32);

        // Snapshots
        pub fn js_snapshot_take_kind() -> i32;
        pub fn js_snapshot_take_request_id() -> u32;
        pub fn js_snapshot_complete_save(request_id: u32);
        pub fn js_snapshot_complete_loaded(request_id: u32);
        pub fn js_snapshot_complete_error(request_id: u32, error: u32);

        // Video
        pub fn js_did_open_video(width: u32, height: u32);
        pub fn js_blit(ptr: u32, len: u32);

        // Audio
        pub fn js_did_open_audio(sample_rate: u32, sample_size: u32, channels: u32);
        pub fn js_audio_buffer_size() -> i32;
        pub fn js_enqueue_audio(ptr: u32, len: u32);

        // Disks
        pub fn js_disk_open(name: u32) -> i32;
        pub fn js_disk_close(disk_id: i32);
        pub fn js_disk_size(disk_id: i32) -> f64;
        pub fn js_disk_read(disk_id: i32, ptr: u32, offset: f64, length: f64) -> f64;
        pub fn js_disk_write(disk_id: i32, ptr: u32, offset: f64, length: f64) -> f64;
        pub fn js_consume_cdrom_name() -> u32;
        pub fn js_free(ptr: u32);

        // Input
        pub fn js_acquire_input_lock() -> i32;
        pub fn js_release_input_lock();
        pub fn js_has_mouse_position() -> i32;
        pub fn js_get_mouse_x_position() -> i32;
        pub fn js_get_mouse_y_position() -> i32;
        pub fn js_get_mouse_delta_x() -> i32;
        pub fn js_get_mouse_delta_y() -> i32;
        pub fn js_get_mouse_button_state() -> i32;
        pub fn js_has_key_event() -> i32;
        pub fn js_get_key_code() -> i32;
        pub fn js_get_key_state() -> i32;
        pub fn js_has_speed_event() -> i32;
        pub fn js_get_speed() -> i32;
    }
}

/// Turn `text` into a C string, replacing interior NULs with spaces.
#[cfg(target_arch = "wasm32")]
fn c_string(text: &str) -> std::ffi::CString {
    let bytes: Vec<u8> = text
        .bytes()
        .map(|b| if b == 0 { b' ' } else { b })
        .collect();
    // No NUL is left, so this cannot fail.
    std::ffi::CString::new(bytes).unwrap_or_default()
}

#[cfg(target_arch = "wasm32")]
fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Runtime API.
#[cfg(target_arch = "wasm32")]
pub mod runtime {
    use std::time::Duration;

    use super::sys;

    /// Give the host a chance to run timers and deliver requests. May not return if
    /// the host decides to stop the core.
    pub fn check_for_periodic_tasks() {
        unsafe { sys::js_check_for_periodic_tasks() }
    }

    pub fn sleep(duration: Duration) {
        unsafe { sys::js_sleep(duration.as_secs_f64()) }
    }

    /// Log a message to the host console.
    pub fn log(message: &str) {
        let message = super::c_string(message);
        unsafe { sys::js_console_log(message.as_ptr() as u32) }
    }
}

/// Video API.
#[cfg(target_arch = "wasm32")]
pub mod video {
    use super::sys;

    /// Announce the framebuffer dimensions.
    pub fn did_open(width: u32, height: u32) {
        unsafe { sys::js_did_open_video(width, height) }
    }

    /// Present one frame. Empty frames are skipped.
    pub fn blit(frame: &[u8]) {
        if frame.is_empty() {
            return;
        }
        unsafe { sys::js_blit(frame.as_ptr() as u32, super::len_u32(frame.len())) }
    }
}

/// Audio API.
#[cfg(target_arch = "wasm32")]
pub mod audio {
    use super::pacing::AudioPacing;
    use super::{runtime, sys};

    pub fn did_open(sample_rate: u32, sample_size_bits: u32, channels: u32) {
        unsafe { sys::js_did_open_audio(sample_rate, sample_size_bits, channels) }
    }

    /// Bytes the host has queued and not yet played, if it knows.
    pub fn buffer_size() -> Option<usize> {
        usize::try_from(unsafe { sys::js_audio_buffer_size() }).ok()
    }

    /// Queue interleaved samples. Empty buffers are skipped.
    pub fn enqueue(samples: &[u8]) {
        if samples.is_empty() {
            return;
        }
        unsafe { sys::js_enqueue_audio(samples.as_ptr() as u32, super::len_u32(samples.len())) }
    }

    /// Sleep until the host has room for `next_len` more bytes.
    pub fn wait_for_room(pacing: &AudioPacing, next_len: usize) {
        while let Some(wait) = pacing.wait_before_enqueue(buffer_size(), next_len) {
            runtime::sleep(wait);
        }
    }
}

/// Disk API.
#[cfg(target_arch = "wasm32")]
pub mod disks {
    use std::ffi::{CStr, CString, c_char};
    use std::fmt;

    use super::{codes, sys};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DiskError {
        /// The name contains a NUL byte.
        InvalidName(String),
        NotFound(String),
        InvalidSize(String),
    }

    impl fmt::Display for DiskError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                DiskError::InvalidName(name) => write!(f, "invalid disk name {name:?}"),
                DiskError::NotFound(name) => write!(f, "disk not found: {name}"),
                DiskError::InvalidSize(name) => write!(f, "invalid disk size for {name}"),
            }
        }
    }

    impl std::error::Error for DiskError {}

    /// An open host disk image. Closed on drop.
    #[derive(Debug)]
    pub struct DiskHandle {
        disk_id: i32,
        size_bytes: usize,
        name: String,
    }

    impl DiskHandle {
        pub fn open(name: &str) -> Result<Self, DiskError> {
            let c_name =
                CString::new(name).map_err(|_| DiskError::InvalidName(name.to_owned()))?;
            let disk_id = unsafe { sys::js_disk_open(c_name.as_ptr() as u32) };
            if disk_id < 0 {
                return Err(DiskError::NotFound(name.to_owned()));
            }
            let size = unsafe { sys::js_disk_size(disk_id) };
            if !size.is_finite() || size < 0.0 {
                unsafe { sys::js_disk_close(disk_id) };
                return Err(DiskError::InvalidSize(name.to_owned()));
            }
            Ok(Self {
                disk_id,
                size_bytes: size as usize,
                name: name.to_owned(),
            })
        }

        pub fn size_bytes(&self) -> usize {
            self.size_bytes
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        /// Fill `buf` from `offset`. Returns the bytes read, `None` if the host refused.
        pub fn read_into(&self, offset: usize, buf: &mut [u8]) -> Option<usize> {
            if buf.is_empty() {
                return Some(0);
            }
            let read = unsafe {
                sys::js_disk_read(
                    self.disk_id,
                    buf.as_mut_ptr() as u32,
                    offset as f64,
                    buf.len() as f64,
                )
            };
            (read >= 0.0).then_some(read as usize)
        }

        /// Always `length` bytes long; whatever the host could not read is zero.
        pub fn read_vec(&self, offset: usize, length: usize) -> Vec<u8> {
            codes::zero_filled_read(length, |buf| self.read_into(offset, buf))
        }

        pub fn read_all(&self) -> Vec<u8> {
            self.read_vec(0, self.size_bytes)
        }

        /// Write `data` at `offset`. Returns the bytes written, `None` if the host refused.
        pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Option<usize> {
            if data.is_empty() {
                return Some(0);
            }
            let written = unsafe {
                sys::js_disk_write(
                    self.disk_id,
                    data.as_ptr() as u32,
                    offset as f64,
                    data.len() as f64,
                )
            };
            (written >= 0.0).then_some(written as usize)
        }
    }

    impl Drop for DiskHandle {
        fn drop(&mut self) {
            unsafe { sys::js_disk_close(self.disk_id) }
        }
    }

    /// Next CD-ROM image the user asked to insert.
    pub fn consume_cdrom_name() -> Option<String> {
        let ptr = unsafe { sys::js_consume_cdrom_name() };
        if ptr == 0 {
            return None;
        }
        // The host wrote a NUL-terminated string into memory from our allocator.
        let name = unsafe { CStr::from_ptr(ptr as usize as *const c_char) }
            .to_string_lossy()
            .into_owned();
        unsafe { sys::js_free(ptr) };
        Some(name)
    }
}

/// Input API.
#[cfg(target_arch = "wasm32")]
pub mod input {
    use super::codes::{EmulatorSpeed, KeyEvent};
    use super::{runtime, sys};

    /// Holds the host's input lock; released (and one-shot events consumed) on drop.
    #[derive(Debug)]
    pub struct InputLock {
        _private: (),
    }

    /// Try to lock the input buffer. `None` means the host is busy; try next tick.
    pub fn lock() -> Option<InputLock> {
        (unsafe { sys::js_acquire_input_lock() } != 0).then_some(InputLock { _private: () })
    }

    impl InputLock {
        /// `Some(pressed)` if the button changed since the last poll.
        pub fn mouse_button_state(&self) -> Option<bool> {
            let state = unsafe { sys::js_get_mouse_button_state() };
            (state >= 0).then_some(state != 0)
        }

        pub fn has_mouse_position(&self) -> bool {
            unsafe { sys::js_has_mouse_position() != 0 }
        }

        pub fn mouse_position(&self) -> (i32, i32) {
            unsafe { (sys::js_get_mouse_x_position(), sys::js_get_mouse_y_position()) }
        }

        pub fn mouse_delta(&self) -> (i32, i32) {
            unsafe { (sys::js_get_mouse_delta_x(), sys::js_get_mouse_delta_y()) }
        }

        pub fn key_event(&self) -> Option<KeyEvent> {
            if unsafe { sys::js_has_key_event() } == 0 {
                return None;
            }
            let (code, state) = unsafe { (sys::js_get_key_code(), sys::js_get_key_state()) };
            Some(KeyEvent::decode(code, state))
        }

        /// Requested speed change. Unknown codes are logged and ignored.
        pub fn speed_event(&self) -> Option<EmulatorSpeed> {
            if unsafe { sys::js_has_speed_event() } == 0 {
                return None;
            }
            let raw = unsafe { sys::js_get_speed() };
            let speed = EmulatorSpeed::from_code(raw);
            if speed.is_none() {
                runtime::log(&format!("ignoring unknown speed value: {raw}"));
            }
            speed
        }
    }

    impl Drop for InputLock {
        fn drop(&mut self) {
            unsafe { sys::js_release_input_lock() }
        }
    }
}

/// Snapshot API.
#[cfg(target_arch = "wasm32")]
pub mod snapshot {
    use super::codes::{self, SnapshotCommand};
    use super::sys;

    pub use codes::{load_path, save_path};

    /// Poll for the next snapshot request.
    pub fn take_command() -> Option<SnapshotCommand> {
        let kind = unsafe { sys::js_snapshot_take_kind() };
        if kind == codes::SNAPSHOT_NONE {
            return None;
        }
        let request_id = unsafe { sys::js_snapshot_take_request_id() };
        codes::decode_snapshot_command(kind, request_id)
    }

    /// The state for `request_id` has been written to [`save_path`].
    pub fn complete_save(request_id: u32) {
        unsafe { sys::js_snapshot_complete_save(request_id) }
    }

    /// The state staged at [`load_path`] has been restored.
    pub fn complete_loaded(request_id: u32) {
        unsafe { sys::js_snapshot_complete_loaded(request_id) }
    }

    pub fn complete_error(request_id: u32, message: &str) {
        let message = super::c_string(message);
        unsafe { sys::js_snapshot_complete_error(request_id, message.as_ptr() as u32) }
    }
}

/// Convenience prelude for cores.
pub mod prelude {
    pub use crate::codes::{EmulatorSpeed, KeyEvent, SnapshotCommand, SnapshotKind};
    pub use crate::pacing::AudioPacing;

    #[cfg(target_arch = "wasm32")]
    pub use crate::{audio, disks, input, runtime, snapshot, video};
}
