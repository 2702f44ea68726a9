//! Host import definitions for the Wasmtime runtime.
//!
//! This module defines every `js_*` function imported by the core under the "env"
//! module. Each one is a thin shim: decode the raw arguments, call the matching host
//! capability or the snapshot bridge, encode the result back into the core's sentinel
//! convention.

use std::time::Duration;

use wasmtime::{Caller, Linker};

use crate::abi::{self, IMPORT_MODULE, InputField, f64_to_len, host_imports, snapshot_codes};
use crate::host::{AudioFormat, DiskId};
use crate::state::BridgeState;

use super::guest::{self, with_guest_slice};

/// Returned by value-producing imports when the host could not serve the call.
const FAILED_I32: i32 = -1;
const FAILED_F64: f64 = -1.0;

/// Define all host imports expected by the core under module `"env"`.
///
/// Must be called before instantiating the module.
pub fn define_imports(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    define_runtime(linker)?;
    define_snapshots(linker)?;
    define_video(linker)?;
    define_audio(linker)?;
    define_disks(linker)?;
    define_input(linker)?;
    Ok(())
}

fn define_runtime(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SLEEP,
        |mut caller: Caller<'_, BridgeState>, seconds: f64| {
            let duration = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);
            caller.data_mut().host.runtime.sleep(duration);
        },
    )?;

    // A `Shutdown` error traps the core and unwinds back to `BridgeRuntime::run`.
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::CHECK_FOR_PERIODIC_TASKS,
        |mut caller: Caller<'_, BridgeState>| -> anyhow::Result<()> {
            caller.data_mut().host.runtime.check_for_periodic_tasks()?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::CONSOLE_LOG,
        |mut caller: Caller<'_, BridgeState>, ptr: u32| {
            match guest::read_c_string(&mut caller, ptr) {
                Ok(message) => caller.data_mut().host.runtime.log(&message),
                Err(err) => log::warn!("{}: {err}", host_imports::CONSOLE_LOG),
            }
        },
    )?;

    Ok(())
}

fn define_snapshots(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SNAPSHOT_TAKE_KIND,
        |caller: Caller<'_, BridgeState>| -> i32 {
            caller
                .data()
                .snapshots
                .take_kind()
                .map_or(snapshot_codes::NONE, |kind| kind.code())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SNAPSHOT_TAKE_REQUEST_ID,
        |caller: Caller<'_, BridgeState>| -> u32 {
            caller
                .data()
                .snapshots
                .take_request_id()
                .unwrap_or(snapshot_codes::NO_REQUEST)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SNAPSHOT_COMPLETE_SAVE,
        |mut caller: Caller<'_, BridgeState>, request_id: u32| {
            caller.data_mut().snapshots.complete_save(request_id);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SNAPSHOT_COMPLETE_LOADED,
        |mut caller: Caller<'_, BridgeState>, request_id: u32| {
            caller.data_mut().snapshots.complete_loaded(request_id);
        },
    )?;

    // The request still gets its error event when the message itself is unreadable.
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::SNAPSHOT_COMPLETE_ERROR,
        |mut caller: Caller<'_, BridgeState>, request_id: u32, ptr: u32| {
            let message = guest::read_c_string(&mut caller, ptr)
                .unwrap_or_else(|err| format!("unreadable error message: {err}"));
            caller
                .data_mut()
                .snapshots
                .complete_error(request_id, &message);
        },
    )?;

    Ok(())
}

fn define_video(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DID_OPEN_VIDEO,
        |mut caller: Caller<'_, BridgeState>, width: u32, height: u32| {
            caller.data_mut().host.video.did_open_video(width, height);
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::BLIT,
        |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| {
            let blitted = with_guest_slice(&mut caller, ptr, len as usize, |frame, state| {
                state.host.video.blit(frame)
            });
            if let Err(err) = blitted {
                log::warn!("{}: dropped frame: {err}", host_imports::BLIT);
            }
        },
    )?;

    Ok(())
}

fn define_audio(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DID_OPEN_AUDIO,
        |mut caller: Caller<'_, BridgeState>,
         sample_rate: u32,
         sample_size_bits: u32,
         channels: u32| {
            caller.data_mut().host.audio.did_open_audio(AudioFormat {
                sample_rate,
                sample_size_bits,
                channels,
            });
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::AUDIO_BUFFER_SIZE,
        |caller: Caller<'_, BridgeState>| -> i32 {
            caller
                .data()
                .host
                .audio
                .buffer_size()
                .map_or(FAILED_I32, abi::saturate_i32)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ENQUEUE_AUDIO,
        |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| {
            let queued = with_guest_slice(&mut caller, ptr, len as usize, |samples, state| {
                state.host.audio.enqueue(samples)
            });
            if let Err(err) = queued {
                log::warn!("{}: dropped samples: {err}", host_imports::ENQUEUE_AUDIO);
            }
        },
    )?;

    Ok(())
}

/// Validate the `f64` offset/length pair the core passes to disk reads and writes.
fn disk_span(offset: f64, length: f64) -> Option<(u64, usize)> {
    let offset = f64_to_len(offset)?;
    let length = usize::try_from(f64_to_len(length)?).ok()?;
    Some((offset, length))
}

fn define_disks(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DISK_OPEN,
        |mut caller: Caller<'_, BridgeState>, name_ptr: u32| -> i32 {
            let name = match guest::read_c_string(&mut caller, name_ptr) {
                Ok(name) => name,
                Err(err) => {
                    log::warn!("{}: {err}", host_imports::DISK_OPEN);
                    return FAILED_I32;
                }
            };
            caller
                .data_mut()
                .host
                .disk
                .open(&name)
                .map_or(FAILED_I32, |id| id.0)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DISK_CLOSE,
        |mut caller: Caller<'_, BridgeState>, disk_id: i32| {
            caller.data_mut().host.disk.close(DiskId(disk_id));
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DISK_SIZE,
        |caller: Caller<'_, BridgeState>, disk_id: i32| -> f64 {
            caller
                .data()
                .host
                .disk
                .size(DiskId(disk_id))
                .map_or(FAILED_F64, |size| size as f64)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DISK_READ,
        |mut caller: Caller<'_, BridgeState>,
         disk_id: i32,
         ptr: u32,
         offset: f64,
         length: f64|
         -> f64 {
            let Some((offset, length)) = disk_span(offset, length) else {
                log::warn!("{}: invalid span {offset}+{length}", host_imports::DISK_READ);
                return FAILED_F64;
            };
            with_guest_slice(&mut caller, ptr, length, |buf, state| {
                state.host.disk.read(DiskId(disk_id), offset, buf) as f64
            })
            .unwrap_or_else(|err| {
                log::warn!("{}: {err}", host_imports::DISK_READ);
                FAILED_F64
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::DISK_WRITE,
        |mut caller: Caller<'_, BridgeState>,
         disk_id: i32,
         ptr: u32,
         offset: f64,
         length: f64|
         -> f64 {
            let Some((offset, length)) = disk_span(offset, length) else {
                log::warn!("{}: invalid span {offset}+{length}", host_imports::DISK_WRITE);
                return FAILED_F64;
            };
            with_guest_slice(&mut caller, ptr, length, |data, state| {
                state.host.disk.write(DiskId(disk_id), offset, data) as f64
            })
            .unwrap_or_else(|err| {
                log::warn!("{}: {err}", host_imports::DISK_WRITE);
                FAILED_F64
            })
        },
    )?;

    // Ownership of the returned string passes to the core, which hands it back
    // through `js_free`.
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::CONSUME_CDROM_NAME,
        |mut caller: Caller<'_, BridgeState>| -> anyhow::Result<u32> {
            let Some(name) = caller
                .data_mut()
                .host
                .disk
                .consume_cdrom_name()
                .filter(|name| !name.is_empty())
            else {
                return Ok(0);
            };

            let mut bytes = name.into_bytes();
            bytes.push(0);
            let Ok(len) = u32::try_from(bytes.len()) else {
                return Ok(0);
            };

            let ptr = guest::guest_malloc(&mut caller, len)?;
            if ptr == 0 {
                log::warn!(
                    "{}: guest allocation of {len} bytes failed",
                    host_imports::CONSUME_CDROM_NAME
                );
                return Ok(0);
            }
            if let Err(err) = guest::write_guest_bytes(&mut caller, ptr, &bytes) {
                log::warn!("{}: {err}", host_imports::CONSUME_CDROM_NAME);
                guest::guest_free(&mut caller, ptr)?;
                return Ok(0);
            }
            Ok(ptr)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::FREE,
        |mut caller: Caller<'_, BridgeState>, ptr: u32| -> anyhow::Result<()> {
            guest::guest_free(&mut caller, ptr)
        },
    )?;

    Ok(())
}

fn define_input(linker: &mut Linker<BridgeState>) -> Result<(), anyhow::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::ACQUIRE_INPUT_LOCK,
        |mut caller: Caller<'_, BridgeState>| -> i32 {
            i32::from(caller.data_mut().host.input.acquire_lock())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        host_imports::RELEASE_INPUT_LOCK,
        |mut caller: Caller<'_, BridgeState>| {
            caller.data_mut().host.input.release_lock();
        },
    )?;

    for field in InputField::ALL {
        linker.func_wrap(
            IMPORT_MODULE,
            field.import_name(),
            move |caller: Caller<'_, BridgeState>| -> i32 {
                caller.data().host.input.value(field)
            },
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_spans_reject_bad_numbers() {
        assert_eq!(disk_span(0.0, 512.0), Some((0, 512)));
        assert_eq!(disk_span(1024.0, 0.0), Some((1024, 0)));
        assert_eq!(disk_span(-1.0, 512.0), None);
        assert_eq!(disk_span(0.0, f64::NAN), None);
        assert_eq!(disk_span(f64::INFINITY, 1.0), None);
    }
}
