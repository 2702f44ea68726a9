//! Guest linear memory helpers used by the import shims.
//!
//! Pointers coming from the core are 32-bit offsets into its exported `memory`. Every
//! access is bounds-checked here; callers decide which sentinel a failure maps to.
//!
//! Cores built with threads export a shared memory instead. Those are served through a
//! copy: bytes are read out, handed to the shim, and written back.

use std::cell::UnsafeCell;
use std::ops::Range;

use wasmtime::{Caller, Extern, Memory, SharedMemory};

use crate::abi::guest_exports;
use crate::state::BridgeState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestMemoryError {
    MissingMemory,
    OutOfBounds { ptr: u32, len: usize },
    MissingExport(&'static str),
}

impl core::fmt::Display for GuestMemoryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GuestMemoryError::MissingMemory => write!(f, "missing WASM guest memory"),
            GuestMemoryError::OutOfBounds { ptr, len } => {
                write!(f, "guest range {ptr:#x}+{len} is out of bounds")
            }
            GuestMemoryError::MissingExport(name) => write!(f, "guest does not export `{name}`"),
        }
    }
}

impl std::error::Error for GuestMemoryError {}

enum GuestMemory {
    Plain(Memory),
    Shared(SharedMemory),
}

fn memory(caller: &mut Caller<'_, BridgeState>) -> Result<GuestMemory, GuestMemoryError> {
    match caller.get_export(guest_exports::MEMORY) {
        Some(Extern::Memory(memory)) => Ok(GuestMemory::Plain(memory)),
        Some(Extern::SharedMemory(memory)) => Ok(GuestMemory::Shared(memory)),
        _ => Err(GuestMemoryError::MissingMemory),
    }
}

// SAFETY (both helpers): the core is suspended inside a host call and the host never
// spawns guest threads, so nothing else touches these cells while they are copied.
fn copy_out(cells: &[UnsafeCell<u8>]) -> Vec<u8> {
    cells.iter().map(|cell| unsafe { *cell.get() }).collect()
}

fn copy_in(cells: &[UnsafeCell<u8>], bytes: &[u8]) {
    for (cell, byte) in cells.iter().zip(bytes) {
        unsafe { *cell.get() = *byte };
    }
}

/// Byte range `[ptr, ptr + len)` inside a memory of `mem_len` bytes.
pub(crate) fn guest_range(
    mem_len: usize,
    ptr: u32,
    len: usize,
) -> Result<Range<usize>, GuestMemoryError> {
    let start = ptr as usize;
    start
        .checked_add(len)
        .filter(|end| *end <= mem_len)
        .map(|end| start..end)
        .ok_or(GuestMemoryError::OutOfBounds { ptr, len })
}

/// Decode the NUL-terminated string at `ptr`, reading at most `max_len` bytes.
///
/// A null pointer reads as the empty string. Invalid UTF-8 is replaced, and a string
/// with no terminator within `max_len` bytes (or before the end of memory) is cut off.
pub(crate) fn c_str_at(mem: &[u8], ptr: u32, max_len: usize) -> Result<String, GuestMemoryError> {
    Ok(c_str_window(mem.len(), ptr, max_len)?
        .map(|range| decode_c_str(&mem[range]))
        .unwrap_or_default())
}

/// Bytes that may hold the string at `ptr`; `None` for the null pointer.
fn c_str_window(
    mem_len: usize,
    ptr: u32,
    max_len: usize,
) -> Result<Option<Range<usize>>, GuestMemoryError> {
    if ptr == 0 {
        return Ok(None);
    }
    let start = ptr as usize;
    if start >= mem_len {
        return Err(GuestMemoryError::OutOfBounds { ptr, len: 1 });
    }
    Ok(Some(start..mem_len.min(start.saturating_add(max_len))))
}

fn decode_c_str(window: &[u8]) -> String {
    let end = window.iter().position(|b| *b == 0).unwrap_or(window.len());
    String::from_utf8_lossy(&window[..end]).into_owned()
}

/// Run `f` over `len` bytes of guest memory at `ptr` together with the host state.
///
/// A plain memory is borrowed in place. A shared memory is copied out and the
/// (possibly modified) bytes are copied back once `f` returns.
pub fn with_guest_slice<R>(
    caller: &mut Caller<'_, BridgeState>,
    ptr: u32,
    len: usize,
    f: impl FnOnce(&mut [u8], &mut BridgeState) -> R,
) -> Result<R, GuestMemoryError> {
    match memory(caller)? {
        GuestMemory::Plain(memory) => {
            let (data, state) = memory.data_and_store_mut(caller);
            let range = guest_range(data.len(), ptr, len)?;
            Ok(f(&mut data[range], state))
        }
        GuestMemory::Shared(memory) => {
            let cells = memory.data();
            let cells = &cells[guest_range(cells.len(), ptr, len)?];
            let mut bytes = copy_out(cells);
            let result = f(&mut bytes, caller.data_mut());
            copy_in(cells, &bytes);
            Ok(result)
        }
    }
}

pub fn read_c_string(
    caller: &mut Caller<'_, BridgeState>,
    ptr: u32,
) -> Result<String, GuestMemoryError> {
    let max_len = caller.data().max_guest_string_len;
    match memory(caller)? {
        GuestMemory::Plain(memory) => c_str_at(memory.data(&*caller), ptr, max_len),
        GuestMemory::Shared(memory) => {
            let cells = memory.data();
            Ok(c_str_window(cells.len(), ptr, max_len)?
                .map(|range| decode_c_str(&copy_out(&cells[range])))
                .unwrap_or_default())
        }
    }
}

pub fn write_guest_bytes(
    caller: &mut Caller<'_, BridgeState>,
    ptr: u32,
    bytes: &[u8],
) -> Result<(), GuestMemoryError> {
    with_guest_slice(caller, ptr, bytes.len(), |dst, _| dst.copy_from_slice(bytes))
}

/// Allocate `len` bytes with the core's `malloc`. `Ok(0)` means the allocator is out
/// of memory; a trap inside the allocator is returned as the error.
pub fn guest_malloc(caller: &mut Caller<'_, BridgeState>, len: u32) -> anyhow::Result<u32> {
    let malloc = caller
        .get_export(guest_exports::MALLOC)
        .and_then(Extern::into_func)
        .ok_or(GuestMemoryError::MissingExport(guest_exports::MALLOC))?
        .typed::<u32, u32>(&*caller)?;
    malloc.call(&mut *caller, len)
}

/// Release memory handed out by [`guest_malloc`]. Null is a no-op.
pub fn guest_free(caller: &mut Caller<'_, BridgeState>, ptr: u32) -> anyhow::Result<()> {
    if ptr == 0 {
        return Ok(());
    }
    let free = caller
        .get_export(guest_exports::FREE)
        .and_then(Extern::into_func)
        .ok_or(GuestMemoryError::MissingExport(guest_exports::FREE))?
        .typed::<u32, ()>(&*caller)?;
    free.call(&mut *caller, ptr)
}
