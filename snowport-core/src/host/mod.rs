//! Host capabilities reachable from the core.
//!
//! Each `js_*` import forwards to one of these traits. They are deliberately narrow: the
//! binding layer owns no policy, it only translates arguments between the core's native
//! calling convention and these typed calls.
//!
//! Concrete implementations:
//! - [`null`]: inert services for embedders that do not care about a device.
//! - [`capture`]: latest-frame capture (PNG) and WAV audio capture.
//! - [`disk`]: disk images served from a directory.
//! - [`input`]: atomics-backed shared input buffer.
//! - [`system`]: thread sleep, guest logging, run deadline and scheduled snapshots.

use std::fmt;
use std::time::Duration;

pub use crate::abi::InputField;
use crate::snapshot::SnapshotEvent;

pub mod capture;
pub mod disk;
pub mod input;
pub mod null;
pub mod system;

/// Handle of a disk opened through [`HostDisk::open`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DiskId(pub i32);

/// Audio stream format announced by the core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample (32 means interleaved `f32`, 16 means interleaved `i16`).
    pub sample_size_bits: u32,
    pub channels: u32,
}

impl AudioFormat {
    pub const fn bytes_per_sample(&self) -> usize {
        (self.sample_size_bits / 8) as usize
    }
}

pub trait HostVideo: Send {
    /// The core (re)configured its framebuffer.
    fn did_open_video(&mut self, width: u32, height: u32);

    /// Present one frame. The slice borrows guest memory and is only valid for this call.
    fn blit(&mut self, frame: &[u8]);
}

pub trait HostAudio: Send {
    fn did_open_audio(&mut self, format: AudioFormat);

    /// Bytes queued on the host and not yet played, or `None` when unknown.
    fn buffer_size(&self) -> Option<usize>;

    fn enqueue(&mut self, samples: &[u8]);
}

pub trait HostDisk: Send {
    fn open(&mut self, name: &str) -> Option<DiskId>;

    fn close(&mut self, id: DiskId);

    fn size(&self, id: DiskId) -> Option<u64>;

    /// Fill `buf` from `offset`; returns the number of bytes read.
    fn read(&mut self, id: DiskId, offset: u64, buf: &mut [u8]) -> usize;

    /// Write `data` at `offset`; returns the number of bytes written.
    fn write(&mut self, id: DiskId, offset: u64, data: &[u8]) -> usize;

    /// Next CD-ROM image the user asked to insert, if any.
    fn consume_cdrom_name(&mut self) -> Option<String>;
}

pub trait HostInput: Send {
    /// Try to take the input lock. The core reads fields only while holding it.
    fn acquire_lock(&mut self) -> bool;

    fn release_lock(&mut self);

    fn value(&self, field: InputField) -> i32;
}

pub trait HostRuntime: Send {
    fn sleep(&mut self, duration: Duration);

    /// Called by the core at its safe points. Returning `Err` stops the core.
    fn check_for_periodic_tasks(&mut self) -> Result<(), Shutdown>;

    /// A log line emitted by the core.
    fn log(&mut self, message: &str);
}

/// Out-of-band channel back to whoever requested a snapshot.
pub trait SnapshotNotifier: Send {
    fn notify(&mut self, event: SnapshotEvent);
}

/// Raised by [`HostRuntime::check_for_periodic_tasks`] to stop the core.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Shutdown {
    pub reason: String,
}

impl Shutdown {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host requested shutdown: {}", self.reason)
    }
}

impl std::error::Error for Shutdown {}

/// The full set of host capabilities injected into the runtime.
pub struct HostServices {
    pub video: Box<dyn HostVideo>,
    pub audio: Box<dyn HostAudio>,
    pub disk: Box<dyn HostDisk>,
    pub input: Box<dyn HostInput>,
    pub runtime: Box<dyn HostRuntime>,
}

impl HostServices {
    /// Services that accept every call and produce nothing.
    pub fn detached() -> Self {
        Self {
            video: Box::new(null::NullVideo),
            audio: Box::new(null::NullAudio),
            disk: Box::new(null::NoDisks),
            input: Box::new(null::NoInput),
            runtime: Box::new(null::NullRuntime),
        }
    }

    pub fn with_video(mut self, video: impl HostVideo + 'static) -> Self {
        self.video = Box::new(video);
        self
    }

    pub fn with_audio(mut self, audio: impl HostAudio + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    pub fn with_disk(mut self, disk: impl HostDisk + 'static) -> Self {
        self.disk = Box::new(disk);
        self
    }

    pub fn with_input(mut self, input: impl HostInput + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn with_runtime(mut self, runtime: impl HostRuntime + 'static) -> Self {
        self.runtime = Box::new(runtime);
        self
    }
}
