//! Inert host services.

use std::time::Duration;

use super::{
    AudioFormat, DiskId, HostAudio, HostDisk, HostInput, HostRuntime, HostVideo, InputField,
    Shutdown, SnapshotNotifier,
};
use crate::snapshot::SnapshotEvent;

pub struct NullVideo;

impl HostVideo for NullVideo {
    fn did_open_video(&mut self, _width: u32, _height: u32) {}

    fn blit(&mut self, _frame: &[u8]) {}
}

/// Discards audio and never reports a backlog, so the core never waits.
pub struct NullAudio;

impl HostAudio for NullAudio {
    fn did_open_audio(&mut self, _format: AudioFormat) {}

    fn buffer_size(&self) -> Option<usize> {
        None
    }

    fn enqueue(&mut self, _samples: &[u8]) {}
}

pub struct NoDisks;

impl HostDisk for NoDisks {
    fn open(&mut self, _name: &str) -> Option<DiskId> {
        None
    }

    fn close(&mut self, _id: DiskId) {}

    fn size(&self, _id: DiskId) -> Option<u64> {
        None
    }

    fn read(&mut self, _id: DiskId, _offset: u64, _buf: &mut [u8]) -> usize {
        0
    }

    fn write(&mut self, _id: DiskId, _offset: u64, _data: &[u8]) -> usize {
        0
    }

    fn consume_cdrom_name(&mut self) -> Option<String> {
        None
    }
}

/// Never grants the input lock.
pub struct NoInput;

impl HostInput for NoInput {
    fn acquire_lock(&mut self) -> bool {
        false
    }

    fn release_lock(&mut self) {}

    fn value(&self, field: InputField) -> i32 {
        match field {
            InputField::MouseButtonState => -1,
            _ => 0,
        }
    }
}

/// Returns immediately from sleeps and forwards guest logs to `log`.
pub struct NullRuntime;

impl HostRuntime for NullRuntime {
    fn sleep(&mut self, _duration: Duration) {}

    fn check_for_periodic_tasks(&mut self) -> Result<(), Shutdown> {
        Ok(())
    }

    fn log(&mut self, message: &str) {
        log::info!(target: "guest", "{message}");
    }
}

/// Logs snapshot outcomes and drops the payloads.
pub struct LogNotifier;

impl SnapshotNotifier for LogNotifier {
    fn notify(&mut self, event: SnapshotEvent) {
        match event {
            SnapshotEvent::Saved { request_id, data } => {
                log::info!("snapshot {request_id} saved ({} bytes)", data.len());
            }
            SnapshotEvent::Loaded { request_id } => {
                log::info!("snapshot {request_id} loaded");
            }
            SnapshotEvent::Error {
                request_id,
                message,
            } => {
                log::warn!("snapshot {request_id} failed: {message}");
            }
        }
    }
}
