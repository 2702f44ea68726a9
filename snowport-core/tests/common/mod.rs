//! Shared harness for the import tests: a runtime wired to recording host doubles and
//! a throwaway staging directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use snowport_core::host::{
    AudioFormat, DiskId, HostAudio, HostDisk, HostRuntime, HostVideo, Shutdown,
};
use snowport_core::{
    BridgeConfig, BridgeRuntime, HostServices, RunOutcome, SnapshotBridge, SnapshotEvent,
    SnapshotRequester, SnapshotStaging,
};

#[derive(Debug, Default)]
pub struct Calls {
    pub video_opens: Vec<(u32, u32)>,
    pub frames: Vec<Vec<u8>>,
    pub audio_formats: Vec<AudioFormat>,
    pub samples: Vec<u8>,
    pub buffered: Option<usize>,
    pub sleeps: Vec<Duration>,
    pub checks: u32,
    pub logs: Vec<String>,
    pub disk_names: Vec<String>,
}

/// Video, audio, disk and runtime double that remembers every call.
///
/// As a disk it serves a single image, [`RECORDED_DISK`], with id 1.
#[derive(Clone, Debug, Default)]
pub struct Recorder(Arc<Mutex<Calls>>);

impl Recorder {
    pub fn with_buffered(bytes: usize) -> Self {
        let recorder = Self::default();
        recorder.calls().buffered = Some(bytes);
        recorder
    }

    pub fn calls(&self) -> MutexGuard<'_, Calls> {
        self.0.lock().unwrap()
    }
}

impl HostVideo for Recorder {
    fn did_open_video(&mut self, width: u32, height: u32) {
        self.calls().video_opens.push((width, height));
    }

    fn blit(&mut self, frame: &[u8]) {
        self.calls().frames.push(frame.to_vec());
    }
}

impl HostAudio for Recorder {
    fn did_open_audio(&mut self, format: AudioFormat) {
        self.calls().audio_formats.push(format);
    }

    fn buffer_size(&self) -> Option<usize> {
        self.calls().buffered
    }

    fn enqueue(&mut self, samples: &[u8]) {
        self.calls().samples.extend_from_slice(samples);
    }
}

impl HostRuntime for Recorder {
    fn sleep(&mut self, duration: Duration) {
        self.calls().sleeps.push(duration);
    }

    fn check_for_periodic_tasks(&mut self) -> Result<(), Shutdown> {
        self.calls().checks += 1;
        Ok(())
    }

    fn log(&mut self, message: &str) {
        self.calls().logs.push(message.to_owned());
    }
}

pub const RECORDED_DISK: &str = "hd.img";
pub const RECORDED_DISK_BYTES: &[u8] = b"0123456789";

impl HostDisk for Recorder {
    fn open(&mut self, name: &str) -> Option<DiskId> {
        self.calls().disk_names.push(name.to_owned());
        (name == RECORDED_DISK).then_some(DiskId(1))
    }

    fn close(&mut self, _id: DiskId) {}

    fn size(&self, id: DiskId) -> Option<u64> {
        (id == DiskId(1)).then_some(RECORDED_DISK_BYTES.len() as u64)
    }

    fn read(&mut self, id: DiskId, offset: u64, buf: &mut [u8]) -> usize {
        if id != DiskId(1) {
            return 0;
        }
        let start = (offset as usize).min(RECORDED_DISK_BYTES.len());
        let src = &RECORDED_DISK_BYTES[start..];
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        n
    }

    fn write(&mut self, _id: DiskId, _offset: u64, _data: &[u8]) -> usize {
        0
    }

    fn consume_cdrom_name(&mut self) -> Option<String> {
        None
    }
}

pub struct Harness {
    pub runtime: BridgeRuntime,
    pub events: mpsc::Receiver<SnapshotEvent>,
    pub recorder: Recorder,
    pub staging: SnapshotStaging,
    _tmp: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_host(|host| host)
    }

    /// Recorder-backed services, adjusted by `customize` before the runtime is built.
    pub fn with_host(customize: impl FnOnce(HostServices) -> HostServices) -> Self {
        Self::build(Recorder::default(), customize)
    }

    pub fn build(
        recorder: Recorder,
        customize: impl FnOnce(HostServices) -> HostServices,
    ) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            staging_dir: tmp.path().join("staging"),
            inherit_stdio: false,
            ..BridgeConfig::default()
        };
        let host = customize(
            HostServices::detached()
                .with_video(recorder.clone())
                .with_audio(recorder.clone())
                .with_disk(recorder.clone())
                .with_runtime(recorder.clone()),
        );

        let (tx, events) = mpsc::channel();
        let staging = SnapshotStaging::new(&config.staging_dir);
        let snapshots = SnapshotBridge::new(staging.clone(), tx);
        let runtime = BridgeRuntime::new(&config, host, snapshots).unwrap();

        Self {
            runtime,
            events,
            recorder,
            staging,
            _tmp: tmp,
        }
    }

    pub fn requester(&self) -> SnapshotRequester {
        self.runtime.requester()
    }

    pub fn try_run(&mut self, wat: &str) -> anyhow::Result<RunOutcome> {
        let module = self.runtime.compile(wat.as_bytes())?;
        let instance = self.runtime.instantiate(&module)?;
        self.runtime.run(&instance)
    }

    pub fn run(&mut self, wat: &str) -> RunOutcome {
        self.try_run(wat).unwrap()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.recorder.calls().frames.clone()
    }

    /// Every snapshot event delivered so far.
    pub fn drain_events(&self) -> Vec<SnapshotEvent> {
        self.events.try_iter().collect()
    }

    pub fn staged(&self, name: &str) -> PathBuf {
        self.staging.dir().join(name)
    }
}

/// Little-endian `i32` words, as the test guests store their results.
pub fn words(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
