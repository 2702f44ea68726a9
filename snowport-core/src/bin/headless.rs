//! Run an emulator core without a window.
//!
//! Disk images come from a directory, the last frame can be saved as PNG and audio can
//! be captured to WAV. Snapshots can be loaded before start and saved after a delay.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info, warn};

use snowport_core::host::capture::{FrameCapture, WavAudio};
use snowport_core::host::disk::DirectoryDisks;
use snowport_core::host::input::SharedInput;
use snowport_core::host::null::NullAudio;
use snowport_core::host::system::SystemRuntime;
use snowport_core::host::SnapshotNotifier;
use snowport_core::{
    BridgeConfig, BridgeRuntime, HostServices, RunOutcome, SnapshotBridge, SnapshotEvent,
    SnapshotStaging,
};

const LOAD_REQUEST_ID: u32 = 1;
const SAVE_REQUEST_ID: u32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "snowport-headless",
    version,
    about = "Run a WebAssembly emulator core with headless host services",
    arg_required_else_help = true
)]
struct Cli {
    /// Core module (.wasm or .wat)
    core: PathBuf,

    /// Directory the core opens disk images from
    #[arg(long, default_value = ".")]
    disk_dir: PathBuf,

    /// CD-ROM image name to offer the core (repeatable, consumed in order)
    #[arg(long = "cdrom", value_name = "NAME")]
    cdroms: Vec<String>,

    /// Host directory for snapshot staging files
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Stop the core after this many seconds
    #[arg(long)]
    seconds: Option<f64>,

    /// Write the last presented frame here as PNG
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Record audio to this WAV file
    #[arg(long)]
    audio_out: Option<PathBuf>,

    /// Request a snapshot save after this many seconds
    #[arg(long, requires = "snapshot_out")]
    save_snapshot_after: Option<f64>,

    /// Where a saved snapshot is written
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Snapshot to load before the core starts
    #[arg(long)]
    load_snapshot: Option<PathBuf>,

    /// Initial emulation speed code (-2 accurate, -1 uncapped, 7 dynamic, 9 video)
    #[arg(long, allow_hyphen_values = true)]
    speed: Option<i32>,

    /// Arguments passed to the core
    #[arg(last = true)]
    core_args: Vec<String>,
}

/// Writes saved snapshots to `--snapshot-out` and logs everything else.
struct SnapshotFiles {
    out: Option<PathBuf>,
}

impl SnapshotNotifier for SnapshotFiles {
    fn notify(&mut self, event: SnapshotEvent) {
        match event {
            SnapshotEvent::Saved { request_id, data } => match &self.out {
                Some(path) => match fs::write(path, &data) {
                    Ok(()) => info!(
                        "snapshot {request_id} written to {} ({} bytes)",
                        path.display(),
                        data.len()
                    ),
                    Err(err) => error!("writing snapshot to {}: {err}", path.display()),
                },
                None => info!("snapshot {request_id} saved ({} bytes)", data.len()),
            },
            SnapshotEvent::Loaded { request_id } => info!("snapshot {request_id} loaded"),
            SnapshotEvent::Error {
                request_id,
                message,
            } => error!("snapshot {request_id} failed: {message}"),
        }
    }
}

fn seconds(flag: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("--{flag} {value}"))
}

fn init_logger() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=snowport_core=debug,guest=info
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = BridgeConfig::from_env().with_guest_args(cli.core_args);
    if let Some(dir) = cli.staging_dir {
        config.staging_dir = dir;
    }

    let snapshots = SnapshotBridge::new(
        SnapshotStaging::new(&config.staging_dir),
        SnapshotFiles {
            out: cli.snapshot_out,
        },
    );

    let mut system = SystemRuntime::new();
    if let Some(limit) = cli.seconds {
        system = system.with_deadline(seconds("seconds", limit)?);
    }
    if let Some(after) = cli.save_snapshot_after {
        system = system.schedule_save(
            snapshots.requester(),
            seconds("save-snapshot-after", after)?,
            SAVE_REQUEST_ID,
        );
    }

    let mut disks = DirectoryDisks::new(&cli.disk_dir);
    for name in cli.cdroms {
        disks.insert_cdrom(name);
    }

    let input = SharedInput::new();
    if let Some(code) = cli.speed {
        input.writer().speed(code);
    }

    let capture = FrameCapture::new();
    let mut host = HostServices::detached()
        .with_video(capture.clone())
        .with_disk(disks)
        .with_input(input)
        .with_runtime(system);
    host = match cli.audio_out {
        Some(path) => host.with_audio(WavAudio::new(path)),
        None => host.with_audio(NullAudio),
    };

    let mut runtime = BridgeRuntime::new(&config, host, snapshots)?;

    let bytes =
        fs::read(&cli.core).with_context(|| format!("reading core {}", cli.core.display()))?;
    let module = runtime
        .compile(&bytes)
        .with_context(|| format!("loading core {}", cli.core.display()))?;
    let instance = runtime.instantiate(&module)?;

    if let Some(path) = &cli.load_snapshot {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        runtime.requester().request_load(LOAD_REQUEST_ID, &data)?;
        info!("queued snapshot {} for loading", path.display());
    }

    info!("running {}", cli.core.display());
    let outcome = runtime.run(&instance)?;
    let pending = runtime.state().snapshots.mailbox().len();
    if pending > 0 {
        warn!("{pending} snapshot request(s) were never picked up by the core");
    }
    // Dropping the state finalizes the WAV file.
    drop(runtime.into_state());

    if let Some(path) = &cli.screenshot {
        if capture.write_png(path)? {
            info!("screenshot written to {}", path.display());
        } else {
            warn!("no frame was presented; {} not written", path.display());
        }
    }

    match outcome {
        RunOutcome::Returned => Ok(0),
        RunOutcome::Exited(code) => {
            info!("core exited with status {code}");
            Ok(code)
        }
        RunOutcome::Shutdown(reason) => {
            info!("{reason}");
            Ok(0)
        }
    }
}

fn main() {
    init_logger();

    match run(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:?}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_accepts_core_args_after_separator() {
        let cli = Cli::try_parse_from([
            "snowport-headless",
            "core.wasm",
            "--cdrom",
            "a.iso",
            "--cdrom",
            "b.iso",
            "--speed",
            "-2",
            "--",
            "--bootrom",
            "mac.rom",
        ])
        .unwrap();
        assert_eq!(cli.cdroms, vec!["a.iso", "b.iso"]);
        assert_eq!(cli.speed, Some(-2));
        assert_eq!(cli.core_args, vec!["--bootrom", "mac.rom"]);
    }

    #[test]
    fn save_after_requires_an_output() {
        let parsed = Cli::try_parse_from([
            "snowport-headless",
            "core.wasm",
            "--save-snapshot-after",
            "5",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn negative_durations_are_rejected() {
        assert!(seconds("seconds", -1.0).is_err());
        assert_eq!(seconds("seconds", 1.5).unwrap(), Duration::from_millis(1500));
    }
}
