//! Capturing host services: latest video frame (written as PNG) and WAV audio.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, bail};

use super::{AudioFormat, HostAudio, HostVideo};

const BYTES_PER_PIXEL: usize = 4;

/// One RGBA8888 frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Default)]
struct CaptureState {
    width: u32,
    height: u32,
    latest: Option<Vec<u8>>,
    frames: u64,
}

/// Keeps the most recent frame the core blitted.
///
/// Clones share the same capture, so an embedder can keep one handle while the runtime
/// owns another.
#[derive(Clone, Debug, Default)]
pub struct FrameCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CaptureState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Frames presented so far.
    pub fn frames(&self) -> u64 {
        self.with_state(|s| s.frames)
    }

    pub fn latest(&self) -> Option<Frame> {
        self.with_state(|s| {
            s.latest.clone().map(|rgba| Frame {
                width: s.width,
                height: s.height,
                rgba,
            })
        })
    }

    /// Write the latest frame as PNG. Returns `false` if nothing was presented yet.
    pub fn write_png(&self, path: &Path) -> anyhow::Result<bool> {
        let Some(frame) = self.latest() else {
            return Ok(false);
        };
        let expected = frame.width as usize * frame.height as usize * BYTES_PER_PIXEL;
        if frame.width == 0 || frame.height == 0 || frame.rgba.len() != expected {
            bail!(
                "frame of {} bytes does not match {}x{} RGBA",
                frame.rgba.len(),
                frame.width,
                frame.height
            );
        }

        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&frame.rgba)?;
        writer.finish()?;
        Ok(true)
    }
}

impl HostVideo for FrameCapture {
    fn did_open_video(&mut self, width: u32, height: u32) {
        log::info!("video opened at {width}x{height}");
        self.with_state(|s| {
            s.width = width;
            s.height = height;
            s.latest = None;
        });
    }

    fn blit(&mut self, frame: &[u8]) {
        self.with_state(|s| {
            let latest = s.latest.get_or_insert_with(Vec::new);
            latest.clear();
            latest.extend_from_slice(frame);
            s.frames += 1;
        });
    }
}

type WavFileWriter = hound::WavWriter<BufWriter<File>>;

/// Writes every enqueued sample to a WAV file.
///
/// 32-bit samples are stored as float, 16-bit as signed integers; other sizes are
/// discarded. Never reports a backlog, so the core runs unthrottled.
pub struct WavAudio {
    path: PathBuf,
    writer: Option<WavFileWriter>,
    format: Option<AudioFormat>,
}

impl WavAudio {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            format: None,
        }
    }

    /// Flush and close the current file.
    pub fn finish(&mut self) -> Result<(), hound::Error> {
        match self.writer.take() {
            Some(writer) => writer.finalize(),
            None => Ok(()),
        }
    }

    fn spec_for(format: AudioFormat) -> Option<hound::WavSpec> {
        let sample_format = match format.sample_size_bits {
            32 => hound::SampleFormat::Float,
            16 => hound::SampleFormat::Int,
            _ => return None,
        };
        let channels = u16::try_from(format.channels).ok()?;
        Some(hound::WavSpec {
            channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.sample_size_bits as u16,
            sample_format,
        })
    }

    fn write_samples(writer: &mut WavFileWriter, bits: u32, bytes: &[u8]) -> hound::Result<()> {
        match bits {
            32 => {
                for chunk in bytes.chunks_exact(4) {
                    let sample = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    writer.write_sample(sample)?;
                }
            }
            16 => {
                for chunk in bytes.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl HostAudio for WavAudio {
    fn did_open_audio(&mut self, format: AudioFormat) {
        if let Err(err) = self.finish() {
            log::warn!("finalizing {} failed: {err}", self.path.display());
        }
        self.format = Some(format);

        let Some(spec) = Self::spec_for(format) else {
            log::warn!("unsupported audio format {format:?}; discarding audio");
            return;
        };
        match hound::WavWriter::create(&self.path, spec) {
            Ok(writer) => {
                log::info!(
                    "recording audio ({} Hz, {} bit, {} ch) to {}",
                    format.sample_rate,
                    format.sample_size_bits,
                    format.channels,
                    self.path.display()
                );
                self.writer = Some(writer);
            }
            Err(err) => log::warn!("cannot create {}: {err}", self.path.display()),
        }
    }

    fn buffer_size(&self) -> Option<usize> {
        Some(0)
    }

    fn enqueue(&mut self, samples: &[u8]) {
        let (Some(writer), Some(format)) = (self.writer.as_mut(), self.format) else {
            return;
        };
        if let Err(err) = Self::write_samples(writer, format.sample_size_bits, samples) {
            log::warn!("audio capture stopped: {err}");
            self.writer = None;
        }
    }
}

impl Drop for WavAudio {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            log::warn!("finalizing {} failed: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_keeps_latest_frame() {
        let mut capture = FrameCapture::new();
        let handle = capture.clone();
        capture.did_open_video(1, 1);
        capture.blit(&[1, 2, 3, 4]);
        capture.blit(&[5, 6, 7, 8]);

        assert_eq!(handle.frames(), 2);
        assert_eq!(
            handle.latest(),
            Some(Frame {
                width: 1,
                height: 1,
                rgba: vec![5, 6, 7, 8],
            })
        );
    }

    #[test]
    fn png_is_written_for_valid_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("shot.png");
        let mut capture = FrameCapture::new();

        assert!(!capture.write_png(&path).unwrap());

        capture.did_open_video(2, 1);
        capture.blit(&[255, 0, 0, 255, 0, 255, 0, 255]);
        assert!(capture.write_png(&path).unwrap());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_rejects_mismatched_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let mut capture = FrameCapture::new();
        capture.did_open_video(4, 4);
        capture.blit(&[0; 3]);

        assert!(capture.write_png(&tmp.path().join("bad.png")).is_err());
    }

    #[test]
    fn wav_capture_records_float_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.wav");
        let mut audio = WavAudio::new(&path);
        audio.did_open_audio(AudioFormat {
            sample_rate: 22_050,
            sample_size_bits: 32,
            channels: 2,
        });

        let samples: Vec<u8> = [0.5f32, -0.5, 0.25, -0.25]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        audio.enqueue(&samples);
        audio.finish().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().channels, 2);
        let decoded: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(decoded, vec![0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn unsupported_format_discards_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.wav");
        let mut audio = WavAudio::new(&path);
        audio.did_open_audio(AudioFormat {
            sample_rate: 8_000,
            sample_size_bits: 8,
            channels: 1,
        });
        audio.enqueue(&[1, 2, 3]);

        assert!(!path.exists());
    }
}
