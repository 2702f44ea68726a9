//! Audio back-pressure.
//!
//! The core produces audio faster than real time when it runs uncapped, so before each
//! enqueue it checks how much the host still has buffered and sleeps while the backlog
//! would exceed the limit. Sleeps are a fraction of the estimated drain time and never
//! longer than one 128-frame playback quantum, which keeps the core responsive.

use std::time::Duration;

pub const SAMPLE_RATE: u32 = 22_050;
pub const SAMPLE_SIZE_BITS: u32 = 32;
pub const CHANNELS: u32 = 2;

pub const BYTES_PER_SAMPLE: usize = (SAMPLE_SIZE_BITS / 8) as usize;
pub const BYTES_PER_SECOND: usize = SAMPLE_RATE as usize * CHANNELS as usize * BYTES_PER_SAMPLE;

pub const QUANTUM_FRAMES: u32 = 128;
pub const QUANTUM_SECONDS: f64 = QUANTUM_FRAMES as f64 / SAMPLE_RATE as f64;

/// Four queued buffers of 2048 samples.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 4 * 2048 * BYTES_PER_SAMPLE;

/// Share of the estimated drain time actually slept, leaving headroom for jitter.
const DRAIN_FRACTION: f64 = 0.75;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioPacing {
    max_buffered_bytes: usize,
}

impl Default for AudioPacing {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED_BYTES)
    }
}

impl AudioPacing {
    pub const fn new(max_buffered_bytes: usize) -> Self {
        Self { max_buffered_bytes }
    }

    pub const fn max_buffered_bytes(&self) -> usize {
        self.max_buffered_bytes
    }

    /// How long to sleep before enqueueing `next_len` more bytes, given the host's
    /// current backlog. `None` means go ahead; an unknown backlog never waits.
    pub fn wait_before_enqueue(
        &self,
        buffered: Option<usize>,
        next_len: usize,
    ) -> Option<Duration> {
        let buffered = buffered?;
        let max_fill = self.max_buffered_bytes.saturating_sub(next_len);
        if buffered <= max_fill {
            return None;
        }
        let excess = (buffered - max_fill) as f64;
        let seconds = (excess / BYTES_PER_SECOND as f64 * DRAIN_FRACTION).min(QUANTUM_SECONDS);
        Some(Duration::from_secs_f64(seconds))
    }
}
