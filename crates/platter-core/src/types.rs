//! Common types for the platter engine
//!
//! The fundamental unit is the [`PcmBuffer`]: decoded, interleaved float
//! PCM owned by exactly one voice at a time. Buffers are immutable after
//! construction; a voice replaces its buffer wholesale on load.

/// Audio sample type (32-bit float throughout the engine)
pub type Sample = f32;

/// Hard limit on the playback rate magnitude (4x forward or backward)
pub const MAX_PLAYBACK_RATE: f32 = 4.0;

/// Rates below this magnitude are treated as "stopped" on the render path
pub const RATE_EPSILON: f32 = 1e-5;

/// A decoded, interleaved PCM buffer
///
/// `data.len() == total_frames * channels`. Channel layout is interleaved
/// `[c0, c1, .., c0, c1, ..]`. The buffer never changes after construction;
/// loads swap in a whole new buffer via the owning voice.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    data: Vec<Sample>,
    channels: usize,
    total_frames: usize,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Create a buffer from interleaved samples
    ///
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn new(mut data: Vec<Sample>, channels: usize, sample_rate: u32) -> Self {
        if channels == 0 {
            return Self::empty();
        }
        let total_frames = data.len() / channels;
        data.truncate(total_frames * channels);
        Self {
            data,
            channels,
            total_frames,
            sample_rate,
        }
    }

    /// An empty buffer; all sample fetches return silence
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            channels: 0,
            total_frames: 0,
            sample_rate: 0,
        }
    }

    /// Number of interleaved channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Native sample rate of the decoded audio
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the buffer holds no audio
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_frames == 0 || self.data.is_empty()
    }

    /// Fetch one sample at an arbitrary (possibly negative) frame index
    ///
    /// When `looping`, the index wraps modulo the frame count; otherwise it
    /// clamps to the first/last frame. Any out-of-range access resolves to
    /// silence rather than a panic; the render path must never fail.
    #[inline]
    pub fn sample_at(&self, frame: i64, channel: usize, looping: bool) -> Sample {
        if self.is_empty() {
            return 0.0;
        }
        let frames = self.total_frames as i64;
        let frame = if looping {
            frame.rem_euclid(frames)
        } else {
            frame.clamp(0, frames - 1)
        };
        let index = frame as usize * self.channels + (channel % self.channels);
        self.data.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer() -> PcmBuffer {
        // Mono: 0, 1, 2, 3
        PcmBuffer::new(vec![0.0, 1.0, 2.0, 3.0], 1, 44100)
    }

    #[test]
    fn test_fetch_clamps_when_not_looping() {
        let buf = ramp_buffer();
        assert_eq!(buf.sample_at(-5, 0, false), 0.0);
        assert_eq!(buf.sample_at(2, 0, false), 2.0);
        assert_eq!(buf.sample_at(10, 0, false), 3.0);
    }

    #[test]
    fn test_fetch_wraps_when_looping() {
        let buf = ramp_buffer();
        assert_eq!(buf.sample_at(5, 0, true), 1.0);
        assert_eq!(buf.sample_at(-1, 0, true), 3.0);
        assert_eq!(buf.sample_at(-5, 0, true), 3.0);
    }

    #[test]
    fn test_channel_wraps_into_source_channels() {
        // Stereo frames: (0.1, 0.2), (0.3, 0.4)
        let buf = PcmBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 2, 48000);
        assert_eq!(buf.sample_at(1, 0, false), 0.3);
        assert_eq!(buf.sample_at(1, 1, false), 0.4);
        // Output channel 2 of a stereo source maps back to channel 0
        assert_eq!(buf.sample_at(1, 2, false), 0.3);
    }

    #[test]
    fn test_empty_buffer_is_silent() {
        let buf = PcmBuffer::empty();
        assert_eq!(buf.sample_at(0, 0, false), 0.0);
        assert_eq!(buf.sample_at(-3, 1, true), 0.0);
    }

    #[test]
    fn test_partial_trailing_frame_dropped() {
        // 5 samples at 2 channels = 2 whole frames
        let buf = PcmBuffer::new(vec![1.0; 5], 2, 44100);
        assert_eq!(buf.total_frames(), 2);
    }

    #[test]
    fn test_zero_channels_collapses_to_empty() {
        let buf = PcmBuffer::new(vec![1.0, 2.0], 0, 44100);
        assert!(buf.is_empty());
        assert_eq!(buf.sample_at(0, 0, false), 0.0);
    }
}
