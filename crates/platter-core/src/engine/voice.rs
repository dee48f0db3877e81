//! Playback voice: one sample's buffer, cursor, and loop policy
//!
//! A voice owns its decoded [`PcmBuffer`] plus every piece of playback
//! state the audio thread reads. All scalar state is atomic so commands
//! may poke it from the control thread mid-render; the buffer itself is
//! handed over through an `ArcSwap` so a load never races a render.
//!
//! Rendering is band-limited variable-rate interpolation: for each output
//! frame, the fractional cursor selects a kernel row and the voice
//! convolves the surrounding source frames with it. The cursor advances
//! by the playback rate, which may be negative (backspin) or change on
//! every frame (scratching).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use arc_swap::ArcSwap;

use crate::kernel::KernelTable;
use crate::types::{PcmBuffer, Sample, RATE_EPSILON};

use super::rate::SharedRateState;

/// Where a voice takes its playback rate from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RateSource {
    /// Normal playback at 1.0 (intro, fresh sample, music track)
    FixedUnity = 0,
    /// Follow the engine-wide target rate (scratching / coasting)
    Shared = 1,
}

impl RateSource {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RateSource::Shared,
            _ => RateSource::FixedUnity,
        }
    }
}

/// A single playable voice (platter or music)
///
/// Created once at engine init and reused across loads; `load()` resets
/// the playback fields and swaps in the freshly decoded buffer.
pub struct PlaybackVoice {
    /// Decoded PCM, swapped wholesale on load (lock-free reads)
    buffer: ArcSwap<PcmBuffer>,
    /// Continuous frame cursor, f64 bits. Carries sub-frame phase across
    /// callbacks; only meaningful modulo total_frames while looping.
    position: AtomicU64,
    is_playing: AtomicBool,
    loop_enabled: AtomicBool,
    /// "Intro" policy: play forward once, then loop (typically faded out)
    play_once_then_loop: AtomicBool,
    has_played_once: AtomicBool,
    rate_source: AtomicU8,
    /// Resolved asset path, for diagnostics only (never read while rendering)
    file_path: Mutex<String>,
}

impl PlaybackVoice {
    pub fn new() -> Self {
        Self {
            buffer: ArcSwap::from_pointee(PcmBuffer::empty()),
            position: AtomicU64::new(0.0f64.to_bits()),
            is_playing: AtomicBool::new(false),
            loop_enabled: AtomicBool::new(false),
            play_once_then_loop: AtomicBool::new(false),
            has_played_once: AtomicBool::new(false),
            rate_source: AtomicU8::new(RateSource::FixedUnity as u8),
            file_path: Mutex::new(String::new()),
        }
    }

    /// Swap in a new buffer and reset all playback state
    ///
    /// Safe to call while the audio thread renders this voice: the old
    /// buffer stays alive until the in-flight render drops its guard.
    pub fn load(&self, buffer: PcmBuffer, path: String) {
        self.set_playing(false);
        self.set_position(0.0);
        self.set_rate_source(RateSource::FixedUnity);
        self.set_loop_enabled(false);
        self.set_play_once_then_loop(false);
        self.has_played_once.store(false, Ordering::Relaxed);
        log::info!(
            "Voice loaded '{}' ({} frames, {} ch, {} Hz)",
            path,
            buffer.total_frames(),
            buffer.channels(),
            buffer.sample_rate()
        );
        self.buffer.store(Arc::new(buffer));
        *self.file_path.lock().unwrap() = path;
    }

    /// Drop the audio and leave the voice silent
    pub fn clear(&self, path: String) {
        self.set_playing(false);
        self.buffer.store(Arc::new(PcmBuffer::empty()));
        *self.file_path.lock().unwrap() = path;
    }

    /// Current buffer (lock-free; guard keeps it alive through a render)
    #[inline]
    pub fn buffer(&self) -> arc_swap::Guard<Arc<PcmBuffer>> {
        self.buffer.load()
    }

    /// Resolved path of the loaded asset
    pub fn file_path(&self) -> String {
        self.file_path.lock().unwrap().clone()
    }

    #[inline]
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_position(&self, pos: f64) {
        self.position.store(pos.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    #[inline]
    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_loop_enabled(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn play_once_then_loop(&self) -> bool {
        self.play_once_then_loop.load(Ordering::Relaxed)
    }

    pub fn set_play_once_then_loop(&self, enabled: bool) {
        self.play_once_then_loop.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn has_played_once(&self) -> bool {
        self.has_played_once.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rate_source(&self) -> RateSource {
        RateSource::from_u8(self.rate_source.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_rate_source(&self, source: RateSource) {
        self.rate_source.store(source as u8, Ordering::Relaxed);
    }

    /// Bring the cursor back into `[0, total_frames)` or stop the voice
    ///
    /// Returns `false` when playback must stop (cursor ran off a
    /// non-looping buffer). The play-once transition fires here, exactly
    /// once: the first boundary crossing of an intro rewinds to 0 and
    /// turns looping on.
    fn normalize_position(&self, position: &mut f64, total_frames: usize) -> bool {
        let frames = total_frames as f64;
        if *position >= 0.0 && *position < frames {
            return true;
        }

        if self.play_once_then_loop() && !self.has_played_once() {
            self.has_played_once.store(true, Ordering::Relaxed);
            *position = 0.0;
            if !self.loop_enabled() {
                self.set_loop_enabled(true);
            }
            true
        } else if self.loop_enabled() {
            if total_frames > 0 {
                *position = position.rem_euclid(frames);
            } else {
                *position = 0.0;
            }
            true
        } else {
            self.set_playing(false);
            false
        }
    }

    /// Render `num_frames` interpolated frames additively into `out`
    ///
    /// `out` holds `num_frames * out_channels` interleaved samples and is
    /// NOT cleared here; the engine pre-zeroes it and voices sum on top.
    /// The cursor advances by the playback rate per output frame. On an
    /// early stop the remaining frames keep whatever the buffer held.
    ///
    /// Runs on the audio thread: no allocation, no locks, no panics.
    pub fn render(
        &self,
        out: &mut [Sample],
        num_frames: usize,
        out_channels: usize,
        volume: f32,
        shared: &SharedRateState,
        kernel: &KernelTable,
    ) {
        if !self.is_playing() || out_channels == 0 {
            return;
        }
        let buffer = self.buffer.load();
        if buffer.is_empty() {
            return;
        }
        let total_frames = buffer.total_frames();

        let follows_shared = self.rate_source() == RateSource::Shared;
        if follows_shared && shared.target_rate().abs() < RATE_EPSILON {
            // Vinyl is pinned: nothing audible, cursor untouched
            return;
        }

        let tap_count = kernel.tap_count();
        let first_tap_offset = (tap_count / 2) as i64 - 1;
        // Defensive: never write past the slice the caller actually gave us
        let num_frames = num_frames.min(out.len() / out_channels);
        let mut position = self.position();

        for frame in 0..num_frames {
            if !self.normalize_position(&mut position, total_frames) {
                break;
            }
            if !self.is_playing() {
                break;
            }

            let base = position.floor();
            let frac = position - base;
            let base = base as i64;
            let row = kernel.row(frac);
            let looping = self.loop_enabled();

            for ch in 0..out_channels {
                let mut acc = 0.0f32;
                for (tap, &coeff) in row.iter().enumerate() {
                    let src_frame = base - first_tap_offset + tap as i64;
                    acc += buffer.sample_at(src_frame, ch, looping) * coeff;
                }
                out[frame * out_channels + ch] += acc * volume;
            }

            // Re-read the shared rate every frame so scratch motion lands
            // with sub-buffer latency
            let rate = if follows_shared {
                shared.target_rate() as f64
            } else {
                1.0
            };
            position += rate;
        }

        // Normalize once more so loop wraps and end-of-sample stops are
        // visible immediately after the call, not one callback later
        self.normalize_position(&mut position, total_frames);
        self.set_position(position);
    }
}

impl Default for PlaybackVoice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KAISER_BETA;

    /// Two-tap table: at zero phase the row is [1, 0], so integer-aligned
    /// reads reproduce source samples exactly
    fn box_kernel() -> KernelTable {
        KernelTable::new(16, 2, KAISER_BETA)
    }

    fn constant_voice(frames: usize, channels: usize, value: f32) -> PlaybackVoice {
        let voice = PlaybackVoice::new();
        voice.load(
            PcmBuffer::new(vec![value; frames * channels], channels, 44100),
            "const".into(),
        );
        voice
    }

    #[test]
    fn test_dc_gain_at_integer_positions() {
        let kernel = KernelTable::shared();
        let shared = SharedRateState::new();
        let voice = constant_voice(256, 1, 0.5);
        voice.set_loop_enabled(true);
        voice.set_playing(true);
        voice.set_position(64.0);

        let mut out = vec![0.0f32; 8];
        voice.render(&mut out, 8, 1, 1.0, &shared, kernel);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-3, "got {}", s);
        }
    }

    #[test]
    fn test_fractional_phase_preserves_dc_on_constant_buffer() {
        let kernel = KernelTable::shared();
        let shared = SharedRateState::new();
        let voice = constant_voice(512, 1, 0.25);
        voice.set_loop_enabled(true);
        voice.set_playing(true);
        voice.set_position(100.37);
        shared.set_target_rate(0.73);
        voice.set_rate_source(RateSource::Shared);

        let mut out = vec![0.0f32; 32];
        voice.render(&mut out, 32, 1, 1.0, &shared, kernel);
        for &s in &out {
            assert!((s - 0.25).abs() < 1e-3, "got {}", s);
        }
    }

    #[test]
    fn test_unity_rate_advances_and_stops_at_end() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(4, 2, 0.5);
        voice.set_playing(true);

        // Pre-zeroed stereo output for 5 frames; only 4 must be written
        let mut out = vec![0.0f32; 5 * 2];
        voice.render(&mut out, 5, 2, 1.0, &shared, kernel);

        assert_eq!(voice.position(), 4.0);
        assert!(!voice.is_playing());
        for i in 0..4 {
            assert!((out[i * 2] - 0.5).abs() < 1e-6);
            assert!((out[i * 2 + 1] - 0.5).abs() < 1e-6);
        }
        assert_eq!(out[8], 0.0);
        assert_eq!(out[9], 0.0);
    }

    #[test]
    fn test_exact_length_render_also_stops() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(4, 1, 1.0);
        voice.set_playing(true);

        let mut out = vec![0.0f32; 4];
        voice.render(&mut out, 4, 1, 1.0, &shared, kernel);
        assert_eq!(voice.position(), 4.0);
        assert!(!voice.is_playing());
    }

    #[test]
    fn test_looping_position_wraps() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(10, 1, 0.0);
        voice.set_loop_enabled(true);
        voice.set_playing(true);
        voice.set_position(7.5);

        let mut out = vec![0.0f32; 6];
        voice.render(&mut out, 6, 1, 1.0, &shared, kernel);
        // 7.5 + 6 = 13.5 -> wraps to 3.5
        assert!((voice.position() - 3.5).abs() < 1e-9);
        assert!(voice.is_playing());
    }

    #[test]
    fn test_negative_rate_wraps_backward() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(10, 1, 0.0);
        voice.set_loop_enabled(true);
        voice.set_playing(true);
        voice.set_position(2.0);
        voice.set_rate_source(RateSource::Shared);
        shared.set_target_rate(-1.0);

        let mut out = vec![0.0f32; 5];
        voice.render(&mut out, 5, 1, 1.0, &shared, kernel);
        // 2 - 5 = -3 -> wraps to 7
        assert!((voice.position() - 7.0).abs() < 1e-9);
        assert!(voice.is_playing());
    }

    #[test]
    fn test_play_once_transition_fires_exactly_once() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(8, 1, 0.1);
        voice.set_play_once_then_loop(true);
        voice.set_playing(true);

        let mut out = vec![0.0f32; 8];
        voice.render(&mut out, 8, 1, 1.0, &shared, kernel);

        // First boundary crossing rewinds and arms the loop
        assert!(voice.has_played_once());
        assert!(voice.loop_enabled());
        assert_eq!(voice.position(), 0.0);
        assert!(voice.is_playing());

        // Subsequent crossings loop normally, no re-trigger
        let mut out = vec![0.0f32; 12];
        voice.render(&mut out, 12, 1, 1.0, &shared, kernel);
        assert!((voice.position() - 4.0).abs() < 1e-9);
        assert!(voice.has_played_once());
        assert!(voice.is_playing());
    }

    #[test]
    fn test_shared_rate_near_zero_short_circuits() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(16, 1, 0.9);
        voice.set_playing(true);
        voice.set_position(3.25);
        voice.set_rate_source(RateSource::Shared);
        shared.set_target_rate(0.0);

        let mut out = vec![0.0f32; 8];
        voice.render(&mut out, 8, 1, 1.0, &shared, kernel);
        assert_eq!(voice.position(), 3.25);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stopped_voice_renders_nothing() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(16, 1, 0.9);

        let mut out = vec![0.0f32; 8];
        voice.render(&mut out, 8, 1, 1.0, &shared, kernel);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_render_is_additive() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(32, 1, 0.5);
        voice.set_loop_enabled(true);
        voice.set_playing(true);

        let mut out = vec![0.25f32; 4];
        voice.render(&mut out, 4, 1, 1.0, &shared, kernel);
        for &s in &out {
            assert!((s - 0.75).abs() < 1e-3, "got {}", s);
        }
    }

    #[test]
    fn test_volume_scales_output() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(32, 1, 1.0);
        voice.set_loop_enabled(true);
        voice.set_playing(true);

        let mut out = vec![0.0f32; 4];
        voice.render(&mut out, 4, 1, 0.5, &shared, kernel);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn test_mono_source_fans_out_to_stereo() {
        let kernel = box_kernel();
        let shared = SharedRateState::new();
        let voice = constant_voice(32, 1, 0.3);
        voice.set_loop_enabled(true);
        voice.set_playing(true);

        let mut out = vec![0.0f32; 4 * 2];
        voice.render(&mut out, 4, 2, 1.0, &shared, kernel);
        for frame in 0..4 {
            assert!((out[frame * 2] - 0.3).abs() < 1e-3);
            assert!((out[frame * 2 + 1] - 0.3).abs() < 1e-3);
        }
    }

    #[test]
    fn test_load_resets_playback_state() {
        let voice = constant_voice(8, 1, 0.5);
        voice.set_playing(true);
        voice.set_loop_enabled(true);
        voice.set_position(5.0);
        voice.set_rate_source(RateSource::Shared);

        voice.load(PcmBuffer::new(vec![0.0; 16], 1, 44100), "next".into());
        assert!(!voice.is_playing());
        assert_eq!(voice.position(), 0.0);
        assert!(!voice.loop_enabled());
        assert_eq!(voice.rate_source(), RateSource::FixedUnity);
        assert_eq!(voice.file_path(), "next");
    }
}
