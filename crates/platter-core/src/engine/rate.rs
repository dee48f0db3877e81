//! Target playback-rate derivation from scratch input
//!
//! The UI layer reports two kinds of control input at frame cadence:
//! while the finger is down, a raw per-step angular delta; after release,
//! an already-normalized coasting rate from its physics loop. Both funnel
//! through [`apply_scratch_input`], which publishes the derived rate into
//! the [`SharedRateState`] read by the platter voice on the audio thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::types::{MAX_PLAYBACK_RATE, RATE_EPSILON};

use super::voice::{PlaybackVoice, RateSource};

/// Angular deltas at or below this are treated as a held, motionless finger
pub const MOVEMENT_THRESHOLD: f32 = 0.001;

/// Normalization divisors below this count as zero (divide-by-zero guard)
const NORMALIZATION_EPSILON: f32 = 1e-6;

/// Rate state shared between the control thread and the audio thread
///
/// Both fields are independently atomic. The render thread sees each
/// field's latest published value but no cross-field snapshot; a stale
/// pairing lasts at most one render buffer and is inaudible.
pub struct SharedRateState {
    /// Signed target playback rate, clamped to ±[`MAX_PLAYBACK_RATE`] (f32 bits)
    target_rate: AtomicU32,
    /// Whether a finger is currently on the platter
    touch_active: AtomicBool,
}

impl SharedRateState {
    pub fn new() -> Self {
        Self {
            target_rate: AtomicU32::new(1.0f32.to_bits()),
            touch_active: AtomicBool::new(false),
        }
    }

    /// Read the current target rate (audio thread, once per output frame)
    #[inline]
    pub fn target_rate(&self) -> f32 {
        f32::from_bits(self.target_rate.load(Ordering::Relaxed))
    }

    /// Publish a new target rate
    #[inline]
    pub fn set_target_rate(&self, rate: f32) {
        self.target_rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// Whether a finger is on the platter (read by the mixing policy)
    #[inline]
    pub fn touch_active(&self) -> bool {
        self.touch_active.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_touch_active(&self, active: bool) {
        self.touch_active.store(active, Ordering::Relaxed);
    }
}

impl Default for SharedRateState {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive and publish the target rate for one control update
///
/// While touched, `input` is a raw angular delta: normalized by
/// `unity_normalization` (input units per unity rate), scaled by
/// `sensitivity`, and clamped. Holding still silences the voice. While
/// untouched, `input` already is the coasting rate and passes through;
/// the voice plays whenever it is meaningfully non-zero.
///
/// Every update also keeps the voice on the shared rate source so that
/// the next coasting value takes effect without an extra hand-off.
pub fn apply_scratch_input(
    shared: &SharedRateState,
    voice: &PlaybackVoice,
    sensitivity: f32,
    unity_normalization: f32,
    touch_active: bool,
    input: f32,
) {
    shared.set_touch_active(touch_active);

    if voice.buffer().is_empty() {
        if touch_active {
            log::warn!("Scratch input on an unloaded platter voice");
        }
        voice.set_rate_source(RateSource::FixedUnity);
        return;
    }

    voice.set_rate_source(RateSource::Shared);

    let target_rate = if touch_active {
        if input.abs() > MOVEMENT_THRESHOLD {
            let normalized = if unity_normalization.abs() > NORMALIZATION_EPSILON {
                input / unity_normalization
            } else {
                input
            };
            let rate = (normalized * sensitivity).clamp(-MAX_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
            voice.set_playing(true);
            rate
        } else {
            // Finger down but motionless: the vinyl is pinned
            voice.set_playing(false);
            0.0
        }
    } else {
        voice.set_playing(input.abs() > RATE_EPSILON);
        input
    };

    shared.set_target_rate(target_rate);
    log::trace!(
        "scratch input: touch={} input={:.4} -> rate={:.4}",
        touch_active,
        input,
        target_rate
    );
}

/// Handle the touch-up transition
///
/// The UI's physics loop takes over rate updates from here; the voice must
/// already be following the shared rate when the first coasting value
/// arrives.
pub fn release_touch(shared: &SharedRateState, voice: &PlaybackVoice) {
    shared.set_touch_active(false);
    if !voice.buffer().is_empty() {
        voice.set_rate_source(RateSource::Shared);
    }
    log::info!(
        "Platter touch released, coasting from rate {:.4}",
        shared.target_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PcmBuffer;

    fn loaded_voice() -> PlaybackVoice {
        let voice = PlaybackVoice::new();
        voice.load(PcmBuffer::new(vec![0.0; 64], 1, 44100), "test".into());
        voice
    }

    #[test]
    fn test_motionless_touch_pins_the_platter() {
        let shared = SharedRateState::new();
        let voice = loaded_voice();
        voice.set_playing(true);

        apply_scratch_input(&shared, &voice, 0.17, 1.0, true, 0.0005);
        assert_eq!(shared.target_rate(), 0.0);
        assert!(!voice.is_playing());
        assert!(shared.touch_active());
    }

    #[test]
    fn test_moving_touch_scales_and_clamps() {
        let shared = SharedRateState::new();
        let voice = loaded_voice();

        // sensitivity 0.17, normalization 2.5, delta 5.0° -> 2.0 * 0.17 = 0.34
        apply_scratch_input(&shared, &voice, 0.17, 2.5, true, 5.0);
        assert!((shared.target_rate() - 0.34).abs() < 1e-6);
        assert!(voice.is_playing());

        // A violent swipe clamps at the rate ceiling
        apply_scratch_input(&shared, &voice, 0.17, 2.5, true, 500.0);
        assert_eq!(shared.target_rate(), MAX_PLAYBACK_RATE);

        apply_scratch_input(&shared, &voice, 0.17, 2.5, true, -500.0);
        assert_eq!(shared.target_rate(), -MAX_PLAYBACK_RATE);
    }

    #[test]
    fn test_zero_normalization_falls_back_to_raw_input() {
        let shared = SharedRateState::new();
        let voice = loaded_voice();

        apply_scratch_input(&shared, &voice, 0.5, 0.0, true, 2.0);
        assert!((shared.target_rate() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_coasting_rate_passes_through() {
        let shared = SharedRateState::new();
        let voice = loaded_voice();

        apply_scratch_input(&shared, &voice, 0.17, 2.5, false, -1.5);
        assert_eq!(shared.target_rate(), -1.5);
        assert!(voice.is_playing());
        assert!(!shared.touch_active());

        // Vinyl has coasted to a stop
        apply_scratch_input(&shared, &voice, 0.17, 2.5, false, 0.0);
        assert_eq!(shared.target_rate(), 0.0);
        assert!(!voice.is_playing());
    }

    #[test]
    fn test_scratch_input_switches_voice_to_shared_rate() {
        let shared = SharedRateState::new();
        let voice = loaded_voice();
        assert_eq!(voice.rate_source(), RateSource::FixedUnity);

        apply_scratch_input(&shared, &voice, 0.17, 1.0, true, 1.0);
        assert_eq!(voice.rate_source(), RateSource::Shared);
    }

    #[test]
    fn test_release_touch_enables_shared_rate() {
        let shared = SharedRateState::new();
        let voice = loaded_voice();
        shared.set_touch_active(true);

        release_touch(&shared, &voice);
        assert!(!shared.touch_active());
        assert_eq!(voice.rate_source(), RateSource::Shared);
    }

    #[test]
    fn test_unloaded_voice_keeps_fixed_rate() {
        let shared = SharedRateState::new();
        let voice = PlaybackVoice::new();

        apply_scratch_input(&shared, &voice, 0.17, 1.0, true, 3.0);
        assert_eq!(voice.rate_source(), RateSource::FixedUnity);
    }
}
