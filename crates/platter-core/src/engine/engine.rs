//! Main audio engine - two voices, rate state, command surface, mixing
//!
//! The engine owns the platter voice (the scratchable sample) and the
//! music voice (background track), the shared rate state, and the
//! configured sample/track lists. The control thread calls command
//! methods; the audio thread calls [`Engine::render_block`] once per
//! hardware buffer. Everything they share is atomic scalar state, so
//! commands never block rendering (see the module docs in `rate`).

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::path::Path;

use crate::config::EngineConfig;
use crate::decode::{candidate_paths, AudioDecoder, DecodedAudio};
use crate::kernel::KernelTable;
use crate::types::{PcmBuffer, Sample};

use super::rate::{apply_scratch_input, release_touch, SharedRateState};
use super::voice::{PlaybackVoice, RateSource};

/// One category's ordered asset paths plus its wrapping cursor
struct SampleList {
    /// Mutated only by command handlers, never touched while rendering
    paths: Mutex<Vec<String>>,
    index: AtomicUsize,
}

impl SampleList {
    fn new(paths: Vec<String>) -> Self {
        Self {
            paths: Mutex::new(paths),
            index: AtomicUsize::new(0),
        }
    }

    fn current(&self) -> Option<String> {
        let paths = self.paths.lock().unwrap();
        if paths.is_empty() {
            return None;
        }
        let index = self.index.load(Ordering::Relaxed) % paths.len();
        Some(paths[index].clone())
    }

    /// Advance the cursor (wrapping) and return the new current path
    fn advance(&self) -> Option<String> {
        let paths = self.paths.lock().unwrap();
        if paths.is_empty() {
            return None;
        }
        let next = (self.index.load(Ordering::Relaxed) + 1) % paths.len();
        self.index.store(next, Ordering::Relaxed);
        Some(paths[next].clone())
    }

    /// Point the cursor at `path`, appending it when the list is empty.
    /// An unknown path on a non-empty list falls back to index 0.
    fn select(&self, path: &str) -> String {
        let mut paths = self.paths.lock().unwrap();
        let index = match paths.iter().position(|p| p == path) {
            Some(i) => i,
            None if paths.is_empty() => {
                paths.push(path.to_string());
                0
            }
            None => {
                log::warn!("'{}' not in the configured list, using index 0", path);
                0
            }
        };
        self.index.store(index, Ordering::Relaxed);
        paths[index].clone()
    }
}

/// The scratch engine
///
/// An explicitly constructed, explicitly owned context object: the host
/// creates one, hands an `Arc` to the output stream, and drives commands
/// on it from its control thread. Multiple independent engines can
/// coexist (each with its own voices and rate state).
pub struct Engine {
    platter: PlaybackVoice,
    music: PlaybackVoice,
    shared: SharedRateState,

    /// Scratch response scaling, f32 bits
    scratch_sensitivity: AtomicU32,
    /// Input units per unity playback rate, f32 bits
    unity_rate_normalization: AtomicU32,
    /// Crossfader-style volume for the platter voice, f32 bits
    fader_volume: AtomicU32,
    /// Master volume: music voice, and the intro before the first touch
    master_volume: AtomicU32,

    platter_samples: SampleList,
    music_tracks: SampleList,

    decoder: Box<dyn AudioDecoder>,
}

impl Engine {
    pub fn new(config: EngineConfig, decoder: Box<dyn AudioDecoder>) -> Self {
        log::info!(
            "Engine init: {} platter samples, {} music tracks, sensitivity {:.4}",
            config.platter_samples.len(),
            config.music_tracks.len(),
            config.scratch_sensitivity
        );
        Self {
            platter: PlaybackVoice::new(),
            music: PlaybackVoice::new(),
            shared: SharedRateState::new(),
            scratch_sensitivity: AtomicU32::new(config.scratch_sensitivity.to_bits()),
            unity_rate_normalization: AtomicU32::new(config.unity_rate_normalization.to_bits()),
            fader_volume: AtomicU32::new(0.0f32.to_bits()),
            master_volume: AtomicU32::new(0.9f32.to_bits()),
            platter_samples: SampleList::new(config.platter_samples),
            music_tracks: SampleList::new(config.music_tracks),
            decoder,
        }
    }

    /// The platter voice (exposed for tests and diagnostics)
    pub fn platter(&self) -> &PlaybackVoice {
        &self.platter
    }

    /// The music voice (exposed for tests and diagnostics)
    pub fn music(&self) -> &PlaybackVoice {
        &self.music
    }

    /// Shared rate state (exposed for tests and diagnostics)
    pub fn shared_rate(&self) -> &SharedRateState {
        &self.shared
    }

    // --- volumes & tuning ---

    pub fn set_fader_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.fader_volume.store(clamped.to_bits(), Ordering::Relaxed);
        log::info!("Platter fader volume set to {:.2}", clamped);
    }

    pub fn fader_volume(&self) -> f32 {
        f32::from_bits(self.fader_volume.load(Ordering::Relaxed))
    }

    pub fn set_master_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.master_volume.store(clamped.to_bits(), Ordering::Relaxed);
        log::info!("Master volume set to {:.2}", clamped);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    pub fn set_scratch_sensitivity(&self, sensitivity: f32) {
        self.scratch_sensitivity
            .store(sensitivity.to_bits(), Ordering::Relaxed);
        log::info!("Scratch sensitivity set to {:.4}", sensitivity);
    }

    pub fn scratch_sensitivity(&self) -> f32 {
        f32::from_bits(self.scratch_sensitivity.load(Ordering::Relaxed))
    }

    /// Input units (e.g. degrees per control step) that map to unity rate
    pub fn set_unity_rate_normalization(&self, normalization: f32) {
        if normalization <= 0.0 {
            log::warn!(
                "Ignoring non-positive unity rate normalization {:.4}",
                normalization
            );
            return;
        }
        self.unity_rate_normalization
            .store(normalization.to_bits(), Ordering::Relaxed);
        log::info!("Unity rate normalization set to {:.4}", normalization);
    }

    pub fn unity_rate_normalization(&self) -> f32 {
        f32::from_bits(self.unity_rate_normalization.load(Ordering::Relaxed))
    }

    // --- scratch input ---

    /// Per-control-step scratch update (touch drag or coasting rate)
    pub fn scratch_input(&self, touch_active: bool, value: f32) {
        apply_scratch_input(
            &self.shared,
            &self.platter,
            self.scratch_sensitivity(),
            self.unity_rate_normalization(),
            touch_active,
            value,
        );
    }

    /// Finger lifted off the platter; coasting updates follow
    pub fn release_touch(&self) {
        release_touch(&self.shared, &self.platter);
    }

    // --- platter commands ---

    /// Load the intro sample and arm the play-once-then-loop policy
    ///
    /// The fader is forced to zero; the UI fades it in. Until the intro
    /// finishes its first pass (or the user touches the platter) it is
    /// mixed at master volume instead, so it is audible with the fader
    /// still down.
    pub fn play_intro(&self, path: &str) {
        let selected = self.platter_samples.select(path);
        if !self.load_voice(&self.platter, &selected) {
            return;
        }
        self.platter.set_play_once_then_loop(true);
        self.platter.set_loop_enabled(false);
        self.platter.set_position(0.0);
        self.platter.set_rate_source(RateSource::FixedUnity);
        self.shared.set_target_rate(1.0);
        self.platter.set_playing(true);
        self.set_fader_volume(0.0);
        log::info!(
            "Intro '{}' will play once, then loop silently",
            self.platter.file_path()
        );
    }

    /// Advance to the next platter sample and start it looping at unity
    pub fn next_platter_sample(&self) {
        let Some(next) = self.platter_samples.advance() else {
            log::error!("No platter samples configured");
            return;
        };
        if !self.load_voice(&self.platter, &next) {
            return;
        }
        self.platter.set_loop_enabled(true);
        self.platter.set_position(0.0);
        self.platter.set_rate_source(RateSource::FixedUnity);
        self.shared.set_target_rate(1.0);
        self.platter.set_playing(true);
    }

    // --- music commands ---

    /// Play the current music track from the top
    pub fn play_music_track(&self) {
        let Some(current) = self.music_tracks.current() else {
            log::error!("No music tracks configured");
            return;
        };
        // Same track already playing: restart instead of reloading
        if self.music.is_playing() && self.is_resolved_from(&self.music.file_path(), &current) {
            log::info!("Track '{}' already playing, restarting", current);
            self.music.set_position(0.0);
            return;
        }
        if !self.load_voice(&self.music, &current) {
            return;
        }
        self.music.set_loop_enabled(false);
        self.music.set_position(0.0);
        self.music.set_playing(true);
    }

    /// Stop the music voice (position is kept)
    pub fn stop_music_track(&self) {
        self.music.set_playing(false);
        log::info!("Stopped music track '{}'", self.music.file_path());
    }

    /// Advance the track cursor and play the new track
    pub fn next_music_track_and_play(&self) {
        if self.music_tracks.advance().is_none() {
            log::warn!("No music tracks configured");
            return;
        }
        self.play_music_track();
    }

    /// Advance the track cursor, keeping the playing/stopped state
    pub fn next_music_track_keep_state(&self) {
        let was_playing = self.music.is_playing();
        let Some(next) = self.music_tracks.advance() else {
            log::warn!("No music tracks configured");
            return;
        };
        if !self.load_voice(&self.music, &next) {
            return;
        }
        self.music.set_position(0.0);
        self.music.set_playing(was_playing);
        log::info!(
            "Advanced to '{}' ({})",
            self.music.file_path(),
            if was_playing { "resumed" } else { "stopped" }
        );
    }

    // --- rendering ---

    /// Render entry point, called once per hardware buffer
    ///
    /// Zeroes the buffer, then sums the voices into it. Real-time safe:
    /// no allocation, no locks, no panics.
    pub fn render_block(&self, out: &mut [Sample], num_frames: usize, channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }
        let kernel = KernelTable::shared();

        // The intro is audible at master volume until it has either
        // finished its first pass or come under scratch control; after
        // that the fader owns the platter level
        let intro_window = self.platter.play_once_then_loop()
            && !self.platter.has_played_once()
            && !self.shared.touch_active()
            && self.platter.rate_source() == RateSource::FixedUnity;
        let platter_volume = if intro_window {
            self.master_volume()
        } else {
            self.fader_volume()
        };
        self.platter
            .render(out, num_frames, channels, platter_volume, &self.shared, kernel);

        if self.music.is_playing() {
            self.music.render(
                out,
                num_frames,
                channels,
                self.master_volume(),
                &self.shared,
                kernel,
            );
        }
    }

    // --- internals ---

    /// Try the load-path candidates in order; on success swap the buffer in
    ///
    /// Failure leaves the voice empty and silent, never a stale sample.
    fn load_voice(&self, voice: &PlaybackVoice, base_path: &str) -> bool {
        for candidate in candidate_paths(base_path) {
            match self.decoder.decode(Path::new(&candidate)) {
                Ok(DecodedAudio {
                    data,
                    channels,
                    sample_rate,
                }) => {
                    voice.load(PcmBuffer::new(data, channels, sample_rate), candidate);
                    return true;
                }
                Err(e) => log::debug!("Candidate '{}' not loadable: {}", candidate, e),
            }
        }
        log::error!("Failed to load audio for base path '{}'", base_path);
        voice.clear(base_path.to_string());
        false
    }

    /// Does `resolved` name the same asset as `base` (any tried extension)?
    fn is_resolved_from(&self, resolved: &str, base: &str) -> bool {
        candidate_paths(base).iter().any(|c| c == resolved)
    }
}
