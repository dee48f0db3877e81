//! Engine internals: voices, rate derivation, orchestration

mod engine;
mod rate;
mod voice;

pub use engine::Engine;
pub use rate::{apply_scratch_input, release_touch, SharedRateState, MOVEMENT_THRESHOLD};
pub use voice::{PlaybackVoice, RateSource};
