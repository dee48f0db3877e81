//! Audio output: error types and the cpal stream host

mod error;
mod stream;

pub use error::{AudioError, AudioResult};
pub use stream::OutputStream;
