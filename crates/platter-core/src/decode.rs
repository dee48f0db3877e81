//! Sample decoding behind the `AudioDecoder` seam
//!
//! The engine never touches container formats itself: it asks a decoder
//! for `(channels, sample rate, interleaved f32)` and swaps the result
//! into a voice. [`SymphoniaDecoder`] is the production implementation
//! (MP3 + WAV/PCM); tests substitute stub decoders through the trait.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Errors from the decoding layer
#[derive(Error, Debug)]
pub enum DecodeError {
    /// File could not be opened
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Container not recognized or no decodable audio track inside
    #[error("unsupported or corrupt audio data in {0}")]
    UnsupportedFormat(String),

    /// Decoder failed partway through the stream
    #[error("decode failed for {path}: {message}")]
    DecodeFailed { path: String, message: String },
}

/// Result type for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Fully decoded audio, ready to become a voice's `PcmBuffer`
pub struct DecodedAudio {
    /// Interleaved f32 samples
    pub data: Vec<f32>,
    /// Channel count (≥ 1)
    pub channels: usize,
    /// Native sample rate in Hz
    pub sample_rate: u32,
}

/// Decodes one audio file into interleaved float PCM
///
/// Implementations must be callable from any non-real-time thread.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> DecodeResult<DecodedAudio>;
}

/// Symphonia-backed decoder for MP3 and WAV assets
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> DecodeResult<DecodedAudio> {
        let display = path.display().to_string();

        let file = File::open(path).map_err(|source| DecodeError::Io {
            path: display.clone(),
            source,
        })?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|_| DecodeError::UnsupportedFormat(display.clone()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::UnsupportedFormat(display.clone()))?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| DecodeError::UnsupportedFormat(display.clone()))?;

        let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut data: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // End of stream
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(DecodeError::DecodeFailed {
                        path: display,
                        message: e.to_string(),
                    });
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count();
                    sample_rate = spec.rate;

                    if sample_buf.is_none() {
                        sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                    }
                    if let Some(buf) = &mut sample_buf {
                        buf.copy_interleaved_ref(decoded);
                        data.extend_from_slice(buf.samples());
                    }
                }
                // A corrupt packet is skippable; the stream may recover
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping corrupt packet in {}: {}", display, e);
                }
                Err(e) => {
                    return Err(DecodeError::DecodeFailed {
                        path: display,
                        message: e.to_string(),
                    });
                }
            }
        }

        if data.is_empty() || channels == 0 {
            return Err(DecodeError::UnsupportedFormat(display));
        }

        Ok(DecodedAudio {
            data,
            channels,
            sample_rate,
        })
    }
}

/// Load-path resolution order for a base asset path
///
/// The configured sample lists use extension-less base paths; loading
/// tries the exact path first, then `.mp3`, then `.wav`.
pub fn candidate_paths(base: &str) -> [String; 3] {
    [
        base.to_string(),
        format!("{}.mp3", base),
        format!("{}.wav", base),
    ]
}
