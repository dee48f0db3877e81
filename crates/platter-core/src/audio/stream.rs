//! CPAL output stream hosting the render callback
//!
//! The stream layer is deliberately thin: open the default output device,
//! register a closure that forwards each hardware buffer to
//! [`Engine::render_block`], and expose start/stop. Stream errors are
//! logged and surfaced as results; retry/reopen policy belongs to the
//! host application, not here.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::engine::Engine;

use super::error::{AudioError, AudioResult};

/// An open output stream bound to one engine
///
/// Keeps the cpal stream alive; dropping the handle closes the stream.
pub struct OutputStream {
    stream: Stream,
    sample_rate: u32,
    channels: u16,
}

impl OutputStream {
    /// Open the default output device and attach the engine's render loop
    ///
    /// The stream is created paused; call [`OutputStream::start`] to run it.
    pub fn open(engine: Arc<Engine>) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevices)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using audio output device: {}", device_name);

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(
                supported.sample_format().to_string(),
            ));
        }

        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;
        log::info!(
            "Output stream config: {} channels, {} Hz",
            channels,
            sample_rate
        );

        let callback_channels = channels as usize;
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / callback_channels;
                    engine.render_block(data, frames, callback_channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        // cpal may start streams eagerly on some hosts; park it until the
        // caller asks for audio
        if let Err(e) = stream.pause() {
            log::warn!("Could not pause freshly built stream: {}", e);
        }

        Ok(Self {
            stream,
            sample_rate,
            channels,
        })
    }

    /// Start (or resume) rendering
    pub fn start(&self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
        log::info!("Audio stream started");
        Ok(())
    }

    /// Pause rendering; the stream stays open and can be restarted
    pub fn stop(&self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamStopError(e.to_string()))?;
        log::info!("Audio stream stopped");
        Ok(())
    }

    /// Sample rate negotiated with the device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output channel count negotiated with the device
    pub fn channels(&self) -> u16 {
        self.channels
    }
}
