//! cpal-backed capture backend.
//!
//! The cpal stream is not Send, so a dedicated thread owns it for the
//! lifetime of the capture; samples cross over through a shared buffer and
//! an atomic stop flag. Dropping the stream guard stops that thread and
//! releases the device on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::warn;

use crate::domain::CapturedAudio;

use super::backend::{CaptureBackend, CaptureError, CaptureStream};
use super::permission::PermissionState;

/// Microphone capture through the platform's default input device.
#[derive(Debug, Clone, Default)]
pub struct CpalCaptureBackend;

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self
    }

    /// Names of the available input devices.
    pub fn input_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl CaptureBackend for CpalCaptureBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn query_permission(&self) -> Option<PermissionState> {
        // cpal has no portable permission query; state is only learned by
        // attempting acquisition
        None
    }

    fn probe(&self) -> Result<(), CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
        let config = device
            .default_input_config()
            .map_err(classify_config_error)?;

        // opening the stream is what triggers the platform consent dialog
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let stream = build_input_stream(&device, &config, buffer, stop)?;
        stream
            .play()
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        drop(stream);
        Ok(())
    }

    fn open_stream(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_stop = stop.clone();
        let thread_buffer = buffer.clone();
        let thread = std::thread::spawn(move || {
            let built = (|| -> Result<(cpal::Stream, u32, u16), CaptureError> {
                let host = cpal::default_host();
                let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
                let config = device
                    .default_input_config()
                    .map_err(classify_config_error)?;
                let sample_rate = config.sample_rate().0;
                let channels = config.channels();

                let stream = build_input_stream(
                    &device,
                    &config,
                    thread_buffer.clone(),
                    thread_stop.clone(),
                )?;
                stream
                    .play()
                    .map_err(|e| CaptureError::Other(e.to_string()))?;
                Ok((stream, sample_rate, channels))
            })();

            match built {
                Ok((stream, sample_rate, channels)) => {
                    let _ = ready_tx.send(Ok((sample_rate, channels)));
                    while !thread_stop.load(Ordering::Acquire) {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    // dropping the stream releases the device
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok((sample_rate, channels))) => Ok(Box::new(CpalCaptureStream {
                stop,
                buffer,
                sample_rate,
                channels,
                thread: Some(thread),
            })),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => Err(CaptureError::Other(
                "capture thread exited before the stream was ready".to_string(),
            )),
        }
    }
}

struct CpalCaptureStream {
    stop: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
    channels: u16,
    thread: Option<JoinHandle<()>>,
}

impl CpalCaptureStream {
    fn release(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl CaptureStream for CpalCaptureStream {
    fn finalize(mut self: Box<Self>) -> Result<CapturedAudio, CaptureError> {
        self.release();
        let samples = self
            .buffer
            .lock()
            .map_err(|_| CaptureError::Other("capture buffer poisoned".to_string()))?
            .clone();
        let wav = samples_to_wav(&samples, self.sample_rate, self.channels)?;
        Ok(CapturedAudio {
            wav,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Build an input stream feeding the shared sample buffer.
fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    buffer: Arc<Mutex<Vec<i16>>>,
    stop: Arc<AtomicBool>,
) -> Result<cpal::Stream, CaptureError> {
    let stream_config = config.config();

    match config.sample_format() {
        cpal::SampleFormat::F32 => device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    if let Ok(mut buf) = buffer.lock() {
                        for &sample in data {
                            buf.push((sample * i16::MAX as f32) as i16);
                        }
                    }
                },
                |err| warn!(error = %err, "capture stream error"),
                None,
            )
            .map_err(classify_build_error),
        cpal::SampleFormat::I16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| warn!(error = %err, "capture stream error"),
                None,
            )
            .map_err(classify_build_error),
        _ => Err(CaptureError::Unsupported),
    }
}

/// Write 16-bit PCM samples into a complete WAV file in memory.
fn samples_to_wav(
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = Vec::new();
    {
        let mut writer = hound::WavWriter::new(std::io::Cursor::new(&mut out), spec)
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CaptureError::Other(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Other(e.to_string()))?;
    }
    Ok(out)
}

fn classify_config_error(err: cpal::DefaultStreamConfigError) -> CaptureError {
    match err {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoDevice,
        cpal::DefaultStreamConfigError::StreamTypeNotSupported => CaptureError::Unsupported,
        other => classify_description(other.to_string()),
    }
}

fn classify_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoDevice,
        cpal::BuildStreamError::StreamConfigNotSupported => CaptureError::Unsupported,
        other => classify_description(other.to_string()),
    }
}

/// Platform backends report permission refusal as backend-specific text.
fn classify_description(description: String) -> CaptureError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted")
    {
        CaptureError::PermissionRefused
    } else {
        CaptureError::Other(description)
    }
}
