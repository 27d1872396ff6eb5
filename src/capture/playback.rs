//! rodio-backed playback backend.
//!
//! The rodio output stream is not Send, so a dedicated thread owns it for
//! the lifetime of the playback. The handle's stop flag tears the thread
//! down; a finished flag records natural end of playback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::domain::CapturedAudio;

use super::backend::{PlaybackBackend, PlaybackError, PlaybackHandle};

/// Audio playback through the platform's default output device.
#[derive(Debug, Clone, Default)]
pub struct RodioPlaybackBackend;

impl RodioPlaybackBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackBackend for RodioPlaybackBackend {
    fn name(&self) -> &str {
        "rodio"
    }

    fn start(&self, audio: &CapturedAudio) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let wav = audio.wav.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_stop = stop.clone();
        let thread_finished = finished.clone();
        let thread = std::thread::spawn(move || {
            let built = (|| -> Result<(rodio::OutputStream, rodio::Sink), PlaybackError> {
                let stream = rodio::OutputStreamBuilder::open_default_stream()
                    .map_err(|e| PlaybackError::Other(e.to_string()))?;
                let sink = rodio::Sink::connect_new(stream.mixer());
                let decoder = rodio::Decoder::new(std::io::Cursor::new(wav))
                    .map_err(|e| PlaybackError::Other(e.to_string()))?;
                sink.append(decoder);
                Ok((stream, sink))
            })();

            match built {
                Ok((stream, sink)) => {
                    let _ = ready_tx.send(Ok(()));
                    loop {
                        if thread_stop.load(Ordering::Acquire) {
                            sink.stop();
                            break;
                        }
                        if sink.empty() {
                            thread_finished.store(true, Ordering::Release);
                            break;
                        }
                        std::thread::sleep(Duration::from_millis(25));
                    }
                    // dropping the stream releases the output device
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(RodioHandle {
                stop,
                finished,
                thread: Some(thread),
            })),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => Err(PlaybackError::Other(
                "playback thread exited before the sink was ready".to_string(),
            )),
        }
    }
}

struct RodioHandle {
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RodioHandle {
    fn release(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl PlaybackHandle for RodioHandle {
    fn stop(&mut self) {
        self.release();
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.release();
    }
}
