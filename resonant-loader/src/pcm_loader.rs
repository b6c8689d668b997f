//! Background PCM loading
//!
//! `load` hands decoding to a worker thread; the owner polls `update` from
//! its control loop and picks up the finished buffer without blocking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use resonant_dsp::sample::SampleBuffer;

use crate::loader::{LoadError, PcmDecoder};

type LoadResult = Result<SampleBuffer, LoadError>;

/// Asynchronous loader for one sample buffer at a time
pub struct PcmLoader {
    decoder: PcmDecoder,
    pending: Option<Receiver<LoadResult>>,
    path: Option<PathBuf>,
    sample_buffer: Option<Arc<SampleBuffer>>,
    loaded: bool,
    last_error: Option<LoadError>,
}

impl Default for PcmLoader {
    fn default() -> Self {
        Self::new(PcmDecoder::new())
    }
}

impl PcmLoader {
    pub fn new(decoder: PcmDecoder) -> Self {
        Self {
            decoder,
            pending: None,
            path: None,
            sample_buffer: None,
            loaded: false,
            last_error: None,
        }
    }

    /// Start decoding `path` on a worker thread.
    ///
    /// A load still in flight is abandoned; its result is discarded.
    pub fn load(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let decoder = self.decoder;
        let worker_path = path.clone();

        thread::spawn(move || {
            let result = decoder.decode_file(&worker_path);
            let _ = tx.send(result);
        });

        tracing::info!("Loading {}", path.display());
        self.pending = Some(rx);
        self.path = Some(path);
        self.loaded = false;
        self.last_error = None;
    }

    /// Poll the worker. Returns true when a load finished during this call.
    pub fn update(&mut self) -> bool {
        let Some(rx) = &self.pending else {
            return false;
        };
        match rx.try_recv() {
            Ok(result) => {
                self.finish(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.finish(Err(LoadError::WorkerDisconnected));
                true
            }
        }
    }

    /// Block until the pending load finishes or `timeout` elapses.
    /// Returns true if a load finished.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let Some(rx) = &self.pending else {
            return false;
        };
        match rx.recv_timeout(timeout) {
            Ok(result) => {
                self.finish(result);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.finish(Err(LoadError::WorkerDisconnected));
                true
            }
        }
    }

    fn finish(&mut self, result: LoadResult) {
        self.pending = None;
        let path = self.path.as_deref().map(|p| p.display().to_string()).unwrap_or_default();
        match result {
            Ok(buffer) => {
                tracing::info!(
                    frames = buffer.num_frames(),
                    channels = buffer.num_channels(),
                    sample_rate = buffer.sample_rate(),
                    "Loaded {}",
                    path
                );
                self.sample_buffer = Some(Arc::new(buffer));
                self.loaded = true;
            }
            Err(err) => {
                tracing::warn!("Failed to load {}: {}", path, err);
                self.last_error = Some(err);
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// True once a buffer has been decoded, even after it was taken
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Hand over the decoded buffer
    pub fn take_sample_buffer(&mut self) -> Option<Arc<SampleBuffer>> {
        self.sample_buffer.take()
    }

    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::test_util::wav_bytes;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn temp_wav(name: &str, samples: &[i16], channels: u16, sample_rate: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("resonant-{}-{}.wav", name, std::process::id()));
        std::fs::write(&path, wav_bytes(samples, channels, sample_rate)).unwrap();
        path
    }

    #[test]
    fn test_idle_loader() {
        let mut loader = PcmLoader::default();
        assert!(!loader.update());
        assert!(!loader.is_loading());
        assert!(!loader.is_loaded());
        assert!(loader.take_sample_buffer().is_none());
    }

    #[test]
    fn test_loads_in_background() {
        let path = temp_wav("bg", &[1000; 4800], 1, 48000);
        let mut loader = PcmLoader::default();
        loader.load(&path);
        assert!(loader.is_loading());
        assert!(loader.wait(TIMEOUT));

        assert!(loader.is_loaded());
        assert!(loader.last_error().is_none());
        let buffer = loader.take_sample_buffer().unwrap();
        assert_eq!(buffer.num_frames(), 4800);
        assert!(loader.take_sample_buffer().is_none());
        assert!(loader.is_loaded());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_update_polls_without_blocking() {
        let path = temp_wav("poll", &[0; 960], 2, 48000);
        let mut loader = PcmLoader::default();
        loader.load(&path);
        let mut finished = false;
        for _ in 0..1000 {
            if loader.update() {
                finished = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(finished);
        assert_eq!(loader.take_sample_buffer().map(|b| b.num_channels()), Some(2));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_reports_error() {
        let mut loader = PcmLoader::default();
        loader.load("/nonexistent/resonant/missing.wav");
        assert!(loader.wait(TIMEOUT));
        assert!(!loader.is_loaded());
        assert!(matches!(loader.last_error(), Some(LoadError::Io(_))));
    }
}
