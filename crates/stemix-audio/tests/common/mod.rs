//! Shared fixtures for engine integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stemix_audio::{MultitrackEngine, OfflineContext};
use async_trait::async_trait;
use stemix_core::{EngineConfig, Error, Result, StemPayload, StemSource};

/// Sample rate of every fixture; small so long stems stay cheap.
pub const RATE: u32 = 1000;

/// 16-bit mono PCM WAV file.
pub fn wav(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Constant-level stem of `seconds` at [`RATE`]. 8192 is 0.25 full scale.
pub fn dc_stem(seconds: f64, level: i16) -> Vec<u8> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let frames = (seconds * f64::from(RATE)).round() as usize;
    wav(RATE, &vec![level; frames])
}

#[derive(Clone)]
enum Behavior {
    Audio { data: Vec<u8>, delay: Duration },
    Fail(String),
    Pending,
}

/// Scriptable in-memory stem source that records fetch concurrency.
#[derive(Default)]
pub struct MockSource {
    stems: Mutex<HashMap<String, Behavior>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn audio(&self, locator: &str, data: Vec<u8>) {
        self.audio_delayed(locator, data, Duration::ZERO);
    }

    pub fn audio_delayed(&self, locator: &str, data: Vec<u8>, delay: Duration) {
        self.stems
            .lock()
            .insert(locator.to_string(), Behavior::Audio { data, delay });
    }

    pub fn fail(&self, locator: &str, message: &str) {
        self.stems
            .lock()
            .insert(locator.to_string(), Behavior::Fail(message.to_string()));
    }

    /// Fetches of `locator` never resolve.
    pub fn pending(&self, locator: &str) {
        self.stems.lock().insert(locator.to_string(), Behavior::Pending);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn serve(&self, locator: &str) -> Result<StemPayload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let behavior = self.stems.lock().get(locator).cloned();
        match behavior {
            Some(Behavior::Audio { data, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(StemPayload::new(data).with_mime_type("audio/wav"))
            }
            Some(Behavior::Fail(message)) => Err(Error::Network(message)),
            Some(Behavior::Pending) => std::future::pending().await,
            None => Err(Error::Network(format!("404 for {locator}"))),
        }
    }
}

#[async_trait]
impl StemSource for MockSource {
    async fn fetch(&self, locator: &str) -> Result<StemPayload> {
        self.serve(locator).await
    }
}

/// Stereo offline engine over `source`.
pub fn engine(source: Arc<MockSource>) -> (Arc<OfflineContext>, MultitrackEngine) {
    engine_with(source, EngineConfig::default())
}

pub fn engine_with(
    source: Arc<MockSource>,
    config: EngineConfig,
) -> (Arc<OfflineContext>, MultitrackEngine) {
    let context = Arc::new(OfflineContext::new(RATE, 2));
    let engine = MultitrackEngine::new(context.clone(), source, 120.0, config).unwrap();
    (context, engine)
}
